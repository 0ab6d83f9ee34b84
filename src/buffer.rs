use csv_stream_core::MAX_SEQ_LEN;

/// The default capacity of the source and output buffers.
pub(crate) const DEFAULT_CAPACITY: usize = 8 * (1 << 10);

/// A finite window over a logically unbounded input stream.
///
/// Bytes `[0, filled)` hold data that has been read but not yet released.
/// The scanner only ever sees this window. Whenever the window cannot make
/// progress, the caller either releases a prefix with `compact` or doubles
/// the capacity with `grow`, then reads more bytes into `spare`.
#[derive(Debug)]
pub(crate) struct SourceBuffer {
    buf: Vec<u8>,
    filled: usize,
    eof: bool,
    /// The absolute stream offset of `buf[0]`.
    offset: u64,
}

impl SourceBuffer {
    pub(crate) fn new(capacity: usize) -> SourceBuffer {
        SourceBuffer {
            buf: vec![0; capacity.max(1)],
            filled: 0,
            eof: false,
            offset: 0,
        }
    }

    /// The bytes read so far that are still held.
    #[inline]
    pub(crate) fn data(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// The writable tail of the buffer.
    #[inline]
    pub(crate) fn spare(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    #[inline]
    pub(crate) fn spare_len(&self) -> usize {
        self.buf.len() - self.filled
    }

    /// Commit `n` bytes that were just read into `spare`.
    ///
    /// Reading zero bytes marks the end of the stream.
    pub(crate) fn fill(&mut self, n: usize) {
        debug_assert!(n <= self.spare_len());
        if n == 0 {
            self.eof = true;
        }
        self.filled += n;
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    /// The absolute stream offset of the first held byte.
    #[inline]
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Release everything before `keep`, moving the rest to the front.
    ///
    /// Returns the number of bytes released.
    pub(crate) fn compact(&mut self, keep: usize) -> usize {
        debug_assert!(keep <= self.filled);
        if keep == 0 {
            return 0;
        }
        self.buf.copy_within(keep..self.filled, 0);
        self.filled -= keep;
        self.offset += keep as u64;
        keep
    }

    /// Double the capacity of the buffer.
    pub(crate) fn grow(&mut self) {
        let new_len = self.buf.len().checked_mul(2).unwrap_or(usize::MAX);
        log::debug!(
            "growing source buffer from {} to {} bytes at stream offset {}",
            self.buf.len(),
            new_len,
            self.offset
        );
        self.buf.resize(new_len, 0);
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// A reusable buffer for serialized output.
///
/// The serializer writes into `writable`, the owner commits with
/// `written` and drains `readable` to the underlying sink.
#[derive(Debug)]
pub(crate) struct OutputBuffer {
    buf: Vec<u8>,
    len: usize,
}

impl OutputBuffer {
    /// Create a new output buffer.
    ///
    /// The capacity is never smaller than what the largest all-or-nothing
    /// write (two closing quotes plus a delimiter or terminator) needs.
    pub(crate) fn new(capacity: usize) -> OutputBuffer {
        let min = 2 * MAX_SEQ_LEN + 4;
        OutputBuffer { buf: vec![0; capacity.max(min)], len: 0 }
    }

    #[inline]
    pub(crate) fn writable(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    #[inline]
    pub(crate) fn written(&mut self, n: usize) {
        debug_assert!(self.len + n <= self.buf.len());
        self.len += n;
    }

    #[inline]
    pub(crate) fn readable(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
