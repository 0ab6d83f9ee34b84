/*!
Asynchronous counterparts of `Reader` and `Writer` for tokio's `AsyncRead`
and `AsyncWrite`.

Both run the same scanning and serialization code as the blocking types;
only the refilling and draining of their buffers awaits.
*/

use std::io;
use std::result;
use std::sync::Arc;

use csv_stream_core::Dialect;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{IntoInnerError, Result};
use crate::reader::{ReaderBuilder, ReaderCore, Row, Step};
use crate::string_record::StringRecord;
use crate::writer::{WriterBuilder, WriterCore};

impl ReaderBuilder {
    /// Build an asynchronous CSV reader from this configuration.
    pub fn from_async_reader<R: AsyncRead + Unpin>(
        &self,
        rdr: R,
    ) -> Result<AsyncReader<R>> {
        let dialect = self.dialect()?;
        Ok(AsyncReader { core: ReaderCore::new(self, dialect), rdr })
    }
}

impl WriterBuilder {
    /// Build an asynchronous CSV writer from this configuration.
    pub fn from_async_writer<W: AsyncWrite + Unpin>(
        &self,
        wtr: W,
    ) -> Result<AsyncWriter<W>> {
        let dialect = self.dialect()?;
        Ok(AsyncWriter { core: WriterCore::new(self, dialect), wtr })
    }
}

/// A CSV reader over a tokio `AsyncRead`.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), csv_stream::Error> {
/// let mut rdr = csv_stream::AsyncReader::from_reader(&b"a,b\nc,d\n"[..]);
/// let mut rows = 0;
/// while rdr.move_next().await? {
///     rows += 1;
/// }
/// assert_eq!(rows, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncReader<R> {
    core: ReaderCore,
    rdr: R,
}

impl<R: AsyncRead + Unpin> AsyncReader<R> {
    /// Create a new asynchronous CSV reader with a default configuration.
    pub fn from_reader(rdr: R) -> AsyncReader<R> {
        AsyncReader {
            core: ReaderCore::new(&ReaderBuilder::new(), Dialect::default()),
            rdr,
        }
    }

    /// Advance to the next row, reading more input as needed.
    ///
    /// This returns `false` once the end of the data has been reached.
    pub async fn move_next(&mut self) -> Result<bool> {
        loop {
            match self.core.advance()? {
                Step::Row => return Ok(true),
                Step::End => return Ok(false),
                Step::NeedInput => {
                    let n = self.rdr.read(self.core.spare()).await?;
                    self.core.filled(n);
                }
            }
        }
    }

    /// The row the reader is positioned on.
    pub fn current_row(&self) -> Option<Row<'_>> {
        self.core.current_row()
    }

    /// Return the value of field `i` of the current row as an `Arc<str>`,
    /// interned according to the reader's `Interning` setting.
    pub fn interned_field(&mut self, i: usize) -> Result<Arc<str>> {
        self.core.interned_field(i)
    }

    /// Read a single row into the given byte record.
    pub async fn read_byte_record(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        if !self.move_next().await? {
            record.clear();
            return Ok(false);
        }
        self.core.copy_byte_record(record);
        Ok(true)
    }

    /// Read a single row into the given string record.
    pub async fn read_record(
        &mut self,
        record: &mut StringRecord,
    ) -> Result<bool> {
        if !self.move_next().await? {
            record.clear();
            return Ok(false);
        }
        self.core.copy_string_record(record)?;
        Ok(true)
    }
}

impl<R> AsyncReader<R> {
    /// The position of the current row.
    pub fn position(&self) -> &Position {
        self.core.position()
    }

    /// Returns true once every row has been read.
    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }

    /// Unwrap this CSV reader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.rdr
    }
}

/// A CSV writer over a tokio `AsyncWrite`.
///
/// Unlike `Writer`, this does not flush on drop, since dropping cannot
/// await. Call `flush` or `into_inner` when done.
#[derive(Debug)]
pub struct AsyncWriter<W> {
    core: WriterCore,
    wtr: W,
}

impl<W: AsyncWrite + Unpin> AsyncWriter<W> {
    /// Create a new asynchronous CSV writer with a default configuration.
    pub fn from_writer(wtr: W) -> AsyncWriter<W> {
        AsyncWriter { core: WriterCore::default_config(), wtr }
    }

    /// Write a single field.
    pub async fn write_field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<()> {
        self.write_field_impl(field.as_ref(), false).await
    }

    /// Write a single field, quoting it regardless of its contents when
    /// `force` is true.
    pub async fn write_field_quoted<T: AsRef<[u8]>>(
        &mut self,
        field: T,
        force: bool,
    ) -> Result<()> {
        self.write_field_impl(field.as_ref(), force).await
    }

    async fn write_field_impl(&mut self, field: &[u8], force: bool) -> Result<()> {
        let (value, quote) = self.core.prepare(field, None, false, force)?;
        if self.core.needs_delimiter() {
            while !self.core.put_delimiter() {
                self.flush_buf().await?;
            }
        }
        self.core.begin_field(quote);
        let mut input = &value[..];
        loop {
            let (done, nin) = self.core.put_field(input);
            input = &input[nin..];
            if done {
                break;
            }
            self.flush_buf().await?;
        }
        self.core.end_field();
        Ok(())
    }

    /// Write a single record followed by a record terminator.
    pub async fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for field in record.into_iter() {
            self.write_field(field).await?;
        }
        self.next_record().await
    }

    /// End the current record.
    pub async fn next_record(&mut self) -> Result<()> {
        while !self.core.put_terminator() {
            self.flush_buf().await?;
        }
        Ok(())
    }

    /// Flush the internal buffer and then the underlying writer.
    pub async fn flush(&mut self) -> io::Result<()> {
        while !self.core.put_finish() {
            self.flush_buf().await?;
        }
        self.flush_buf().await?;
        self.wtr.flush().await
    }

    async fn flush_buf(&mut self) -> io::Result<()> {
        self.wtr.write_all(self.core.buffered()).await?;
        self.core.clear_buffer();
        Ok(())
    }

    /// The number of records ended so far.
    pub fn records_written(&self) -> u64 {
        self.core.records_written()
    }

    /// Return a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.wtr
    }

    /// Flush the internal buffer and return the underlying writer.
    pub async fn into_inner(
        mut self,
    ) -> result::Result<W, IntoInnerError<AsyncWriter<W>>> {
        match self.flush().await {
            Ok(()) => Ok(self.wtr),
            Err(err) => Err(IntoInnerError::new(self, err)),
        }
    }
}
