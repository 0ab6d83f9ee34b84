use std::borrow::Cow;
use std::fmt;
use std::io;
use std::str;
use std::sync::Arc;

use csv_stream_core::{
    borrowed, materialize, unescape_into, Dialect, DialectBuilder,
    DialectError, FieldSpan, IndexStore, Mode, RowSpan, Scan, Scanner,
    Terminator,
};

use crate::buffer::{SourceBuffer, DEFAULT_CAPACITY};
use crate::byte_record::{ByteRecord, Position};
use crate::cache::{
    Interning, SharedStringPool, StringPool, DEFAULT_MAX_INTERNED_LEN,
};
use crate::error::{BadDataError, Error, Result, Utf8Error};
use crate::string_record::StringRecord;

/// What a reader does when it reaches a row with a malformed field.
///
/// A field is malformed when it has a quote inside an unquoted field,
/// content after its closing quote or a quote that is never closed. The
/// field's value is still available: the raw text is taken as literally as
/// the mode allows.
#[derive(Clone)]
pub enum BadData {
    /// Report the row as an `Error::BadData`. This is the default.
    ///
    /// The reader stays on the malformed row, so the caller may inspect it
    /// and then keep reading.
    Error,
    /// Pass the row through as if nothing happened.
    Ignore,
    /// Call the given function with the details, then pass the row through.
    Callback(Arc<dyn Fn(&BadDataError) + Send + Sync>),
}

impl Default for BadData {
    fn default() -> BadData {
        BadData::Error
    }
}

impl fmt::Debug for BadData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BadData::Error => write!(f, "Error"),
            BadData::Ignore => write!(f, "Ignore"),
            BadData::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record terminator
/// and more. Once a CSV `Reader` is built, its configuration cannot be
/// changed.
#[derive(Debug)]
pub struct ReaderBuilder {
    dialect: DialectBuilder,
    dialect_err: Option<DialectError>,
    capacity: usize,
    bad_data: BadData,
    missing_field_ok: bool,
    interning: Interning,
    max_interned_len: usize,
    track_chars: bool,
    count_skipped_rows: bool,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            dialect: DialectBuilder::new(),
            dialect_err: None,
            capacity: DEFAULT_CAPACITY,
            bad_data: BadData::default(),
            missing_field_ok: false,
            interning: Interning::default(),
            max_interned_len: DEFAULT_MAX_INTERNED_LEN,
            track_chars: false,
            count_skipped_rows: false,
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::ReaderBuilder;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "\
    /// city;country;pop
    /// Boston;United States;4628910
    /// ";
    ///     let mut rdr = ReaderBuilder::new()
    ///         .delimiter(b';')
    ///         .from_reader(data.as_bytes())?;
    ///
    ///     assert!(rdr.move_next()?);
    ///     assert!(rdr.move_next()?);
    ///     let row = rdr.current_row().unwrap();
    ///     assert_eq!(row.field(1)?, "United States");
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV reader from this configuration that reads data from
    /// `rdr`.
    ///
    /// Note that the CSV reader is buffered automatically, so you should not
    /// wrap `rdr` in a buffered reader like `io::BufReader`.
    ///
    /// This returns an `Error::Dialect` if the configured delimiter, quote,
    /// escape, comment and terminator are inconsistent.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Result<Reader<R>> {
        let dialect = self.dialect()?;
        Ok(Reader { core: ReaderCore::new(self, dialect), rdr })
    }

    /// Validate and return the configured dialect.
    pub fn dialect(&self) -> Result<Dialect> {
        if let Some(ref err) = self.dialect_err {
            return Err(Error::Dialect(err.clone()));
        }
        Ok(self.dialect.build()?)
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.dialect.delimiter(delimiter);
        self
    }

    /// A field delimiter of one or more bytes, e.g., `"||"`.
    ///
    /// When only a prefix of the delimiter is found, those bytes are field
    /// content.
    pub fn delimiter_str(&mut self, delimiter: &str) -> &mut ReaderBuilder {
        self.dialect.delimiter_bytes(delimiter);
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.dialect.quote(quote);
        self
    }

    /// The escape character to use when parsing CSV.
    ///
    /// In RFC 4180 mode the default, which is equal to the quote, means
    /// that quotes are escaped by doubling them. In escape mode this byte
    /// makes the byte after it literal.
    pub fn escape(&mut self, escape: u8) -> &mut ReaderBuilder {
        self.dialect.escape(escape);
        self
    }

    /// The scanning mode.
    ///
    /// The default is `Mode::Rfc4180`.
    pub fn mode(&mut self, mode: Mode) -> &mut ReaderBuilder {
        self.dialect.mode(mode);
        self
    }

    /// The comment character to use when parsing CSV.
    ///
    /// This has no effect unless `allow_comments` is enabled. The default is
    /// `b'#'`.
    pub fn comment(&mut self, comment: u8) -> &mut ReaderBuilder {
        self.dialect.comment(comment);
        self
    }

    /// Whether lines beginning with the comment character are skipped.
    ///
    /// This is disabled by default.
    pub fn allow_comments(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.dialect.allow_comments(yes);
        self
    }

    /// Whether blank lines are skipped.
    ///
    /// When disabled, a blank line is read as a row with one empty field.
    /// This is enabled by default.
    pub fn ignore_blank_lines(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.dialect.ignore_blank_lines(yes);
        self
    }

    /// Whether leading and trailing spaces and tabs are trimmed from
    /// fields.
    pub fn trim(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.dialect.trim(yes);
        self
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// The default is `Terminator::CRLF`, which treats `\r`, `\n` or `\r\n`
    /// as a single record terminator.
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.dialect.terminator(term);
        self
    }

    /// An explicit record terminator of one or more bytes.
    ///
    /// Unlike `Terminator::CRLF`, `"\r\n"` given here matches only that
    /// exact sequence.
    pub fn terminator_str(&mut self, term: &str) -> &mut ReaderBuilder {
        if let Err(err) = self.dialect.terminator_bytes(term) {
            self.dialect_err = Some(err);
        }
        self
    }

    /// A convenience method for specifying a configuration to read ASCII
    /// delimited text.
    ///
    /// This sets the delimiter and record terminator to the ASCII unit
    /// separator (`\x1F`) and record separator (`\x1E`), respectively.
    pub fn ascii(&mut self) -> &mut ReaderBuilder {
        self.dialect.ascii();
        self
    }

    /// Set the capacity (in bytes) of the initial buffer used in the CSV
    /// reader.
    ///
    /// The buffer doubles whenever a single row does not fit, so this is a
    /// starting point rather than a limit.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }

    /// What to do when a row contains a malformed field.
    pub fn bad_data(&mut self, policy: BadData) -> &mut ReaderBuilder {
        self.bad_data = policy;
        self
    }

    /// Call `f` for every row with a malformed field and keep reading.
    pub fn on_bad_data<F>(&mut self, f: F) -> &mut ReaderBuilder
    where
        F: Fn(&BadDataError) + Send + Sync + 'static,
    {
        self.bad_data = BadData::Callback(Arc::new(f));
        self
    }

    /// Whether asking for a field past the end of a row returns an empty
    /// value instead of `Error::MissingField`.
    pub fn missing_field_ok(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.missing_field_ok = yes;
        self
    }

    /// How values returned by `Reader::interned_field` are interned.
    pub fn interning(&mut self, interning: Interning) -> &mut ReaderBuilder {
        self.interning = interning;
        self
    }

    /// Values longer than this many bytes are never interned.
    ///
    /// The default is 64.
    pub fn max_interned_len(&mut self, len: usize) -> &mut ReaderBuilder {
        self.max_interned_len = len;
        self
    }

    /// Whether positions include an offset in Unicode scalar values.
    ///
    /// This requires looking at every byte once more and is disabled by
    /// default.
    pub fn track_chars(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.track_chars = yes;
        self
    }

    /// Whether skipped comment and blank lines count towards the record
    /// numbers reported in positions.
    ///
    /// This is disabled by default.
    pub fn count_skipped_rows(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.count_skipped_rows = yes;
        self
    }
}

/// The outcome of trying to produce the next row without doing I/O.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Step {
    Row,
    NeedInput,
    End,
}

#[derive(Debug)]
enum Pool {
    Off,
    Local(StringPool),
    Shared(Arc<SharedStringPool>),
}

/// Everything a reader does except reading from its source.
///
/// The synchronous and asynchronous readers both drive this by calling
/// `advance` and, whenever it asks for input, reading into `spare` and
/// committing with `filled`.
#[derive(Debug)]
pub(crate) struct ReaderCore {
    dialect: Dialect,
    scanner: Scanner,
    store: IndexStore,
    buf: SourceBuffer,
    current: Option<RowSpan>,
    pos: Position,
    rows: u64,
    done: bool,
    bad_data: BadData,
    missing_field_ok: bool,
    pool: Pool,
    max_interned_len: usize,
    scratch: Vec<u8>,
    track_chars: bool,
    count_skipped_rows: bool,
    chars: u64,
    chars_byte: u64,
}

impl ReaderCore {
    pub(crate) fn new(builder: &ReaderBuilder, dialect: Dialect) -> ReaderCore {
        let pool = match builder.interning {
            Interning::None => Pool::Off,
            Interning::PerColumn => Pool::Local(StringPool::per_column()),
            Interning::Global => Pool::Local(StringPool::global()),
            Interning::Shared(ref pool) => Pool::Shared(Arc::clone(pool)),
        };
        ReaderCore {
            dialect,
            scanner: Scanner::new(&dialect),
            store: IndexStore::new(),
            buf: SourceBuffer::new(builder.capacity),
            current: None,
            pos: Position::new(),
            rows: 0,
            done: false,
            bad_data: builder.bad_data.clone(),
            missing_field_ok: builder.missing_field_ok,
            pool,
            max_interned_len: builder.max_interned_len,
            scratch: vec![],
            track_chars: builder.track_chars,
            count_skipped_rows: builder.count_skipped_rows,
            chars: 0,
            chars_byte: 0,
        }
    }

    /// Move to the next row if one can be produced from buffered data.
    ///
    /// When this returns an error for a malformed row, the reader is
    /// positioned on that row.
    pub(crate) fn advance(&mut self) -> Result<Step> {
        self.current = None;
        loop {
            if let Some(row) = self.store.advance_row() {
                self.set_current(row);
                self.check_bad_data(&row)?;
                return Ok(Step::Row);
            }
            if self.done {
                return Ok(Step::End);
            }
            self.store.carry_over(0);
            let scan = self.scanner.scan(
                self.buf.data(),
                self.buf.is_eof(),
                &mut self.store,
            );
            match scan {
                Scan::Rows(n) => {
                    log::trace!("scanned {} rows", n);
                }
                Scan::Done => {
                    self.finish();
                    return Ok(Step::End);
                }
                Scan::NeedInput => {
                    self.make_room();
                    return Ok(Step::NeedInput);
                }
            }
        }
    }

    /// The buffer space the next read should go into.
    pub(crate) fn spare(&mut self) -> &mut [u8] {
        self.buf.spare()
    }

    /// Commit `n` bytes read into `spare`. Zero means end of stream.
    pub(crate) fn filled(&mut self, n: usize) {
        log::trace!(
            "read {} bytes at stream offset {}",
            n,
            self.buf.offset() + self.buf.data().len() as u64
        );
        self.buf.fill(n);
    }

    fn make_room(&mut self) {
        let keep = self.scanner.keep_from();
        if keep > 0 {
            if self.track_chars {
                self.count_chars_to(keep);
            }
            let shift = self.buf.compact(keep);
            self.scanner.rebase(shift);
            self.store.carry_over(shift);
        }
        if self.buf.spare_len() == 0 {
            self.buf.grow();
        }
    }

    fn finish(&mut self) {
        self.done = true;
        let end = self.buf.data().len();
        if self.track_chars {
            self.count_chars_to(end);
        }
        self.pos
            .set_byte(self.buf.offset() + end as u64)
            .set_line(self.scanner.line())
            .set_record(self.rows);
        if self.track_chars {
            self.pos.set_char(Some(self.chars));
        }
    }

    fn set_current(&mut self, row: RowSpan) {
        self.current = Some(row);
        let mut record = self.rows;
        if self.count_skipped_rows {
            record += row.skipped;
        }
        self.rows += 1;
        self.pos
            .set_byte(self.buf.offset() + row.start as u64)
            .set_line(row.line)
            .set_record(record);
        if self.track_chars {
            self.count_chars_to(row.start);
            self.pos.set_char(Some(self.chars));
        }
    }

    fn count_chars_to(&mut self, end: usize) {
        let offset = self.buf.offset();
        let start = self.chars_byte.saturating_sub(offset) as usize;
        if end <= start {
            return;
        }
        self.chars += self.buf.data()[start..end]
            .iter()
            .filter(|&&b| b & 0xC0 != 0x80)
            .count() as u64;
        self.chars_byte = offset + end as u64;
    }

    fn check_bad_data(&self, row: &RowSpan) -> Result<()> {
        if !row.bad {
            return Ok(());
        }
        if let BadData::Ignore = self.bad_data {
            log::debug!(
                "passing through malformed record {} at line {}",
                self.pos.record(),
                self.pos.line()
            );
            return Ok(());
        }
        let data = self.buf.data();
        let fields = self.store.row_fields(row);
        let (index, field) = match fields.iter().enumerate().find(|(_, f)| f.is_bad())
        {
            Some((i, f)) => (i, *f),
            None => return Ok(()),
        };
        let err = BadDataError::new(
            self.pos.clone(),
            index,
            &data[row.start..row.end],
            field.slice(data),
        );
        match self.bad_data {
            BadData::Error => Err(Error::BadData(err)),
            BadData::Callback(ref f) => {
                log::debug!("reporting malformed record: {}", err);
                f(&err);
                Ok(())
            }
            BadData::Ignore => Ok(()),
        }
    }

    pub(crate) fn position(&self) -> &Position {
        &self.pos
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done && self.store.pending_rows() == 0
    }

    pub(crate) fn current_row(&self) -> Option<Row<'_>> {
        let row = self.current?;
        Some(Row {
            buf: self.buf.data(),
            row,
            fields: self.store.row_fields(&row),
            dialect: &self.dialect,
            pos: &self.pos,
            missing_field_ok: self.missing_field_ok,
        })
    }

    fn missing_field(&self, index: usize) -> Error {
        Error::MissingField { pos: self.pos.clone(), index }
    }

    pub(crate) fn interned_field(&mut self, i: usize) -> Result<Arc<str>> {
        let row = match self.current {
            Some(row) => row,
            None => return Err(self.missing_field(i)),
        };
        let field: FieldSpan = match self.store.row_fields(&row).get(i) {
            Some(field) => *field,
            None if self.missing_field_ok => FieldSpan::default(),
            None => return Err(self.missing_field(i)),
        };
        let raw = field.slice(self.buf.data());
        let bytes = match borrowed(raw, field.flags, &self.dialect) {
            Some(bytes) => bytes,
            None => {
                self.scratch.clear();
                unescape_into(raw, field.flags, &self.dialect, &mut self.scratch);
                &self.scratch[..]
            }
        };
        let value = match str::from_utf8(bytes) {
            Ok(value) => value,
            Err(err) => {
                return Err(Error::Utf8 {
                    pos: Some(self.pos.clone()),
                    err: Utf8Error::new(i, err.valid_up_to()),
                })
            }
        };
        if value.len() > self.max_interned_len {
            return Ok(Arc::from(value));
        }
        Ok(match self.pool {
            Pool::Off => Arc::from(value),
            Pool::Local(ref mut pool) => pool.intern(i, value),
            Pool::Shared(ref pool) => pool.intern(value),
        })
    }

    /// Copy the current row into `record`.
    pub(crate) fn copy_byte_record(&self, record: &mut ByteRecord) {
        record.clear();
        if let Some(row) = self.current_row() {
            for field in row.fields {
                let raw = field.slice(row.buf);
                record.push_field_with(|out| {
                    unescape_into(raw, field.flags, row.dialect, out)
                });
            }
            record.set_position(Some(self.pos.clone()));
        }
    }

    pub(crate) fn copy_string_record(
        &self,
        record: &mut StringRecord,
    ) -> Result<()> {
        self.copy_byte_record(record.as_byte_record_mut());
        record.validate_or_clear().map_err(|err| Error::Utf8 {
            pos: Some(self.pos.clone()),
            err,
        })
    }
}

/// A streaming CSV reader.
///
/// The reader scans ahead through an internal buffer, indexing the fields
/// and rows it finds, and hands rows out one at a time. Field values are
/// only materialized when asked for, and a field without quotes or escapes
/// is returned as a slice of the buffer without copying.
///
/// The reader is buffered automatically; do not wrap `rdr` in an
/// `io::BufReader`.
///
/// # Example
///
/// ```
/// use std::error::Error;
/// use csv_stream::Reader;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn Error>> {
///     let data = "a,b,\"c,d\",e\n";
///     let mut rdr = Reader::from_reader(data.as_bytes());
///     while rdr.move_next()? {
///         let row = rdr.current_row().unwrap();
///         assert_eq!(row.len(), 4);
///         assert_eq!(row.field(2)?, "c,d");
///         assert_eq!(row.raw_record(), b"a,b,\"c,d\",e");
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    core: ReaderCore,
    rdr: R,
}

impl<R: io::Read> Reader<R> {
    /// Create a new CSV reader with a default configuration for the given
    /// `io::Read` value.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        let builder = ReaderBuilder::new();
        Reader { core: ReaderCore::new(&builder, Dialect::default()), rdr }
    }

    /// Advance to the next row.
    ///
    /// This returns `false` once the end of the data has been reached.
    ///
    /// If the next row contains a malformed field and the bad data policy
    /// is `BadData::Error`, this returns the error but still moves to that
    /// row. Calling `move_next` again continues with the row after it.
    pub fn move_next(&mut self) -> Result<bool> {
        loop {
            match self.core.advance()? {
                Step::Row => return Ok(true),
                Step::End => return Ok(false),
                Step::NeedInput => self.fill_buf()?,
            }
        }
    }

    fn fill_buf(&mut self) -> io::Result<()> {
        let n = loop {
            match self.rdr.read(self.core.spare()) {
                Ok(n) => break n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        };
        self.core.filled(n);
        Ok(())
    }

    /// The row the reader is positioned on.
    ///
    /// This is `None` before the first call to `move_next` and after the
    /// end of the data.
    pub fn current_row(&self) -> Option<Row<'_>> {
        self.core.current_row()
    }

    /// Return the value of field `i` of the current row as an `Arc<str>`,
    /// interned according to the reader's `Interning` setting.
    ///
    /// This returns `Error::MissingField` when there is no current row.
    pub fn interned_field(&mut self, i: usize) -> Result<Arc<str>> {
        self.core.interned_field(i)
    }

    /// Read a single row into the given byte record.
    ///
    /// Returns `false` when no more records could be read.
    pub fn read_byte_record(&mut self, record: &mut ByteRecord) -> Result<bool> {
        if !self.move_next()? {
            record.clear();
            return Ok(false);
        }
        self.core.copy_byte_record(record);
        Ok(true)
    }

    /// Read a single row into the given string record.
    ///
    /// Returns `false` when no more records could be read. If the row is
    /// not valid UTF-8, an error is returned and the record is cleared.
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        if !self.move_next()? {
            record.clear();
            return Ok(false);
        }
        self.core.copy_string_record(record)?;
        Ok(true)
    }

    /// Returns a borrowed iterator over all records as strings.
    pub fn records(&mut self) -> StringRecordsIter<R> {
        StringRecordsIter { rdr: self, done: false }
    }

    /// Returns a borrowed iterator over all records as raw bytes.
    pub fn byte_records(&mut self) -> ByteRecordsIter<R> {
        ByteRecordsIter { rdr: self, done: false }
    }
}

impl<R> Reader<R> {
    /// The position of the current row, or of the end of the data once it
    /// has been reached.
    pub fn position(&self) -> &Position {
        self.core.position()
    }

    /// Returns true once every row has been read.
    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }

    /// Return a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Unwrap this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr
    }
}

/// A view of the row a reader is positioned on.
///
/// A row borrows the reader's buffer, so the borrow checker prevents it
/// from outliving the next call to `move_next`.
#[derive(Clone, Copy)]
pub struct Row<'r> {
    buf: &'r [u8],
    row: RowSpan,
    fields: &'r [FieldSpan],
    dialect: &'r Dialect,
    pos: &'r Position,
    missing_field_ok: bool,
}

impl<'r> fmt::Debug for Row<'r> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use bstr::ByteSlice;

        let fields: Vec<_> = (0..self.len())
            .filter_map(|i| self.field_bytes(i))
            .collect();
        let fields: Vec<&bstr::BStr> = fields.iter().map(|f| f.as_bstr()).collect();
        f.debug_struct("Row")
            .field("position", self.pos)
            .field("fields", &fields)
            .finish()
    }
}

impl<'r> Row<'r> {
    /// The number of fields in this row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if this row has no fields.
    ///
    /// Every row read has at least one field, so this is always false for
    /// rows returned by a reader.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The position of this row.
    pub fn position(&self) -> &'r Position {
        self.pos
    }

    /// The unprocessed bytes of this row, including quotes and delimiters
    /// but excluding the record terminator.
    pub fn raw_record(&self) -> &'r [u8] {
        &self.buf[self.row.start..self.row.end]
    }

    /// The unprocessed bytes of field `i`.
    pub fn raw_field(&self, i: usize) -> Option<&'r [u8]> {
        self.fields.get(i).map(|f| f.slice(self.buf))
    }

    /// Returns true if field `i` exists and is malformed.
    pub fn is_bad(&self, i: usize) -> bool {
        self.fields.get(i).map_or(false, |f| f.is_bad())
    }

    /// Returns true if any field of this row is malformed.
    pub fn has_bad_data(&self) -> bool {
        self.row.bad
    }

    /// The value of field `i` as raw bytes.
    ///
    /// Fields without quotes or escapes are borrowed from the reader's
    /// buffer.
    pub fn field_bytes(&self, i: usize) -> Option<Cow<'r, [u8]>> {
        let field = self.fields.get(i)?;
        Some(materialize(field.slice(self.buf), field.flags, self.dialect))
    }

    /// The value of field `i`.
    ///
    /// Asking for a field past the end of the row is an
    /// `Error::MissingField`, unless the reader was built with
    /// `missing_field_ok`, in which case the value is empty.
    pub fn field(&self, i: usize) -> Result<Cow<'r, str>> {
        let bytes = match self.field_bytes(i) {
            Some(bytes) => bytes,
            None if self.missing_field_ok => return Ok(Cow::Borrowed("")),
            None => {
                return Err(Error::MissingField {
                    pos: self.pos.clone(),
                    index: i,
                })
            }
        };
        let utf8_err = |valid_up_to| Error::Utf8 {
            pos: Some(self.pos.clone()),
            err: Utf8Error::new(i, valid_up_to),
        };
        match bytes {
            Cow::Borrowed(bytes) => str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| utf8_err(e.valid_up_to())),
            Cow::Owned(bytes) => String::from_utf8(bytes)
                .map(Cow::Owned)
                .map_err(|e| utf8_err(e.utf8_error().valid_up_to())),
        }
    }

    /// An iterator over the values of all fields in this row.
    pub fn iter(&self) -> RowIter<'r> {
        RowIter { row: *self, i: 0 }
    }
}

impl<'r> IntoIterator for Row<'r> {
    type IntoIter = RowIter<'r>;
    type Item = Result<Cow<'r, str>>;

    fn into_iter(self) -> RowIter<'r> {
        self.iter()
    }
}

/// An iterator over the field values of a `Row`.
#[derive(Clone)]
pub struct RowIter<'r> {
    row: Row<'r>,
    i: usize,
}

impl<'r> Iterator for RowIter<'r> {
    type Item = Result<Cow<'r, str>>;

    fn next(&mut self) -> Option<Result<Cow<'r, str>>> {
        if self.i >= self.row.len() {
            return None;
        }
        let value = self.row.field(self.i);
        self.i += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.row.len() - self.i;
        (n, Some(n))
    }
}

/// A borrowed iterator over records as strings.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct StringRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    done: bool,
}

impl<'r, R: io::Read> Iterator for StringRecordsIter<'r, R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        if self.done {
            return None;
        }
        let mut rec = StringRecord::new();
        match self.rdr.read_record(&mut rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(rec)),
            Ok(false) => {
                self.done = true;
                None
            }
        }
    }
}

/// A borrowed iterator over records as raw bytes.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct ByteRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    done: bool,
}

impl<'r, R: io::Read> Iterator for ByteRecordsIter<'r, R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        if self.done {
            return None;
        }
        let mut rec = ByteRecord::new();
        match self.rdr.read_byte_record(&mut rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(rec)),
            Ok(false) => {
                self.done = true;
                None
            }
        }
    }
}
