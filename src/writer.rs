use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::result;
use std::sync::Arc;

use csv_stream_core::{
    Dialect, DialectBuilder, DialectError, Mode, QuoteStyle, Terminator,
    WriteResult, Writer as CoreWriter,
};

use crate::buffer::{OutputBuffer, DEFAULT_CAPACITY};
use crate::byte_record::ByteRecord;
use crate::error::{Error, IntoInnerError, Result};
use crate::string_record::StringRecord;

/// What a writer does with fields that a spreadsheet could evaluate as a
/// formula.
///
/// A field is suspicious when its first byte, or its second byte when the
/// first is the quote, is one of the writer's `injection_chars`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Injection {
    /// Write fields as given. This is the default.
    None,
    /// Refuse to write the field with an `Error::Injection`.
    Error,
    /// Prefix the field with the `injection_escape` marker, so that
    /// spreadsheets show it as text. In RFC 4180 mode the field is quoted.
    Escape,
    /// Remove the leading suspicious bytes.
    Strip,
}

impl Default for Injection {
    fn default() -> Injection {
        Injection::None
    }
}

/// The characters that start a formula in common spreadsheet software.
const DEFAULT_INJECTION_CHARS: &[u8] = b"=@+-\t\r";

/// Everything a custom quoting predicate gets to look at.
#[derive(Clone, Copy, Debug)]
pub struct FieldContext<'a> {
    field: &'a [u8],
    type_name: Option<&'static str>,
    record: u64,
    index: usize,
    dialect: &'a Dialect,
}

impl<'a> FieldContext<'a> {
    /// The field as it is about to be written, before quoting.
    pub fn field(&self) -> &'a [u8] {
        self.field
    }

    /// The declared type of the value, when the field was written with
    /// `write_field_as`, `write_integer` or `write_float`.
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }

    /// The zero-based index of the record being written.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// The zero-based index of the field within its record.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The dialect being written.
    pub fn dialect(&self) -> &'a Dialect {
        self.dialect
    }
}

type QuoteIf = Arc<dyn Fn(&FieldContext<'_>) -> bool + Send + Sync>;

/// Builds a CSV writer with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record terminator
/// and more. Once a CSV `Writer` is built, its configuration cannot be
/// changed.
pub struct WriterBuilder {
    dialect: DialectBuilder,
    dialect_err: Option<DialectError>,
    style: QuoteStyle,
    injection: Injection,
    injection_chars: Vec<u8>,
    injection_escape: u8,
    quote_if: Option<QuoteIf>,
    capacity: usize,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        let mut dialect = DialectBuilder::new();
        dialect.terminator(Terminator::Any(b'\n'));
        WriterBuilder {
            dialect,
            dialect_err: None,
            style: QuoteStyle::default(),
            injection: Injection::default(),
            injection_chars: DEFAULT_INJECTION_CHARS.to_vec(),
            injection_escape: b'\'',
            quote_if: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl fmt::Debug for WriterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WriterBuilder")
            .field("dialect", &self.dialect)
            .field("style", &self.style)
            .field("injection", &self.injection)
            .field("quote_if", &self.quote_if.is_some())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    ///
    /// To convert a builder into a writer, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::WriterBuilder;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = WriterBuilder::new().delimiter(b';').from_writer(vec![])?;
    ///     wtr.write_record(&["a;b", "c"])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "\"a;b\";c\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to `wtr`.
    ///
    /// Note that the CSV writer is buffered automatically, so you should not
    /// wrap `wtr` in a buffered writer like `io::BufWriter`.
    ///
    /// This returns an `Error::Dialect` if the configured delimiter, quote,
    /// escape, comment and terminator are inconsistent.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Result<Writer<W>> {
        let dialect = self.dialect()?;
        Ok(Writer::new(WriterCore::new(self, dialect), wtr))
    }

    /// Validate and return the configured dialect.
    pub fn dialect(&self) -> Result<Dialect> {
        if let Some(ref err) = self.dialect_err {
            return Err(Error::Dialect(err.clone()));
        }
        Ok(self.dialect.build()?)
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut WriterBuilder {
        self.dialect.delimiter(delimiter);
        self
    }

    /// A field delimiter of one or more bytes, e.g., `"||"`.
    pub fn delimiter_str(&mut self, delimiter: &str) -> &mut WriterBuilder {
        self.dialect.delimiter_bytes(delimiter);
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.dialect.quote(quote);
        self
    }

    /// The escape character to use when writing CSV.
    ///
    /// In RFC 4180 mode, quotes are escaped by doubling them when this is
    /// equal to the quote (the default), and by prefixing them with this
    /// byte otherwise. In escape mode, every special byte is prefixed with
    /// it.
    pub fn escape(&mut self, escape: u8) -> &mut WriterBuilder {
        self.dialect.escape(escape);
        self
    }

    /// The quoting and escaping mode.
    pub fn mode(&mut self, mode: Mode) -> &mut WriterBuilder {
        self.dialect.mode(mode);
        self
    }

    /// The comment character of the readers this output is meant for.
    ///
    /// When comments are allowed, a record whose first field starts with
    /// this byte has that field quoted or escaped.
    pub fn comment(&mut self, comment: u8) -> &mut WriterBuilder {
        self.dialect.comment(comment);
        self
    }

    /// Whether the output will be read with comments enabled.
    pub fn allow_comments(&mut self, yes: bool) -> &mut WriterBuilder {
        self.dialect.allow_comments(yes);
        self
    }

    /// Whether the output will be read with trimming enabled, in which case
    /// fields with leading or trailing blanks are quoted.
    pub fn trim(&mut self, yes: bool) -> &mut WriterBuilder {
        self.dialect.trim(yes);
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// The default is `Terminator::Any(b'\n')`. `Terminator::CRLF` writes
    /// `\r\n`.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.dialect.terminator(term);
        self
    }

    /// An explicit record terminator of one or more bytes.
    pub fn terminator_str(&mut self, term: &str) -> &mut WriterBuilder {
        if let Err(err) = self.dialect.terminator_bytes(term) {
            self.dialect_err = Some(err);
        }
        self
    }

    /// A convenience method for specifying a configuration to write ASCII
    /// delimited text.
    ///
    /// This sets the delimiter and record terminator to the ASCII unit
    /// separator (`\x1F`) and record separator (`\x1E`), respectively.
    pub fn ascii(&mut self) -> &mut WriterBuilder {
        self.dialect.ascii();
        self
    }

    /// The quoting style to use when writing CSV.
    ///
    /// By default, this is set to `QuoteStyle::Necessary`, which will only
    /// use quotes when they are necessary to preserve the integrity of data.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut WriterBuilder {
        self.style = style;
        self
    }

    /// Decide whether each field is quoted with a custom predicate instead
    /// of the quoting style.
    ///
    /// The predicate only matters in RFC 4180 mode. Note that a predicate
    /// that declines to quote a field containing a delimiter produces data
    /// that cannot be read back.
    pub fn quote_if<F>(&mut self, predicate: F) -> &mut WriterBuilder
    where
        F: Fn(&FieldContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.quote_if = Some(Arc::new(predicate));
        self
    }

    /// What to do with fields that could be evaluated as a formula.
    pub fn injection(&mut self, policy: Injection) -> &mut WriterBuilder {
        self.injection = policy;
        self
    }

    /// The bytes that make a field suspicious.
    ///
    /// The default is `=`, `@`, `+`, `-`, tab and carriage return.
    pub fn injection_chars(&mut self, chars: &[u8]) -> &mut WriterBuilder {
        self.injection_chars = chars.to_vec();
        self
    }

    /// The marker prepended by `Injection::Escape`.
    ///
    /// The default is `b'\''`.
    pub fn injection_escape(&mut self, marker: u8) -> &mut WriterBuilder {
        self.injection_escape = marker;
        self
    }

    /// Set the capacity (in bytes) of the internal buffer used in the CSV
    /// writer.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = capacity;
        self
    }
}

/// Everything a writer does except writing to its sink.
///
/// Field data is prepared (sanitized, quoting decided) up front, then
/// emitted into the output buffer piece by piece. Every `put_*` method
/// reports whether it finished; when it did not, the owner drains the
/// buffer to its sink and calls it again.
pub(crate) struct WriterCore {
    wtr: CoreWriter,
    buf: OutputBuffer,
    style: QuoteStyle,
    injection: Injection,
    dangerous: [bool; 256],
    marker: u8,
    quote_if: Option<QuoteIf>,
    record: u64,
    fields: usize,
}

impl fmt::Debug for WriterCore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WriterCore")
            .field("wtr", &self.wtr)
            .field("buffered", &self.buf.len())
            .field("record", &self.record)
            .field("fields", &self.fields)
            .finish()
    }
}

impl WriterCore {
    pub(crate) fn new(builder: &WriterBuilder, dialect: Dialect) -> WriterCore {
        let mut dangerous = [false; 256];
        for &b in &builder.injection_chars {
            dangerous[b as usize] = true;
        }
        WriterCore {
            wtr: CoreWriter::new(&dialect, builder.style),
            buf: OutputBuffer::new(builder.capacity),
            style: builder.style,
            injection: builder.injection,
            dangerous,
            marker: builder.injection_escape,
            quote_if: builder.quote_if.clone(),
            record: 0,
            fields: 0,
        }
    }

    /// A writer core with the default configuration.
    pub(crate) fn default_config() -> WriterCore {
        let dialect = Dialect::default()
            .with_terminator(Terminator::Any(b'\n'))
            .unwrap_or_default();
        WriterCore::new(&WriterBuilder::new(), dialect)
    }

    fn dialect(&self) -> &Dialect {
        self.wtr.dialect()
    }

    /// Apply the injection policy and decide whether to quote.
    ///
    /// Numbers skip the injection check: a leading `-` or `+` is a sign.
    pub(crate) fn prepare<'a>(
        &self,
        field: &'a [u8],
        type_name: Option<&'static str>,
        numeric: bool,
        force: bool,
    ) -> Result<(Cow<'a, [u8]>, bool)> {
        let mut value = Cow::Borrowed(field);
        let mut force = force;
        if !numeric && self.injection != Injection::None {
            if let Some(at) = self.injection_at(field) {
                match self.injection {
                    Injection::None => {}
                    Injection::Error => {
                        return Err(Error::Injection {
                            record: self.record,
                            field: self.fields,
                            byte: field[at],
                            value: field.to_vec(),
                        })
                    }
                    Injection::Escape => {
                        let mut escaped = Vec::with_capacity(field.len() + 1);
                        escaped.extend_from_slice(&field[..at]);
                        escaped.push(self.marker);
                        escaped.extend_from_slice(&field[at..]);
                        value = Cow::Owned(escaped);
                        force = true;
                    }
                    Injection::Strip => {
                        let end = field[at..]
                            .iter()
                            .position(|&b| !self.dangerous[b as usize])
                            .map_or(field.len(), |i| at + i);
                        let mut stripped = field[..at].to_vec();
                        stripped.extend_from_slice(&field[end..]);
                        value = Cow::Owned(stripped);
                    }
                }
                log::debug!(
                    "field {} of record {} starts with a formula character",
                    self.fields,
                    self.record
                );
            }
        }
        let quote = force
            || match self.quote_if {
                Some(ref predicate) => predicate(&FieldContext {
                    field: &*value,
                    type_name,
                    record: self.record,
                    index: self.fields,
                    dialect: self.dialect(),
                }),
                None => self.wtr.should_quote(&value),
            };
        Ok((value, quote))
    }

    fn injection_at(&self, field: &[u8]) -> Option<usize> {
        let at = match field.first() {
            Some(&b) if b == self.dialect().quote() => 1,
            _ => 0,
        };
        match field.get(at) {
            Some(&b) if self.dangerous[b as usize] => Some(at),
            _ => None,
        }
    }

    /// Returns true if the next field needs a delimiter before it.
    pub(crate) fn needs_delimiter(&self) -> bool {
        self.fields > 0
    }

    pub(crate) fn put_delimiter(&mut self) -> bool {
        let (res, n) = self.wtr.delimiter(self.buf.writable());
        self.buf.written(n);
        res == WriteResult::InputEmpty
    }

    pub(crate) fn begin_field(&mut self, quote: bool) {
        self.wtr.begin_field(quote);
    }

    /// Emit as much of `input` as fits, returning whether all of it did
    /// and how many bytes were consumed.
    pub(crate) fn put_field(&mut self, input: &[u8]) -> (bool, usize) {
        let (res, nin, nout) = self.wtr.field(input, self.buf.writable());
        self.buf.written(nout);
        (res == WriteResult::InputEmpty, nin)
    }

    pub(crate) fn end_field(&mut self) {
        self.fields += 1;
    }

    pub(crate) fn put_terminator(&mut self) -> bool {
        let (res, n) = self.wtr.terminator(self.buf.writable());
        self.buf.written(n);
        if res == WriteResult::InputEmpty {
            self.record += 1;
            self.fields = 0;
            true
        } else {
            false
        }
    }

    /// Close an open quoted field without ending the record.
    pub(crate) fn put_finish(&mut self) -> bool {
        let (res, n) = self.wtr.finish(self.buf.writable());
        self.buf.written(n);
        res == WriteResult::InputEmpty
    }

    pub(crate) fn buffered(&self) -> &[u8] {
        self.buf.readable()
    }

    pub(crate) fn clear_buffer(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn quote_style(&self) -> QuoteStyle {
        self.style
    }

    pub(crate) fn records_written(&self) -> u64 {
        self.record
    }
}

/// A CSV writer.
///
/// This writer provides a convenient interface for encoding CSV data. It
/// handles quoting and escaping for the configured dialect, and buffers
/// its output automatically.
///
/// Once the writer is dropped, its buffer is flushed. Errors from that
/// flush are ignored, so callers that care should call `flush` or
/// `into_inner` explicitly.
///
/// One slight deviation from RFC 4180 is that a record with a single empty
/// field is always written as `""`. This ensures that the record is not
/// skipped by readers that ignore blank lines.
///
/// # Example
///
/// ```
/// use std::error::Error;
/// use csv_stream::Writer;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn Error>> {
///     let mut wtr = Writer::from_writer(vec![]);
///     wtr.write_record(&["a,b", "plain", "has\"quote"])?;
///
///     let data = String::from_utf8(wtr.into_inner()?)?;
///     assert_eq!(data, "\"a,b\",plain,\"has\"\"quote\"\n");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Writer<W: io::Write> {
    core: WriterCore,
    wtr: Option<W>,
    // Set while the sink is being written to, so that a panic inside it
    // does not lead to a second write attempt on drop.
    panicked: bool,
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() && !self.panicked {
            let _ = self.flush();
        }
    }
}

impl<W: io::Write> Writer<W> {
    fn new(core: WriterCore, wtr: W) -> Writer<W> {
        Writer { core, wtr: Some(wtr), panicked: false }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// To customize CSV writing, use a `WriterBuilder`.
    pub fn from_writer(wtr: W) -> Writer<W> {
        Writer::new(WriterCore::default_config(), wtr)
    }

    /// Write a single field.
    ///
    /// A delimiter is written before every field except the first of a
    /// record. Call `next_record` to end the record.
    pub fn write_field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<()> {
        self.write_field_impl(field.as_ref(), None, false, false)
    }

    /// Write a single field, quoting it regardless of its contents when
    /// `force` is true.
    ///
    /// Quotes are only ever written in RFC 4180 mode.
    pub fn write_field_quoted<T: AsRef<[u8]>>(
        &mut self,
        field: T,
        force: bool,
    ) -> Result<()> {
        self.write_field_impl(field.as_ref(), None, false, force)
    }

    /// Write a single field whose value came from a `V`.
    ///
    /// The name of `V` is passed to the `quote_if` predicate, if any.
    pub fn write_field_as<V: ?Sized, T: AsRef<[u8]>>(
        &mut self,
        field: T,
    ) -> Result<()> {
        self.write_field_impl(field.as_ref(), Some(type_name::<V>()), false, false)
    }

    /// Write an integer as a single field.
    pub fn write_integer<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        let field = buf.format(n);
        self.write_field_impl(field.as_bytes(), Some(type_name::<I>()), true, false)
    }

    /// Write a floating point number as a single field.
    ///
    /// The shortest representation that reads back to the same value is
    /// used.
    pub fn write_float<F: ryu::Float>(&mut self, n: F) -> Result<()> {
        let mut buf = ryu::Buffer::new();
        let field = buf.format(n);
        self.write_field_impl(field.as_bytes(), Some(type_name::<F>()), true, false)
    }

    fn write_field_impl(
        &mut self,
        field: &[u8],
        type_name: Option<&'static str>,
        numeric: bool,
        force: bool,
    ) -> Result<()> {
        let (value, quote) = self.core.prepare(field, type_name, numeric, force)?;
        if self.core.needs_delimiter() {
            while !self.core.put_delimiter() {
                self.flush_buf()?;
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
            self.flush_buf()?;
        }
        self.core.end_field();
        Ok(())
    }

    /// Write a single record.
    ///
    /// This writes every field of `record` followed by a record terminator.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::Writer;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = Writer::from_writer(vec![]);
    ///     wtr.write_record(&["a", "b", "c"])?;
    ///     wtr.write_record(&["x", "y", "z"])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "a,b,c\nx,y,z\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for field in record.into_iter() {
            self.write_field(field)?;
        }
        self.next_record()
    }

    /// Write a single `ByteRecord`.
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> Result<()> {
        self.write_record(record.iter())
    }

    /// Write a single `StringRecord`.
    pub fn write_string_record(&mut self, record: &StringRecord) -> Result<()> {
        self.write_record(record.iter())
    }

    /// End the current record.
    ///
    /// Ending a record that has no fields writes a blank line.
    pub fn next_record(&mut self) -> Result<()> {
        while !self.core.put_terminator() {
            self.flush_buf()?;
        }
        Ok(())
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// and then flush the underlying writer.
    ///
    /// If a record has been started but not ended, its last field is closed
    /// first.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.core.put_finish() {
            self.flush_buf()?;
        }
        self.flush_buf()?;
        match self.wtr {
            Some(ref mut wtr) => wtr.flush(),
            None => Ok(()),
        }
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        let wtr = match self.wtr {
            Some(ref mut wtr) => wtr,
            None => return Ok(()),
        };
        self.panicked = true;
        let result = wtr.write_all(self.core.buffered());
        self.panicked = false;
        result?;
        self.core.clear_buffer();
        Ok(())
    }

    /// The quoting style of this writer.
    pub fn quote_style(&self) -> QuoteStyle {
        self.core.quote_style()
    }

    /// The number of records ended so far.
    pub fn records_written(&self) -> u64 {
        self.core.records_written()
    }

    /// Return a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        match self.wtr {
            Some(ref wtr) => wtr,
            // Only `into_inner` takes the writer, and it consumes `self`.
            None => unreachable!("writer used after into_inner"),
        }
    }

    /// Flush the contents of the internal buffer and return the underlying
    /// writer.
    pub fn into_inner(
        mut self,
    ) -> result::Result<W, IntoInnerError<Writer<W>>> {
        if let Err(err) = self.flush() {
            return Err(IntoInnerError::new(self, err));
        }
        match self.wtr.take() {
            Some(wtr) => Ok(wtr),
            None => Err(IntoInnerError::new(
                self,
                io::Error::new(io::ErrorKind::Other, "writer already taken"),
            )),
        }
    }
}
