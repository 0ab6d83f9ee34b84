use std::error;
use std::fmt;
use std::io;
use std::result;

use bstr::ByteSlice;
use csv_stream_core::DialectError;

use crate::byte_record::{ByteRecord, Position};

/// A type alias for `Result<T, csv_stream::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing CSV data.
///
/// This error can happen when writing or reading CSV data.
///
/// Note that there are some important scenarios where an error is impossible
/// to occur. For example, if a CSV reader is used on an in-memory buffer with
/// bad data tolerated and one is reading records as raw byte strings, then no
/// error can occur.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing CSV data.
    Io(io::Error),
    /// A UTF-8 decoding error that occured while reading CSV data into Rust
    /// `String`s.
    Utf8 {
        /// The position of the record in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The corresponding UTF-8 error.
        err: Utf8Error,
    },
    /// A record with a malformed field was found while the reader was
    /// configured to report bad data as an error.
    BadData(BadDataError),
    /// A field was requested by index, but the record has fewer fields.
    MissingField {
        /// The position of the record.
        pos: Position,
        /// The index that was requested.
        index: usize,
    },
    /// The dialect given to a reader or writer is inconsistent.
    Dialect(DialectError),
    /// A field that could be interpreted as a formula by a spreadsheet was
    /// written while injection protection was set to reject such fields.
    Injection {
        /// The zero-based index of the record being written.
        record: u64,
        /// The zero-based index of the field within the record.
        field: usize,
        /// The offending leading byte.
        byte: u8,
        /// The field as given.
        value: Vec<u8>,
    },
}

impl Error {
    /// Returns true if this is an I/O error.
    ///
    /// If this is true, the underlying reader or writer may be in an
    /// unspecified state. Every other error leaves it usable.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Return the position for this error, if one exists.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::Utf8 { ref pos, .. } => pos.as_ref(),
            Error::BadData(ref err) => Some(err.position()),
            Error::MissingField { ref pos, .. } => Some(pos),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<DialectError> for Error {
    fn from(err: DialectError) -> Error {
        Error::Dialect(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Utf8 { ref err, .. } => Some(err),
            Error::Dialect(ref err) => Some(err),
            Error::BadData(_)
            | Error::MissingField { .. }
            | Error::Injection { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Utf8 { pos: None, ref err } => {
                write!(f, "CSV parse error: field {}: {}", err.field(), err)
            }
            Error::Utf8 { pos: Some(ref pos), ref err } => write!(
                f,
                "CSV parse error: record {} \
                 (byte {}, line {}, field: {}): {}",
                pos.record(),
                pos.byte(),
                pos.line(),
                err.field(),
                err
            ),
            Error::BadData(ref err) => err.fmt(f),
            Error::MissingField { ref pos, index } => write!(
                f,
                "CSV error: record {} (byte {}, line {}): \
                 field {} does not exist",
                pos.record(),
                pos.byte(),
                pos.line(),
                index
            ),
            Error::Dialect(ref err) => err.fmt(f),
            Error::Injection { record, field, byte, ref value } => write!(
                f,
                "CSV write error: record {}, field {}: value {:?} starts \
                 with {:?}, which may be interpreted as a formula",
                record,
                field,
                value.as_bstr(),
                byte as char
            ),
        }
    }
}

/// Details about a malformed record.
///
/// A record is malformed when one of its fields has a quote in an unquoted
/// field, content after a closing quote or an unterminated quote.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BadDataError {
    pos: Position,
    field: usize,
    record: Vec<u8>,
    field_raw: Vec<u8>,
}

impl BadDataError {
    pub(crate) fn new(
        pos: Position,
        field: usize,
        record: &[u8],
        field_raw: &[u8],
    ) -> BadDataError {
        BadDataError {
            pos,
            field,
            record: record.to_vec(),
            field_raw: field_raw.to_vec(),
        }
    }

    /// The position of the malformed record.
    pub fn position(&self) -> &Position {
        &self.pos
    }

    /// The index of the first malformed field in the record.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The raw bytes of the whole record, excluding its terminator.
    pub fn raw_record(&self) -> &[u8] {
        &self.record
    }

    /// The raw bytes of the first malformed field.
    pub fn raw_field(&self) -> &[u8] {
        &self.field_raw
    }
}

impl fmt::Display for BadDataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CSV parse error: record {} (byte {}, line {}): \
             malformed field {}: {:?}",
            self.pos.record(),
            self.pos.byte(),
            self.pos.line(),
            self.field,
            self.field_raw.as_bstr()
        )
    }
}

impl error::Error for BadDataError {}

/// A UTF-8 validation error that occurs when attempting to convert a
/// `ByteRecord` into a `StringRecord`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FromUtf8Error {
    record: ByteRecord,
    err: Utf8Error,
}

impl FromUtf8Error {
    pub(crate) fn new(rec: ByteRecord, err: Utf8Error) -> FromUtf8Error {
        FromUtf8Error { record: rec, err }
    }

    /// Access the underlying `ByteRecord` that failed UTF-8 validation.
    pub fn into_byte_record(self) -> ByteRecord {
        self.record
    }

    /// Access the underlying UTF-8 validation error.
    pub fn utf8_error(&self) -> &Utf8Error {
        &self.err
    }
}

impl fmt::Display for FromUtf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl error::Error for FromUtf8Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

/// A UTF-8 validation error.
///
/// The error includes the index of the field that failed validation, and the
/// last byte at which valid UTF-8 was verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utf8Error {
    /// The field index of a byte record in which UTF-8 validation failed.
    field: usize,
    /// The index into the given field up to which valid UTF-8 was verified.
    valid_up_to: usize,
}

impl Utf8Error {
    pub(crate) fn new(field: usize, valid_up_to: usize) -> Utf8Error {
        Utf8Error { field, valid_up_to }
    }

    /// The field index of a byte record in which UTF-8 validation failed.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The index into the given field up to which valid UTF-8 was verified.
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

impl fmt::Display for Utf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid utf-8: invalid UTF-8 in field {} near byte index {}",
            self.field, self.valid_up_to
        )
    }
}

impl error::Error for Utf8Error {}

/// `IntoInnerError` occurs when consuming a `Writer` fails.
///
/// Consuming the `Writer` causes a flush to happen. If the flush fails, then
/// this error is returned, which contains both the original `Writer` and
/// the error that occurred.
///
/// The type parameter `W` is the unconsumed writer.
pub struct IntoInnerError<W> {
    wtr: W,
    err: io::Error,
}

impl<W> IntoInnerError<W> {
    pub(crate) fn new(wtr: W, err: io::Error) -> IntoInnerError<W> {
        IntoInnerError { wtr, err }
    }

    /// Returns the error which caused the call to `into_inner` to fail.
    ///
    /// This error was returned when attempting to flush the internal buffer.
    pub fn error(&self) -> &io::Error {
        &self.err
    }

    /// Returns the underlying writer which generated the error.
    ///
    /// The returned value can be used for error recovery, such as
    /// re-inspecting the buffer.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W: std::any::Any> error::Error for IntoInnerError<W> {}

impl<W> fmt::Display for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl<W> fmt::Debug for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.err.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use csv_stream_core::DialectError;

    use super::{BadDataError, Error, Utf8Error};
    use crate::byte_record::Position;

    #[test]
    fn bad_data_display_shows_raw_field() {
        let mut pos = Position::new();
        pos.set_byte(10).set_line(2).set_record(1);
        let err = Error::BadData(BadDataError::new(pos, 1, b"a,b\"c", b"b\"c"));
        let msg = err.to_string();
        assert!(msg.contains("record 1"), "{}", msg);
        assert!(msg.contains("line 2"), "{}", msg);
        assert!(msg.contains("b\\\"c"), "{}", msg);
        assert_eq!(err.position().map(|p| p.byte()), Some(10));
    }

    #[test]
    fn dialect_error_has_source() {
        let err = Error::from(DialectError::EmptyDelimiter);
        assert!(err.source().is_some());
        assert!(!err.is_io_error());
    }

    #[test]
    fn utf8_display() {
        let err = Error::Utf8 { pos: None, err: Utf8Error::new(2, 5) };
        assert_eq!(
            err.to_string(),
            "CSV parse error: field 2: invalid utf-8: invalid UTF-8 in \
             field 2 near byte index 5"
        );
    }

    #[test]
    fn injection_display() {
        let err = Error::Injection {
            record: 0,
            field: 3,
            byte: b'=',
            value: b"=SUM(A1)".to_vec(),
        };
        let msg = err.to_string();
        assert!(msg.contains("field 3"), "{}", msg);
        assert!(msg.contains("=SUM(A1)"), "{}", msg);
    }
}
