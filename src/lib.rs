/*!
The `csv-stream` crate reads and writes CSV data of unbounded size in
bounded memory.

A [`Reader`] scans its input through a fixed window, indexing fields and
rows ahead of the caller, and hands out one [`Row`] at a time. Field
values are materialized on demand: fields without quotes or escapes are
borrowed straight from the window. A [`Writer`] quotes and escapes fields
for the configured dialect, and can defuse values that a spreadsheet would
evaluate as formulas.

Dialects cover RFC 4180 quoting as well as escape-character formats,
multi-byte delimiters, custom terminators, comments, blank line handling
and whitespace trimming.

# Example

```
use std::error::Error;
use csv_stream::{ReaderBuilder, Writer};

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn Error>> {
    let data = "city;population\n\"Boston; MA\";4628910\n";
    let mut rdr = ReaderBuilder::new().delimiter(b';').from_reader(data.as_bytes())?;
    let mut wtr = Writer::from_writer(vec![]);
    while rdr.move_next()? {
        let row = rdr.current_row().unwrap();
        for field in row.iter() {
            wtr.write_field(field?.as_bytes())?;
        }
        wtr.next_record()?;
    }
    let out = String::from_utf8(wtr.into_inner()?)?;
    assert_eq!(out, "city,population\nBoston; MA,4628910\n");
    Ok(())
}
```

# Async

With the `tokio` feature, [`AsyncReader`] and [`AsyncWriter`] run the same
machinery over tokio's `AsyncRead` and `AsyncWrite`.
*/

#![deny(missing_docs)]

pub use csv_stream_core::{
    Dialect, DialectBuilder, DialectError, Mode, QuoteStyle, Terminator,
};

#[cfg(feature = "tokio")]
pub use crate::async_io::{AsyncReader, AsyncWriter};
pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::cache::{
    Interning, SharedStringPool, StringPool, DEFAULT_MAX_INTERNED_LEN,
};
pub use crate::error::{
    BadDataError, Error, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::reader::{
    BadData, ByteRecordsIter, Reader, ReaderBuilder, Row, RowIter,
    StringRecordsIter,
};
pub use crate::string_record::{StringRecord, StringRecordIter};
pub use crate::writer::{FieldContext, Injection, Writer, WriterBuilder};

#[cfg(feature = "tokio")]
mod async_io;
mod buffer;
mod byte_record;
mod cache;
mod error;
mod reader;
mod string_record;
mod writer;
