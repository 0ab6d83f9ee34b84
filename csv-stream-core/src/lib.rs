/*!
`csv-stream-core` provides the allocation-light state machines behind the
`csv-stream` crate: a resumable scanner that indexes field and row
boundaries in a byte buffer, the transformations that turn raw field spans
into values, and a serializer that writes correctly quoted fields into
caller provided buffers.

Nothing in this crate performs I/O. Callers own the buffers and decide when
to refill or flush them.

# Example: scanning

```
use csv_stream_core::{DialectBuilder, IndexStore, Scan, Scanner};

let dialect = DialectBuilder::new().build().unwrap();
let mut scanner = Scanner::new(&dialect);
let mut store = IndexStore::new();

let data = b"a,\"b,c\"\nd,e";
assert_eq!(scanner.scan(data, true, &mut store), Scan::Rows(2));

let row = store.advance_row().unwrap();
let fields = store.row_fields(&row);
assert_eq!(fields.len(), 2);
let value = csv_stream_core::materialize(fields[1].slice(data), fields[1].flags, &dialect);
assert_eq!(&*value, b"b,c");
```

# Example: writing

```
use csv_stream_core::{WriteResult, Writer};

let mut wtr = Writer::default();
let mut out = [0; 64];
let mut n = 0;

let (res, _, nout) = wtr.field(b"a,b", &mut out[n..]);
assert_eq!(res, WriteResult::InputEmpty);
n += nout;
n += wtr.delimiter(&mut out[n..]).1;
n += wtr.field(b"plain", &mut out[n..]).2;
n += wtr.terminator(&mut out[n..]).1;
assert_eq!(&out[..n], b"\"a,b\",plain\n");
```
*/

#![deny(missing_docs)]

pub use crate::dialect::{
    ByteSeq, Dialect, DialectBuilder, DialectError, Mode, Role, Terminator,
    MAX_SEQ_LEN,
};
pub use crate::index::{
    Checkpoint, FieldSpan, IndexStore, RowSpan, ScanState, BAD, ESCAPED,
    QUOTED,
};
pub use crate::scanner::{Scan, Scanner};
pub use crate::unescape::{borrowed, materialize, trim, unescape_into};
pub use crate::writer::{QuoteStyle, WriteResult, Writer, WriterBuilder};

mod classes;
mod dialect;
mod index;
mod scanner;
mod unescape;
mod writer;
