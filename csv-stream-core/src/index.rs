/// The field was opened by a quote and must be unquoted.
pub const QUOTED: u8 = 1 << 0;
/// The field contains escape sequences that must be collapsed.
pub const ESCAPED: u8 = 1 << 1;
/// The field is malformed.
pub const BAD: u8 = 1 << 2;

/// The location of a single field in the source buffer.
///
/// The span covers the raw bytes of the field, including any quotes and
/// escape bytes, but never the delimiter or terminator that ended it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FieldSpan {
    /// Offset of the first raw byte.
    pub start: usize,
    /// Offset one past the last raw byte.
    pub end: usize,
    /// A combination of `QUOTED`, `ESCAPED` and `BAD`.
    pub flags: u8,
}

impl FieldSpan {
    /// Returns true if the field can be sliced out of the buffer as is.
    #[inline]
    pub fn is_plain(&self) -> bool {
        self.flags == 0
    }

    /// Returns true if the field was opened by a quote.
    #[inline]
    pub fn is_quoted(&self) -> bool {
        self.flags & QUOTED != 0
    }

    /// Returns true if the field contains escape sequences.
    #[inline]
    pub fn is_escaped(&self) -> bool {
        self.flags & ESCAPED != 0
    }

    /// Returns true if the field is malformed.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.flags & BAD != 0
    }

    /// The raw bytes of this field in `buf`.
    #[inline]
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.end]
    }

    /// The number of raw bytes in this field.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this field has no raw bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The location of a single row in the source buffer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RowSpan {
    /// Offset of the first raw byte of the row.
    pub start: usize,
    /// Offset one past the last raw byte, excluding the terminator.
    pub end: usize,
    /// Index of this row's first field in the store.
    pub first_field: usize,
    /// The number of fields in this row.
    pub field_count: usize,
    /// The raw (1-based) line number on which the row starts.
    pub line: u64,
    /// The number of comment and blank lines skipped before this row.
    pub skipped: u64,
    /// Whether any field in this row is malformed.
    pub bad: bool,
}

/// Growable arrays of completed field and row spans.
///
/// The scanner appends to the store. The reader consumes rows in order with
/// `advance_row`. Before the source buffer is compacted, `carry_over`
/// drops consumed rows and rebases the fields of the row that is still
/// open.
#[derive(Clone, Debug, Default)]
pub struct IndexStore {
    fields: Vec<FieldSpan>,
    rows: Vec<RowSpan>,
    next: usize,
    open_first: usize,
}

impl IndexStore {
    /// Create an empty store.
    pub fn new() -> IndexStore {
        IndexStore::default()
    }

    /// Close a field of the open row.
    #[inline]
    pub fn add_field(&mut self, start: usize, end: usize, flags: u8) {
        debug_assert!(start <= end);
        self.fields.push(FieldSpan { start, end, flags });
    }

    /// Close the open row, which consists of every field added since the
    /// last row was closed.
    pub fn add_row(
        &mut self,
        start: usize,
        end: usize,
        line: u64,
        skipped: u64,
        bad: bool,
    ) {
        let field_count = self.fields.len() - self.open_first;
        self.rows.push(RowSpan {
            start,
            end,
            first_field: self.open_first,
            field_count,
            line,
            skipped,
            bad,
        });
        self.open_first = self.fields.len();
    }

    /// Hand out the next completed row, if any.
    #[inline]
    pub fn advance_row(&mut self) -> Option<RowSpan> {
        let row = *self.rows.get(self.next)?;
        self.next += 1;
        Some(row)
    }

    /// The number of completed rows not yet handed out.
    pub fn pending_rows(&self) -> usize {
        self.rows.len() - self.next
    }

    /// The total number of rows currently held.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The fields of a row previously returned by `advance_row`.
    #[inline]
    pub fn row_fields(&self, row: &RowSpan) -> &[FieldSpan] {
        &self.fields[row.first_field..row.first_field + row.field_count]
    }

    /// The fields already closed in the row that is still open.
    pub fn open_fields(&self) -> &[FieldSpan] {
        &self.fields[self.open_first..]
    }

    /// Drop every row that has been handed out along with its fields, then
    /// shift all remaining offsets down by `shift`.
    ///
    /// `shift` must not exceed the start of any remaining span.
    pub fn carry_over(&mut self, shift: usize) {
        let drop_fields = match self.rows.get(self.next) {
            Some(row) => row.first_field,
            None => self.open_first,
        };
        self.fields.drain(..drop_fields);
        self.rows.drain(..self.next);
        self.next = 0;
        self.open_first -= drop_fields;
        for row in &mut self.rows {
            debug_assert!(row.start >= shift);
            row.first_field -= drop_fields;
            row.start -= shift;
            row.end -= shift;
        }
        for field in &mut self.fields {
            debug_assert!(field.start >= shift);
            field.start -= shift;
            field.end -= shift;
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.rows.clear();
        self.next = 0;
        self.open_first = 0;
    }
}

/// The state of the scan machine between bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanState {
    /// At the first byte of a row.
    StartRow,
    /// Inside a comment line.
    Comment,
    /// At the first byte of a field.
    StartField,
    /// Inside an unquoted field.
    InField,
    /// Inside a quoted field.
    InQuoted,
    /// Just past the closing quote of a quoted field.
    AfterQuote,
    /// The end of the stream has been processed.
    Done,
}

/// Everything the scanner needs to resume where it stopped.
///
/// All offsets are relative to the start of the source buffer and must be
/// rebased whenever the buffer is compacted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Checkpoint {
    /// The next byte to examine.
    pub pos: usize,
    /// The first byte of the open row.
    pub row_start: usize,
    /// The first byte of the open field.
    pub field_start: usize,
    /// The machine state.
    pub state: ScanState,
    /// Flags accumulated for the open field.
    pub flags: u8,
    /// Whether a malformed field has been closed in the open row.
    pub row_bad: bool,
    /// The raw line number at `pos`.
    pub line: u64,
    /// The raw line number at `row_start`.
    pub row_line: u64,
    /// The number of comment and blank lines skipped so far.
    pub skipped: u64,
}

impl Default for Checkpoint {
    fn default() -> Checkpoint {
        Checkpoint {
            pos: 0,
            row_start: 0,
            field_start: 0,
            state: ScanState::StartRow,
            flags: 0,
            row_bad: false,
            line: 1,
            row_line: 1,
            skipped: 0,
        }
    }
}

impl Checkpoint {
    /// The first offset that must survive compaction.
    ///
    /// Between rows nothing before `pos` is needed. Inside a row, the row's
    /// raw bytes are needed to materialize its fields later.
    pub fn keep_from(&self) -> usize {
        match self.state {
            ScanState::StartRow | ScanState::Comment | ScanState::Done => {
                self.pos
            }
            ScanState::StartField
            | ScanState::InField
            | ScanState::InQuoted
            | ScanState::AfterQuote => self.row_start,
        }
    }

    /// Returns this checkpoint with every offset shifted down by `shift`.
    pub fn rebased(&self, shift: usize) -> Checkpoint {
        Checkpoint {
            pos: self.pos.saturating_sub(shift),
            row_start: self.row_start.saturating_sub(shift),
            field_start: self.field_start.saturating_sub(shift),
            ..*self
        }
    }
}
