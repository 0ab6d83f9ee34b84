use memchr::{memchr, memchr2};

use crate::classes::{ByteClasses, DELIM, ESCAPE, NEWLINE, QUOTE, TERM};
use crate::dialect::{Dialect, Mode, Terminator};
use crate::index::{Checkpoint, IndexStore, ScanState, BAD, ESCAPED, QUOTED};

/// The result of a single call to `Scanner::scan`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scan {
    /// This many rows were completed and added to the index store.
    Rows(usize),
    /// No row could be completed with the data available. The caller
    /// should provide more input (or signal the end of the stream).
    NeedInput,
    /// The end of the stream has been fully processed. No more rows will
    /// ever be produced.
    Done,
}

enum Match {
    Yes(usize),
    No,
    More,
}

/// A resumable scanner that finds the field and row boundaries in a buffer.
///
/// The scanner never copies or transforms data. It records spans into an
/// `IndexStore` and keeps just enough state in a `Checkpoint` to resume
/// exactly where it stopped, even in the middle of a quoted field or a
/// multi-byte delimiter.
///
/// The buffer passed to `scan` must always be the same logical window: the
/// bytes previously given plus any appended since. If the caller drops bytes
/// from the front of the window, it must call `rebase` with the number of
/// bytes dropped.
#[derive(Clone, Debug)]
pub struct Scanner {
    dialect: Dialect,
    classes: ByteClasses,
    cp: Checkpoint,
}

impl Scanner {
    /// Create a new scanner for the given dialect.
    pub fn new(dialect: &Dialect) -> Scanner {
        Scanner {
            dialect: *dialect,
            classes: ByteClasses::new(dialect),
            cp: Checkpoint::default(),
        }
    }

    /// The dialect used by this scanner.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The current checkpoint.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.cp
    }

    /// The first offset in the window that must be retained.
    pub fn keep_from(&self) -> usize {
        self.cp.keep_from()
    }

    /// Adjust for `shift` bytes dropped from the front of the window.
    pub fn rebase(&mut self, shift: usize) {
        self.cp = self.cp.rebased(shift);
    }

    /// The raw line number the scanner has reached.
    pub fn line(&self) -> u64 {
        self.cp.line
    }

    /// Returns true once the end of the stream has been processed.
    pub fn is_done(&self) -> bool {
        self.cp.state == ScanState::Done
    }

    /// Reset to the initial state, so that a new stream can be scanned.
    pub fn reset(&mut self) {
        self.cp = Checkpoint::default();
    }

    /// Scan `buf` from the checkpoint to the end of the available data.
    ///
    /// Every completed row is appended to `store`. When `eof` is true, `buf`
    /// holds the remainder of the stream: the open field and row are closed
    /// and the scanner transitions to its final state.
    pub fn scan(
        &mut self,
        buf: &[u8],
        eof: bool,
        store: &mut IndexStore,
    ) -> Scan {
        if self.cp.state == ScanState::Done {
            return Scan::Done;
        }
        let before = store.row_count();
        let mut cp = self.cp;
        match self.dialect.mode() {
            Mode::Rfc4180 => self.scan_rfc4180(&mut cp, buf, eof, store),
            Mode::Escape => self.scan_escape(&mut cp, buf, eof, store),
            Mode::NoEscape => self.scan_no_escape(&mut cp, buf, eof, store),
        }
        if eof && cp.pos >= buf.len() {
            self.finish(&mut cp, buf.len(), store);
        }
        self.cp = cp;
        let rows = store.row_count() - before;
        if rows > 0 {
            Scan::Rows(rows)
        } else if self.cp.state == ScanState::Done {
            Scan::Done
        } else {
            Scan::NeedInput
        }
    }

    fn scan_rfc4180(
        &self,
        cp: &mut Checkpoint,
        buf: &[u8],
        eof: bool,
        store: &mut IndexStore,
    ) {
        let quote = self.dialect.quote();
        let escape = self.dialect.escape();
        let doubled = quote == escape;
        while cp.pos < buf.len() {
            match cp.state {
                ScanState::StartRow => {
                    if !self.start_row(cp, buf, eof, store) {
                        return;
                    }
                }
                ScanState::Comment => {
                    if !self.skip_comment(cp, buf, eof) {
                        return;
                    }
                }
                ScanState::StartField => {
                    let mut at = cp.pos;
                    if self.dialect.trim() {
                        at = skip_blanks(buf, at);
                        if at == buf.len() && !eof {
                            return;
                        }
                    }
                    if at < buf.len() && buf[at] == quote {
                        cp.flags |= QUOTED;
                        cp.pos = at + 1;
                        cp.state = ScanState::InQuoted;
                    } else {
                        cp.state = ScanState::InField;
                    }
                }
                ScanState::InField => {
                    let at =
                        self.classes.skip(buf, cp.pos, DELIM | TERM | QUOTE);
                    cp.pos = at;
                    if at == buf.len() {
                        return;
                    }
                    match self.boundary(cp, buf, at, eof, store) {
                        Some(true) => continue,
                        None => return,
                        Some(false) => {}
                    }
                    if buf[at] == quote {
                        cp.flags |= BAD;
                    }
                    cp.pos = at + 1;
                }
                ScanState::InQuoted => {
                    let at =
                        self.classes.skip(buf, cp.pos, QUOTE | ESCAPE | NEWLINE);
                    cp.pos = at;
                    if at == buf.len() {
                        return;
                    }
                    let b = buf[at];
                    let next = buf.get(at + 1).copied();
                    if b == quote {
                        if doubled && next == Some(quote) {
                            cp.flags |= ESCAPED;
                            cp.pos = at + 2;
                        } else if doubled && next.is_none() && !eof {
                            return;
                        } else {
                            cp.pos = at + 1;
                            cp.state = ScanState::AfterQuote;
                        }
                    } else if b == escape {
                        match next {
                            Some(n) if n == quote || n == escape => {
                                cp.flags |= ESCAPED;
                                cp.pos = at + 2;
                            }
                            None if !eof => return,
                            _ => cp.pos = at + 1,
                        }
                    } else if b == b'\n' {
                        cp.line += 1;
                        cp.pos = at + 1;
                    } else {
                        // A lone \r ends a line, but \r\n counts once.
                        match next {
                            Some(b'\n') => {}
                            None if !eof => return,
                            _ => cp.line += 1,
                        }
                        cp.pos = at + 1;
                    }
                }
                ScanState::AfterQuote => {
                    let at = cp.pos;
                    match self.boundary(cp, buf, at, eof, store) {
                        Some(true) => continue,
                        None => return,
                        Some(false) => {}
                    }
                    let b = buf[at];
                    if self.dialect.trim() && (b == b' ' || b == b'\t') {
                        cp.pos = at + 1;
                    } else {
                        // Content after the closing quote. The rest of the
                        // field is taken literally.
                        cp.flags |= BAD;
                        cp.state = ScanState::InField;
                    }
                }
                ScanState::Done => return,
            }
        }
    }

    fn scan_escape(
        &self,
        cp: &mut Checkpoint,
        buf: &[u8],
        eof: bool,
        store: &mut IndexStore,
    ) {
        let escape = self.dialect.escape();
        let term = self.dialect.terminator();
        while cp.pos < buf.len() {
            match cp.state {
                ScanState::StartRow => {
                    if !self.start_row(cp, buf, eof, store) {
                        return;
                    }
                }
                ScanState::Comment => {
                    if !self.skip_comment(cp, buf, eof) {
                        return;
                    }
                }
                ScanState::StartField => cp.state = ScanState::InField,
                ScanState::InField => {
                    let at =
                        self.classes.skip(buf, cp.pos, DELIM | TERM | ESCAPE);
                    cp.pos = at;
                    if at == buf.len() {
                        return;
                    }
                    if buf[at] == escape {
                        match buf.get(at + 1) {
                            Some(&n) => {
                                if term.starts_with(n) {
                                    cp.line += 1;
                                }
                                cp.flags |= ESCAPED;
                                cp.pos = at + 2;
                            }
                            // A trailing escape at the end of the stream
                            // is literal.
                            None if eof => cp.pos = at + 1,
                            None => return,
                        }
                        continue;
                    }
                    match self.boundary(cp, buf, at, eof, store) {
                        Some(true) => continue,
                        None => return,
                        Some(false) => cp.pos = at + 1,
                    }
                }
                ScanState::InQuoted
                | ScanState::AfterQuote
                | ScanState::Done => return,
            }
        }
    }

    fn scan_no_escape(
        &self,
        cp: &mut Checkpoint,
        buf: &[u8],
        eof: bool,
        store: &mut IndexStore,
    ) {
        while cp.pos < buf.len() {
            match cp.state {
                ScanState::StartRow => {
                    if !self.start_row(cp, buf, eof, store) {
                        return;
                    }
                }
                ScanState::Comment => {
                    if !self.skip_comment(cp, buf, eof) {
                        return;
                    }
                }
                ScanState::StartField => cp.state = ScanState::InField,
                ScanState::InField => {
                    let at = self.classes.skip(buf, cp.pos, DELIM | TERM);
                    cp.pos = at;
                    if at == buf.len() {
                        return;
                    }
                    match self.boundary(cp, buf, at, eof, store) {
                        Some(true) => continue,
                        None => return,
                        Some(false) => cp.pos = at + 1,
                    }
                }
                ScanState::InQuoted
                | ScanState::AfterQuote
                | ScanState::Done => return,
            }
        }
    }

    /// Try to close a field or row at `at`.
    ///
    /// Returns `Some(true)` if a boundary was consumed, `Some(false)` if
    /// `buf[at]` is content and `None` if more input is needed to decide.
    #[inline]
    fn boundary(
        &self,
        cp: &mut Checkpoint,
        buf: &[u8],
        at: usize,
        eof: bool,
        store: &mut IndexStore,
    ) -> Option<bool> {
        let class = self.classes.get(buf[at]);
        if class & DELIM != 0 {
            match self.match_delim(buf, at, eof) {
                Match::Yes(n) => {
                    end_field(cp, at, n, store);
                    return Some(true);
                }
                Match::More => return None,
                Match::No => {}
            }
        }
        if class & TERM != 0 {
            match self.match_term(buf, at, eof) {
                Match::Yes(n) => {
                    end_row(cp, at, n, store);
                    return Some(true);
                }
                Match::More => return None,
                Match::No => {}
            }
        }
        Some(false)
    }

    /// Handle the first byte of a row: comments and blank lines.
    ///
    /// Returns false if more input is needed.
    fn start_row(
        &self,
        cp: &mut Checkpoint,
        buf: &[u8],
        eof: bool,
        store: &mut IndexStore,
    ) -> bool {
        let b = buf[cp.pos];
        if self.dialect.comment() == Some(b) {
            cp.state = ScanState::Comment;
            return true;
        }
        cp.row_start = cp.pos;
        cp.field_start = cp.pos;
        cp.row_line = cp.line;
        cp.flags = 0;
        cp.row_bad = false;
        if self.classes.is(b, TERM) {
            match self.match_term(buf, cp.pos, eof) {
                Match::Yes(n) if self.dialect.ignore_blank_lines() => {
                    cp.skipped += 1;
                    cp.line += 1;
                    cp.pos += n;
                    return true;
                }
                Match::Yes(n) => {
                    let at = cp.pos;
                    end_row(cp, at, n, store);
                    return true;
                }
                Match::More => return false,
                Match::No => {}
            }
        }
        cp.state = ScanState::StartField;
        true
    }

    /// Skip the rest of a comment line, including its terminator.
    ///
    /// Returns false if more input is needed.
    fn skip_comment(&self, cp: &mut Checkpoint, buf: &[u8], eof: bool) -> bool {
        loop {
            let hay = &buf[cp.pos..];
            let found = match self.dialect.terminator() {
                Terminator::CRLF => memchr2(b'\r', b'\n', hay),
                Terminator::Any(t) => memchr(t, hay),
                Terminator::Sequence(seq) => memchr(seq.first(), hay),
            };
            let at = match found {
                None => {
                    cp.pos = buf.len();
                    return true;
                }
                Some(i) => cp.pos + i,
            };
            match self.match_term(buf, at, eof) {
                Match::Yes(n) => {
                    cp.pos = at + n;
                    cp.line += 1;
                    cp.skipped += 1;
                    cp.state = ScanState::StartRow;
                    return true;
                }
                Match::More => {
                    cp.pos = at;
                    return false;
                }
                Match::No => cp.pos = at + 1,
            }
        }
    }

    /// Close whatever is open at the end of the stream.
    fn finish(&self, cp: &mut Checkpoint, end: usize, store: &mut IndexStore) {
        match cp.state {
            ScanState::StartRow | ScanState::Comment | ScanState::Done => {}
            ScanState::InQuoted => {
                cp.flags |= BAD;
                end_row(cp, end, 0, store);
            }
            ScanState::StartField
            | ScanState::InField
            | ScanState::AfterQuote => end_row(cp, end, 0, store),
        }
        cp.state = ScanState::Done;
    }

    #[inline]
    fn match_delim(&self, buf: &[u8], at: usize, eof: bool) -> Match {
        let delim = self.dialect.delimiter();
        if delim.len() == 1 {
            if buf[at] == delim.first() {
                Match::Yes(1)
            } else {
                Match::No
            }
        } else {
            match_seq(delim.as_bytes(), buf, at, eof)
        }
    }

    #[inline]
    fn match_term(&self, buf: &[u8], at: usize, eof: bool) -> Match {
        match self.dialect.terminator() {
            Terminator::CRLF => match buf[at] {
                b'\n' => Match::Yes(1),
                b'\r' => match buf.get(at + 1) {
                    Some(b'\n') => Match::Yes(2),
                    Some(_) => Match::Yes(1),
                    None if eof => Match::Yes(1),
                    None => Match::More,
                },
                _ => Match::No,
            },
            Terminator::Any(t) => {
                if buf[at] == t {
                    Match::Yes(1)
                } else {
                    Match::No
                }
            }
            Terminator::Sequence(seq) => {
                match_seq(seq.as_bytes(), buf, at, eof)
            }
        }
    }
}

/// Match a byte sequence at `at` without consuming anything speculatively.
fn match_seq(seq: &[u8], buf: &[u8], at: usize, eof: bool) -> Match {
    let avail = &buf[at..];
    if avail.len() >= seq.len() {
        if avail.starts_with(seq) {
            Match::Yes(seq.len())
        } else {
            Match::No
        }
    } else if !eof && seq.starts_with(avail) {
        Match::More
    } else {
        Match::No
    }
}

fn skip_blanks(buf: &[u8], mut at: usize) -> usize {
    while at < buf.len() && (buf[at] == b' ' || buf[at] == b'\t') {
        at += 1;
    }
    at
}

#[inline]
fn end_field(cp: &mut Checkpoint, at: usize, n: usize, store: &mut IndexStore) {
    store.add_field(cp.field_start, at, cp.flags);
    cp.row_bad |= cp.flags & BAD != 0;
    cp.pos = at + n;
    cp.field_start = cp.pos;
    cp.flags = 0;
    cp.state = ScanState::StartField;
}

fn end_row(cp: &mut Checkpoint, at: usize, n: usize, store: &mut IndexStore) {
    store.add_field(cp.field_start, at, cp.flags);
    cp.row_bad |= cp.flags & BAD != 0;
    store.add_row(cp.row_start, at, cp.row_line, cp.skipped, cp.row_bad);
    cp.line += 1;
    cp.pos = at + n;
    cp.row_start = cp.pos;
    cp.field_start = cp.pos;
    cp.row_line = cp.line;
    cp.flags = 0;
    cp.row_bad = false;
    cp.state = ScanState::StartRow;
}

#[cfg(test)]
mod tests {
    use super::{Scan, Scanner};
    use crate::dialect::{DialectBuilder, Mode, Terminator};
    use crate::index::{IndexStore, BAD, ESCAPED, QUOTED};

    type Csv = Vec<Vec<(String, u8)>>;

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    /// Scan all of `data` at once and return every field's raw text with
    /// its flags.
    fn scan_all(builder: &DialectBuilder, data: &[u8]) -> Csv {
        scan_chunked(builder, data, data.len().max(1))
    }

    /// Scan `data` by growing the visible window `chunk` bytes at a time,
    /// compacting consumed bytes between passes.
    fn scan_chunked(builder: &DialectBuilder, data: &[u8], chunk: usize) -> Csv {
        let dialect = builder.build().unwrap();
        let mut scanner = Scanner::new(&dialect);
        let mut store = IndexStore::new();
        let mut window: Vec<u8> = vec![];
        let mut rest = data;
        let mut csv = vec![];
        loop {
            let eof = rest.is_empty();
            match scanner.scan(&window, eof, &mut store) {
                Scan::Rows(_) => {
                    while let Some(row) = store.advance_row() {
                        let fields = store
                            .row_fields(&row)
                            .iter()
                            .map(|f| {
                                let raw = f.slice(&window);
                                (String::from_utf8_lossy(raw).into_owned(), f.flags)
                            })
                            .collect();
                        csv.push(fields);
                    }
                }
                Scan::NeedInput => {
                    let keep = scanner.keep_from();
                    window.drain(..keep);
                    scanner.rebase(keep);
                    store.carry_over(keep);
                    let n = chunk.min(rest.len());
                    window.extend_from_slice(&rest[..n]);
                    rest = &rest[n..];
                }
                Scan::Done => return csv,
            }
        }
    }

    fn plain(rows: &[&[&str]]) -> Csv {
        rows.iter()
            .map(|r| r.iter().map(|f| (f.to_string(), 0)).collect())
            .collect()
    }

    macro_rules! scans_to {
        ($name:ident, $data:expr, $expected:expr) => {
            scans_to!($name, $data, $expected, |_| {});
        };
        ($name:ident, $data:expr, $expected:expr, $config:expr) => {
            #[test]
            fn $name() {
                let mut builder = DialectBuilder::new();
                $config(&mut builder);
                let expected: Csv = $expected;
                assert_eq!(expected, scan_all(&builder, b($data)), "whole");
                for &chunk in &[1, 2, 3, 7] {
                    let got = scan_chunked(&builder, b($data), chunk);
                    assert_eq!(expected, got, "chunk size {}", chunk);
                }
            }
        };
    }

    scans_to!(one_row_one_field, "a", plain(&[&["a"]]));
    scans_to!(one_row_many_fields, "a,b,c", plain(&[&["a", "b", "c"]]));
    scans_to!(trailing_comma, "a,", plain(&[&["a", ""]]));
    scans_to!(empty, "", plain(&[]));
    scans_to!(only_newlines, "\n\r\n\r", plain(&[]));
    scans_to!(
        many_rows_lf,
        "a,b\nc,d\n",
        plain(&[&["a", "b"], &["c", "d"]])
    );
    scans_to!(
        many_rows_crlf,
        "a,b\r\nc,d\r\n",
        plain(&[&["a", "b"], &["c", "d"]])
    );
    scans_to!(
        many_rows_cr,
        "a,b\rc,d\r",
        plain(&[&["a", "b"], &["c", "d"]])
    );
    scans_to!(
        blank_lines_skipped,
        "a\n\n\nb",
        plain(&[&["a"], &["b"]])
    );
    scans_to!(
        blank_lines_kept,
        "a\n\nb\n",
        plain(&[&["a"], &[""], &["b"]]),
        |b: &mut DialectBuilder| {
            b.ignore_blank_lines(false);
        }
    );
    scans_to!(
        quoted_delimiter,
        "a,b,\"c,d\",e",
        vec![vec![
            ("a".to_string(), 0),
            ("b".to_string(), 0),
            ("\"c,d\"".to_string(), QUOTED),
            ("e".to_string(), 0),
        ]]
    );
    scans_to!(
        doubled_quote,
        "a,\"b\"\"c\",d",
        vec![vec![
            ("a".to_string(), 0),
            ("\"b\"\"c\"".to_string(), QUOTED | ESCAPED),
            ("d".to_string(), 0),
        ]]
    );
    scans_to!(
        quoted_newline,
        "\"a\nb\",c\nd",
        vec![
            vec![("\"a\nb\"".to_string(), QUOTED), ("c".to_string(), 0)],
            vec![("d".to_string(), 0)],
        ]
    );
    scans_to!(
        quote_in_unquoted_field,
        "a\"b,c",
        vec![vec![("a\"b".to_string(), BAD), ("c".to_string(), 0)]]
    );
    scans_to!(
        content_after_closing_quote,
        "\"ab\"cd,e",
        vec![vec![
            ("\"ab\"cd".to_string(), QUOTED | BAD),
            ("e".to_string(), 0),
        ]]
    );
    scans_to!(
        unterminated_quote,
        "a,\"bc",
        vec![vec![("a".to_string(), 0), ("\"bc".to_string(), QUOTED | BAD)]]
    );
    scans_to!(
        quoted_empty_at_eof,
        "a,\"\"",
        vec![vec![("a".to_string(), 0), ("\"\"".to_string(), QUOTED)]]
    );
    scans_to!(
        escape_before_quote,
        "\"a\\\"b\",c",
        vec![vec![
            ("\"a\\\"b\"".to_string(), QUOTED | ESCAPED),
            ("c".to_string(), 0),
        ]],
        |b: &mut DialectBuilder| {
            b.escape(b'\\');
        }
    );
    scans_to!(
        trim_around_quotes,
        "  \"a\"  ,b",
        vec![vec![
            ("  \"a\"  ".to_string(), QUOTED),
            ("b".to_string(), 0),
        ]],
        |b: &mut DialectBuilder| {
            b.trim(true);
        }
    );
    scans_to!(
        comments,
        "#skip,me\na,b\n#again\nc",
        plain(&[&["a", "b"], &["c"]]),
        |b: &mut DialectBuilder| {
            b.allow_comments(true);
        }
    );
    scans_to!(
        comments_disabled,
        "#a,b",
        plain(&[&["#a", "b"]])
    );
    scans_to!(
        multi_byte_delimiter,
        "a||b|c||d",
        plain(&[&["a", "b|c", "d"]]),
        |b: &mut DialectBuilder| {
            b.delimiter_bytes("||");
        }
    );
    scans_to!(
        multi_byte_delimiter_prefix_at_end,
        "a||b|",
        plain(&[&["a", "b|"]]),
        |b: &mut DialectBuilder| {
            b.delimiter_bytes("||");
        }
    );
    scans_to!(
        multi_byte_delimiter_overlap,
        "a|||b",
        plain(&[&["a", "|b"]]),
        |b: &mut DialectBuilder| {
            b.delimiter_bytes("||");
        }
    );
    scans_to!(
        explicit_crlf_terminator,
        "a\rb\r\nc",
        plain(&[&["a\rb"], &["c"]]),
        |b: &mut DialectBuilder| {
            b.terminator_bytes("\r\n").unwrap();
        }
    );
    scans_to!(
        escape_mode,
        "a\\,b,c\\\nd\ne",
        vec![
            vec![
                ("a\\,b".to_string(), ESCAPED),
                ("c\\\nd".to_string(), ESCAPED),
            ],
            vec![("e".to_string(), 0)],
        ],
        |b: &mut DialectBuilder| {
            b.mode(Mode::Escape).escape(b'\\');
        }
    );
    scans_to!(
        escape_mode_trailing_escape,
        "a,b\\",
        vec![vec![("a".to_string(), 0), ("b\\".to_string(), 0)]],
        |b: &mut DialectBuilder| {
            b.mode(Mode::Escape).escape(b'\\');
        }
    );
    scans_to!(
        escape_mode_quotes_are_content,
        "\"a,b\"",
        plain(&[&["\"a", "b\""]]),
        |b: &mut DialectBuilder| {
            b.mode(Mode::Escape).escape(b'\\');
        }
    );
    scans_to!(
        no_escape_mode,
        "\"a,b\"\\,c\n",
        plain(&[&["\"a", "b\"\\", "c"]]),
        |b: &mut DialectBuilder| {
            b.mode(Mode::NoEscape);
        }
    );
    scans_to!(
        ascii_delimited,
        "a\x1Fb\x1Ec\x1Fd",
        plain(&[&["a", "b"], &["c", "d"]]),
        |b: &mut DialectBuilder| {
            b.ascii();
        }
    );
    scans_to!(
        semicolon_terminator,
        "a,b;c",
        plain(&[&["a", "b"], &["c"]]),
        |b: &mut DialectBuilder| {
            b.terminator(Terminator::Any(b';'));
        }
    );

    fn lines(builder: &DialectBuilder, data: &str) -> Vec<(u64, u64)> {
        let dialect = builder.build().unwrap();
        let mut scanner = Scanner::new(&dialect);
        let mut store = IndexStore::new();
        let mut got = vec![];
        while scanner.scan(b(data), true, &mut store) != Scan::Done {
            while let Some(row) = store.advance_row() {
                got.push((row.line, row.skipped));
            }
        }
        got
    }

    #[test]
    fn line_numbers() {
        let builder = DialectBuilder::new();
        assert_eq!(lines(&builder, "a\n\"b\nc\"\n\nd"), vec![(1, 0), (2, 0), (5, 1)]);
        assert_eq!(lines(&builder, "a\r\nb\rc"), vec![(1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn line_numbers_with_comments() {
        let mut builder = DialectBuilder::new();
        builder.allow_comments(true);
        assert_eq!(lines(&builder, "#x\n#y\na\n\nb"), vec![(3, 2), (5, 3)]);
    }

    #[test]
    fn bad_row_flag() {
        let dialect = DialectBuilder::new().build().unwrap();
        let mut scanner = Scanner::new(&dialect);
        let mut store = IndexStore::new();
        assert_eq!(scanner.scan(b"a,b\"c\nd\n", true, &mut store), Scan::Rows(2));
        assert!(store.advance_row().unwrap().bad);
        assert!(!store.advance_row().unwrap().bad);
        assert_eq!(scanner.scan(b"a,b\"c\nd\n", true, &mut store), Scan::Done);
    }

    #[test]
    fn lone_cr_needs_lookahead() {
        let dialect = DialectBuilder::new().build().unwrap();
        let mut scanner = Scanner::new(&dialect);
        let mut store = IndexStore::new();
        assert_eq!(scanner.scan(b"a\r", false, &mut store), Scan::NeedInput);
        assert_eq!(scanner.checkpoint().pos, 1);
        assert_eq!(scanner.scan(b"a\r\n", false, &mut store), Scan::Rows(1));
        assert_eq!(scanner.checkpoint().pos, 3);
    }

    #[test]
    fn delimiter_prefix_not_consumed() {
        let dialect = DialectBuilder::new().delimiter_bytes("||").build().unwrap();
        let mut scanner = Scanner::new(&dialect);
        let mut store = IndexStore::new();
        assert_eq!(scanner.scan(b"ab|", false, &mut store), Scan::NeedInput);
        assert_eq!(scanner.checkpoint().pos, 2);
        assert!(store.open_fields().is_empty());
        assert_eq!(scanner.scan(b"ab||", false, &mut store), Scan::NeedInput);
        assert_eq!(store.open_fields().len(), 1);
        assert_eq!(store.open_fields()[0].end, 2);
    }
}
