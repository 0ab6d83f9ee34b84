use std::str;

use memchr::{memchr, memchr2};

use crate::dialect::{ByteSeq, Dialect, Mode, Terminator};

/// The quoting style to use when writing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteStyle {
    /// This puts quotes around every field. Always.
    Always,
    /// This puts quotes around fields only when necessary.
    ///
    /// They are necessary when fields contain a quote, delimiter or record
    /// terminator, when the first field of a record starts with the comment
    /// byte, or when trimming would otherwise eat leading or trailing
    /// whitespace.
    ///
    /// This is the default.
    Necessary,
    /// This puts quotes around all fields that are non-numeric, and around
    /// numeric fields when they would need quotes anyway.
    NonNumeric,
    /// This *never* writes quotes, even if it produces invalid CSV data.
    Never,
}

impl Default for QuoteStyle {
    fn default() -> QuoteStyle {
        QuoteStyle::Necessary
    }
}

/// A builder for configuring a CSV writer.
#[derive(Debug)]
pub struct WriterBuilder {
    dialect: Dialect,
    style: QuoteStyle,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder::new()
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring a CSV writer.
    ///
    /// The default dialect is RFC 4180 with `\n` as the record terminator.
    pub fn new() -> WriterBuilder {
        let dialect = Dialect::default()
            .with_terminator(Terminator::Any(b'\n'))
            .unwrap_or_default();
        WriterBuilder { dialect, style: QuoteStyle::default() }
    }

    /// Build a CSV writer from this configuration.
    pub fn build(&self) -> Writer {
        Writer::new(&self.dialect, self.style)
    }

    /// The dialect to write.
    ///
    /// If its terminator is `Terminator::CRLF`, records end with `\r\n`.
    pub fn dialect(&mut self, dialect: Dialect) -> &mut WriterBuilder {
        self.dialect = dialect;
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
}

/// The result of writing CSV data.
///
/// A value of this type is returned from every write operation. It
/// indicates whether the caller needs to provide more input or more output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// This result occurs when all of the caller's input has been consumed.
    InputEmpty,
    /// This result occurs when the caller's output buffer was too small to
    /// write all of the input. The caller should flush the output and call
    /// again with the remaining input.
    OutputFull,
}

#[derive(Clone, Debug, Default)]
struct WriterState {
    /// Whether a field has been started and not yet closed.
    in_field: bool,
    /// Whether the open field is wrapped in quotes.
    quoting: bool,
    /// Whether the opening quote has been written.
    quote_open: bool,
    /// The number of bytes written in the current record.
    record_bytes: u64,
    /// The number of bytes written in the open field.
    field_bytes: u64,
}

/// A writer for CSV data.
///
/// The writer never allocates. Every method writes into a caller provided
/// output buffer and reports how much it consumed and produced, so a field
/// of any size can be written through a small buffer.
///
/// # RFC 4180
///
/// This writer conforms to RFC 4180 with one exception: it doesn't guarantee
/// that all records written are of the same length. Instead, the onus is on
/// the caller to ensure that all records written are of the same length.
#[derive(Clone, Debug)]
pub struct Writer {
    dialect: Dialect,
    style: QuoteStyle,
    state: WriterState,
    term: ByteSeq,
    requires_quotes: [bool; 256],
    requires_escape: [bool; 256],
}

impl Default for Writer {
    fn default() -> Writer {
        WriterBuilder::new().build()
    }
}

impl Writer {
    /// Creates a new CSV writer for the given dialect.
    pub fn new(dialect: &Dialect, style: QuoteStyle) -> Writer {
        let mut requires_quotes = [false; 256];
        let mut requires_escape = [false; 256];
        for &b in dialect.delimiter().as_bytes() {
            requires_quotes[b as usize] = true;
            requires_escape[b as usize] = true;
        }
        let term = dialect.terminator().to_seq();
        for &b in term.as_bytes().iter().chain(b"\r\n") {
            requires_quotes[b as usize] = true;
        }
        for &b in term.as_bytes() {
            requires_escape[b as usize] = true;
        }
        requires_quotes[dialect.quote() as usize] = true;
        requires_escape[dialect.quote() as usize] = true;
        requires_escape[dialect.escape() as usize] = true;
        Writer {
            dialect: *dialect,
            style,
            state: WriterState::default(),
            term,
            requires_quotes,
            requires_escape,
        }
    }

    /// The dialect this writer produces.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The quoting style of this writer.
    pub fn quote_style(&self) -> QuoteStyle {
        self.style
    }

    /// Returns true if nothing has been written in the current record.
    pub fn at_record_start(&self) -> bool {
        self.state.record_bytes == 0 && !self.state.in_field
    }

    /// Returns true if the given field would be quoted by this writer's
    /// quoting style at the current position.
    pub fn should_quote(&self, input: &[u8]) -> bool {
        if self.dialect.mode() != Mode::Rfc4180 {
            return false;
        }
        match self.style {
            QuoteStyle::Always => true,
            QuoteStyle::Never => false,
            QuoteStyle::Necessary => self.needs_quotes(input),
            QuoteStyle::NonNumeric => {
                !is_numeric(input) || self.needs_quotes(input)
            }
        }
    }

    fn needs_quotes(&self, input: &[u8]) -> bool {
        if input.iter().any(|&b| self.requires_quotes[b as usize]) {
            return true;
        }
        if let Some(c) = self.dialect.comment() {
            if self.at_record_start() && input.first() == Some(&c) {
                return true;
            }
        }
        if self.dialect.trim() {
            let blank = |b: Option<&u8>| b == Some(&b' ') || b == Some(&b'\t');
            if blank(input.first()) || blank(input.last()) {
                return true;
            }
        }
        false
    }

    /// Start a new field, overriding the quoting decision.
    ///
    /// Quotes are only ever written in RFC 4180 mode. Calling this is
    /// optional: `field` decides for itself when no field has been started.
    /// It is required when a single field is written in several pieces,
    /// since otherwise the decision would be based on the first piece only.
    pub fn begin_field(&mut self, quote: bool) {
        self.state.in_field = true;
        self.state.quoting = quote && self.dialect.mode() == Mode::Rfc4180;
        self.state.quote_open = false;
        self.state.field_bytes = 0;
    }

    /// Write a single CSV field from `input` to `output` while employing
    /// this writer's quoting style.
    ///
    /// This returns the result of writing field data, in addition to the
    /// number of bytes consumed from `input` and the number of bytes
    /// written to `output`.
    ///
    /// The result of writing field data is either `WriteResult::InputEmpty`
    /// or `WriteResult::OutputFull`. The former occurs when all bytes in
    /// `input` were copied to `output`, while the latter occurs when
    /// `output` is too small to fit everything from `input`. The caller
    /// should flush `output` and call again with the rest of `input`.
    ///
    /// The field is left open so that it may be continued by another call.
    /// It is closed by `delimiter`, `terminator` or `finish`.
    pub fn field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        if !self.state.in_field {
            let quote = self.should_quote(input);
            self.begin_field(quote);
        }
        let mut nout = 0;
        if self.state.quoting && !self.state.quote_open {
            if output.is_empty() {
                return (WriteResult::OutputFull, 0, 0);
            }
            output[0] = self.dialect.quote();
            self.state.quote_open = true;
            nout = 1;
        }
        let (res, nin, o) = match self.dialect.mode() {
            Mode::Rfc4180 if self.state.quoting => {
                self.write_quoted(input, &mut output[nout..])
            }
            Mode::Escape => self.write_escaped(input, &mut output[nout..]),
            _ => copy(input, &mut output[nout..]),
        };
        nout += o;
        self.state.record_bytes += nout as u64;
        self.state.field_bytes += nout as u64;
        (res, nin, nout)
    }

    fn write_quoted(
        &self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let quote = self.dialect.quote();
        let escape = self.dialect.escape();
        let (mut nin, mut nout) = (0, 0);
        loop {
            let rest = &input[nin..];
            let special = if escape == quote {
                memchr(quote, rest)
            } else {
                memchr2(quote, escape, rest)
            };
            let run = special.unwrap_or(rest.len());
            let (_, n, _) = copy(&rest[..run], &mut output[nout..]);
            nin += n;
            nout += n;
            if n < run {
                return (WriteResult::OutputFull, nin, nout);
            }
            if special.is_none() {
                return (WriteResult::InputEmpty, nin, nout);
            }
            if output.len() - nout < 2 {
                return (WriteResult::OutputFull, nin, nout);
            }
            output[nout] = escape;
            output[nout + 1] = input[nin];
            nin += 1;
            nout += 2;
        }
    }

    fn write_escaped(
        &self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let escape = self.dialect.escape();
        let (mut nin, mut nout) = (0, 0);
        if self.state.record_bytes == 0 {
            if let (Some(c), Some(&first)) = (self.dialect.comment(), input.first()) {
                if c == first {
                    if output.len() < 2 {
                        return (WriteResult::OutputFull, 0, 0);
                    }
                    output[0] = escape;
                    output[1] = first;
                    nin = 1;
                    nout = 2;
                }
            }
        }
        let field_start = self.state.field_bytes == 0;
        while nin < input.len() {
            let b = input[nin];
            // Outer blanks would be eaten by a trimming reader.
            let outer_blank = self.dialect.trim()
                && (b == b' ' || b == b'\t')
                && ((field_start && nin == 0) || nin + 1 == input.len());
            if self.requires_escape[b as usize] || outer_blank {
                if output.len() - nout < 2 {
                    return (WriteResult::OutputFull, nin, nout);
                }
                output[nout] = escape;
                output[nout + 1] = b;
                nout += 2;
            } else {
                if nout == output.len() {
                    return (WriteResult::OutputFull, nin, nout);
                }
                output[nout] = b;
                nout += 1;
            }
            nin += 1;
        }
        (WriteResult::InputEmpty, nin, nout)
    }

    /// The number of quotes needed to close the open field.
    fn closing_len(&self) -> usize {
        if !self.state.in_field || !self.state.quoting {
            0
        } else if self.state.quote_open {
            1
        } else {
            2
        }
    }

    /// Write everything in `parts` at once, or nothing at all.
    fn write_all(&mut self, parts: &[&[u8]], output: &mut [u8]) -> (WriteResult, usize) {
        let need: usize = parts.iter().map(|p| p.len()).sum();
        if output.len() < need {
            return (WriteResult::OutputFull, 0);
        }
        let mut nout = 0;
        for part in parts {
            output[nout..nout + part.len()].copy_from_slice(part);
            nout += part.len();
        }
        self.state.record_bytes += nout as u64;
        (WriteResult::InputEmpty, nout)
    }

    fn close_field(&mut self) {
        self.state.in_field = false;
        self.state.quoting = false;
        self.state.quote_open = false;
        self.state.field_bytes = 0;
    }

    /// Close the open field, if any, and write a field delimiter.
    ///
    /// Nothing is written unless everything fits in `output`.
    pub fn delimiter(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let quotes = [self.dialect.quote(); 2];
        let close = &quotes[..self.closing_len()];
        let delim = *self.dialect.delimiter();
        let (res, nout) = self.write_all(&[close, delim.as_bytes()], output);
        if res == WriteResult::InputEmpty {
            self.close_field();
        }
        (res, nout)
    }

    /// Close the open field, if any, and write a record terminator.
    ///
    /// A record made of a single empty field is written as an empty quoted
    /// field in RFC 4180 mode, so that it is not mistaken for a blank line.
    /// A record with no fields at all is a blank line.
    ///
    /// Nothing is written unless everything fits in `output`.
    pub fn terminator(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let quotes = [self.dialect.quote(); 2];
        let mut close = &quotes[..self.closing_len()];
        if close.is_empty()
            && self.state.in_field
            && self.state.record_bytes == 0
            && self.dialect.mode() == Mode::Rfc4180
            && self.style != QuoteStyle::Never
        {
            close = &quotes[..];
        }
        let term = self.term;
        let (res, nout) = self.write_all(&[close, term.as_bytes()], output);
        if res == WriteResult::InputEmpty {
            self.close_field();
            self.state.record_bytes = 0;
        }
        (res, nout)
    }

    /// Close the open field, if any, without ending the record.
    ///
    /// This should be called when the output ends without a final record
    /// terminator.
    pub fn finish(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let quotes = [self.dialect.quote(); 2];
        let close = &quotes[..self.closing_len()];
        let (res, nout) = self.write_all(&[close], output);
        if res == WriteResult::InputEmpty {
            self.close_field();
        }
        (res, nout)
    }
}

/// Copy as much of `input` into `output` as fits.
fn copy(input: &[u8], output: &mut [u8]) -> (WriteResult, usize, usize) {
    let n = input.len().min(output.len());
    output[..n].copy_from_slice(&input[..n]);
    let res = if n < input.len() {
        WriteResult::OutputFull
    } else {
        WriteResult::InputEmpty
    };
    (res, n, n)
}

/// Returns true if the field is an integer or a float.
fn is_numeric(input: &[u8]) -> bool {
    match str::from_utf8(input) {
        Ok(s) => {
            s.parse::<i64>().is_ok()
                || (s.bytes().any(|b| b.is_ascii_digit())
                    && s.parse::<f64>().is_ok())
        }
        Err(_) => false,
    }
}
