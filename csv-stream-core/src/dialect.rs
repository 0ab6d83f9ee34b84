use std::error;
use std::fmt;

/// The maximum number of bytes in a multi-byte delimiter or terminator.
pub const MAX_SEQ_LEN: usize = 16;

/// The set of rules used to find field and record boundaries.
///
/// The mode is fixed when a scanner or writer is built and selects one of
/// three specialized algorithms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Fields may be wrapped in quotes. Inside quotes, delimiters and
    /// terminators are literal and a quote is escaped by doubling it (or by
    /// the escape byte when it differs from the quote).
    Rfc4180,
    /// There are no quotes. Any byte preceded by the escape byte is literal.
    Escape,
    /// Delimiters and terminators always split. Nothing can be escaped.
    NoEscape,
}

impl Default for Mode {
    fn default() -> Mode {
        Mode::Rfc4180
    }
}

/// A short, fixed capacity byte sequence.
///
/// This is used for multi-byte delimiters and explicit record terminators,
/// which keeps `Dialect` cheap to copy around.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct ByteSeq {
    bytes: [u8; MAX_SEQ_LEN],
    len: u8,
}

impl ByteSeq {
    /// Create a sequence from the given bytes.
    ///
    /// Returns `None` if `bytes` is empty or longer than `MAX_SEQ_LEN`.
    pub fn new(bytes: &[u8]) -> Option<ByteSeq> {
        if bytes.is_empty() || bytes.len() > MAX_SEQ_LEN {
            return None;
        }
        let mut seq = ByteSeq { bytes: [0; MAX_SEQ_LEN], len: bytes.len() as u8 };
        seq.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(seq)
    }

    /// Create a sequence consisting of a single byte.
    pub fn single(b: u8) -> ByteSeq {
        let mut seq = ByteSeq { bytes: [0; MAX_SEQ_LEN], len: 1 };
        seq.bytes[0] = b;
        seq
    }

    /// The bytes in this sequence.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The first byte in this sequence. A sequence is never empty.
    #[inline]
    pub fn first(&self) -> u8 {
        self.bytes[0]
    }

    /// The number of bytes in this sequence.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false, since sequences are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Debug for ByteSeq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteSeq(\"")?;
        for &b in self.as_bytes() {
            for c in std::ascii::escape_default(b) {
                write!(f, "{}", c as char)?;
            }
        }
        write!(f, "\")")
    }
}

/// A record terminator.
///
/// Use this to specify the record terminator while parsing or writing CSV.
/// The default is CRLF, which treats `\r`, `\n` or `\r\n` as a single record
/// terminator when reading, and writes `\r\n`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    /// Parses `\r`, `\n` or `\r\n` as a single record terminator.
    CRLF,
    /// Parses the byte given as a record terminator.
    Any(u8),
    /// Parses exactly the given sequence as a record terminator.
    Sequence(ByteSeq),
}

impl Terminator {
    /// Returns true if this is the auto-detecting CRLF terminator.
    pub fn is_crlf(&self) -> bool {
        match *self {
            Terminator::CRLF => true,
            Terminator::Any(_) | Terminator::Sequence(_) => false,
        }
    }

    /// The bytes written for this terminator.
    pub fn to_seq(&self) -> ByteSeq {
        match *self {
            Terminator::CRLF => {
                let mut seq = ByteSeq::single(b'\r');
                seq.bytes[1] = b'\n';
                seq.len = 2;
                seq
            }
            Terminator::Any(b) => ByteSeq::single(b),
            Terminator::Sequence(seq) => seq,
        }
    }

    /// Returns true if `b` can start a record terminator.
    #[inline]
    pub fn starts_with(&self, b: u8) -> bool {
        match *self {
            Terminator::CRLF => b == b'\r' || b == b'\n',
            Terminator::Any(t) => b == t,
            Terminator::Sequence(ref seq) => b == seq.first(),
        }
    }

    /// Returns true if `b` occurs anywhere in this terminator.
    pub fn contains(&self, b: u8) -> bool {
        match *self {
            Terminator::CRLF => b == b'\r' || b == b'\n',
            Terminator::Any(t) => b == t,
            Terminator::Sequence(ref seq) => seq.as_bytes().contains(&b),
        }
    }
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::CRLF
    }
}

impl PartialEq<u8> for Terminator {
    #[inline]
    fn eq(&self, &other: &u8) -> bool {
        self.starts_with(other)
    }
}

/// The role a byte plays in a dialect. Used for reporting conflicts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// The field delimiter.
    Delimiter,
    /// The quote byte.
    Quote,
    /// The escape byte.
    Escape,
    /// The comment byte.
    Comment,
    /// The record terminator.
    Terminator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Role::Delimiter => "delimiter",
            Role::Quote => "quote",
            Role::Escape => "escape",
            Role::Comment => "comment",
            Role::Terminator => "terminator",
        };
        f.write_str(name)
    }
}

/// An error that occurs when a dialect is configured inconsistently.
///
/// These errors are always reported when the dialect is built, never when
/// data is first parsed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DialectError {
    /// The delimiter is empty.
    EmptyDelimiter,
    /// An explicit terminator is empty.
    EmptyTerminator,
    /// A delimiter or terminator has more than `MAX_SEQ_LEN` bytes.
    TooLong {
        /// Which sequence is too long.
        role: Role,
        /// Its length.
        len: usize,
    },
    /// The delimiter starts with a byte that can never start a field
    /// separator: the quote, `\r`, `\n` or NUL.
    InvalidDelimiter {
        /// The offending first byte.
        byte: u8,
    },
    /// The delimiter contains `\r` or `\n`.
    NewlineInDelimiter,
    /// Two roles that the selected mode distinguishes share a byte.
    Conflict {
        /// The first role.
        first: Role,
        /// The second role.
        second: Role,
        /// The shared byte.
        byte: u8,
    },
}

impl fmt::Display for DialectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DialectError::EmptyDelimiter => {
                write!(f, "CSV dialect error: the delimiter must not be empty")
            }
            DialectError::EmptyTerminator => {
                write!(f, "CSV dialect error: the terminator must not be empty")
            }
            DialectError::TooLong { role, len } => write!(
                f,
                "CSV dialect error: {} has {} bytes, but at most {} are \
                 supported",
                role, len, MAX_SEQ_LEN
            ),
            DialectError::InvalidDelimiter { byte } => write!(
                f,
                "CSV dialect error: the delimiter cannot start with {:?}",
                byte as char
            ),
            DialectError::NewlineInDelimiter => write!(
                f,
                "CSV dialect error: the delimiter cannot contain a line break"
            ),
            DialectError::Conflict { first, second, byte } => write!(
                f,
                "CSV dialect error: {} and {} are both {:?}",
                first, second, byte as char
            ),
        }
    }
}

impl error::Error for DialectError {}

/// A validated, immutable set of CSV dialect rules.
///
/// A `Dialect` can only be created through `DialectBuilder::build`, which
/// checks that the configuration is consistent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Dialect {
    delimiter: ByteSeq,
    quote: u8,
    escape: u8,
    comment: u8,
    allow_comments: bool,
    terminator: Terminator,
    mode: Mode,
    ignore_blank_lines: bool,
    trim: bool,
}

impl Default for Dialect {
    fn default() -> Dialect {
        Dialect {
            delimiter: ByteSeq::single(b','),
            quote: b'"',
            escape: b'"',
            comment: b'#',
            allow_comments: false,
            terminator: Terminator::CRLF,
            mode: Mode::Rfc4180,
            ignore_blank_lines: true,
            trim: false,
        }
    }
}

impl Dialect {
    /// Returns a builder starting from the default RFC 4180 dialect.
    pub fn builder() -> DialectBuilder {
        DialectBuilder::new()
    }

    /// The field delimiter.
    pub fn delimiter(&self) -> &ByteSeq {
        &self.delimiter
    }

    /// The quote byte.
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// The escape byte.
    pub fn escape(&self) -> u8 {
        self.escape
    }

    /// The comment byte, if comments are enabled.
    pub fn comment(&self) -> Option<u8> {
        if self.allow_comments {
            Some(self.comment)
        } else {
            None
        }
    }

    /// The record terminator.
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// The scanning and quoting mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether lines with no content are skipped.
    pub fn ignore_blank_lines(&self) -> bool {
        self.ignore_blank_lines
    }

    /// Whether spaces and tabs around fields are trimmed.
    pub fn trim(&self) -> bool {
        self.trim
    }

    /// Return a copy of this dialect with a different record terminator.
    ///
    /// Writers use this to pick an output terminator when the reading
    /// default (CRLF auto-detection) is not wanted.
    pub fn with_terminator(
        &self,
        terminator: Terminator,
    ) -> Result<Dialect, DialectError> {
        let mut builder = DialectBuilder { dialect: *self, delimiter: None };
        builder.terminator(terminator);
        builder.build()
    }
}

/// Builds a `Dialect` with various configuration knobs.
#[derive(Clone, Debug)]
pub struct DialectBuilder {
    dialect: Dialect,
    // Kept separately so that a delimiter that is too long can be reported
    // at build time instead of being silently truncated.
    delimiter: Option<Vec<u8>>,
}

impl Default for DialectBuilder {
    fn default() -> DialectBuilder {
        DialectBuilder::new()
    }
}

impl DialectBuilder {
    /// Create a new builder with the default RFC 4180 configuration.
    pub fn new() -> DialectBuilder {
        DialectBuilder { dialect: Dialect::default(), delimiter: None }
    }

    /// Validate the configuration and build a `Dialect`.
    pub fn build(&self) -> Result<Dialect, DialectError> {
        let mut d = self.dialect;
        if let Some(ref delim) = self.delimiter {
            if delim.is_empty() {
                return Err(DialectError::EmptyDelimiter);
            }
            d.delimiter = ByteSeq::new(delim).ok_or(DialectError::TooLong {
                role: Role::Delimiter,
                len: delim.len(),
            })?;
        }
        // Escape mode has no notion of auto-detected line endings: a single
        // escape byte can only protect a single terminator byte.
        if d.mode == Mode::Escape && d.terminator.is_crlf() {
            d.terminator = Terminator::Any(b'\n');
        }
        validate(&d)?;
        Ok(d)
    }

    /// The field delimiter to use.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut DialectBuilder {
        self.delimiter = Some(vec![delimiter]);
        self
    }

    /// A multi-byte field delimiter, e.g., `"||"`.
    pub fn delimiter_bytes<B: AsRef<[u8]>>(
        &mut self,
        delimiter: B,
    ) -> &mut DialectBuilder {
        self.delimiter = Some(delimiter.as_ref().to_vec());
        self
    }

    /// The quote byte to use in RFC 4180 mode.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut DialectBuilder {
        self.dialect.quote = quote;
        self
    }

    /// The escape byte.
    ///
    /// In RFC 4180 mode, an escape equal to the quote (the default) means
    /// quotes are escaped by doubling them. In escape mode, this byte makes
    /// the byte following it literal.
    pub fn escape(&mut self, escape: u8) -> &mut DialectBuilder {
        self.dialect.escape = escape;
        self
    }

    /// The comment byte. Only used when comments are allowed.
    ///
    /// The default is `b'#'`.
    pub fn comment(&mut self, comment: u8) -> &mut DialectBuilder {
        self.dialect.comment = comment;
        self
    }

    /// Whether lines starting with the comment byte are skipped.
    ///
    /// This is disabled by default.
    pub fn allow_comments(&mut self, yes: bool) -> &mut DialectBuilder {
        self.dialect.allow_comments = yes;
        self
    }

    /// The record terminator to use.
    pub fn terminator(&mut self, term: Terminator) -> &mut DialectBuilder {
        self.dialect.terminator = term;
        self
    }

    /// An explicit multi-byte record terminator, e.g., `"\r\n"` only.
    pub fn terminator_bytes<B: AsRef<[u8]>>(
        &mut self,
        term: B,
    ) -> Result<&mut DialectBuilder, DialectError> {
        let term = term.as_ref();
        if term.is_empty() {
            return Err(DialectError::EmptyTerminator);
        }
        let seq = ByteSeq::new(term).ok_or(DialectError::TooLong {
            role: Role::Terminator,
            len: term.len(),
        })?;
        self.dialect.terminator = if seq.len() == 1 {
            Terminator::Any(seq.first())
        } else {
            Terminator::Sequence(seq)
        };
        Ok(self)
    }

    /// The scanning and quoting mode.
    pub fn mode(&mut self, mode: Mode) -> &mut DialectBuilder {
        self.dialect.mode = mode;
        self
    }

    /// Whether blank lines are skipped.
    ///
    /// When disabled, a blank line is a record with a single empty field.
    /// This is enabled by default.
    pub fn ignore_blank_lines(&mut self, yes: bool) -> &mut DialectBuilder {
        self.dialect.ignore_blank_lines = yes;
        self
    }

    /// Whether spaces and tabs surrounding fields are trimmed.
    pub fn trim(&mut self, yes: bool) -> &mut DialectBuilder {
        self.dialect.trim = yes;
        self
    }

    /// A convenience method for ASCII delimited text.
    ///
    /// This sets the delimiter and record terminator to the ASCII unit
    /// separator (`\x1F`) and record separator (`\x1E`), respectively.
    pub fn ascii(&mut self) -> &mut DialectBuilder {
        self.delimiter(b'\x1F').terminator(Terminator::Any(b'\x1E'))
    }
}

fn conflict(first: Role, second: Role, byte: u8) -> DialectError {
    DialectError::Conflict { first, second, byte }
}

fn validate(d: &Dialect) -> Result<(), DialectError> {
    let delim = d.delimiter.first();
    if delim == d.quote || delim == b'\r' || delim == b'\n' || delim == 0 {
        return Err(DialectError::InvalidDelimiter { byte: delim });
    }
    if d.delimiter.as_bytes().iter().any(|&b| b == b'\r' || b == b'\n') {
        return Err(DialectError::NewlineInDelimiter);
    }
    if d.terminator.starts_with(delim) {
        return Err(conflict(Role::Delimiter, Role::Terminator, delim));
    }
    match d.mode {
        Mode::Rfc4180 => {
            if d.terminator.starts_with(d.quote) {
                return Err(conflict(Role::Quote, Role::Terminator, d.quote));
            }
            if d.escape != d.quote {
                if d.escape == delim {
                    return Err(conflict(Role::Delimiter, Role::Escape, delim));
                }
                if d.terminator.contains(d.escape) {
                    return Err(conflict(
                        Role::Escape,
                        Role::Terminator,
                        d.escape,
                    ));
                }
            }
        }
        Mode::Escape => {
            if d.escape == delim {
                return Err(conflict(Role::Delimiter, Role::Escape, delim));
            }
            if d.terminator.contains(d.escape) {
                return Err(conflict(Role::Escape, Role::Terminator, d.escape));
            }
        }
        Mode::NoEscape => {}
    }
    if d.allow_comments {
        let c = d.comment;
        if c == delim {
            return Err(conflict(Role::Delimiter, Role::Comment, c));
        }
        if d.terminator.starts_with(c) {
            return Err(conflict(Role::Comment, Role::Terminator, c));
        }
        if d.mode == Mode::Rfc4180 && c == d.quote {
            return Err(conflict(Role::Quote, Role::Comment, c));
        }
        if d.mode == Mode::Escape && c == d.escape {
            return Err(conflict(Role::Escape, Role::Comment, c));
        }
    }
    Ok(())
}
