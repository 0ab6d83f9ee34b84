use crate::dialect::{Dialect, Mode, Terminator};

/// The byte can start a delimiter.
pub const DELIM: u8 = 1 << 0;
/// The byte can start a record terminator.
pub const TERM: u8 = 1 << 1;
/// The byte is the quote.
pub const QUOTE: u8 = 1 << 2;
/// The byte is an escape that differs from the quote.
pub const ESCAPE: u8 = 1 << 3;
/// The byte is `\r` or `\n`. Only interesting inside quoted fields, where
/// embedded line breaks are counted.
pub const NEWLINE: u8 = 1 << 4;

/// A 256-entry table mapping each byte to the set of roles it may play.
///
/// The scan loops use this to skip over ordinary bytes without comparing
/// each one against every configured role.
#[derive(Clone)]
pub struct ByteClasses {
    table: [u8; 256],
}

impl ByteClasses {
    /// Build the class table for a dialect.
    ///
    /// Only roles that are meaningful for the dialect's mode are set.
    pub fn new(dialect: &Dialect) -> ByteClasses {
        let mut classes = ByteClasses { table: [0; 256] };
        classes.add(dialect.delimiter().first(), DELIM);
        match dialect.terminator() {
            Terminator::CRLF => {
                classes.add(b'\r', TERM);
                classes.add(b'\n', TERM);
            }
            Terminator::Any(b) => classes.add(b, TERM),
            Terminator::Sequence(seq) => classes.add(seq.first(), TERM),
        }
        match dialect.mode() {
            Mode::Rfc4180 => {
                classes.add(dialect.quote(), QUOTE);
                if dialect.escape() != dialect.quote() {
                    classes.add(dialect.escape(), ESCAPE);
                }
                classes.add(b'\r', NEWLINE);
                classes.add(b'\n', NEWLINE);
            }
            Mode::Escape => {
                classes.add(dialect.escape(), ESCAPE);
                classes.add(b'\r', NEWLINE);
                classes.add(b'\n', NEWLINE);
            }
            Mode::NoEscape => {}
        }
        classes
    }

    fn add(&mut self, b: u8, class: u8) {
        self.table[b as usize] |= class;
    }

    /// Returns the classes of `b`.
    #[inline(always)]
    pub fn get(&self, b: u8) -> u8 {
        self.table[b as usize]
    }

    /// Returns true if `b` belongs to any of the classes in `mask`.
    #[inline(always)]
    pub fn is(&self, b: u8, mask: u8) -> bool {
        self.table[b as usize] & mask != 0
    }

    /// Returns the offset of the first byte at or after `at` that belongs to
    /// a class in `mask`, or `buf.len()` if there is none.
    #[inline(always)]
    pub fn skip(&self, buf: &[u8], mut at: usize, mask: u8) -> usize {
        while at < buf.len() && self.table[buf[at] as usize] & mask == 0 {
            at += 1;
        }
        at
    }
}

impl std::fmt::Debug for ByteClasses {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let special: Vec<(u8, u8)> = (0..=255u8)
            .filter(|&b| self.table[b as usize] != 0)
            .map(|b| (b, self.table[b as usize]))
            .collect();
        f.debug_struct("ByteClasses").field("special", &special).finish()
    }
}
