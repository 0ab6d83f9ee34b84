use std::borrow::Cow;

use memchr::{memchr, memchr2};

use crate::dialect::{Dialect, Mode};
use crate::index::{BAD, ESCAPED, QUOTED};

/// Strip leading and trailing spaces and tabs.
pub fn trim(raw: &[u8]) -> &[u8] {
    let is_blank = |b: &u8| *b == b' ' || *b == b'\t';
    let start = raw.iter().position(|b| !is_blank(b)).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !is_blank(b)).map_or(start, |i| i + 1);
    &raw[start..end]
}

/// Like `trim`, but a trailing blank preceded by an unpaired `escape` is
/// part of the value.
fn trim_escaped(raw: &[u8], escape: u8) -> &[u8] {
    let is_blank = |b: u8| b == b' ' || b == b'\t';
    let start = raw.iter().position(|&b| !is_blank(b)).unwrap_or(raw.len());
    let mut end = raw.len();
    while end > start && is_blank(raw[end - 1]) {
        let escapes = raw[start..end - 1]
            .iter()
            .rev()
            .take_while(|&&b| b == escape)
            .count();
        if escapes % 2 == 1 {
            break;
        }
        end -= 1;
    }
    &raw[start..end]
}

/// Returns the value of a raw field as a slice of `raw`, if no bytes need
/// to be removed from its interior.
///
/// This covers plain fields and quoted fields whose only special bytes are
/// the surrounding quotes.
pub fn borrowed<'a>(
    raw: &'a [u8],
    flags: u8,
    dialect: &Dialect,
) -> Option<&'a [u8]> {
    let raw = if dialect.trim() { trim(raw) } else { raw };
    if flags & (ESCAPED | BAD | QUOTED) == 0 {
        return Some(raw);
    }
    if flags & (ESCAPED | BAD) == 0 && flags & QUOTED != 0 {
        let quote = dialect.quote();
        if raw.len() >= 2 && raw[0] == quote && raw[raw.len() - 1] == quote {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    if flags & (QUOTED | ESCAPED) == 0 {
        // Malformed but unquoted: the raw bytes are the value.
        return Some(raw);
    }
    None
}

/// Turn the raw bytes of a field into its value.
///
/// Plain fields are returned without copying. Quoted and escaped fields are
/// transformed in one left to right pass.
pub fn materialize<'a>(
    raw: &'a [u8],
    flags: u8,
    dialect: &Dialect,
) -> Cow<'a, [u8]> {
    match borrowed(raw, flags, dialect) {
        Some(value) => Cow::Borrowed(value),
        None => {
            let mut out = Vec::with_capacity(raw.len());
            unescape_into(raw, flags, dialect, &mut out);
            Cow::Owned(out)
        }
    }
}

/// Append the value of a raw field to `out`.
pub fn unescape_into(
    raw: &[u8],
    flags: u8,
    dialect: &Dialect,
    out: &mut Vec<u8>,
) {
    let raw = match dialect.mode() {
        _ if !dialect.trim() => raw,
        Mode::Escape if flags & ESCAPED != 0 => {
            trim_escaped(raw, dialect.escape())
        }
        _ => trim(raw),
    };
    match dialect.mode() {
        Mode::Rfc4180 if flags & QUOTED != 0 => unquote_into(raw, dialect, out),
        Mode::Escape if flags & ESCAPED != 0 => {
            strip_escapes(raw, dialect.escape(), out)
        }
        _ => out.extend_from_slice(raw),
    }
}

/// Remove the surrounding quotes of a quoted field and collapse its escape
/// sequences. Anything after the closing quote is copied as is.
fn unquote_into(raw: &[u8], dialect: &Dialect, out: &mut Vec<u8>) {
    let quote = dialect.quote();
    let escape = dialect.escape();
    debug_assert_eq!(raw.first(), Some(&quote));
    let mut i = 1;
    loop {
        let rest = &raw[i..];
        let found = if escape == quote {
            memchr(quote, rest)
        } else {
            memchr2(quote, escape, rest)
        };
        let at = match found {
            // Unterminated.
            None => {
                out.extend_from_slice(rest);
                return;
            }
            Some(j) => i + j,
        };
        out.extend_from_slice(&raw[i..at]);
        let next = raw.get(at + 1).copied();
        if raw[at] == quote && escape == quote {
            if next == Some(quote) {
                out.push(quote);
                i = at + 2;
                continue;
            }
        } else if raw[at] == escape {
            match next {
                Some(n) if n == quote || n == escape => {
                    out.push(n);
                    i = at + 2;
                }
                _ => {
                    out.push(escape);
                    i = at + 1;
                }
            }
            continue;
        }
        // The closing quote.
        out.extend_from_slice(&raw[at + 1..]);
        return;
    }
}

/// Replace every escape sequence with the byte it protects. A trailing
/// escape is kept.
fn strip_escapes(raw: &[u8], escape: u8, out: &mut Vec<u8>) {
    let mut i = 0;
    while let Some(j) = memchr(escape, &raw[i..]) {
        let at = i + j;
        out.extend_from_slice(&raw[i..at]);
        match raw.get(at + 1) {
            Some(&b) => {
                out.push(b);
                i = at + 2;
            }
            None => {
                out.push(escape);
                i = at + 1;
            }
        }
    }
    out.extend_from_slice(&raw[i..]);
}
