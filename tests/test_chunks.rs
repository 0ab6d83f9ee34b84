use std::io::{self, Read};

use csv_stream::{ByteRecord, ReaderBuilder};

/// A reader that hands out its input one chunk per `read` call, the way a
/// socket or pipe delivers data.
#[derive(Debug)]
struct ChunkReader<'a> {
    chunks: Vec<&'a [u8]>,
    next: usize,
    chunk: &'a [u8],
}

impl<'a> ChunkReader<'a> {
    fn new(chunks: Vec<&'a [u8]>) -> ChunkReader<'a> {
        ChunkReader { chunks, next: 0, chunk: &[] }
    }
}

impl<'a> Read for ChunkReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.chunk.is_empty() {
            match self.chunks.get(self.next) {
                Some(chunk) => {
                    self.chunk = chunk;
                    self.next += 1;
                }
                None => return Ok(0),
            }
        }
        let len = std::cmp::min(buf.len(), self.chunk.len());
        buf[..len].copy_from_slice(&self.chunk[..len]);
        self.chunk = &self.chunk[len..];
        Ok(len)
    }
}

fn parse_chunks(
    chunks: Vec<&[u8]>,
    builder: &ReaderBuilder,
) -> Vec<ByteRecord> {
    let mut reader = builder.from_reader(ChunkReader::new(chunks)).unwrap();
    reader.byte_records().map(Result::unwrap).collect()
}

#[test]
fn test_chunks() {
    let input_chunks = vec![
        &b"col_a,col_b,col_c\n0aaaa,0bbbb,0cccc\n1aaaa,1bbbb,1cc"[..],
        &b"cc\n"[..],
        &b"2aaaa,2bbbb"[..],
        &b",2cccc\n"[..],
        &b"3aaaa,3bbbb,3cccc\n4aaaa,4bbbb,4cccc\n5aaaa,5bb"[..],
        &b"bb,5cccc"[..],
        &b"\n"[..],
        &b"6aaa"[..],
    ];
    let output = parse_chunks(input_chunks, &ReaderBuilder::new());
    assert_eq!(output.len(), 8);
    assert_eq!(output[0].as_slice(), &b"col_acol_bcol_c"[..]);
    assert_eq!(output[1].as_slice(), &b"0aaaa0bbbb0cccc"[..]);
    assert_eq!(output[2].as_slice(), &b"1aaaa1bbbb1cccc"[..]);
    assert_eq!(output[3].as_slice(), &b"2aaaa2bbbb2cccc"[..]);
    assert_eq!(output[4].as_slice(), &b"3aaaa3bbbb3cccc"[..]);
    assert_eq!(output[5].as_slice(), &b"4aaaa4bbbb4cccc"[..]);
    assert_eq!(output[6].as_slice(), &b"5aaaa5bbbb5cccc"[..]);
    assert_eq!(output[7].as_slice(), &b"6aaa"[..]);
}

#[test]
fn test_chunks_split_special_sequences() {
    // A doubled quote, a CRLF terminator and a multi-byte delimiter each
    // straddle a chunk boundary.
    let input_chunks = vec![
        &b"\"a\""[..],
        &b"\"b\"::c\r"[..],
        &b"\nd:"[..],
        &b":e:"[..],
        &b"f\n"[..],
    ];
    let mut builder = ReaderBuilder::new();
    builder.delimiter_str("::").buffer_capacity(4);
    let output = parse_chunks(input_chunks, &builder);
    assert_eq!(output.len(), 2);
    assert_eq!(output[0], vec!["a\"b", "c"]);
    assert_eq!(output[1], vec!["d", "e:f"]);
}

#[test]
fn test_chunks_positions() {
    let input_chunks = vec![&b"ab,c"[..], &b"d\nef"[..], &b",gh\n"[..]];
    let mut reader =
        ReaderBuilder::new().from_reader(ChunkReader::new(input_chunks)).unwrap();
    let mut bytes = vec![];
    while reader.move_next().unwrap() {
        bytes.push(reader.position().byte());
    }
    assert_eq!(bytes, vec![0, 6]);
    assert_eq!(reader.position().byte(), 12);
}
