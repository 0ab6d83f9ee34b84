use std::sync::Arc;
use std::thread;

use quickcheck::QuickCheck;

use csv_stream::{
    BadData, ByteRecord, Error, Injection, Interning, Mode, ReaderBuilder,
    SharedStringPool, StringRecord, Writer, WriterBuilder,
};

type Rows = Vec<Vec<String>>;

fn read_all(builder: &ReaderBuilder, data: &[u8]) -> Rows {
    let mut rdr = builder.from_reader(data).unwrap();
    let mut rows = vec![];
    let mut rec = StringRecord::new();
    while rdr.read_record(&mut rec).unwrap() {
        rows.push(rec.iter().map(|f| f.to_string()).collect());
    }
    rows
}

fn read_default(data: &str) -> Rows {
    read_all(&ReaderBuilder::new(), data.as_bytes())
}

/// Every field of every row, raw bytes plus whether it was malformed.
fn read_raw(builder: &ReaderBuilder, data: &[u8]) -> Vec<Vec<(Vec<u8>, bool)>> {
    let mut rdr = builder.from_reader(data).unwrap();
    let mut rows = vec![];
    while rdr.move_next().unwrap() {
        let row = rdr.current_row().unwrap();
        rows.push(
            (0..row.len())
                .map(|i| (row.field_bytes(i).unwrap().into_owned(), row.is_bad(i)))
                .collect(),
        );
    }
    rows
}

fn rows(rows: &[&[&str]]) -> Rows {
    rows.iter().map(|r| r.iter().map(|f| f.to_string()).collect()).collect()
}

#[test]
fn scenario_quoted_delimiter() {
    assert_eq!(read_default("a,b,\"c,d\",e\n"), rows(&[&["a", "b", "c,d", "e"]]));
}

#[test]
fn scenario_doubled_quote() {
    assert_eq!(read_default("a,\"b\"\"c\",d\n"), rows(&[&["a", "b\"c", "d"]]));
}

#[test]
fn scenario_no_trailing_terminator() {
    assert_eq!(read_default("x,y,z"), rows(&[&["x", "y", "z"]]));
}

#[test]
fn scenario_write_quoting() {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(&["a,b", "plain", "has\"quote"]).unwrap();
    let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    assert_eq!(out, "\"a,b\",plain,\"has\"\"quote\"\n");
}

#[test]
fn scenario_comment_line() {
    let mut builder = ReaderBuilder::new();
    builder.allow_comments(true);
    let got = read_all(&builder, b"# this is ignored\n1,2\n");
    assert_eq!(got, rows(&[&["1", "2"]]));
}

#[test]
fn scenario_injection_escape() {
    let mut wtr = WriterBuilder::new()
        .injection(Injection::Escape)
        .from_writer(vec![])
        .unwrap();
    wtr.write_record(&["=SUM(A1)"]).unwrap();
    let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    assert_eq!(out, "\"'=SUM(A1)\"\n");
}

#[test]
fn buffer_size_invariance() {
    let long = "x".repeat(37);
    let quoted = format!("\"{}\"\"{}\"", long, long);
    let data = format!(
        "a,{},b\r\n{}\n\n\"multi\nline\",{}\rlast,\"ab\"cd",
        quoted, long, long
    );
    let mut builder = ReaderBuilder::new();
    builder.bad_data(BadData::Ignore);
    let expected = read_raw(&builder, data.as_bytes());
    assert_eq!(expected.len(), 4);
    assert_eq!(expected[0][1].0.len(), 2 * long.len() + 1);
    assert_eq!(expected[3][1], (b"abcd".to_vec(), true));

    let field_len = quoted.len();
    for &cap in &[1, 2, 16, 8 * 1024, field_len, field_len + 1] {
        builder.buffer_capacity(cap);
        let got = read_raw(&builder, data.as_bytes());
        assert_eq!(expected, got, "buffer capacity {}", cap);
    }
}

#[test]
fn delimiter_prefix_is_literal() {
    for &(delim, data, expected) in &[
        ("||", "a|b||c|\n", &["a|b", "c|"][..]),
        ("<=>", "a<=b<=>c<\n<=>", &["a<=b", "c<"][..]),
        (";", "a;b\n", &["a", "b"][..]),
    ] {
        for &cap in &[1, 2, 3, 16] {
            let mut builder = ReaderBuilder::new();
            builder.delimiter_str(delim).buffer_capacity(cap);
            let got = read_all(&builder, data.as_bytes());
            assert_eq!(got[0], expected, "delimiter {:?}, capacity {}", delim, cap);
        }
    }
}

#[test]
fn multi_byte_delimiter_round_trip() {
    let mut wtr = WriterBuilder::new().delimiter_str("||").from_writer(vec![]).unwrap();
    wtr.write_record(&["a|", "|b", "c||d"]).unwrap();
    let data = wtr.into_inner().unwrap();
    let mut builder = ReaderBuilder::new();
    builder.delimiter_str("||");
    assert_eq!(read_all(&builder, &data), rows(&[&["a|", "|b", "c||d"]]));
}

#[test]
fn escape_mode_round_trip() {
    let mut wtr = WriterBuilder::new()
        .mode(Mode::Escape)
        .escape(b'\\')
        .from_writer(vec![])
        .unwrap();
    let record = ["a,b", "c\nd", "e\\f", "\"g\""];
    wtr.write_record(&record).unwrap();
    let data = wtr.into_inner().unwrap();
    assert_eq!(data, b"a\\,b,c\\\nd,e\\\\f,\\\"g\\\"\n".to_vec());

    let mut builder = ReaderBuilder::new();
    builder.mode(Mode::Escape).escape(b'\\');
    assert_eq!(read_all(&builder, &data), rows(&[&record]));
}

#[test]
fn escape_mode_trimmed_round_trip() {
    let record = [" a ", "\tb", "c ", " "];
    let mut wtr = WriterBuilder::new()
        .mode(Mode::Escape)
        .escape(b'\\')
        .trim(true)
        .from_writer(vec![])
        .unwrap();
    wtr.write_record(&record).unwrap();
    let data = wtr.into_inner().unwrap();
    assert_eq!(data, b"\\ a\\ ,\\\tb,c\\ ,\\ \n".to_vec());

    let mut builder = ReaderBuilder::new();
    builder.mode(Mode::Escape).escape(b'\\').trim(true);
    assert_eq!(read_all(&builder, &data), rows(&[&record]));
}

#[test]
fn no_escape_mode() {
    let mut builder = ReaderBuilder::new();
    builder.mode(Mode::NoEscape);
    let got = read_all(&builder, b"\"a,b\"\nc\\,d\n");
    assert_eq!(got, rows(&[&["\"a", "b\""], &["c\\", "d"]]));
}

#[test]
fn blank_lines() {
    let data = b"a\n\n\nb\n";
    assert_eq!(read_all(&ReaderBuilder::new(), data), rows(&[&["a"], &["b"]]));

    let mut builder = ReaderBuilder::new();
    builder.ignore_blank_lines(false);
    assert_eq!(
        read_all(&builder, data),
        rows(&[&["a"], &[""], &[""], &["b"]])
    );
}

#[test]
fn trimmed_fields() {
    let mut builder = ReaderBuilder::new();
    builder.trim(true);
    let got = read_all(&builder, b"  a  ,\t\"b \" ,c\n");
    assert_eq!(got, rows(&[&["a", "b ", "c"]]));
}

#[test]
fn bad_data_policies() {
    let data = b"a,\"b\"c,d\ne,f,g\n";

    let mut rdr = ReaderBuilder::new().from_reader(&data[..]).unwrap();
    match rdr.move_next() {
        Err(Error::BadData(err)) => {
            assert_eq!(err.field(), 1);
            assert_eq!(err.raw_record(), b"a,\"b\"c,d");
        }
        x => panic!("expected bad data error, got {:?}", x),
    }
    assert!(rdr.move_next().unwrap());
    assert_eq!(rdr.current_row().unwrap().field(0).unwrap(), "e");

    let mut builder = ReaderBuilder::new();
    builder.bad_data(BadData::Ignore);
    assert_eq!(
        read_all(&builder, data),
        rows(&[&["a", "bc", "d"], &["e", "f", "g"]])
    );

    let seen = Arc::new(std::sync::Mutex::new(vec![]));
    let sink = Arc::clone(&seen);
    let mut builder = ReaderBuilder::new();
    builder.on_bad_data(move |err| {
        sink.lock().unwrap().push(err.raw_field().to_vec());
    });
    assert_eq!(read_all(&builder, data).len(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![b"\"b\"c".to_vec()]);
}

#[test]
fn missing_field() {
    let mut rdr = ReaderBuilder::new().from_reader(&b"a,b\n"[..]).unwrap();
    assert!(rdr.move_next().unwrap());
    let row = rdr.current_row().unwrap();
    match row.field(5) {
        Err(Error::MissingField { index, .. }) => assert_eq!(index, 5),
        x => panic!("expected missing field, got {:?}", x),
    }

    let mut rdr = ReaderBuilder::new()
        .missing_field_ok(true)
        .from_reader(&b"a,b\n"[..])
        .unwrap();
    assert!(rdr.move_next().unwrap());
    assert_eq!(rdr.current_row().unwrap().field(5).unwrap(), "");
}

#[test]
fn invalid_utf8() {
    let mut rdr = ReaderBuilder::new().from_reader(&b"a,\xFF\nb\n"[..]).unwrap();
    let mut rec = StringRecord::new();
    match rdr.read_record(&mut rec) {
        Err(Error::Utf8 { err, .. }) => assert_eq!(err.field(), 1),
        x => panic!("expected UTF-8 error, got {:?}", x),
    }
    assert!(rec.is_empty());
    assert!(rdr.read_record(&mut rec).unwrap());
    assert_eq!(rec, vec!["b"]);

    let mut rdr = ReaderBuilder::new().from_reader(&b"a,\xFF\n"[..]).unwrap();
    let mut rec = ByteRecord::new();
    assert!(rdr.read_byte_record(&mut rec).unwrap());
    assert_eq!(rec.get(1), Some(&b"\xFF"[..]));
}

#[test]
fn positions_track_lines_and_records() {
    let data = "a,b\n\"c\nd\",e\nf,g\n";
    let mut rdr = ReaderBuilder::new().from_reader(data.as_bytes()).unwrap();
    let mut got = vec![];
    while rdr.move_next().unwrap() {
        let pos = rdr.position();
        got.push((pos.byte(), pos.line(), pos.record()));
    }
    assert_eq!(got, vec![(0, 1, 0), (4, 2, 1), (12, 4, 2)]);
    assert!(rdr.is_done());
}

#[test]
fn interning_across_threads() {
    let pool = Arc::new(SharedStringPool::default());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let data = "red,1\nblue,2\nred,3\n";
                let mut rdr = ReaderBuilder::new()
                    .interning(Interning::Shared(pool))
                    .from_reader(data.as_bytes())
                    .unwrap();
                let mut values = vec![];
                while rdr.move_next().unwrap() {
                    values.push(rdr.interned_field(0).unwrap());
                }
                values
            })
        })
        .collect();
    let results: Vec<Vec<Arc<str>>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(Arc::ptr_eq(&results[0][0], &results[0][2]));
    for got in &results[1..] {
        for (a, b) in got.iter().zip(&results[0]) {
            assert!(Arc::ptr_eq(a, b));
        }
    }
    assert_eq!(pool.len(), 2);
}

#[cfg(feature = "serde")]
#[test]
fn serialize_records_as_json() {
    let mut rdr = ReaderBuilder::new().from_reader(&b"a,\"b\"\"c\"\n"[..]).unwrap();
    let rec = rdr.records().next().unwrap().unwrap();
    assert_eq!(serde_json::to_string(&rec).unwrap(), r#"["a","b\"c"]"#);
}

const ALPHABET: &[u8] = b"ab ,\";|\r\n";

fn to_alphabet(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| ALPHABET[b as usize % ALPHABET.len()] as char).collect()
}

#[test]
fn write_then_read_round_trips() {
    fn prop(records: Vec<Vec<Vec<u8>>>, cap: usize) -> bool {
        let records: Rows = records
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.iter().map(|f| to_alphabet(f)).collect())
            .collect();
        let mut wtr = WriterBuilder::new()
            .buffer_capacity(1 + cap % 64)
            .from_writer(vec![])
            .unwrap();
        for rec in &records {
            wtr.write_record(rec).unwrap();
        }
        let data = wtr.into_inner().unwrap();
        let mut builder = ReaderBuilder::new();
        builder.buffer_capacity(1 + cap % 32);
        read_all(&builder, &data) == records
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Vec<Vec<Vec<u8>>>, usize) -> bool);
}

/// Write `records` with `wtr`, read them back with `rdr` and compare.
fn write_then_read(
    wtr: &WriterBuilder,
    rdr: &ReaderBuilder,
    records: &Rows,
) -> bool {
    let mut w = wtr.from_writer(vec![]).unwrap();
    for rec in records {
        w.write_record(rec).unwrap();
    }
    let data = w.into_inner().unwrap();
    read_all(rdr, &data) == *records
}

/// Map generated bytes onto `alphabet`, dropping records that would be
/// written as a blank line.
fn non_blank_records(records: Vec<Vec<Vec<u8>>>, alphabet: &[u8]) -> Rows {
    records
        .into_iter()
        .map(|r| {
            r.iter()
                .map(|f| {
                    f.iter()
                        .map(|&b| alphabet[b as usize % alphabet.len()] as char)
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
        })
        .filter(|r| !(r.is_empty() || (r.len() == 1 && r[0].is_empty())))
        .collect()
}

#[test]
fn escape_mode_write_then_read_round_trips() {
    fn prop(records: Vec<Vec<Vec<u8>>>, cap: usize) -> bool {
        let records = non_blank_records(records, b"ab ,\"\\;\r\n");
        let mut wtr = WriterBuilder::new();
        wtr.mode(Mode::Escape).escape(b'\\').buffer_capacity(1 + cap % 64);
        let mut rdr = ReaderBuilder::new();
        rdr.mode(Mode::Escape).escape(b'\\').buffer_capacity(1 + cap % 32);
        write_then_read(&wtr, &rdr, &records)
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Vec<Vec<Vec<u8>>>, usize) -> bool);
}

#[test]
fn no_escape_mode_write_then_read_round_trips() {
    fn prop(records: Vec<Vec<Vec<u8>>>, cap: usize) -> bool {
        // No delimiter or terminator bytes: this mode cannot protect them.
        let records = non_blank_records(records, b"ab \";|");
        let mut wtr = WriterBuilder::new();
        wtr.mode(Mode::NoEscape).buffer_capacity(1 + cap % 64);
        let mut rdr = ReaderBuilder::new();
        rdr.mode(Mode::NoEscape).buffer_capacity(1 + cap % 32);
        write_then_read(&wtr, &rdr, &records)
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Vec<Vec<Vec<u8>>>, usize) -> bool);
}

#[test]
fn multi_byte_delimiter_write_then_read_round_trips() {
    fn prop(records: Vec<Vec<Vec<u8>>>, cap: usize) -> bool {
        let records: Rows = records
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.iter().map(|f| to_alphabet(f)).collect())
            .collect();
        let mut wtr = WriterBuilder::new();
        wtr.delimiter_str("||").buffer_capacity(1 + cap % 64);
        let mut rdr = ReaderBuilder::new();
        rdr.delimiter_str("||").buffer_capacity(1 + cap % 32);
        write_then_read(&wtr, &rdr, &records)
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Vec<Vec<Vec<u8>>>, usize) -> bool);
}

#[test]
fn read_then_write_then_read_is_stable() {
    fn prop(input: Vec<u8>, cap: usize) -> bool {
        let data = to_alphabet(&input);
        let mut rdr = ReaderBuilder::new();
        rdr.bad_data(BadData::Ignore).buffer_capacity(1 + cap % 32);
        let first = read_all(&rdr, data.as_bytes());
        let mut wtr = WriterBuilder::new();
        wtr.buffer_capacity(1 + cap % 64);
        write_then_read(&wtr, &ReaderBuilder::new(), &first)
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Vec<u8>, usize) -> bool);
}

#[test]
fn buffer_capacity_never_changes_rows() {
    fn prop(input: Vec<u8>, cap: usize) -> bool {
        let data = to_alphabet(&input);
        let mut builder = ReaderBuilder::new();
        builder.bad_data(BadData::Ignore);
        let expected = read_raw(&builder, data.as_bytes());
        builder.buffer_capacity(1 + cap % 16);
        read_raw(&builder, data.as_bytes()) == expected
    }
    QuickCheck::new().quickcheck(prop as fn(Vec<u8>, usize) -> bool);
}

#[test]
fn unquoted_field_count_is_delimiters_plus_one() {
    fn prop(input: Vec<u8>) -> bool {
        let data: String =
            input.iter().map(|&b| b"ab,\n"[b as usize % 4] as char).collect();
        let expected: Vec<usize> = data
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| line.matches(',').count() + 1)
            .collect();
        let got: Vec<usize> = read_default(&data).iter().map(|r| r.len()).collect();
        got == expected
    }
    QuickCheck::new().quickcheck(prop as fn(Vec<u8>) -> bool);
}
