use std::cmp;
use std::future::{poll_fn, Future};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use csv_stream::{
    AsyncReader, AsyncWriter, BadData, Error, ReaderBuilder, StringRecord,
    WriterBuilder,
};

/// A source that is not ready on every other poll and hands out at most
/// three bytes when it is.
#[derive(Debug)]
struct Stutter<'a> {
    data: &'a [u8],
    ready: bool,
}

impl<'a> AsyncRead for Stutter<'a> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.ready {
            self.ready = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.ready = false;
        let n = cmp::min(3, cmp::min(buf.remaining(), self.data.len()));
        buf.put_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn async_read_rows() {
    let data = &b"a,b,\"c,d\",e\nx,y,z"[..];
    let mut rdr = AsyncReader::from_reader(data);
    let mut rec = StringRecord::new();
    assert!(rdr.read_record(&mut rec).await.unwrap());
    assert_eq!(rec, vec!["a", "b", "c,d", "e"]);
    assert!(rdr.read_record(&mut rec).await.unwrap());
    assert_eq!(rec, vec!["x", "y", "z"]);
    assert!(!rdr.read_record(&mut rec).await.unwrap());
    assert!(rdr.is_done());
}

#[tokio::test]
async fn async_small_buffer_and_rows() {
    let data = "name;quote\n\"Ada\";\"says \"\"hi\"\"\"\n";
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .buffer_capacity(2)
        .from_async_reader(data.as_bytes())
        .unwrap();
    let mut got = vec![];
    while rdr.move_next().await.unwrap() {
        let row = rdr.current_row().unwrap();
        got.push(row.field(1).unwrap().into_owned());
    }
    assert_eq!(got, vec!["quote", "says \"hi\""]);
}

#[tokio::test]
async fn async_bad_data_is_reported() {
    let data = &b"\"ab\"cd,e\nf,g\n"[..];
    let mut rdr = ReaderBuilder::new().from_async_reader(data).unwrap();
    assert!(matches!(rdr.move_next().await, Err(Error::BadData(_))));
    assert!(rdr.move_next().await.unwrap());
    assert_eq!(rdr.position().record(), 1);

    let mut rdr = ReaderBuilder::new()
        .bad_data(BadData::Ignore)
        .from_async_reader(data)
        .unwrap();
    assert!(rdr.move_next().await.unwrap());
    assert_eq!(rdr.current_row().unwrap().field(0).unwrap(), "abcd");
}

#[tokio::test]
async fn async_write_records() {
    let mut wtr = AsyncWriter::from_writer(vec![]);
    wtr.write_record(&["a,b", "plain", "has\"quote"]).await.unwrap();
    wtr.write_field("x").await.unwrap();
    wtr.write_field_quoted("y", true).await.unwrap();
    wtr.next_record().await.unwrap();
    assert_eq!(wtr.records_written(), 2);
    let out = wtr.into_inner().await.unwrap();
    assert_eq!(out, b"\"a,b\",plain,\"has\"\"quote\"\nx,\"y\"\n".to_vec());
}

#[tokio::test]
async fn async_write_through_small_buffer() {
    let long = "ab\"".repeat(40);
    let mut wtr = WriterBuilder::new()
        .buffer_capacity(1)
        .from_async_writer(vec![])
        .unwrap();
    wtr.write_record(&[long.as_str(), ""]).await.unwrap();
    let out = wtr.into_inner().await.unwrap();
    let expected = format!("\"{}\",\n", "ab\"\"".repeat(40));
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[tokio::test]
async fn async_dropped_reads_keep_rows_intact() {
    let src = Stutter { data: b"a,\"b\nc\",d\ne,f\n", ready: false };
    let mut rdr =
        ReaderBuilder::new().buffer_capacity(4).from_async_reader(src).unwrap();
    let mut rows: Vec<Vec<String>> = vec![];
    let mut dropped = 0;
    loop {
        let step = {
            let mut next = Box::pin(rdr.move_next());
            poll_fn(|cx| Poll::Ready(next.as_mut().poll(cx))).await
        };
        match step {
            Poll::Pending => dropped += 1,
            Poll::Ready(more) => {
                if !more.unwrap() {
                    break;
                }
                let row = rdr.current_row().unwrap();
                rows.push(
                    (0..row.len())
                        .map(|i| row.field(i).unwrap().into_owned())
                        .collect(),
                );
            }
        }
    }
    assert!(dropped > 0);
    assert_eq!(rows, vec![vec!["a", "b\nc", "d"], vec!["e", "f"]]);
}
