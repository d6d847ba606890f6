//! Record reader for the remux process's diagnostic stream.
//!
//! FFmpeg rewrites its status line with bare `\r`, so a plain `lines()`
//! reader would sit on those updates until the next `\n`. Records here end
//! at either `\r` or `\n`; empty records are skipped. A run without either
//! delimiter is cut into records of at most [`MAX_RECORD_LEN`] bytes.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

pub const MAX_RECORD_LEN: usize = 64 * 1024;

pub struct DiagnosticReader<R> {
    inner: BufReader<R>,
    record: Vec<u8>,
}

impl<R> DiagnosticReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            record: Vec::with_capacity(256),
        }
    }

    /// Next non-empty record, lossily decoded as UTF-8 and trimmed.
    /// `Ok(None)` once the stream is exhausted.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            let (consumed, complete) = {
                let buf = self.inner.fill_buf().await?;
                if buf.is_empty() {
                    break;
                }
                let room = MAX_RECORD_LEN - self.record.len();
                match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                    Some(idx) if idx <= room => {
                        self.record.extend_from_slice(&buf[..idx]);
                        (idx + 1, true)
                    }
                    _ => {
                        let take = buf.len().min(room);
                        self.record.extend_from_slice(&buf[..take]);
                        (take, self.record.len() >= MAX_RECORD_LEN)
                    }
                }
            };
            self.inner.consume(consumed);

            if complete {
                if let Some(record) = self.take_record() {
                    return Ok(Some(record));
                }
            }
        }

        Ok(self.take_record())
    }

    fn take_record(&mut self) -> Option<String> {
        let record = String::from_utf8_lossy(&self.record).trim().to_string();
        self.record.clear();
        (!record.is_empty()).then_some(record)
    }
}
