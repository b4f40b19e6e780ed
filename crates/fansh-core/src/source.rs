//! Hostnames read from an input stream
//!
//! Tokens are separated by any whitespace, the way a shell splits words.
//! Bytes that are not valid UTF-8 are decoded lossily rather than ending
//! the input. The source is single pass; a read error ends it early and
//! hosts already produced still run.

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Stdin};
use tracing::warn;

/// Lazy sequence of hostnames over `R`
pub struct HostSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl HostSource<Stdin> {
    /// Read hostnames from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> HostSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Next hostname, or `None` once the input is exhausted
    pub async fn next_host(&mut self) -> Option<String> {
        loop {
            if let Some(host) = self.pending.pop_front() {
                return Some(host);
            }
            if self.finished {
                return None;
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    self.pending
                        .extend(line.split_whitespace().map(str::to_string));
                }
                Err(e) => {
                    warn!(error = %e, "failed to read hosts, stopping input");
                    self.finished = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    async fn collect<R: AsyncRead + Unpin>(input: R) -> Vec<String> {
        let mut source = HostSource::new(input);
        let mut hosts = Vec::new();
        while let Some(host) = source.next_host().await {
            hosts.push(host);
        }
        hosts
    }

    /// Yields `data` once, then fails every read
    struct FailingReader {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "input went away",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_splits_on_any_whitespace() {
        let hosts = collect(&b"a b\n\tc\n\n  d  e\r\nf"[..]).await;
        assert_eq!(hosts, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert!(collect(&b""[..]).await.is_empty());
        assert!(collect(&b" \n\t\n"[..]).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        assert_eq!(collect(&b"a a a"[..]).await, vec!["a", "a", "a"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_end_input() {
        let hosts = collect(&b"a b\n\xff\xfe\nc\n"[..]).await;
        assert_eq!(hosts, vec!["a", "b", "\u{FFFD}\u{FFFD}", "c"]);
    }

    #[tokio::test]
    async fn test_read_error_keeps_earlier_hosts() {
        let hosts = collect(FailingReader {
            data: Some(b"a b\n"),
        })
        .await;
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_exhausted_source_stays_exhausted() {
        let mut source = HostSource::new(&b"only"[..]);
        assert_eq!(source.next_host().await.as_deref(), Some("only"));
        assert_eq!(source.next_host().await, None);
        assert_eq!(source.next_host().await, None);
    }
}
