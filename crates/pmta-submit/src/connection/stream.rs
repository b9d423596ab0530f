//! Buffered acceptor stream with I/O deadlines.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Longest reply line accepted, terminator included. RFC 5321 allows 512.
const MAX_LINE_LENGTH: usize = 4096;

/// Stream to the acceptor. Every read and write is bounded by the
/// configured I/O timeout.
#[derive(Debug)]
pub struct AcceptorStream<S = TcpStream> {
    reader: BufReader<S>,
    io_timeout: Duration,
}

impl<S> AcceptorStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    #[must_use]
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            io_timeout,
        }
    }

    /// Reads one line, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the acceptor closed the
    /// connection, [`io::ErrorKind::TimedOut`] if no full line arrived in
    /// time, [`io::ErrorKind::InvalidData`] if the line is too long, or the
    /// underlying socket error.
    pub async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_LENGTH as u64);
        let read = timeout(self.io_timeout, limited.read_line(&mut line))
            .await
            .map_err(|_| timed_out("read"))??;

        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "acceptor closed the connection",
            ));
        }
        if read >= MAX_LINE_LENGTH && !line.ends_with('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("reply line longer than {MAX_LINE_LENGTH} bytes"),
            ));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    /// Writes and flushes `data`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::TimedOut`] if the write stalls, or the
    /// underlying socket error.
    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self.reader.get_mut();
        timeout(self.io_timeout, async {
            writer.write_all(data).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| timed_out("write"))?
    }

    /// Shuts down the write half; errors are not interesting at this point.
    pub async fn shutdown(&mut self) {
        let _ = timeout(self.io_timeout, self.reader.get_mut().shutdown()).await;
    }
}

/// Opens a TCP connection to `host:port` within `connect_timeout`.
///
/// # Errors
///
/// Returns the connect error, or [`io::ErrorKind::TimedOut`].
pub async fn connect(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
) -> io::Result<AcceptorStream> {
    let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| timed_out("connect"))??;
    stream.set_nodelay(true)?;
    Ok(AcceptorStream::new(stream, io_timeout))
}

fn timed_out(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{op} deadline elapsed"))
}
