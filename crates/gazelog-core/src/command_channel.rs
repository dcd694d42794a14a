use std::{
    io,
    net::SocketAddr,
    str::{self, Utf8Error},
    time::Duration,
};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    sync::{mpsc, watch},
};

use crate::runner::SessionEvent;

/// Size of the fixed receive buffer
pub const RECEIVE_BUFFER_SIZE: usize = 1024;

/// Longest unterminated fragment kept before the connection is dropped
const MAX_PENDING_BYTES: usize = 16 * RECEIVE_BUFFER_SIZE;

/// Splits a byte stream into trimmed command tokens.
///
/// A fresh decoder treats every pushed chunk as one token, which is how
/// controllers without a delimiter send commands. The first newline switches
/// it to line framing for good: complete lines are decoded as they arrive and
/// bytes after the last newline are kept until [`LineDecoder::flush`].
#[derive(Debug)]
pub struct LineDecoder {
    pending: Vec<u8>,
    line_framed: bool,
    max_pending: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_pending(MAX_PENDING_BYTES)
    }
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that reports overflow once more than `max_pending` unterminated
    /// bytes are buffered.
    #[must_use]
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            line_framed: false,
            max_pending,
        }
    }

    /// Append `bytes` and return every complete, non-empty token.
    ///
    /// # Errors
    ///
    /// Returns an error if a complete token is not valid UTF-8.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, Utf8Error> {
        if !self.line_framed {
            if !bytes.contains(&b'\n') {
                return Ok(decode_token(bytes)?.into_iter().collect());
            }
            self.line_framed = true;
        }

        self.pending.extend_from_slice(bytes);

        let mut tokens = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(token) = decode_token(&line[..pos])? {
                tokens.push(token);
            }
        }
        Ok(tokens)
    }

    /// Emit the unterminated fragment, if it holds anything but whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the fragment is not valid UTF-8.
    pub fn flush(&mut self) -> Result<Option<String>, Utf8Error> {
        let rest = std::mem::take(&mut self.pending);
        decode_token(&rest)
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn is_line_framed(&self) -> bool {
        self.line_framed
    }

    /// The unterminated fragment has grown past the limit.
    #[must_use]
    pub fn is_overflowing(&self) -> bool {
        self.pending.len() > self.max_pending
    }
}

fn decode_token(bytes: &[u8]) -> Result<Option<String>, Utf8Error> {
    let text = str::from_utf8(bytes)?.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// How a single connection ended
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    Closed,
    Shutdown,
    ReceiverGone,
}

/// TCP listener for remote session-control commands.
///
/// Serves one connection at a time; further clients wait in the listen
/// backlog. Each token is handed to the session queue before the next read.
pub struct CommandChannel {
    listener: TcpListener,
    flush_after: Duration,
}

impl CommandChannel {
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, flush_after: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("Command channel listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            flush_after,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until `shutdown` turns true.
    ///
    /// Connection failures are logged and never end the loop. Returns once
    /// shutdown is signalled or nobody is left to receive commands.
    pub async fn run(
        self,
        events: mpsc::Sender<SessionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let accepted = tokio::select! {
                () = wait_for_shutdown(&mut shutdown) => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("Command channel accept error: {e}");
                    continue;
                }
            };

            log::info!("Command connection from {peer}");
            match self.serve(stream, &events, &mut shutdown).await {
                Ok(ConnectionEnd::Closed) => log::info!("Command connection {peer} closed"),
                Ok(ConnectionEnd::Shutdown) => break,
                Ok(ConnectionEnd::ReceiverGone) => {
                    log::debug!("Session queue closed, command channel stopping");
                    return;
                }
                Err(e) => log::warn!("Command connection {peer} dropped: {e}"),
            }
        }

        log::info!("Command channel shut down");
    }

    async fn serve(
        &self,
        mut stream: TcpStream,
        events: &mpsc::Sender<SessionEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> io::Result<ConnectionEnd> {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        let mut decoder = LineDecoder::new();

        loop {
            let quiet_after = decoder.has_pending().then_some(self.flush_after);
            let read = tokio::select! {
                () = wait_for_shutdown(shutdown) => return Ok(ConnectionEnd::Shutdown),
                read = read_chunk(&mut stream, &mut buf, quiet_after) => read?,
            };

            let (tokens, closed): (Vec<String>, bool) = match read {
                Some(0) => {
                    let rest = decoder.flush().map_err(invalid_data)?;
                    (rest.into_iter().collect(), true)
                }
                Some(n) => (decoder.push(&buf[..n]).map_err(invalid_data)?, false),
                None => {
                    let rest = decoder.flush().map_err(invalid_data)?;
                    (rest.into_iter().collect(), false)
                }
            };

            for token in tokens {
                log::debug!("Command received: {token:?}");
                if events.send(SessionEvent::Command(token)).await.is_err() {
                    return Ok(ConnectionEnd::ReceiverGone);
                }
            }

            if decoder.is_overflowing() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "unterminated command too long",
                ));
            }

            if closed {
                return Ok(ConnectionEnd::Closed);
            }
        }
    }
}

/// Read once. `Ok(None)` means the peer stayed quiet for `quiet_after`.
async fn read_chunk(
    stream: &mut TcpStream,
    buf: &mut [u8],
    quiet_after: Option<Duration>,
) -> io::Result<Option<usize>> {
    match quiet_after {
        Some(quiet) => match tokio::time::timeout(quiet, stream.read(buf)).await {
            Ok(read) => read.map(Some),
            Err(_) => Ok(None),
        },
        None => stream.read(buf).await.map(Some),
    }
}

/// Resolves once shutdown is requested or its sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn invalid_data(e: Utf8Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
