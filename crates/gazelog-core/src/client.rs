use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::{io::AsyncWriteExt, net::TcpStream};

/// Sends session-control commands to a running instance
#[derive(Debug)]
pub struct CommandClient {
    addr: SocketAddr,
}

impl CommandClient {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Send each command as one newline-terminated line over a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the write fails.
    pub async fn send_commands<I, S>(&self, commands: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .with_context(|| format!("Failed to connect to {}", self.addr))?;

        let mut sent = 0;
        for command in commands {
            let command = command.as_ref().trim();
            if command.is_empty() {
                continue;
            }
            stream.write_all(format!("{command}\n").as_bytes()).await?;
            sent += 1;
        }
        stream.shutdown().await?;
        Ok(sent)
    }
}
