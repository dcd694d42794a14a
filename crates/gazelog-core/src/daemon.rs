use anyhow::{Context, Result};
use gazelog_storage::{Database, Exporter, RecordWriter};
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch};

use crate::{
    command_channel::CommandChannel,
    config::Config,
    runner::{Finalized, FinishReason, GazeFeed, SessionEvent, SessionRunner},
};

/// Composition root: the command channel, the session queue and its owner.
pub struct Daemon<W: RecordWriter> {
    channel: CommandChannel,
    runner: SessionRunner<W>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl<W> Daemon<W>
where
    W: RecordWriter + Send + 'static,
{
    /// Bind the command channel and set up the session queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the port cannot be bound.
    pub async fn bind(
        config: &Config,
        exporter: Exporter<W>,
        archive: Option<Database>,
    ) -> Result<Self> {
        config.validate()?;
        let addr = config.listen_addr()?;
        let channel = CommandChannel::bind(addr, config.flush_after())
            .await
            .with_context(|| format!("Failed to bind command channel on {addr}"))?;
        let (events_tx, events_rx) = mpsc::channel(config.queue_capacity);

        Ok(Self {
            channel,
            runner: SessionRunner::new(exporter, archive),
            events_tx,
            events_rx,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.channel.local_addr()
    }

    /// Handle for the gaze source; clone freely.
    #[must_use]
    pub fn gaze_feed(&self) -> GazeFeed {
        GazeFeed::new(self.events_tx.clone())
    }

    /// Run until the session finishes; Ctrl-C finalizes like `stop`.
    pub async fn run_with_signals(self) -> Finalized {
        let interrupt_tx = self.events_tx.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received Ctrl-C, shutting down...");
                let _ = interrupt_tx
                    .send(SessionEvent::Finish(FinishReason::Interrupted))
                    .await;
            }
        });

        let finalized = self.run().await;
        interrupt.abort();
        finalized
    }

    /// Run until a `stop` command or a finish event.
    pub async fn run(self) -> Finalized {
        let Self {
            channel,
            runner,
            events_tx,
            events_rx,
        } = self;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let channel_task = tokio::spawn(channel.run(events_tx, shutdown_rx));
        log::info!("Session daemon started, waiting for commands");

        let finalized = runner.run(events_rx, shutdown_tx).await;

        if let Err(e) = channel_task.await {
            log::error!("Command channel task failed: {e}");
        }
        log::info!("Session daemon shut down gracefully.");
        finalized
    }
}
