pub mod client;
pub mod command;
pub mod command_channel;
pub mod config;
pub mod daemon;
pub mod dwell;
pub mod runner;
pub mod session;

pub use client::CommandClient;
pub use command::Command;
pub use command_channel::{CommandChannel, LineDecoder};
pub use config::Config;
pub use daemon::Daemon;
pub use dwell::{DwellAccumulator, DwellTracker, GazeEventKind};
pub use runner::{
    Finalized, FinishReason, GazeFeed, SessionClock, SessionEvent, SessionGone, SessionRunner,
};
pub use session::{CommandOutcome, SessionController};
