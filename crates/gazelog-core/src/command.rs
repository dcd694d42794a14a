/// Remote session-control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// `pause...`; trailing text is ignored for matching
    Pause,
    /// `continue...`; trailing text is ignored for matching
    Continue,
    Unrecognized(String),
}

impl Command {
    /// Decode an already-trimmed token.
    ///
    /// `start` and `stop` must match exactly, `pause` and `continue` only as prefixes.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "start" => Self::Start,
            "stop" => Self::Stop,
            _ if raw.starts_with("pause") => Self::Pause,
            _ if raw.starts_with("continue") => Self::Continue,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}
