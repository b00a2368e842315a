/// Lifecycle phase of an [`Interceptor`](super::Interceptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed; nothing has run.
    Parsed,
    Installing,
    /// Store populated; requests are served.
    Installed,
    Activating,
    /// Stale stores purged; requests are served.
    Activated,
    /// Install failed. Terminal.
    Redundant,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Parsed => "parsed",
            Phase::Installing => "installing",
            Phase::Installed => "installed",
            Phase::Activating => "activating",
            Phase::Activated => "activated",
            Phase::Redundant => "redundant",
        }
    }

    /// Whether the current store is complete enough to serve from.
    pub fn is_serving(&self) -> bool {
        matches!(self, Phase::Installed | Phase::Activating | Phase::Activated)
    }
}
