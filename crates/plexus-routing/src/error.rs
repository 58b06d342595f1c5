use thiserror::Error;

/// Errors produced during candidate selection
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No routing rule matched the request metadata
    #[error("no routing rule matched caller '{caller}'")]
    NoRuleMatched { caller: String },

    /// Ranking produced an empty chain
    #[error("no compatible provider available")]
    NoCandidates,
}
