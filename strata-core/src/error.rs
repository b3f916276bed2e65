use std::time::Duration;
use thiserror::Error as ThisError;

/// Failure taxonomy of the action layer.
///
/// Per-record failures are deliberately absent: they are attached to the
/// offending [`Record`](crate::Record) and never abort sibling records.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The filter or descriptor could not be mapped to the backend's native
    /// query language. Raised before any native I/O happens.
    #[error("translation error: {0}")]
    Translation(String),

    /// A native driver, network or statement failure, wrapped with the
    /// operation kind and table it happened on.
    #[error("{op} on `{table}` failed: {source:#}")]
    Execution {
        op: &'static str,
        table: String,
        #[source]
        source: anyhow::Error,
    },

    /// The timeout canceller force-cancelled the native operation before the
    /// first result arrived.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A commit, rollback or statement was attempted on a transaction whose
    /// session has already been released.
    #[error("{0} on a closed transaction")]
    ClosedTransaction(&'static str),
}

impl Error {
    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation(message.into())
    }

    pub fn execution(
        op: &'static str,
        table: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Execution {
            op,
            table: table.into(),
            source: source.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(..))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
