use thiserror::Error;

/// Failure taxonomy for the conversion workflow.
///
/// Remote-facing variants carry enough context (step name, remote message)
/// for an operator to re-run only the affected batch; none of them trigger
/// automatic compensation of remote effects that already committed.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The remote numbering rule returned no transaction number. Treated as
    /// a configuration problem upstream, not retryable: aborts the run.
    #[error("Account numbering exhausted for base date {base_date}")]
    NumberingExhausted { base_date: String },

    /// A selected lot/item no longer resolves on the remote system; the
    /// inventory selection is stale. Aborts the current batch.
    #[error("Stale inventory: {reference} no longer resolves remotely")]
    StaleInventory { reference: String },

    /// A remote step returned a non-success response. Aborts the current
    /// batch; remote effects of earlier steps stand.
    #[error("Remote rejected {step}: {message}")]
    RemoteRejected { step: String, message: String },

    /// Malformed operator input. Local no-op, never reaches the remote.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A snapshot is missing required identity columns. Load refused, the
    /// in-memory state is untouched.
    #[error("Snapshot incompatible: {0}")]
    SnapshotIncompatible(String),

    /// Transport/decoding failure talking to the remote MES.
    #[error("Remote call failed: {0}")]
    Remote(String),

    /// No authenticated MES session is active.
    #[error("No active MES session")]
    NoSession,
}

impl ConvertError {
    pub fn rejected(step: &str, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            step: step.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable tag used in run reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NumberingExhausted { .. } => "numbering_exhausted",
            Self::StaleInventory { .. } => "stale_inventory",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::Validation(_) => "validation",
            Self::SnapshotIncompatible(_) => "snapshot_incompatible",
            Self::Remote(_) => "remote_transport",
            Self::NoSession => "no_session",
        }
    }
}
