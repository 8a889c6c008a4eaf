use ga_schemas::{ProcedureStatus, MIN_REJECTION_REASON_LEN};
use uuid::Uuid;

/// Caller input that is refused before any store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingCategory,
    UnknownCategory { raw: String },
    ReasonTooShort { len: usize },
    MissingActor,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCategory => write!(f, "rejection category is required"),
            Self::UnknownCategory { raw } => write!(f, "unknown rejection category '{raw}'"),
            Self::ReasonTooShort { len } => write!(
                f,
                "rejection reason must have at least {MIN_REJECTION_REASON_LEN} characters (got {len})"
            ),
            Self::MissingActor => write!(f, "actor identity is required"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure reported by a [`crate::ProcedureStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound { procedure_id: Uuid },
    /// The row was not in the expected status when the commit ran.
    Conflict {
        procedure_id: Uuid,
        actual: ProcedureStatus,
    },
    /// Timeout, connection loss or any other retryable failure.
    Transient(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { procedure_id } => write!(f, "procedure {procedure_id} not found"),
            Self::Conflict {
                procedure_id,
                actual,
            } => write!(f, "procedure {procedure_id} is {actual}"),
            Self::Transient(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Refusal to load a guide into a [`crate::MemoryProcedureStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuideInsertError {
    GuideLoaded { guide_id: Uuid },
    /// The id already belongs to a stored procedure, possibly already decided.
    ProcedureExists {
        procedure_id: Uuid,
        guide_id: Uuid,
        status: ProcedureStatus,
    },
}

impl std::fmt::Display for GuideInsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GuideLoaded { guide_id } => write!(f, "guide {guide_id} already loaded"),
            Self::ProcedureExists {
                procedure_id,
                guide_id,
                status,
            } => write!(
                f,
                "procedure {procedure_id} already exists in guide {guide_id} with status {status}"
            ),
        }
    }
}

impl std::error::Error for GuideInsertError {}

/// Returned by every [`crate::DecisionEngine`] transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    Validation(ValidationError),
    NotFound { procedure_id: Uuid },
    /// The procedure is not in a status the transition accepts.
    Conflict {
        procedure_id: Uuid,
        status: ProcedureStatus,
        action: &'static str,
    },
    Transient(String),
}

impl std::fmt::Display for DecisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation failed: {e}"),
            Self::NotFound { procedure_id } => write!(f, "procedure {procedure_id} not found"),
            Self::Conflict {
                procedure_id,
                status,
                action,
            } => write!(f, "cannot {action} procedure {procedure_id}: status is {status}"),
            Self::Transient(msg) => write!(f, "transient failure: {msg}"),
        }
    }
}

impl std::error::Error for DecisionError {}

impl From<ValidationError> for DecisionError {
    fn from(e: ValidationError) -> Self {
        DecisionError::Validation(e)
    }
}

impl DecisionError {
    pub(crate) fn from_store(e: StoreError, action: &'static str) -> Self {
        match e {
            StoreError::NotFound { procedure_id } => DecisionError::NotFound { procedure_id },
            StoreError::Conflict {
                procedure_id,
                actual,
            } => DecisionError::Conflict {
                procedure_id,
                status: actual,
                action,
            },
            StoreError::Transient(msg) => DecisionError::Transient(msg),
        }
    }
}
