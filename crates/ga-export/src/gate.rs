use ga_schemas::{Micros, Procedure, ProcedureStatus};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Eligible lines
// ---------------------------------------------------------------------------

/// One approved procedure as handed to the serializer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLine {
    pub procedure_id: Uuid,
    pub sequence_number: i32,
    pub tariff_code: String,
    pub description: String,
    pub executed_quantity: i64,
    pub approved_value: Micros,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBatch {
    pub guide_id: Uuid,
    pub lines: Vec<ExportLine>,
    pub approved_total: Micros,
}

/// `true` iff at least one procedure is APPROVED.
pub fn is_export_allowed(procedures: &[Procedure]) -> bool {
    procedures
        .iter()
        .any(|p| p.status == ProcedureStatus::Approved)
}

/// APPROVED procedures in input order, each with its approved value.
///
/// An APPROVED row without an approved value is skipped; the gate refuses
/// such guides before this is reached.
pub fn export_eligible(procedures: &[Procedure]) -> Vec<ExportLine> {
    procedures
        .iter()
        .filter(|p| p.status == ProcedureStatus::Approved)
        .filter_map(|p| {
            p.approved_value.map(|approved_value| ExportLine {
                procedure_id: p.procedure_id,
                sequence_number: p.sequence_number,
                tariff_code: p.tariff_code.clone(),
                description: p.description.clone(),
                executed_quantity: p.executed_quantity,
                approved_value,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExportRefusalReason {
    NoApprovedProcedures,
    MissingApprovedValue { procedure_id: Uuid },
    TotalOverflow,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRefusal {
    pub guide_id: Uuid,
    pub procedure_count: usize,
    #[serde(flatten)]
    pub reason: ExportRefusalReason,
}

impl std::fmt::Display for ExportRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            ExportRefusalReason::NoApprovedProcedures => write!(
                f,
                "export refused for guide {}: none of {} procedure(s) is approved",
                self.guide_id, self.procedure_count
            ),
            ExportRefusalReason::MissingApprovedValue { procedure_id } => write!(
                f,
                "export refused for guide {}: approved procedure {procedure_id} has no approved value",
                self.guide_id
            ),
            ExportRefusalReason::TotalOverflow => write!(
                f,
                "export refused for guide {}: approved total overflows",
                self.guide_id
            ),
        }
    }
}

impl std::error::Error for ExportRefusal {}

/// Serialization may not start unless [`ExportGate::Permitted`] is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportGate {
    Permitted { batch: ExportBatch },
    Blocked { refusal: ExportRefusal },
}

impl ExportGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, ExportGate::Permitted { .. })
    }

    pub fn is_blocked(&self) -> bool {
        !self.is_permitted()
    }
}

pub fn check_export_gate(guide_id: Uuid, procedures: &[Procedure]) -> ExportGate {
    let blocked = |reason| ExportGate::Blocked {
        refusal: ExportRefusal {
            guide_id,
            procedure_count: procedures.len(),
            reason,
        },
    };

    if !is_export_allowed(procedures) {
        return blocked(ExportRefusalReason::NoApprovedProcedures);
    }

    if let Some(p) = procedures
        .iter()
        .find(|p| p.status == ProcedureStatus::Approved && p.approved_value.is_none())
    {
        return blocked(ExportRefusalReason::MissingApprovedValue {
            procedure_id: p.procedure_id,
        });
    }

    let lines = export_eligible(procedures);
    let mut approved_total = Micros::ZERO;
    for l in &lines {
        match approved_total.checked_add(l.approved_value) {
            Some(t) => approved_total = t,
            None => return blocked(ExportRefusalReason::TotalOverflow),
        }
    }

    ExportGate::Permitted {
        batch: ExportBatch {
            guide_id,
            lines,
            approved_total,
        },
    }
}

// ---------------------------------------------------------------------------
// Serializer boundary
// ---------------------------------------------------------------------------

/// Renders a permitted batch into a submission file body.
pub trait ExportSerializer {
    type Error: std::error::Error;

    fn serialize(&self, batch: &ExportBatch) -> Result<Vec<u8>, Self::Error>;
}

/// Pretty JSON of the batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonExportSerializer;

impl ExportSerializer for JsonExportSerializer {
    type Error = serde_json::Error;

    fn serialize(&self, batch: &ExportBatch) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec_pretty(batch)
    }
}

#[derive(Debug)]
pub enum ExportError<E> {
    Blocked(ExportRefusal),
    Serializer(E),
}

impl<E: std::fmt::Display> std::fmt::Display for ExportError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Blocked(r) => write!(f, "{r}"),
            ExportError::Serializer(e) => write!(f, "export serializer failed: {e}"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for ExportError<E> {}

/// Gate, then serialize. The serializer is not invoked for a blocked guide.
pub fn export_guide<S: ExportSerializer>(
    guide_id: Uuid,
    procedures: &[Procedure],
    serializer: &S,
) -> Result<Vec<u8>, ExportError<S::Error>> {
    match check_export_gate(guide_id, procedures) {
        ExportGate::Permitted { batch } => serializer.serialize(&batch).map_err(ExportError::Serializer),
        ExportGate::Blocked { refusal } => {
            warn!(guide_id = %guide_id, procedures = refusal.procedure_count, "{refusal}");
            Err(ExportError::Blocked(refusal))
        }
    }
}
