//! Ingestion boundary: loosely-typed guide payloads into strict [`Procedure`]s.
//!
//! Upstream parsers (XML dialect, spreadsheets, hand-written JSON) produce the
//! `Raw*` shapes below. [`normalize_guide`] is the only way in: every field is
//! validated once here and nothing optional or untyped travels further.
//!
//! - Pure, deterministic conversion. No IO.
//! - The first violation is returned as an [`IngestError`]; the guide is
//!   either accepted whole or not at all.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Micros, MoneyParseError};
use crate::procedure::{Procedure, ProcedureStatus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a raw guide could not be accepted. `index` is the 1-based position of
/// the offending procedure within the guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    Json(String),
    InvalidGuideId { raw: String },
    MissingOperator,
    EmptyGuide,
    InvalidProcedureId { index: usize, raw: String },
    DuplicateProcedureId { procedure_id: Uuid },
    InvalidTariffCode { index: usize, raw: String },
    MissingQuantity { index: usize },
    NonPositiveQuantity { index: usize, qty: i64 },
    MissingUnitValue { index: usize },
    InvalidAmount {
        index: usize,
        field: &'static str,
        error: MoneyParseError,
    },
    NegativeAmount { index: usize, field: &'static str },
    AmountOverflow { index: usize },
    /// Ingested procedures must start PENDING.
    UnsupportedStatus { index: usize, raw: String },
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "guide payload is not valid JSON: {msg}"),
            Self::InvalidGuideId { raw } => write!(f, "guide_id '{raw}' is not a UUID"),
            Self::MissingOperator => write!(f, "guide has empty operator_id"),
            Self::EmptyGuide => write!(f, "guide has no procedures"),
            Self::InvalidProcedureId { index, raw } => {
                write!(f, "procedure #{index}: procedure_id '{raw}' is not a UUID")
            }
            Self::DuplicateProcedureId { procedure_id } => {
                write!(f, "procedure_id {procedure_id} appears more than once")
            }
            Self::InvalidTariffCode { index, raw } => {
                write!(f, "procedure #{index}: tariff code '{raw}' must be non-empty ASCII digits")
            }
            Self::MissingQuantity { index } => {
                write!(f, "procedure #{index}: executed_quantity is missing")
            }
            Self::NonPositiveQuantity { index, qty } => {
                write!(f, "procedure #{index}: executed_quantity {qty} must be positive")
            }
            Self::MissingUnitValue { index } => {
                write!(f, "procedure #{index}: unit_value is missing")
            }
            Self::InvalidAmount { index, field, error } => {
                write!(f, "procedure #{index}: {field}: {error}")
            }
            Self::NegativeAmount { index, field } => {
                write!(f, "procedure #{index}: {field} must not be negative")
            }
            Self::AmountOverflow { index } => {
                write!(f, "procedure #{index}: unit_value x executed_quantity overflows")
            }
            Self::UnsupportedStatus { index, raw } => {
                write!(f, "procedure #{index}: ingested status '{raw}' must be absent or PENDING")
            }
        }
    }
}

impl std::error::Error for IngestError {}

// ---------------------------------------------------------------------------
// Raw shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProcedure {
    pub procedure_id: String,
    #[serde(default)]
    pub sequence_number: Option<i32>,
    pub tariff_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub executed_quantity: Option<i64>,
    /// Decimal string; `,` is accepted as the decimal separator.
    #[serde(default)]
    pub unit_value: Option<String>,
    /// Defaults to `unit_value × executed_quantity` when absent.
    #[serde(default)]
    pub total_value: Option<String>,
    #[serde(default)]
    pub surgical_tier: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGuide {
    pub guide_id: String,
    pub operator_id: String,
    #[serde(default)]
    pub procedures: Vec<RawProcedure>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

pub fn normalize_guide_json(json: &str) -> Result<Vec<Procedure>, IngestError> {
    let raw: RawGuide = serde_json::from_str(json).map_err(|e| IngestError::Json(e.to_string()))?;
    normalize_guide(&raw)
}

pub fn normalize_guide(raw: &RawGuide) -> Result<Vec<Procedure>, IngestError> {
    let guide_id = Uuid::parse_str(raw.guide_id.trim()).map_err(|_| IngestError::InvalidGuideId {
        raw: raw.guide_id.clone(),
    })?;
    let operator_id = raw.operator_id.trim();
    if operator_id.is_empty() {
        return Err(IngestError::MissingOperator);
    }
    if raw.procedures.is_empty() {
        return Err(IngestError::EmptyGuide);
    }

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(raw.procedures.len());

    for (i, rp) in raw.procedures.iter().enumerate() {
        let index = i + 1;
        let p = normalize_procedure(index, guide_id, operator_id, rp)?;
        if !seen.insert(p.procedure_id) {
            return Err(IngestError::DuplicateProcedureId {
                procedure_id: p.procedure_id,
            });
        }
        out.push(p);
    }

    Ok(out)
}

fn normalize_procedure(
    index: usize,
    guide_id: Uuid,
    operator_id: &str,
    rp: &RawProcedure,
) -> Result<Procedure, IngestError> {
    let procedure_id =
        Uuid::parse_str(rp.procedure_id.trim()).map_err(|_| IngestError::InvalidProcedureId {
            index,
            raw: rp.procedure_id.clone(),
        })?;

    let tariff_code = rp.tariff_code.trim();
    if tariff_code.is_empty() || !tariff_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(IngestError::InvalidTariffCode {
            index,
            raw: rp.tariff_code.clone(),
        });
    }

    let qty = rp
        .executed_quantity
        .ok_or(IngestError::MissingQuantity { index })?;
    if qty <= 0 {
        return Err(IngestError::NonPositiveQuantity { index, qty });
    }

    let unit_raw = rp
        .unit_value
        .as_deref()
        .ok_or(IngestError::MissingUnitValue { index })?;
    let unit_value = parse_amount(index, "unit_value", unit_raw)?;
    let total_value = match rp.total_value.as_deref() {
        Some(t) => parse_amount(index, "total_value", t)?,
        None => unit_value
            .checked_mul_qty(qty)
            .ok_or(IngestError::AmountOverflow { index })?,
    };

    if let Some(s) = rp.status.as_deref() {
        if ProcedureStatus::parse(s) != Some(ProcedureStatus::Pending) {
            return Err(IngestError::UnsupportedStatus {
                index,
                raw: s.to_string(),
            });
        }
    }

    let surgical_tier = rp
        .surgical_tier
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(Procedure {
        procedure_id,
        guide_id,
        operator_id: operator_id.to_string(),
        sequence_number: rp.sequence_number.unwrap_or(index as i32),
        tariff_code: tariff_code.to_string(),
        description: rp.description.clone().unwrap_or_default().trim().to_string(),
        executed_quantity: qty,
        unit_value,
        total_value,
        surgical_tier,
        status: ProcedureStatus::Pending,
        approved_value: None,
        rejection: None,
    })
}

fn parse_amount(index: usize, field: &'static str, raw: &str) -> Result<Micros, IngestError> {
    let owned;
    let s = if raw.contains(',') && !raw.contains('.') {
        owned = raw.replace(',', ".");
        owned.as_str()
    } else {
        raw
    };
    let m = Micros::parse_decimal(s).map_err(|error| IngestError::InvalidAmount { index, field, error })?;
    if m.is_negative() {
        return Err(IngestError::NegativeAmount { index, field });
    }
    Ok(m)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = "7d4f8a36-1f7e-4a55-9b8e-2c1d3e4f5a60";
    const P1: &str = "0a000000-0000-4000-8000-000000000001";
    const P2: &str = "0a000000-0000-4000-8000-000000000002";

    fn raw_proc(id: &str) -> RawProcedure {
        RawProcedure {
            procedure_id: id.to_string(),
            sequence_number: None,
            tariff_code: "10101012".to_string(),
            description: Some(" Consulta em consultorio ".to_string()),
            executed_quantity: Some(2),
            unit_value: Some("50,25".to_string()),
            total_value: None,
            surgical_tier: Some("  ".to_string()),
            status: None,
        }
    }

    fn guide(procs: Vec<RawProcedure>) -> RawGuide {
        RawGuide {
            guide_id: GUIDE.to_string(),
            operator_id: "OP-1".to_string(),
            procedures: procs,
        }
    }

    #[test]
    fn normalizes_defaults_and_comma_decimals() {
        let out = normalize_guide(&guide(vec![raw_proc(P1)])).unwrap();
        assert_eq!(out.len(), 1);
        let p = &out[0];
        assert_eq!(p.unit_value, Micros::new(50_250_000));
        assert_eq!(p.total_value, Micros::new(100_500_000));
        assert_eq!(p.sequence_number, 1);
        assert_eq!(p.description, "Consulta em consultorio");
        assert_eq!(p.surgical_tier, None);
        assert_eq!(p.status, ProcedureStatus::Pending);
        assert_eq!(p.operator_id, "OP-1");
    }

    #[test]
    fn explicit_total_is_kept_verbatim() {
        let mut rp = raw_proc(P1);
        rp.total_value = Some("150.00".to_string());
        let out = normalize_guide(&guide(vec![rp])).unwrap();
        assert_eq!(out[0].total_value, Micros::from_units(150));
    }

    #[test]
    fn rejects_non_digit_tariff_code() {
        let mut rp = raw_proc(P1);
        rp.tariff_code = "1010-1012".to_string();
        let err = normalize_guide(&guide(vec![rp])).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTariffCode { index: 1, .. }));
    }

    #[test]
    fn rejects_zero_quantity() {
        let mut rp = raw_proc(P1);
        rp.executed_quantity = Some(0);
        let err = normalize_guide(&guide(vec![rp])).unwrap_err();
        assert_eq!(err, IngestError::NonPositiveQuantity { index: 1, qty: 0 });
    }

    #[test]
    fn rejects_negative_and_over_precise_amounts() {
        let mut rp = raw_proc(P1);
        rp.unit_value = Some("-1.00".to_string());
        let err = normalize_guide(&guide(vec![rp])).unwrap_err();
        assert_eq!(err, IngestError::NegativeAmount { index: 1, field: "unit_value" });

        let mut rp = raw_proc(P1);
        rp.total_value = Some("1.1234567".to_string());
        let err = normalize_guide(&guide(vec![rp])).unwrap_err();
        assert!(matches!(err, IngestError::InvalidAmount { field: "total_value", .. }));
    }

    #[test]
    fn rejects_pre_decided_status() {
        let mut rp = raw_proc(P1);
        rp.status = Some("APPROVED".to_string());
        let err = normalize_guide(&guide(vec![rp])).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedStatus { .. }));

        let mut rp = raw_proc(P1);
        rp.status = Some("pending".to_string());
        assert!(normalize_guide(&guide(vec![rp])).is_ok());
    }

    #[test]
    fn rejects_duplicate_ids_and_empty_guides() {
        let err = normalize_guide(&guide(vec![raw_proc(P1), raw_proc(P1)])).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateProcedureId { .. }));
        assert_eq!(normalize_guide(&guide(vec![])).unwrap_err(), IngestError::EmptyGuide);
        assert_eq!(normalize_guide(&guide(vec![raw_proc(P1), raw_proc(P2)])).unwrap().len(), 2);
    }

    #[test]
    fn json_entry_point_reports_parse_errors() {
        let err = normalize_guide_json("{not json").unwrap_err();
        assert!(matches!(err, IngestError::Json(_)));

        let json = format!(
            r#"{{"guide_id":"{GUIDE}","operator_id":"OP-1","procedures":[
                {{"procedure_id":"{P1}","tariff_code":"10101012","executed_quantity":1,"unit_value":"100.00"}}
            ]}}"#
        );
        let out = normalize_guide_json(&json).unwrap();
        assert_eq!(out[0].total_value, Micros::from_units(100));
    }
}
