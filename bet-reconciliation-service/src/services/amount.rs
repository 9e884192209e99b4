//! Monetary amount normalization.
//!
//! Statement amounts arrive as JSON numbers, plain numeric strings, strings
//! with thousands separators (`"1,000"`) or accounting notation for
//! negatives (`"(1,234.50)"`).

use crate::models::{Diagnostic, DiagnosticKind};
use serde_json::Value;
use tracing::warn;

/// Signed value of an amount. Absent, null and empty inputs are `0.0`.
/// Strings that still fail to parse yield `NaN`; callers that accumulate
/// should go through [`amount_or_zero`] so the coercion is reported.
pub fn normalize_amount(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => normalize_str(s),
        Some(Value::Bool(_)) | Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

fn normalize_str(s: &str) -> f64 {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    match cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => inner.trim().parse::<f64>().map(|v| -v).unwrap_or(f64::NAN),
        None => cleaned.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Normalized amount with `NaN` coerced to zero. Each coercion is logged
/// and pushed onto `diagnostics` as a validation problem.
pub fn amount_or_zero(
    value: Option<&Value>,
    collection: &str,
    record_id: &str,
    field: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> f64 {
    let amount = normalize_amount(value);
    if amount.is_nan() {
        warn!(
            collection = collection,
            record_id = record_id,
            field = field,
            raw = ?value,
            "Unparseable amount counted as zero"
        );
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::Validation,
            collection,
            record_id,
            format!("Unparseable {} {:?} counted as zero", field, value),
        ));
        0.0
    } else {
        amount
    }
}

/// Round to cents for report output.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
