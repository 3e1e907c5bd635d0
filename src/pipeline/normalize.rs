//! Field normalization: map the vendor's untrusted extraction payload into
//! the canonical receipt.
//!
//! ## Why a total function?
//!
//! Partial OCR output is more useful surfaced to the human reviewer than
//! rejected outright. This stage therefore never fails: every logical field
//! degrades independently to its documented default (`""`, `0`, `None`), and
//! a payload with zero documents yields the all-default receipt. It is also
//! pure — no I/O, no clock, no configuration — which is what makes the money
//! and date cleanup rules exhaustively testable.
//!
//! ## Field shapes
//!
//! For any one field the vendor may return a record with a typed value, a
//! record with only the raw OCR text, a bare scalar, or nothing at all.
//! Rather than optional-chaining through those shapes at every use site,
//! each field is classified once into a [`FieldValue`] tagged union, and the
//! precedence rule — typed value over raw text over default — is applied in
//! exactly one place per logical field.

use crate::output::CanonicalReceipt;
use crate::pipeline::poll::AnalyzeResult;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Vendor field holding the merchant name.
const FIELD_MERCHANT: &str = "MerchantName";
/// Vendor field holding the receipt total.
const FIELD_TOTAL: &str = "Total";
/// Vendor field holding the transaction date.
const FIELD_DATE: &str = "TransactionDate";

/// Keys under which the vendor nests a typed value, in precedence order.
const TYPED_VALUE_KEYS: [&str; 6] = [
    "valueString",
    "valueDate",
    "valueNumber",
    "valueCurrency",
    "value",
    "amount",
];

/// One extracted field after shape classification.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The vendor supplied a typed value (string, number, date, or a
    /// currency record reduced to its amount).
    Typed(Value),
    /// Only the raw OCR text was present.
    RawText(String),
    /// The field is missing entirely.
    Absent,
}

/// The vendor's extracted fields for one document, classified per field.
///
/// Treated as untrusted, partially-present data throughout.
#[derive(Debug, Default)]
pub struct RawExtractedFields {
    fields: BTreeMap<String, FieldValue>,
}

impl RawExtractedFields {
    /// Classify the fields of the first extracted document. Zero documents
    /// (or zero fields) yields the empty mapping — and, downstream, the
    /// all-default receipt.
    pub fn from_analysis(result: &AnalyzeResult) -> Self {
        match result.documents.first() {
            Some(doc) => Self::from_fields(&doc.fields),
            None => {
                debug!("Vendor returned zero documents; normalizing to defaults");
                Self::default()
            }
        }
    }

    /// Classify a raw vendor field map.
    pub fn from_fields(fields: &serde_json::Map<String, Value>) -> Self {
        let fields = fields
            .iter()
            .map(|(name, raw)| (name.clone(), classify(raw)))
            .collect();
        Self { fields }
    }

    /// Look up a field; missing fields read as [`FieldValue::Absent`].
    pub fn field(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&FieldValue::Absent)
    }
}

/// Classify one raw vendor field into the tagged union.
fn classify(raw: &Value) -> FieldValue {
    match raw {
        Value::Null => FieldValue::Absent,
        Value::Object(map) => {
            for key in TYPED_VALUE_KEYS {
                match map.get(key) {
                    Some(Value::Null) | None => continue,
                    // A currency record reduces to its amount.
                    Some(Value::Object(currency)) => {
                        if let Some(amount) = currency.get("amount").filter(|v| !v.is_null()) {
                            return FieldValue::Typed(amount.clone());
                        }
                    }
                    Some(typed) => return FieldValue::Typed(typed.clone()),
                }
            }
            match map.get("content").and_then(Value::as_str) {
                Some(text) if !text.trim().is_empty() => FieldValue::RawText(text.to_string()),
                _ => FieldValue::Absent,
            }
        }
        // Bare scalar: the vendor's oldest field shape.
        scalar => FieldValue::Typed(scalar.clone()),
    }
}

/// Produce the canonical receipt for one analysis payload.
///
/// `permanent_image_url` is the long-term reference to the stored image,
/// never the short-lived readable URL the vendor was given.
pub fn normalize(fields: &RawExtractedFields, permanent_image_url: &str) -> CanonicalReceipt {
    CanonicalReceipt {
        store_name: normalize_store_name(fields.field(FIELD_MERCHANT)),
        total_amount: normalize_amount(fields.field(FIELD_TOTAL)),
        transaction_date: normalize_date(fields.field(FIELD_DATE)),
        source_image_url: permanent_image_url.to_string(),
    }
}

// ── Store name ───────────────────────────────────────────────────────────

fn normalize_store_name(value: &FieldValue) -> String {
    field_text(value).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Best-effort text rendering of a field, typed value preferred.
fn field_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Typed(Value::String(s)) => Some(s.clone()),
        FieldValue::Typed(Value::Number(n)) => Some(n.to_string()),
        FieldValue::Typed(_) => None,
        FieldValue::RawText(s) => Some(s.clone()),
        FieldValue::Absent => None,
    }
}

// ── Monetary amount ──────────────────────────────────────────────────────

/// Normalize a monetary field to a non-negative decimal; `0` if
/// unrecoverable.
fn normalize_amount(value: &FieldValue) -> Decimal {
    match value {
        FieldValue::Typed(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map(|d| d.abs())
            .unwrap_or(Decimal::ZERO),
        FieldValue::Typed(Value::String(s)) | FieldValue::RawText(s) => parse_money(s),
        _ => Decimal::ZERO,
    }
}

/// Parse vendor money text: currency symbols, thousands separators, and
/// sign characters are stripped; what remains is parsed as a decimal.
///
/// Sign is dropped outright rather than parsed-then-negated because sign is
/// not meaningful in the source data — `"₩-5,500"` and `"1234.56-"`
/// (accounting-style trailing minus) both normalize to their absolute value.
fn parse_money(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

// ── Transaction date ─────────────────────────────────────────────────────

/// Formats the vendor's raw text has been observed in, beyond ISO.
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

/// Datetime formats, for typed values carrying a time-of-day we discard.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Loose year-month-day extraction: `2024.01.02`, `2024년 1월 2일`, and
/// similar separator variants seen on printed receipts.
static RE_LOOSE_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\D{1,3}(\d{1,2})\D{1,3}(\d{1,2})").unwrap());

/// Normalize a date field to a calendar date; `None` if unrecoverable —
/// never a raw unparsed string.
fn normalize_date(value: &FieldValue) -> Option<NaiveDate> {
    field_text(value).as_deref().and_then(parse_date)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }

    // Time-of-day is discarded per the output contract.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }

    if let Some(caps) = RE_LOOSE_YMD.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

// ── Tests ────────────────────────────────────────────────────────────────
