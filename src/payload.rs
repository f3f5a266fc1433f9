//! Quotation Payload - Lenient Input Model
//!
//! The payload arrives as a loosely-structured JSON mapping. Construction
//! never fails: wrong types and missing fields become empty values, and the
//! original mapping is kept for pass-through to the markup renderer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::{alias_number, alias_string, array_field, coerce_number, coerce_string, is_truthy};

/// How individual service prices are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Every service shows its own price.
    #[default]
    Bifurcated,
    /// Only the totals are shown.
    Lumpsum,
}

impl DisplayMode {
    /// Anything other than `lumpsum` is treated as bifurcated.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("lumpsum") {
            Self::Lumpsum
        } else {
            Self::Bifurcated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bifurcated => "bifurcated",
            Self::Lumpsum => "lumpsum",
        }
    }
}

/// A line beneath a service: either a bare label or a structured record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubService {
    Label(String),
    Structured {
        id: String,
        name: String,
        included: bool,
    },
}

impl SubService {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => {
                // Absent flag means included; an explicit value is judged loosely.
                let included = match value.get("included") {
                    None => true,
                    present => is_truthy(present),
                };
                Some(Self::Structured {
                    id: coerce_string(value.get("id"), ""),
                    name: alias_string(value, &["name", "text", "label"]).unwrap_or_default(),
                    included,
                })
            }
            Value::String(_) | Value::Number(_) => {
                Some(Self::Label(coerce_string(Some(value), "")))
            }
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Label(_) => "",
            Self::Structured { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Label(name) => name,
            Self::Structured { name, .. } => name,
        }
    }

    /// Whether this line survives into rendering.
    pub fn is_rendered(&self) -> bool {
        match self {
            Self::Label(name) => !name.is_empty(),
            Self::Structured { name, included, .. } => *included && !name.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub name: String,
    pub label: Option<String>,
    pub declared_price: f64,
    pub sub_services: Vec<SubService>,
}

impl Service {
    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            name: coerce_string(value.get("name"), ""),
            label: alias_string(value, &["label"]),
            declared_price: coerce_number(value.get("price"), 0.0),
            sub_services: array_field(value, "subServices")
                .iter()
                .filter_map(SubService::from_value)
                .collect(),
        })
    }

    /// Name used when the service itself becomes a rendered line.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.label.clone().unwrap_or_else(|| "Service".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub name: String,
    /// Secondary `header` field some payloads use instead of `name`.
    pub alt_name: Option<String>,
    pub services: Vec<Service>,
}

impl Header {
    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            name: coerce_string(value.get("name"), ""),
            alt_name: alias_string(value, &["header"]),
            services: array_field(value, "services")
                .iter()
                .filter_map(Service::from_value)
                .collect(),
        })
    }
}

/// One service row inside a pricing-breakdown entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownService {
    pub name: String,
    pub raw: Value,
}

/// A pricing-breakdown record, associated with headers by name.
///
/// Price fields are kept raw; their aliases are resolved by the pricing
/// module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingBreakdownEntry {
    pub name: String,
    pub header: String,
    pub raw: Value,
    pub services: Vec<BreakdownService>,
}

impl PricingBreakdownEntry {
    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let services = array_field(value, "services")
            .iter()
            .filter(|s| s.is_object())
            .map(|s| BreakdownService {
                name: coerce_string(s.get("name"), ""),
                raw: s.clone(),
            })
            .collect();
        Some(Self {
            name: coerce_string(value.get("name"), ""),
            header: coerce_string(value.get("header"), ""),
            raw: value.clone(),
            services,
        })
    }

    /// The association key: `name`, else `header`.
    pub fn key(&self) -> Option<&str> {
        if !self.name.is_empty() {
            Some(&self.name)
        } else if !self.header.is_empty() {
            Some(&self.header)
        } else {
            None
        }
    }
}

/// The quotation record as handed over by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct QuotationPayload {
    pub id: Option<String>,
    pub headers: Vec<Header>,
    pub pricing_breakdown: Vec<PricingBreakdownEntry>,
    pub total_amount: f64,
    pub discount_amount: f64,
    pub discount_percent: f64,
    pub validity: Option<String>,
    pub payment_schedule: Option<String>,
    pub created_at: Option<String>,
    pub display_mode: DisplayMode,
    pub applicable_terms: Vec<String>,
    pub custom_terms: Vec<String>,
    pub page_title: Option<String>,
    pub header_title: Option<String>,
    raw: Value,
}

impl QuotationPayload {
    pub fn from_value(raw: Value) -> Self {
        let id = match raw.get("id") {
            None | Some(Value::Null) => None,
            present => Some(coerce_string(present, "")),
        };
        Self {
            id,
            headers: array_field(&raw, "headers")
                .iter()
                .filter_map(Header::from_value)
                .collect(),
            pricing_breakdown: array_field(&raw, "pricingBreakdown")
                .iter()
                .filter_map(PricingBreakdownEntry::from_value)
                .collect(),
            total_amount: coerce_number(raw.get("totalAmount"), 0.0),
            discount_amount: coerce_number(raw.get("discountAmount"), 0.0),
            discount_percent: alias_number(&raw, &["discountPercent", "effectiveDiscountPercent"]),
            validity: alias_string(&raw, &["validity", "validityPeriod"]),
            payment_schedule: alias_string(&raw, &["paymentSchedule", "payment_schedule"]),
            created_at: alias_string(&raw, &["createdAt"]),
            display_mode: raw
                .get("displayMode")
                .and_then(Value::as_str)
                .map(DisplayMode::parse)
                .unwrap_or_default(),
            applicable_terms: string_list(&raw, "applicableTerms"),
            custom_terms: string_list(&raw, "customTerms"),
            page_title: alias_string(&raw, &["pageTitle"]),
            header_title: alias_string(&raw, &["header"]),
            raw,
        }
    }

    /// The untouched input mapping.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Declared percent when positive, otherwise derived from the discount
    /// amount against the pre-discount total. Rounded to two places.
    pub fn effective_discount_percent(&self) -> f64 {
        let percent = if self.discount_percent > 0.0 {
            self.discount_percent
        } else if self.total_amount != 0.0 && self.discount_amount != 0.0 {
            let base = self.total_amount + self.discount_amount;
            if base == 0.0 {
                0.0
            } else {
                self.discount_amount / base * 100.0
            }
        } else {
            0.0
        };
        (percent * 100.0).round() / 100.0
    }
}

fn string_list(raw: &Value, key: &str) -> Vec<String> {
    array_field(raw, key)
        .iter()
        .map(|v| coerce_string(Some(v), ""))
        .filter(|s| !s.is_empty())
        .collect()
}

impl From<Value> for QuotationPayload {
    fn from(raw: Value) -> Self {
        Self::from_value(raw)
    }
}

impl From<QuotationPayload> for Value {
    fn from(payload: QuotationPayload) -> Self {
        payload.raw
    }
}

impl Default for QuotationPayload {
    fn default() -> Self {
        Self::from_value(Value::Null)
    }
}
