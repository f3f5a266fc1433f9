//! Terms Assembler - Ordered Term Sources
//!
//! Each source contributes zero or more terms. The assembler concatenates
//! them in a fixed order and never de-duplicates.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::payload::QuotationPayload;

pub const DEFAULT_TERMS: &[&str] = &[
    "The above quotation is subject to this project only.",
    "The prices mentioned above are in particular to One Project per year.",
    "The services outlined above are included within the project scope. Any additional services not specified are excluded from this scope.",
    "The prices mentioned above are applicable to One Project only for the duration of the services obtained.",
    "The prices mentioned above DO NOT include Government Fees.",
    "The prices mentioned above DO NOT include Edit Fees.",
    "The prices listed above do not include any applicable statutory taxes.",
    "Any and all services not mentioned in the above scope of services are not applicable.",
    "All Out-of-pocket expenses incurred for completion of the work shall be re-imbursed to RERA Easy.",
];

pub const PACKAGE_ABC_CATEGORY: &str = "Package A,B,C";
pub const PACKAGE_D_CATEGORY: &str = "Package D";

const PACKAGE_ABC_TERMS: &[&str] = &[
    "Payment is due at the initiation of services, followed by annual payments thereafter.",
    "Any kind of drafting of legal documents or contracts are not applicable.",
    "The quoted fee covers annual MahaRERA compliance services, with billing on a Yearly basis for convenience and predictable financial planning.",
    "Invoices will be generated at a predetermined interval for each year in advance.",
    "The initial invoice will be issued from the date of issuance or a start date as specified in the Work Order.",
];

const PACKAGE_D_TERMS: &[&str] = &[
    "All Out-of-pocket expenses incurred for the explicit purpose of Commuting, Refreshment meals of RERA Easy's personnel shall be re-imbursed to RERA Easy, subject to submission of relevant invoices, bills and records submitted.",
];

/// Fixed term block for a known category key.
pub fn category_terms(category: &str) -> Option<&'static [&'static str]> {
    match category {
        PACKAGE_ABC_CATEGORY => Some(PACKAGE_ABC_TERMS),
        PACKAGE_D_CATEGORY => Some(PACKAGE_D_TERMS),
        _ => None,
    }
}

/// Inputs shared by every source.
pub struct TermsContext<'a> {
    pub payload: &'a QuotationPayload,
    /// Base date when the payload has no `createdAt`.
    pub now: DateTime<Utc>,
}

/// A source of terms.
pub trait TermSource {
    fn name(&self) -> &'static str;
    fn terms(&self, ctx: &TermsContext<'_>) -> Vec<String>;
}

// --- Concrete Sources ---

pub struct ValidityTerm;

impl TermSource for ValidityTerm {
    fn name(&self) -> &'static str { "validity" }

    fn terms(&self, ctx: &TermsContext<'_>) -> Vec<String> {
        let Some(validity) = ctx.payload.validity.as_deref() else {
            return vec![];
        };
        let days = validity_days(validity);
        if days == 0 {
            return vec![];
        }

        match valid_until(ctx.payload.created_at.as_deref(), ctx.now, days) {
            Some(date) => vec![format!("The quotation is valid upto {}.", date.format("%d/%m/%Y"))],
            None => {
                tracing::warn!(
                    created_at = ?ctx.payload.created_at,
                    days,
                    "could not compute validity date"
                );
                vec![format!("The quotation is valid for {} days.", days)]
            }
        }
    }
}

pub struct PaymentScheduleTerm;

impl TermSource for PaymentScheduleTerm {
    fn name(&self) -> &'static str { "payment_schedule" }

    fn terms(&self, ctx: &TermsContext<'_>) -> Vec<String> {
        ctx.payload
            .payment_schedule
            .iter()
            .map(|schedule| {
                format!(
                    "{} of the total amount must be paid in advance before commencement of work/service.",
                    schedule
                )
            })
            .collect()
    }
}

pub struct DefaultTerms;

impl TermSource for DefaultTerms {
    fn name(&self) -> &'static str { "default" }

    fn terms(&self, _ctx: &TermsContext<'_>) -> Vec<String> {
        DEFAULT_TERMS.iter().map(|t| t.to_string()).collect()
    }
}

pub struct CategoryTerms;

impl TermSource for CategoryTerms {
    fn name(&self) -> &'static str { "category" }

    fn terms(&self, ctx: &TermsContext<'_>) -> Vec<String> {
        ctx.payload
            .applicable_terms
            .iter()
            .filter_map(|category| category_terms(category))
            .flat_map(|block| block.iter().map(|t| t.to_string()))
            .collect()
    }
}

pub struct CustomTerms;

impl TermSource for CustomTerms {
    fn name(&self) -> &'static str { "custom" }

    fn terms(&self, ctx: &TermsContext<'_>) -> Vec<String> {
        ctx.payload.custom_terms.clone()
    }
}

/// Extract a day count: the literals 7, 15 and 30 are checked first (as
/// substrings, in that order), then the first run of digits.
pub fn validity_days(validity: &str) -> u32 {
    let lowered = validity.to_lowercase();
    for days in [7, 15, 30] {
        if lowered.contains(&days.to_string()) {
            return days;
        }
    }

    let digits: String = lowered
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// `created_at + days`, evaluated in the timestamp's own offset.
/// `None` when the timestamp cannot be parsed.
pub fn valid_until(created_at: Option<&str>, now: DateTime<Utc>, days: u32) -> Option<NaiveDate> {
    let base = match created_at {
        Some(raw) => parse_timestamp(raw)?,
        None => now.naive_utc(),
    };
    let delta = TimeDelta::try_days(i64::from(days))?;
    base.checked_add_signed(delta).map(|dt| dt.date())
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Assembler orchestrates the sources in order.
pub struct TermsAssembler {
    sources: Vec<Box<dyn TermSource>>,
}

impl TermsAssembler {
    pub fn new() -> Self {
        Self {
            sources: vec![
                Box::new(ValidityTerm),
                Box::new(PaymentScheduleTerm),
                Box::new(DefaultTerms),
                Box::new(CategoryTerms),
                Box::new(CustomTerms),
            ],
        }
    }

    pub fn assemble(&self, payload: &QuotationPayload, now: DateTime<Utc>) -> Vec<String> {
        let ctx = TermsContext { payload, now };
        let mut all_terms = vec![];

        for source in &self.sources {
            let terms = source.terms(&ctx);
            tracing::debug!(source = source.name(), count = terms.len(), "terms collected");
            all_terms.extend(terms);
        }

        all_terms
    }
}

impl Default for TermsAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn assemble(raw: serde_json::Value) -> Vec<String> {
        TermsAssembler::new().assemble(&QuotationPayload::from_value(raw), now())
    }

    #[test]
    fn test_validity_days() {
        assert_eq!(validity_days("7 days"), 7);
        assert_eq!(validity_days("15 Days"), 15);
        assert_eq!(validity_days("30 days"), 30);
        assert_eq!(validity_days("45 days"), 45);
        assert_eq!(validity_days("17 days"), 7);
        assert_eq!(validity_days("one week"), 0);
    }

    #[test]
    fn test_validity_from_created_at() {
        let terms = assemble(json!({"validity": "30 days", "createdAt": "2024-01-01T00:00:00Z"}));
        assert_eq!(terms[0], "The quotation is valid upto 31/01/2024.");
    }

    #[test]
    fn test_validity_defaults_to_now() {
        let terms = assemble(json!({"validityPeriod": "7 days"}));
        assert_eq!(terms[0], "The quotation is valid upto 17/03/2025.");
    }

    #[test]
    fn test_validity_degrades_on_bad_date() {
        let terms = assemble(json!({"validity": "15 days", "createdAt": "yesterday"}));
        assert_eq!(terms[0], "The quotation is valid for 15 days.");
    }

    #[test]
    fn test_order_and_no_dedup() {
        let terms = assemble(json!({
            "validity": "7 days",
            "createdAt": "2024-06-01",
            "paymentSchedule": "50%",
            "applicableTerms": ["Package D", "Unknown", "Package D"],
            "customTerms": ["Extra", "Extra"]
        }));

        assert_eq!(terms[0], "The quotation is valid upto 08/06/2024.");
        assert_eq!(
            terms[1],
            "50% of the total amount must be paid in advance before commencement of work/service."
        );
        assert_eq!(&terms[2..2 + DEFAULT_TERMS.len()], DEFAULT_TERMS);

        let rest = &terms[2 + DEFAULT_TERMS.len()..];
        assert_eq!(rest.len(), 4);
        assert_eq!(rest[0], PACKAGE_D_TERMS[0]);
        assert_eq!(rest[1], PACKAGE_D_TERMS[0]);
        assert_eq!(rest[2], "Extra");
        assert_eq!(rest[3], "Extra");
    }

    #[test]
    fn test_bare_payload_only_defaults() {
        let terms = assemble(json!({}));
        assert_eq!(terms, DEFAULT_TERMS);
    }
}
