//! Total Calculator
//!
//! One canonical total from three sources, tried in order. The result is
//! never zero or negative.

use serde::{Deserialize, Serialize};

use crate::normalize::ResolvedHeader;
use crate::payload::QuotationPayload;
use crate::pricing::sum_breakdown_services;

/// Substituted when every source comes up empty.
pub const MINIMUM_TOTAL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSource {
    /// The payload's own `totalAmount`.
    Declared,
    /// Sum of every service in the pricing breakdown.
    Breakdown,
    /// Package totals and service prices of the resolved headers.
    Headers,
    /// Nothing usable; the minimum was substituted.
    Minimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTotal {
    pub amount: f64,
    pub source: TotalSource,
}

pub fn canonical_total(payload: &QuotationPayload, headers: &[ResolvedHeader]) -> CanonicalTotal {
    let (amount, source) = first_non_zero(payload, headers);

    if amount <= 0.0 {
        tracing::warn!(amount, ?source, "total is not positive, substituting minimum");
        return CanonicalTotal {
            amount: MINIMUM_TOTAL,
            source: TotalSource::Minimum,
        };
    }

    tracing::info!(amount, ?source, "canonical total resolved");
    CanonicalTotal { amount, source }
}

fn first_non_zero(payload: &QuotationPayload, headers: &[ResolvedHeader]) -> (f64, TotalSource) {
    if payload.total_amount != 0.0 {
        return (payload.total_amount, TotalSource::Declared);
    }

    let breakdown: f64 = payload
        .pricing_breakdown
        .iter()
        .map(|entry| sum_breakdown_services(&entry.services))
        .sum();
    if breakdown != 0.0 {
        return (breakdown, TotalSource::Breakdown);
    }

    (header_total(headers), TotalSource::Headers)
}

/// Packages contribute their package total when they have one; everything
/// else contributes its service prices.
pub fn header_total(headers: &[ResolvedHeader]) -> f64 {
    headers
        .iter()
        .map(|header| {
            if header.is_package && header.package_total != 0.0 {
                header.package_total
            } else {
                header.services.iter().map(|s| s.price).sum()
            }
        })
        .sum()
}
