//! Price Resolution Map
//!
//! Flattens the pricing breakdown into two name-keyed lookup tables.
//! Later entries overwrite earlier ones with the same key.

use std::collections::HashMap;

use serde::Serialize;

use crate::coerce::alias_number;
use crate::payload::{BreakdownService, PricingBreakdownEntry};

/// Field aliases for a header-level total, in priority order.
pub const HEADER_TOTAL_ALIASES: &[&str] = &["totalAmount", "headerTotal", "total"];

/// Field aliases for a service price inside the breakdown, in priority order.
pub const SERVICE_PRICE_ALIASES: &[&str] = &["finalAmount", "totalAmount", "price"];

/// Aliases used when summing a breakdown's services. `price` is not consulted.
pub const SERVICE_SUM_ALIASES: &[&str] = &["finalAmount", "totalAmount"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceMap {
    header_price: HashMap<String, f64>,
    service_price: HashMap<String, f64>,
}

impl PriceMap {
    pub fn build(entries: &[PricingBreakdownEntry]) -> Self {
        let mut map = Self::default();

        for entry in entries {
            if let Some(key) = entry.key() {
                let total = alias_number(&entry.raw, HEADER_TOTAL_ALIASES);
                map.header_price.insert(key.to_string(), total);
            }

            for service in &entry.services {
                if service.name.is_empty() {
                    continue;
                }
                let price = alias_number(&service.raw, SERVICE_PRICE_ALIASES);
                map.service_price.insert(service.name.clone(), price);
            }
        }

        tracing::debug!(
            headers = map.header_price.len(),
            services = map.service_price.len(),
            "price map built"
        );

        map
    }

    /// Header-level total by exact trimmed name.
    pub fn header_price(&self, name: &str) -> Option<f64> {
        self.header_price.get(name.trim()).copied()
    }

    /// Service price by exact trimmed name.
    pub fn service_price(&self, name: &str) -> Option<f64> {
        self.service_price.get(name.trim()).copied()
    }

    /// Resolve a service price, falling back to its declared price when the
    /// breakdown has nothing non-zero for it.
    pub fn resolve_service(&self, name: &str, declared: f64) -> f64 {
        match self.service_price(name) {
            Some(price) if price != 0.0 => price,
            _ => declared,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header_price.is_empty() && self.service_price.is_empty()
    }
}

/// Sum a breakdown entry's services using `finalAmount` then `totalAmount`.
pub fn sum_breakdown_services(services: &[BreakdownService]) -> f64 {
    services
        .iter()
        .map(|s| alias_number(&s.raw, SERVICE_SUM_ALIASES))
        .sum()
}
