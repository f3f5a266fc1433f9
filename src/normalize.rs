//! Header/Service Normalizer
//!
//! Walks headers -> services -> sub-services and produces the resolved
//! structures the renderer consumes. Prices come from the [`PriceMap`],
//! package totals from an ordered fallback chain.

use serde::{Deserialize, Serialize};

use crate::payload::{DisplayMode, Header, PricingBreakdownEntry, Service};
use crate::pricing::{sum_breakdown_services, PriceMap};
use crate::templates::RenderMode;

/// Case-insensitive substrings that mark a header as a package.
///
/// The bare "package" marker matches any header containing the word,
/// including names such as "Repackaging Service".
pub const PACKAGE_MARKERS: &[&str] = &["package a", "package b", "package c", "package d", "package"];

pub fn is_package_header(name: &str) -> bool {
    let lowered = name.to_lowercase();
    PACKAGE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Which step of the package-total chain produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageTotalSource {
    HeaderPrice,
    ExactBreakdown,
    FuzzyBreakdown,
    ServiceSum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedSubService {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedService {
    pub name: String,
    pub price: f64,
    /// `None` tells the renderer to suppress the price.
    pub display_price: Option<f64>,
    pub show_individual_price: bool,
    pub sub_services: Vec<RenderedSubService>,
    /// Lines printed beneath the service for the active render mode.
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHeader {
    pub name: String,
    /// Heading text as printed.
    pub label: String,
    pub is_package: bool,
    pub package_total: f64,
    pub package_total_source: Option<PackageTotalSource>,
    /// Sum of the resolved service prices.
    pub subtotal: f64,
    pub services: Vec<ResolvedService>,
}

pub struct Normalizer<'a> {
    prices: &'a PriceMap,
    breakdown: &'a [PricingBreakdownEntry],
    display_mode: DisplayMode,
    render_mode: RenderMode,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        prices: &'a PriceMap,
        breakdown: &'a [PricingBreakdownEntry],
        display_mode: DisplayMode,
        render_mode: RenderMode,
    ) -> Self {
        Self {
            prices,
            breakdown,
            display_mode,
            render_mode,
        }
    }

    pub fn normalize(&self, headers: &[Header]) -> Vec<ResolvedHeader> {
        headers
            .iter()
            .enumerate()
            .map(|(idx, header)| self.normalize_header(idx, header))
            .collect()
    }

    fn normalize_header(&self, idx: usize, header: &Header) -> ResolvedHeader {
        let is_package = is_package_header(&header.name);

        let (package_total, package_total_source) = if is_package {
            match self.package_total(header) {
                Some((total, source)) => (total, Some(source)),
                None => (0.0, None),
            }
        } else {
            (0.0, None)
        };

        let services: Vec<ResolvedService> = header
            .services
            .iter()
            .map(|service| self.normalize_service(service))
            .collect();
        let subtotal = services.iter().map(|s| s.price).sum();

        ResolvedHeader {
            name: header.name.clone(),
            label: self.header_label(idx, header),
            is_package,
            package_total,
            package_total_source,
            subtotal,
            services,
        }
    }

    fn header_label(&self, idx: usize, header: &Header) -> String {
        match self.render_mode {
            RenderMode::Single => {
                let name = if !header.name.is_empty() {
                    header.name.clone()
                } else {
                    header
                        .alt_name
                        .clone()
                        .unwrap_or_else(|| format!("Header {}", idx + 1))
                };
                name.to_uppercase()
            }
            RenderMode::Summary | RenderMode::Multipage => header.name.clone(),
        }
    }

    /// Walk the package-total chain, stopping at the first non-zero tier.
    /// Later tiers are never evaluated once one succeeds.
    fn package_total(&self, header: &Header) -> Option<(f64, PackageTotalSource)> {
        let name = header.name.trim();

        let tiers: [(PackageTotalSource, &dyn Fn() -> f64); 4] = [
            (PackageTotalSource::HeaderPrice, &|| {
                self.prices.header_price(name).unwrap_or(0.0)
            }),
            (PackageTotalSource::ExactBreakdown, &|| {
                self.breakdown
                    .iter()
                    .find(|entry| entry.name == name || entry.header == name)
                    .map(|entry| sum_breakdown_services(&entry.services))
                    .unwrap_or(0.0)
            }),
            (PackageTotalSource::FuzzyBreakdown, &|| {
                self.breakdown
                    .iter()
                    .find(|entry| fuzzy_match(entry, name))
                    .map(|entry| sum_breakdown_services(&entry.services))
                    .unwrap_or(0.0)
            }),
            (PackageTotalSource::ServiceSum, &|| {
                header
                    .services
                    .iter()
                    .map(|s| self.prices.resolve_service(&s.name, s.declared_price))
                    .sum::<f64>()
            }),
        ];

        for (source, tier) in tiers {
            let total = tier();
            if total != 0.0 {
                tracing::debug!(header = name, ?source, total, "package total resolved");
                return Some((total, source));
            }
        }

        tracing::debug!(header = name, "package total unresolved");
        None
    }

    fn normalize_service(&self, service: &Service) -> ResolvedService {
        let price = self.prices.resolve_service(&service.name, service.declared_price);

        let (display_price, show_individual_price) = match self.display_mode {
            DisplayMode::Lumpsum => (None, false),
            DisplayMode::Bifurcated => (Some(price), true),
        };

        let sub_services: Vec<RenderedSubService> = service
            .sub_services
            .iter()
            .filter(|sub| sub.is_rendered())
            .map(|sub| RenderedSubService {
                id: sub.id().to_string(),
                name: sub.name().to_string(),
            })
            .collect();

        let lines = if self.render_mode == RenderMode::Single && service.sub_services.is_empty() {
            vec![service.display_name()]
        } else {
            sub_services.iter().map(|s| s.name.clone()).collect()
        };

        ResolvedService {
            name: service.name.clone(),
            price,
            display_price,
            show_individual_price,
            sub_services,
            lines,
        }
    }
}

/// Case-insensitive equality, or containment in either direction.
fn fuzzy_match(entry: &PricingBreakdownEntry, header_name: &str) -> bool {
    let target = header_name.to_lowercase();
    [&entry.name, &entry.header].into_iter().any(|candidate| {
        let candidate = candidate.to_lowercase();
        if candidate.is_empty() {
            return false;
        }
        candidate == target || target.contains(&candidate) || candidate.contains(&target)
    })
}
