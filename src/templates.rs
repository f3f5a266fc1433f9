//! Render Modes and the Markup Contract
//!
//! The pipeline hands a [`RenderModel`] to a [`MarkupRenderer`]; the
//! resulting markup goes to the page producer. Layout lives entirely on
//! the renderer side of this seam.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::ResolvedHeader;
use crate::payload::DisplayMode;
use crate::totals::TotalSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Compact one-page layout with upper-cased sections.
    Single,
    /// Summary layout with package totals and per-service prices.
    #[default]
    Summary,
    /// One page per header, then totals and terms pages.
    Multipage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown render mode: {0}")]
pub struct UnknownRenderMode(pub String);

impl FromStr for RenderMode {
    type Err = UnknownRenderMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "summary" => Ok(Self::Summary),
            "multipage" | "multi-page" => Ok(Self::Multipage),
            _ => Err(UnknownRenderMode(raw.to_string())),
        }
    }
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Summary => "summary",
            Self::Multipage => "multipage",
        }
    }

    /// Conventional template name for renderers that load files.
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Single => "quotation_template.html",
            Self::Summary => "quotation_summary_template.html",
            Self::Multipage => "quotation_multipage_template.html",
        }
    }
}

/// Everything the renderer may use. Built fresh per generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderModel {
    pub mode: RenderMode,
    pub page_title: String,
    pub headers: Vec<ResolvedHeader>,
    pub total_amount: f64,
    pub total_source: TotalSource,
    pub terms: Vec<String>,
    pub ref_number: String,
    /// Resolvable logo reference, empty when no logo was found.
    pub logo_src: String,
    pub watermark_logo: String,
    pub display_mode: DisplayMode,
    pub show_individual_prices: bool,
    pub discount_amount: f64,
    pub discount_percent: f64,
    pub effective_discount_percent: f64,
    /// The untouched payload, for pass-through fields.
    pub quotation_data: Value,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Turns a render model into markup for the page producer.
pub trait MarkupRenderer {
    fn render(&self, model: &RenderModel) -> Result<String, RenderError>;
}

/// Built-in HTML renderer covering all three modes.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    stylesheet: Option<String>,
}

const BASE_STYLE: &str = "body{font-family:Arial,Helvetica,sans-serif;font-size:11pt;color:#222}\
.top{display:flex;justify-content:space-between;align-items:center}\
.logo{max-height:60px}\
h1{text-align:center;font-size:16pt}\
h2{font-size:13pt;border-bottom:1px solid #999}\
.amount{text-align:right;font-weight:bold}\
.page{page-break-after:always}\
.page:last-child{page-break-after:auto}\
ol.terms li{margin-bottom:4px}";

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra CSS appended after the built-in rules.
    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = Some(css.into());
        self
    }

    fn open(&self, out: &mut String, model: &RenderModel) -> std::fmt::Result {
        write!(
            out,
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title><style>{}{}</style></head><body>",
            escape(&model.page_title),
            BASE_STYLE,
            self.stylesheet.as_deref().unwrap_or("")
        )
    }

    fn top_bar(&self, out: &mut String, model: &RenderModel) -> std::fmt::Result {
        out.push_str("<div class=\"top\">");
        write!(out, "<span class=\"ref\">{}</span>", escape(&model.ref_number))?;
        if !model.logo_src.is_empty() {
            write!(out, "<img class=\"logo\" src=\"{}\" alt=\"logo\">", escape(&model.logo_src))?;
        }
        out.push_str("</div>");
        write!(out, "<h1>{}</h1>", escape(&model.page_title))
    }

    fn header_block(&self, out: &mut String, model: &RenderModel, header: &ResolvedHeader) -> std::fmt::Result {
        write!(out, "<h2>{}</h2>", escape(&header.label))?;

        match model.mode {
            RenderMode::Single => {
                out.push_str("<ul>");
                for line in header.services.iter().flat_map(|s| &s.lines) {
                    write!(out, "<li>{}</li>", escape(line))?;
                }
                out.push_str("</ul>");
                if model.show_individual_prices {
                    write!(out, "<p class=\"amount\">{}</p>", format_amount(header.subtotal))?;
                }
            }
            RenderMode::Summary | RenderMode::Multipage => {
                if header.is_package && header.package_total != 0.0 {
                    write!(
                        out,
                        "<p class=\"amount\">Package total: {}</p>",
                        format_amount(header.package_total)
                    )?;
                }
                out.push_str("<table class=\"services\">");
                for service in &header.services {
                    let price = service
                        .display_price
                        .map(format_amount)
                        .unwrap_or_default();
                    write!(
                        out,
                        "<tr><td>{}</td><td class=\"amount\">{}</td></tr>",
                        escape(&service.name),
                        price
                    )?;
                    if !service.lines.is_empty() {
                        out.push_str("<tr><td colspan=\"2\"><ul>");
                        for line in &service.lines {
                            write!(out, "<li>{}</li>", escape(line))?;
                        }
                        out.push_str("</ul></td></tr>");
                    }
                }
                out.push_str("</table>");
            }
        }
        Ok(())
    }

    fn totals_block(&self, out: &mut String, model: &RenderModel) -> std::fmt::Result {
        write!(
            out,
            "<p class=\"amount total\">Total: {}</p>",
            format_amount(model.total_amount)
        )?;
        if model.effective_discount_percent > 0.0 {
            write!(
                out,
                "<p class=\"discount\">Discount applied: {}%</p>",
                model.effective_discount_percent
            )?;
        }
        Ok(())
    }

    fn terms_block(&self, out: &mut String, model: &RenderModel) -> std::fmt::Result {
        out.push_str("<h2>Terms &amp; Conditions</h2><ol class=\"terms\">");
        for term in &model.terms {
            write!(out, "<li>{}</li>", escape(term))?;
        }
        out.push_str("</ol>");
        Ok(())
    }
}

impl MarkupRenderer for HtmlRenderer {
    fn render(&self, model: &RenderModel) -> Result<String, RenderError> {
        let mut out = String::new();
        self.open(&mut out, model)?;

        if model.mode == RenderMode::Multipage {
            for header in &model.headers {
                out.push_str("<section class=\"page\">");
                self.top_bar(&mut out, model)?;
                self.header_block(&mut out, model, header)?;
                out.push_str("</section>");
            }
            out.push_str("<section class=\"page\">");
            self.top_bar(&mut out, model)?;
            self.totals_block(&mut out, model)?;
            self.terms_block(&mut out, model)?;
            out.push_str("</section>");
        } else {
            self.top_bar(&mut out, model)?;
            for header in &model.headers {
                self.header_block(&mut out, model, header)?;
            }
            self.totals_block(&mut out, model)?;
            self.terms_block(&mut out, model)?;
        }

        out.push_str("</body></html>");
        Ok(out)
    }
}

/// Minimal HTML text escaping.
pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Whole-unit rupee amount with thousands separators, e.g. `₹125,000`.
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-₹{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(mode: RenderMode) -> RenderModel {
        RenderModel {
            mode,
            page_title: "PROJECT QUOTATION".into(),
            headers: vec![],
            total_amount: 5000.0,
            total_source: TotalSource::Declared,
            terms: vec!["Term <one>".into()],
            ref_number: "REQ 1".into(),
            logo_src: String::new(),
            watermark_logo: String::new(),
            display_mode: DisplayMode::Bifurcated,
            show_individual_prices: true,
            discount_amount: 0.0,
            discount_percent: 0.0,
            effective_discount_percent: 0.0,
            quotation_data: Value::Null,
        }
    }

    #[test]
    fn test_render_mode_names() {
        assert_eq!("MultiPage".parse::<RenderMode>(), Ok(RenderMode::Multipage));
        assert_eq!(" single ".parse::<RenderMode>(), Ok(RenderMode::Single));
        assert_eq!(
            "bogus".parse::<RenderMode>(),
            Err(UnknownRenderMode("bogus".to_string()))
        );
        assert_eq!(RenderMode::Summary.template_name(), "quotation_summary_template.html");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(5000.0), "₹5,000");
        assert_eq!(format_amount(1234567.4), "₹1,234,567");
        assert_eq!(format_amount(12.0), "₹12");
        assert_eq!(format_amount(-999.0), "-₹999");
    }

    #[test]
    fn test_render_escapes_terms() {
        let html = HtmlRenderer::new().render(&model(RenderMode::Summary)).unwrap();
        assert!(html.contains("Term &lt;one&gt;"));
        assert!(html.contains("REQ 1"));
        assert!(html.contains("₹5,000"));
    }

    #[test]
    fn test_multipage_uses_page_sections() {
        let html = HtmlRenderer::new().render(&model(RenderMode::Multipage)).unwrap();
        assert!(html.contains("<section class=\"page\">"));
    }
}
