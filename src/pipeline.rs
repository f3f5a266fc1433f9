//! Generation Pipeline - Single Entry Point
//!
//! One pipeline for every render mode. Price map, normalizer, total and
//! terms are shared; only the page setup and markup vary by mode.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::assets::find_logo;
use crate::config::GeneratorConfig;
use crate::hashing::{compute_model_hash, hash_file};
use crate::normalize::{Normalizer, ResolvedHeader};
use crate::payload::{DisplayMode, QuotationPayload};
use crate::pricing::PriceMap;
use crate::print::PageSetup;
use crate::producer::{PageProducer, ProducerError, WkhtmltopdfProducer};
use crate::sequencer::{sibling_path, PageSequencer, SequenceError, SequenceReport, TransientFile};
use crate::templates::{HtmlRenderer, MarkupRenderer, RenderError, RenderMode, RenderModel};
use crate::terms::TermsAssembler;
use crate::totals::canonical_total;
use crate::ENGINE_VERSION;

const DEFAULT_REFERENCE: &str = "REQ 0001";
const REFERENCE_PREFIX: &str = "REQ ";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Converter unavailable: {0}")]
    Environment(ProducerError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Page production failed: {source}")]
    Production {
        #[source]
        source: ProducerError,
        /// Where the markup was dumped, if the dump itself succeeded.
        debug_markup: Option<PathBuf>,
    },

    #[error("Page sequencing failed: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation_id: Uuid,
    pub engine_version: String,
    pub mode: RenderMode,
    pub output: PathBuf,
    pub ref_number: String,
    pub total_amount: f64,
    pub model_hash: String,
    pub artifact_hash: String,
    pub pages: SequenceReport,
    pub generated_at: DateTime<Utc>,
}

/// The generation pipeline - payload in, one ordered document out
pub struct QuotationPipeline {
    mode: RenderMode,
    setup: PageSetup,
    logo_dir: PathBuf,
    sequencer: PageSequencer,
    terms: TermsAssembler,
    renderer: Box<dyn MarkupRenderer>,
    producer: Box<dyn PageProducer>,
}

impl QuotationPipeline {
    pub fn new(config: &GeneratorConfig, producer: Box<dyn PageProducer>) -> Self {
        let setup = PageSetup::for_mode(config.mode);
        Self {
            mode: config.mode,
            sequencer: PageSequencer::new(&config.images_dir).with_page_size(setup.page_size),
            setup,
            logo_dir: config.logo_dir.clone(),
            terms: TermsAssembler::new(),
            renderer: Box::new(HtmlRenderer::new()),
            producer,
        }
    }

    /// Pipeline backed by the external converter.
    ///
    /// Fails here, not at generation time, when the converter is missing.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, PipelineError> {
        let producer = WkhtmltopdfProducer::new(&config.converter_path)
            .map_err(PipelineError::Environment)?
            .allow_dir(&config.assets_dir);
        tracing::debug!(converter = %producer.binary().display(), "converter located");
        Ok(Self::new(config, Box::new(producer)))
    }

    pub fn with_renderer(mut self, renderer: Box<dyn MarkupRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_setup(mut self, setup: PageSetup) -> Self {
        self.sequencer = self.sequencer.with_page_size(setup.page_size);
        self.setup = setup;
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn setup(&self) -> &PageSetup {
        &self.setup
    }

    /// Resolve prices, totals and terms into the renderer's data contract.
    pub fn build_model(&self, payload: &QuotationPayload, now: DateTime<Utc>) -> RenderModel {
        let prices = PriceMap::build(&payload.pricing_breakdown);
        let headers = Normalizer::new(
            &prices,
            &payload.pricing_breakdown,
            payload.display_mode,
            self.mode,
        )
        .normalize(&payload.headers);
        let total = canonical_total(payload, &headers);
        let terms = self.terms.assemble(payload, now);
        let logo_src = find_logo(&self.logo_dir).map(|logo| logo.uri).unwrap_or_default();

        RenderModel {
            mode: self.mode,
            page_title: page_title(self.mode, payload, &headers),
            ref_number: reference_number(payload.id.as_deref()),
            total_amount: total.amount,
            total_source: total.source,
            headers,
            terms,
            watermark_logo: logo_src.clone(),
            logo_src,
            display_mode: payload.display_mode,
            show_individual_prices: payload.display_mode == DisplayMode::Bifurcated,
            discount_amount: payload.discount_amount,
            discount_percent: payload.discount_percent,
            effective_discount_percent: payload.effective_discount_percent(),
            quotation_data: payload.raw().clone(),
        }
    }

    /// Render, produce and sequence the document at `output`.
    pub fn generate(
        &self,
        payload: &QuotationPayload,
        output: &Path,
    ) -> Result<GenerationReport, PipelineError> {
        let generation_id = Uuid::new_v4();
        let span = tracing::info_span!("generation", id = %generation_id, mode = self.mode.as_str());
        let _entered = span.enter();

        let generated_at = Utc::now();
        let model = self.build_model(payload, generated_at);
        let model_hash = compute_model_hash(&model)?;
        let markup = self.renderer.render(&model)?;

        let content = TransientFile::new(sibling_path(output, "temp", "pdf"));
        if let Err(source) = self.producer.produce(&markup, &self.setup, content.path()) {
            let debug_markup = dump_markup(output, &markup);
            tracing::error!(error = %source, "page producer failed");
            return Err(PipelineError::Production { source, debug_markup });
        }

        let pages = self.sequencer.combine(content.path(), output)?;
        let artifact_hash = hash_file(output)?;
        tracing::info!(
            output = %output.display(),
            pages = pages.total_pages,
            total = model.total_amount,
            "quotation generated"
        );

        Ok(GenerationReport {
            generation_id,
            engine_version: ENGINE_VERSION.to_string(),
            mode: self.mode,
            output: output.to_path_buf(),
            ref_number: model.ref_number,
            total_amount: model.total_amount,
            model_hash,
            artifact_hash,
            pages,
            generated_at,
        })
    }

    /// Same as [`generate`](Self::generate), returning only the artifact path.
    pub fn generate_pdf(&self, payload: &QuotationPayload, output: &Path) -> Result<PathBuf, PipelineError> {
        self.generate(payload, output).map(|report| report.output)
    }
}

fn dump_markup(output: &Path, markup: &str) -> Option<PathBuf> {
    let path = sibling_path(output, "debug", "html");
    match fs::write(&path, markup) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "markup dumped for diagnosis");
            Some(path)
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not dump markup");
            None
        }
    }
}

/// Normalized `REQ {n}` reference for a quotation id.
pub fn reference_number(id: Option<&str>) -> String {
    let raw = id.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_REFERENCE);
    let prefixed = if raw.to_ascii_uppercase().starts_with("REQ") {
        raw.to_string()
    } else {
        format!("{}{}", REFERENCE_PREFIX, raw)
    };
    let bare = prefixed.replace(REFERENCE_PREFIX, "");
    let bare = bare.trim();
    if bare.is_empty() {
        DEFAULT_REFERENCE.to_string()
    } else {
        format!("{}{}", REFERENCE_PREFIX, bare)
    }
}

pub fn page_title(mode: RenderMode, payload: &QuotationPayload, headers: &[ResolvedHeader]) -> String {
    let header_title = payload.header_title.as_deref().filter(|s| !s.is_empty());
    let explicit_title = payload.page_title.as_deref().filter(|s| !s.is_empty());

    match mode {
        RenderMode::Single => header_title
            .or(explicit_title)
            .unwrap_or("PROJECT REGISTRATION")
            .to_string(),
        RenderMode::Summary => headers
            .first()
            .map(|h| h.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("QUOTATION SUMMARY")
            .to_uppercase(),
        RenderMode::Multipage => explicit_title
            .or(header_title)
            .unwrap_or("PROJECT QUOTATION")
            .to_uppercase(),
    }
}
