//! QuoteDoc Core - Quotation Document Assembly
//!
//! # Guarantees
//! 1. Input Is Never Rejected (missing or malformed fields coerce to defaults)
//! 2. Breakdown Prices Win Over Declared Prices
//! 3. The Total Is Always Positive
//! 4. Terms Keep Their Order
//! 5. Pages Keep Their Order (1, content, 2..8)
//! 6. One Pipeline, Three Render Modes

pub mod coerce;
pub mod payload;
pub mod pricing;
pub mod normalize;
pub mod totals;
pub mod terms;
pub mod templates;
pub mod print;
pub mod producer;
pub mod assets;
pub mod sequencer;
pub mod hashing;
pub mod config;
pub mod pipeline;

pub use payload::{DisplayMode, QuotationPayload};
pub use pricing::PriceMap;
pub use normalize::{Normalizer, ResolvedHeader, ResolvedService};
pub use totals::{canonical_total, CanonicalTotal, TotalSource};
pub use terms::TermsAssembler;
pub use templates::{HtmlRenderer, MarkupRenderer, RenderMode, RenderModel};
pub use print::PageSetup;
pub use producer::{PageProducer, ProducerError, WkhtmltopdfProducer};
pub use sequencer::{PageSequencer, SequenceReport};
pub use hashing::{canonical_json, compute_model_hash};
pub use config::GeneratorConfig;
pub use pipeline::{GenerationReport, PipelineError, QuotationPipeline};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
