//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::path::Path;

use chrono::{TimeZone, Utc};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde_json::{json, Value};
use tempfile::tempdir;

use quotedoc_core::{
    canonical_total, compute_model_hash,
    normalize::PackageTotalSource,
    print::PageSetup,
    sequencer::SequenceError,
    terms::{category_terms, DEFAULT_TERMS, PACKAGE_ABC_CATEGORY, PACKAGE_D_CATEGORY},
    GeneratorConfig, Normalizer, PageProducer, PageSequencer, PriceMap, ProducerError,
    QuotationPayload, QuotationPipeline, RenderMode, ResolvedHeader, TermsAssembler, TotalSource,
};

/// Writes a content PDF with one marked page per entry instead of
/// converting markup.
struct FakeProducer {
    pages: usize,
}

impl PageProducer for FakeProducer {
    fn produce(&self, _markup: &str, _setup: &PageSetup, output: &Path) -> Result<(), ProducerError> {
        write_content_pdf(output, self.pages);
        Ok(())
    }
}

fn write_content_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = vec![];
    for n in 1..=pages {
        let content = format!("BT /F1 12 Tf 72 720 Td (content-{}) Tj ET", n);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn write_image(dir: &Path, file: &str, width: u32) {
    image::RgbImage::from_pixel(width, 10, image::Rgb([200, 30, 30]))
        .save(dir.join(file))
        .unwrap();
}

/// Width of the image drawn on a raster page, `None` for content pages.
fn raster_width(doc: &Document, page_id: ObjectId) -> Option<i64> {
    let page = doc.get_dictionary(page_id).ok()?;
    let resources = match page.get(b"Resources").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let xobjects = resources.get(b"XObject").and_then(Object::as_dict).ok()?;
    let image_id = xobjects.get(b"Im1").and_then(Object::as_reference).ok()?;
    let stream = doc.get_object(image_id).and_then(Object::as_stream).ok()?;
    stream.dict.get(b"Width").and_then(Object::as_i64).ok()
}

fn resolve(raw: Value, mode: RenderMode) -> Vec<ResolvedHeader> {
    let payload = QuotationPayload::from_value(raw);
    let prices = PriceMap::build(&payload.pricing_breakdown);
    Normalizer::new(&prices, &payload.pricing_breakdown, payload.display_mode, mode)
        .normalize(&payload.headers)
}

#[test]
fn invariant_total_always_positive() {
    let payloads = [
        json!({}),
        json!(null),
        json!({"totalAmount": "not a number", "headers": "nope", "pricingBreakdown": 7}),
        json!({"totalAmount": -250}),
        json!({"headers": [{"name": "Package B", "services": [{"name": "X", "price": 0}]}]}),
    ];

    for raw in payloads {
        let payload = QuotationPayload::from_value(raw.clone());
        let headers = resolve(raw, RenderMode::Summary);
        let total = canonical_total(&payload, &headers);
        assert!(total.amount > 0.0, "non-positive total for {:?}", payload);
    }

    let empty = QuotationPayload::from_value(json!({}));
    let total = canonical_total(&empty, &[]);
    assert_eq!(total.amount, 1.0);
    assert_eq!(total.source, TotalSource::Minimum);
}

#[test]
fn invariant_price_map_last_write_wins() {
    let payload = QuotationPayload::from_value(json!({
        "pricingBreakdown": [
            {"name": "Package C", "totalAmount": 100,
             "services": [{"name": "Audit", "finalAmount": 10}]},
            {"name": "Package C", "totalAmount": 300,
             "services": [{"name": "Audit", "finalAmount": 30}]}
        ]
    }));
    let prices = PriceMap::build(&payload.pricing_breakdown);

    assert_eq!(prices.header_price("Package C"), Some(300.0));
    assert_eq!(prices.service_price("Audit"), Some(30.0));
}

#[test]
fn invariant_package_total_short_circuits() {
    // Header price says 700; the fuzzy tier would find 9000.
    let headers = resolve(
        json!({
            "headers": [{"name": "Package A", "services": [{"name": "Filing", "price": 50}]}],
            "pricingBreakdown": [
                {"name": "Package A Premium", "services": [{"name": "Other", "finalAmount": 9000}]},
                {"name": "Package A", "totalAmount": 700}
            ]
        }),
        RenderMode::Summary,
    );

    assert!(headers[0].is_package);
    assert_eq!(headers[0].package_total, 700.0);
    assert_eq!(headers[0].package_total_source, Some(PackageTotalSource::HeaderPrice));
}

#[test]
fn invariant_sub_service_filtering() {
    let headers = resolve(
        json!({
            "headers": [{
                "name": "Compliance",
                "services": [{
                    "name": "Quarterly Update",
                    "subServices": [
                        {"id": "a", "name": "Form 5", "included": false},
                        {"id": "b", "name": "Form 3"},
                        {"id": "c", "name": "Form 1", "included": true},
                        "Site Visit"
                    ]
                }]
            }]
        }),
        RenderMode::Summary,
    );

    let names: Vec<&str> = headers[0].services[0]
        .sub_services
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["Form 3", "Form 1", "Site Visit"]);
    assert!(!headers[0].services[0].lines.iter().any(|l| l == "Form 5"));
}

#[test]
fn invariant_terms_order_stable_and_additive() {
    let payload = QuotationPayload::from_value(json!({
        "validity": "15 days",
        "createdAt": "2024-03-01T00:00:00Z",
        "paymentSchedule": "50%",
        "applicableTerms": [PACKAGE_D_CATEGORY, "Unknown", PACKAGE_ABC_CATEGORY],
        "customTerms": ["Site visits billed separately.", DEFAULT_TERMS[0]]
    }));
    let terms = TermsAssembler::new().assemble(&payload, Utc::now());

    let mut expected = vec![
        "The quotation is valid upto 16/03/2024.".to_string(),
        "50% of the total amount must be paid in advance before commencement of work/service.".to_string(),
    ];
    expected.extend(DEFAULT_TERMS.iter().map(|t| t.to_string()));
    expected.extend(category_terms(PACKAGE_D_CATEGORY).unwrap().iter().map(|t| t.to_string()));
    expected.extend(category_terms(PACKAGE_ABC_CATEGORY).unwrap().iter().map(|t| t.to_string()));
    expected.push("Site visits billed separately.".to_string());
    expected.push(DEFAULT_TERMS[0].to_string());

    assert_eq!(terms, expected);
}

#[test]
fn invariant_display_suppression() {
    let raw = |mode: &str| {
        json!({
            "displayMode": mode,
            "headers": [
                {"name": "Package D", "services": [{"name": "Drafting", "price": 1200}]},
                {"name": "Advisory", "services": [{"name": "Review", "price": 800}]}
            ],
            "pricingBreakdown": [{"name": "Package D",
                "services": [{"name": "Drafting", "finalAmount": 1500}]}]
        })
    };

    for mode in [RenderMode::Single, RenderMode::Summary, RenderMode::Multipage] {
        let lumpsum = resolve(raw("lumpsum"), mode);
        assert!(lumpsum
            .iter()
            .flat_map(|h| &h.services)
            .all(|s| s.display_price.is_none() && !s.show_individual_price));
    }

    let bifurcated = resolve(raw("bifurcated"), RenderMode::Summary);
    let package = bifurcated.iter().find(|h| h.is_package).unwrap();
    for service in &package.services {
        assert_eq!(service.display_price, Some(service.price));
    }
    assert_eq!(package.services[0].price, 1500.0);
}

#[test]
fn invariant_sequencer_ordering_skips_gaps() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    write_image(&images, "1.png", 10);
    write_image(&images, "2.jpg", 20);
    write_image(&images, "4.png", 40);

    let content = dir.path().join("content.pdf");
    write_content_pdf(&content, 2);
    let output = dir.path().join("quote.pdf");

    let report = PageSequencer::new(&images).combine(&content, &output).unwrap();
    assert_eq!(report.prepended, vec![1]);
    assert_eq!(report.appended, vec![2, 4]);
    assert_eq!(report.content_pages, 2);
    assert_eq!(report.total_pages, 5);

    let merged = Document::load(&output).unwrap();
    let order: Vec<Option<i64>> = merged
        .get_pages()
        .values()
        .map(|&id| raster_width(&merged, id))
        .collect();
    assert_eq!(order, vec![Some(10), None, None, Some(20), Some(40)]);

    let pages: Vec<ObjectId> = merged.get_pages().values().copied().collect();
    let first_content = merged.get_page_content(pages[1]).unwrap();
    assert!(String::from_utf8_lossy(&first_content).contains("content-1"));

    // Only the inputs and the output remain.
    let mut left: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left, vec!["content.pdf", "images", "quote.pdf"]);
}

#[test]
fn invariant_end_to_end_scenario() {
    let dir = tempdir().unwrap();
    let raw = json!({
        "id": "55",
        "totalAmount": 0,
        "headers": [{"name": "Package A", "services": [{"name": "Drafting"}]}],
        "pricingBreakdown": [{"name": "Package A",
            "services": [{"name": "Drafting", "totalAmount": 5000}]}],
        "validity": "30 days",
        "createdAt": "2024-01-01T00:00:00Z"
    });
    let payload = QuotationPayload::from_value(raw);

    let config = GeneratorConfig::new(dir.path()).with_mode(RenderMode::Summary);
    let pipeline = QuotationPipeline::new(&config, Box::new(FakeProducer { pages: 1 }));

    let model = pipeline.build_model(&payload, Utc::now());
    assert_eq!(model.total_amount, 5000.0);
    assert_eq!(model.ref_number, "REQ 55");
    assert_eq!(model.terms[0], "The quotation is valid upto 31/01/2024.");
    assert_eq!(model.headers[0].name, "Package A");
    assert!(model.headers[0].is_package);
    assert_eq!(model.headers[0].package_total, 5000.0);

    let output = dir.path().join("REQ-55.pdf");
    let report = pipeline.generate(&payload, &output).unwrap();
    assert_eq!(report.ref_number, "REQ 55");
    assert_eq!(report.total_amount, 5000.0);
    assert_eq!(report.pages.total_pages, 1);
    assert_eq!(report.artifact_hash.len(), 64);
    assert!(output.exists());
    assert!(!dir.path().join("REQ-55_temp.pdf").exists());
}

#[test]
fn invariant_model_hash_stable() {
    let dir = tempdir().unwrap();
    let payload = QuotationPayload::from_value(json!({
        "id": "7",
        "headers": [{"name": "Advisory", "services": [{"name": "Review", "price": 800}]}],
        "validity": "7 days"
    }));
    let config = GeneratorConfig::new(dir.path()).with_mode(RenderMode::Multipage);
    let pipeline = QuotationPipeline::new(&config, Box::new(FakeProducer { pages: 2 }));
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let h1 = compute_model_hash(&pipeline.build_model(&payload, now)).unwrap();
    let h2 = compute_model_hash(&pipeline.build_model(&payload, now)).unwrap();
    assert_eq!(h1, h2);
}

#[test]
fn invariant_model_hash_ignores_payload_key_order() {
    let dir = tempdir().unwrap();
    let config = GeneratorConfig::new(dir.path());
    let pipeline = QuotationPipeline::new(&config, Box::new(FakeProducer { pages: 1 }));
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let first: Value = serde_json::from_str(
        r#"{"id": "12", "validity": "15 days",
            "headers": [{"name": "Package B", "services": [{"name": "Filing", "price": 900}]}],
            "pricingBreakdown": [{"name": "Package B", "totalAmount": 900}]}"#,
    )
    .unwrap();
    let second: Value = serde_json::from_str(
        r#"{"pricingBreakdown": [{"totalAmount": 900, "name": "Package B"}],
            "headers": [{"services": [{"price": 900, "name": "Filing"}], "name": "Package B"}],
            "validity": "15 days", "id": "12"}"#,
    )
    .unwrap();

    let h1 = compute_model_hash(&pipeline.build_model(&QuotationPayload::from_value(first), now)).unwrap();
    let h2 = compute_model_hash(&pipeline.build_model(&QuotationPayload::from_value(second), now)).unwrap();
    assert_eq!(h1, h2);
}

#[test]
fn invariant_transients_removed_when_sequencing_fails() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    write_image(&images, "1.png", 10);
    write_image(&images, "2.png", 20);

    let content = dir.path().join("content.pdf");
    std::fs::write(&content, b"this is not a pdf").unwrap();
    let output = dir.path().join("quote.pdf");

    let err = PageSequencer::new(&images).combine(&content, &output).unwrap_err();
    assert!(matches!(err, SequenceError::Pdf(_)));

    let mut left: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left, vec!["content.pdf", "images"]);
}

#[test]
fn invariant_bad_raster_becomes_blank_page() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    write_image(&images, "2.png", 20);
    std::fs::write(images.join("3.jpg"), b"garbage, not a jpeg").unwrap();

    let content = dir.path().join("content.pdf");
    write_content_pdf(&content, 1);
    let output = dir.path().join("quote.pdf");

    let report = PageSequencer::new(&images).combine(&content, &output).unwrap();
    assert!(report.prepended.is_empty());
    assert_eq!(report.appended, vec![2, 3]);
    assert_eq!(report.total_pages, 3);

    let merged = Document::load(&output).unwrap();
    let pages: Vec<ObjectId> = merged.get_pages().values().copied().collect();
    let order: Vec<Option<i64>> = pages.iter().map(|&id| raster_width(&merged, id)).collect();
    assert_eq!(order, vec![None, Some(20), None]);
    assert!(merged.get_page_content(pages[2]).unwrap().is_empty());
}
