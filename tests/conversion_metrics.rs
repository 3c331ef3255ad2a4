use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use printpress::application::convert::ConversionService;
use printpress::application::printer::{PdfPrinter, PrintError};
use printpress::domain::document::{
    ConversionRequest, PdfDocument, PrintOptions, RenderedDocument, TemplateUpload,
};
use printpress::infra::telemetry;
use serde_json::json;

struct StaticPrinter;

#[async_trait]
impl PdfPrinter for StaticPrinter {
    async fn print(
        &self,
        _document: &RenderedDocument,
        _options: &PrintOptions,
    ) -> Result<PdfDocument, PrintError> {
        Ok(PdfDocument::new(&b"%PDF-1.7\n"[..]))
    }
}

#[tokio::test]
async fn conversions_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let service = ConversionService::new(Arc::new(StaticPrinter));

    let ok = ConversionRequest::new(
        TemplateUpload::new(None, "Hello <%= data.name %>"),
        json!({ "name": "World" }),
    );
    service.convert(ok).await.expect("conversion succeeds");

    let broken = ConversionRequest::without_data(TemplateUpload::new(None, "<%= data.nope.x %>"));
    service.convert(broken).await.expect_err("render fails");

    let entries = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = entries
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in ["printpress_conversions_total", "printpress_conversion_ms"] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcomes: HashSet<String> = entries
        .iter()
        .filter(|(composite_key, _, _, _)| {
            composite_key.key().name() == "printpress_conversions_total"
        })
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .filter(|label| label.key() == "outcome")
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(outcomes.contains("ok"), "{outcomes:?}");
    assert!(outcomes.contains("render_error"), "{outcomes:?}");
}
