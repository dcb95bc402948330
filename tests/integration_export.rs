use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use declara::{
    Bitmap, CaptureOptions, CaptureOrchestrator, CaptureState, ContainerSize, DocumentModel, Error,
    ExportOutcome, Field, GeneratorConfig, PageGeometry, PdfAssembler, Preview, Rasterizer,
    RenderMode, SettlePolicy, SkiaRasterizer, Surface,
};
use lopdf::Document;
use tokio::time::Instant;

/// The end-to-end fixture, second guardian left empty
fn sample_model() -> DocumentModel {
    DocumentModel::for_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
        .with(Field::StudentName, "João Silva")
        .with(Field::Dob, "01/01/2010")
        .with(Field::Guardian1, "Maria Silva")
        .with(Field::Guardian2, "")
        .with(Field::ClassName, "5º Ano")
        .with(Field::SchoolYear, "2026")
        .with(Field::Status, "Aprovado(a)")
        .with(Field::CityAndDate, "Rio de Janeiro, 1 de janeiro de 2026")
}

fn test_config(dir: &Path) -> GeneratorConfig {
    GeneratorConfig {
        capture_scale: 2.0,
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn mounted(cfg: &GeneratorConfig) -> Preview {
    Preview::new(cfg, sample_model(), ContainerSize::new(500.0, 700.0))
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn media_box(path: &Path) -> Vec<f32> {
    let doc = Document::load(path).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    let page = doc.get_dictionary(*pages.values().next().unwrap()).unwrap();
    page.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_float().unwrap())
        .collect()
}

/// Wraps the real rasterizer and records what it was asked to capture
struct Recording {
    inner: SkiaRasterizer,
    seen: Arc<Mutex<Vec<(RenderMode, u32, u32)>>>,
    text: Arc<Mutex<String>>,
}

impl Rasterizer for Recording {
    fn capture(&self, surface: &Surface, options: &CaptureOptions) -> declara::Result<Bitmap> {
        self.seen
            .lock()
            .unwrap()
            .push((surface.mode, surface.width, surface.height));
        *self.text.lock().unwrap() = surface.text_content();
        self.inner.capture(surface, options)
    }
}

/// Records the (paused) clock when the capture starts
struct Timed {
    at: Arc<Mutex<Option<Instant>>>,
}

impl Rasterizer for Timed {
    fn capture(&self, surface: &Surface, options: &CaptureOptions) -> declara::Result<Bitmap> {
        *self.at.lock().unwrap() = Some(Instant::now());
        SkiaRasterizer::new().capture(surface, options)
    }
}

struct Failing;

impl Rasterizer for Failing {
    fn capture(&self, _: &Surface, _: &CaptureOptions) -> declara::Result<Bitmap> {
        Err(Error::RasterizationFailure("canvas unavailable".into()))
    }
}

/// Returns a correctly sized but uniformly white bitmap
struct Blank;

impl Rasterizer for Blank {
    fn capture(&self, surface: &Surface, options: &CaptureOptions) -> declara::Result<Bitmap> {
        let w = (surface.width as f32 * options.scale).round() as u32;
        let h = (surface.height as f32 * options.scale).round() as u32;
        Ok(Bitmap::filled(w, h, options.background))
    }
}

/// Resizes the preview's container while the capture is running
struct ResizingMidCapture {
    preview: Preview,
    to: ContainerSize,
}

impl Rasterizer for ResizingMidCapture {
    fn capture(&self, surface: &Surface, options: &CaptureOptions) -> declara::Result<Bitmap> {
        self.preview.resize(self.to);
        SkiaRasterizer::new().capture(surface, options)
    }
}

#[tokio::test]
async fn export_writes_single_a4_page() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let preview = mounted(&cfg);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let text = Arc::new(Mutex::new(String::new()));
    let rasterizer = Recording {
        inner: SkiaRasterizer::new(),
        seen: seen.clone(),
        text: text.clone(),
    };
    let mut exporter = CaptureOrchestrator::new(
        preview.clone(),
        rasterizer,
        PdfAssembler::new(dir.path()),
        cfg,
    );
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    exporter.on_state_change(move |s| sink.lock().unwrap().push(s));

    let outcome = exporter.export().await;
    let saved = outcome.saved().expect("export should succeed").clone();

    assert_eq!(
        saved.path.file_name().unwrap().to_str().unwrap(),
        "declaracao-transferencia-João_Silva.pdf"
    );
    assert_eq!(saved.pages, 1);

    // The capture always sees the fixed, full-size layout
    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[(RenderMode::FixedPhysical, 794, 1123)]);

    // The empty guardian reaches the page as its placeholder
    let text = text.lock().unwrap();
    assert!(text.contains("Maria Silva"));
    assert!(text.contains("Responsável 2"));
    assert!(text.contains("5º Ano"));
    assert!(text.contains("Rio de Janeiro, 1 de janeiro de 2026"));

    let media = media_box(&saved.path);
    assert!((media[2] - 595.28).abs() < 0.01, "width {}", media[2]);
    assert!((media[3] - 841.89).abs() < 0.01, "height {}", media[3]);

    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[
            CaptureState::ForcingFixedLayout,
            CaptureState::Rasterizing,
            CaptureState::Assembling,
            CaptureState::Restoring,
            CaptureState::Done,
            CaptureState::Idle,
        ]
    );
    assert_eq!(exporter.state(), CaptureState::Idle);
    assert!(!preview.mode().is_fixed());
    assert!(!preview.is_busy());
}

#[tokio::test]
async fn empty_student_name_uses_fallback_filename() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let preview = Preview::new(&cfg, DocumentModel::default(), ContainerSize::new(800.0, 600.0));
    let exporter = declara::new_orchestrator(cfg, preview).unwrap();

    let outcome = exporter.export().await;
    let saved = outcome.saved().expect("export should succeed");
    assert!(saved
        .path
        .ends_with("declaracao-transferencia-documento.pdf"));
}

#[tokio::test]
async fn second_request_during_session_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let exporter = declara::new_orchestrator(cfg.clone(), mounted(&cfg)).unwrap();

    let (a, b) = tokio::join!(exporter.export(), exporter.export());
    let outcomes = [a, b];
    let saved = outcomes.iter().filter(|o| o.saved().is_some()).count();
    let ignored = outcomes
        .iter()
        .filter(|o| matches!(o, ExportOutcome::Ignored))
        .count();
    assert_eq!((saved, ignored), (1, 1));
    assert_eq!(files_in(dir.path()), 1);
    assert!(!exporter.preview().is_busy());
}

#[tokio::test]
async fn rasterizer_failure_restores_preview_and_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let preview = mounted(&cfg);
    let before = preview.mode();

    let mut exporter =
        CaptureOrchestrator::new(preview.clone(), Failing, PdfAssembler::new(dir.path()), cfg);
    let notes = Arc::new(Mutex::new(Vec::new()));
    let sink = notes.clone();
    exporter.on_notification(move |n| sink.lock().unwrap().push(n.clone()));

    let outcome = exporter.export().await;
    assert!(matches!(
        outcome,
        ExportOutcome::Failed(Error::RasterizationFailure(_))
    ));
    assert_eq!(exporter.state(), CaptureState::Idle);
    assert_eq!(preview.mode(), before);
    assert!(!preview.is_busy());
    assert!(preview.export_trigger().enabled);
    assert_eq!(files_in(dir.path()), 0);

    let notes = notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(
        notes[0].message,
        "Ocorreu um erro ao gerar o PDF. Por favor, tente novamente."
    );
}

#[tokio::test]
async fn blank_capture_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let preview = mounted(&cfg);
    let exporter = CaptureOrchestrator::new(preview.clone(), Blank, PdfAssembler::new(dir.path()), cfg);

    let outcome = exporter.export().await;
    assert!(matches!(
        outcome,
        ExportOutcome::Failed(Error::RasterizationFailure(_))
    ));
    assert_eq!(files_in(dir.path()), 0);
    assert!(!preview.mode().is_fixed());
}

#[tokio::test]
async fn unwritable_output_is_an_assembly_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let cfg = test_config(&blocker);
    let preview = mounted(&cfg);
    let exporter = declara::new_orchestrator(cfg, preview.clone()).unwrap();

    let outcome = exporter.export().await;
    assert!(matches!(
        outcome,
        ExportOutcome::Failed(Error::AssemblyFailure(_))
    ));
    assert!(!preview.is_busy());
    assert!(!preview.mode().is_fixed());
}

#[tokio::test]
async fn resize_during_capture_applies_after_restore() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let preview = Preview::new(&cfg, sample_model(), ContainerSize::new(2000.0, 2000.0));
    assert_eq!(preview.scale(), 1.0);

    let rasterizer = ResizingMidCapture {
        preview: preview.clone(),
        to: ContainerSize::new(320.0, 480.0),
    };
    let exporter =
        CaptureOrchestrator::new(preview.clone(), rasterizer, PdfAssembler::new(dir.path()), cfg);

    assert!(exporter.export().await.saved().is_some());
    match preview.mode() {
        RenderMode::FitToContainer { scale } => assert!(scale < 0.5, "scale {}", scale),
        other => panic!("expected interactive layout, got {:?}", other),
    }
}

#[tokio::test]
async fn dropped_session_releases_the_preview() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = GeneratorConfig {
        settle: SettlePolicy::FixedDelay { delay_ms: 10_000 },
        ..test_config(dir.path())
    };
    let preview = mounted(&cfg);
    let mut exporter = declara::new_orchestrator(cfg, preview.clone()).unwrap();
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    exporter.on_state_change(move |s| sink.lock().unwrap().push(s));

    let res = tokio::time::timeout(Duration::from_millis(50), exporter.export()).await;
    assert!(res.is_err(), "session should still be settling");

    assert!(!preview.is_busy());
    assert!(!preview.mode().is_fixed());
    assert_eq!(files_in(dir.path()), 0);
    assert_eq!(exporter.state(), CaptureState::Idle);
    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[CaptureState::ForcingFixedLayout, CaptureState::Idle]
    );
}

#[tokio::test(start_paused = true)]
async fn same_orchestrator_exports_after_a_dropped_session() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = GeneratorConfig {
        settle: SettlePolicy::FixedDelay { delay_ms: 1_000 },
        ..test_config(dir.path())
    };
    let preview = mounted(&cfg);
    let exporter = declara::new_orchestrator(cfg, preview.clone()).unwrap();

    let res = tokio::time::timeout(Duration::from_millis(50), exporter.export()).await;
    assert!(res.is_err());
    assert_eq!(exporter.state(), CaptureState::Idle);

    assert!(exporter.export().await.saved().is_some());
    assert_eq!(exporter.state(), CaptureState::Idle);
    assert_eq!(files_in(dir.path()), 1);
}

#[tokio::test]
async fn export_fills_the_preview_page_not_the_configured_one() {
    let dir = tempfile::tempdir().unwrap();
    let letter = PageGeometry {
        width_mm: 215.9,
        height_mm: 279.4,
        dpi: 96.0,
    };
    let preview = Preview::new(
        &GeneratorConfig {
            page: letter,
            ..test_config(dir.path())
        },
        sample_model(),
        ContainerSize::new(500.0, 700.0),
    );
    // An A4 config does not get to stretch a Letter capture
    let exporter = CaptureOrchestrator::new(
        preview,
        SkiaRasterizer::new(),
        PdfAssembler::new(dir.path()),
        test_config(dir.path()),
    );

    let outcome = exporter.export().await;
    let saved = outcome.saved().expect("export should succeed");
    let media = media_box(&saved.path);
    assert!((media[2] - 612.0).abs() < 0.01, "width {}", media[2]);
    assert!((media[3] - 792.0).abs() < 0.01, "height {}", media[3]);
}

async fn capture_delay(settle: SettlePolicy, min_settle_ms: u64) -> Duration {
    let dir = tempfile::tempdir().unwrap();
    let cfg = GeneratorConfig {
        settle,
        min_settle_ms,
        ..test_config(dir.path())
    };
    let at = Arc::new(Mutex::new(None));
    let forced = Arc::new(Mutex::new(None));
    let mut exporter = CaptureOrchestrator::new(
        mounted(&cfg),
        Timed { at: at.clone() },
        PdfAssembler::new(dir.path()),
        cfg,
    );
    let sink = forced.clone();
    exporter.on_state_change(move |s| {
        if s == CaptureState::ForcingFixedLayout {
            *sink.lock().unwrap() = Some(Instant::now());
        }
    });

    assert!(exporter.export().await.saved().is_some());
    let captured = at.lock().unwrap().expect("capture ran");
    let forced = forced.lock().unwrap().expect("layout was forced");
    captured - forced
}

#[tokio::test(start_paused = true)]
async fn ready_signal_still_waits_the_minimum_settle() {
    // The signal fires at once; the floor holds the capture back
    let waited = capture_delay(SettlePolicy::ReadySignal { timeout_ms: 300 }, 200).await;
    assert!(waited >= Duration::from_millis(200), "captured after {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn fixed_delay_is_padded_to_the_minimum_settle() {
    let waited = capture_delay(SettlePolicy::FixedDelay { delay_ms: 50 }, 200).await;
    assert!(waited >= Duration::from_millis(200), "captured after {:?}", waited);

    // A longer delay is not extended by the floor
    let waited = capture_delay(SettlePolicy::FixedDelay { delay_ms: 300 }, 100).await;
    assert!(waited >= Duration::from_millis(300), "captured after {:?}", waited);
    assert!(waited < Duration::from_millis(400), "captured after {:?}", waited);
}
