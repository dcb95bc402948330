//! Declara
//!
//! Generates student transfer declarations from a handful of field values,
//! keeps a scale-to-fit preview of the page in sync with edits, and exports
//! the page as a single-page, print-faithful PDF.
//!
//! # Pipeline
//!
//! - **Preview**: the [`Preview`] owns the one layout surface. While idle it is
//!   rendered [`RenderMode::FitToContainer`] at the scale computed by
//!   [`scale::compute_fit_scale`] on every resize.
//! - **Capture**: [`CaptureOrchestrator::export`] forces
//!   [`RenderMode::FixedPhysical`], waits for the layout to settle, hands the
//!   surface to a [`Rasterizer`], gives the bitmap to a [`DocumentAssembler`]
//!   and restores the interactive layout, whether or not a step failed.
//!
//! # Example
//!
//! ```no_run
//! use declara::{ContainerSize, DocumentModel, Field, GeneratorConfig, Preview};
//!
//! # async fn run() -> declara::Result<()> {
//! let config = GeneratorConfig::default();
//! let model = DocumentModel::default().with(Field::StudentName, "Ana Maria");
//! let preview = Preview::new(&config, model, ContainerSize::new(1024.0, 768.0));
//!
//! let exporter = declara::new_orchestrator(config, preview.clone())?;
//! match exporter.export().await {
//!     declara::ExportOutcome::Saved(doc) => println!("saved {}", doc.path.display()),
//!     other => eprintln!("export did not complete: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod capture;
pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod preview;
pub mod rendering;
pub mod scale;

pub use assembler::{output_filename, PdfAssembler, SavedDocument};
pub use capture::{CaptureOrchestrator, CaptureState, ExportOutcome, Notification};
pub use config::{CaptureOptions, GeneratorConfig, PageGeometry, Rgba, SettlePolicy};
pub use error::{Error, Result};
pub use model::{DocumentModel, Field};
pub use platform::{ContainerSize, ResizeEvents, Subscription};
pub use preview::{ExportTrigger, LayoutEpoch, Preview};
pub use rendering::outline::OutlineFont;
pub use rendering::raster::SkiaRasterizer;
pub use rendering::{Bitmap, RenderMode, Surface};

/// Converts a rendered surface into a bitmap.
///
/// Implementations must paint `options.background` under everything so the
/// result is opaque, and must honour `options.scale` exactly.
pub trait Rasterizer: Send + Sync {
    fn capture(&self, surface: &Surface, options: &CaptureOptions) -> Result<Bitmap>;
}

/// Embeds a bitmap into a one-page document and saves it.
pub trait DocumentAssembler: Send + Sync {
    /// The bitmap must fill the page exactly at `page`'s physical size.
    fn assemble(&self, bitmap: &Bitmap, page: &PageGeometry, filename: &str) -> Result<SavedDocument>;
}

/// Create an orchestrator backed by the built-in rasterizer and PDF assembler.
///
/// Documents are saved under `config.output_dir`; text uses
/// `config.font_path` or a system font when one is found. The preview must have been
/// built for `config.page`.
pub fn new_orchestrator(
    config: GeneratorConfig,
    preview: Preview,
) -> Result<CaptureOrchestrator<SkiaRasterizer, PdfAssembler>> {
    config.validate()?;
    if preview.page() != config.page {
        return Err(Error::ConfigError(format!(
            "preview page {:?} does not match configured page {:?}",
            preview.page(),
            config.page
        )));
    }
    let rasterizer = SkiaRasterizer::from_config(&config)?;
    let assembler = PdfAssembler::new(config.output_dir.clone());
    Ok(CaptureOrchestrator::new(preview, rasterizer, assembler, config))
}
