//! Declara CLI
//!
//! Fills in a transfer declaration and exports it as a one-page PDF, or
//! renders the on-screen preview for a given container size.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use declara::{
    CaptureOptions, ContainerSize, DocumentModel, ExportOutcome, Field, GeneratorConfig, Preview,
    Rasterizer, SkiaRasterizer,
};
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "declara")]
#[command(about = "Student transfer declarations with print-faithful PDF export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the declaration as a single-page PDF
    Export {
        #[command(flatten)]
        doc: DocumentArgs,

        /// JSON config file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory the PDF is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Capture resolution multiplier (2 to 8)
        #[arg(short, long)]
        scale: Option<f32>,

        /// TrueType font for page text instead of the system sans font
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Render the scale-to-fit preview
    Preview {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Container width in layout pixels
        #[arg(long, default_value = "1024")]
        width: f64,

        /// Container height in layout pixels
        #[arg(long, default_value = "768")]
        height: f64,

        /// Output PNG
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,

        /// Print the text content instead of writing an image
        #[arg(long)]
        text: bool,
    },
    /// List the form fields as JSON
    Fields {
        #[command(flatten)]
        doc: DocumentArgs,
    },
}

#[derive(Args)]
struct DocumentArgs {
    #[arg(long)]
    student_name: Option<String>,
    #[arg(long)]
    dob: Option<String>,
    #[arg(long)]
    guardian1: Option<String>,
    #[arg(long)]
    guardian2: Option<String>,
    #[arg(long)]
    class_name: Option<String>,
    #[arg(long)]
    school_year: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    city_and_date: Option<String>,

    /// JSON file of field values keyed by field key; flags win over it
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Custom logo: a data: URI or a local image path
    #[arg(long)]
    logo: Option<String>,
}

impl DocumentArgs {
    fn build(self) -> Result<DocumentModel> {
        let mut model = DocumentModel::default();
        if let Some(path) = &self.fields {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading fields from {}", path.display()))?;
            model
                .apply_json(&raw)
                .with_context(|| format!("invalid fields file {}", path.display()))?;
        }
        let flags = [
            (Field::StudentName, self.student_name),
            (Field::Dob, self.dob),
            (Field::Guardian1, self.guardian1),
            (Field::Guardian2, self.guardian2),
            (Field::ClassName, self.class_name),
            (Field::SchoolYear, self.school_year),
            (Field::Status, self.status),
            (Field::CityAndDate, self.city_and_date),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                model.set(field, value);
            }
        }
        if self.logo.is_some() {
            model.logo = self.logo;
        }
        Ok(model)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Export {
            doc,
            config,
            output_dir,
            scale,
            font,
        } => run_export(doc, config, output_dir, scale, font),
        Commands::Preview {
            doc,
            width,
            height,
            output,
            text,
        } => run_preview(doc, width, height, output, text),
        Commands::Fields { doc } => run_fields(doc),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_export(
    doc: DocumentArgs,
    config: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    scale: Option<f32>,
    font: Option<PathBuf>,
) -> Result<()> {
    let mut cfg = match &config {
        Some(path) => GeneratorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(dir) = output_dir {
        cfg.output_dir = dir;
    }
    if let Some(scale) = scale {
        cfg.capture_scale = scale;
    }
    if font.is_some() {
        cfg.font_path = font;
    }

    let model = doc.build()?;
    let (w, h) = cfg.page.size_px();
    // A headless export has no container; mount at page size.
    let preview = Preview::new(&cfg, model, ContainerSize::new(w as f64, h as f64));
    let exporter = declara::new_orchestrator(cfg, preview)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    match runtime.block_on(exporter.export()) {
        ExportOutcome::Saved(saved) => {
            println!("{}", saved.path.display());
            Ok(())
        }
        ExportOutcome::Failed(err) => Err(err).context("export failed"),
        ExportOutcome::Ignored => anyhow::bail!("export ignored: another session is in flight"),
    }
}

fn run_preview(doc: DocumentArgs, width: f64, height: f64, output: PathBuf, text: bool) -> Result<()> {
    let cfg = GeneratorConfig::default();
    let preview = Preview::new(&cfg, doc.build()?, ContainerSize::new(width, height));
    let surface = preview.surface();

    if text {
        println!("{}", surface.text_content());
        return Ok(());
    }

    let options = CaptureOptions {
        scale: 1.0,
        ..cfg.capture_options()
    };
    let png = SkiaRasterizer::from_config(&cfg)?
        .capture(&surface, &options)?
        .encode_png()?;
    std::fs::write(&output, &png).with_context(|| format!("writing {}", output.display()))?;
    info!(
        "preview {}x{} at scale {:.3} written to {}",
        surface.width,
        surface.height,
        preview.scale(),
        output.display()
    );
    Ok(())
}

fn run_fields(doc: DocumentArgs) -> Result<()> {
    let model = doc.build()?;
    let fields: Vec<serde_json::Value> = Field::ALL
        .into_iter()
        .map(|f| {
            serde_json::json!({
                "key": f.key(),
                "label": f.label(),
                "value": model.get(f),
                "display": model.display(f),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}
