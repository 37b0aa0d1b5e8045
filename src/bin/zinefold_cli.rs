//! Zinefold CLI - JSON bridge to the imposition engine
//!
//! Commands: templates, plan, compose, validate
//! Outputs JSON to stdout, logs to stderr (RUST_LOG)
//! Returns non-zero on failure, 2 on validation failure

use clap::{Parser, Subcommand};
use image::RgbImage;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use zinefold_core::{
    resolve_with_template, templates::list_templates, BoxError, DocumentInput, EngineConfig,
    MemoryBackend, Orientation, PageRenderer, PaperSize, Session, Validator,
};

#[derive(Parser)]
#[command(name = "zinefold-cli")]
#[command(about = "Zinefold CLI - Zine Imposition Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to an engine config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List folding templates
    Templates,

    /// Resolve the grid for a page count
    Plan {
        #[arg(short, long)]
        pages: usize,

        #[arg(short, long)]
        template: Option<String>,
    },

    /// Render placeholder pages and print the composed sheet manifest
    Compose {
        #[arg(short, long)]
        pages: usize,

        #[arg(short, long)]
        template: Option<String>,

        #[arg(long)]
        paper: Option<PaperSize>,

        #[arg(long)]
        orientation: Option<Orientation>,

        /// Slot index to flip (repeatable)
        #[arg(long)]
        flip: Vec<usize>,

        /// Slot pair to swap, as I:J (repeatable)
        #[arg(long, value_parser = parse_swap)]
        swap: Vec<(usize, usize)>,
    },

    /// Check that a file looks like a loadable PDF
    Validate {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        mime: Option<String>,
    },
}

fn parse_swap(s: &str) -> Result<(usize, usize), String> {
    let (a, b) = s.split_once(':').ok_or_else(|| format!("expected I:J, got {}", s))?;
    let a = a.trim().parse().map_err(|e| format!("bad slot {}: {}", a, e))?;
    let b = b.trim().parse().map_err(|e| format!("bad slot {}: {}", b, e))?;
    Ok((a, b))
}

/// Stand-in for a real document: every page is a flat tint.
struct PlaceholderDocument {
    pages: usize,
}

impl PageRenderer for PlaceholderDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<RgbImage, BoxError> {
        let width = (100.0 * scale) as u32;
        let height = (141.0 * scale) as u32;
        let shade = 255 - ((page * 13) % 128) as u8;
        Ok(RgbImage::from_pixel(width.max(1), height.max(1), image::Rgb([shade, shade, 255])))
    }
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    let output = serde_json::json!({ "success": false, "error": message.to_string() });
    println!("{}", output);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::load_from_file(path) {
            Ok(c) => c,
            Err(e) => return fail(e),
        },
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = list_templates()
                .iter()
                .map(|t| serde_json::json!({
                    "id": t.id,
                    "label": t.label,
                    "pages": t.pages,
                    "sheets": t.sheets,
                    "grid": t.grid,
                    "upsideDownPages": t.upside_down_pages(),
                }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&templates).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Plan { pages, template } => {
            if pages == 0 {
                return fail("Document has no pages");
            }
            let plan = resolve_with_template(pages, template.as_deref());
            let output = serde_json::json!({
                "plan": plan,
                "cellOrder": plan.canonical_order(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Compose { pages, template, paper, orientation, flip, swap } => {
            let paper = paper.unwrap_or(config.paper);
            let orientation = orientation.unwrap_or(config.orientation);
            let backend = Arc::new(MemoryBackend::new());
            let mut session = match Session::new(config, backend) {
                Ok(s) => s,
                Err(e) => return fail(e),
            };

            let document = PlaceholderDocument { pages };
            let report = match session.load(&document, template.as_deref(), |p| log::info!("progress {}%", p)) {
                Ok(r) => r,
                Err(e) => return fail(e),
            };

            for (i, j) in swap {
                if let Err(e) = session.swap(i, j) {
                    return fail(e);
                }
            }
            for index in flip {
                if let Err(e) = session.toggle_flip(index) {
                    return fail(e);
                }
            }

            match session.manifest(paper, orientation) {
                Ok(manifest) => {
                    let output = serde_json::json!({
                        "success": true,
                        "report": report,
                        "manifest": manifest,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => fail(e),
            }
        }

        Commands::Validate { file, mime } => {
            let bytes = match fs::read(&file) {
                Ok(b) => b,
                Err(e) => return fail(format!("Failed to read {}: {}", file.display(), e)),
            };
            let result = Validator::new(config.max_document_bytes).validate(&DocumentInput {
                bytes: &bytes,
                mime_type: mime.as_deref(),
            });
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
            if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
    }
}
