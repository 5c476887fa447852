use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use folio_core::{
    Command, Document, DocumentInfo, DocumentProvider, EditorConfig, FileStateStore, Page,
    PageSource, Session, SessionEvent, StateStore,
};
use folio_render::{save_png, PlainRasterizer, Renderer, DEFAULT_CACHE_CAPACITY};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Annotate and rearrange document pages")]
struct Args {
    /// Directory for per-document view state
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to $FOLIO_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Create a document of blank pages
    New {
        path: PathBuf,
        #[arg(long, default_value_t = 1)]
        pages: usize,
        #[arg(long, default_value_t = 612.0)]
        width: f64,
        #[arg(long, default_value_t = 792.0)]
        height: f64,
    },
    /// Run a JSON script of editing commands against a document
    Apply {
        path: PathBuf,
        script: PathBuf,
        /// Write the result here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a JSON summary of a document
    Inspect { path: PathBuf },
    /// Rasterize one page surface to PNG
    Render {
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(short, long)]
        output: PathBuf,
        /// Overrides the remembered zoom
        #[arg(long)]
        scale: Option<f64>,
        /// Render with inverted colors
        #[arg(long)]
        dark: bool,
    },
}

/// Documents stored as JSON on disk.
struct JsonDocumentProvider;

#[async_trait]
impl DocumentProvider for JsonDocumentProvider {
    async fn open(&self, path: &Path) -> Result<(DocumentInfo, Document)> {
        let payload = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read document {:?}", path))?;
        let document: Document = serde_json::from_str(&payload)
            .with_context(|| format!("failed to decode document {:?}", path))?;
        Ok((DocumentInfo::for_path(path, document.len()), document))
    }
}

async fn write_document(path: &Path, document: &Document) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(document)?;
    tokio::fs::write(&tmp, payload)
        .await
        .with_context(|| format!("failed to write temp document {:?}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move document into place at {:?}", path))?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageSummary {
    index: usize,
    id: String,
    width: f64,
    height: f64,
    rotation: i32,
    source: PageSource,
    texts: usize,
    highlights: usize,
    shapes: usize,
}

impl PageSummary {
    fn new(index: usize, page: &Page) -> Self {
        Self {
            index,
            id: page.id.to_string(),
            width: page.width,
            height: page.height,
            rotation: page.rotation.degrees(),
            source: page.source.clone(),
            texts: page.text_annotations.len(),
            highlights: page.highlight_annotations.len(),
            shapes: page.shape_annotations.len(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplySummary {
    commands: usize,
    pages: usize,
    annotations: usize,
    undo_depth: usize,
    redo_depth: usize,
    notices: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EditorConfig::from_file(path)?,
        None => EditorConfig::discover()?,
    };
    let project_dirs = ProjectDirs::from("org", "folio", "folio");
    let log_dir = match (&args.log_dir, &project_dirs) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dirs)) => dirs.data_local_dir().join("logs"),
        (None, None) => bail!("unable to resolve platform data directories; pass --log-dir"),
    };
    let _log_guard = init_logging(&log_dir, &config.logging.level)?;

    match args.command {
        Action::New {
            path,
            pages,
            width,
            height,
        } => {
            if !(width > 0.0 && height > 0.0) {
                bail!("page size must be positive, got {width}x{height}");
            }
            let document =
                Document::with_pages((0..pages).map(|_| Page::blank(width, height)).collect());
            write_document(&path, &document).await?;
            info!(?path, pages, "document created");
            println!("{}", path.display());
        }
        Action::Inspect { path } => {
            let (info, document) = JsonDocumentProvider.open(&path).await?;
            let pages: Vec<PageSummary> = document
                .pages
                .iter()
                .enumerate()
                .map(|(index, page)| PageSummary::new(index, page))
                .collect();
            let summary = serde_json::json!({
                "id": info.id.to_string(),
                "pageCount": info.page_count,
                "pages": pages,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Action::Apply {
            path,
            script,
            output,
        } => {
            let store = open_state_store(&args.state_dir, &project_dirs)?;
            let payload = fs::read_to_string(&script)
                .with_context(|| format!("failed to read script {:?}", script))?;
            let commands: Vec<Command> = serde_json::from_str(&payload)
                .with_context(|| format!("failed to decode script {:?}", script))?;

            let mut session = Session::new(store, config);
            session
                .open_with(&JsonDocumentProvider, &path)
                .await
                .with_context(|| format!("failed to open {:?}", path))?;

            let count = commands.len();
            let mut notices = Vec::new();
            for command in commands {
                session.apply(command)?;
                for event in session.drain_events() {
                    if let SessionEvent::Notice(notice) = event {
                        notices.push(notice.to_string());
                    }
                }
            }

            let target = output.unwrap_or_else(|| path.clone());
            write_document(&target, session.document()).await?;
            session.persist()?;

            let document = session.document();
            let summary = ApplySummary {
                commands: count,
                pages: document.len(),
                annotations: document.pages.iter().map(Page::annotation_count).sum(),
                undo_depth: session.history().undo_len(),
                redo_depth: session.history().redo_len(),
                notices,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Action::Render {
            path,
            page,
            output,
            scale,
            dark,
        } => {
            let store = open_state_store(&args.state_dir, &project_dirs)?;
            let mut session = Session::new(store, config);
            session
                .open_with(&JsonDocumentProvider, &path)
                .await
                .with_context(|| format!("failed to open {:?}", path))?;
            let id = session
                .document()
                .page_at(page)
                .map(|target| target.id)
                .ok_or_else(|| anyhow!("page {page} out of range"))?;
            if let Some(scale) = scale {
                session.set_scale(scale);
            }
            if dark != session.dark_mode() {
                session.toggle_dark_mode();
            }
            let request = session
                .raster_request(id)
                .ok_or_else(|| anyhow!("page {page} out of range"))?;

            let renderer = Renderer::new(PlainRasterizer, DEFAULT_CACHE_CAPACITY);
            renderer.handle_events(&session.drain_events());
            let image = renderer.render(&request)?;
            save_png(&image, &output)?;
            println!("{}x{} {}", image.width, image.height, output.display());
        }
    }
    Ok(())
}

fn open_state_store(
    state_dir: &Option<PathBuf>,
    project_dirs: &Option<ProjectDirs>,
) -> Result<Arc<dyn StateStore>> {
    let dir = match (state_dir, project_dirs) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dirs)) => dirs.data_local_dir().join("state"),
        (None, None) => bail!("unable to resolve platform data directories; pass --state-dir"),
    };
    Ok(Arc::new(FileStateStore::new(dir)?))
}

fn init_logging(log_dir: &Path, default_level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "folio.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_level).unwrap_or_else(|err| {
            eprintln!("invalid log level {default_level:?}: {err}");
            EnvFilter::new("info")
        })
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // stdout carries command output, so console logs go to stderr.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
