//! janus command-line tool.
//!
//! Inspect a notebook's Janus metadata and read its recorded history.
//!
//! ## Usage
//!
//! ```bash
//! # Cells, visibility, folded groups and recorded paths
//! janus inspect analysis.ipynb
//!
//! # Send a snapshot and write the reported path back into the file
//! janus record analysis.ipynb
//!
//! # Render a past revision (default: latest)
//! janus history analysis.ipynb --rev 3
//!
//! # A cell's versions across every path the notebook has had
//! janus cell-history analysis.ipynb 4f2a
//!
//! # Comments
//! janus comment analysis.ipynb "split the loading cell"
//! janus comments analysis.ipynb
//!
//! # Any command against a local archive file instead of the server
//! janus --offline archive.json record analysis.ipynb
//! ```
//!
//! Notebooks without their own `track_history` flag take the client
//! config's `track_history` (default: on).

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use janus_client::{ClientConfig, HttpBackend, MemoryArchive, spawn_reporter, sync_session};
use janus_core::{ActionPlan, JanusBackend, Notebook, NotebookSession};
use janus_types::{CellId, NotebookMeta, PostBody, now_millis};

/// Notebook visibility and version history.
#[derive(Parser, Debug)]
#[command(name = "janus")]
#[command(about = "Inspect and query Janus notebook history")]
struct Args {
    /// Use a local archive file instead of the persistence server
    #[arg(long, global = true, value_name = "ARCHIVE")]
    offline: Option<PathBuf>,

    /// Server URL (overrides config and JANUS_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Server-relative notebook path (default: the file path as given)
    #[arg(long = "as", global = true, value_name = "PATH")]
    remote_path: Option<String>,

    /// Client config file (default: <config_dir>/janus/client.ron)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show cells, visibility, groups and recorded paths
    Inspect { notebook: PathBuf },

    /// Report a snapshot and save the returned path hash into the notebook
    Record { notebook: PathBuf },

    /// Render one revision of the notebook timeline
    History {
        notebook: PathBuf,
        /// Revision index, 0 is the oldest (default: latest)
        #[arg(long)]
        rev: Option<usize>,
    },

    /// List a cell's versions across all recorded paths
    CellHistory {
        notebook: PathBuf,
        /// Cell id or unique id prefix
        cell: String,
    },

    /// List comments on the notebook
    Comments { notebook: PathBuf },

    /// Add a comment to the notebook
    Comment { notebook: PathBuf, text: String },
}

// ── Backend selection ───────────────────────────────────────────────────────

/// The backend plus, offline, where to write the archive back.
struct Store {
    backend: Arc<dyn JanusBackend>,
    archive: Option<(Arc<MemoryArchive>, PathBuf)>,
}

fn client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(file) => ClientConfig::load_from(file)
            .and_then(|c| c.with_overrides(|key| std::env::var(key).ok()))
            .with_context(|| format!("loading client config {}", file.display()))?,
        None => ClientConfig::load().context("loading client config")?,
    };
    if let Some(url) = &args.server {
        config.server_url = url.clone();
    }
    Ok(config)
}

impl Store {
    fn open(args: &Args, config: &ClientConfig) -> Result<Self> {
        if let Some(file) = &args.offline {
            let archive = Arc::new(
                MemoryArchive::open(file)
                    .with_context(|| format!("opening archive {}", file.display()))?,
            );
            tracing::debug!(archive = %file.display(), "using offline archive");
            return Ok(Self {
                backend: archive.clone(),
                archive: Some((archive, file.clone())),
            });
        }
        tracing::debug!(server = %config.server_url, "using persistence server");
        Ok(Self {
            backend: Arc::new(HttpBackend::new(config.clone())?),
            archive: None,
        })
    }

    fn persist(&self) -> Result<()> {
        if let Some((archive, file)) = &self.archive {
            archive
                .save(file)
                .with_context(|| format!("saving archive {}", file.display()))?;
        }
        Ok(())
    }
}

// ── Notebook files ──────────────────────────────────────────────────────────

fn remote_path(args: &Args, file: &Path) -> String {
    args.remote_path
        .clone()
        .unwrap_or_else(|| file.to_string_lossy().replace('\\', "/"))
}

fn load_session(
    args: &Args,
    config: &ClientConfig,
    file: &Path,
    now: u64,
) -> Result<NotebookSession> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;
    let mut notebook = Notebook::from_json(remote_path(args, file), &json)?;
    let metadata = json.get("metadata").cloned().unwrap_or_default();
    if !NotebookMeta::declares_track_history(&metadata) {
        notebook.meta.track_history = config.track_history;
    }
    Ok(NotebookSession::open(notebook, now))
}

fn save_notebook(session: &NotebookSession, file: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(&session.to_json())?;
    std::fs::write(file, text + "\n").with_context(|| format!("writing {}", file.display()))?;
    Ok(())
}

fn resolve_cell(session: &NotebookSession, query: &str) -> Result<CellId> {
    let matches: Vec<&CellId> = session
        .notebook()
        .cells
        .iter()
        .map(|c| &c.id)
        .filter(|id| id.matches_prefix(query))
        .collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => bail!("no cell matches '{query}'"),
        many => bail!("'{query}' matches {} cells, use a longer prefix", many.len()),
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn run(args: &Args) -> Result<()> {
    let now = now_millis();
    let config = client_config(args)?;
    match &args.command {
        Command::Inspect { notebook } => {
            let session = load_session(args, &config, notebook, now)?;
            print!(
                "{}",
                render::notebook(session.notebook(), session.display().groups())
            );
        }

        Command::Record { notebook } => {
            let store = Store::open(args, &config)?;
            let mut session = load_session(args, &config, notebook, now)?;
            if let ActionPlan::Immediate(pending) = session.begin_action("save-notebook", now) {
                session.finish_action(pending);
            }
            let reporter = spawn_reporter(store.backend.clone(), session.notebook().path.clone());
            let report = sync_session(&mut session, &reporter, now).await?;
            if report.failed > 0 {
                bail!("{} of {} reports failed", report.failed, report.failed + report.posted);
            }
            store.persist()?;
            save_notebook(&session, notebook)?;
            match report.paths().first() {
                Some(hash) => println!("recorded {} as {hash}", session.notebook().path),
                None => println!("recording is off for {}", session.notebook().path),
            }
        }

        Command::History { notebook, rev } => {
            let store = Store::open(args, &config)?;
            let mut session = load_session(args, &config, notebook, now)?;
            let path = session.notebook().path.clone();
            let history = session.load_history(&*store.backend).await;
            let Some(latest) = history.latest() else {
                println!("no recorded history for {path}");
                return Ok(());
            };
            let target = rev.unwrap_or(latest);
            let caption = history.caption(target);
            match history.go_to(target, &*store.backend, &path).await? {
                Some(rendered) => print!("{}", render::revision(&rendered, &caption, now)),
                None => bail!("revision {target} was superseded"),
            }
        }

        Command::CellHistory { notebook, cell } => {
            let store = Store::open(args, &config)?;
            let mut session = load_session(args, &config, notebook, now)?;
            let id = resolve_cell(&session, cell)?;
            session.load_cell_history(&id, &*store.backend).await?;
            print!("{}", render::versions(session.notebook().cell(&id)?, now));
        }

        Command::Comments { notebook } => {
            let store = Store::open(args, &config)?;
            let comments = store.backend.comments(&remote_path(args, notebook)).await?;
            print!("{}", render::comments(&comments, now));
        }

        Command::Comment { notebook, text } => {
            let store = Store::open(args, &config)?;
            store
                .backend
                .post(&remote_path(args, notebook), &PostBody::comment(now, text.as_str()))
                .await?;
            store.persist()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    run(&args).await
}

// ============================================================================
// Tests
// ============================================================================
