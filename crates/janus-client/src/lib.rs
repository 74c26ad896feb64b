//! Persistence clients for janus.
//!
//! Two implementations of [`janus_core::JanusBackend`] plus the plumbing that
//! feeds a live session into one of them:
//!
//! |--------------------|------------------------------------------------|
//! | Item               | Purpose                                        |
//! |--------------------|------------------------------------------------|
//! | [`HttpBackend`]    | REST client for the persistence server         |
//! | [`MemoryArchive`]  | Server-free archive with the same diff rules   |
//! | [`ReporterHandle`] | Background, ordered, fire-and-forget posting   |
//! | [`ClientConfig`]   | RON config with environment overrides          |
//! |--------------------|------------------------------------------------|
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(HttpBackend::new(ClientConfig::load()?)?);
//! let reporter = spawn_reporter(backend.clone(), &session.notebook().path);
//! session.toggle_cell(now)?;
//! sync_session(&mut session, &reporter, now).await?;
//! ```

pub mod archive;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod reporter;

pub use archive::{ActionRow, CellRow, ConfigRow, MemoryArchive, path_hash};
pub use config::ClientConfig;
pub use error::{ClientError, ConfigError, Result};
pub use http::HttpBackend;
pub use reporter::{FlushReport, ReporterHandle, spawn_reporter, sync_session};
