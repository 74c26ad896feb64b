//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default persistence server for local development.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8888";

/// Route prefix mounted by the persistence server.
pub const API_PREFIX: &str = "/api/janus";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Directory under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "janus";

/// Client configuration file name.
pub const CONFIG_FILE: &str = "client.ron";

/// Environment override for the server URL.
pub const ENV_SERVER_URL: &str = "JANUS_SERVER_URL";

/// Environment override for the request timeout, in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "JANUS_TIMEOUT_MS";

/// Length of the hex path hash the archive reports.
pub const PATH_HASH_LEN: usize = 8;

/// Length of the hex version ids the archive assigns.
pub const VERSION_ID_LEN: usize = 8;

/// Deferred actions older than this are dropped by the CLI driver.
pub const ACTION_EXPIRY_MS: u64 = 60_000;
