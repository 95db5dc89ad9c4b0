//! # Shared Constants
//!
//! Defaults shared by the library and the `askdb` binary, kept in one place to
//! avoid magic numbers drifting apart.

/// How long a formatted schema context stays cached, in seconds.
pub const DEFAULT_SCHEMA_CACHE_TTL_SECS: u64 = 300;

/// How often expired cache entries are swept, in seconds.
pub const DEFAULT_CACHE_SWEEP_SECS: u64 = 60;

/// Timeout applied to every database and AI provider request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// The root directory for local state.
pub const DATA_DIR: &str = "db";

/// The default JSON Lines file receiving query history.
pub const DEFAULT_HISTORY_FILE: &str = "db/query_history.jsonl";
