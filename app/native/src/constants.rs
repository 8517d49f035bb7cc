//! Application-wide identifiers.

/// Application identifier used for cache and config directories.
pub const APP_ID: &str = "strata";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "STRATA_LOG";

/// Log filter used when `STRATA_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";
