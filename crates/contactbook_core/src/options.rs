//! Store configuration passed explicitly to every repository.
//!
//! # Invariants
//! - `timeout`, `default_limit` and `max_limit` are never zero after
//!   [`StoreOptions::sanitized`].
//! - `default_limit <= max_limit`.

use log::debug;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const MAX_LIST_LIMIT: u32 = 100;

const ENV_TIMEOUT_MS: &str = "CONTACTBOOK_TIMEOUT_MS";
const ENV_DEFAULT_LIMIT: &str = "CONTACTBOOK_DEFAULT_LIMIT";
const ENV_MAX_LIMIT: &str = "CONTACTBOOK_MAX_LIMIT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound for one logical operation, including lock waits.
    pub timeout: Duration,
    /// Page size applied when a list query gives none (or zero).
    pub default_limit: u32,
    /// Largest page size a list query may request.
    pub max_limit: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            default_limit: DEFAULT_LIST_LIMIT,
            max_limit: MAX_LIST_LIMIT,
        }
    }
}

impl StoreOptions {
    /// Reads overrides from `CONTACTBOOK_*` environment variables.
    ///
    /// Unset or blank variables keep defaults; unparsable values are errors.
    pub fn from_env() -> Result<Self, String> {
        let mut options = Self::default();
        if let Some(ms) = read_env_u64(ENV_TIMEOUT_MS)? {
            options.timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = read_env_u64(ENV_DEFAULT_LIMIT)? {
            options.default_limit = clamp_to_u32(ENV_DEFAULT_LIMIT, limit)?;
        }
        if let Some(limit) = read_env_u64(ENV_MAX_LIMIT)? {
            options.max_limit = clamp_to_u32(ENV_MAX_LIMIT, limit)?;
        }
        Ok(options.sanitized())
    }

    /// Replaces zero values with defaults and keeps `default_limit` within
    /// `max_limit`.
    pub fn sanitized(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
            debug!(
                "event=options_default module=options field=timeout value_ms={}",
                self.timeout.as_millis()
            );
        }
        if self.max_limit == 0 {
            self.max_limit = MAX_LIST_LIMIT;
            debug!(
                "event=options_default module=options field=max_limit value={}",
                self.max_limit
            );
        }
        if self.default_limit == 0 {
            self.default_limit = DEFAULT_LIST_LIMIT;
            debug!(
                "event=options_default module=options field=default_limit value={}",
                self.default_limit
            );
        }
        self.default_limit = self.default_limit.min(self.max_limit);
        self
    }

    /// Effective page size for a requested limit.
    pub fn normalize_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.default_limit,
            Some(value) if value > self.max_limit => self.max_limit,
            Some(value) => value,
        }
    }
}

fn read_env_u64(key: &str) -> Result<Option<u64>, String> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| format!("invalid `{key}` value `{raw}`: {err}")),
        Err(_) => Ok(None),
    }
}

fn clamp_to_u32(key: &str, value: u64) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("`{key}` value {value} is too large"))
}
