//! Engine configuration.

use thiserror::Error;

/// How many entries the operation cache may hold before it is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLimit {
    /// Reset the whole cache when an insert finds more than `n` entries stored.
    Entries(usize),
    /// Never reset.
    Unbounded,
}

impl Default for CacheLimit {
    fn default() -> Self {
        CacheLimit::Entries(10_000)
    }
}

/// Configuration of a derivative [Engine](crate::re::Engine).
#[derive(Debug, Clone)]
pub struct DerivConfig {
    /// Size limit of the operation cache.
    pub cache_limit: CacheLimit,
    /// Check every derivative against the derivative normal form.
    /// Only has an effect when debug assertions are enabled.
    pub check_normal_form: bool,
    /// Maximum length of words considered by witness search and sampling.
    pub max_witness_length: usize,
}

impl Default for DerivConfig {
    fn default() -> Self {
        Self {
            cache_limit: CacheLimit::default(),
            check_normal_form: true,
            max_witness_length: 64,
        }
    }
}

impl DerivConfig {
    pub fn with_cache_limit(mut self, limit: CacheLimit) -> Self {
        self.cache_limit = limit;
        self
    }

    pub fn with_normal_form_check(mut self, check: bool) -> Self {
        self.check_normal_form = check;
        self
    }

    pub fn with_max_witness_length(mut self, len: usize) -> Self {
        self.max_witness_length = len;
        self
    }

    /// Checks that the configuration describes a usable engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_limit == CacheLimit::Entries(0) {
            return Err(ConfigError::ZeroCacheLimit);
        }
        if self.max_witness_length == 0 {
            return Err(ConfigError::ZeroWitnessLength);
        }
        Ok(())
    }
}

/// An invalid [DerivConfig].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A cache that can hold no entries
    #[error("cache limit must allow at least one entry")]
    ZeroCacheLimit,
    /// Witness search without any room to search
    #[error("maximum witness length must be positive")]
    ZeroWitnessLength,
}
