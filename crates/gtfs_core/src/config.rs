//! Store configuration.

/// Configuration for opening a GTFS store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the log after every durable operation.
    ///
    /// Disabling this trades the crash-durability guarantee for speed;
    /// committed writes may be lost on power failure.
    pub sync_on_write: bool,

    /// Whether to emit per-operation diagnostic events.
    ///
    /// Purely observational; has no effect on semantics.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync the log after every durable operation.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether to emit per-operation diagnostics.
    #[must_use]
    pub const fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert!(!config.verbose);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_write(false)
            .verbose(true);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_write);
        assert!(config.verbose);
    }
}
