use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./smokecalc-data";
pub const DEFAULT_KEY_PREFIX: &str = "smokecalc";
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory of the file-backed blob store.
    pub data_dir: PathBuf,

    /// Namespace of every blob key (`<prefix>:<KEY>`). Clearing all data
    /// only touches keys under this prefix.
    pub key_prefix: String,

    /// Maximum number of quick-calc history entries kept.
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, key_prefix: S) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub(crate) fn namespace(&self) -> String {
        format!("{}:", self.key_prefix)
    }

    pub(crate) fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.namespace(), name)
    }
}
