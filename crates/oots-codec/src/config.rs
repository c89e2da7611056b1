use serde::{Deserialize, Serialize};

/// Default upper bound on a single encoded document.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Indent written documents.
    pub pretty: bool,
    /// Documents larger than this are neither written nor parsed.
    pub max_document_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl CodecConfig {
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_max_document_bytes(mut self, max_document_bytes: usize) -> Self {
        self.max_document_bytes = max_document_bytes;
        self
    }
}
