//! [`StorageBackend`] implementation that writes JSON documents.

use std::path::Path;

use worldsnap_core::sink::{SinkError, StorageBackend};

use crate::flow::StorageFlow;

/// Launches one [`StorageFlow`] per capture session.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStorageBackend {
    pretty: bool,
}

impl JsonStorageBackend {
    /// A backend writing compact JSON.
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    /// Write indented JSON instead of compact JSON.
    #[must_use]
    pub const fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl StorageBackend for JsonStorageBackend {
    type Pipeline = StorageFlow;

    fn launch(&self, level_name: &str, target: &Path) -> Result<Self::Pipeline, SinkError> {
        Ok(StorageFlow::spawn(level_name, target, self.pretty)?)
    }
}
