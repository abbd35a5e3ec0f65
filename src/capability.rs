//! Optional codecs, resolved once and passed down explicitly.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tabular::{ContainerTabularBridge, TabularBridge};

#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Sparse-matrix encoding and decoding.
    pub sparse: bool,
    /// Frame storage; `None` disables frames.
    pub tabular: Option<Arc<dyn TabularBridge>>,
}

impl Default for Capabilities {
    /// Everything the crate was built with.
    fn default() -> Self {
        let tabular: Option<Arc<dyn TabularBridge>> = if cfg!(feature = "tabular") {
            Some(Arc::new(ContainerTabularBridge))
        } else {
            None
        };
        Capabilities { sparse: cfg!(feature = "sparse"), tabular }
    }
}

impl Capabilities {
    pub fn none() -> Self {
        Capabilities { sparse: false, tabular: None }
    }

    pub fn with_tabular(mut self, bridge: Arc<dyn TabularBridge>) -> Self {
        self.tabular = Some(bridge);
        self
    }

    pub(crate) fn require_sparse(&self) -> Result<()> {
        if self.sparse {
            Ok(())
        } else {
            Err(Error::MissingDependency("sparse matrix"))
        }
    }

    pub(crate) fn require_tabular(&self) -> Result<&dyn TabularBridge> {
        self.tabular.as_deref().ok_or(Error::MissingDependency("tabular frame"))
    }
}
