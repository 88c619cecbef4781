//! Fetching activation documents

use crate::{Error, Result};
use overlay_core::{ActivationDocument, ActivationId};
use std::collections::HashMap;

/// Where activation documents come from. Retrieval itself (network, disk,
/// bundled assets) is up to the host.
pub trait ActivationSource {
    fn fetch(&mut self, id: ActivationId) -> Result<ActivationDocument>;
}

impl ActivationSource for HashMap<ActivationId, ActivationDocument> {
    fn fetch(&mut self, id: ActivationId) -> Result<ActivationDocument> {
        self.get(&id).cloned().ok_or(Error::ActivationNotFound(id))
    }
}

/// Outcome of preloading the activations of a distribution
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Fetched and cached by this load
    pub loaded: Vec<ActivationId>,
    /// Already cached from an earlier load
    pub cached: Vec<ActivationId>,
    /// Failed to load; their windows leave slots empty
    pub failed: Vec<(ActivationId, Error)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
