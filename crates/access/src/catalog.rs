//! Operation-type catalog

use crate::error::AccessError;
use secops_core::OperationType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Allow-list of recognized operation categories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCatalog {
    supported: BTreeSet<OperationType>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the given types (duplicates collapse)
    pub fn with_types(types: impl IntoIterator<Item = OperationType>) -> Self {
        Self {
            supported: types.into_iter().collect(),
        }
    }

    pub fn add(&mut self, operation_type: OperationType) -> Result<(), AccessError> {
        if !self.supported.insert(operation_type) {
            return Err(AccessError::OperationTypeExists(operation_type));
        }
        Ok(())
    }

    pub fn remove(&mut self, operation_type: OperationType) -> Result<(), AccessError> {
        if !self.supported.remove(&operation_type) {
            return Err(AccessError::UnsupportedOperationType(operation_type));
        }
        Ok(())
    }

    pub fn is_supported(&self, operation_type: &OperationType) -> bool {
        self.supported.contains(operation_type)
    }

    /// Fails with `UnsupportedOperationType` when absent
    pub fn ensure_supported(&self, operation_type: &OperationType) -> Result<(), AccessError> {
        if self.is_supported(operation_type) {
            Ok(())
        } else {
            Err(AccessError::UnsupportedOperationType(*operation_type))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationType> {
        self.supported.iter()
    }

    pub fn len(&self) -> usize {
        self.supported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }
}
