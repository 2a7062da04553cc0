//! # App Registry
//!
//! App definitions known to this node, keyed by definition address.

use crate::domain::LifecycleError;
use crate::ports::AppDefinition;
use parking_lot::RwLock;
use shared_types::Address;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct AppRegistry {
    definitions: RwLock<HashMap<Address, Arc<dyn AppDefinition>>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: Address, definition: Arc<dyn AppDefinition>) {
        self.definitions.write().insert(address, definition);
    }

    pub fn get(&self, address: &Address) -> Result<Arc<dyn AppDefinition>, LifecycleError> {
        self.definitions
            .read()
            .get(address)
            .cloned()
            .ok_or(LifecycleError::NoAppDefinition(*address))
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}
