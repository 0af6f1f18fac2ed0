//! The address-book collaborator.
//!
//! Address CRUD lives outside this subsystem; the pipeline only needs to
//! resolve stored addresses by id at commit time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AddressId;
use domain::Address;
use tokio::sync::RwLock;

use crate::error::Result;

/// Read-only lookup of stored shipping/billing addresses.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Resolves an address by id.
    async fn get_address(&self, id: AddressId) -> Result<Option<Address>>;
}

/// In-memory address book for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressBook {
    addresses: Arc<RwLock<HashMap<AddressId, Address>>>,
}

impl InMemoryAddressBook {
    /// Creates a new empty address book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an address and returns its id.
    pub async fn insert(&self, address: Address) -> AddressId {
        let id = AddressId::new();
        self.addresses.write().await.insert(id, address);
        id
    }
}

#[async_trait]
impl AddressBook for InMemoryAddressBook {
    async fn get_address(&self, id: AddressId) -> Result<Option<Address>> {
        Ok(self.addresses.read().await.get(&id).cloned())
    }
}
