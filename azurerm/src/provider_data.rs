//! Provider data structure passed to resources and data sources

use crate::api::Client;
use crate::locks::NameLocks;
use std::sync::Arc;

/// Behaviour toggles from the provider's `features` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub api_management: ApiManagementFeatures,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiManagementFeatures {
    pub purge_soft_delete_on_destroy: bool,
    pub recover_soft_deleted: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            api_management: ApiManagementFeatures {
                purge_soft_delete_on_destroy: true,
                recover_soft_deleted: true,
            },
        }
    }
}

#[derive(Clone)]
pub struct AzureRmProviderData {
    pub client: Arc<Client>,
    pub locks: Arc<NameLocks>,
    pub features: Features,
}

impl AzureRmProviderData {
    pub fn new(client: Client, features: Features) -> Self {
        Self {
            client: Arc::new(client),
            locks: Arc::new(NameLocks::new()),
            features,
        }
    }
}
