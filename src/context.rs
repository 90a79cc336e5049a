//! Process-wide service graph, constructed once at startup and injected
//! into handlers. The schema registry cache lives here rather than in any
//! global namespace.

use std::sync::Arc;

use crate::authz::Authorizer;
use crate::blob::BlobStore;
use crate::database::store::{DocumentStore, StoreError};
use crate::database::{PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION};
use crate::dynamic::{ItemGateway, SchemaRegistry};
use crate::services::{EntityService, RoleService, UserService};

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub registry: Arc<SchemaRegistry>,
    pub authz: Arc<Authorizer>,
    pub entities: Arc<EntityService>,
    pub roles: Arc<RoleService>,
    pub users: Arc<UserService>,
    pub gateway: Arc<ItemGateway>,
}

impl AppContext {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let registry = Arc::new(SchemaRegistry::new(store.clone()));
        Self {
            authz: Arc::new(Authorizer::new(store.clone())),
            entities: Arc::new(EntityService::new(store.clone(), registry.clone())),
            roles: Arc::new(RoleService::new(store.clone())),
            users: Arc::new(UserService::new(store.clone())),
            gateway: Arc::new(ItemGateway::new(
                store.clone(),
                blobs.clone(),
                registry.clone(),
            )),
            store,
            blobs,
            registry,
        }
    }

    /// Create the fixed system collections if they do not exist yet.
    pub async fn init_system_collections(&self) -> Result<(), StoreError> {
        for collection in [PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION] {
            self.store.create_collection(collection).await?;
        }
        Ok(())
    }
}
