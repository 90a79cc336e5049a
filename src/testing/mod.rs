//! Test fixtures: an in-memory backend with the full service graph wired up.

use std::sync::Arc;

use crate::authz::{Authorizer, Principal};
use crate::blob::MemoryBlobStore;
use crate::database::models::{from_document, Role};
use crate::database::store::{query_eq, DocumentStore};
use crate::database::{
    MemoryDocumentStore, PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION,
};
use crate::dynamic::{ItemGateway, SchemaRegistry};
use crate::services::{EntityService, RoleService, UserService};

/// Set process-wide test environment before the config singleton loads.
/// Safe to call from every test; only the first call does anything.
pub fn init_test_env() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        std::env::set_var("JWT_SECRET", "test-secret");
    });
}

/// Everything wired against in-memory stores, with the system collections
/// created and an Administrator role seeded.
pub struct TestBackend {
    pub store: Arc<MemoryDocumentStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub registry: Arc<SchemaRegistry>,
    pub authz: Authorizer,
    pub entities: EntityService,
    pub roles: RoleService,
    pub users: UserService,
    pub gateway: ItemGateway,
}

impl TestBackend {
    pub async fn new() -> Self {
        init_test_env();

        let store = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        for collection in [PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION] {
            store.create_collection(collection).await.expect("collection");
        }

        let store_dyn: Arc<dyn DocumentStore> = store.clone();
        let registry = Arc::new(SchemaRegistry::new(store_dyn.clone()));

        let backend = Self {
            authz: Authorizer::new(store_dyn.clone()),
            entities: EntityService::new(store_dyn.clone(), registry.clone()),
            roles: RoleService::new(store_dyn.clone()),
            users: UserService::new(store_dyn.clone()),
            gateway: ItemGateway::new(store_dyn, blobs.clone(), registry.clone()),
            store,
            blobs,
            registry,
        };

        backend
            .roles
            .create(crate::services::RoleInput {
                name: "Administrator".to_string(),
                page_permissions: vec![],
            })
            .await
            .expect("seed admin role");

        backend
    }

    /// Current state of the seeded Administrator role.
    pub async fn admin_role(&self) -> Role {
        let doc = self
            .store
            .find_one(ROLES_COLLECTION, &query_eq("name", "Administrator"))
            .await
            .expect("roles collection")
            .expect("admin role");
        from_document(doc).expect("role document")
    }

    /// A principal carrying the Administrator role.
    pub async fn admin_principal(&self) -> Principal {
        Principal {
            user_id: uuid::Uuid::new_v4(),
            role_id: self.admin_role().await.id,
        }
    }
}
