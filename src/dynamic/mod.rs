pub mod gateway;
pub mod registry;

pub use gateway::{FilePayload, GatewayError, ItemGateway, ItemListing};
pub use registry::{DynamicSchema, FieldKind, RegistryError, SchemaRegistry};
