//! # tessera-store
//!
//! Multi-tenant document persistence layer for MongoDB. Any entity type
//! acquires full CRUD, soft delete, pagination, ordering and atomic array
//! mutation behavior by implementing the [`Entity`](entity::Entity) trait;
//! no per-entity query code.
//!
//! ## Features
//!
//! - **Typed query model**: backend-agnostic filters, ordering and
//!   pagination ([`query`])
//! - **Store translation**: the query model compiles to native BSON, with
//!   opportunistic date coercion and a closed operator set ([`repository`])
//! - **Atomic array mutations**: add/remove/toggle membership on array
//!   fields via single aggregation pipelines, no read-modify-write races
//! - **Multi-tenant routing**: tenant collections live in per-tenant
//!   databases, global collections in one shared database; clients are
//!   pooled for the process lifetime ([`router`])
//! - **Audit trail**: creation/update/deletion stamps, soft delete, and a
//!   version counter with opt-in optimistic concurrency ([`entity`])
//! - **Typed errors**: every semantic failure case is an error kind, never
//!   a message substring ([`error`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use tessera_store::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Order {
//!     #[serde(flatten)]
//!     base: DocumentBase,
//!     status: String,
//! }
//!
//! impl Entity for Order {
//!     const COLLECTION: CollectionSpec = CollectionSpec::tenant("orders");
//!
//!     fn base(&self) -> &DocumentBase {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut DocumentBase {
//!         &mut self.base
//!     }
//!
//!     fn augment_find_options(&self, options: &mut FindOptions) {
//!         if !self.status.is_empty() {
//!             options.add_equals("status", self.status.clone());
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = StoreConfig::load()?;
//!     init_tracing(&config)?;
//!     let router = Arc::new(ConnectionRouter::new(config));
//!
//!     let mut order = Order {
//!         status: "open".to_string(),
//!         ..Order::default()
//!     };
//!     order.set_tenant_id("tenant-a");
//!
//!     let mut request = Request::new(order, &router, Actor::new("ada"))?;
//!     request.paginate(20, 1);
//!     let response = request.find().await?;
//!     println!("{} open orders", response.total_rows);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod observability;
pub mod query;
pub mod repository;
pub mod request;
pub mod response;
pub mod router;

/// Commonly used types, re-exported
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::entity::{Actor, ActorStamp, CollectionSpec, DateRange, DocumentBase, Entity};
    pub use crate::error::{Error, Result, StoreError, StoreErrorKind, StoreOperation};
    pub use crate::observability::init_tracing;
    pub use crate::query::{Filter, FilterOperator, FindOptions, Order, Orders};
    pub use crate::repository::{
        BulkGuard, MongoRepository, RepoRequest, RepoResponse, RepoType, Repository,
    };
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::router::{ConnectionRouter, ConnectionState, Route, RoutedDatabase};
}
