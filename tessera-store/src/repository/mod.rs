//! Repository: translation of the query model into native store operations
//!
//! [`Repository`] is the contract the orchestration layer consumes;
//! [`MongoRepository`] is the store adapter implementing it. The trait uses
//! RPITIT (Return Position Impl Trait In Traits) for ergonomic async
//! methods without `async_trait`.
//!
//! Fatal errors travel as `Err`; non-fatal ones ride along in
//! [`RepoResponse::errors`].

mod mongo;
mod translate;

use std::future::Future;
use std::time::Duration;

use mongodb::bson::Document;

use crate::entity::{Actor, Entity};
use crate::error::Result;
use crate::query::FindOptions;

pub use mongo::MongoRepository;
pub use translate::{
    array_add_pipeline, array_len_pipeline, array_remove_pipeline, array_toggle_pipeline,
    build_filter, build_sort,
};

/// Backend type identifier for a repository implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RepoType {
    /// Unrecognized backend
    #[default]
    Unknown,
    /// MongoDB via the official driver
    MongoDb,
}

/// Empty-filter policy for bulk mutations
///
/// `Enforce` refuses to run a bulk operation against an empty filter, so a
/// forgotten filter can never update or delete a whole collection.
/// Soft delete runs `Permissive` by design: marking records deleted is
/// recoverable, so it is allowed to sweep everything a filterless request
/// matches. The asymmetry is intentional; this enum exists so it stays
/// visible at the call site instead of being an implicit code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkGuard {
    /// Refuse bulk mutations with an empty filter
    Enforce,
    /// Allow bulk mutations with an empty filter
    Permissive,
}

/// The unit of work handed to a repository operation
#[derive(Debug, Clone)]
pub struct RepoRequest<M: Entity> {
    /// Target entity; known fields drive the lookup, decoded results land
    /// in the response list
    pub model: M,
    /// Who is acting; stamps audit fields
    pub actor: Actor,
    /// Rows per page; 0 disables pagination
    pub page_size: i64,
    /// 1-based page number; 0 disables the limit
    pub current_page: i64,
    /// Translated filter/order bundle
    pub find_options: FindOptions,
    /// Destination collection for move operations
    pub target_collection: Option<String>,
    /// Allow `update` to fall back to `create` when the target is missing
    pub upsert: bool,
    /// Pin the expected document version on update; a zero-match update
    /// then reports a conflict instead of silently rewriting newer data
    pub check_version: bool,
    /// Per-operation deadline; expiry surfaces as a timeout error
    pub deadline: Option<Duration>,
}

impl<M: Entity> RepoRequest<M> {
    /// Create a request with defaults: no pagination, no flags
    pub fn new(model: M, actor: Actor) -> Self {
        Self {
            model,
            actor,
            page_size: 0,
            current_page: 0,
            find_options: FindOptions::new(),
            target_collection: None,
            upsert: false,
            check_version: false,
            deadline: None,
        }
    }
}

/// What a repository operation produced
#[derive(Debug, Clone)]
pub struct RepoResponse<M> {
    /// Rows matching the filter (capped by the count safety bound)
    pub total_rows: i64,
    /// `ceil(total_rows / page_size)` when paginated, 0 otherwise
    pub total_pages: i64,
    /// Page size echoed from the request
    pub page_size: i64,
    /// Current page echoed from the request
    pub current_page: i64,
    /// Decoded result rows
    pub list: Vec<M>,
    /// Non-fatal errors collected along the way
    pub errors: Vec<crate::error::StoreError>,
}

impl<M> Default for RepoResponse<M> {
    fn default() -> Self {
        Self {
            total_rows: 0,
            total_pages: 0,
            page_size: 0,
            current_page: 0,
            list: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<M> RepoResponse<M> {
    /// An empty response
    pub fn empty() -> Self {
        Self::default()
    }

    /// A response carrying rows, with pagination totals computed
    pub fn with_rows(list: Vec<M>, total_rows: i64, page_size: i64, current_page: i64) -> Self {
        Self {
            total_rows,
            total_pages: total_pages(total_rows, page_size),
            page_size,
            current_page,
            list,
            errors: Vec::new(),
        }
    }

    /// A response reporting only an affected-row count
    pub fn with_total(total_rows: i64) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }
}

/// `ceil(total_rows / page_size)`; 0 when unpaginated
pub fn total_pages(total_rows: i64, page_size: i64) -> i64 {
    if page_size > 0 && total_rows > 0 {
        (total_rows + page_size - 1) / page_size
    } else {
        0
    }
}

/// Store adapter contract consumed by the orchestration layer
///
/// Implementations translate [`FindOptions`] into native queries and
/// execute them. All operations are blocking calls that may perform
/// network I/O; none are fire-and-forget.
pub trait Repository: Send + Sync {
    /// List documents; an entity with a resolved identity short-circuits to
    /// a by-id lookup whose "not found" is absorbed into an empty result
    fn find<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Fetch exactly one document by identity; missing documents are an
    /// error here, unlike [`Repository::find`]
    fn find_one<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Count documents matching the filter, subject to the count safety
    /// bound
    fn count<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Persist the entity: create when new, otherwise a whole-document
    /// `$set` by identity
    fn update<M: Entity>(
        &self,
        request: &mut RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Bulk partial update by filter; refuses an empty filter
    fn update_many<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        values: Document,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Bulk single-field update by filter; refuses an empty filter
    fn update_field<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: mongodb::bson::Bson,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Insert many entities at once, stamping creation on the new ones
    fn create_many<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        models: Vec<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Atomically add a value to an array field, without duplicates
    fn add_item_in_array<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Atomically remove a value from an array field
    fn remove_item_in_array<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Atomically toggle membership of a value in an array field and report
    /// the resulting array length
    fn switch_item_in_array<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Copy matching documents into the target collection, then delete the
    /// originals; the two steps are not atomic
    fn move_to<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Delete by identity when resolved, otherwise bulk delete by filter
    /// with the empty-filter guard enforced
    fn delete<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Set the deletion stamp on matching documents without removing them;
    /// runs with [`BulkGuard::Permissive`]
    fn delete_soft<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Null a field across matching documents, stamping the update
    fn remove_field<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Run a caller-supplied pipeline, then re-run it with a `$count` stage
    /// for the total; the two round trips are only mutually consistent if
    /// the data does not change between them
    fn aggregate<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> impl Future<Output = Result<RepoResponse<M>>> + Send;

    /// Which backend this repository targets
    fn repo_type(&self) -> RepoType;

    /// Tenant id this repository is bound to
    fn tenant(&self) -> &str;

    /// Database name this repository resolves to
    fn database(&self) -> &str;

    /// Connection string this repository resolves through
    fn connection(&self) -> &str;

    /// Collection name this repository targets
    fn collection_name(&self) -> &str;

    /// Re-point this repository at another tenant database
    fn set_tenant(&mut self, tenant: &str) -> Result<()>;

    /// Dump the backing database via an external process
    fn repo_backup(&self, backup_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Restore the backing database from a dump via an external process
    fn repo_restore(&self, backup_id: &str) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 10), 3);
    }

    #[test]
    fn test_total_pages_unpaginated() {
        assert_eq!(total_pages(100, 0), 0);
        assert_eq!(total_pages(100, -1), 0);
    }

    #[test]
    fn test_with_rows_computes_pages() {
        let response: RepoResponse<()> = RepoResponse::with_rows(Vec::new(), 21, 10, 1);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.page_size, 10);
    }
}
