//! MongoDB store adapter
//!
//! Executes the CRUD family against the native driver. Connection/database
//! resolution goes through the [`ConnectionRouter`] on every operation, so
//! a repository is cheap to construct and carries no open handle of its
//! own. Guard checks (empty filter, missing identity, missing target) run
//! before any network round trip.
//!
//! Connection establishment is bounded by the router's connect timeout; the
//! optional per-request deadline bounds the query I/O that follows. A
//! degraded liveness ping on a reused client is surfaced as a non-fatal
//! error on the response while the operation proceeds on the stale handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, to_document, Bson, Document};
use mongodb::Collection;

use crate::entity::{CollectionSpec, Entity};
use crate::error::{Error, Result, StoreError, StoreOperation};
use crate::router::{ConnectionRouter, ConnectionState, Route};

use super::translate::{
    array_add_pipeline, array_len_pipeline, array_remove_pipeline, array_toggle_pipeline,
    build_filter, build_sort,
};
use super::{total_pages, BulkGuard, RepoRequest, RepoResponse, RepoType, Repository};

/// Repository bound to one collection in one tenant database
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tessera_store::config::StoreConfig;
/// use tessera_store::repository::{MongoRepository, Repository};
/// use tessera_store::router::ConnectionRouter;
/// # use serde::{Deserialize, Serialize};
/// # use tessera_store::entity::{CollectionSpec, DocumentBase, Entity};
/// # #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// # struct Order {
/// #     #[serde(flatten)]
/// #     base: DocumentBase,
/// # }
/// # impl Entity for Order {
/// #     const COLLECTION: CollectionSpec = CollectionSpec::tenant("orders");
/// #     fn base(&self) -> &DocumentBase { &self.base }
/// #     fn base_mut(&mut self) -> &mut DocumentBase { &mut self.base }
/// # }
///
/// let router = Arc::new(ConnectionRouter::new(StoreConfig::default()));
/// let repo = MongoRepository::for_entity::<Order>(router, "tenant-a", "")?;
/// assert_eq!(repo.database(), "tenant-a");
/// # Ok::<(), tessera_store::error::Error>(())
/// ```
#[derive(Clone)]
pub struct MongoRepository {
    router: Arc<ConnectionRouter>,
    spec: CollectionSpec,
    route: Route,
    tenant: String,
}

impl std::fmt::Debug for MongoRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoRepository")
            .field("spec", &self.spec)
            .field("route", &self.route)
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl MongoRepository {
    /// Build a repository for an entity type's collection
    pub fn for_entity<M: Entity>(
        router: Arc<ConnectionRouter>,
        tenant: &str,
        connection: &str,
    ) -> Result<Self> {
        Self::for_spec(router, M::COLLECTION, tenant, connection)
    }

    /// Build a repository for an explicit collection descriptor
    pub fn for_spec(
        router: Arc<ConnectionRouter>,
        spec: CollectionSpec,
        tenant: &str,
        connection: &str,
    ) -> Result<Self> {
        if spec.name.is_empty() {
            return Err(StoreError::configuration(
                StoreOperation::Connect,
                "no collection assigned",
            )
            .into());
        }

        let route = router.route_for(spec, tenant, connection)?;
        Ok(Self {
            router,
            spec,
            route,
            tenant: tenant.to_string(),
        })
    }

    /// A repository on the same router and connection for a different
    /// collection, keeping this repository's tenant when none is given
    pub fn sibling(&self, spec: CollectionSpec, tenant: &str) -> Result<Self> {
        let tenant = if tenant.is_empty() {
            self.tenant.as_str()
        } else {
            tenant
        };
        Self::for_spec(self.router.clone(), spec, tenant, &self.route.connection)
    }

    /// The router this repository resolves through
    pub fn router(&self) -> &Arc<ConnectionRouter> {
        &self.router
    }

    /// Resolve the typed collection handle, reporting a degraded ping as a
    /// non-fatal error alongside it
    async fn typed_collection<M: Entity>(&self) -> Result<(Collection<M>, Option<StoreError>)> {
        let routed = self.router.resolve(&self.route).await?;
        let degraded = match routed.state {
            ConnectionState::Live => None,
            ConnectionState::Degraded(err) => Some(err),
        };
        Ok((routed.database.collection(self.spec.name), degraded))
    }

    fn check_guard(
        &self,
        options: &crate::query::FindOptions,
        guard: BulkGuard,
        operation: StoreOperation,
    ) -> Result<()> {
        if guard == BulkGuard::Enforce && options.filter_is_empty() {
            return Err(StoreError::empty_filter(operation, self.spec.name).into());
        }
        Ok(())
    }

    async fn create<M: Entity>(&self, request: &mut RepoRequest<M>) -> Result<RepoResponse<M>> {
        request.model.set_created(&request.actor);

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let model = request.model.clone();
        let op = async move {
            collection.insert_one(&model).await.map_err(Error::from)?;
            Ok(())
        };
        with_deadline(request.deadline, StoreOperation::Create, op).await?;

        Ok(RepoResponse {
            total_rows: 1,
            list: vec![request.model.clone()],
            errors: Vec::from_iter(degraded),
            ..RepoResponse::empty()
        })
    }

    /// Bulk `$set` by translated filter; values are assembled by the caller
    async fn bulk_set<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        values: Document,
        guard: BulkGuard,
        operation: StoreOperation,
    ) -> Result<RepoResponse<M>> {
        self.check_guard(&request.find_options, guard, operation)?;
        let filter = build_filter(&request.find_options, operation)?;

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection
                .update_many(filter, doc! { "$set": values })
                .await
                .map_err(Error::from)
        };
        let result = with_deadline(request.deadline, operation, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(result.modified_count as i64)
        })
    }

    fn array_target<M: Entity>(
        &self,
        request: &RepoRequest<M>,
    ) -> Result<mongodb::bson::oid::ObjectId> {
        request.model.id().ok_or_else(|| {
            StoreError::configuration(
                StoreOperation::ArrayMutation,
                "model identity is required for array mutations",
            )
            .into()
        })
    }

    async fn drop_database(&self) -> Result<()> {
        let routed = self.router.resolve(&self.route).await?;
        routed.database.drop().await.map_err(Error::from)
    }
}

impl Repository for MongoRepository {
    async fn find<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        // A resolved identity turns the list lookup into a single fetch;
        // "find" never errors on empty, only "find one" does.
        if request.model.id().is_some() {
            return match self.find_one(request).await {
                Ok(mut single) => {
                    single.page_size = request.page_size;
                    single.current_page = request.current_page;
                    Ok(single)
                }
                Err(err) if err.is_not_found() => Ok(RepoResponse {
                    page_size: request.page_size,
                    current_page: request.current_page,
                    ..RepoResponse::empty()
                }),
                Err(err) => Err(err),
            };
        }

        let filter = build_filter(&request.find_options, StoreOperation::Find)?;
        let count_limit = self.router.config().count_limit;

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let page_size = request.page_size;
        let current_page = request.current_page;
        let sort = (!request.find_options.order.is_empty())
            .then(|| build_sort(&request.find_options.order));

        let op = async move {
            let mut find = collection.find(filter.clone());
            if let Some(sort) = sort {
                find = find.sort(sort);
            }
            let skipped = (page_size * (current_page - 1)).max(0);
            if page_size > 0 && skipped > 0 {
                find = find.skip(skipped as u64);
            }
            if current_page > 0 {
                find = find.limit(page_size);
            }

            let cursor = find.await?;
            let list: Vec<M> = cursor.try_collect().await?;

            let count = collection.count_documents(filter).limit(count_limit).await? as i64;

            Ok::<_, Error>((list, count))
        };
        let (list, count) = with_deadline(request.deadline, StoreOperation::Find, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_rows(list, count, request.page_size, request.current_page)
        })
    }

    async fn find_one<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        let id = request.model.id().ok_or_else(|| {
            StoreError::configuration(
                StoreOperation::FindOne,
                "model identity is required for find_one",
            )
        })?;

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection
                .find_one(doc! { "_id": id })
                .await
                .map_err(Error::from)
        };
        let found = with_deadline(request.deadline, StoreOperation::FindOne, op).await?;

        match found {
            Some(model) => Ok(RepoResponse {
                total_rows: 1,
                list: vec![model],
                errors: Vec::from_iter(degraded),
                ..RepoResponse::empty()
            }),
            None => Err(StoreError::not_found(self.spec.name, id.to_hex()).into()),
        }
    }

    async fn count<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        let filter = build_filter(&request.find_options, StoreOperation::Count)?;
        let limit = if request.page_size > 0 {
            request.page_size as u64
        } else {
            self.router.config().count_limit
        };

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection
                .count_documents(filter)
                .limit(limit)
                .await
                .map_err(Error::from)
        };
        let count = with_deadline(request.deadline, StoreOperation::Count, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(count as i64)
        })
    }

    async fn update<M: Entity>(&self, request: &mut RepoRequest<M>) -> Result<RepoResponse<M>> {
        request.model.set_updated(&request.actor);

        if request.model.is_new() {
            return self.create(request).await;
        }

        let Some(id) = request.model.id() else {
            if request.upsert {
                return self.create(request).await;
            }
            return Err(StoreError::configuration(
                StoreOperation::Update,
                "update target has no identity; set the upsert flag to create instead",
            )
            .into());
        };

        let expected_version = request.model.base().version;
        request.model.base_mut().version = expected_version + 1;

        let mut filter = doc! { "_id": id };
        if request.check_version {
            filter.insert("version", expected_version);
        }
        let document = to_document(&request.model)?;

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection
                .update_one(filter, doc! { "$set": document })
                .await
                .map_err(Error::from)
        };
        let result = with_deadline(request.deadline, StoreOperation::Update, op).await?;

        if result.matched_count == 0 {
            if request.check_version {
                return Err(StoreError::conflict(self.spec.name, id.to_hex()).into());
            }
            if request.upsert {
                tracing::debug!(
                    collection = self.spec.name,
                    id = %id,
                    "update matched nothing; falling back to create"
                );
                return self.create(request).await;
            }
            return Err(StoreError::not_found(self.spec.name, id.to_hex())
                .with_operation(StoreOperation::Update)
                .into());
        }

        Ok(RepoResponse {
            total_rows: result.modified_count as i64,
            list: vec![request.model.clone()],
            errors: Vec::from_iter(degraded),
            ..RepoResponse::empty()
        })
    }

    async fn update_many<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        values: Document,
    ) -> Result<RepoResponse<M>> {
        let mut values = values;
        values.insert("updated_by", to_bson(&request.actor.stamp())?);
        self.bulk_set(request, values, BulkGuard::Enforce, StoreOperation::UpdateMany)
            .await
    }

    async fn update_field<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: Bson,
    ) -> Result<RepoResponse<M>> {
        let mut values = Document::new();
        values.insert(field, value);
        values.insert("updated_by", to_bson(&request.actor.stamp())?);
        self.bulk_set(request, values, BulkGuard::Enforce, StoreOperation::UpdateField)
            .await
    }

    async fn create_many<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        models: Vec<M>,
    ) -> Result<RepoResponse<M>> {
        if models.is_empty() {
            return Ok(RepoResponse::empty());
        }

        let mut models = models;
        for model in &mut models {
            if model.is_new() {
                model.set_created(&request.actor);
            }
        }

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let inserts = models.clone();
        let op = async move {
            collection.insert_many(&inserts).await.map_err(Error::from)?;
            Ok(())
        };
        with_deadline(request.deadline, StoreOperation::Create, op).await?;

        Ok(RepoResponse {
            total_rows: models.len() as i64,
            list: models,
            errors: Vec::from_iter(degraded),
            ..RepoResponse::empty()
        })
    }

    async fn add_item_in_array<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: &str,
    ) -> Result<RepoResponse<M>> {
        let id = self.array_target(request)?;
        let pipeline = array_add_pipeline(self.spec.name, id, field, value);

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection.aggregate(pipeline).await.map_err(Error::from)?;
            Ok(())
        };
        with_deadline(request.deadline, StoreOperation::ArrayMutation, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(1)
        })
    }

    async fn remove_item_in_array<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: &str,
    ) -> Result<RepoResponse<M>> {
        let id = self.array_target(request)?;
        let pipeline = array_remove_pipeline(self.spec.name, id, field, value);

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection.aggregate(pipeline).await.map_err(Error::from)?;
            Ok(())
        };
        with_deadline(request.deadline, StoreOperation::ArrayMutation, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(1)
        })
    }

    async fn switch_item_in_array<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
        value: &str,
    ) -> Result<RepoResponse<M>> {
        let id = self.array_target(request)?;
        let toggle = array_toggle_pipeline(self.spec.name, id, field, value);
        let report = array_len_pipeline(id, field);

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection.aggregate(toggle).await?;

            // Second, read-only round trip for the resulting length; the
            // toggle above is atomic on its own, this count is advisory.
            let cursor = collection.aggregate(report).await?;
            let rows: Vec<Document> = cursor.try_collect().await?;
            Ok::<_, Error>(rows)
        };
        let rows = with_deadline(request.deadline, StoreOperation::ArrayMutation, op).await?;

        let count = rows
            .first()
            .map(|row| bson_int(row.get("count")))
            .unwrap_or(0);

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(count)
        })
    }

    async fn move_to<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        let target = request
            .target_collection
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                StoreError::configuration(StoreOperation::Move, "target collection is required")
            })?;

        self.check_guard(&request.find_options, BulkGuard::Enforce, StoreOperation::Move)?;
        let filter = build_filter(&request.find_options, StoreOperation::Move)?;

        // Copy-then-delete is not atomic: a failure after the merge leaves
        // the moved documents duplicated in the target collection.
        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection
                .aggregate(vec![
                    doc! { "$match": filter.clone() },
                    doc! { "$merge": target },
                ])
                .await?;

            let result = collection.delete_many(filter).await?;
            Ok::<_, Error>(result.deleted_count as i64)
        };
        let deleted = with_deadline(request.deadline, StoreOperation::Move, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(deleted)
        })
    }

    async fn delete<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        if let Some(id) = request.model.id() {
            let (collection, degraded) = self.typed_collection::<M>().await?;
            let op = async move {
                collection
                    .delete_one(doc! { "_id": id })
                    .await
                    .map_err(Error::from)
            };
            with_deadline(request.deadline, StoreOperation::Delete, op).await?;
            return Ok(RepoResponse {
                errors: Vec::from_iter(degraded),
                ..RepoResponse::with_total(1)
            });
        }

        self.check_guard(
            &request.find_options,
            BulkGuard::Enforce,
            StoreOperation::Delete,
        )?;
        let filter = build_filter(&request.find_options, StoreOperation::Delete)?;

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            collection.delete_many(filter).await.map_err(Error::from)
        };
        let result = with_deadline(request.deadline, StoreOperation::Delete, op).await?;

        Ok(RepoResponse {
            errors: Vec::from_iter(degraded),
            ..RepoResponse::with_total(result.deleted_count as i64)
        })
    }

    async fn delete_soft<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        let values = doc! { "deleted_by": to_bson(&request.actor.stamp())? };
        self.bulk_set(
            request,
            values,
            BulkGuard::Permissive,
            StoreOperation::DeleteSoft,
        )
        .await
    }

    async fn remove_field<M: Entity>(
        &self,
        request: &RepoRequest<M>,
        field: &str,
    ) -> Result<RepoResponse<M>> {
        let mut values = Document::new();
        values.insert(field, Bson::Null);
        values.insert("updated_by", to_bson(&request.actor.stamp())?);
        self.bulk_set(
            request,
            values,
            BulkGuard::Permissive,
            StoreOperation::RemoveField,
        )
        .await
    }

    async fn aggregate<M: Entity>(&self, request: &RepoRequest<M>) -> Result<RepoResponse<M>> {
        let pipeline = request.find_options.pipeline.clone().ok_or_else(|| {
            StoreError::configuration(StoreOperation::Aggregate, "pipeline is required")
        })?;

        let (collection, degraded) = self.typed_collection::<M>().await?;
        let op = async move {
            let cursor = collection
                .aggregate(pipeline.clone())
                .with_type::<M>()
                .await?;
            let list: Vec<M> = cursor.try_collect().await?;

            // Same pipeline again with a $count stage for the total; the
            // two round trips agree only if the data held still in between.
            let mut count_pipeline = pipeline;
            count_pipeline.push(doc! { "$count": "total" });
            let cursor = collection.aggregate(count_pipeline).await?;
            let counts: Vec<Document> = cursor.try_collect().await?;

            Ok::<_, Error>((list, counts))
        };
        let (list, counts) = with_deadline(request.deadline, StoreOperation::Aggregate, op).await?;

        let total = counts
            .first()
            .map(|row| bson_int(row.get("total")))
            .unwrap_or(0);

        Ok(RepoResponse {
            total_rows: total,
            total_pages: total_pages(total, request.page_size),
            page_size: request.page_size,
            current_page: request.current_page,
            list,
            errors: Vec::from_iter(degraded),
        })
    }

    fn repo_type(&self) -> RepoType {
        RepoType::MongoDb
    }

    fn tenant(&self) -> &str {
        &self.tenant
    }

    fn database(&self) -> &str {
        &self.route.database
    }

    fn connection(&self) -> &str {
        &self.route.connection
    }

    fn collection_name(&self) -> &str {
        self.spec.name
    }

    fn set_tenant(&mut self, tenant: &str) -> Result<()> {
        if tenant.is_empty() {
            return Err(StoreError::configuration(
                StoreOperation::Connect,
                "tenant can not be empty",
            )
            .into());
        }
        self.route = self
            .router
            .route_for(self.spec, tenant, &self.route.connection)?;
        self.tenant = tenant.to_string();
        Ok(())
    }

    async fn repo_backup(&self, backup_id: &str) -> Result<()> {
        let out = format!("backup/{}/{}", self.route.database, backup_id);
        let status = tokio::process::Command::new("mongodump")
            .args(["--db", &self.route.database, "--out", &out])
            .status()
            .await?;
        if !status.success() {
            return Err(StoreError::driver(
                StoreOperation::Backup,
                format!("mongodump exited with {status}"),
            )
            .into());
        }
        Ok(())
    }

    async fn repo_restore(&self, backup_id: &str) -> Result<()> {
        self.drop_database().await?;

        let source = format!(
            "backup/{}/{}/{}",
            self.route.database, backup_id, self.route.database
        );
        let status = tokio::process::Command::new("mongorestore")
            .args(["--db", &self.route.database, &source])
            .status()
            .await?;
        if !status.success() {
            return Err(StoreError::driver(
                StoreOperation::Restore,
                format!("mongorestore exited with {status}"),
            )
            .into());
        }
        Ok(())
    }
}

fn bson_int(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        _ => 0,
    }
}

async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    operation: StoreOperation,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::Store(StoreError::timeout(
                operation,
                format!("operation exceeded {limit:?}"),
            ))
        })?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::config::StoreConfig;
    use crate::entity::{Actor, DocumentBase};
    use crate::error::StoreErrorKind;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Order {
        #[serde(flatten)]
        base: DocumentBase,
        reference: String,
    }

    impl Entity for Order {
        const COLLECTION: CollectionSpec = CollectionSpec::tenant("orders");

        fn base(&self) -> &DocumentBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut DocumentBase {
            &mut self.base
        }
    }

    fn repo() -> MongoRepository {
        let router = Arc::new(ConnectionRouter::new(StoreConfig::default()));
        MongoRepository::for_entity::<Order>(router, "tenant-a", "").expect("repo")
    }

    fn request() -> RepoRequest<Order> {
        RepoRequest::new(Order::default(), Actor::new("ada"))
    }

    #[test]
    fn test_for_entity_routes_to_tenant_database() {
        let repo = repo();
        assert_eq!(repo.database(), "tenant-a");
        assert_eq!(repo.tenant(), "tenant-a");
        assert_eq!(repo.collection_name(), "orders");
        assert_eq!(repo.repo_type(), RepoType::MongoDb);
    }

    #[test]
    fn test_empty_collection_name_is_rejected() {
        let router = Arc::new(ConnectionRouter::new(StoreConfig::default()));
        let err = MongoRepository::for_spec(router, CollectionSpec::tenant(""), "tenant-a", "")
            .expect_err("empty collection");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[test]
    fn test_set_tenant_repoints_the_database() {
        let mut repo = repo();
        repo.set_tenant("tenant-b").expect("set tenant");
        assert_eq!(repo.database(), "tenant-b");
        assert_eq!(repo.tenant(), "tenant-b");

        let err = repo.set_tenant("").expect_err("empty tenant");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[test]
    fn test_sibling_keeps_tenant_when_none_given() {
        let repo = repo();
        let sibling = repo
            .sibling(CollectionSpec::tenant("invoices"), "")
            .expect("sibling");
        assert_eq!(sibling.database(), "tenant-a");
        assert_eq!(sibling.collection_name(), "invoices");

        let other = repo
            .sibling(CollectionSpec::tenant("invoices"), "tenant-b")
            .expect("sibling");
        assert_eq!(other.database(), "tenant-b");
    }

    #[test]
    fn test_guard_policy() {
        let repo = repo();
        let empty = crate::query::FindOptions::new();
        assert!(repo
            .check_guard(&empty, BulkGuard::Permissive, StoreOperation::DeleteSoft)
            .is_ok());
        assert!(repo
            .check_guard(&empty, BulkGuard::Enforce, StoreOperation::Delete)
            .is_err());

        let mut filtered = crate::query::FindOptions::new();
        filtered.add_equals("status", "done");
        assert!(repo
            .check_guard(&filtered, BulkGuard::Enforce, StoreOperation::Delete)
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_many_refuses_empty_filter() {
        let err = repo()
            .update_many(&request(), doc! { "status": "done" })
            .await
            .expect_err("guard");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::EmptyFilter));
    }

    #[tokio::test]
    async fn test_update_field_refuses_empty_filter() {
        let err = repo()
            .update_field(&request(), "status", Bson::from("done"))
            .await
            .expect_err("guard");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::EmptyFilter));
    }

    #[tokio::test]
    async fn test_bulk_delete_refuses_empty_filter() {
        let err = repo().delete(&request()).await.expect_err("guard");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::EmptyFilter));
    }

    #[tokio::test]
    async fn test_move_requires_target_collection() {
        let mut req = request();
        req.find_options.add_equals("status", "archived");
        let err = repo().move_to(&req).await.expect_err("no target");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_move_refuses_empty_filter() {
        let mut req = request();
        req.target_collection = Some("orders_archive".to_string());
        let err = repo().move_to(&req).await.expect_err("guard");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::EmptyFilter));
    }

    #[tokio::test]
    async fn test_find_one_requires_identity() {
        let err = repo().find_one(&request()).await.expect_err("no id");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_array_mutations_require_identity() {
        let err = repo()
            .add_item_in_array(&request(), "labels", "draft")
            .await
            .expect_err("no id");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));

        let err = repo()
            .switch_item_in_array(&request(), "labels", "draft")
            .await
            .expect_err("no id");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_aggregate_requires_pipeline() {
        let err = repo().aggregate(&request()).await.expect_err("no pipeline");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_update_without_identity_and_without_upsert_is_an_error() {
        let mut req = request();
        // stamped but id-less: not new, yet nothing to address the update at
        req.model.base_mut().created_by = Some(Actor::new("ada").stamp());
        let err = repo().update(&mut req).await.expect_err("no identity");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_or_groups_surface_translation_error() {
        let mut req = request();
        req.find_options.add_or_group(vec![crate::query::Filter::new(
            "status",
            crate::query::FilterOperator::Equals,
            "active",
        )]);
        let err = repo().delete(&req).await.expect_err("or-groups");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Unsupported));
    }

    #[tokio::test]
    async fn test_deadline_expiry_maps_to_timeout() {
        let result = with_deadline(
            Some(Duration::from_millis(5)),
            StoreOperation::Find,
            std::future::pending::<Result<()>>(),
        )
        .await;
        let err = result.expect_err("deadline");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Timeout));
    }

    #[test]
    fn test_bson_int_widening() {
        assert_eq!(bson_int(Some(&Bson::Int32(7))), 7);
        assert_eq!(bson_int(Some(&Bson::Int64(9))), 9);
        assert_eq!(bson_int(Some(&Bson::from("x"))), 0);
        assert_eq!(bson_int(None), 0);
    }
}
