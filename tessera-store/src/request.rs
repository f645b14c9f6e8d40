//! Generic CRUD orchestration
//!
//! A [`Request`] wraps an entity plus the acting user into a unit of work:
//! it resolves a repository for the entity's collection and tenant, builds
//! the effective filter set (base fields, id sets, labels, date window,
//! then the entity's own [`augment_find_options`] hook), and exposes the
//! CRUD verbs. Entities get `find`/`update`/`delete`/... without writing
//! any query code of their own.
//!
//! [`augment_find_options`]: crate::entity::Entity::augment_find_options

use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};

use crate::entity::{Actor, DateRange, Entity};
use crate::error::{Result, StoreError, StoreOperation};
use crate::query::{FindOptions, Orders};
use crate::repository::{MongoRepository, RepoRequest, Repository};
use crate::response::Response;
use crate::router::ConnectionRouter;

/// A unit of work: one entity, one actor, one resolved repository
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tessera_store::config::StoreConfig;
/// use tessera_store::entity::Actor;
/// use tessera_store::request::Request;
/// use tessera_store::router::ConnectionRouter;
/// # use serde::{Deserialize, Serialize};
/// # use tessera_store::entity::{CollectionSpec, DocumentBase, Entity};
/// # #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// # struct Order {
/// #     #[serde(flatten)]
/// #     base: DocumentBase,
/// #     status: String,
/// # }
/// # impl Entity for Order {
/// #     const COLLECTION: CollectionSpec = CollectionSpec::tenant("orders");
/// #     fn base(&self) -> &DocumentBase { &self.base }
/// #     fn base_mut(&mut self) -> &mut DocumentBase { &mut self.base }
/// # }
///
/// # async fn run() -> Result<(), tessera_store::error::Error> {
/// let router = Arc::new(ConnectionRouter::new(StoreConfig::load()?));
/// let mut order = Order::default();
/// order.set_tenant_id("tenant-a");
///
/// let mut request = Request::new(order, &router, Actor::new("ada"))?;
/// request.paginate(20, 1);
/// let response = request.find().await?;
/// println!("{} orders", response.total_rows);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Request<M: Entity> {
    /// Target entity; known fields drive the lookup
    pub model: M,
    repo: MongoRepository,
    /// Who is acting
    pub actor: Actor,
    /// Rows per page; 0 disables pagination
    pub page_size: i64,
    /// 1-based page number
    pub current_page: i64,
    /// Sort keys applied to list lookups
    pub order: Orders,
    /// Restrict lookups to these ids (or to `query_field` values)
    pub ids: Vec<ObjectId>,
    /// Exclude these ids from lookups
    pub excluded_ids: Vec<ObjectId>,
    /// Field the id set filters on instead of `_id`
    pub query_field: Option<String>,
    /// Include soft-deleted records in lookups
    pub include_deleted: bool,
    /// Filter on presence (`Some(true)`) or absence (`Some(false)`) of an
    /// external-system id, instead of its value
    pub external_id_presence: Option<bool>,
    /// Time window applied to `date_range_field`
    pub date_range: Option<DateRange>,
    /// Field the date window filters on
    pub date_range_field: Option<String>,
    /// Allow update to create when the target is missing
    pub upsert: bool,
    /// Pin the expected version on update and report conflicts
    pub check_version: bool,
    /// Per-operation deadline
    pub deadline: Option<Duration>,
    find_options: Option<FindOptions>,
}

impl<M: Entity> Request<M> {
    /// Create a request, resolving a repository from the entity's
    /// collection descriptor and tenant id
    ///
    /// Fails fast on an unidentified actor or, for tenant collections, a
    /// missing tenant id.
    pub fn new(model: M, router: &Arc<ConnectionRouter>, actor: Actor) -> Result<Self> {
        let repo =
            MongoRepository::for_entity::<M>(router.clone(), model.tenant_id(), &actor.connection)?;
        Self::with_repo(model, repo, actor)
    }

    /// Create a request on an already-resolved repository
    pub fn with_repo(model: M, repo: MongoRepository, actor: Actor) -> Result<Self> {
        if !actor.is_identified() {
            return Err(StoreError::configuration(
                StoreOperation::Connect,
                "an identified actor is required",
            )
            .into());
        }

        Ok(Self {
            model,
            repo,
            actor,
            page_size: 0,
            current_page: 0,
            order: Orders::new(),
            ids: Vec::new(),
            excluded_ids: Vec::new(),
            query_field: None,
            include_deleted: false,
            external_id_presence: None,
            date_range: None,
            date_range_field: None,
            upsert: false,
            check_version: false,
            deadline: None,
            find_options: None,
        })
    }

    /// The repository this request resolves through
    pub fn repo(&self) -> &MongoRepository {
        &self.repo
    }

    /// Set pagination: rows per page and 1-based page number
    pub fn paginate(&mut self, page_size: i64, current_page: i64) {
        self.page_size = page_size;
        self.current_page = current_page;
    }

    /// Add ascending sort keys
    pub fn add_order_asc<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order
            .add(fields.into_iter().map(crate::query::Order::asc));
    }

    /// Add descending sort keys
    pub fn add_order_desc<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order
            .add(fields.into_iter().map(crate::query::Order::desc));
    }

    /// Replace the computed filter set with an explicit one
    ///
    /// When set, base filters and the entity augmentation hook are skipped.
    pub fn set_find_options(&mut self, options: FindOptions) {
        self.find_options = Some(options);
    }

    /// The filter set a list lookup would run with
    ///
    /// Either the explicit override, or base filters derived from the
    /// entity's known fields plus its augmentation hook.
    pub fn effective_find_options(&mut self) -> FindOptions {
        self.ensure_tenant();
        if let Some(ref options) = self.find_options {
            return options.clone();
        }
        let mut options = self.base_find_options();
        self.model.augment_find_options(&mut options);
        options
    }

    /// List entities matching the effective filters
    ///
    /// Zero rows is a valid, non-error outcome.
    pub async fn find(&mut self) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let repo_request = self.repo_request(options);
        Ok(self.repo.find(&repo_request).await?.into())
    }

    /// Fetch exactly one entity
    ///
    /// With a resolved identity this is a by-id lookup. Without one it runs
    /// [`find`](Self::find) and asserts exactly one row: zero rows and more
    /// than one row are both errors. The decoded row replaces `self.model`.
    pub async fn find_one(&mut self) -> Result<Response<M>> {
        if self.model.id().is_some() {
            let options = self.effective_find_options();
            let repo_request = self.repo_request(options);
            let response = self.repo.find_one(&repo_request).await?;
            if let Some(decoded) = response.list.first() {
                self.model = decoded.clone();
            }
            return Ok(response.into());
        }

        let response = self.find().await?;
        match response.list.len() {
            1 => {
                self.model = response.list[0].clone();
                Ok(response)
            }
            0 => Err(StoreError::not_found(M::COLLECTION.name, "filter").into()),
            rows => Err(StoreError::cardinality(M::COLLECTION.name, rows).into()),
        }
    }

    /// Count entities matching the effective filters
    pub async fn count(&mut self) -> Result<Response<M>> {
        let mut options = self.effective_find_options();
        options.order = Orders::new();
        let mut repo_request = self.repo_request(options);
        repo_request.page_size = 0;
        Ok(self.repo.count(&repo_request).await?.into())
    }

    /// Persist the entity: create when new, update by identity otherwise
    ///
    /// Stamps and generated identity land back on `self.model`.
    pub async fn update(&mut self) -> Result<Response<M>> {
        self.ensure_tenant();
        let mut repo_request = self.repo_request(FindOptions::new());
        let response = self.repo.update(&mut repo_request).await?;
        self.model = repo_request.model;
        Ok(response.into())
    }

    /// Bulk partial update of matching entities
    pub async fn update_many(&mut self, values: Document) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let repo_request = self.repo_request(options);
        Ok(self.repo.update_many(&repo_request, values).await?.into())
    }

    /// Bulk single-field update of matching entities
    pub async fn update_field(
        &mut self,
        field: &str,
        value: impl Into<Bson>,
    ) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let repo_request = self.repo_request(options);
        Ok(self
            .repo
            .update_field(&repo_request, field, value.into())
            .await?
            .into())
    }

    /// Insert many entities at once
    pub async fn create_many(&mut self, models: Vec<M>) -> Result<Response<M>> {
        self.ensure_tenant();
        let repo_request = self.repo_request(FindOptions::new());
        Ok(self.repo.create_many(&repo_request, models).await?.into())
    }

    /// Delete by identity, or bulk delete by the effective filters
    pub async fn delete(&mut self) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let repo_request = self.repo_request(options);
        Ok(self.repo.delete(&repo_request).await?.into())
    }

    /// Soft-delete matching entities by stamping them
    pub async fn delete_soft(&mut self) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let repo_request = self.repo_request(options);
        Ok(self.repo.delete_soft(&repo_request).await?.into())
    }

    /// Null a field across matching entities
    pub async fn remove_field(&mut self, field: &str) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let repo_request = self.repo_request(options);
        Ok(self.repo.remove_field(&repo_request, field).await?.into())
    }

    /// Atomically add a value to an array field of this entity
    pub async fn add_item_in_array(&mut self, field: &str, value: &str) -> Result<Response<M>> {
        let repo_request = self.repo_request(FindOptions::new());
        Ok(self
            .repo
            .add_item_in_array(&repo_request, field, value)
            .await?
            .into())
    }

    /// Atomically remove a value from an array field of this entity
    pub async fn remove_item_in_array(&mut self, field: &str, value: &str) -> Result<Response<M>> {
        let repo_request = self.repo_request(FindOptions::new());
        Ok(self
            .repo
            .remove_item_in_array(&repo_request, field, value)
            .await?
            .into())
    }

    /// Atomically toggle a value in an array field of this entity; the
    /// response total reports the resulting array length
    pub async fn switch_item_in_array(&mut self, field: &str, value: &str) -> Result<Response<M>> {
        let repo_request = self.repo_request(FindOptions::new());
        Ok(self
            .repo
            .switch_item_in_array(&repo_request, field, value)
            .await?
            .into())
    }

    /// Copy matching entities into `target` and delete the originals
    pub async fn move_to(&mut self, target: &str) -> Result<Response<M>> {
        let options = self.effective_find_options();
        let mut repo_request = self.repo_request(options);
        repo_request.target_collection = Some(target.to_string());
        Ok(self.repo.move_to(&repo_request).await?.into())
    }

    /// Run a caller-supplied aggregation pipeline
    pub async fn aggregate(&mut self, pipeline: Vec<Document>) -> Result<Response<M>> {
        let mut options = FindOptions::new();
        options.pipeline = Some(pipeline);
        let repo_request = self.repo_request(options);
        Ok(self.repo.aggregate(&repo_request).await?.into())
    }

    /// A request for a related entity type under the same context
    ///
    /// Copies pagination, ordering, id filters, date window, flags and
    /// tenant context; the repository is re-resolved for the new entity's
    /// collection.
    pub fn clone_for<N: Entity>(&self, model: N) -> Result<Request<N>> {
        let repo = self.repo.sibling(N::COLLECTION, model.tenant_id())?;
        Ok(Request {
            model,
            repo,
            actor: self.actor.clone(),
            page_size: self.page_size,
            current_page: self.current_page,
            order: self.order.clone(),
            ids: self.ids.clone(),
            excluded_ids: self.excluded_ids.clone(),
            query_field: self.query_field.clone(),
            include_deleted: self.include_deleted,
            external_id_presence: self.external_id_presence,
            date_range: self.date_range,
            date_range_field: self.date_range_field.clone(),
            upsert: self.upsert,
            check_version: self.check_version,
            deadline: self.deadline,
            find_options: None,
        })
    }

    /// A request that persists this entity into another tenant's database
    ///
    /// The cloned model keeps its identity but loses its audit stamps, so
    /// the next update creates it fresh in the target tenant.
    pub fn clone_to_tenant(&self, tenant: &str) -> Result<Request<M>> {
        let mut request = self.clone_for(self.model.clone())?;
        request.model.become_new_keep_id();
        request.model.set_tenant_id(tenant);
        request.repo.set_tenant(tenant)?;
        Ok(request)
    }

    fn ensure_tenant(&mut self) {
        if self.model.tenant_id().is_empty() && !self.repo.tenant().is_empty() {
            let tenant = self.repo.tenant().to_string();
            self.model.set_tenant_id(tenant);
        }
    }

    fn base_find_options(&self) -> FindOptions {
        let mut options = FindOptions::new();
        options.order = self.order.clone();

        let base = self.model.base();

        if let Some(id) = base.id {
            options.add_equals("_id", id);
        }

        if !base.tenant_id.is_empty() {
            options.add_equals("repo_id", base.tenant_id.clone());
        }

        match self.external_id_presence {
            Some(true) => options.add_exists("external_id"),
            Some(false) => options.add_not_exists("external_id"),
            None => {
                if let Some(ref external_id) = base.external_id {
                    if !external_id.is_empty() {
                        options.add_equals("external_id", external_id.clone());
                    }
                }
            }
        }

        if !self.excluded_ids.is_empty() {
            options.add_not_in("_id", self.excluded_ids.clone());
        }

        if !self.ids.is_empty() && base.id.is_none() {
            let field = self.query_field.as_deref().unwrap_or("_id");
            options.add_in(field, self.ids.clone());
        }

        if !base.labels.is_empty() {
            options.add_in("labels", base.labels.clone());
        }

        if !base.labels_none.is_empty() {
            options.add_not_in("labels", base.labels_none.clone());
        }

        if let (Some(range), Some(field)) = (self.date_range, self.date_range_field.as_deref()) {
            range.apply(&mut options, field);
        }

        if !self.include_deleted {
            options.add_not_exists("deleted_by");
        }

        options
    }

    fn repo_request(&self, options: FindOptions) -> RepoRequest<M> {
        RepoRequest {
            model: self.model.clone(),
            actor: self.actor.clone(),
            page_size: self.page_size,
            current_page: self.current_page,
            find_options: options,
            target_collection: None,
            upsert: self.upsert,
            check_version: self.check_version,
            deadline: self.deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::config::StoreConfig;
    use crate::entity::{CollectionSpec, DocumentBase};
    use crate::error::StoreErrorKind;
    use crate::query::FilterOperator;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Order {
        #[serde(flatten)]
        base: DocumentBase,
        status: String,
    }

    impl Entity for Order {
        const COLLECTION: CollectionSpec = CollectionSpec::tenant("orders");

        fn base(&self) -> &DocumentBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut DocumentBase {
            &mut self.base
        }

        fn augment_find_options(&self, options: &mut FindOptions) {
            if !self.status.is_empty() {
                options.add_equals("status", self.status.clone());
            }
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Invoice {
        #[serde(flatten)]
        base: DocumentBase,
    }

    impl Entity for Invoice {
        const COLLECTION: CollectionSpec = CollectionSpec::tenant("invoices");

        fn base(&self) -> &DocumentBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut DocumentBase {
            &mut self.base
        }
    }

    fn router() -> Arc<ConnectionRouter> {
        Arc::new(ConnectionRouter::new(StoreConfig::default()))
    }

    fn order_for(tenant: &str) -> Order {
        let mut order = Order::default();
        order.set_tenant_id(tenant);
        order
    }

    fn request() -> Request<Order> {
        Request::new(order_for("tenant-a"), &router(), Actor::new("ada")).expect("request")
    }

    #[test]
    fn test_new_requires_identified_actor() {
        let err = Request::new(order_for("tenant-a"), &router(), Actor::default())
            .expect_err("unidentified actor");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[test]
    fn test_new_requires_tenant_for_tenant_collections() {
        let err = Request::new(Order::default(), &router(), Actor::new("ada"))
            .expect_err("missing tenant");
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Configuration));
    }

    #[test]
    fn test_base_options_carry_tenant_and_order() {
        let mut request = request();
        request.add_order_desc(["created_by.time"]);

        let options = request.effective_find_options();
        assert!(!options.order.is_empty());
        let tenant = options
            .filters
            .iter()
            .find(|f| f.key == "repo_id")
            .expect("tenant filter");
        assert_eq!(tenant.value, Bson::from("tenant-a"));
    }

    #[test]
    fn test_soft_deleted_records_are_hidden_by_default() {
        let mut request = request();
        let options = request.effective_find_options();
        let deleted = options
            .filters
            .iter()
            .find(|f| f.key == "deleted_by")
            .expect("deleted filter");
        assert_eq!(deleted.operator, FilterOperator::NotExists);

        request.include_deleted = true;
        let options = request.effective_find_options();
        assert!(!options.filters.iter().any(|f| f.key == "deleted_by"));
    }

    #[test]
    fn test_id_set_honors_query_field() {
        let mut request = request();
        request.ids = vec![ObjectId::new()];
        request.query_field = Some("parent_id".to_string());

        let options = request.effective_find_options();
        let id_filter = options
            .filters
            .iter()
            .find(|f| f.key == "parent_id")
            .expect("id-set filter");
        assert_eq!(id_filter.operator, FilterOperator::In);
    }

    #[test]
    fn test_excluded_ids_become_not_in() {
        let mut request = request();
        request.excluded_ids = vec![ObjectId::new(), ObjectId::new()];

        let options = request.effective_find_options();
        let excluded = options
            .filters
            .iter()
            .find(|f| f.key == "_id" && f.operator == FilterOperator::NotIn)
            .expect("excluded filter");
        match &excluded.value {
            Bson::Array(values) => assert_eq!(values.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_label_sets_filter_any_of_and_none_of() {
        let mut request = request();
        request.model.label_from_strings(["draft"]);
        request.model.base_mut().labels_none = vec!["hidden".to_string()];

        let options = request.effective_find_options();
        assert!(options
            .filters
            .iter()
            .any(|f| f.key == "labels" && f.operator == FilterOperator::In));
        assert!(options
            .filters
            .iter()
            .any(|f| f.key == "labels" && f.operator == FilterOperator::NotIn));
    }

    #[test]
    fn test_external_id_presence_replaces_value_filter() {
        let mut request = request();
        request.model.base_mut().external_id = Some("ext-1".to_string());
        request.external_id_presence = Some(false);

        let options = request.effective_find_options();
        let external = options
            .filters
            .iter()
            .find(|f| f.key == "external_id")
            .expect("external filter");
        assert_eq!(external.operator, FilterOperator::NotExists);
    }

    #[test]
    fn test_augment_hook_contributes_entity_filters() {
        let mut order = order_for("tenant-a");
        order.status = "open".to_string();
        let mut request = Request::new(order, &router(), Actor::new("ada")).expect("request");

        let options = request.effective_find_options();
        assert!(options.filters.iter().any(|f| f.key == "status"));
    }

    #[test]
    fn test_explicit_find_options_override_skips_base_filters() {
        let mut request = request();
        let mut explicit = FindOptions::new();
        explicit.add_equals("status", "open");
        request.set_find_options(explicit);

        let options = request.effective_find_options();
        assert_eq!(options.filters.len(), 1);
        assert_eq!(options.filters[0].key, "status");
    }

    #[test]
    fn test_tenant_autofill_from_repository() {
        let repo = MongoRepository::for_entity::<Order>(router(), "tenant-a", "").expect("repo");
        let mut request =
            Request::with_repo(Order::default(), repo, Actor::new("ada")).expect("request");
        assert!(request.model.tenant_id().is_empty());

        request.effective_find_options();
        assert_eq!(request.model.tenant_id(), "tenant-a");
    }

    #[test]
    fn test_clone_for_copies_context_and_repoints_collection() {
        let mut request = request();
        request.paginate(25, 3);
        request.add_order_asc(["name"]);
        request.ids = vec![ObjectId::new()];
        request.include_deleted = true;

        let clone = request.clone_for(Invoice::default()).expect("clone");
        assert_eq!(clone.page_size, 25);
        assert_eq!(clone.current_page, 3);
        assert_eq!(clone.order.len(), 1);
        assert_eq!(clone.ids.len(), 1);
        assert!(clone.include_deleted);
        assert_eq!(clone.repo().collection_name(), "invoices");
        // same tenant database as the source request
        assert_eq!(clone.repo().database(), "tenant-a");
    }

    #[test]
    fn test_clone_to_tenant_strips_stamps_and_repoints_database() {
        let mut request = request();
        request.model.set_created(&Actor::new("ada"));
        let id = request.model.id();

        let clone = request.clone_to_tenant("tenant-b").expect("clone");
        assert_eq!(clone.model.id(), id);
        assert!(clone.model.is_new());
        assert_eq!(clone.model.tenant_id(), "tenant-b");
        assert_eq!(clone.repo().database(), "tenant-b");
        // the source request is untouched
        assert!(!request.model.is_new());
        assert_eq!(request.repo().database(), "tenant-a");
    }
}
