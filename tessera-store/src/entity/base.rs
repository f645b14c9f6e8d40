//! The entity contract every persistable type implements
//!
//! An entity embeds a [`DocumentBase`] (via `#[serde(flatten)]`) and
//! implements [`Entity`] by exposing it plus a collection descriptor.
//! Everything else (lifecycle, audit stamps, labels, tenant routing) is
//! provided.
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tessera_store::entity::{CollectionSpec, DocumentBase, Entity};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Task {
//!     #[serde(flatten)]
//!     base: DocumentBase,
//!     title: String,
//! }
//!
//! impl Entity for Task {
//!     const COLLECTION: CollectionSpec = CollectionSpec::tenant("tasks");
//!
//!     fn base(&self) -> &DocumentBase {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut DocumentBase {
//!         &mut self.base
//!     }
//! }
//!
//! let task = Task::default();
//! assert!(task.is_new());
//! ```

use mongodb::bson::oid::ObjectId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entity::actor::{Actor, ActorStamp};
use crate::query::FindOptions;

/// Collection descriptor: name plus global/tenant flag
///
/// A global collection is shared across all tenants (users, audit traces);
/// a tenant collection lives in the tenant's own database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name
    pub name: &'static str,
    /// Shared across tenants when true
    pub global: bool,
}

impl CollectionSpec {
    /// A tenant-partitioned collection
    pub const fn tenant(name: &'static str) -> Self {
        Self {
            name,
            global: false,
        }
    }

    /// A collection shared across all tenants
    pub const fn global(name: &'static str) -> Self {
        Self { name, global: true }
    }
}

/// Base document fields carried by every entity
///
/// Embedded into entity structs with `#[serde(flatten)]`, so the fields land
/// directly on the stored document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentBase {
    /// Store identity
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Set once at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ActorStamp>,

    /// Refreshed on every update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<ActorStamp>,

    /// Present iff the record is soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<ActorStamp>,

    /// Last read access, when tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<ActorStamp>,

    /// Tenant/database discriminator
    #[serde(rename = "repo_id", default, skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,

    /// Identity of this record in an external system, when synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// When the record was last synced with the external system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_at: Option<mongodb::bson::DateTime>,

    /// Tag-like classification strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Monotonically incremented on every update
    #[serde(default)]
    pub version: i64,

    /// Transient modification marker, never persisted
    #[serde(skip)]
    pub touched: bool,

    /// Transient "none of" label exclusion set, used only for query building
    #[serde(skip)]
    pub labels_none: Vec<String>,
}

impl DocumentBase {
    /// Add labels, skipping empties and duplicates
    pub fn label<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            let label = label.into();
            if label.is_empty() || self.has_label(&label) {
                continue;
            }
            self.labels.push(label);
        }
    }

    /// Whether the label is present
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|item| item == label)
    }

    /// Remove labels, ignoring absent ones
    pub fn unlabel<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            let label = label.into();
            self.labels.retain(|item| item != &label);
        }
    }
}

/// The contract every persistable entity implements
///
/// Required: access to the embedded [`DocumentBase`] and a collection
/// descriptor. Everything else has a provided implementation.
pub trait Entity:
    Clone + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    /// Collection this entity persists into
    const COLLECTION: CollectionSpec;

    /// The embedded base document
    fn base(&self) -> &DocumentBase;

    /// Mutable access to the embedded base document
    fn base_mut(&mut self) -> &mut DocumentBase;

    /// Entity-specific filter augmentation hook
    ///
    /// Called by the orchestration layer after the base filters are built;
    /// add filters for any entity field that should participate in lookups.
    fn augment_find_options(&self, _options: &mut FindOptions) {}

    /// Store identity, when resolved
    fn id(&self) -> Option<ObjectId> {
        self.base().id
    }

    /// Identity as a hex string, empty when unresolved
    fn id_hex(&self) -> String {
        self.base().id.map(|id| id.to_hex()).unwrap_or_default()
    }

    /// Assign the store identity
    fn set_id(&mut self, id: ObjectId) {
        self.base_mut().id = Some(id);
    }

    /// A record is new until its creation stamp is set
    fn is_new(&self) -> bool {
        self.base().created_by.is_none()
    }

    /// Whether the record carries a deletion stamp
    fn is_deleted(&self) -> bool {
        self.base().deleted_by.is_some()
    }

    /// Clear identity and all audit stamps, so the record persists as brand
    /// new on the next update
    fn become_new(&mut self) {
        let base = self.base_mut();
        base.id = None;
        base.created_by = None;
        base.updated_by = None;
        base.deleted_by = None;
    }

    /// Clear audit stamps but keep the identity
    ///
    /// Used when cloning a record into a different tenant namespace: the
    /// copy keeps the same id in the target database.
    fn become_new_keep_id(&mut self) {
        let base = self.base_mut();
        base.created_by = None;
        base.updated_by = None;
        base.deleted_by = None;
    }

    /// Stamp creation, generating an identity when absent
    fn set_created(&mut self, actor: &Actor) {
        let stamp = actor.stamp();
        let base = self.base_mut();
        if base.id.is_none() {
            base.id = Some(ObjectId::new());
        }
        base.created_by = Some(stamp);
    }

    /// Stamp the latest update
    fn set_updated(&mut self, actor: &Actor) {
        let stamp = actor.stamp();
        self.base_mut().updated_by = Some(stamp);
    }

    /// Stamp soft deletion
    fn set_deleted(&mut self, actor: &Actor) {
        let stamp = actor.stamp();
        self.base_mut().deleted_by = Some(stamp);
    }

    /// Clear the deletion stamp
    fn set_recovered(&mut self) {
        self.base_mut().deleted_by = None;
    }

    /// Tenant id carried by this record
    fn tenant_id(&self) -> &str {
        &self.base().tenant_id
    }

    /// Assign the tenant id
    fn set_tenant_id(&mut self, tenant: impl Into<String>) {
        self.base_mut().tenant_id = tenant.into();
    }

    /// Add labels from strings, idempotently
    fn label_from_strings<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_mut().label(labels);
    }

    /// Record the external-system identity and mark the sync instant
    fn prepare_for_sync(&mut self, external_id: impl Into<String>) {
        let base = self.base_mut();
        base.external_id = Some(external_id.into());
        base.sync_at = Some(mongodb::bson::DateTime::now());
    }

    /// When this record was last synced with the external system
    fn last_sync(&self) -> Option<mongodb::bson::DateTime> {
        self.base().sync_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Task {
        #[serde(flatten)]
        base: DocumentBase,
        title: String,
    }

    impl Entity for Task {
        const COLLECTION: CollectionSpec = CollectionSpec::tenant("tasks");

        fn base(&self) -> &DocumentBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut DocumentBase {
            &mut self.base
        }
    }

    fn actor() -> Actor {
        Actor::new("ada")
    }

    #[test]
    fn test_new_until_created() {
        let mut task = Task::default();
        assert!(task.is_new());
        assert!(task.id().is_none());

        task.set_created(&actor());
        assert!(!task.is_new());
        assert!(task.id().is_some());
    }

    #[test]
    fn test_set_created_keeps_existing_id() {
        let id = ObjectId::new();
        let mut task = Task::default();
        task.set_id(id);
        task.set_created(&actor());
        assert_eq!(task.id(), Some(id));
    }

    #[test]
    fn test_become_new_clears_identity_and_stamps() {
        let mut task = Task::default();
        task.set_created(&actor());
        task.set_updated(&actor());
        task.set_deleted(&actor());

        task.become_new();
        assert!(task.id().is_none());
        assert!(task.is_new());
        assert!(!task.is_deleted());
        assert!(task.base().updated_by.is_none());
    }

    #[test]
    fn test_become_new_keep_id() {
        let mut task = Task::default();
        task.set_created(&actor());
        let id = task.id();

        task.become_new_keep_id();
        assert_eq!(task.id(), id);
        assert!(task.is_new());
    }

    #[test]
    fn test_soft_delete_and_recover() {
        let mut task = Task::default();
        task.set_deleted(&actor());
        assert!(task.is_deleted());
        task.set_recovered();
        assert!(!task.is_deleted());
    }

    #[test]
    fn test_labels_are_a_set() {
        let mut task = Task::default();
        task.label_from_strings(["draft", "draft", "", "urgent"]);
        assert_eq!(task.base().labels, vec!["draft", "urgent"]);

        task.base_mut().unlabel(["draft", "missing"]);
        assert_eq!(task.base().labels, vec!["urgent"]);
        assert!(task.base().has_label("urgent"));
        assert!(!task.base().has_label("draft"));
    }

    #[test]
    fn test_prepare_for_sync() {
        let mut task = Task::default();
        assert!(task.last_sync().is_none());
        task.prepare_for_sync("ext-17");
        assert_eq!(task.base().external_id.as_deref(), Some("ext-17"));
        assert!(task.last_sync().is_some());
    }

    #[test]
    fn test_bson_round_trip_preserves_fields_and_skips_transients() {
        let mut task = Task {
            title: "write report".to_string(),
            ..Task::default()
        };
        task.set_created(&actor());
        task.set_tenant_id("tenant-a");
        task.label_from_strings(["draft"]);
        task.base_mut().touched = true;
        task.base_mut().labels_none = vec!["hidden".to_string()];

        let doc = mongodb::bson::to_document(&task).expect("serialize");
        assert!(doc.contains_key("_id"));
        assert!(doc.contains_key("created_by"));
        assert_eq!(doc.get_str("repo_id").expect("repo_id"), "tenant-a");
        assert!(!doc.contains_key("touched"));
        assert!(!doc.contains_key("labels_none"));
        assert!(!doc.contains_key("deleted_by"));

        let back: Task = mongodb::bson::from_document(doc).expect("deserialize");
        assert_eq!(back.id(), task.id());
        assert_eq!(back.title, task.title);
        assert_eq!(back.tenant_id(), "tenant-a");
        assert_eq!(back.base().labels, vec!["draft"]);
        assert!(!back.base().touched);
    }
}
