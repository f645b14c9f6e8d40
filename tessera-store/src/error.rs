//! Error types for store, router, and orchestration operations
//!
//! Every semantic failure case callers may need to branch on is a
//! [`StoreErrorKind`] variant. Callers must match on kinds, never on
//! message text.

use std::fmt;

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Store operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Establishing a client connection
    Connect,
    /// Liveness check against an existing client
    Ping,
    /// Listing documents with filters
    Find,
    /// Fetching a single document by identity
    FindOne,
    /// Counting documents matching filters
    Count,
    /// Inserting new documents
    Create,
    /// Updating a single document
    Update,
    /// Bulk partial update by filter
    UpdateMany,
    /// Bulk single-field update by filter
    UpdateField,
    /// Hard delete
    Delete,
    /// Soft delete (deletion stamp only)
    DeleteSoft,
    /// Nulling a field across matching documents
    RemoveField,
    /// Copying documents into another collection and removing the originals
    Move,
    /// Running a caller-supplied aggregation pipeline
    Aggregate,
    /// Atomic array membership mutation
    ArrayMutation,
    /// Dumping a database to disk
    Backup,
    /// Restoring a database from a dump
    Restore,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Ping => write!(f, "ping"),
            Self::Find => write!(f, "find"),
            Self::FindOne => write!(f, "find_one"),
            Self::Count => write!(f, "count"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::UpdateMany => write!(f, "update_many"),
            Self::UpdateField => write!(f, "update_field"),
            Self::Delete => write!(f, "delete"),
            Self::DeleteSoft => write!(f, "delete_soft"),
            Self::RemoveField => write!(f, "remove_field"),
            Self::Move => write!(f, "move"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::ArrayMutation => write!(f, "array_mutation"),
            Self::Backup => write!(f, "backup"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Missing collection, tenant, or connection string; fail fast, no retry
    Configuration,
    /// No document matched where one was required
    NotFound,
    /// More than one document matched where exactly one was expected
    Cardinality,
    /// A destructive bulk operation was attempted with an empty filter
    EmptyFilter,
    /// Connect or ping failure
    ConnectionFailed,
    /// Operation exceeded its deadline
    Timeout,
    /// Optimistic concurrency check failed (stale version)
    Conflict,
    /// The query model carries a construct the translator does not support
    Unsupported,
    /// BSON encode/decode failure
    Serialization,
    /// Underlying driver error not otherwise classified
    Driver,
    /// Other unclassified error
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::NotFound => write!(f, "not_found"),
            Self::Cardinality => write!(f, "cardinality"),
            Self::EmptyFilter => write!(f, "empty_filter"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Conflict => write!(f, "conflict"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Serialization => write!(f, "serialization"),
            Self::Driver => write!(f, "driver"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured store error with operation context
///
/// # Example
///
/// ```rust
/// use tessera_store::error::{StoreError, StoreErrorKind};
///
/// let err = StoreError::not_found("orders", "65f1a0");
/// assert_eq!(err.kind, StoreErrorKind::NotFound);
/// assert!(!err.is_retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The operation being performed when the error occurred
    pub operation: StoreOperation,
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (e.g., collection name, document id)
    pub context: Option<String>,
}

impl StoreError {
    /// Create a new store error
    pub fn new(
        operation: StoreOperation,
        kind: StoreErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error (missing collection, tenant, connection)
    pub fn configuration(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Configuration, message)
    }

    /// Create a "no document found" error carrying the collection and id
    pub fn not_found(collection: impl Into<String>, id: impl fmt::Display) -> Self {
        let collection = collection.into();
        Self {
            operation: StoreOperation::FindOne,
            kind: StoreErrorKind::NotFound,
            message: "no document found".to_string(),
            context: Some(format!("{collection}: {id}")),
        }
    }

    /// Create a cardinality error (expected exactly one row)
    pub fn cardinality(collection: impl Into<String>, rows: usize) -> Self {
        Self {
            operation: StoreOperation::FindOne,
            kind: StoreErrorKind::Cardinality,
            message: format!("expected exactly one row, got {rows}"),
            context: Some(collection.into()),
        }
    }

    /// Create an empty-filter guard error for a bulk operation
    pub fn empty_filter(operation: StoreOperation, collection: impl Into<String>) -> Self {
        Self {
            operation,
            kind: StoreErrorKind::EmptyFilter,
            message: "refusing bulk operation with an empty filter".to_string(),
            context: Some(collection.into()),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::ConnectionFailed, message)
    }

    /// Create a timeout error
    pub fn timeout(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Timeout, message)
    }

    /// Create a version conflict error
    pub fn conflict(collection: impl Into<String>, id: impl fmt::Display) -> Self {
        let collection = collection.into();
        Self {
            operation: StoreOperation::Update,
            kind: StoreErrorKind::Conflict,
            message: "document version changed since it was read".to_string(),
            context: Some(format!("{collection}: {id}")),
        }
    }

    /// Create an unsupported-construct translation error
    pub fn unsupported(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Unsupported, message)
    }

    /// Create a driver error
    pub fn driver(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Driver, message)
    }

    /// Add context to an existing error
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: StoreOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::ConnectionFailed | StoreErrorKind::Timeout
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [{}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let (kind, operation) = match *err.kind {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Authentication { .. }
            | ErrorKind::Io(_) => (StoreErrorKind::ConnectionFailed, StoreOperation::Connect),
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
                (StoreErrorKind::Serialization, StoreOperation::Find)
            }
            ErrorKind::InvalidArgument { .. } => {
                (StoreErrorKind::Configuration, StoreOperation::Connect)
            }
            _ => (StoreErrorKind::Driver, StoreOperation::Find),
        };

        Self::new(operation, kind, err.to_string())
    }
}

/// Top-level error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured store error with operation context
    #[error("{0}")]
    Store(StoreError),

    /// BSON encode error
    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] mongodb::bson::ser::Error),

    /// BSON decode error
    #[error("BSON decode error: {0}")]
    BsonDecode(#[from] mongodb::bson::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The store error kind, when this error wraps a [`StoreError`]
    pub fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            Self::Store(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Whether this error represents a missing document
    pub fn is_not_found(&self) -> bool {
        self.store_kind() == Some(StoreErrorKind::NotFound)
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::Store(StoreError::from(err))
    }
}
