use thiserror::Error;

pub use crate::apis::v1alpha1::status_types::StatusError;
pub use crate::apis::v1alpha1::validation::{FieldViolation, ValidationError, ViolationKind};

#[derive(Error, Debug)]
pub enum Error {
    /// The declared spec violates one or more constraints
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A status write broke the status transition rules
    #[error(transparent)]
    Status(#[from] StatusError),
    /// A write raced with another writer
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    /// The object is not of a kind known to the registry
    #[error("{api_version}/{kind} is not a registered kind")]
    UnregisteredKind { api_version: String, kind: String },
    #[error("unable to decode object: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Returned when a write is based on a stale read of the object.
/// The caller should fetch the object again and retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("component {name} was read at resourceVersion {read:?} but is now at {latest:?}")]
    StaleRead {
        name: String,
        read: Option<String>,
        latest: Option<String>,
    },
}
