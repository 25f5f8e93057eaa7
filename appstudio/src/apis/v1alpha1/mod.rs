//! Types of the `appstudio.redhat.com/v1alpha1` API group.
pub mod component_types;
pub mod gitops;
pub mod source_types;
pub mod status_types;
pub mod validation;

pub use component_types::{Component, ComponentList, ComponentSpec};
pub use source_types::{ComponentOrigin, ComponentSource, ComponentSourceUnion, GitSource, SourceKind};
pub use status_types::{CommitLineage, ComponentStatus, GitOpsStatus, StatusWriter};
pub use validation::ValidatedSpec;
