use super::component_types::{Component, ComponentSpec};
use super::source_types::ComponentSource;
use super::status_types::ComponentStatus;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// Annotation holding the [`GitOpsInputs`] the reconciler last generated from.
pub const LAST_APPLIED_GITOPS_ANNOTATION: &str = "appstudio.redhat.com/last-applied-gitops-inputs";

/// Annotation holding the [`CommitLineage`](super::status_types::CommitLineage)
/// behind the commit on the status, oldest first.
pub const COMMIT_LINEAGE_ANNOTATION: &str = "appstudio.redhat.com/gitops-commit-lineage";

/// The spec fields that affect the generated GitOps resources.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsInputs {
    #[serde(default, skip_serializing_if = "ComponentSource::is_empty")]
    pub source: ComponentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    #[serde(default)]
    pub skip_git_ops_resource_generation: bool,
}

impl GitOpsInputs {
    pub fn from_spec(spec: &ComponentSpec) -> Self {
        GitOpsInputs {
            source: spec.source.clone(),
            container_image: spec.container_image.clone(),
            skip_git_ops_resource_generation: spec.skip_git_ops_resource_generation,
        }
    }

    /// Canonical JSON form, as stored in [`LAST_APPLIED_GITOPS_ANNOTATION`].
    pub fn to_annotation(&self) -> Result<String, serde_json::Error> {
        // field order is fixed by the struct, so equal inputs give equal strings
        serde_json::to_string(self)
    }

    pub fn from_annotation(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

/// Whether the GitOps resources of a component must be generated again.
///
/// True when nothing has been recorded yet, when the recorded skip flag no
/// longer matches the spec, or when source, container image or skip flag
/// differ from the inputs last generated from.
pub fn regeneration_required(
    spec: &ComponentSpec,
    status: Option<&ComponentStatus>,
    recorded: Option<&GitOpsInputs>,
) -> bool {
    let status = match status {
        Some(status) => status,
        None => return true,
    };
    if status.gitops_repository.resource_generation_skipped != spec.skip_git_ops_resource_generation {
        return true;
    }
    match recorded {
        Some(recorded) => *recorded != GitOpsInputs::from_spec(spec),
        None => true,
    }
}

impl Component {
    /// The inputs recorded by the last GitOps generation, if any.
    pub fn recorded_gitops_inputs(&self) -> Option<GitOpsInputs> {
        self.annotations()
            .get(LAST_APPLIED_GITOPS_ANNOTATION)
            .and_then(|value| GitOpsInputs::from_annotation(value))
    }

    pub fn gitops_regeneration_required(&self) -> bool {
        regeneration_required(
            &self.spec,
            self.status.as_ref(),
            self.recorded_gitops_inputs().as_ref(),
        )
    }
}
