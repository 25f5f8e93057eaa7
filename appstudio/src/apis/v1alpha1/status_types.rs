use super::component_types::{Component, ComponentSpec};
use super::gitops::{GitOpsInputs, COMMIT_LINEAGE_ANNOTATION, LAST_APPLIED_GITOPS_ANNOTATION};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Observed state of a [`Component`]. Written by the reconciler only, through
/// [`StatusWriter`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Name is the name of the component.
    #[serde(default)]
    pub name: String,
    /// Location and most recent commit of the component's GitOps resources.
    #[serde(default, rename = "gitopsRepository")]
    pub gitops_repository: GitOpsStatus,
}

/// GitOps repository-specific status for the component.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsStatus {
    /// The gitops repository URL for the component.
    #[serde(default, rename = "repositoryURL", skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// The branch used for the gitops repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// The path within the gitops repository used for the gitops resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Whether GitOps resource generation was skipped for the component.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resource_generation_skipped: bool,
    /// The most recent commit ID in the GitOps repository for this component.
    #[serde(default, rename = "commitID", skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("commit {attempted} was already recorded before {current}, refusing to move backwards")]
    CommitRegression { current: String, attempted: String },
    #[error("commit id must not be empty")]
    EmptyCommit,
    #[error("lineage ends at {lineage:?} but the status records commit {recorded:?}")]
    LineageMismatch {
        recorded: Option<String>,
        lineage: Option<String>,
    },
    #[error("failed to encode annotation {annotation}: {reason}")]
    Annotation {
        annotation: &'static str,
        reason: String,
    },
}

impl StatusError {
    fn annotation(annotation: &'static str, err: serde_json::Error) -> Self {
        StatusError::Annotation {
            annotation,
            reason: err.to_string(),
        }
    }
}

/// The GitOps commits recorded for a component, oldest first.
///
/// A lineage lives as long as the reconciler keeps generating on top of the
/// same history. Commits already seen in the lineage may not be recorded again
/// unless a new lineage is started with [`StatusWriter::reset_lineage`].
///
/// Every write stores the lineage in [`COMMIT_LINEAGE_ANNOTATION`], so a
/// reconciler that restarts picks it up again with
/// [`CommitLineage::from_component`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct CommitLineage {
    commits: Vec<String>,
}

impl CommitLineage {
    pub fn new() -> Self {
        CommitLineage::default()
    }

    /// A lineage whose only entry is the commit currently on the status.
    pub fn from_status(status: &GitOpsStatus) -> Self {
        CommitLineage {
            commits: status.commit_id.iter().cloned().collect(),
        }
    }

    /// The lineage stored on `component`.
    ///
    /// Falls back to [`CommitLineage::from_status`] when the annotation is
    /// missing, unreadable or does not end at the commit on the status.
    pub fn from_component(component: &Component) -> Self {
        CommitLineage::stored(
            component.metadata.annotations.as_ref(),
            component.status.as_ref().map(|status| &status.gitops_repository),
        )
    }

    fn stored(annotations: Option<&BTreeMap<String, String>>, status: Option<&GitOpsStatus>) -> Self {
        let recorded = status.and_then(|status| status.commit_id.as_deref());
        match annotations
            .and_then(|annotations| annotations.get(COMMIT_LINEAGE_ANNOTATION))
            .and_then(|value| CommitLineage::from_annotation(value))
        {
            Some(lineage) if lineage.current() == recorded => lineage,
            _ => status.map(CommitLineage::from_status).unwrap_or_default(),
        }
    }

    pub fn to_annotation(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_annotation(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }

    pub fn current(&self) -> Option<&str> {
        self.commits.last().map(String::as_str)
    }

    pub fn contains(&self, commit: &str) -> bool {
        self.commits.iter().any(|c| c == commit)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Append `commit` unless it moves the lineage backwards.
    /// Recording the current commit again is a no-op.
    fn advance(&mut self, commit: &str) -> Result<(), StatusError> {
        if commit.is_empty() {
            return Err(StatusError::EmptyCommit);
        }
        if self.current() == Some(commit) {
            return Ok(());
        }
        if self.contains(commit) {
            return Err(StatusError::CommitRegression {
                current: self.current().unwrap_or_default().to_string(),
                attempted: commit.to_string(),
            });
        }
        self.commits.push(commit.to_string());
        Ok(())
    }

    fn starting_at(commit: &str) -> Result<Self, StatusError> {
        if commit.is_empty() {
            return Err(StatusError::EmptyCommit);
        }
        Ok(CommitLineage {
            commits: vec![commit.to_string()],
        })
    }
}

/// Mutates the status of a [`Component`] on behalf of the reconciler.
///
/// The spec is only borrowed for reading, so a reconciler holding a writer can
/// never change what the declarer asked for.
pub struct StatusWriter<'a> {
    spec: &'a ComponentSpec,
    metadata: &'a mut ObjectMeta,
    status: &'a mut ComponentStatus,
}

impl Component {
    /// Returns a [`StatusWriter`], initializing an empty status if needed.
    pub fn status_writer(&mut self) -> StatusWriter<'_> {
        let Component {
            metadata,
            spec,
            status,
            ..
        } = self;
        StatusWriter {
            spec,
            metadata,
            status: status.get_or_insert_with(ComponentStatus::default),
        }
    }
}

impl<'a> StatusWriter<'a> {
    pub fn status(&self) -> &ComponentStatus {
        &*self.status
    }

    /// Record the name the component resolved to.
    pub fn observe_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.status.name = name.into();
        self
    }

    /// Record where the generated GitOps resources live.
    pub fn record_location(
        &mut self,
        repository_url: impl Into<String>,
        branch: Option<String>,
        context: Option<String>,
    ) -> &mut Self {
        let gitops = &mut self.status.gitops_repository;
        gitops.repository_url = Some(repository_url.into());
        gitops.branch = branch;
        gitops.context = context;
        self
    }

    /// Record a successful GitOps generation at `commit`.
    ///
    /// `lineage` must end at the commit currently on the status, and `commit`
    /// must advance both it and the lineage stored on the component. On
    /// success the status mirrors the spec's `skipGitOpsResourceGeneration`,
    /// the applied inputs and lineage are stored on the component and
    /// `lineage` is brought up to date. Nothing changes on failure.
    pub fn record_generation(
        &mut self,
        lineage: &mut CommitLineage,
        commit: &str,
    ) -> Result<&mut Self, StatusError> {
        let mut held = lineage.clone();
        let mut stored = CommitLineage::stored(
            self.metadata.annotations.as_ref(),
            Some(&self.status.gitops_repository),
        );
        let recorded = self.status.gitops_repository.commit_id.as_deref();
        let advanced = if held.current() != recorded {
            Err(StatusError::LineageMismatch {
                recorded: recorded.map(str::to_string),
                lineage: held.current().map(str::to_string),
            })
        } else {
            held.advance(commit).and_then(|_| stored.advance(commit))
        };
        if let Err(err) = advanced {
            tracing::warn!(
                component = %self.spec.component_name,
                commit,
                error = %err,
                "rejected gitops status update"
            );
            return Err(err);
        }
        let next = if stored.len() > held.len() { stored } else { held };
        self.record_commit(&next, commit)?;
        *lineage = next;
        Ok(self)
    }

    /// Record that GitOps generation was not run because the spec skips it.
    pub fn record_skipped(&mut self) -> Result<&mut Self, StatusError> {
        let inputs = self.applied_inputs()?;
        self.mark_applied(inputs);
        Ok(self)
    }

    /// Start a new lineage at `commit`, discarding the recorded history.
    /// Used when the GitOps resources are regenerated from scratch.
    pub fn reset_lineage(
        &mut self,
        lineage: &mut CommitLineage,
        commit: &str,
    ) -> Result<&mut Self, StatusError> {
        let next = CommitLineage::starting_at(commit)?;
        self.record_commit(&next, commit)?;
        tracing::debug!(
            component = %self.spec.component_name,
            commit,
            "started new gitops lineage"
        );
        *lineage = next;
        Ok(self)
    }

    fn record_commit(&mut self, lineage: &CommitLineage, commit: &str) -> Result<(), StatusError> {
        let inputs = self.applied_inputs()?;
        let history = lineage
            .to_annotation()
            .map_err(|err| StatusError::annotation(COMMIT_LINEAGE_ANNOTATION, err))?;
        self.status.gitops_repository.commit_id = Some(commit.to_string());
        self.mark_applied(inputs);
        self.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(COMMIT_LINEAGE_ANNOTATION.to_string(), history);
        Ok(())
    }

    fn applied_inputs(&self) -> Result<String, StatusError> {
        GitOpsInputs::from_spec(self.spec)
            .to_annotation()
            .map_err(|err| StatusError::annotation(LAST_APPLIED_GITOPS_ANNOTATION, err))
    }

    fn mark_applied(&mut self, inputs: String) {
        self.status.gitops_repository.resource_generation_skipped =
            self.spec.skip_git_ops_resource_generation;
        self.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(LAST_APPLIED_GITOPS_ANNOTATION.to_string(), inputs);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source_types::GitSource;
    use kube::ResourceExt;
    use serde_json::json;

    fn component() -> Component {
        let spec = ComponentSpec {
            component_name: "my-app".into(),
            application: "my-app-group".into(),
            source: GitSource::new("https://example.com/repo.git").into(),
            ..Default::default()
        };
        Component::declare("my-app", spec.validate().unwrap())
    }

    #[test]
    fn empty_status_serializes_required_fields_only() {
        let status = ComponentStatus::default();
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"name": "", "gitopsRepository": {}})
        );
    }

    #[test]
    fn gitops_status_uses_wire_names() {
        let status = GitOpsStatus {
            repository_url: Some("https://github.com/org/gitops".into()),
            branch: Some("main".into()),
            context: Some("components/my-app".into()),
            resource_generation_skipped: true,
            commit_id: Some("abc123".into()),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "repositoryURL": "https://github.com/org/gitops",
                "branch": "main",
                "context": "components/my-app",
                "resourceGenerationSkipped": true,
                "commitID": "abc123"
            })
        );
    }

    #[test]
    fn commits_only_move_forward() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        let mut writer = component.status_writer();

        writer.record_generation(&mut lineage, "abc123").unwrap();
        writer.record_generation(&mut lineage, "def456").unwrap();
        assert_eq!(
            writer.record_generation(&mut lineage, "abc123").err(),
            Some(StatusError::CommitRegression {
                current: "def456".into(),
                attempted: "abc123".into(),
            })
        );
        assert_eq!(writer.status().gitops_repository.commit_id.as_deref(), Some("def456"));
        assert_eq!(lineage.current(), Some("def456"));
    }

    #[test]
    fn recording_the_current_commit_is_idempotent() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        let mut writer = component.status_writer();
        writer.record_generation(&mut lineage, "abc123").unwrap();
        writer.record_generation(&mut lineage, "abc123").unwrap();
        assert_eq!(lineage.len(), 1);
    }

    #[test]
    fn empty_commit_is_rejected() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        assert_eq!(
            component.status_writer().record_generation(&mut lineage, "").err(),
            Some(StatusError::EmptyCommit)
        );
        assert_eq!(component.status.unwrap().gitops_repository.commit_id, None);
    }

    #[test]
    fn lineage_reset_allows_earlier_commit() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        let mut writer = component.status_writer();
        writer.record_generation(&mut lineage, "abc123").unwrap();
        writer.record_generation(&mut lineage, "def456").unwrap();
        writer.reset_lineage(&mut lineage, "abc123").unwrap();
        assert_eq!(writer.status().gitops_repository.commit_id.as_deref(), Some("abc123"));
        writer.record_generation(&mut lineage, "0a1b2c").unwrap();
        assert_eq!(lineage.len(), 2);
    }

    #[test]
    fn lineage_seeded_from_status() {
        let status = GitOpsStatus {
            commit_id: Some("abc123".into()),
            ..Default::default()
        };
        let mut lineage = CommitLineage::from_status(&status);
        assert_eq!(lineage.current(), Some("abc123"));
        assert!(lineage.advance("def456").is_ok());
        assert!(lineage.advance("abc123").is_err());
        assert!(CommitLineage::from_status(&GitOpsStatus::default()).is_empty());
    }

    #[test]
    fn restarted_reconciler_cannot_move_backwards() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        component.status_writer().record_generation(&mut lineage, "abc123").unwrap();
        component.status_writer().record_generation(&mut lineage, "def456").unwrap();
        assert_eq!(
            component.annotations().get(COMMIT_LINEAGE_ANNOTATION).map(String::as_str),
            Some(r#"["abc123","def456"]"#)
        );

        let mut restarted = CommitLineage::from_component(&component);
        assert_eq!(restarted, lineage);
        assert_eq!(
            component.status_writer().record_generation(&mut restarted, "abc123").err(),
            Some(StatusError::CommitRegression {
                current: "def456".into(),
                attempted: "abc123".into(),
            })
        );
        assert_eq!(
            component.status.as_ref().unwrap().gitops_repository.commit_id.as_deref(),
            Some("def456")
        );
    }

    #[test]
    fn lineage_seeded_from_status_still_sees_stored_history() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        component.status_writer().record_generation(&mut lineage, "abc123").unwrap();
        component.status_writer().record_generation(&mut lineage, "def456").unwrap();

        let mut seeded = CommitLineage::from_status(&component.status.as_ref().unwrap().gitops_repository);
        assert_eq!(seeded.len(), 1);
        assert_eq!(
            component.status_writer().record_generation(&mut seeded, "abc123").err(),
            Some(StatusError::CommitRegression {
                current: "def456".into(),
                attempted: "abc123".into(),
            })
        );
        assert_eq!(seeded.len(), 1);

        component.status_writer().record_generation(&mut seeded, "0a1b2c").unwrap();
        assert_eq!(seeded.len(), 3);
        assert_eq!(CommitLineage::from_component(&component), seeded);
    }

    #[test]
    fn lineage_must_end_at_recorded_commit() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        component.status_writer().record_generation(&mut lineage, "def456").unwrap();

        let mut fresh = CommitLineage::new();
        assert_eq!(
            component.status_writer().record_generation(&mut fresh, "abc123").err(),
            Some(StatusError::LineageMismatch {
                recorded: Some("def456".into()),
                lineage: None,
            })
        );
        assert!(fresh.is_empty());
        assert_eq!(
            component.status.as_ref().unwrap().gitops_repository.commit_id.as_deref(),
            Some("def456")
        );
    }

    #[test]
    fn stale_lineage_annotation_falls_back_to_status() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        component.status_writer().record_generation(&mut lineage, "abc123").unwrap();
        component.status.as_mut().unwrap().gitops_repository.commit_id = Some("fedcba".into());

        let rebuilt = CommitLineage::from_component(&component);
        assert_eq!(rebuilt.current(), Some("fedcba"));
        assert_eq!(rebuilt.len(), 1);
        assert!(CommitLineage::from_component(&self::component()).is_empty());
    }

    #[test]
    fn reset_lineage_is_stored() {
        let mut component = component();
        let mut lineage = CommitLineage::new();
        let mut writer = component.status_writer();
        writer.record_generation(&mut lineage, "abc123").unwrap();
        writer.record_generation(&mut lineage, "def456").unwrap();
        writer.reset_lineage(&mut lineage, "abc123").unwrap();
        assert_eq!(CommitLineage::from_component(&component), lineage);
        assert_eq!(lineage.len(), 1);
    }

    #[test]
    fn skipped_flag_mirrors_spec_when_written() {
        let mut component = component();
        component.spec.skip_git_ops_resource_generation = true;
        component.status_writer().record_skipped().unwrap();
        assert!(component.status.as_ref().unwrap().gitops_repository.resource_generation_skipped);

        // a later spec change is not reflected until the next write
        component.spec.skip_git_ops_resource_generation = false;
        assert!(component.status.as_ref().unwrap().gitops_repository.resource_generation_skipped);
        let mut lineage = CommitLineage::new();
        component.status_writer().record_generation(&mut lineage, "abc123").unwrap();
        assert!(!component.status.as_ref().unwrap().gitops_repository.resource_generation_skipped);
    }

    #[test]
    fn writer_records_location_and_name() {
        let mut component = component();
        component
            .status_writer()
            .observe_name("my-app")
            .record_location("https://github.com/org/gitops", Some("main".into()), None);
        let status = component.status.unwrap();
        assert_eq!(status.name, "my-app");
        assert_eq!(
            status.gitops_repository.repository_url.as_deref(),
            Some("https://github.com/org/gitops")
        );
        assert_eq!(status.gitops_repository.branch.as_deref(), Some("main"));
        assert_eq!(status.gitops_repository.context, None);
    }
}
