use super::source_types::{ComponentOrigin, ComponentSource};
use super::status_types::ComponentStatus;
use super::validation::ValidatedSpec;
use crate::error::ConflictError;
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::core::ObjectList;
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A buildable, deployable unit of source code belonging to an Application.
///
/// `replicas`, `targetPort` and `skipGitOpsResourceGeneration` are omitted
/// from the wire when they hold their zero value, so "explicitly zero" and
/// "unset" read back the same.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    kind = "Component",
    group = "appstudio.redhat.com",
    version = "v1alpha1",
    plural = "components",
    shortname = "hascmp",
    shortname = "hc",
    shortname = "comp",
    status = "ComponentStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Application", "type":"string", "jsonPath":".spec.application"}"#,
    printcolumn = r#"{"name":"Source", "type":"string", "jsonPath":".spec.source.git.url"}"#,
    printcolumn = r#"{"name":"Image", "type":"string", "jsonPath":".spec.containerImage"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Name of the component to be added to the Application.
    #[schemars(length(max = 63), regex(pattern = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$"))]
    pub component_name: String,
    /// Application to add the component to.
    #[schemars(length(max = 63), regex(pattern = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$"))]
    pub application: String,
    /// Name of a secret holding either a token for the component's git
    /// repository, or a pull secret for its container image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Where the component comes from.
    #[serde(default, skip_serializing_if = "ComponentSource::is_empty")]
    pub source: ComponentSource,
    /// Compute resources required by this component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// The number of replicas to deploy the component with. 0 uses the platform default.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub replicas: i32,
    /// The port to expose the component over. 0 uses the platform default.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub target_port: i32,
    /// The route to expose the component with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Environment variables to add to the component, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// The container image to build the component into, or to create it from
    /// when there is no git source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    /// Whether to bypass the generation of GitOps resources for the component.
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_git_ops_resource_generation: bool,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ComponentSpec {
    /// The effective origin: git when a git source is set, otherwise the container image.
    pub fn origin(&self) -> ComponentOrigin<'_> {
        match self.source.git() {
            Some(git) => ComponentOrigin::Git(git),
            None => ComponentOrigin::Image(self.container_image.as_deref()),
        }
    }

    /// The image a build should push to. Only git based components are built.
    pub fn build_output(&self) -> Option<&str> {
        match self.origin() {
            ComponentOrigin::Git(_) => self.container_image.as_deref(),
            ComponentOrigin::Image(_) => None,
        }
    }

    /// Wire names of the fields that differ between two specs.
    /// `env` is compared in order.
    pub fn changed_fields(&self, other: &ComponentSpec) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let mut cmp = |name, same: bool| {
            if !same {
                changed.push(name)
            }
        };
        cmp("componentName", self.component_name == other.component_name);
        cmp("application", self.application == other.application);
        cmp("secret", self.secret == other.secret);
        cmp("source", self.source == other.source);
        cmp("resources", self.resources == other.resources);
        cmp("replicas", self.replicas == other.replicas);
        cmp("targetPort", self.target_port == other.target_port);
        cmp("route", self.route == other.route);
        cmp("env", self.env == other.env);
        cmp("containerImage", self.container_image == other.container_image);
        cmp(
            "skipGitOpsResourceGeneration",
            self.skip_git_ops_resource_generation == other.skip_git_ops_resource_generation,
        );
        changed
    }
}

impl Component {
    /// Declare a new component. The status starts out empty.
    pub fn declare(name: &str, spec: ValidatedSpec) -> Component {
        Component::new(name, spec.into_inner())
    }

    /// Replace the desired state, leaving the status untouched.
    pub fn update_spec(&mut self, spec: ValidatedSpec) {
        self.spec = spec.into_inner();
    }

    pub fn origin(&self) -> ComponentOrigin<'_> {
        self.spec.origin()
    }

    /// Fail when `self` was read at a different resourceVersion than `latest`.
    pub fn ensure_current(&self, latest: &Component) -> Result<(), ConflictError> {
        let read = self.meta().resource_version.clone();
        let current = latest.meta().resource_version.clone();
        if read == current {
            Ok(())
        } else {
            Err(ConflictError::StaleRead {
                name: self.meta().name.clone().unwrap_or_default(),
                read,
                latest: current,
            })
        }
    }
}

/// An ordered collection of [`Component`] with list metadata.
///
/// The continue token and remaining item count are passed through as received.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Component>,
}

impl ComponentList {
    pub fn new(items: Vec<Component>, metadata: ListMeta) -> Self {
        ComponentList {
            api_version: Some(Component::api_version(&()).into_owned()),
            kind: Some(format!("{}List", Component::kind(&()))),
            metadata,
            items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Token to pass to the next list call, if there are more results.
    pub fn continue_token(&self) -> Option<&str> {
        self.metadata.continue_.as_deref()
    }

    pub fn remaining_item_count(&self) -> Option<i64> {
        self.metadata.remaining_item_count
    }
}

impl From<ObjectList<Component>> for ComponentList {
    fn from(list: ObjectList<Component>) -> Self {
        ComponentList::new(list.items, list.metadata)
    }
}

impl IntoIterator for ComponentList {
    type Item = Component;
    type IntoIter = std::vec::IntoIter<Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ComponentList {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
