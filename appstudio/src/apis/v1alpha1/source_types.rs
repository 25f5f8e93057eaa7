use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of origin a [`Component`](super::Component) is created from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceKind {
    Git,
    Image,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Git => f.write_str("Git"),
            SourceKind::Image => f.write_str("Image"),
        }
    }
}

/// A git repository to build a component from.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    /// The repository to create the component from.
    pub url: String,
    /// A branch, tag or commit id. The repository's default branch when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// A relative path inside the repository containing the component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// If specified, the devfile at the URL will be used for the component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devfile_url: Option<String>,
    /// If specified, the dockerfile at the URL will be used for the component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_url: Option<String>,
}

impl GitSource {
    pub fn new(url: impl Into<String>) -> Self {
        GitSource {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// The alternatives a [`ComponentSource`] may hold. At most one is active.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ComponentSourceUnion {
    Git(GitSource),
}

impl ComponentSourceUnion {
    pub fn kind(&self) -> SourceKind {
        match self {
            ComponentSourceUnion::Git(_) => SourceKind::Git,
        }
    }
}

/// Describes where a component comes from.
///
/// On the wire the active alternative is written under its field name
/// (`{"git": {...}}`) and inactive alternatives are omitted. An empty source
/// is allowed; the component is then image based, see [`ComponentOrigin`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(from = "SourceFields", into = "SourceFields")]
pub struct ComponentSource(Option<ComponentSourceUnion>);

impl ComponentSource {
    /// Wire names of every alternative, in declaration order.
    pub const ALTERNATIVES: &'static [&'static str] = &["git"];

    pub fn empty() -> Self {
        ComponentSource(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn active(&self) -> Option<&ComponentSourceUnion> {
        self.0.as_ref()
    }

    pub fn git(&self) -> Option<&GitSource> {
        match &self.0 {
            Some(ComponentSourceUnion::Git(git)) => Some(git),
            None => None,
        }
    }
}

impl From<GitSource> for ComponentSource {
    fn from(git: GitSource) -> Self {
        ComponentSource(Some(ComponentSourceUnion::Git(git)))
    }
}

impl From<ComponentSourceUnion> for ComponentSource {
    fn from(union: ComponentSourceUnion) -> Self {
        ComponentSource(Some(union))
    }
}

/// Wire shape of [`ComponentSource`]: one optional field per alternative.
#[derive(Serialize, Deserialize, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SourceFields {
    /// Git Source for a Component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitSource>,
}

impl From<SourceFields> for ComponentSource {
    fn from(fields: SourceFields) -> Self {
        ComponentSource(fields.git.map(ComponentSourceUnion::Git))
    }
}

impl From<ComponentSource> for SourceFields {
    fn from(source: ComponentSource) -> Self {
        match source.0 {
            Some(ComponentSourceUnion::Git(git)) => SourceFields { git: Some(git) },
            None => SourceFields::default(),
        }
    }
}

impl JsonSchema for ComponentSource {
    fn schema_name() -> String {
        "ComponentSource".to_owned()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        SourceFields::json_schema(gen)
    }
}

/// The effective origin of a component, derived from its source and container image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ComponentOrigin<'a> {
    /// Built from a git repository. The container image, if any, is the build output.
    Git(&'a GitSource),
    /// Created from a container image. `None` when no image was declared either.
    Image(Option<&'a str>),
}

impl<'a> ComponentOrigin<'a> {
    pub fn kind(&self) -> SourceKind {
        match self {
            ComponentOrigin::Git(_) => SourceKind::Git,
            ComponentOrigin::Image(_) => SourceKind::Image,
        }
    }
}
