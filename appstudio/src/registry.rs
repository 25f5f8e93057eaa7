//! An explicit registry of the kinds a process works with.
//!
//! Build one at startup and hand it to whatever needs to decode objects or
//! publish CustomResourceDefinitions.
use crate::apis::v1alpha1::validation::{check_raw_source, default_required_fields, ValidationError};
use crate::error::Error;
use crate::Component;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{CustomResourceExt, Resource};
use serde_json::Value;

/// A kind known to a [`Registry`].
#[derive(Clone, Debug)]
pub struct RegisteredKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    crd: fn() -> CustomResourceDefinition,
}

impl RegisteredKind {
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    pub fn crd(&self) -> CustomResourceDefinition {
        (self.crd)()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    kinds: Vec<RegisteredKind>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// A registry holding every kind this crate defines.
    pub fn with_component_kinds() -> Self {
        let mut registry = Registry::new();
        registry.register::<Component>();
        registry
    }

    /// Add `K` to the registry. Registering a kind twice has no effect.
    pub fn register<K>(&mut self) -> &mut Self
    where
        K: CustomResourceExt + Resource<DynamicType = ()>,
    {
        let kind = RegisteredKind {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            plural: K::plural(&()).into_owned(),
            crd: K::crd,
        };
        if self.recognizes(&kind.api_version(), &kind.kind) {
            return self;
        }
        tracing::debug!(api_version = %kind.api_version(), kind = %kind.kind, "registered kind");
        self.kinds.push(kind);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &RegisteredKind> {
        self.kinds.iter()
    }

    pub fn recognizes(&self, api_version: &str, kind: &str) -> bool {
        self.kinds
            .iter()
            .any(|k| k.kind == kind && k.api_version() == api_version)
    }

    /// The CustomResourceDefinition of every registered kind, in registration order.
    pub fn crds(&self) -> Vec<CustomResourceDefinition> {
        self.kinds.iter().map(RegisteredKind::crd).collect()
    }

    /// Decode and validate a raw Component object.
    ///
    /// Every violation is reported at once, including a source union with
    /// more than one populated alternative.
    pub fn admit_component(&self, mut value: Value) -> Result<Component, Error> {
        let api_version = value.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        let expected = Component::api_version(&());
        if kind != Component::kind(&()) || api_version != expected || !self.recognizes(api_version, kind) {
            return Err(Error::UnregisteredKind {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            });
        }

        let union = check_raw_source(&value);
        default_required_fields(&mut value);
        let component: Component = serde_json::from_value(value)?;
        let violations = union.into_iter().chain(component.spec.violations()).collect();
        match ValidationError::from_violations(violations) {
            None => Ok(component),
            Some(err) => {
                tracing::debug!(
                    component = %component.spec.component_name,
                    violations = err.len(),
                    "rejected component"
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ViolationKind;
    use serde_json::json;

    #[test]
    fn registers_component_once() {
        let mut registry = Registry::with_component_kinds();
        registry.register::<Component>();
        assert_eq!(registry.kinds().count(), 1);
        assert!(registry.recognizes("appstudio.redhat.com/v1alpha1", "Component"));
        assert!(!registry.recognizes("appstudio.redhat.com/v1alpha1", "Application"));
    }

    #[test]
    fn crd_carries_names_and_schema_constraints() {
        let crds = Registry::with_component_kinds().crds();
        assert_eq!(crds.len(), 1);
        let crd = serde_json::to_value(&crds[0]).unwrap();
        assert_eq!(crd["metadata"]["name"], "components.appstudio.redhat.com");
        assert_eq!(crd["spec"]["scope"], "Namespaced");
        assert_eq!(crd["spec"]["names"]["shortNames"], json!(["hascmp", "hc", "comp"]));

        let spec = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"];
        let name = &spec["properties"]["componentName"];
        assert_eq!(name["maxLength"], 63);
        assert_eq!(name["pattern"], "^[a-z0-9]([-a-z0-9]*[a-z0-9])?$");
        assert_eq!(spec["required"], json!(["application", "componentName"]));
    }

    #[test]
    fn empty_registry_refuses_components() {
        let err = Registry::new()
            .admit_component(json!({
                "apiVersion": "appstudio.redhat.com/v1alpha1",
                "kind": "Component",
                "metadata": {"name": "my-app"},
                "spec": {"componentName": "my-app", "application": "grp"}
            }))
            .unwrap_err();
        assert!(matches!(err, Error::UnregisteredKind { .. }));
    }

    #[test]
    fn admits_valid_component() {
        let component = Registry::with_component_kinds()
            .admit_component(json!({
                "apiVersion": "appstudio.redhat.com/v1alpha1",
                "kind": "Component",
                "metadata": {"name": "my-app"},
                "spec": {
                    "componentName": "my-app",
                    "application": "my-app-group",
                    "source": {"git": {"url": "https://example.com/repo.git"}}
                }
            }))
            .unwrap();
        assert_eq!(component.spec.source.git().map(|g| g.url.as_str()), Some("https://example.com/repo.git"));
    }

    #[test]
    fn reports_all_violations_of_raw_component() {
        let err = Registry::with_component_kinds()
            .admit_component(json!({
                "apiVersion": "appstudio.redhat.com/v1alpha1",
                "kind": "Component",
                "metadata": {"name": "bad"},
                "spec": {
                    "componentName": "My_App",
                    "application": "",
                    "source": {"git": {"url": ""}}
                }
            }))
            .unwrap_err();
        match err {
            Error::Validation(err) => {
                assert_eq!(err.len(), 3);
                assert!(err.has_field("spec.componentName"));
                assert!(err.has_field("spec.application"));
                assert!(err.has_field("spec.source.git.url"));
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn missing_required_keys_are_reported_with_other_violations() {
        let err = Registry::with_component_kinds()
            .admit_component(json!({
                "apiVersion": "appstudio.redhat.com/v1alpha1",
                "kind": "Component",
                "metadata": {"name": "bad"},
                "spec": {"componentName": "My_App", "source": {"git": {}}}
            }))
            .unwrap_err();
        match err {
            Error::Validation(err) => {
                let kinds: Vec<(&str, &ViolationKind)> = err
                    .violations()
                    .iter()
                    .map(|v| (v.field.as_str(), &v.kind))
                    .collect();
                assert_eq!(
                    kinds,
                    vec![
                        (
                            "spec.componentName",
                            &ViolationKind::Pattern {
                                pattern: crate::apis::v1alpha1::validation::DNS_LABEL_PATTERN
                            }
                        ),
                        ("spec.application", &ViolationKind::Required),
                        ("spec.source.git.url", &ViolationKind::Required),
                    ]
                );
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn malformed_object_is_a_serialization_error() {
        let err = Registry::with_component_kinds()
            .admit_component(json!({
                "apiVersion": "appstudio.redhat.com/v1alpha1",
                "kind": "Component",
                "metadata": {"name": "my-app"},
                "spec": {"componentName": 7}
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
