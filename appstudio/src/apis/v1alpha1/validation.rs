//! Structural validation of a [`ComponentSpec`].
//!
//! Every check runs on every call so a declarer sees all of the problems with
//! a spec at once. A spec that passes is wrapped in a [`ValidatedSpec`], which
//! a reconciler may rely on without validating again.
use super::component_types::ComponentSpec;
use super::source_types::ComponentSource;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use thiserror::Error;

/// The pattern names and application identifiers must match.
pub const DNS_LABEL_PATTERN: &str = "^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

/// Maximum length of a DNS label.
pub const DNS_LABEL_MAX_LENGTH: usize = 63;

static DNS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DNS_LABEL_PATTERN)
        .unwrap_or_else(|err| panic!("DNS_LABEL_PATTERN failed to compile: {err}"))
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    #[error("Required value")]
    Required,
    #[error("must be no more than {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
    #[error("must match the pattern {pattern}")]
    Pattern { pattern: &'static str },
    #[error("at most one of {} may be set", .populated.join(", "))]
    UnionExclusivity { populated: Vec<String> },
}

/// A single violated constraint, with the wire path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub kind: ViolationKind,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        FieldViolation {
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

/// Every constraint a candidate spec violated. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Returns `None` when there is nothing to report.
    pub fn from_violations(violations: Vec<FieldViolation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(ValidationError { violations })
        }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation was reported against `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid component spec: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A [`ComponentSpec`] that has passed validation.
///
/// The spec can only be read through this wrapper; use
/// [`ValidatedSpec::into_inner`] to edit it again, which gives up the guarantee.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedSpec(ComponentSpec);

impl ValidatedSpec {
    pub fn into_inner(self) -> ComponentSpec {
        self.0
    }
}

impl Deref for ValidatedSpec {
    type Target = ComponentSpec;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ComponentSpec> for ValidatedSpec {
    fn as_ref(&self) -> &ComponentSpec {
        &self.0
    }
}

impl TryFrom<ComponentSpec> for ValidatedSpec {
    type Error = ValidationError;

    fn try_from(spec: ComponentSpec) -> Result<Self, Self::Error> {
        spec.validate()
    }
}

impl ComponentSpec {
    /// Check every structural constraint on the spec.
    ///
    /// A spec with neither a git source nor a container image is accepted.
    pub fn validate(self) -> Result<ValidatedSpec, ValidationError> {
        match ValidationError::from_violations(self.violations()) {
            None => Ok(ValidatedSpec(self)),
            Some(err) => {
                tracing::debug!(
                    component = %self.component_name,
                    violations = err.len(),
                    "rejected component spec"
                );
                Err(err)
            }
        }
    }

    /// The constraints this spec violates, in field order.
    pub fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        check_dns_label("spec.componentName", &self.component_name, &mut violations);
        check_dns_label("spec.application", &self.application, &mut violations);
        if let Some(git) = self.source.git() {
            if git.url.is_empty() {
                violations.push(FieldViolation::new("spec.source.git.url", ViolationKind::Required));
            }
        }
        violations
    }
}

/// Whether `value` is a DNS-1123 label: lowercase alphanumerics and '-',
/// starting and ending with an alphanumeric, at most 63 characters.
pub fn is_dns_label(value: &str) -> bool {
    value.len() <= DNS_LABEL_MAX_LENGTH && matches_dns_label_pattern(value)
}

fn matches_dns_label_pattern(value: &str) -> bool {
    DNS_LABEL.is_match(value)
}

fn check_dns_label(field: &str, value: &str, violations: &mut Vec<FieldViolation>) {
    if value.is_empty() {
        violations.push(FieldViolation::new(field, ViolationKind::Required));
        return;
    }
    if value.len() > DNS_LABEL_MAX_LENGTH {
        violations.push(FieldViolation::new(
            field,
            ViolationKind::TooLong {
                max: DNS_LABEL_MAX_LENGTH,
                actual: value.len(),
            },
        ));
    }
    if !matches_dns_label_pattern(value) {
        violations.push(FieldViolation::new(
            field,
            ViolationKind::Pattern {
                pattern: DNS_LABEL_PATTERN,
            },
        ));
    }
}

/// Report a violation when more than one alternative of a union is populated.
pub fn check_union_exclusivity(field: &str, populated: &[&str]) -> Option<FieldViolation> {
    if populated.len() > 1 {
        Some(FieldViolation::new(
            field,
            ViolationKind::UnionExclusivity {
                populated: populated.iter().map(|p| p.to_string()).collect(),
            },
        ))
    } else {
        None
    }
}

/// Check the source union of a raw, not yet decoded, component object.
///
/// Alternatives are counted on the wire so that a union with several populated
/// members is reported instead of being collapsed while decoding.
pub fn check_raw_source(component: &Value) -> Option<FieldViolation> {
    let source = component
        .get("spec")
        .and_then(|spec| spec.get("source"))
        .and_then(Value::as_object)?;
    let populated: Vec<&str> = ComponentSource::ALTERNATIVES
        .iter()
        .copied()
        .filter(|name| matches!(source.get(*name), Some(v) if !v.is_null()))
        .collect();
    check_union_exclusivity("spec.source", &populated)
}

/// Fill the required strings a raw component object leaves out with empty
/// values, so that decoding succeeds and they are reported as
/// [`ViolationKind::Required`] along with every other violation.
pub fn default_required_fields(component: &mut Value) {
    let spec = match component.as_object_mut() {
        Some(object) => object
            .entry("spec")
            .or_insert_with(|| Value::Object(Map::new())),
        None => return,
    };
    let spec = match spec.as_object_mut() {
        Some(spec) => spec,
        None => return,
    };
    for key in ["componentName", "application"] {
        spec.entry(key).or_insert_with(|| Value::String(String::new()));
    }
    if let Some(git) = spec
        .get_mut("source")
        .and_then(|source| source.get_mut("git"))
        .and_then(Value::as_object_mut)
    {
        git.entry("url").or_insert_with(|| Value::String(String::new()));
    }
}
