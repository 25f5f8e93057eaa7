mod apis;
pub mod error;
pub mod registry;

// expose only v1alpha1 types
pub use apis::v1alpha1::*;

pub use error::Error;
pub use registry::Registry;

#[doc = include_str!("../../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
