//! Core types for apimsync
//!
//! The resource kind registry, identity values, kind-level graph, canonical
//! on-disk/URI layout, DTO normalization, and the hierarchical configuration
//! matcher. Everything here is I/O-free apart from the lazy configuration
//! load; the live-service and filesystem sides build on these types.

pub mod config;
pub mod dto;
pub mod error;
pub mod graph;
pub mod json;
pub mod kind;
pub mod layout;
pub mod name;
pub mod revision;
pub mod spec_format;

pub use config::Configuration;
pub use error::{CoreError, Result};
pub use kind::{Composite, DtoFamily, KindSpec, PolicyPlacement, ResourceKind};
pub use name::{ParentChain, ResourceKey, ResourceName};
pub use spec_format::{ApiSpecification, OpenApiFormat, OpenApiVersion};
