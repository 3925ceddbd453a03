//! Publisher for apimsync
//!
//! Parses a snapshot of the service directory (live tree or git commit) into
//! a resource set with predecessor/successor relationships, then applies it
//! to the live service: dependency-ordered parallel puts, dependent-ordered
//! parallel deletes, optionally scoped to what one commit changed.

pub mod error;
pub mod fileops;
pub mod orchestrator;
pub mod parser;
pub mod relationships;

pub use error::{PublishError, Result};
pub use fileops::{ChangeStatus, EmptyFs, FileOps, GitFs, LiveFs};
pub use orchestrator::{PublishSources, Publisher};
pub use relationships::{Relationships, ResourceSet};
