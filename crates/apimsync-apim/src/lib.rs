//! APIM REST integration for apimsync
//!
//! The four wire-facing concerns: the management [`client`], the SKU
//! support [`sku`] oracle, API [`revisions`] semantics, and [`specs`]
//! transfer. Everything above this crate reasons in terms of
//! `apimsync-core` keys and DTO values.

pub mod client;
pub mod error;
pub mod revisions;
pub mod sku;
pub mod specs;

pub use client::ApimClient;
pub use error::{ApimError, Result};
pub use revisions::ApiWriter;
pub use sku::SkuOracle;
