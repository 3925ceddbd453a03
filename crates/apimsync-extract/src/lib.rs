//! Extractor for apimsync
//!
//! Walks the live service top-down and writes the canonical tree:
//! information files, policy XML bodies, and API specification documents.

pub mod error;
pub mod walker;
pub mod writer;

pub use error::{ExtractError, Result};
pub use walker::Extractor;
