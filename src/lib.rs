//! Time capsule manager library
//!
//! This library provides functionality for sealing, listing, opening, and
//! deleting time capsules, persisted either to a local JSON file or to a
//! remote capsule service.

mod capsule;
mod cli;
mod errors;
mod lifecycle;
mod storage;
mod store;
mod types;
mod config;

// Re-export key components
pub use capsule::*;
pub use config::*;
pub use cli::*;
pub use errors::*;
pub use lifecycle::*;
pub use storage::*;
pub use store::*;
pub use types::*;
