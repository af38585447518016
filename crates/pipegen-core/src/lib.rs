//! Pipegen Core - background pipe level generator
//!
//! Wraps the synchronous generator in `pipegen-logic` with a worker thread,
//! an externally pollable status, cooperative cancellation, and binary
//! snapshots of finished levels.
//!
//! # Example
//!
//! ```rust,no_run
//! use pipegen_core::prelude::*;
//!
//! let mut generator = LevelGenerator::new();
//! let options = GeneratorRules::default().options_for_level(1);
//! generator.generate_level(&options).unwrap();
//!
//! if generator.wait() == GeneratorStatus::Complete {
//!     println!("{} realized pipes", generator.realized_pipes().len());
//! }
//! ```

pub mod engine;
pub mod snapshot;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{GeneratorStatus, LevelGenerator, StartError};
    pub use crate::snapshot::{decode_level, encode_level, level_to_bytes, SnapshotError};
    pub use pipegen_logic::prelude::*;
}
