//! Pure level-generation logic for pipe puzzles.
//!
//! This crate fills a 3D grid with non-overlapping pipes using randomized
//! A* and a two-phase commit. Everything here is synchronous and
//! deterministic for a given level seed; threading, cancellation plumbing,
//! and output ownership live in `pipegen-core`.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`builder`] | Per-pipe start/end retries, junctions, fixed segments, blocks |
//! | [`candidates`] | Shuffled start-face and end-half candidate lists |
//! | [`commit`] | Two-phase parent-chain commit with rollback |
//! | [`constants`] | Pipe classes, default costs, grid limits |
//! | [`coords`] | Grid coordinates, directions, connection bit-sets |
//! | [`grid`] | Flat 3D segment store with checked lookups |
//! | [`level`] | Option planning, the build run, output partitioning |
//! | [`options`] | Generation options and validation |
//! | [`pathfinding`] | Randomized tie-break A* (fresh and junction modes) |
//! | [`pieces`] | Piece types, shape validity, output segments |
//! | [`rng`] | Seeded ChaCha RNG with salt mixing |
//! | [`rules`] | Level-number difficulty progression |

pub mod builder;
pub mod candidates;
pub mod commit;
pub mod constants;
pub mod coords;
pub mod grid;
pub mod level;
pub mod options;
pub mod pathfinding;
pub mod pieces;
pub mod rng;
pub mod rules;

pub mod prelude {
    pub use crate::builder::{BuildError, PipeRequest};
    pub use crate::coords::{Connections, Direction, GridCoordinate};
    pub use crate::level::{generate_level, plan_level, GeneratedLevel, LevelError, LevelPlan};
    pub use crate::options::{validate_options, GenerateOptions, OptionsError};
    pub use crate::pieces::{PipeSegment, PipeType};
    pub use crate::rules::{GeneratorRule, GeneratorRules};
}
