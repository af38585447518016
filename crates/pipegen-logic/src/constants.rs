//! Generator constants - pipe classes, traversal costs, grid limits.
//!
//! Plain integer constants shared by the generator, the engine, and the
//! headless harness.

/// Number of pipe classes, including the unassigned default class.
pub const PIPE_CLASS_COUNT: u8 = 13;

/// Class carried by segments that belong to no pipe (empty cells, blocks).
pub const DEFAULT_PIPE_CLASS: u8 = 0;

/// Largest number of pipes a single level may request.
pub const MAX_PIPES: i32 = PIPE_CLASS_COUNT as i32 - 1;

/// Smallest playable volume side. Anything smaller leaves no room to turn.
pub const MIN_PLAY_SPACE_SIZE: i32 = 3;

/// Default A* cost of continuing straight.
pub const DEFAULT_STRAIGHT_COST: i32 = 10;

/// Default A* cost of turning a corner.
pub const DEFAULT_CORNER_COST: i32 = 11;

/// Outputs discarded right after seeding the level RNG.
pub const RNG_WARMUP_DRAWS: usize = 100;

/// Random placement attempts allowed per interior cell before block
/// placement gives up.
pub const BLOCK_ATTEMPTS_PER_CELL: usize = 16;
