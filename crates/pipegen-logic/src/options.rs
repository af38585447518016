//! Generation options and their validation.

use crate::constants::{MAX_PIPES, MIN_PLAY_SPACE_SIZE};
use crate::grid::{GridDimensions, GridError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inputs for one level. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Level number; also the RNG seed.
    pub level: i32,
    /// Side of the playable cube (≥ 3).
    pub play_space_size: i32,
    /// Pipes to build (1..=12).
    pub max_num_pipes: i32,
    /// Junctions spread over the pipes (≥ 0).
    pub max_junctions: i32,
    /// Extra fixed segments spread over the pipes (≥ 0).
    pub max_fixed: i32,
    /// Block obstacles in the playable volume (≥ 0).
    pub max_blocks: i32,
    /// A* cost of a straight move (> 0).
    pub straight_cost: i32,
    /// A* cost of a turn (> 0).
    pub corner_cost: i32,
}

/// Input rejected before generation starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// Play space smaller than 3.
    PlaySpaceTooSmall(i32),
    /// Pipe count outside 1..=12.
    PipeCountOutOfRange(i32),
    /// Negative junction count.
    NegativeJunctions(i32),
    /// Negative fixed count.
    NegativeFixed(i32),
    /// Negative block count.
    NegativeBlocks(i32),
    /// A traversal cost is zero or negative.
    NonPositiveCost { straight: i32, corner: i32 },
    /// Grid volume does not fit in the index type.
    GridOverflow(i32),
    /// Worst-case path cost does not fit in the cost type.
    CostOverflow { straight: i32, corner: i32 },
    /// More blocks than playable cells.
    TooManyBlocks { requested: i32, capacity: usize },
    /// Grid or candidate storage could not be reserved.
    Allocation(GridError),
    /// Blocks could not be placed within the attempt budget.
    BlocksUnplaceable { requested: usize, placed: usize },
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::PlaySpaceTooSmall(n) => {
                write!(f, "play space size must be {MIN_PLAY_SPACE_SIZE} or greater, {n} was specified")
            }
            OptionsError::PipeCountOutOfRange(n) => {
                write!(f, "pipe count must be between 1 and {MAX_PIPES} (inclusive), {n} was specified")
            }
            OptionsError::NegativeJunctions(n) => write!(f, "junction count must not be negative, {n} was specified"),
            OptionsError::NegativeFixed(n) => write!(f, "fixed count must not be negative, {n} was specified"),
            OptionsError::NegativeBlocks(n) => write!(f, "block count must not be negative, {n} was specified"),
            OptionsError::NonPositiveCost { straight, corner } => write!(
                f,
                "traversal cost of straight pieces ({straight}) and corners ({corner}) must be greater than 0"
            ),
            OptionsError::GridOverflow(n) => {
                write!(f, "numeric overflow computing grid volume for play space size {n}")
            }
            OptionsError::CostOverflow { straight, corner } => {
                write!(f, "traversal costs {straight}/{corner} overflow the path cost range")
            }
            OptionsError::TooManyBlocks { requested, capacity } => {
                write!(f, "{requested} blocks requested, but only {capacity} playable cells exist")
            }
            OptionsError::Allocation(e) => write!(f, "{e}"),
            OptionsError::BlocksUnplaceable { requested, placed } => {
                write!(f, "unable to place blocks: {placed} of {requested} placed")
            }
        }
    }
}

impl std::error::Error for OptionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptionsError::Allocation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for OptionsError {
    fn from(e: GridError) -> Self {
        OptionsError::Allocation(e)
    }
}

/// Validate options, returning all errors found.
pub fn validate_options(options: &GenerateOptions) -> Vec<OptionsError> {
    let mut errors = Vec::new();

    if options.play_space_size < MIN_PLAY_SPACE_SIZE {
        errors.push(OptionsError::PlaySpaceTooSmall(options.play_space_size));
    }
    if !(1..=MAX_PIPES).contains(&options.max_num_pipes) {
        errors.push(OptionsError::PipeCountOutOfRange(options.max_num_pipes));
    }
    if options.max_junctions < 0 {
        errors.push(OptionsError::NegativeJunctions(options.max_junctions));
    }
    if options.max_fixed < 0 {
        errors.push(OptionsError::NegativeFixed(options.max_fixed));
    }
    if options.max_blocks < 0 {
        errors.push(OptionsError::NegativeBlocks(options.max_blocks));
    }

    let costs_positive = options.straight_cost > 0 && options.corner_cost > 0;
    if !costs_positive {
        errors.push(OptionsError::NonPositiveCost {
            straight: options.straight_cost,
            corner: options.corner_cost,
        });
    }

    if options.play_space_size >= MIN_PLAY_SPACE_SIZE {
        match GridDimensions::for_play_space(options.play_space_size) {
            None => errors.push(OptionsError::GridOverflow(options.play_space_size)),
            Some(dims) => {
                // A path visits each cell at most once; the heuristic adds
                // at most one more cube of straight moves.
                let worst = options.straight_cost.max(options.corner_cost);
                let fits = i32::try_from(dims.cell_count())
                    .ok()
                    .and_then(|cells| cells.checked_mul(2))
                    .and_then(|cells| cells.checked_mul(worst))
                    .is_some();
                if costs_positive && !fits {
                    errors.push(OptionsError::CostOverflow {
                        straight: options.straight_cost,
                        corner: options.corner_cost,
                    });
                }

                let capacity = usize::try_from(options.play_space_size).unwrap_or(0).pow(3);
                if usize::try_from(options.max_blocks).is_ok_and(|n| n > capacity) {
                    errors.push(OptionsError::TooManyBlocks {
                        requested: options.max_blocks,
                        capacity,
                    });
                }
            }
        }
    }

    errors
}
