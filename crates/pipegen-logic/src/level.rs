//! Level planning and the synchronous generation entry point.
//!
//! [`plan_level`] does everything that can fail synchronously: validation,
//! grid allocation, class shuffling, quota distribution, and block
//! placement. The resulting [`LevelPlan`] is then run to completion (on the
//! caller's thread or a worker) with [`LevelPlan::run`].

use crate::builder::{BuildError, PipeBuilder, PipeRequest};
use crate::constants::PIPE_CLASS_COUNT;
use crate::grid::{GridDimensions, PipeGrid};
use crate::options::{validate_options, GenerateOptions, OptionsError};
use crate::pieces::{PipeSegment, PipeType};
use crate::rng::LevelRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A finished level, as handed to the interactive layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLevel {
    pub level: i32,
    pub play_space_size: i32,
    /// Segments placed and locked.
    pub realized: Vec<PipeSegment>,
    /// Movable segments, sorted by type ordinal.
    pub virtual_pipes: Vec<PipeSegment>,
}

impl GeneratedLevel {
    /// Every placed segment, realized first.
    pub fn segments(&self) -> impl Iterator<Item = &PipeSegment> {
        self.realized.iter().chain(self.virtual_pipes.iter())
    }

    /// Cells in the whole grid, shell included.
    pub fn cell_count(&self) -> usize {
        GridDimensions::for_play_space(self.play_space_size).map_or(0, |d| d.cell_count())
    }

    /// Distinct pipe classes present, ascending.
    pub fn pipe_classes(&self) -> Vec<u8> {
        let mut classes: Vec<u8> = self
            .segments()
            .filter(|s| s.pipe_type != PipeType::Block)
            .map(|s| s.pipe_class)
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    pub fn count_of(&self, pipe_type: PipeType) -> usize {
        self.segments().filter(|s| s.pipe_type == pipe_type).count()
    }
}

/// A validated, allocated level waiting to be built.
#[derive(Debug, Clone)]
pub struct LevelPlan {
    level: i32,
    play_space_size: i32,
    requests: Vec<PipeRequest>,
    builder: PipeBuilder,
}

/// Validate `options` and prepare everything the build needs.
pub fn plan_level(options: &GenerateOptions) -> Result<LevelPlan, OptionsError> {
    let errors = validate_options(options);
    if let Some(first) = errors.first() {
        for e in &errors {
            log::error!("Invalid generation options: {e}");
        }
        return Err(first.clone());
    }

    let dims = GridDimensions::for_play_space(options.play_space_size)
        .ok_or(OptionsError::GridOverflow(options.play_space_size))?;
    let grid = PipeGrid::allocate(dims)?;
    let mut builder = PipeBuilder::new(
        grid,
        LevelRng::new(options.level),
        options.straight_cost,
        options.corner_cost,
    )?;

    // One spare class beyond the pipe count keeps the styling varied and
    // hides build order.
    let pipe_count = usize::try_from(options.max_num_pipes).unwrap_or(0);
    let source_classes = (options.max_num_pipes + 1).min(i32::from(PIPE_CLASS_COUNT) - 1);
    let mut classes: Vec<u8> = (1..=source_classes).filter_map(|c| u8::try_from(c).ok()).collect();
    builder.rng_mut().shuffle(&mut classes);

    let mut requests: Vec<PipeRequest> = classes.iter().rev().take(pipe_count).map(|c| PipeRequest::new(*c)).collect();

    for _ in 0..options.max_junctions {
        let pick = builder.rng_mut().next_index(requests.len());
        requests[pick].junctions += 1;
    }
    for _ in 0..options.max_fixed {
        let pick = builder.rng_mut().next_index(requests.len());
        requests[pick].fixed += 1;
    }

    let blocks = usize::try_from(options.max_blocks).unwrap_or(0);
    builder.place_blocks(blocks).map_err(|e| match e {
        BuildError::BlocksUnplaceable { requested, placed } => {
            OptionsError::BlocksUnplaceable { requested, placed }
        }
        BuildError::Grid(g) => OptionsError::Allocation(g),
        other => {
            log::error!("Unexpected failure placing blocks: {other}");
            OptionsError::BlocksUnplaceable {
                requested: blocks,
                placed: 0,
            }
        }
    })?;

    log::info!(
        "Planned level {} ({}³, {} pipes, {} junctions, {} fixed, {} blocks)",
        options.level,
        options.play_space_size,
        requests.len(),
        options.max_junctions,
        options.max_fixed,
        blocks
    );

    Ok(LevelPlan {
        level: options.level,
        play_space_size: options.play_space_size,
        requests,
        builder,
    })
}

impl LevelPlan {
    pub fn requests(&self) -> &[PipeRequest] {
        &self.requests
    }

    pub fn grid(&self) -> &PipeGrid {
        self.builder.grid()
    }

    /// Build every pipe in order and partition the grid.
    ///
    /// `abort` is polled between pipes and inside the search loops. On any
    /// failure, cancellation included, the grid is cleared and no output is
    /// produced.
    pub fn run(self, abort: &AtomicBool) -> Result<GeneratedLevel, BuildError> {
        let Self {
            level,
            play_space_size,
            requests,
            mut builder,
        } = self;

        let built = requests.iter().try_for_each(|request| {
            if abort.load(Ordering::Relaxed) {
                return Err(BuildError::Cancelled);
            }
            builder.build_pipe(request, abort)
        });

        let result = built.and_then(|()| {
            if abort.load(Ordering::Relaxed) {
                return Err(BuildError::Cancelled);
            }
            builder.finalize()
        });

        match result {
            Ok((realized, virtual_pipes)) => {
                log::info!(
                    "Level {level} complete: {} realized, {} virtual",
                    realized.len(),
                    virtual_pipes.len()
                );
                Ok(GeneratedLevel {
                    level,
                    play_space_size,
                    realized,
                    virtual_pipes,
                })
            }
            Err(e) => {
                builder.clear();
                if e == BuildError::Cancelled {
                    log::debug!("Level {level} cancelled");
                } else {
                    log::warn!("Level {level} failed: {e}");
                }
                Err(e)
            }
        }
    }
}

/// Either stage of a synchronous generation failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelError {
    Options(OptionsError),
    Build(BuildError),
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::Options(e) => write!(f, "invalid options: {e}"),
            LevelError::Build(e) => write!(f, "generation failed: {e}"),
        }
    }
}

impl std::error::Error for LevelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LevelError::Options(e) => Some(e),
            LevelError::Build(e) => Some(e),
        }
    }
}

impl From<OptionsError> for LevelError {
    fn from(e: OptionsError) -> Self {
        LevelError::Options(e)
    }
}

impl From<BuildError> for LevelError {
    fn from(e: BuildError) -> Self {
        LevelError::Build(e)
    }
}

/// Plan and build a level on the calling thread.
pub fn generate_level(options: &GenerateOptions) -> Result<GeneratedLevel, LevelError> {
    let plan = plan_level(options)?;
    Ok(plan.run(&AtomicBool::new(false))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(level: i32) -> GenerateOptions {
        GenerateOptions {
            level,
            play_space_size: 4,
            max_num_pipes: 3,
            max_junctions: 2,
            max_fixed: 2,
            max_blocks: 2,
            straight_cost: 10,
            corner_cost: 11,
        }
    }

    #[test]
    fn test_plan_distributes_quotas() {
        let plan = plan_level(&options(7)).unwrap();
        let requests = plan.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests.iter().map(|r| r.junctions).sum::<u32>(), 2);
        assert_eq!(requests.iter().map(|r| r.fixed).sum::<u32>(), 2);

        let mut classes: Vec<_> = requests.iter().map(|r| r.pipe_class).collect();
        classes.sort_unstable();
        classes.dedup();
        assert_eq!(classes.len(), 3);
        assert!(classes.iter().all(|c| (1..=4).contains(c)));

        let blocks = plan
            .grid()
            .segments()
            .iter()
            .filter(|s| s.pipe_type == PipeType::Block)
            .count();
        assert_eq!(blocks, 2);
    }

    #[test]
    fn test_twelve_pipes_use_twelve_classes() {
        let opts = GenerateOptions {
            max_num_pipes: 12,
            play_space_size: 6,
            ..options(1)
        };
        let plan = plan_level(&opts).unwrap();
        let mut classes: Vec<_> = plan.requests().iter().map(|r| r.pipe_class).collect();
        classes.sort_unstable();
        assert_eq!(classes, (1..=12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_invalid_options_do_not_plan() {
        let opts = GenerateOptions {
            play_space_size: 2,
            ..options(1)
        };
        assert_eq!(plan_level(&opts).unwrap_err(), OptionsError::PlaySpaceTooSmall(2));
    }

    #[test]
    fn test_cancelled_run_produces_nothing() {
        let plan = plan_level(&options(3)).unwrap();
        let abort = AtomicBool::new(true);
        assert_eq!(plan.run(&abort), Err(BuildError::Cancelled));
    }

    #[test]
    fn test_generated_level_helpers() {
        let level = generate_level(&GenerateOptions {
            max_junctions: 0,
            max_fixed: 0,
            max_blocks: 0,
            max_num_pipes: 1,
            ..options(1)
        })
        .unwrap();
        assert_eq!(level.cell_count(), 216);
        assert_eq!(level.pipe_classes().len(), 1);
        assert_eq!(level.count_of(PipeType::Start), 1);
        assert_eq!(level.count_of(PipeType::End), 1);
    }
}
