//! Per-pipe generation: start/end selection, retries, junctions, fixing.
//!
//! A [`PipeBuilder`] owns the grid, the level RNG, the pathfinder, and both
//! candidate buffers for one level. Pipes are built one at a time; every
//! search leaves the grid with only committed segments placed.

use crate::candidates::{build_end_candidates, build_start_candidates};
use crate::commit::{commit_pipe, CommitError};
use crate::constants::BLOCK_ATTEMPTS_PER_CELL;
use crate::coords::{Direction, GridCoordinate};
use crate::grid::{BuildSegment, BuildState, GridError, PipeGrid};
use crate::pathfinding::{Pathfinder, SearchMode, SearchOutcome};
use crate::pieces::{PipeSegment, PipeType};
use crate::rng::LevelRng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Build directive for one pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeRequest {
    pub pipe_class: u8,
    pub junctions: u32,
    pub fixed: u32,
}

impl PipeRequest {
    pub fn new(pipe_class: u8) -> Self {
        Self {
            pipe_class,
            junctions: 0,
            fixed: 0,
        }
    }
}

/// Why a pipe (and therefore the level) could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No start/end pair on any face produced a path.
    NoPath { pipe_class: u8 },
    /// Fewer junctions were built than requested.
    JunctionQuota {
        pipe_class: u8,
        requested: u32,
        built: u32,
    },
    /// Fewer segments could be fixed than requested.
    FixedQuota {
        pipe_class: u8,
        requested: u32,
        fixed: u32,
    },
    /// Blocks could not all be placed in the attempt budget.
    BlocksUnplaceable { requested: usize, placed: usize },
    /// The commit protocol found an inconsistency.
    Commit(CommitError),
    /// A grid lookup went out of bounds.
    Grid(GridError),
    /// The abort flag was raised.
    Cancelled,
    /// Finalized lists do not account for every cell.
    Inconsistent {
        cells: usize,
        none: usize,
        realized: usize,
        virtual_count: usize,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::NoPath { pipe_class } => {
                write!(f, "no start/end combination produced a path for pipe class {pipe_class}")
            }
            BuildError::JunctionQuota {
                pipe_class,
                requested,
                built,
            } => write!(f, "pipe class {pipe_class}: built {built} of {requested} junctions"),
            BuildError::FixedQuota {
                pipe_class,
                requested,
                fixed,
            } => write!(f, "pipe class {pipe_class}: fixed {fixed} of {requested} segments"),
            BuildError::BlocksUnplaceable { requested, placed } => {
                write!(f, "placed only {placed} of {requested} blocks")
            }
            BuildError::Commit(e) => write!(f, "commit failed: {e}"),
            BuildError::Grid(e) => write!(f, "grid error: {e}"),
            BuildError::Cancelled => write!(f, "generation cancelled"),
            BuildError::Inconsistent {
                cells,
                none,
                realized,
                virtual_count,
            } => write!(
                f,
                "unable to partition {cells} cells ({none} empty, {realized} realized, {virtual_count} virtual)"
            ),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Commit(e) => Some(e),
            BuildError::Grid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CommitError> for BuildError {
    fn from(e: CommitError) -> Self {
        BuildError::Commit(e)
    }
}

impl From<GridError> for BuildError {
    fn from(e: GridError) -> Self {
        BuildError::Grid(e)
    }
}

/// Realized (fixed) and virtual (movable) output lists.
pub type PartitionedSegments = (Vec<PipeSegment>, Vec<PipeSegment>);

/// Mutable generation state for one level.
#[derive(Debug, Clone)]
pub struct PipeBuilder {
    grid: PipeGrid,
    rng: LevelRng,
    search: Pathfinder,
    starts: Vec<GridCoordinate>,
    ends: Vec<GridCoordinate>,
}

impl PipeBuilder {
    /// Take ownership of a freshly allocated grid and reserve the candidate
    /// buffers.
    pub fn new(grid: PipeGrid, rng: LevelRng, straight_cost: i32, corner_cost: i32) -> Result<Self, GridError> {
        let face = grid.dims().face_cells();
        let mut starts = Vec::new();
        starts
            .try_reserve_exact(face)
            .map_err(|_| GridError::Allocation { cells: face })?;
        let mut ends = Vec::new();
        ends.try_reserve_exact(face * 6)
            .map_err(|_| GridError::Allocation { cells: face * 6 })?;

        Ok(Self {
            grid,
            rng,
            search: Pathfinder::new(straight_cost, corner_cost),
            starts,
            ends,
        })
    }

    pub fn grid(&self) -> &PipeGrid {
        &self.grid
    }

    pub fn rng_mut(&mut self) -> &mut LevelRng {
        &mut self.rng
    }

    // ── Blocks ──

    /// Place exactly `count` static obstacles in the playable volume.
    ///
    /// Blocks go down in mirrored pairs (a random interior cell and its
    /// reflection through the center) while two or more remain; a pair whose
    /// mirror is occupied or coincides with the first cell places only the
    /// first. Gives up after a bounded number of random draws.
    pub fn place_blocks(&mut self, count: usize) -> Result<usize, BuildError> {
        let dims = *self.grid.dims();
        let play = dims.play_space_size;
        let volume = usize::try_from(play).unwrap_or(0).pow(3);
        let budget = volume.saturating_mul(BLOCK_ATTEMPTS_PER_CELL);

        let mut placed = 0;
        let mut attempts = 0;

        while placed < count {
            if attempts >= budget {
                return Err(BuildError::BlocksUnplaceable {
                    requested: count,
                    placed,
                });
            }
            attempts += 1;

            let pair = count - placed >= 2;
            let offset = GridCoordinate::new(
                1 + self.rng.next_int(0, play),
                1 + self.rng.next_int(0, play),
                1 + self.rng.next_int(0, play),
            );
            let a = GridCoordinate::new(
                dims.side_min + offset.x,
                dims.side_min + offset.y,
                dims.side_min + offset.z,
            );
            if self.grid.segment(a)?.pipe_type != PipeType::None {
                continue;
            }

            if pair {
                let b = GridCoordinate::new(
                    dims.side_max - offset.x,
                    dims.side_max - offset.y,
                    dims.side_max - offset.z,
                );
                if b != a && self.grid.segment(b)?.pipe_type == PipeType::None {
                    place_block(self.grid.segment_mut(b)?);
                    placed += 1;
                }
            }

            place_block(self.grid.segment_mut(a)?);
            placed += 1;
        }

        log::debug!("Placed {placed} blocks in {attempts} attempts");
        Ok(placed)
    }

    // ── Pipes ──

    /// Build one complete pipe with its junctions and fixed segments.
    pub fn build_pipe(&mut self, request: &PipeRequest, abort: &AtomicBool) -> Result<(), BuildError> {
        let dims = *self.grid.dims();
        let play = dims.play_space_size;
        let face_count = Direction::ALL.len();

        let start_side = self.rng.next_index(face_count);
        let start_a = self.rng.next_int(0, play);
        let start_b = self.rng.next_int(0, play);
        let rotation = usize::try_from(start_a * play + start_b).unwrap_or(0);

        for side_search in 0..face_count {
            if abort.load(Ordering::Relaxed) {
                return Err(BuildError::Cancelled);
            }

            // The back face is right in front of the player.
            let side = Direction::ALL[(side_search + start_side) % face_count];
            if side == Direction::Back {
                continue;
            }

            build_start_candidates(&dims, side, &mut self.rng, &mut self.starts);
            let direction = side.opposite();
            let count = self.starts.len();

            for k in 0..count {
                if abort.load(Ordering::Relaxed) {
                    return Err(BuildError::Cancelled);
                }

                let start = self.starts[(k + rotation) % count];
                if self.grid.segment(start)?.pipe_type != PipeType::None {
                    continue;
                }

                if self.try_start(request, start, direction, abort)? {
                    log::debug!("Pipe class {} runs from {start}", request.pipe_class);
                    self.build_junctions(request, abort)?;
                    self.fix_segments(request)?;
                    return Ok(());
                }
            }
        }

        Err(BuildError::NoPath {
            pipe_class: request.pipe_class,
        })
    }

    /// Try every end for one start. Returns true once a path is committed.
    pub fn try_start(
        &mut self,
        request: &PipeRequest,
        start: GridCoordinate,
        direction: Direction,
        abort: &AtomicBool,
    ) -> Result<bool, BuildError> {
        let dims = *self.grid.dims();
        build_end_candidates(&dims, direction, &mut self.rng, &mut self.ends);

        // A committed pipe right inside the start can't be overwritten.
        if self.grid.segment(start.step(direction))?.is_committed() {
            return Ok(false);
        }

        while let Some(end) = self.ends.pop() {
            if abort.load(Ordering::Relaxed) {
                self.search.reset(&mut self.grid);
                return Err(BuildError::Cancelled);
            }

            // Perfectly straight pipes are visually degenerate.
            if start.differing_axes(end) < 2 {
                continue;
            }
            if self.grid.segment(end)?.build_state != BuildState::None {
                continue;
            }

            self.search.reset(&mut self.grid);
            self.search
                .seed_start(&mut self.grid, start, direction, end, request.pipe_class)?;

            if self.run_and_commit(end, request.pipe_class, SearchMode::Fresh, abort)? {
                return Ok(true);
            }
        }

        self.search.reset(&mut self.grid);
        Ok(false)
    }

    /// Build the requested junctions, drawing ends from what the main path
    /// left in the end list.
    pub fn build_junctions(&mut self, request: &PipeRequest, abort: &AtomicBool) -> Result<(), BuildError> {
        let mut built = 0;
        while built < request.junctions && !self.ends.is_empty() {
            if !self.build_junction(request, abort)? {
                break;
            }
            built += 1;
        }

        if built < request.junctions {
            return Err(BuildError::JunctionQuota {
                pipe_class: request.pipe_class,
                requested: request.junctions,
                built,
            });
        }
        Ok(())
    }

    /// Branch one new end off the pipe's committed body.
    pub fn build_junction(&mut self, request: &PipeRequest, abort: &AtomicBool) -> Result<bool, BuildError> {
        while let Some(end) = self.ends.pop() {
            if abort.load(Ordering::Relaxed) {
                self.search.reset(&mut self.grid);
                return Err(BuildError::Cancelled);
            }
            if self.grid.segment(end)?.build_state != BuildState::None {
                continue;
            }

            self.search.reset(&mut self.grid);
            let seeded = self.search.seed_branches(&mut self.grid, request.pipe_class, end);
            if seeded == 0 {
                log::warn!("Pipe class {} has nothing to branch from", request.pipe_class);
                self.search.reset(&mut self.grid);
                return Ok(false);
            }

            if self.run_and_commit(end, request.pipe_class, SearchMode::Junction, abort)? {
                return Ok(true);
            }
        }

        self.search.reset(&mut self.grid);
        Ok(false)
    }

    /// Search from the seeded open set and commit on success. The search
    /// state is always reset before returning.
    fn run_and_commit(
        &mut self,
        end: GridCoordinate,
        pipe_class: u8,
        mode: SearchMode,
        abort: &AtomicBool,
    ) -> Result<bool, BuildError> {
        let outcome = self
            .search
            .search(&mut self.grid, &mut self.rng, end, pipe_class, mode, abort);

        let result = match outcome {
            Ok(SearchOutcome::Reached) => commit_pipe(&mut self.grid, pipe_class, end)
                .map(|_| true)
                .map_err(BuildError::from),
            Ok(SearchOutcome::Exhausted) => Ok(false),
            Ok(SearchOutcome::Cancelled) => Err(BuildError::Cancelled),
            Err(e) => Err(BuildError::from(e)),
        };

        self.search.reset(&mut self.grid);
        result
    }

    /// Lock `request.fixed` segments of the pipe, never two that connect to
    /// each other.
    pub fn fix_segments(&mut self, request: &PipeRequest) -> Result<(), BuildError> {
        if request.fixed == 0 {
            return Ok(());
        }

        let mut candidates: Vec<usize> = self
            .grid
            .segments()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.pipe_type != PipeType::None && s.pipe_class == request.pipe_class && !s.fixed)
            .map(|(i, _)| i)
            .collect();
        self.rng.shuffle(&mut candidates);

        let mut fixed = 0;
        for index in candidates {
            let segment = self.grid.at(index);
            if segment.fixed {
                continue;
            }

            let mut valid = true;
            for direction in segment.connections.iter() {
                if self.grid.segment(segment.location.step(direction))?.fixed {
                    valid = false;
                    break;
                }
            }

            if valid {
                self.grid.at_mut(index).fixed = true;
                fixed += 1;
                if fixed >= request.fixed {
                    return Ok(());
                }
            }
        }

        Err(BuildError::FixedQuota {
            pipe_class: request.pipe_class,
            requested: request.fixed,
            fixed,
        })
    }

    // ── Finalize ──

    /// Split the grid into realized (fixed) and virtual (movable) segments.
    ///
    /// The virtual list is stable-sorted by type ordinal so its order says
    /// nothing about generation order.
    pub fn finalize(&mut self) -> Result<PartitionedSegments, BuildError> {
        self.search.reset(&mut self.grid);
        self.grid.reset_uncommitted();

        let mut none = 0;
        let mut realized = Vec::new();
        let mut virtual_pipes = Vec::new();

        for segment in self.grid.segments() {
            if segment.pipe_type == PipeType::None {
                none += 1;
            } else if segment.fixed {
                realized.push(segment.to_output());
            } else {
                virtual_pipes.push(segment.to_output());
            }
        }

        let cells = self.grid.len();
        if cells != none + realized.len() + virtual_pipes.len() {
            return Err(BuildError::Inconsistent {
                cells,
                none,
                realized: realized.len(),
                virtual_count: virtual_pipes.len(),
            });
        }

        virtual_pipes.sort_by_key(|s| s.pipe_type.ordinal());
        Ok((realized, virtual_pipes))
    }

    /// Drop everything placed so far, committed segments included.
    pub fn clear(&mut self) {
        self.search.reset(&mut self.grid);
        self.grid.reset_all();
        self.starts.clear();
        self.ends.clear();
    }
}

fn place_block(segment: &mut BuildSegment) {
    segment.pipe_type = PipeType::Block;
    segment.fixed = true;
    segment.build_state = BuildState::Committed;
}
