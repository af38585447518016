//! Flat 3D grid of build segments.
//!
//! The grid is a cube of `play_space_size + 2` cells per side centered on the
//! origin. The outer shell holds pipe starts and ends; the inner
//! `play_space_size`³ region is the playable volume. Cells are stored in a
//! single `Vec` addressed as
//! `(z - min) * side² + (x - min) * side + (y - min)`.
//!
//! Lookups outside the cube return [`GridError::OutOfBounds`] and log a
//! warning. Nothing is ever added to or removed from the grid after
//! allocation; segments are only mutated in place.

use crate::constants::DEFAULT_PIPE_CLASS;
use crate::coords::{Connections, Direction, GridCoordinate};
use crate::pieces::{PipeSegment, PipeType};
use std::fmt;

/// Pathfinding lifecycle of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildState {
    #[default]
    None,
    OpenList,
    ClosedList,
    Committing,
    Committed,
}

/// One grid cell's mutable placement and search record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSegment {
    pub location: GridCoordinate,
    pub pipe_type: PipeType,
    pub pipe_class: u8,
    pub connections: Connections,
    pub fixed: bool,
    pub build_state: BuildState,
    pub parent_location: GridCoordinate,
    pub parent_direction: Option<Direction>,
    pub path_cost: i32,
    pub predicted_cost: i32,
}

impl BuildSegment {
    pub fn empty(location: GridCoordinate) -> Self {
        Self {
            location,
            pipe_type: PipeType::None,
            pipe_class: DEFAULT_PIPE_CLASS,
            connections: Connections::NONE,
            fixed: false,
            build_state: BuildState::None,
            parent_location: GridCoordinate::ZERO,
            parent_direction: None,
            path_cost: 0,
            predicted_cost: 0,
        }
    }

    /// A* priority key.
    pub fn total_cost(&self) -> i32 {
        self.path_cost.saturating_add(self.predicted_cost)
    }

    /// Restore the empty default, keeping the location.
    pub fn clear(&mut self) {
        *self = Self::empty(self.location);
    }

    pub fn is_committed(&self) -> bool {
        self.build_state == BuildState::Committed
    }

    pub fn to_output(&self) -> PipeSegment {
        PipeSegment {
            pipe_type: self.pipe_type,
            pipe_class: self.pipe_class,
            location: self.location,
            connections: self.connections,
        }
    }
}

/// Grid lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Coordinate lies outside `[side_min, side_max]` on some axis.
    OutOfBounds(GridCoordinate),
    /// The segment storage could not be reserved.
    Allocation { cells: usize },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::OutOfBounds(at) => write!(f, "invalid segment location {at}"),
            GridError::Allocation { cells } => {
                write!(f, "unable to allocate segment grid ({cells} cells)")
            }
        }
    }
}

impl std::error::Error for GridError {}

/// Derived sizes for a given play-space size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    pub play_space_size: i32,
    pub side: i32,
    pub side_min: i32,
    pub side_max: i32,
    side_squared: i32,
    cell_count: usize,
}

impl GridDimensions {
    /// Compute the grid geometry, or `None` if the volume overflows.
    pub fn for_play_space(play_space_size: i32) -> Option<Self> {
        if play_space_size < 1 {
            return None;
        }
        let side = play_space_size.checked_add(2)?;
        let side_squared = side.checked_mul(side)?;
        let cube = side_squared.checked_mul(side)?;
        let side_min = -(side / 2);
        Some(Self {
            play_space_size,
            side,
            side_min,
            side_max: side_min + side - 1,
            side_squared,
            cell_count: usize::try_from(cube).ok()?,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Number of cells on one face of the cube.
    pub fn face_cells(&self) -> usize {
        (self.side_squared as usize).max(1)
    }

    /// Inside the cube, shell included.
    pub fn contains(&self, at: GridCoordinate) -> bool {
        let range = self.side_min..=self.side_max;
        range.contains(&at.x) && range.contains(&at.y) && range.contains(&at.z)
    }

    /// Strictly inside the shell, i.e. in the playable volume.
    pub fn is_interior(&self, at: GridCoordinate) -> bool {
        let inner = (self.side_min + 1)..self.side_max;
        inner.contains(&at.x) && inner.contains(&at.y) && inner.contains(&at.z)
    }

    /// How many axes of `at` lie on the shell. 1 means a face cell, 2 an
    /// edge, 3 a corner of the cube.
    pub fn shell_axes(&self, at: GridCoordinate) -> usize {
        let on = |v: i32| usize::from(v == self.side_min || v == self.side_max);
        on(at.x) + on(at.y) + on(at.z)
    }

    /// Which face `at` lies on, checked as Back, Front, Left, Right, Bottom,
    /// Top in that order.
    pub fn side_of(&self, at: GridCoordinate) -> Option<Direction> {
        if at.x == self.side_min {
            Some(Direction::Back)
        } else if at.x == self.side_max {
            Some(Direction::Front)
        } else if at.y == self.side_min {
            Some(Direction::Left)
        } else if at.y == self.side_max {
            Some(Direction::Right)
        } else if at.z == self.side_min {
            Some(Direction::Bottom)
        } else if at.z == self.side_max {
            Some(Direction::Top)
        } else {
            None
        }
    }

    pub fn index_of(&self, at: GridCoordinate) -> Option<usize> {
        if !self.contains(at) {
            return None;
        }
        let index = (at.z - self.side_min) * self.side_squared
            + (at.x - self.side_min) * self.side
            + (at.y - self.side_min);
        usize::try_from(index).ok()
    }
}

/// The segment store for one level.
#[derive(Debug, Clone)]
pub struct PipeGrid {
    dims: GridDimensions,
    segments: Vec<BuildSegment>,
}

impl PipeGrid {
    /// Allocate every cell of the cube with its location filled in.
    pub fn allocate(dims: GridDimensions) -> Result<Self, GridError> {
        let cells = dims.cell_count();
        let mut segments = Vec::new();
        segments
            .try_reserve_exact(cells)
            .map_err(|_| GridError::Allocation { cells })?;

        for z in dims.side_min..=dims.side_max {
            for x in dims.side_min..=dims.side_max {
                for y in dims.side_min..=dims.side_max {
                    segments.push(BuildSegment::empty(GridCoordinate::new(x, y, z)));
                }
            }
        }

        Ok(Self { dims, segments })
    }

    pub fn dims(&self) -> &GridDimensions {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn index_of(&self, at: GridCoordinate) -> Result<usize, GridError> {
        self.dims.index_of(at).ok_or_else(|| {
            log::warn!("Invalid segment location specified {at}");
            GridError::OutOfBounds(at)
        })
    }

    pub fn segment(&self, at: GridCoordinate) -> Result<&BuildSegment, GridError> {
        let index = self.index_of(at)?;
        Ok(&self.segments[index])
    }

    pub fn segment_mut(&mut self, at: GridCoordinate) -> Result<&mut BuildSegment, GridError> {
        let index = self.index_of(at)?;
        Ok(&mut self.segments[index])
    }

    /// Segment at an index previously returned by [`PipeGrid::index_of`].
    pub fn at(&self, index: usize) -> &BuildSegment {
        &self.segments[index]
    }

    pub fn at_mut(&mut self, index: usize) -> &mut BuildSegment {
        &mut self.segments[index]
    }

    pub fn segments(&self) -> &[BuildSegment] {
        &self.segments
    }

    /// Clear every segment that is not yet committed.
    pub fn reset_uncommitted(&mut self) {
        for segment in self.segments.iter_mut().filter(|s| !s.is_committed()) {
            segment.clear();
        }
    }

    /// Clear every segment, committed ones included.
    pub fn reset_all(&mut self) {
        for segment in &mut self.segments {
            segment.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(play: i32) -> PipeGrid {
        PipeGrid::allocate(GridDimensions::for_play_space(play).unwrap()).unwrap()
    }

    #[test]
    fn test_dimensions_odd_and_even() {
        let d = GridDimensions::for_play_space(3).unwrap();
        assert_eq!((d.side, d.side_min, d.side_max), (5, -2, 2));
        assert_eq!(d.cell_count(), 125);

        let d = GridDimensions::for_play_space(4).unwrap();
        assert_eq!((d.side, d.side_min, d.side_max), (6, -3, 2));
        assert_eq!(d.cell_count(), 216);
    }

    #[test]
    fn test_dimensions_overflow_is_rejected() {
        assert!(GridDimensions::for_play_space(i32::MAX).is_none());
        assert!(GridDimensions::for_play_space(2_000).is_none());
        assert!(GridDimensions::for_play_space(0).is_none());
    }

    #[test]
    fn test_every_cell_knows_its_location() {
        let g = grid(3);
        assert_eq!(g.len(), 125);
        for (i, s) in g.segments().iter().enumerate() {
            assert_eq!(g.index_of(s.location).unwrap(), i);
        }
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let g = grid(3);
        let outside = GridCoordinate::new(3, 0, 0);
        assert_eq!(g.segment(outside).unwrap_err(), GridError::OutOfBounds(outside));
        // Would alias a valid flat index without per-axis checks.
        assert!(g.segment(GridCoordinate::new(-2, -3, 0)).is_err());
    }

    #[test]
    fn test_side_of_checks_in_order() {
        let d = GridDimensions::for_play_space(3).unwrap();
        assert_eq!(d.side_of(GridCoordinate::new(-2, 0, 0)), Some(Direction::Back));
        assert_eq!(d.side_of(GridCoordinate::new(2, 2, 0)), Some(Direction::Front));
        assert_eq!(d.side_of(GridCoordinate::new(0, -2, 2)), Some(Direction::Left));
        assert_eq!(d.side_of(GridCoordinate::new(0, 0, 2)), Some(Direction::Top));
        assert_eq!(d.side_of(GridCoordinate::new(0, 0, 0)), None);
    }

    #[test]
    fn test_interior_and_shell_axes() {
        let d = GridDimensions::for_play_space(3).unwrap();
        assert!(d.is_interior(GridCoordinate::new(1, -1, 0)));
        assert!(!d.is_interior(GridCoordinate::new(2, 0, 0)));
        assert_eq!(d.shell_axes(GridCoordinate::new(2, 0, 0)), 1);
        assert_eq!(d.shell_axes(GridCoordinate::new(2, -2, 0)), 2);
        assert_eq!(d.shell_axes(GridCoordinate::new(2, -2, 2)), 3);
    }

    #[test]
    fn test_resets_preserve_locations() {
        let mut g = grid(3);
        let a = GridCoordinate::new(0, 0, 0);
        let b = GridCoordinate::new(1, 0, 0);
        {
            let s = g.segment_mut(a).unwrap();
            s.pipe_type = PipeType::Block;
            s.build_state = BuildState::Committed;
        }
        {
            let s = g.segment_mut(b).unwrap();
            s.build_state = BuildState::ClosedList;
            s.path_cost = 30;
        }

        g.reset_uncommitted();
        assert_eq!(g.segment(a).unwrap().pipe_type, PipeType::Block);
        assert_eq!(*g.segment(b).unwrap(), BuildSegment::empty(b));

        g.reset_all();
        assert_eq!(*g.segment(a).unwrap(), BuildSegment::empty(a));
    }
}
