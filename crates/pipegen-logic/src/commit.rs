//! Two-phase commit of a found path.
//!
//! Phase one walks the parent chain from the end back to the start (or to
//! the committed pipe a junction branches from), works out each segment's
//! final type and connections, and records them as staged changes while
//! marking the walked segments `Committing`. Nothing else is written.
//!
//! Phase two runs only after the whole chain validates: every staged change
//! is applied and its segment becomes `Committed`. If the walk fails, the
//! `Committing` marks are rolled back and the grid is exactly as the search
//! left it.

use crate::coords::{Connections, Direction, GridCoordinate};
use crate::grid::{BuildState, PipeGrid};
use crate::pieces::PipeType;
use std::fmt;

/// A protocol violation found while walking a path. Each one is a logic
/// bug, not an expected search outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// The commit was started on a segment that is not an end.
    NotAnEnd(GridCoordinate),
    /// The parent chain left the grid.
    OffGrid(GridCoordinate),
    /// A segment on the chain belongs to another pipe.
    ClassMismatch {
        at: GridCoordinate,
        expected: u8,
        found: u8,
    },
    /// A segment on the chain was never closed by the search.
    UnexpectedState { at: GridCoordinate, state: BuildState },
    /// A segment on the chain has a type the walk cannot handle.
    UnexpectedType { at: GridCoordinate, pipe_type: PipeType },
    /// The start's connection does not point at its child.
    StartMismatch {
        at: GridCoordinate,
        expected: Option<Direction>,
        found: Connections,
    },
    /// A chain segment has no parent direction.
    MissingParent(GridCoordinate),
    /// A parent location disagrees with the parent direction.
    BrokenParentLink(GridCoordinate),
    /// The chain revisited a segment already staged in this walk.
    DoubleCommit(GridCoordinate),
    /// Adding the branch connection would not form a planar tee.
    InvalidJunction {
        at: GridCoordinate,
        connections: Connections,
    },
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::NotAnEnd(at) => write!(f, "commit started at {at}, which is not an end"),
            CommitError::OffGrid(at) => write!(f, "ran off the grid at {at} walking parent chain"),
            CommitError::ClassMismatch { at, expected, found } => {
                write!(f, "segment {at} is of class {found}, pipe is of class {expected}")
            }
            CommitError::UnexpectedState { at, state } => {
                write!(f, "found segment {at} in state {state:?} walking parent chain")
            }
            CommitError::UnexpectedType { at, pipe_type } => {
                write!(f, "found unexpected {pipe_type} segment {at} walking parent chain")
            }
            CommitError::StartMismatch { at, expected, found } => write!(
                f,
                "start {at} connects {:#04x}, but its child lies {expected:?}",
                found.bits()
            ),
            CommitError::MissingParent(at) => write!(f, "segment {at} has no parent"),
            CommitError::BrokenParentLink(at) => {
                write!(f, "segment {at} has a parent location that disagrees with its direction")
            }
            CommitError::DoubleCommit(at) => write!(f, "segment {at} is already committing"),
            CommitError::InvalidJunction { at, connections } => write!(
                f,
                "branching at {at} would give invalid junction {:#04x}",
                connections.bits()
            ),
        }
    }
}

impl std::error::Error for CommitError {}

/// What a successful commit wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    /// Segments that became committed, the merged junction included.
    pub segments: usize,
    /// The existing segment promoted to a junction, for branch commits.
    pub junction: Option<GridCoordinate>,
}

#[derive(Debug, Clone, Copy)]
struct StagedChange {
    index: usize,
    pipe_type: PipeType,
    connections: Connections,
}

/// Commit the path ending at `end` for `pipe_class`. On error the grid is
/// left as the search produced it.
pub fn commit_pipe(grid: &mut PipeGrid, pipe_class: u8, end: GridCoordinate) -> Result<CommitSummary, CommitError> {
    let mut staged = Vec::new();

    match walk_parent_chain(grid, pipe_class, end, &mut staged) {
        Ok(junction) => {
            for change in &staged {
                let segment = grid.at_mut(change.index);
                segment.pipe_type = change.pipe_type;
                segment.connections = change.connections;
                segment.build_state = BuildState::Committed;
            }
            Ok(CommitSummary {
                segments: staged.len(),
                junction,
            })
        }
        Err(err) => {
            log::error!("Commit of pipe class {pipe_class} failed: {err}");
            for change in &staged {
                let segment = grid.at_mut(change.index);
                if segment.build_state == BuildState::Committing {
                    segment.build_state = BuildState::ClosedList;
                }
            }
            Err(err)
        }
    }
}

/// Phase one. Returns the junction location when the chain ends on an
/// existing pipe.
fn walk_parent_chain(
    grid: &mut PipeGrid,
    pipe_class: u8,
    end: GridCoordinate,
    staged: &mut Vec<StagedChange>,
) -> Result<Option<GridCoordinate>, CommitError> {
    let end_index = grid.dims().index_of(end).ok_or(CommitError::OffGrid(end))?;
    let end_type = grid.at(end_index).pipe_type;
    if end_type != PipeType::End {
        return Err(CommitError::NotAnEnd(end));
    }

    let mut at = end;
    let mut from_child: Option<Direction> = None;

    loop {
        let index = grid.dims().index_of(at).ok_or(CommitError::OffGrid(at))?;
        let current = grid.at(index);
        let child_direction = from_child.map(Direction::opposite);

        if current.pipe_class != pipe_class {
            return Err(CommitError::ClassMismatch {
                at,
                expected: pipe_class,
                found: current.pipe_class,
            });
        }

        match current.build_state {
            BuildState::None | BuildState::OpenList => {
                return Err(CommitError::UnexpectedState {
                    at,
                    state: current.build_state,
                });
            }
            BuildState::Committing => return Err(CommitError::DoubleCommit(at)),
            BuildState::Committed => {
                let Some(child) = child_direction.filter(|_| current.pipe_type.is_path_body()) else {
                    return Err(CommitError::UnexpectedType {
                        at,
                        pipe_type: current.pipe_type,
                    });
                };
                let merged = current.connections.with(child);
                if !PipeType::Junction.accepts(merged) {
                    return Err(CommitError::InvalidJunction { at, connections: merged });
                }
                staged.push(StagedChange {
                    index,
                    pipe_type: PipeType::Junction,
                    connections: merged,
                });
                return Ok(Some(at));
            }
            BuildState::ClosedList => {}
        }

        let parent = current.parent_direction;
        let (pipe_type, connections, done) = match current.pipe_type {
            PipeType::Start => {
                if child_direction.map(Connections::from) != Some(current.connections) {
                    return Err(CommitError::StartMismatch {
                        at,
                        expected: child_direction,
                        found: current.connections,
                    });
                }
                (PipeType::Start, current.connections, true)
            }
            PipeType::End => {
                let parent = parent.ok_or(CommitError::MissingParent(at))?;
                (PipeType::End, Connections::from(parent), false)
            }
            PipeType::None => {
                let parent = parent.ok_or(CommitError::MissingParent(at))?;
                let child = child_direction.ok_or(CommitError::MissingParent(at))?;
                let pipe_type = if from_child == Some(parent) {
                    PipeType::Straight
                } else {
                    PipeType::Corner
                };
                (pipe_type, Connections::from(parent).with(child), false)
            }
            other => {
                return Err(CommitError::UnexpectedType { at, pipe_type: other });
            }
        };

        let parent_location = current.parent_location;
        grid.at_mut(index).build_state = BuildState::Committing;
        staged.push(StagedChange {
            index,
            pipe_type,
            connections,
        });

        if done {
            return Ok(None);
        }

        // Start and End already returned or carry a parent here.
        let parent = parent.ok_or(CommitError::MissingParent(at))?;
        let next = at.step(parent);
        if parent_location != next {
            return Err(CommitError::BrokenParentLink(at));
        }
        from_child = Some(parent);
        at = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDimensions;

    fn grid() -> PipeGrid {
        PipeGrid::allocate(GridDimensions::for_play_space(3).unwrap()).unwrap()
    }

    fn place(g: &mut PipeGrid, at: GridCoordinate, pipe_type: PipeType, parent: Option<Direction>, class: u8) {
        let s = g.segment_mut(at).unwrap();
        s.pipe_type = pipe_type;
        s.pipe_class = class;
        s.build_state = BuildState::ClosedList;
        s.parent_direction = parent;
        if let Some(p) = parent {
            s.parent_location = at.step(p);
        }
    }

    const S: GridCoordinate = GridCoordinate::new(0, -2, 0);
    const A: GridCoordinate = GridCoordinate::new(0, -1, 0);
    const B: GridCoordinate = GridCoordinate::new(0, 0, 0);
    const C: GridCoordinate = GridCoordinate::new(0, 0, 1);
    const E: GridCoordinate = GridCoordinate::new(0, 0, 2);

    /// Start on the left face, right, right, up, up to the top face.
    fn lay_path(g: &mut PipeGrid, class: u8) {
        place(g, S, PipeType::Start, None, class);
        g.segment_mut(S).unwrap().connections = Direction::Right.into();
        place(g, A, PipeType::None, Some(Direction::Left), class);
        place(g, B, PipeType::None, Some(Direction::Left), class);
        place(g, C, PipeType::None, Some(Direction::Bottom), class);
        place(g, E, PipeType::End, Some(Direction::Bottom), class);
    }

    fn conns(dirs: &[Direction]) -> Connections {
        dirs.iter().fold(Connections::NONE, |acc, d| acc.with(*d))
    }

    #[test]
    fn test_commit_classifies_chain() {
        use Direction::*;
        let mut g = grid();
        lay_path(&mut g, 4);

        let summary = commit_pipe(&mut g, 4, E).unwrap();
        assert_eq!(summary.segments, 5);
        assert_eq!(summary.junction, None);

        let seg = |at| g.segment(at).unwrap().clone();
        assert_eq!(seg(E).connections, conns(&[Bottom]));
        assert_eq!(seg(C).pipe_type, PipeType::Straight);
        assert_eq!(seg(C).connections, conns(&[Bottom, Top]));
        assert_eq!(seg(B).pipe_type, PipeType::Corner);
        assert_eq!(seg(B).connections, conns(&[Left, Top]));
        assert_eq!(seg(A).pipe_type, PipeType::Straight);
        assert_eq!(seg(A).connections, conns(&[Left, Right]));
        for at in [S, A, B, C, E] {
            assert_eq!(seg(at).build_state, BuildState::Committed);
            assert!(seg(at).pipe_type.accepts(seg(at).connections));
        }
    }

    #[test]
    fn test_class_mismatch_leaves_no_partial_commit() {
        let mut g = grid();
        lay_path(&mut g, 4);
        g.segment_mut(B).unwrap().pipe_class = 5;

        let err = commit_pipe(&mut g, 4, E).unwrap_err();
        assert_eq!(
            err,
            CommitError::ClassMismatch {
                at: B,
                expected: 4,
                found: 5
            }
        );
        for at in [S, A, B, C, E] {
            let s = g.segment(at).unwrap();
            assert_eq!(s.build_state, BuildState::ClosedList, "{at}");
        }
        assert_eq!(g.segment(C).unwrap().pipe_type, PipeType::None);
        assert!(g.segment(E).unwrap().connections.is_empty());
    }

    #[test]
    fn test_open_segment_on_chain_is_rejected() {
        let mut g = grid();
        lay_path(&mut g, 1);
        g.segment_mut(A).unwrap().build_state = BuildState::OpenList;
        assert!(matches!(
            commit_pipe(&mut g, 1, E),
            Err(CommitError::UnexpectedState { at, .. }) if at == A
        ));
    }

    #[test]
    fn test_start_direction_must_match_child() {
        let mut g = grid();
        lay_path(&mut g, 1);
        g.segment_mut(S).unwrap().connections = Direction::Top.into();
        assert!(matches!(commit_pipe(&mut g, 1, E), Err(CommitError::StartMismatch { .. })));
    }

    #[test]
    fn test_not_an_end() {
        let mut g = grid();
        lay_path(&mut g, 1);
        assert_eq!(commit_pipe(&mut g, 1, C), Err(CommitError::NotAnEnd(C)));
    }

    #[test]
    fn test_broken_parent_link() {
        let mut g = grid();
        lay_path(&mut g, 1);
        g.segment_mut(C).unwrap().parent_location = A;
        assert_eq!(commit_pipe(&mut g, 1, E), Err(CommitError::BrokenParentLink(C)));
    }

    #[test]
    fn test_branch_merges_into_tee() {
        use Direction::*;
        let mut g = grid();
        lay_path(&mut g, 2);
        commit_pipe(&mut g, 2, E).unwrap();

        // Branch off the straight at A, heading front to the front face.
        let d = GridCoordinate::new(1, -1, 0);
        let end = GridCoordinate::new(2, -1, 0);
        place(&mut g, d, PipeType::None, Some(Back), 2);
        place(&mut g, end, PipeType::End, Some(Back), 2);

        let summary = commit_pipe(&mut g, 2, end).unwrap();
        assert_eq!(summary.junction, Some(A));
        assert_eq!(summary.segments, 3);
        let junction = g.segment(A).unwrap();
        assert_eq!(junction.pipe_type, PipeType::Junction);
        assert_eq!(junction.connections, conns(&[Left, Right, Front]));
        assert_eq!(g.segment(d).unwrap().pipe_type, PipeType::Straight);
    }

    #[test]
    fn test_branch_off_corner_side_is_invalid() {
        use Direction::*;
        let mut g = grid();
        lay_path(&mut g, 2);
        commit_pipe(&mut g, 2, E).unwrap();

        // B is a Left/Top corner; branching front gives three perpendicular
        // directions.
        let end = GridCoordinate::new(1, 0, 0);
        place(&mut g, end, PipeType::End, Some(Back), 2);
        let err = commit_pipe(&mut g, 2, end).unwrap_err();
        assert!(matches!(err, CommitError::InvalidJunction { at, .. } if at == B));
        assert_eq!(g.segment(B).unwrap().pipe_type, PipeType::Corner);
        assert_eq!(g.segment(end).unwrap().build_state, BuildState::ClosedList);
    }

    #[test]
    fn test_parent_cycle_is_double_commit() {
        let mut g = grid();
        lay_path(&mut g, 3);
        // A points back up to B instead of out to the start.
        place(&mut g, A, PipeType::None, Some(Direction::Right), 3);

        assert_eq!(commit_pipe(&mut g, 3, E), Err(CommitError::DoubleCommit(B)));
        for at in [A, B, C, E] {
            let s = g.segment(at).unwrap();
            assert_eq!(s.build_state, BuildState::ClosedList, "{at}");
        }
        assert_eq!(g.segment(B).unwrap().pipe_type, PipeType::None);
    }

    #[test]
    fn test_parent_off_the_grid() {
        let mut g = grid();
        lay_path(&mut g, 3);
        place(&mut g, E, PipeType::End, Some(Direction::Top), 3);

        let beyond = GridCoordinate::new(0, 0, 3);
        assert_eq!(commit_pipe(&mut g, 3, E), Err(CommitError::OffGrid(beyond)));
        let end = g.segment(E).unwrap();
        assert_eq!(end.build_state, BuildState::ClosedList);
        assert!(end.connections.is_empty());
    }

    #[test]
    fn test_end_without_parent() {
        let mut g = grid();
        lay_path(&mut g, 1);
        g.segment_mut(E).unwrap().parent_direction = None;
        assert_eq!(commit_pipe(&mut g, 1, E), Err(CommitError::MissingParent(E)));
        assert_eq!(g.segment(E).unwrap().build_state, BuildState::ClosedList);
    }

    #[test]
    fn test_chain_ending_on_committed_start() {
        let mut g = grid();
        lay_path(&mut g, 2);
        commit_pipe(&mut g, 2, E).unwrap();

        // A branch end whose parent is the committed start itself.
        let end = GridCoordinate::new(1, -2, 0);
        place(&mut g, end, PipeType::End, Some(Direction::Back), 2);

        assert_eq!(
            commit_pipe(&mut g, 2, end),
            Err(CommitError::UnexpectedType {
                at: S,
                pipe_type: PipeType::Start
            })
        );
        let start = g.segment(S).unwrap();
        assert_eq!(start.build_state, BuildState::Committed);
        assert_eq!(start.connections, Connections::from(Direction::Right));
        assert_eq!(g.segment(end).unwrap().build_state, BuildState::ClosedList);
    }
}
