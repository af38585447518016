//! Start and end candidate lists.
//!
//! Both lists are shuffled on construction and consumed from the back, so an
//! empty list means every candidate has been tried.

use crate::coords::{Direction, GridCoordinate};
use crate::grid::GridDimensions;
use crate::rng::LevelRng;

/// Inclusive search box.
struct SearchBox {
    min: GridCoordinate,
    max: GridCoordinate,
}

impl SearchBox {
    fn for_each(&self, mut visit: impl FnMut(GridCoordinate)) {
        for x in self.min.x..=self.max.x {
            for y in self.min.y..=self.max.y {
                for z in self.min.z..=self.max.z {
                    visit(GridCoordinate::new(x, y, z));
                }
            }
        }
    }
}

/// Fill `out` with every start cell on `side`, shuffled.
///
/// The face coordinate is pinned to the outer shell and the other two axes
/// span the playable range, so starts never sit on a cube edge. The back
/// face is never a start face and yields an empty list.
pub fn build_start_candidates(
    dims: &GridDimensions,
    side: Direction,
    rng: &mut LevelRng,
    out: &mut Vec<GridCoordinate>,
) {
    out.clear();

    let inner_min = dims.side_min + 1;
    let inner_max = dims.side_max - 1;
    let mut search = SearchBox {
        min: GridCoordinate::new(inner_min, inner_min, inner_min),
        max: GridCoordinate::new(inner_max, inner_max, inner_max),
    };

    match side {
        Direction::Front => {
            search.min.x = dims.side_max;
            search.max.x = dims.side_max;
        }
        Direction::Left => {
            search.min.y = dims.side_min;
            search.max.y = dims.side_min;
        }
        Direction::Right => {
            search.min.y = dims.side_max;
            search.max.y = dims.side_max;
        }
        Direction::Top => {
            search.min.z = dims.side_max;
            search.max.z = dims.side_max;
        }
        Direction::Bottom => {
            search.min.z = dims.side_min;
            search.max.z = dims.side_min;
        }
        Direction::Back => return,
    }

    search.for_each(|at| out.push(at));
    rng.shuffle(out);
}

/// Fill `out` with every face cell in one half of the cube, shuffled.
///
/// `half` names the half along its own axis: `Front` keeps x in the upper
/// half, `Back` the lower half, and so on. The upper half begins at
/// `side % 2` and the lower half ends at -1. Edge and corner cells of the
/// cube are excluded, as is the back face.
pub fn build_end_candidates(
    dims: &GridDimensions,
    half: Direction,
    rng: &mut LevelRng,
    out: &mut Vec<GridCoordinate>,
) {
    out.clear();

    let upper_half_min = dims.side % 2;
    let lower_half_max = -1;

    let mut search = SearchBox {
        min: GridCoordinate::new(dims.side_min + 1, dims.side_min, dims.side_min),
        max: GridCoordinate::new(dims.side_max, dims.side_max, dims.side_max),
    };

    match half {
        Direction::Front => search.min.x = upper_half_min,
        Direction::Back => search.max.x = lower_half_max,
        Direction::Left => search.max.y = lower_half_max,
        Direction::Right => search.min.y = upper_half_min,
        Direction::Top => search.min.z = upper_half_min,
        Direction::Bottom => search.max.z = lower_half_max,
    }

    search.for_each(|at| {
        if dims.shell_axes(at) == 1 {
            out.push(at);
        }
    });
    rng.shuffle(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(play: i32) -> GridDimensions {
        GridDimensions::for_play_space(play).unwrap()
    }

    #[test]
    fn test_start_face_is_play_sized() {
        let d = dims(4);
        let mut rng = LevelRng::new(1);
        let mut out = Vec::new();
        for side in [
            Direction::Front,
            Direction::Left,
            Direction::Right,
            Direction::Top,
            Direction::Bottom,
        ] {
            build_start_candidates(&d, side, &mut rng, &mut out);
            assert_eq!(out.len(), 16, "{side:?}");
            for at in &out {
                assert_eq!(d.side_of(*at), Some(side));
                assert_eq!(d.shell_axes(*at), 1);
            }
        }
    }

    #[test]
    fn test_back_face_yields_no_starts() {
        let d = dims(3);
        let mut rng = LevelRng::new(1);
        let mut out = vec![GridCoordinate::ZERO];
        build_start_candidates(&d, Direction::Back, &mut rng, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_end_candidates_respect_half() {
        let d = dims(3);
        let mut rng = LevelRng::new(5);
        let mut out = Vec::new();

        build_end_candidates(&d, Direction::Front, &mut rng, &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|at| at.x >= 1));

        build_end_candidates(&d, Direction::Left, &mut rng, &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|at| at.y <= -1));

        build_end_candidates(&d, Direction::Top, &mut rng, &mut out);
        assert!(out.iter().all(|at| at.z >= 1));
    }

    #[test]
    fn test_end_candidates_are_face_cells_off_the_back() {
        let d = dims(5);
        let mut rng = LevelRng::new(8);
        let mut out = Vec::new();
        for half in Direction::ALL {
            build_end_candidates(&d, half, &mut rng, &mut out);
            for at in &out {
                assert_eq!(d.shell_axes(*at), 1);
                assert_ne!(d.side_of(*at), Some(Direction::Back));
                assert!(d.contains(*at));
            }
        }
    }

    #[test]
    fn test_even_grid_upper_half_starts_at_zero() {
        let d = dims(4);
        let mut rng = LevelRng::new(2);
        let mut out = Vec::new();
        build_end_candidates(&d, Direction::Right, &mut rng, &mut out);
        assert!(out.iter().any(|at| at.y == 0));
        assert!(out.iter().all(|at| at.y >= 0));
    }
}
