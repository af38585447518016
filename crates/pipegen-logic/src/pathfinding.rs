//! Randomized A* over the build grid.
//!
//! [`Pathfinder`] routes one path at a time between a seeded open set and a
//! single end cell. Two seeding modes exist:
//!
//! - **Fresh** - the open set holds only the pipe's start cell.
//! - **Junction** - the open set holds every committed straight and corner
//!   of the pipe's class; the search branches off existing pipe.
//!
//! Among all open nodes sharing the minimal total cost, the next node to
//! expand is chosen uniformly at random. This tie-break is what makes two
//! pipes with the same endpoints look different. Bag order is irrelevant to
//! the draw, so entries leave their bag by swap-remove.

use crate::coords::{Connections, Direction, GridCoordinate};
use crate::grid::{BuildState, GridDimensions, GridError, PipeGrid};
use crate::pieces::PipeType;
use crate::rng::LevelRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

// ── Open list ──────────────────────────────────────────────────────────────

/// Cost-ordered multiset of grid indices with removable entries.
///
/// Each grid index is in the list at most once; `slots` maps it to its
/// position in its cost bag so removal never scans.
#[derive(Debug, Default, Clone)]
pub struct OpenList {
    by_cost: BTreeMap<i32, Vec<usize>>,
    slots: HashMap<usize, usize>,
}

impl OpenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn insert(&mut self, cost: i32, index: usize) {
        let bag = self.by_cost.entry(cost).or_default();
        self.slots.insert(index, bag.len());
        bag.push(index);
    }

    /// Remove `index` from the bag at `cost`. Returns false if it was not
    /// there.
    pub fn remove(&mut self, cost: i32, index: usize) -> bool {
        let Some(&pos) = self.slots.get(&index) else {
            return false;
        };
        let Some(bag) = self.by_cost.get_mut(&cost) else {
            return false;
        };
        if bag.get(pos) != Some(&index) {
            return false;
        }
        detach(bag, pos, &mut self.slots);
        if bag.is_empty() {
            self.by_cost.remove(&cost);
        }
        true
    }

    /// Remove and return a uniformly random entry among those with the
    /// lowest cost.
    pub fn pop_random_least(&mut self, rng: &mut LevelRng) -> Option<usize> {
        let mut entry = self.by_cost.first_entry()?;
        let bag = entry.get_mut();
        let pick = rng.next_index(bag.len());
        let index = detach(bag, pick, &mut self.slots);
        if bag.is_empty() {
            entry.remove();
        }
        Some(index)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_cost.values().flatten().copied()
    }

    pub fn clear(&mut self) {
        self.by_cost.clear();
        self.slots.clear();
    }
}

/// Swap-remove the entry at `pos` and re-slot whatever moved into it.
fn detach(bag: &mut Vec<usize>, pos: usize, slots: &mut HashMap<usize, usize>) -> usize {
    let index = bag.swap_remove(pos);
    slots.remove(&index);
    if let Some(&moved) = bag.get(pos) {
        slots.insert(moved, pos);
    }
    index
}

// ── Search ─────────────────────────────────────────────────────────────────

/// How the open set was seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Fresh,
    Junction,
}

/// Result of one search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The end was reached; it is now typed `End` and fixed.
    Reached,
    /// The open set emptied without reaching the end.
    Exhausted,
    /// The abort flag was raised.
    Cancelled,
}

/// Reusable A* state plus the traversal costs of the current level.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    open: OpenList,
    closed: Vec<usize>,
    straight_cost: i32,
    corner_cost: i32,
}

impl Pathfinder {
    pub fn new(straight_cost: i32, corner_cost: i32) -> Self {
        Self {
            open: OpenList::new(),
            closed: Vec::new(),
            straight_cost,
            corner_cost,
        }
    }

    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }

    /// Heuristic distance to `to`.
    ///
    /// Manhattan distance in straight moves, plus one corner surcharge when
    /// more than one axis differs or the travel direction does not match the
    /// end's face. Not admissible; the bias toward square arrivals is what
    /// shapes the pipes.
    pub fn predicted_cost(
        &self,
        from: GridCoordinate,
        to: GridCoordinate,
        travel: Option<Direction>,
        end_side: Option<Direction>,
    ) -> i32 {
        let corner_modifier = if from.differing_axes(to) > 1 || travel != end_side {
            self.corner_cost - self.straight_cost
        } else {
            0
        };
        from.manhattan(to) * self.straight_cost + corner_modifier
    }

    /// Place a start cell and make it the only open node.
    pub fn seed_start(
        &mut self,
        grid: &mut PipeGrid,
        start: GridCoordinate,
        direction: Direction,
        end: GridCoordinate,
        pipe_class: u8,
    ) -> Result<(), GridError> {
        let end_side = grid.dims().side_of(end);
        let predicted = self.predicted_cost(start, end, Some(direction), end_side);
        let index = grid.index_of(start)?;

        let segment = grid.at_mut(index);
        segment.pipe_type = PipeType::Start;
        segment.pipe_class = pipe_class;
        segment.connections = direction.into();
        segment.fixed = true;
        segment.path_cost = 0;
        segment.predicted_cost = predicted;
        segment.build_state = BuildState::OpenList;

        self.open.insert(segment.total_cost(), index);
        Ok(())
    }

    /// Open every committed straight and corner of `pipe_class` as a
    /// zero-cost branch point toward `end`. Returns how many were opened.
    pub fn seed_branches(&mut self, grid: &mut PipeGrid, pipe_class: u8, end: GridCoordinate) -> usize {
        let end_side = grid.dims().side_of(end);
        let mut seeded = 0;

        for index in 0..grid.len() {
            let segment = grid.at(index);
            if !(segment.is_committed() && segment.pipe_class == pipe_class && segment.pipe_type.is_path_body()) {
                continue;
            }
            let predicted = self.predicted_cost(segment.location, end, end_side, end_side);

            let segment = grid.at_mut(index);
            segment.path_cost = 0;
            segment.predicted_cost = predicted;
            self.open.insert(segment.total_cost(), index);
            seeded += 1;
        }

        seeded
    }

    /// Run A* from the seeded open set to `end`.
    pub fn search(
        &mut self,
        grid: &mut PipeGrid,
        rng: &mut LevelRng,
        end: GridCoordinate,
        pipe_class: u8,
        mode: SearchMode,
        abort: &AtomicBool,
    ) -> Result<SearchOutcome, GridError> {
        let dims = *grid.dims();
        let end_side = dims.side_of(end);

        while !self.open.is_empty() {
            if abort.load(Ordering::Relaxed) {
                return Ok(SearchOutcome::Cancelled);
            }

            let Some(selected_index) = self.open.pop_random_least(rng) else {
                log::error!("No node pulled off a non-empty open list");
                return Ok(SearchOutcome::Exhausted);
            };

            let selected = grid.at_mut(selected_index);
            let filter = match selected.build_state {
                BuildState::OpenList => {
                    selected.build_state = BuildState::ClosedList;
                    self.closed.push(selected_index);

                    if selected.location == end {
                        selected.pipe_type = PipeType::End;
                        selected.fixed = true;
                        return Ok(SearchOutcome::Reached);
                    }
                    NeighborFilter::ExceptParent(selected.parent_direction)
                }
                BuildState::Committed if mode == SearchMode::Junction => match selected.pipe_type {
                    PipeType::Straight => NeighborFilter::Unused(selected.connections),
                    PipeType::Corner => NeighborFilter::OppositeExisting(selected.connections),
                    other => {
                        log::warn!("Unexpected committed {other} segment in open list at {}", selected.location);
                        continue;
                    }
                },
                state => {
                    log::error!(
                        "Unexpected segment in open list (type {}, state {state:?}) at {}",
                        selected.pipe_type,
                        selected.location
                    );
                    continue;
                }
            };

            let from = selected.location;
            let from_parent = selected.parent_direction;
            let from_path_cost = selected.path_cost;
            // Starts and committed pieces are always straight-compatible.
            let from_any_straight =
                selected.pipe_type == PipeType::Start || selected.build_state == BuildState::Committed;

            for direction in Direction::ALL {
                if !filter.allows(direction) {
                    continue;
                }
                let at = from.step(direction);
                if !is_routable(&dims, at, end) {
                    continue;
                }

                let parent_direction = direction.opposite();
                let straight = from_any_straight || Some(parent_direction) == from_parent;
                let path_cost = from_path_cost + if straight { self.straight_cost } else { self.corner_cost };
                let predicted_cost = self.predicted_cost(at, end, Some(direction), end_side);

                let neighbor_index = grid.index_of(at)?;
                let neighbor = grid.at_mut(neighbor_index);
                match neighbor.build_state {
                    BuildState::None => {
                        neighbor.pipe_class = pipe_class;
                        neighbor.parent_location = from;
                        neighbor.parent_direction = Some(parent_direction);
                        neighbor.path_cost = path_cost;
                        neighbor.predicted_cost = predicted_cost;
                        neighbor.build_state = BuildState::OpenList;
                        self.open.insert(neighbor.total_cost(), neighbor_index);
                    }
                    BuildState::OpenList if path_cost + predicted_cost < neighbor.total_cost() => {
                        if !self.open.remove(neighbor.total_cost(), neighbor_index) {
                            log::warn!("Failed to find {} in open list", neighbor.location);
                        }
                        neighbor.path_cost = path_cost;
                        neighbor.predicted_cost = predicted_cost;
                        neighbor.parent_location = from;
                        neighbor.parent_direction = Some(parent_direction);
                        self.open.insert(neighbor.total_cost(), neighbor_index);
                    }
                    _ => {}
                }
            }
        }

        Ok(SearchOutcome::Exhausted)
    }

    /// Clear every uncommitted segment this search touched and empty both
    /// lists. Committed segments keep their placement.
    pub fn reset(&mut self, grid: &mut PipeGrid) {
        for index in self.open.indices().chain(self.closed.iter().copied()) {
            let segment = grid.at_mut(index);
            if !segment.is_committed() {
                segment.clear();
            }
        }
        self.open.clear();
        self.closed.clear();
    }
}

/// Which expansion directions a popped node allows.
#[derive(Debug, Clone, Copy)]
enum NeighborFilter {
    /// Fresh path: anything but back toward the parent.
    ExceptParent(Option<Direction>),
    /// Committed straight: any direction not already connected.
    Unused(Connections),
    /// Committed corner: only directly opposite an existing connection,
    /// the one way to make a planar tee.
    OppositeExisting(Connections),
}

impl NeighborFilter {
    fn allows(self, direction: Direction) -> bool {
        match self {
            Self::ExceptParent(parent) => Some(direction) != parent,
            Self::Unused(existing) => !existing.contains(direction),
            Self::OppositeExisting(existing) => existing.contains(direction.opposite()),
        }
    }
}

/// Whether `at` may hold a path cell on the way to `end`.
pub fn is_routable(dims: &GridDimensions, at: GridCoordinate, end: GridCoordinate) -> bool {
    at == end || dims.is_interior(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(play: i32) -> PipeGrid {
        PipeGrid::allocate(GridDimensions::for_play_space(play).unwrap()).unwrap()
    }

    fn no_abort() -> AtomicBool {
        AtomicBool::new(false)
    }

    // ── Open list ──

    #[test]
    fn test_pop_returns_only_least_cost() {
        let mut rng = LevelRng::new(1);
        let mut open = OpenList::new();
        open.insert(30, 1);
        open.insert(10, 2);
        open.insert(10, 3);
        open.insert(20, 4);

        let first = open.pop_random_least(&mut rng).unwrap();
        let second = open.pop_random_least(&mut rng).unwrap();
        let mut pair = [first, second];
        pair.sort_unstable();
        assert_eq!(pair, [2, 3]);
        assert_eq!(open.pop_random_least(&mut rng), Some(4));
        assert_eq!(open.pop_random_least(&mut rng), Some(1));
        assert_eq!(open.pop_random_least(&mut rng), None);
        assert!(open.is_empty());
    }

    #[test]
    fn test_tie_break_reaches_every_tied_entry() {
        let mut seen = [false; 4];
        for seed in 0..64 {
            let mut rng = LevelRng::new(seed);
            let mut open = OpenList::new();
            for i in 0..4 {
                open.insert(5, i);
            }
            open.insert(6, 99);
            let picked = open.pop_random_least(&mut rng).unwrap();
            seen[picked] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_remove_exact_entry() {
        let mut open = OpenList::new();
        open.insert(7, 1);
        open.insert(7, 2);
        assert!(open.remove(7, 1));
        assert!(!open.remove(7, 1));
        assert!(!open.remove(8, 2));
        assert_eq!(open.len(), 1);
        assert_eq!(open.indices().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_remove_after_swap_finds_moved_entry() {
        let mut rng = LevelRng::new(4);
        let mut open = OpenList::new();
        for i in 10..14 {
            open.insert(3, i);
        }
        // 13 moves into 10's slot.
        assert!(open.remove(3, 10));
        assert!(open.remove(3, 13));
        assert!(open.remove(3, 11));
        assert_eq!(open.pop_random_least(&mut rng), Some(12));
        assert!(open.is_empty());
        assert!(!open.remove(3, 12));
    }

    // ── Heuristic ──

    #[test]
    fn test_predicted_cost_corner_modifier() {
        let pf = Pathfinder::new(10, 11);
        let a = GridCoordinate::new(0, 0, 0);
        let aligned = GridCoordinate::new(2, 0, 0);
        assert_eq!(pf.predicted_cost(a, aligned, Some(Direction::Front), Some(Direction::Front)), 20);
        assert_eq!(pf.predicted_cost(a, aligned, Some(Direction::Top), Some(Direction::Front)), 21);
        let diagonal = GridCoordinate::new(2, 1, 0);
        assert_eq!(pf.predicted_cost(a, diagonal, Some(Direction::Front), Some(Direction::Front)), 31);
    }

    // ── Search ──

    #[test]
    fn test_fresh_search_reaches_end() {
        let mut g = grid(3);
        let mut rng = LevelRng::new(4);
        let mut pf = Pathfinder::new(10, 11);
        let start = GridCoordinate::new(0, -2, 0);
        let end = GridCoordinate::new(1, 2, 1);

        pf.seed_start(&mut g, start, Direction::Right, end, 3).unwrap();
        let outcome = pf.search(&mut g, &mut rng, end, 3, SearchMode::Fresh, &no_abort()).unwrap();
        assert_eq!(outcome, SearchOutcome::Reached);

        let reached = g.segment(end).unwrap();
        assert_eq!(reached.pipe_type, PipeType::End);
        assert!(reached.fixed);
        assert_eq!(reached.pipe_class, 3);

        // Parent chain leads back to the start through the interior.
        let mut at = end;
        let mut steps = 0;
        while at != start {
            let s = g.segment(at).unwrap();
            let parent = s.parent_direction.unwrap();
            assert_eq!(s.parent_location, at.step(parent));
            at = s.parent_location;
            if at != start {
                assert!(g.dims().is_interior(at));
            }
            steps += 1;
            assert!(steps < 125);
        }
    }

    #[test]
    fn test_search_is_exhausted_when_walled_off() {
        let mut g = grid(3);
        let mut rng = LevelRng::new(4);
        let mut pf = Pathfinder::new(10, 11);
        let start = GridCoordinate::new(0, -2, 0);
        let end = GridCoordinate::new(1, 2, 1);

        // Wall off the first inward cell's whole interior layer at y = -1.
        for x in -1..=1 {
            for z in -1..=1 {
                let s = g.segment_mut(GridCoordinate::new(x, -1, z)).unwrap();
                s.pipe_type = PipeType::Block;
                s.build_state = BuildState::Committed;
            }
        }

        pf.seed_start(&mut g, start, Direction::Right, end, 1).unwrap();
        let outcome = pf.search(&mut g, &mut rng, end, 1, SearchMode::Fresh, &no_abort()).unwrap();
        assert_eq!(outcome, SearchOutcome::Exhausted);
    }

    #[test]
    fn test_abort_stops_search() {
        let mut g = grid(5);
        let mut rng = LevelRng::new(4);
        let mut pf = Pathfinder::new(10, 11);
        let start = GridCoordinate::new(0, -3, 0);
        let end = GridCoordinate::new(2, 3, 1);

        pf.seed_start(&mut g, start, Direction::Right, end, 1).unwrap();
        let abort = AtomicBool::new(true);
        let outcome = pf.search(&mut g, &mut rng, end, 1, SearchMode::Fresh, &abort).unwrap();
        assert_eq!(outcome, SearchOutcome::Cancelled);
    }

    #[test]
    fn test_reset_clears_search_but_keeps_committed() {
        let mut g = grid(3);
        let mut rng = LevelRng::new(2);
        let mut pf = Pathfinder::new(10, 11);
        let block = GridCoordinate::new(0, 0, 0);
        {
            let s = g.segment_mut(block).unwrap();
            s.pipe_type = PipeType::Block;
            s.build_state = BuildState::Committed;
        }
        let start = GridCoordinate::new(0, -2, 1);
        let end = GridCoordinate::new(1, 2, -1);
        pf.seed_start(&mut g, start, Direction::Right, end, 2).unwrap();
        pf.search(&mut g, &mut rng, end, 2, SearchMode::Fresh, &no_abort()).unwrap();
        assert!(pf.closed_len() > 0);

        pf.reset(&mut g);
        assert_eq!(pf.open_len(), 0);
        assert_eq!(pf.closed_len(), 0);
        for s in g.segments() {
            if s.location == block {
                assert_eq!(s.pipe_type, PipeType::Block);
            } else {
                assert_eq!(s.build_state, BuildState::None, "{}", s.location);
                assert_eq!(s.pipe_type, PipeType::None);
            }
        }
    }

    #[test]
    fn test_corner_branch_only_opposite_existing() {
        let existing = Connections::from(Direction::Left).with(Direction::Top);
        let filter = NeighborFilter::OppositeExisting(existing);
        let allowed: Vec<_> = Direction::ALL.into_iter().filter(|d| filter.allows(*d)).collect();
        assert_eq!(allowed, vec![Direction::Right, Direction::Bottom]);
    }

    #[test]
    fn test_straight_branch_any_unused() {
        let existing = Connections::from(Direction::Front).with(Direction::Back);
        let filter = NeighborFilter::Unused(existing);
        let allowed: Vec<_> = Direction::ALL.into_iter().filter(|d| filter.allows(*d)).collect();
        assert_eq!(allowed, vec![Direction::Right, Direction::Left, Direction::Top, Direction::Bottom]);
    }
}
