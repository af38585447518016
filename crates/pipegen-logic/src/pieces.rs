//! Piece types and the finalized segments handed to the outside world.

use crate::coords::{Connections, GridCoordinate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What occupies a grid cell. The discriminant is the ordinal used to sort
/// the virtual output list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PipeType {
    #[default]
    None = 0,
    Start = 1,
    End = 2,
    Straight = 4,
    Corner = 8,
    Junction = 16,
    Block = 32,
}

impl PipeType {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Number of connections a segment of this type must carry.
    pub const fn connection_count(self) -> u32 {
        match self {
            Self::None | Self::Block => 0,
            Self::Start | Self::End => 1,
            Self::Straight | Self::Corner => 2,
            Self::Junction => 3,
        }
    }

    /// Whether `connections` is a legal shape for this type.
    ///
    /// Straights need one opposite pair, corners two perpendicular
    /// directions, junctions one opposite pair plus a perpendicular branch.
    pub fn accepts(self, connections: Connections) -> bool {
        if connections.count() != self.connection_count() {
            return false;
        }
        match self {
            Self::Straight | Self::Junction => connections.opposite_pairs() == 1,
            Self::Corner => connections.opposite_pairs() == 0,
            _ => true,
        }
    }

    /// Types laid down by the pathfinder that a junction may branch from.
    pub const fn is_path_body(self) -> bool {
        matches!(self, Self::Straight | Self::Corner)
    }
}

impl fmt::Display for PipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Start => "Start",
            Self::End => "End",
            Self::Straight => "Straight",
            Self::Corner => "Corner",
            Self::Junction => "Junction",
            Self::Block => "Block",
        };
        f.write_str(name)
    }
}

/// A finalized cell as exposed in the realized/virtual output lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipeSegment {
    pub pipe_type: PipeType,
    pub pipe_class: u8,
    pub location: GridCoordinate,
    pub connections: Connections,
}
