//! Grid coordinates, axis directions, and connection sets.
//!
//! The grid uses a right-handed frame as seen from the player:
//!
//! | Direction | Bit | Offset |
//! |-----------|-----|--------|
//! | `Right` | 0x01 | +y |
//! | `Front` | 0x02 | +x |
//! | `Left` | 0x04 | −y |
//! | `Back` | 0x08 | −x |
//! | `Top` | 0x10 | +z |
//! | `Bottom` | 0x20 | −z |
//!
//! The back face sits directly in front of the player, which is why starts
//! and ends are never placed there.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// An integer cell position. Value type; no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridCoordinate {
    pub const ZERO: Self = Self::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighboring cell one step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        self + direction.offset()
    }

    /// How many of the three axes differ between `self` and `other`.
    pub fn differing_axes(self, other: Self) -> usize {
        usize::from(self.x != other.x) + usize::from(self.y != other.y) + usize::from(self.z != other.z)
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }
}

impl Add for GridCoordinate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ {}, {}, {} }}", self.x, self.y, self.z)
    }
}

/// One of the six axis-aligned directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Right = 0x01,
    Front = 0x02,
    Left = 0x04,
    Back = 0x08,
    Top = 0x10,
    Bottom = 0x20,
}

impl Direction {
    /// Canonical expansion order. Search results depend on it, so it is
    /// part of the seed-reproducibility contract.
    pub const ALL: [Self; 6] = [
        Self::Right,
        Self::Back,
        Self::Left,
        Self::Front,
        Self::Top,
        Self::Bottom,
    ];

    pub const fn bit(self) -> u8 {
        self as u8
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Front => Self::Back,
            Self::Left => Self::Right,
            Self::Back => Self::Front,
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }

    /// Unit offset of a single step in this direction.
    pub const fn offset(self) -> GridCoordinate {
        match self {
            Self::Right => GridCoordinate::new(0, 1, 0),
            Self::Front => GridCoordinate::new(1, 0, 0),
            Self::Left => GridCoordinate::new(0, -1, 0),
            Self::Back => GridCoordinate::new(-1, 0, 0),
            Self::Top => GridCoordinate::new(0, 0, 1),
            Self::Bottom => GridCoordinate::new(0, 0, -1),
        }
    }
}

/// A set of up to six directions a segment connects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Connections(u8);

impl Connections {
    pub const NONE: Self = Self(0);

    const MASK: u8 = 0x3F;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// A copy of this set with `direction` added.
    #[must_use]
    pub const fn with(self, direction: Direction) -> Self {
        Self(self.0 | direction.bit())
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Directions in the set, in [`Direction::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Number of axes on which both opposite directions are present.
    pub fn opposite_pairs(self) -> usize {
        [Direction::Front, Direction::Right, Direction::Top]
            .into_iter()
            .filter(|d| self.contains(*d) && self.contains(d.opposite()))
            .count()
    }
}

impl From<Direction> for Connections {
    fn from(direction: Direction) -> Self {
        Self(direction.bit())
    }
}
