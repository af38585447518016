//! Difficulty progression: level number → generation options.
//!
//! Each option follows a [`GeneratorRule`]: a flat default for early
//! levels, then a stepped ramp from an initial value up to a cap.
//!
//! | Option | Default | From level | Ramp | Cap |
//! |--------|---------|-----------|------|-----|
//! | play space | 3 | 35 | 4, +1 every 80 | 8 |
//! | pipes | 2 | 35 | 3, +1 every 40 | 12 |
//! | junctions | 0 | 5 | 1, +1 every 40 | 11 |
//! | blocks | 0 | 15 | 2, +1 every 40 | 12 |
//! | fixed | 0 | 25 | 1, +1 every 40 | 11 |

use crate::constants::{DEFAULT_CORNER_COST, DEFAULT_STRAIGHT_COST, MAX_PIPES};
use crate::options::GenerateOptions;
use serde::{Deserialize, Serialize};

/// Stepped ramp for one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorRule {
    /// Value used before `initial_level`.
    pub default_value: i32,
    /// First level the ramp applies to.
    pub initial_level: i32,
    /// Value at `initial_level`.
    pub initial_value: i32,
    pub increase_by: i32,
    /// Levels per step.
    pub increase_every: i32,
    pub max_value: i32,
}

impl GeneratorRule {
    pub const fn new(
        default_value: i32,
        initial_level: i32,
        initial_value: i32,
        increase_by: i32,
        increase_every: i32,
        max_value: i32,
    ) -> Self {
        Self {
            default_value,
            initial_level,
            initial_value,
            increase_by,
            increase_every,
            max_value,
        }
    }

    /// A rule that always yields `value`.
    pub const fn constant(value: i32) -> Self {
        Self::new(value, i32::MAX, value, 0, 1, value)
    }

    pub fn compute(&self, level: i32) -> i32 {
        if level < self.initial_level {
            return self.default_value;
        }
        if self.initial_value >= self.max_value {
            return self.initial_value;
        }

        let every = self.increase_every.max(1);
        let steps = i64::from(self.increase_by) * (i64::from(level) - i64::from(self.initial_level)) / i64::from(every);
        let computed = i64::from(self.initial_value) + steps;
        computed.clamp(i64::from(self.initial_value), i64::from(self.max_value)) as i32
    }
}

/// Rules for every option plus the fixed traversal costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorRules {
    pub play_space_size: GeneratorRule,
    pub max_num_pipes: GeneratorRule,
    pub max_junctions: GeneratorRule,
    pub max_blocks: GeneratorRule,
    pub max_fixed: GeneratorRule,
    pub straight_cost: i32,
    pub corner_cost: i32,
}

impl Default for GeneratorRules {
    fn default() -> Self {
        Self {
            play_space_size: GeneratorRule::new(3, 35, 4, 1, 80, 8),
            max_num_pipes: GeneratorRule::new(2, 35, 3, 1, 40, MAX_PIPES),
            max_junctions: GeneratorRule::new(0, 5, 1, 1, 40, 11),
            max_blocks: GeneratorRule::new(0, 15, 2, 1, 40, 12),
            max_fixed: GeneratorRule::new(0, 25, 1, 1, 40, 11),
            straight_cost: DEFAULT_STRAIGHT_COST,
            corner_cost: DEFAULT_CORNER_COST,
        }
    }
}

impl GeneratorRules {
    /// Options for `level`, seeded by the level number. Levels below 1 are
    /// treated as level 1.
    pub fn options_for_level(&self, level: i32) -> GenerateOptions {
        self.options_with_seed(level, None)
    }

    /// Options for `level`'s difficulty, optionally seeded by something
    /// other than the level number.
    pub fn options_with_seed(&self, level: i32, seed_override: Option<i32>) -> GenerateOptions {
        let level = level.max(1);
        GenerateOptions {
            level: seed_override.unwrap_or(level),
            play_space_size: self.play_space_size.compute(level),
            max_num_pipes: self.max_num_pipes.compute(level),
            max_junctions: self.max_junctions.compute(level),
            max_fixed: self.max_fixed.compute(level),
            max_blocks: self.max_blocks.compute(level),
            straight_cost: self.straight_cost,
            corner_cost: self.corner_cost,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
