//! Declarative configuration supplied by setup code.
//!
//! Every struct deserialises from TOML (or any serde format) with defaults
//! matching the stock game: two 8x8 boards of unit-sized cells one cell apart,
//! a quarter-second merge lock and generously sized unit pools.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Capacity, PoolError, TemplateId, UnitType};

/// Geometry shared by both boards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Number of rows on each board.
    pub rows: u32,
    /// Number of columns on each board.
    pub columns: u32,
    /// Side length of a square cell in world units.
    pub cell_size: f32,
    /// Distance separating the two boards along the row axis.
    pub gap: f32,
    /// World-space anchor the front board starts at.
    pub anchor: [f32; 3],
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            columns: 8,
            cell_size: 1.0,
            gap: 1.0,
            anchor: [0.0; 3],
        }
    }
}

/// Sizing policy applied to a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolDefaults {
    /// Number of inactive instances created up front.
    pub initial_size: usize,
    /// Maximum number of instances; negative means unlimited.
    pub max_size: i64,
    /// Whether the pool may grow past `max_size` when empty.
    pub auto_expand: bool,
}

impl PoolDefaults {
    /// Capacity described by `max_size`.
    #[must_use]
    pub fn capacity(&self) -> Capacity {
        Capacity::from_signed(self.max_size)
    }
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            initial_size: 8,
            max_size: -1,
            auto_expand: true,
        }
    }
}

/// Explicit pool declaration for one template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Template the pool recycles.
    pub template: TemplateId,
    /// Sizing policy of the pool.
    #[serde(flatten)]
    pub policy: PoolDefaults,
}

/// Upgrade chain of a single unit family.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Family the chain belongs to.
    pub unit_type: UnitType,
    /// Templates by level; entry `i` is the template of level `i + 1`.
    pub levels: Vec<TemplateId>,
}

/// Complete configuration consumed by the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Geometry of both boards.
    pub board: BoardConfig,
    /// Template used for tile visuals.
    pub tile_template: TemplateId,
    /// Cooldown applied to freshly merged units, in milliseconds.
    pub merge_lock_ms: u64,
    /// Policy for pools created on demand.
    pub pool_defaults: PoolDefaults,
    /// Policy for the pools of every template named by an upgrade chain.
    pub unit_pool: PoolDefaults,
    /// Pools declared explicitly; these override `unit_pool`.
    pub pools: Vec<PoolConfig>,
    /// Upgrade chains by unit family.
    pub upgrades: Vec<UpgradeConfig>,
}

impl GameConfig {
    /// Cooldown applied to freshly merged units.
    #[must_use]
    pub fn merge_lock(&self) -> Duration {
        Duration::from_millis(self.merge_lock_ms)
    }

    /// Checks the configuration for values the world cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board.rows == 0 || self.board.columns == 0 {
            return Err(ConfigError::EmptyBoard {
                rows: self.board.rows,
                columns: self.board.columns,
            });
        }
        if !(self.board.cell_size.is_finite() && self.board.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.board.cell_size));
        }
        if !(self.board.gap.is_finite() && self.board.gap >= 0.0) {
            return Err(ConfigError::InvalidGap(self.board.gap));
        }
        if self.tile_template.is_blank() {
            return Err(ConfigError::BlankTemplate);
        }

        let mut families = BTreeSet::new();
        let mut templates = BTreeSet::new();
        for upgrade in &self.upgrades {
            if !families.insert(upgrade.unit_type.clone()) {
                return Err(ConfigError::DuplicateUpgrade(upgrade.unit_type.clone()));
            }
            if upgrade.levels.is_empty() {
                return Err(ConfigError::EmptyUpgrade(upgrade.unit_type.clone()));
            }
            if upgrade.levels.iter().any(TemplateId::is_blank) {
                return Err(ConfigError::BlankTemplate);
            }
            if let Some(shared) = upgrade.levels.iter().find(|level| !templates.insert(*level)) {
                return Err(ConfigError::SharedTemplate((*shared).clone()));
            }
        }

        if self.pools.iter().any(|pool| pool.template.is_blank()) {
            return Err(ConfigError::BlankTemplate);
        }

        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            tile_template: TemplateId::new("tile"),
            merge_lock_ms: 250,
            pool_defaults: PoolDefaults::default(),
            unit_pool: PoolDefaults {
                initial_size: 8,
                max_size: 64,
                auto_expand: true,
            },
            pools: Vec::new(),
            upgrades: vec![
                UpgradeConfig {
                    unit_type: UnitType::new("Knife"),
                    levels: level_templates("knife", 5),
                },
                UpgradeConfig {
                    unit_type: UnitType::new("Gun"),
                    levels: level_templates("gun", 5),
                },
                UpgradeConfig {
                    unit_type: UnitType::new("Bot"),
                    levels: level_templates("bot", 3),
                },
            ],
        }
    }
}

fn level_templates(prefix: &str, count: u32) -> Vec<TemplateId> {
    (1..=count)
        .map(|level| TemplateId::new(format!("{prefix}/{level}")))
        .collect()
}

/// Reasons a configuration is rejected.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Boards must have at least one row and one column.
    #[error("boards must be non-empty, got {rows}x{columns}")]
    EmptyBoard {
        /// Configured row count.
        rows: u32,
        /// Configured column count.
        columns: u32,
    },
    /// Cell size must be finite and positive.
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    /// Board gap must be finite and non-negative.
    #[error("board gap must be non-negative, got {0}")]
    InvalidGap(f32),
    /// A template key is empty.
    #[error("template keys must not be blank")]
    BlankTemplate,
    /// A unit family declares its upgrade chain twice.
    #[error("upgrade chain for {0} is declared more than once")]
    DuplicateUpgrade(UnitType),
    /// A unit family declares no levels.
    #[error("upgrade chain for {0} has no levels")]
    EmptyUpgrade(UnitType),
    /// A template appears more than once across the upgrade chains.
    #[error("template {0} appears in more than one upgrade step")]
    SharedTemplate(TemplateId),
    /// A configured pool could not be set up.
    #[error("pool setup failed: {0}")]
    Pool(#[from] PoolError),
}
