//! Merge resolution: two matching units become one unit of the next level.
//!
//! An attempt runs validate, resolve, commit and notify in that order. Every
//! check that can fail, including producing the upgraded instance, happens
//! before the first mutation, so a rejected attempt leaves the pools, the grid
//! and the roster exactly as they were.

use std::{collections::BTreeMap, time::Duration};

use log::{debug, warn};
use merge_grid_core::{
    config::UpgradeConfig, Board, CellCoord, Event, InstanceId, Level, ListenerError,
    MergeRejection, TemplateId, UnitType,
};
use merge_grid_pool::{Blueprints, Placement, PoolRegistry};

use crate::{
    grid::SpatialGrid,
    units::{Unit, UnitRoster},
};

/// Templates of every level of every unit family.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpgradeTable {
    chains: BTreeMap<UnitType, Vec<TemplateId>>,
}

impl UpgradeTable {
    /// Creates an empty table, in which every level is the maximum.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from configured upgrade chains.
    #[must_use]
    pub fn from_config(upgrades: &[UpgradeConfig]) -> Self {
        let mut table = Self::new();
        for upgrade in upgrades {
            table.insert(upgrade.unit_type.clone(), upgrade.levels.clone());
        }
        table
    }

    /// Registers the chain of a family; entry `i` is the template of level `i + 1`.
    pub fn insert(&mut self, unit_type: UnitType, levels: Vec<TemplateId>) {
        let _ = self.chains.insert(unit_type, levels);
    }

    /// Template of a family at a level.
    #[must_use]
    pub fn template(&self, unit_type: &UnitType, level: Level) -> Option<&TemplateId> {
        self.chains.get(unit_type)?.get(level.index())
    }

    /// Level and template two units of `level` merge into, if any.
    #[must_use]
    pub fn next(&self, unit_type: &UnitType, level: Level) -> Option<(Level, &TemplateId)> {
        let next = level.next()?;
        self.template(unit_type, next).map(|template| (next, template))
    }

    /// Highest level of a family.
    #[must_use]
    pub fn max_level(&self, unit_type: &UnitType) -> Option<Level> {
        let count = self.chains.get(unit_type)?.len();
        Level::new(u32::try_from(count).ok()?)
    }

    /// Every template named by any chain.
    pub fn templates(&self) -> impl Iterator<Item = &TemplateId> {
        self.chains.values().flatten()
    }
}

/// Summary of a committed merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeReport {
    /// Instance backing the upgraded unit.
    pub instance: InstanceId,
    /// Family of the upgraded unit.
    pub unit_type: UnitType,
    /// Level of the upgraded unit.
    pub level: Level,
    /// Board holding the upgraded unit.
    pub board: Board,
    /// Cell holding the upgraded unit.
    pub cell: CellCoord,
    /// Source and target instances consumed by the merge.
    pub consumed: [InstanceId; 2],
}

/// External consumer of committed merges, such as scoring.
pub trait MergeListener {
    /// Observes a merge after it has been fully applied.
    fn on_unit_merged(&mut self, report: &MergeReport) -> Result<(), ListenerError>;
}

impl<F> MergeListener for F
where
    F: FnMut(&MergeReport) -> Result<(), ListenerError>,
{
    fn on_unit_merged(&mut self, report: &MergeReport) -> Result<(), ListenerError> {
        self(report)
    }
}

/// Mutable state a merge operates on.
#[derive(Debug)]
pub struct MergeContext<'a, B: Blueprints> {
    /// Pools the consumed units return to and the upgraded unit comes from.
    pub pools: &'a mut PoolRegistry<B>,
    /// Occupancy of both boards.
    pub grid: &'a mut SpatialGrid,
    /// Unit records.
    pub units: &'a mut UnitRoster,
    /// Current simulation time, used to start the merge lock.
    pub now: Duration,
}

/// Validates and applies merges against an upgrade table.
pub struct MergeEngine {
    upgrades: UpgradeTable,
    lock_duration: Duration,
    listeners: Vec<Box<dyn MergeListener>>,
}

impl std::fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("upgrades", &self.upgrades)
            .field("lock_duration", &self.lock_duration)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl MergeEngine {
    /// Creates an engine that locks merged units for `lock_duration`.
    #[must_use]
    pub fn new(upgrades: UpgradeTable, lock_duration: Duration) -> Self {
        Self {
            upgrades,
            lock_duration,
            listeners: Vec::new(),
        }
    }

    /// Upgrade table consulted by the engine.
    #[must_use]
    pub fn upgrades(&self) -> &UpgradeTable {
        &self.upgrades
    }

    /// Cooldown applied to freshly merged units.
    #[must_use]
    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    /// Registers a listener notified after every committed merge.
    pub fn subscribe(&mut self, listener: Box<dyn MergeListener>) {
        self.listeners.push(listener);
    }

    /// Merges `source` into the occupant of `cell` on `board`.
    ///
    /// On success the source and target are released, one upgraded unit
    /// occupies the target cell under merge lock, `Event::UnitMerged` is
    /// pushed and listeners are notified. The engine does not consult merge
    /// locks itself; callers refuse to initiate merges with locked units.
    pub fn try_merge<B: Blueprints>(
        &mut self,
        ctx: MergeContext<'_, B>,
        board: Board,
        cell: CellCoord,
        source: InstanceId,
        out_events: &mut Vec<Event>,
    ) -> Result<MergeReport, MergeRejection> {
        let target = ctx.grid.occupant(board, cell).ok_or(MergeRejection::EmptyTarget)?;
        if target == source {
            return Err(MergeRejection::SameInstance);
        }
        let source_unit = ctx
            .units
            .get(source)
            .ok_or(MergeRejection::MissingUnit { instance: source })?;
        let target_unit = ctx
            .units
            .get(target)
            .ok_or(MergeRejection::MissingUnit { instance: target })?;
        if source_unit.unit_type() != target_unit.unit_type() {
            return Err(MergeRejection::TypeMismatch);
        }
        if source_unit.level() != target_unit.level() {
            return Err(MergeRejection::LevelMismatch);
        }

        let unit_type = target_unit.unit_type().clone();
        let (level, template) = self
            .upgrades
            .next(&unit_type, target_unit.level())
            .map(|(level, template)| (level, template.clone()))
            .ok_or_else(|| MergeRejection::MaxLevel {
                unit_type: unit_type.clone(),
                level: target_unit.level(),
            })?;

        let mut placement = Placement::at(ctx.grid.to_world(board, cell));
        placement.parent = ctx.pools.placement(target).and_then(|placement| placement.parent);
        let merged = ctx
            .pools
            .spawn(&template, placement)
            .map_err(MergeRejection::SpawnFailed)?;

        if let Some((source_board, source_cell)) = ctx.grid.location_of(source) {
            ctx.grid.set_occupant(source_board, source_cell, None);
        }
        ctx.grid.set_occupant(board, cell, None);
        let _ = ctx.pools.release(source);
        let _ = ctx.pools.release(target);
        let _ = ctx.units.remove(source);
        let _ = ctx.units.remove(target);
        let _ = ctx
            .units
            .insert(merged, Unit::new(unit_type.clone(), level, board, cell));
        ctx.grid.set_occupant(board, cell, Some(merged));
        let _ = ctx.units.lock(merged, ctx.now, self.lock_duration);
        debug!(
            "merged {} into {} at {board:?} {cell}: {unit_type} {level} as {}",
            source.get(),
            target.get(),
            merged.get()
        );

        let report = MergeReport {
            instance: merged,
            unit_type,
            level,
            board,
            cell,
            consumed: [source, target],
        };
        out_events.push(Event::UnitMerged {
            instance: report.instance,
            unit_type: report.unit_type.clone(),
            level: report.level,
            board: report.board,
            cell: report.cell,
            consumed: report.consumed,
        });
        for listener in &mut self.listeners {
            if let Err(error) = listener.on_unit_merged(&report) {
                warn!("{error}; merge of {} stands", report.instance.get());
            }
        }
        Ok(report)
    }
}
