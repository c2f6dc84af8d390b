#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative state of the merge boards.
//!
//! The [`World`] owns the pools, both boards, the unit records and the merge
//! engine. Adapters and systems mutate it exclusively through [`apply`] and
//! observe it through [`query`].

mod grid;
mod merge;
mod units;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use glam::Vec3;
use log::{debug, info, warn};
use merge_grid_core::{
    config::{ConfigError, GameConfig},
    Board, CellCoord, Command, Event, InstanceId, Level, ParentId, SpawnError, TemplateId,
    UnitType,
};
use merge_grid_pool::{Blueprints, Placement, PoolPolicy, PoolRegistry, Poolable};

pub use grid::{BoardLayout, SpatialGrid};
pub use merge::{MergeContext, MergeEngine, MergeListener, MergeReport, UpgradeTable};
pub use units::{Unit, UnitRoster};

/// Scene node every board tile and unit hangs under while spawned.
pub const GRID_ROOT: ParentId = ParentId::new(0);

/// Visual payload carried by every pooled instance of the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    template: TemplateId,
    visible: bool,
    spawns: u32,
    despawns: u32,
}

impl Body {
    /// Template the body was built from.
    #[must_use]
    pub fn template(&self) -> &TemplateId {
        &self.template
    }

    /// Whether the body is currently shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Number of times the body was handed out.
    #[must_use]
    pub fn spawns(&self) -> u32 {
        self.spawns
    }

    /// Number of times the body was returned.
    #[must_use]
    pub fn despawns(&self) -> u32 {
        self.despawns
    }
}

impl Poolable for Body {
    fn on_spawned(&mut self) {
        self.visible = true;
        self.spawns = self.spawns.saturating_add(1);
    }

    fn on_despawned(&mut self) {
        self.visible = false;
        self.despawns = self.despawns.saturating_add(1);
    }
}

/// Set of templates the world knows how to build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    templates: BTreeSet<TemplateId>,
}

impl Catalog {
    /// Collects the tile template, every upgrade template and every declared pool.
    #[must_use]
    pub fn from_config(config: &GameConfig) -> Self {
        let mut templates = BTreeSet::new();
        let _ = templates.insert(config.tile_template.clone());
        for upgrade in &config.upgrades {
            templates.extend(upgrade.levels.iter().cloned());
        }
        templates.extend(config.pools.iter().map(|pool| pool.template.clone()));
        Self { templates }
    }

    /// Known templates in key order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateId> {
        self.templates.iter()
    }
}

impl Blueprints for Catalog {
    type Payload = Body;

    fn contains(&self, template: &TemplateId) -> bool {
        self.templates.contains(template)
    }

    fn instantiate(&mut self, template: &TemplateId) -> Body {
        Body {
            template: template.clone(),
            visible: false,
            spawns: 0,
            despawns: 0,
        }
    }
}

/// Pool registry specialised to the world's catalog.
pub type Pools = PoolRegistry<Catalog>;

/// Resolution of a dropped unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// The unit now occupies the empty cell it was dropped on.
    Placed(CellCoord),
    /// The unit merged with the occupant of the cell into a new instance.
    Merged(InstanceId),
    /// The unit went back to the cell it was lifted from.
    Reverted,
    /// The unit's home cell was taken while it was lifted, so it went back to its pool.
    Released,
    /// The instance is not a live unit; nothing happened.
    Ignored,
}

/// Represents the complete state of both boards.
#[derive(Debug)]
pub struct World {
    pools: Pools,
    grid: SpatialGrid,
    units: UnitRoster,
    merge: MergeEngine,
    clock: Duration,
    tile_template: TemplateId,
}

impl World {
    /// Builds a world from configuration.
    ///
    /// Pools for every known unit template are created up front and both
    /// boards are laid with tiles.
    pub fn new(config: &GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let catalog = Catalog::from_config(config);
        let mut pools = PoolRegistry::new(catalog, PoolPolicy::from(config.pool_defaults));
        let upgrades = UpgradeTable::from_config(&config.upgrades);
        let mut policies: BTreeMap<&TemplateId, PoolPolicy> = upgrades
            .templates()
            .map(|template| (template, PoolPolicy::from(config.unit_pool)))
            .collect();
        for pool in &config.pools {
            let _ = policies.insert(&pool.template, PoolPolicy::from(pool.policy));
        }
        for (template, policy) in policies {
            pools.create_pool(template, policy)?;
        }

        let mut grid = SpatialGrid::new(BoardLayout::from_config(&config.board));
        let tiles = grid.spawn_tiles(&mut pools, &config.tile_template, GRID_ROOT)?;
        info!(
            "world ready: {}x{} boards, {tiles} tiles, {} unit families",
            grid.layout().rows(),
            grid.layout().columns(),
            config.upgrades.len()
        );

        Ok(Self {
            pools,
            grid,
            units: UnitRoster::new(),
            merge: MergeEngine::new(upgrades, config.merge_lock()),
            clock: Duration::ZERO,
            tile_template: config.tile_template.clone(),
        })
    }

    /// Registers a listener notified after every committed merge.
    pub fn subscribe(&mut self, listener: impl MergeListener + 'static) {
        self.merge.subscribe(Box::new(listener));
    }

    /// Spawns a unit from a pool into an empty cell.
    pub fn spawn_unit(
        &mut self,
        template: &TemplateId,
        unit_type: UnitType,
        level: Level,
        board: Board,
        cell: CellCoord,
    ) -> Result<InstanceId, SpawnError> {
        if !self.grid.is_valid(cell) {
            return Err(SpawnError::OutOfBounds);
        }
        if self.grid.occupant(board, cell).is_some() {
            return Err(SpawnError::CellOccupied);
        }

        let placement = Placement::at(self.grid.to_world(board, cell)).with_parent(GRID_ROOT);
        let instance = self.pools.spawn(template, placement)?;
        let _ = self
            .units
            .insert(instance, Unit::new(unit_type, level, board, cell));
        self.grid.set_occupant(board, cell, Some(instance));
        Ok(instance)
    }

    /// Lifts a unit off its cell at the start of a drag.
    ///
    /// The cell becomes free while the unit remembers it as its home. Returns
    /// the vacated location, or `None` when the instance is not a unit on a
    /// board.
    pub fn pick_up(&mut self, instance: InstanceId) -> Option<(Board, CellCoord)> {
        let _ = self.units.get(instance)?;
        let (board, cell) = self.grid.location_of(instance)?;
        self.grid.set_occupant(board, cell, None);
        let _ = self.units.set_home(instance, Some((board, cell)));
        Some((board, cell))
    }

    /// Resolves the drop of a unit at a world-space position on a board.
    ///
    /// Dropping on an empty cell moves the unit there. Dropping on another
    /// unit attempts a merge unless either unit is merge-locked. Anything
    /// else, including a rejected merge, sends the unit back home.
    pub fn drop_at(
        &mut self,
        instance: InstanceId,
        board: Board,
        position: Vec3,
        out_events: &mut Vec<Event>,
    ) -> DropOutcome {
        if self.units.get(instance).is_none() || !self.pools.is_active(instance) {
            return DropOutcome::Ignored;
        }
        if self.grid.location_of(instance).is_some() {
            let _ = self.pick_up(instance);
        }

        let cell = self.grid.to_grid(board, position);
        if !self.grid.is_valid(cell) {
            return self.revert(instance, out_events);
        }

        let Some(target) = self.grid.occupant(board, cell) else {
            self.grid.set_occupant(board, cell, Some(instance));
            let _ = self.units.set_home(instance, Some((board, cell)));
            let _ = self
                .pools
                .set_position(instance, self.grid.to_world(board, cell));
            out_events.push(Event::UnitMoved {
                instance,
                board,
                cell,
            });
            return DropOutcome::Placed(cell);
        };

        if self.units.is_locked(instance) || self.units.is_locked(target) {
            debug!(
                "drop of {} onto {} refused: merge lock",
                instance.get(),
                target.get()
            );
            return self.revert(instance, out_events);
        }

        if let Some(merged) = self.merge_into(board, cell, instance, out_events) {
            return DropOutcome::Merged(merged);
        }
        self.revert(instance, out_events)
    }

    /// Attempts to merge `source` into the occupant of a cell.
    ///
    /// Returns whether the merge committed. A rejection is reported as
    /// `Event::MergeRejected` and leaves the world unchanged.
    pub fn try_merge(
        &mut self,
        board: Board,
        cell: CellCoord,
        source: InstanceId,
        out_events: &mut Vec<Event>,
    ) -> bool {
        self.merge_into(board, cell, source, out_events).is_some()
    }

    /// Releases every occupant of a board and forgets their unit records.
    pub fn clear_board(&mut self, board: Board) -> usize {
        let released = self.grid.clear(board, &mut self.pools);
        for instance in &released {
            let _ = self.units.remove(*instance);
        }
        released.len()
    }

    /// Releases every occupant of both boards.
    pub fn clear_all(&mut self) -> usize {
        Board::ALL
            .iter()
            .map(|board| self.clear_board(*board))
            .sum()
    }

    /// Swaps the boards end-to-end. Returns the new swapped state.
    pub fn swap_boards(&mut self) -> bool {
        self.grid.swap_boards(&mut self.pools)
    }

    /// Returns a board's tiles to the tile pool.
    pub fn release_tiles(&mut self, board: Board) -> usize {
        self.grid.release_tiles(board, &mut self.pools)
    }

    /// Advances the simulation clock and lifts lapsed merge locks.
    pub fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.clock = self.clock.saturating_add(dt);
        out_events.push(Event::TimeAdvanced { dt });
        for instance in self.units.expire(self.clock) {
            out_events.push(Event::MergeLockReleased { instance });
        }
    }

    fn merge_into(
        &mut self,
        board: Board,
        cell: CellCoord,
        source: InstanceId,
        out_events: &mut Vec<Event>,
    ) -> Option<InstanceId> {
        let ctx = MergeContext {
            pools: &mut self.pools,
            grid: &mut self.grid,
            units: &mut self.units,
            now: self.clock,
        };
        match self.merge.try_merge(ctx, board, cell, source, out_events) {
            Ok(report) => Some(report.instance),
            Err(reason) => {
                debug!("merge of {} at {board:?} {cell} rejected: {reason}", source.get());
                out_events.push(Event::MergeRejected {
                    board,
                    cell,
                    source,
                    reason,
                });
                None
            }
        }
    }

    fn revert(&mut self, instance: InstanceId, out_events: &mut Vec<Event>) -> DropOutcome {
        let home = self.units.get(instance).and_then(Unit::home);
        if let Some((board, cell)) = home {
            if self.grid.occupant(board, cell).is_some() {
                warn!(
                    "home {cell} of {} on {board:?} was taken while it was lifted; releasing it",
                    instance.get()
                );
                let _ = self.units.remove(instance);
                let _ = self.pools.release(instance);
                out_events.push(Event::UnitReleased { instance });
                return DropOutcome::Released;
            }
            self.grid.set_occupant(board, cell, Some(instance));
            let _ = self
                .pools
                .set_position(instance, self.grid.to_world(board, cell));
        }
        out_events.push(Event::UnitDropReverted { instance });
        DropOutcome::Reverted
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::SpawnUnit {
            template,
            unit_type,
            level,
            board,
            cell,
        } => match world.spawn_unit(&template, unit_type.clone(), level, board, cell) {
            Ok(instance) => out_events.push(Event::UnitSpawned {
                instance,
                unit_type,
                level,
                board,
                cell,
            }),
            Err(reason) => {
                debug!("spawn of {template} at {board:?} {cell} rejected: {reason}");
                out_events.push(Event::SpawnRejected {
                    template,
                    board,
                    cell,
                    reason,
                });
            }
        },
        Command::PickUpUnit { instance } => {
            if let Some((board, cell)) = world.pick_up(instance) {
                out_events.push(Event::UnitPickedUp {
                    instance,
                    board,
                    cell,
                });
            }
        }
        Command::DropUnit {
            instance,
            board,
            position,
        } => {
            let _ = world.drop_at(instance, board, position, out_events);
        }
        Command::TryMerge {
            board,
            cell,
            source,
        } => {
            let _ = world.try_merge(board, cell, source, out_events);
        }
        Command::ClearBoard { board } => {
            let released = world.clear_board(board);
            out_events.push(Event::BoardCleared { board, released });
        }
        Command::ClearAll => {
            for board in Board::ALL {
                let released = world.clear_board(board);
                out_events.push(Event::BoardCleared { board, released });
            }
        }
        Command::SwapBoards => {
            let swapped = world.swap_boards();
            out_events.push(Event::BoardsSwapped { swapped });
        }
        Command::ReleaseTiles { board } => {
            let released = world.release_tiles(board);
            out_events.push(Event::TilesReleased { board, released });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use merge_grid_core::{Board, CellCoord, InstanceId, TemplateId};
    use merge_grid_pool::{Placement, PoolStats};

    use super::{Body, BoardLayout, Unit, UpgradeTable, World};

    /// Geometry and swap state of the boards.
    #[must_use]
    pub fn layout(world: &World) -> &BoardLayout {
        world.grid.layout()
    }

    /// Instance occupying a cell, if any.
    #[must_use]
    pub fn occupant(world: &World, board: Board, cell: CellCoord) -> Option<InstanceId> {
        world.grid.occupant(board, cell)
    }

    /// Whether a unit could be placed on the cell right now.
    #[must_use]
    pub fn is_free(world: &World, board: Board, cell: CellCoord) -> bool {
        world.grid.is_valid(cell) && world.grid.occupant(board, cell).is_none()
    }

    /// Occupied cells of a board in row-major order.
    #[must_use]
    pub fn occupants(world: &World, board: Board) -> Vec<(CellCoord, InstanceId)> {
        world.grid.occupants(board)
    }

    /// Occupied neighbours of a cell in the order up, down, left, right.
    #[must_use]
    pub fn neighbors(world: &World, board: Board, cell: CellCoord) -> Vec<InstanceId> {
        world.grid.neighbors(board, cell)
    }

    /// Cell an instance currently occupies.
    #[must_use]
    pub fn location(world: &World, instance: InstanceId) -> Option<(Board, CellCoord)> {
        world.grid.location_of(instance)
    }

    /// Tile instances laid on a board.
    #[must_use]
    pub fn tiles(world: &World, board: Board) -> &[InstanceId] {
        world.grid.tiles(board)
    }

    /// Template used for tiles.
    #[must_use]
    pub fn tile_template(world: &World) -> &TemplateId {
        &world.tile_template
    }

    /// Unit record of an instance.
    #[must_use]
    pub fn unit(world: &World, instance: InstanceId) -> Option<&Unit> {
        world.units.get(instance)
    }

    /// Every live unit in instance order.
    pub fn units(world: &World) -> impl Iterator<Item = (InstanceId, &Unit)> {
        world.units.iter()
    }

    /// Whether the unit is cooling down after a merge.
    #[must_use]
    pub fn is_merge_locked(world: &World, instance: InstanceId) -> bool {
        world.units.is_locked(instance)
    }

    /// Active and inactive counts of a template's pool.
    #[must_use]
    pub fn pool_stats(world: &World, template: &TemplateId) -> PoolStats {
        world.pools.stats(template)
    }

    /// Whether the instance is currently spawned.
    #[must_use]
    pub fn is_active(world: &World, instance: InstanceId) -> bool {
        world.pools.is_active(instance)
    }

    /// Spatial placement of an instance.
    #[must_use]
    pub fn placement(world: &World, instance: InstanceId) -> Option<Placement> {
        world.pools.placement(instance)
    }

    /// Visual payload of an instance.
    #[must_use]
    pub fn body(world: &World, instance: InstanceId) -> Option<&Body> {
        world.pools.payload(instance)
    }

    /// Upgrade chains the merge engine resolves against.
    #[must_use]
    pub fn upgrades(world: &World) -> &UpgradeTable {
        world.merge.upgrades()
    }

    /// Cooldown applied to freshly merged units.
    #[must_use]
    pub fn merge_lock(world: &World) -> Duration {
        world.merge.lock_duration()
    }

    /// Simulation time accumulated from ticks.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }
}
