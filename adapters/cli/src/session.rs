//! Scripted session driving the world through its systems.

use std::{cell::Cell, fmt, rc::Rc};

use glam::Vec3;
use log::{debug, warn};
use merge_grid_core::{
    config::{ConfigError, GameConfig},
    Board, CellCoord, Command, Event, InstanceId, Level, ListenerError, UnitType,
};
use merge_grid_system_bots::{BotWave, Bots, Config as BotsConfig, Region};
use merge_grid_system_placement::{Placement, Recruit};
use merge_grid_world::{self as world, query, MergeReport, World};

const BOT_FAMILY: &str = "Bot";

/// Knobs of a scripted session.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SessionPlan {
    /// Seed for bot level selection.
    pub(crate) seed: u64,
    /// Rows of the bot block.
    pub(crate) bot_rows: u32,
    /// Columns of the bot block.
    pub(crate) bot_columns: u32,
    /// Knives to recruit.
    pub(crate) knives: u32,
    /// Guns to recruit.
    pub(crate) guns: u32,
    /// Upper bound on merge rounds.
    pub(crate) rounds: u32,
    /// Whether to swap the boards at the end.
    pub(crate) swap: bool,
}

/// World plus the bookkeeping the session reports on.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    merges: Rc<Cell<u32>>,
    rejected: usize,
}

impl Session {
    /// Builds the world and hooks a merge counter into it.
    pub(crate) fn new(config: &GameConfig) -> Result<Self, ConfigError> {
        let mut world = World::new(config)?;
        let merges = Rc::new(Cell::new(0_u32));
        let counter = Rc::clone(&merges);
        world.subscribe(move |report: &MergeReport| -> Result<(), ListenerError> {
            counter.set(counter.get().saturating_add(1));
            debug!("scored {} {} at {}", report.unit_type, report.level, report.cell);
            Ok(())
        });
        Ok(Self {
            world,
            merges,
            rejected: 0,
        })
    }

    /// Plays the plan to completion and summarises the final boards.
    pub(crate) fn run(&mut self, plan: &SessionPlan) -> Summary {
        self.spawn_bots(plan);
        self.recruit(plan);

        for round in 0..plan.rounds {
            let merged = self.merge_round(Board::B);
            debug!("round {round}: {merged} merges");
            if merged == 0 {
                break;
            }
            let lock = query::merge_lock(&self.world);
            let _ = self.apply(Command::Tick { dt: lock });
        }

        if plan.swap {
            let _ = self.apply(Command::SwapBoards);
        }
        self.summary()
    }

    fn spawn_bots(&mut self, plan: &SessionPlan) {
        let family = UnitType::new(BOT_FAMILY);
        let upgrades = query::upgrades(&self.world);
        let Some(max) = upgrades.max_level(&family) else {
            warn!("no {BOT_FAMILY} upgrade chain configured; skipping bots");
            return;
        };
        let templates = (1..=max.get())
            .filter_map(Level::new)
            .filter_map(|level| upgrades.template(&family, level).cloned())
            .collect();
        let wave = BotWave::new(family, templates);

        let columns = query::layout(&self.world).columns();
        let region = Region::centered_top(columns, plan.bot_rows, plan.bot_columns);
        let mut bots = Bots::new(BotsConfig::new(plan.seed));
        let mut commands = Vec::new();
        bots.spawn_wave(&wave, Board::A, region, &mut commands);
        for command in commands {
            let _ = self.apply(command);
        }
    }

    fn recruit(&mut self, plan: &SessionPlan) {
        let placement = Placement::new(Board::B);
        let recruits = std::iter::repeat(Recruit::knife())
            .take(plan.knives as usize)
            .chain(std::iter::repeat(Recruit::gun()).take(plan.guns as usize));
        for recruit in recruits {
            let layout = query::layout(&self.world);
            let (rows, columns) = (layout.rows(), layout.columns());
            let mut commands = Vec::new();
            let world = &self.world;
            if placement
                .place(
                    &recruit,
                    rows,
                    columns,
                    |cell| query::is_free(world, Board::B, cell),
                    &mut commands,
                )
                .is_none()
            {
                warn!("board B is full; remaining recruits dropped");
                return;
            }
            for command in commands {
                let _ = self.apply(command);
            }
        }
    }

    /// Drags unlocked matching pairs onto each other until none remain.
    fn merge_round(&mut self, board: Board) -> u32 {
        let mut merged = 0;
        while let Some((source, cell)) = self.find_pair(board) {
            let layout = query::layout(&self.world);
            let half = layout.cell_size() * 0.5;
            let position = layout.to_world(board, cell) + Vec3::new(half, 0.0, half);

            let _ = self.apply(Command::PickUpUnit { instance: source });
            let events = self.apply(Command::DropUnit {
                instance: source,
                board,
                position,
            });
            if !events
                .iter()
                .any(|event| matches!(event, Event::UnitMerged { .. }))
            {
                break;
            }
            merged += 1;
        }
        merged
    }

    fn find_pair(&self, board: Board) -> Option<(InstanceId, CellCoord)> {
        let world = &self.world;
        let ready: Vec<(CellCoord, InstanceId)> = query::occupants(world, board)
            .into_iter()
            .filter(|(_, instance)| !query::is_merge_locked(world, *instance))
            .collect();

        for (index, (_, source)) in ready.iter().enumerate() {
            let Some(unit) = query::unit(world, *source) else {
                continue;
            };
            if query::upgrades(world)
                .next(unit.unit_type(), unit.level())
                .is_none()
            {
                continue;
            }
            let partner = ready[index + 1..].iter().find(|(_, other)| {
                query::unit(world, *other).is_some_and(|other| {
                    other.unit_type() == unit.unit_type() && other.level() == unit.level()
                })
            });
            if let Some((cell, _)) = partner {
                return Some((*source, *cell));
            }
        }
        None
    }

    fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        for event in &events {
            if let Event::SpawnRejected {
                template, reason, ..
            } = event
            {
                warn!("spawn of {template} rejected: {reason}");
                self.rejected += 1;
            }
        }
        events
    }

    fn summary(&self) -> Summary {
        let world = &self.world;
        let boards = Board::ALL
            .iter()
            .map(|board| {
                let units = query::occupants(world, *board)
                    .into_iter()
                    .filter_map(|(cell, instance)| {
                        let unit = query::unit(world, instance)?;
                        Some((cell, unit.unit_type().clone(), unit.level()))
                    })
                    .collect();
                (*board, units)
            })
            .collect();
        let tiles = query::pool_stats(world, query::tile_template(world));
        Summary {
            merges: self.merges.get(),
            rejected: self.rejected,
            swapped: query::layout(world).is_swapped(),
            tiles: (tiles.active, tiles.inactive),
            boards,
        }
    }
}

/// Final state reported by the adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Summary {
    merges: u32,
    rejected: usize,
    swapped: bool,
    tiles: (usize, usize),
    boards: Vec<(Board, Vec<(CellCoord, UnitType, Level)>)>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "merges: {}", self.merges)?;
        writeln!(f, "rejected spawns: {}", self.rejected)?;
        writeln!(f, "boards swapped: {}", self.swapped)?;
        writeln!(f, "tiles: {} active, {} pooled", self.tiles.0, self.tiles.1)?;
        for (board, units) in &self.boards {
            writeln!(f, "board {board:?}: {} units", units.len())?;
            for (cell, unit_type, level) in units {
                writeln!(f, "  {cell} {unit_type} {level}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> SessionPlan {
        SessionPlan {
            seed: 7,
            bot_rows: 3,
            bot_columns: 5,
            knives: 4,
            guns: 2,
            rounds: 16,
            swap: false,
        }
    }

    fn unit_count(summary: &Summary, board: Board) -> usize {
        summary
            .boards
            .iter()
            .find(|(candidate, _)| *candidate == board)
            .map_or(0, |(_, units)| units.len())
    }

    #[test]
    fn four_knives_and_two_guns_collapse_into_two_units() {
        let mut session = Session::new(&GameConfig::default()).expect("session");
        let summary = session.run(&plan());

        assert_eq!(summary.merges, 4);
        assert_eq!(summary.rejected, 0);
        assert_eq!(unit_count(&summary, Board::A), 15);
        assert_eq!(unit_count(&summary, Board::B), 2);
        assert_eq!(summary.tiles, (128, 0));
    }

    #[test]
    fn same_seed_reproduces_the_summary() {
        let first = Session::new(&GameConfig::default())
            .expect("session")
            .run(&plan());
        let second = Session::new(&GameConfig::default())
            .expect("session")
            .run(&plan());
        assert_eq!(first, second);
    }

    #[test]
    fn swap_is_reported() {
        let mut session = Session::new(&GameConfig::default()).expect("session");
        let summary = session.run(&SessionPlan {
            swap: true,
            ..plan()
        });
        assert!(summary.swapped);
        assert!(summary.to_string().contains("boards swapped: true"));
    }
}
