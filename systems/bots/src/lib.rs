#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Seeded system that fills a board region with randomly levelled bots.

use log::debug;
use merge_grid_core::{Board, CellCoord, Command, Level, TemplateId, UnitType};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Unit family and per-level templates a wave draws from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotWave {
    unit_type: UnitType,
    templates: Vec<TemplateId>,
}

impl BotWave {
    /// Creates a wave; `templates[i]` is the template of level `i + 1`.
    #[must_use]
    pub fn new(unit_type: UnitType, templates: Vec<TemplateId>) -> Self {
        Self {
            unit_type,
            templates,
        }
    }

    /// Family every bot of the wave belongs to.
    #[must_use]
    pub fn unit_type(&self) -> &UnitType {
        &self.unit_type
    }

    /// Templates by level.
    #[must_use]
    pub fn templates(&self) -> &[TemplateId] {
        &self.templates
    }
}

/// Rectangular block of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    start: CellCoord,
    rows: u32,
    columns: u32,
}

impl Region {
    /// Creates a region spanning `rows` x `columns` cells from `start`.
    #[must_use]
    pub const fn new(start: CellCoord, rows: u32, columns: u32) -> Self {
        Self {
            start,
            rows,
            columns,
        }
    }

    /// Region hugging the first row and centred horizontally on a board.
    ///
    /// A span wider than the board starts left of column zero; its outer
    /// cells are then rejected by the world.
    #[must_use]
    pub fn centered_top(board_columns: u32, rows: u32, columns: u32) -> Self {
        let spare = i64::from(board_columns) - i64::from(columns);
        let start_column = i32::try_from(spare / 2).unwrap_or(i32::MIN);
        Self::new(CellCoord::new(0, start_column), rows, columns)
    }

    /// First cell of the region.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        self.start
    }

    /// Cells of the region in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let start = self.start;
        let columns = self.columns;
        (0..self.rows).flat_map(move |row| {
            (0..columns).map(move |column| start.offset(row as i32, column as i32))
        })
    }
}

/// Configuration parameters required to construct the bot system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration that seeds level selection.
    #[must_use]
    pub const fn new(rng_seed: u64) -> Self {
        Self { rng_seed }
    }
}

/// Pure system that emits the commands populating and clearing bot boards.
#[derive(Debug)]
pub struct Bots {
    rng: ChaCha8Rng,
}

impl Bots {
    /// Creates the system from its configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Emits one spawn per cell of `region`, each at a uniformly drawn level.
    ///
    /// A wave without templates emits nothing.
    pub fn spawn_wave(&mut self, wave: &BotWave, board: Board, region: Region, out: &mut Vec<Command>) {
        if wave.templates.is_empty() {
            return;
        }

        let before = out.len();
        for cell in region.cells() {
            let index = self.rng.gen_range(0..wave.templates.len());
            let Some(level) = u32::try_from(index + 1).ok().and_then(Level::new) else {
                continue;
            };
            out.push(Command::SpawnUnit {
                template: wave.templates[index].clone(),
                unit_type: wave.unit_type.clone(),
                level,
                board,
                cell,
            });
        }
        debug!(
            "queued {} {} bots on {board:?} from {}",
            out.len() - before,
            wave.unit_type,
            region.start
        );
    }

    /// Emits the command that releases every occupant of a bot board.
    pub fn clear(&self, board: Board, out: &mut Vec<Command>) {
        out.push(Command::ClearBoard { board });
    }
}
