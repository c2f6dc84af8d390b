#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that places freshly recruited units on the first free cell.

use log::debug;
use merge_grid_core::{Board, CellCoord, Command, Level, TemplateId, UnitType};

/// Order in which cells are probed for a free slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOrder {
    /// Last row first, each row from its first column.
    BottomRowsFirst,
    /// First row first, each row from its last column.
    TopRowsFirstFromRight,
}

impl ScanOrder {
    /// Cells of a `rows` x `columns` board in probing order.
    pub fn cells(self, rows: u32, columns: u32) -> impl Iterator<Item = CellCoord> {
        let rows = i32::try_from(rows).unwrap_or(i32::MAX);
        let columns = i32::try_from(columns).unwrap_or(i32::MAX);
        (0..rows).flat_map(move |step| {
            (0..columns).map(move |probe| match self {
                Self::BottomRowsFirst => CellCoord::new(rows - 1 - step, probe),
                Self::TopRowsFirstFromRight => CellCoord::new(step, columns - 1 - probe),
            })
        })
    }
}

/// Level-one unit a recruit button produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recruit {
    unit_type: UnitType,
    template: TemplateId,
    order: ScanOrder,
}

impl Recruit {
    /// Creates a recruit of `unit_type` drawn from `template`.
    #[must_use]
    pub fn new(unit_type: UnitType, template: TemplateId, order: ScanOrder) -> Self {
        Self {
            unit_type,
            template,
            order,
        }
    }

    /// Melee recruit filling the board from the back row.
    #[must_use]
    pub fn knife() -> Self {
        Self::new(
            UnitType::new("Knife"),
            TemplateId::new("knife/1"),
            ScanOrder::BottomRowsFirst,
        )
    }

    /// Ranged recruit filling the board from the front row, right to left.
    #[must_use]
    pub fn gun() -> Self {
        Self::new(
            UnitType::new("Gun"),
            TemplateId::new("gun/1"),
            ScanOrder::TopRowsFirstFromRight,
        )
    }

    /// Probing order of the recruit.
    #[must_use]
    pub fn order(&self) -> ScanOrder {
        self.order
    }
}

/// Placement system bound to the board recruits land on.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
    board: Board,
}

impl Placement {
    /// Creates a system placing units on `board`.
    #[must_use]
    pub const fn new(board: Board) -> Self {
        Self { board }
    }

    /// Emits a level-one spawn on the first free cell, if any.
    ///
    /// The `is_free` closure should mirror the world's `query::is_free`
    /// helper for the system's board. Returns the chosen cell.
    pub fn place<F>(
        &self,
        recruit: &Recruit,
        rows: u32,
        columns: u32,
        mut is_free: F,
        out: &mut Vec<Command>,
    ) -> Option<CellCoord>
    where
        F: FnMut(CellCoord) -> bool,
    {
        let Some(cell) = recruit.order.cells(rows, columns).find(|cell| is_free(*cell)) else {
            debug!("no free cell for {} on {:?}", recruit.unit_type, self.board);
            return None;
        };
        out.push(Command::SpawnUnit {
            template: recruit.template.clone(),
            unit_type: recruit.unit_type.clone(),
            level: Level::FIRST,
            board: self.board,
            cell,
        });
        Some(cell)
    }
}
