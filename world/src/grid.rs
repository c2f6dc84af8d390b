//! Dual-board occupancy tracking and coordinate mapping.

use std::collections::HashMap;

use glam::Vec3;
use merge_grid_core::{config::BoardConfig, Board, Capacity, CellCoord, InstanceId, ParentId, PoolError, TemplateId};
use merge_grid_pool::{Blueprints, Placement, PoolPolicy, PoolRegistry};

/// Fraction of a cell a position may fall short of a boundary and still snap across it.
const SNAP_TOLERANCE: f32 = 1e-4;

/// Neighbour offsets in reporting order: up, down, left, right.
const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Geometry shared by both boards and the placement of their origins.
///
/// Rows advance along +Z and columns along +X. Unswapped, board B starts at
/// the anchor and board A sits one board depth plus the gap behind it.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardLayout {
    rows: u32,
    columns: u32,
    cell_size: f32,
    gap: f32,
    anchor: Vec3,
    swapped: bool,
}

impl BoardLayout {
    /// Creates a layout from explicit dimensions.
    #[must_use]
    pub fn new(rows: u32, columns: u32, cell_size: f32, gap: f32, anchor: Vec3) -> Self {
        Self {
            rows,
            columns,
            cell_size,
            gap,
            anchor,
            swapped: false,
        }
    }

    /// Creates a layout from the board section of the configuration.
    #[must_use]
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(
            config.rows,
            config.columns,
            config.cell_size,
            config.gap,
            Vec3::from_array(config.anchor),
        )
    }

    /// Number of rows on each board.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns on each board.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Side length of a cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Whether the boards are laid out in swapped order.
    #[must_use]
    pub const fn is_swapped(&self) -> bool {
        self.swapped
    }

    /// Number of cells on a single board.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// World-space position of the board's (0, 0) cell.
    #[must_use]
    pub fn origin(&self, board: Board) -> Vec3 {
        let depth = self.rows as f32 * self.cell_size + self.gap;
        let behind = self.anchor - Vec3::new(0.0, 0.0, depth);
        match (board, self.swapped) {
            (Board::A, false) | (Board::B, true) => behind,
            (Board::B, false) | (Board::A, true) => self.anchor,
        }
    }

    /// World-space position of a cell.
    #[must_use]
    pub fn to_world(&self, board: Board, cell: CellCoord) -> Vec3 {
        self.origin(board)
            + Vec3::new(
                cell.column() as f32 * self.cell_size,
                0.0,
                cell.row() as f32 * self.cell_size,
            )
    }

    /// Cell containing a world-space position; the result may lie off the board.
    ///
    /// Non-finite positions map to a coordinate that is never valid.
    #[must_use]
    pub fn to_grid(&self, board: Board, position: Vec3) -> CellCoord {
        let local = position - self.origin(board);
        CellCoord::new(
            snap(local.z / self.cell_size),
            snap(local.x / self.cell_size),
        )
    }

    /// Reports whether the cell lies on the board.
    #[must_use]
    pub fn is_valid(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some()
    }

    fn toggle(&mut self) {
        self.swapped = !self.swapped;
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        let row = u32::try_from(cell.row()).ok()?;
        let column = u32::try_from(cell.column()).ok()?;
        if row < self.rows && column < self.columns {
            Some(row as usize * self.columns as usize + column as usize)
        } else {
            None
        }
    }

    fn cell_at(&self, index: usize) -> CellCoord {
        let columns = self.columns.max(1) as usize;
        CellCoord::new((index / columns) as i32, (index % columns) as i32)
    }

    fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.cell_count()).map(|index| self.cell_at(index))
    }
}

fn snap(cells: f32) -> i32 {
    if !cells.is_finite() {
        return i32::MIN;
    }
    (cells + SNAP_TOLERANCE).floor() as i32
}

/// Occupancy of both boards plus the tile visuals underneath them.
///
/// The matrices and the entity-to-cell index always agree: an instance
/// occupies at most one cell on at most one board. Out-of-range reads yield
/// `None` and out-of-range writes are ignored.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    layout: BoardLayout,
    boards: [Vec<Option<InstanceId>>; 2],
    locations: HashMap<InstanceId, (Board, CellCoord)>,
    tiles: [Vec<InstanceId>; 2],
}

impl SpatialGrid {
    /// Creates two empty boards with the provided layout.
    #[must_use]
    pub fn new(layout: BoardLayout) -> Self {
        let cells = layout.cell_count();
        Self {
            boards: [vec![None; cells], vec![None; cells]],
            locations: HashMap::new(),
            tiles: [Vec::new(), Vec::new()],
            layout,
        }
    }

    /// Geometry of the boards.
    #[must_use]
    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// World-space position of a cell.
    #[must_use]
    pub fn to_world(&self, board: Board, cell: CellCoord) -> Vec3 {
        self.layout.to_world(board, cell)
    }

    /// Cell containing a world-space position; the caller validates the result.
    #[must_use]
    pub fn to_grid(&self, board: Board, position: Vec3) -> CellCoord {
        self.layout.to_grid(board, position)
    }

    /// Reports whether the cell lies on the boards.
    #[must_use]
    pub fn is_valid(&self, cell: CellCoord) -> bool {
        self.layout.is_valid(cell)
    }

    /// Instance occupying the cell, if any.
    #[must_use]
    pub fn occupant(&self, board: Board, cell: CellCoord) -> Option<InstanceId> {
        let index = self.layout.index(cell)?;
        self.boards[board.index()][index]
    }

    /// Writes the occupant of a cell.
    ///
    /// An instance placed here leaves whichever cell it occupied before, and a
    /// displaced occupant no longer has a location. The instance's visual
    /// position is left untouched.
    pub fn set_occupant(&mut self, board: Board, cell: CellCoord, occupant: Option<InstanceId>) {
        let Some(index) = self.layout.index(cell) else {
            return;
        };

        if let Some(previous) = self.boards[board.index()][index].take() {
            let _ = self.locations.remove(&previous);
        }

        let Some(instance) = occupant else {
            return;
        };
        if let Some((old_board, old_cell)) = self.locations.insert(instance, (board, cell)) {
            if let Some(old_index) = self.layout.index(old_cell) {
                self.boards[old_board.index()][old_index] = None;
            }
        }
        self.boards[board.index()][index] = Some(instance);
    }

    /// Cell currently occupied by the instance.
    #[must_use]
    pub fn location_of(&self, instance: InstanceId) -> Option<(Board, CellCoord)> {
        self.locations.get(&instance).copied()
    }

    /// Occupied axis-adjacent cells in the order up, down, left, right.
    ///
    /// "Up" is the preceding row. An off-board centre has no neighbours.
    #[must_use]
    pub fn neighbors(&self, board: Board, cell: CellCoord) -> Vec<InstanceId> {
        if !self.is_valid(cell) {
            return Vec::new();
        }
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|&(rows, columns)| self.occupant(board, cell.offset(rows, columns)))
            .collect()
    }

    /// Occupied cells of a board in row-major order.
    #[must_use]
    pub fn occupants(&self, board: Board) -> Vec<(CellCoord, InstanceId)> {
        self.boards[board.index()]
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|instance| (self.layout.cell_at(index), instance)))
            .collect()
    }

    /// Empties a board and releases each former occupant back to its pool.
    ///
    /// Returns the released instances in row-major order.
    pub fn clear<B: Blueprints>(&mut self, board: Board, pools: &mut PoolRegistry<B>) -> Vec<InstanceId> {
        let occupants = self.occupants(board);
        let mut released = Vec::with_capacity(occupants.len());
        for (cell, instance) in occupants {
            self.set_occupant(board, cell, None);
            let _ = pools.release(instance);
            released.push(instance);
        }
        released
    }

    /// Empties both boards, releasing every occupant.
    pub fn clear_all<B: Blueprints>(&mut self, pools: &mut PoolRegistry<B>) -> Vec<InstanceId> {
        let mut released = self.clear(Board::A, pools);
        released.extend(self.clear(Board::B, pools));
        released
    }

    /// Lays a tile under every cell of each board that has no tiles yet.
    ///
    /// Tiles come from a non-expanding pool sized for both boards. Returns the
    /// number of tiles spawned.
    pub fn spawn_tiles<B: Blueprints>(
        &mut self,
        pools: &mut PoolRegistry<B>,
        template: &TemplateId,
        parent: ParentId,
    ) -> Result<usize, PoolError> {
        let total = self.layout.cell_count() * Board::ALL.len();
        pools.create_pool(template, PoolPolicy::new(total, Capacity::Bounded(total), false))?;

        let mut spawned = 0;
        for board in Board::ALL {
            if !self.tiles[board.index()].is_empty() {
                continue;
            }
            let cells: Vec<CellCoord> = self.layout.cells().collect();
            for cell in cells {
                let placement = Placement::at(self.to_world(board, cell)).with_parent(parent);
                let tile = pools.spawn(template, placement)?;
                self.tiles[board.index()].push(tile);
                spawned += 1;
            }
        }
        Ok(spawned)
    }

    /// Tile instances of a board in row-major order.
    #[must_use]
    pub fn tiles(&self, board: Board) -> &[InstanceId] {
        &self.tiles[board.index()]
    }

    /// Returns a board's tiles to their pool. Occupancy is unaffected.
    pub fn release_tiles<B: Blueprints>(&mut self, board: Board, pools: &mut PoolRegistry<B>) -> usize {
        let tiles = std::mem::take(&mut self.tiles[board.index()]);
        for tile in &tiles {
            let _ = pools.release(*tile);
        }
        tiles.len()
    }

    /// Swaps the boards end-to-end and moves every tile and occupant with them.
    ///
    /// Nothing is released or respawned. Returns the new swapped state.
    pub fn swap_boards<B: Blueprints>(&mut self, pools: &mut PoolRegistry<B>) -> bool {
        self.layout.toggle();
        for board in Board::ALL {
            for (index, tile) in self.tiles[board.index()].iter().enumerate() {
                let position = self.layout.to_world(board, self.layout.cell_at(index));
                let _ = pools.set_position(*tile, position);
            }
            for (cell, instance) in self.occupants(board) {
                let _ = pools.set_position(instance, self.layout.to_world(board, cell));
            }
        }
        self.layout.is_swapped()
    }
}
