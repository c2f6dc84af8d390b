use glam::Vec3;
use merge_grid_core::{Board, CellCoord, InstanceId};
use merge_grid_world::{BoardLayout, SpatialGrid};
use proptest::prelude::*;

const ROWS: u32 = 6;
const COLUMNS: u32 = 5;

fn layout(cell_size: f32, gap: f32, swapped: bool) -> BoardLayout {
    let layout = BoardLayout::new(ROWS, COLUMNS, cell_size, gap, Vec3::new(3.5, 0.0, -2.25));
    if swapped {
        // Swapping an empty grid only toggles the layout.
        let mut grid = SpatialGrid::new(layout);
        let mut pools = merge_grid_pool::PoolRegistry::new(
            NoBlueprints,
            merge_grid_pool::PoolPolicy::default(),
        );
        let _ = grid.swap_boards(&mut pools);
        grid.layout().clone()
    } else {
        layout
    }
}

struct Nothing;

impl merge_grid_pool::Poolable for Nothing {}

struct NoBlueprints;

impl merge_grid_pool::Blueprints for NoBlueprints {
    type Payload = Nothing;

    fn contains(&self, _template: &merge_grid_core::TemplateId) -> bool {
        false
    }

    fn instantiate(&mut self, _template: &merge_grid_core::TemplateId) -> Nothing {
        Nothing
    }
}

fn board() -> impl Strategy<Value = Board> {
    prop_oneof![Just(Board::A), Just(Board::B)]
}

fn any_cell() -> impl Strategy<Value = CellCoord> {
    (-3i32..10, -3i32..10).prop_map(|(row, column)| CellCoord::new(row, column))
}

fn valid_cell() -> impl Strategy<Value = CellCoord> {
    (0..ROWS as i32, 0..COLUMNS as i32).prop_map(|(row, column)| CellCoord::new(row, column))
}

proptest! {
    #[test]
    fn written_occupants_read_back(board in board(), cell in valid_cell(), id in 0u64..1_000) {
        let mut grid = SpatialGrid::new(layout(1.0, 1.0, false));
        let instance = InstanceId::new(id);
        grid.set_occupant(board, cell, Some(instance));
        prop_assert_eq!(grid.occupant(board, cell), Some(instance));
        prop_assert_eq!(grid.occupant(board.other(), cell), None);
        prop_assert_eq!(grid.location_of(instance), Some((board, cell)));
    }

    #[test]
    fn validity_matches_the_board_bounds(cell in any_cell()) {
        let grid = SpatialGrid::new(layout(1.0, 1.0, false));
        let inside = (0..ROWS as i32).contains(&cell.row())
            && (0..COLUMNS as i32).contains(&cell.column());
        prop_assert_eq!(grid.is_valid(cell), inside);
    }

    #[test]
    fn out_of_range_access_is_inert(board in board(), cell in any_cell()) {
        prop_assume!(!(0..ROWS as i32).contains(&cell.row()) || !(0..COLUMNS as i32).contains(&cell.column()));
        let mut grid = SpatialGrid::new(layout(1.0, 1.0, false));
        grid.set_occupant(board, cell, Some(InstanceId::new(1)));
        prop_assert_eq!(grid.occupant(board, cell), None);
        prop_assert_eq!(grid.location_of(InstanceId::new(1)), None);
        prop_assert!(grid.neighbors(board, cell).is_empty());
    }

    #[test]
    fn cells_round_trip_through_world_space(
        board in board(),
        cell in any_cell(),
        cell_size in prop_oneof![Just(0.25f32), Just(0.5), Just(1.0), Just(1.5), Just(2.0)],
        gap in 0.0f32..3.0,
        swapped in any::<bool>(),
    ) {
        let layout = layout(cell_size, gap, swapped);
        prop_assert_eq!(layout.to_grid(board, layout.to_world(board, cell)), cell);
    }

    #[test]
    fn empty_grid_has_no_neighbours(board in board(), cell in any_cell()) {
        let grid = SpatialGrid::new(layout(1.0, 1.0, false));
        prop_assert!(grid.neighbors(board, cell).is_empty());
    }
}

#[test]
fn neighbours_are_reported_up_down_left_right() {
    let mut grid = SpatialGrid::new(layout(1.0, 1.0, false));
    let centre = CellCoord::new(2, 2);
    let right = InstanceId::new(1);
    let left = InstanceId::new(2);
    let down = InstanceId::new(3);
    let up = InstanceId::new(4);
    grid.set_occupant(Board::B, CellCoord::new(2, 3), Some(right));
    grid.set_occupant(Board::B, CellCoord::new(2, 1), Some(left));
    grid.set_occupant(Board::B, CellCoord::new(3, 2), Some(down));
    grid.set_occupant(Board::B, CellCoord::new(1, 2), Some(up));
    grid.set_occupant(Board::A, CellCoord::new(1, 2), Some(InstanceId::new(9)));

    assert_eq!(grid.neighbors(Board::B, centre), vec![up, down, left, right]);
}

#[test]
fn corner_cells_skip_missing_neighbours() {
    let mut grid = SpatialGrid::new(layout(1.0, 1.0, false));
    let below = InstanceId::new(7);
    grid.set_occupant(Board::A, CellCoord::new(1, 0), Some(below));

    assert_eq!(grid.neighbors(Board::A, CellCoord::new(0, 0)), vec![below]);
}

#[test]
fn moving_an_occupant_vacates_its_previous_cell() {
    let mut grid = SpatialGrid::new(layout(1.0, 1.0, false));
    let unit = InstanceId::new(5);
    grid.set_occupant(Board::A, CellCoord::new(0, 0), Some(unit));
    grid.set_occupant(Board::B, CellCoord::new(4, 4), Some(unit));

    assert_eq!(grid.occupant(Board::A, CellCoord::new(0, 0)), None);
    assert_eq!(grid.location_of(unit), Some((Board::B, CellCoord::new(4, 4))));
    assert_eq!(grid.occupants(Board::B), vec![(CellCoord::new(4, 4), unit)]);
}
