use glam::Vec3;
use merge_grid_core::{
    config::GameConfig, Board, CellCoord, Command, Event, InstanceId, Level, MergeRejection,
    TemplateId, UnitType,
};
use merge_grid_world::{self as world, query, DropOutcome, World};

fn knife(world: &mut World, value: u32, board: Board, cell: CellCoord) -> InstanceId {
    world
        .spawn_unit(
            &TemplateId::new(format!("knife/{value}")),
            UnitType::new("Knife"),
            Level::new(value).expect("positive level"),
            board,
            cell,
        )
        .expect("spawn knife")
}

fn centre(world: &World, board: Board, cell: CellCoord) -> Vec3 {
    let size = query::layout(world).cell_size();
    query::layout(world).to_world(board, cell) + Vec3::new(size * 0.5, 0.0, size * 0.5)
}

fn default_world() -> World {
    World::new(&GameConfig::default()).expect("world")
}

#[test]
fn picking_up_frees_the_cell_but_keeps_home() {
    let mut world = default_world();
    let unit = knife(&mut world, 1, Board::B, CellCoord::new(6, 2));
    let mut events = Vec::new();

    world::apply(&mut world, Command::PickUpUnit { instance: unit }, &mut events);

    assert_eq!(
        events,
        vec![Event::UnitPickedUp {
            instance: unit,
            board: Board::B,
            cell: CellCoord::new(6, 2),
        }]
    );
    assert_eq!(query::occupant(&world, Board::B, CellCoord::new(6, 2)), None);
    assert_eq!(
        query::unit(&world, unit).and_then(|unit| unit.home()),
        Some((Board::B, CellCoord::new(6, 2)))
    );
}

#[test]
fn dropping_on_an_empty_cell_moves_the_unit() {
    let mut world = default_world();
    let unit = knife(&mut world, 1, Board::B, CellCoord::new(0, 0));
    let mut events = Vec::new();
    let _ = world.pick_up(unit);

    let position = centre(&world, Board::A, CellCoord::new(3, 4));
    let outcome = world.drop_at(unit, Board::A, position, &mut events);

    assert_eq!(outcome, DropOutcome::Placed(CellCoord::new(3, 4)));
    assert_eq!(query::location(&world, unit), Some((Board::A, CellCoord::new(3, 4))));
    assert_eq!(
        query::placement(&world, unit).map(|placement| placement.position),
        Some(query::layout(&world).to_world(Board::A, CellCoord::new(3, 4)))
    );
    assert_eq!(
        events,
        vec![Event::UnitMoved {
            instance: unit,
            board: Board::A,
            cell: CellCoord::new(3, 4),
        }]
    );
}

#[test]
fn dropping_off_the_board_reverts_home() {
    let mut world = default_world();
    let unit = knife(&mut world, 1, Board::B, CellCoord::new(5, 5));
    let mut events = Vec::new();
    let _ = world.pick_up(unit);

    let outcome = world.drop_at(unit, Board::B, Vec3::new(-3.0, 0.0, 40.0), &mut events);

    assert_eq!(outcome, DropOutcome::Reverted);
    assert_eq!(query::location(&world, unit), Some((Board::B, CellCoord::new(5, 5))));
    assert_eq!(events, vec![Event::UnitDropReverted { instance: unit }]);
}

#[test]
fn dropping_on_a_matching_unit_merges() {
    let mut world = default_world();
    let dragged = knife(&mut world, 2, Board::B, CellCoord::new(0, 0));
    let resting = knife(&mut world, 2, Board::B, CellCoord::new(0, 1));
    let mut events = Vec::new();
    let _ = world.pick_up(dragged);

    let position = centre(&world, Board::B, CellCoord::new(0, 1));
    let outcome = world.drop_at(dragged, Board::B, position, &mut events);

    let DropOutcome::Merged(merged) = outcome else {
        panic!("expected a merge, got {outcome:?}");
    };
    assert_eq!(query::occupant(&world, Board::B, CellCoord::new(0, 1)), Some(merged));
    assert_eq!(query::occupant(&world, Board::B, CellCoord::new(0, 0)), None);
    assert!(!query::is_active(&world, dragged));
    assert!(!query::is_active(&world, resting));
    assert!(matches!(events.as_slice(), [Event::UnitMerged { consumed, .. }] if *consumed == [dragged, resting]));
}

#[test]
fn locked_units_refuse_to_merge_until_the_lock_lapses() {
    let mut world = default_world();
    let a = knife(&mut world, 1, Board::B, CellCoord::new(0, 0));
    let _ = knife(&mut world, 1, Board::B, CellCoord::new(0, 1));
    let mut events = Vec::new();
    assert!(world.try_merge(Board::B, CellCoord::new(0, 1), a, &mut events));
    let locked = query::occupant(&world, Board::B, CellCoord::new(0, 1)).expect("merged");

    let dragged = knife(&mut world, 2, Board::B, CellCoord::new(4, 4));
    let _ = world.pick_up(dragged);
    events.clear();
    let onto_locked = centre(&world, Board::B, CellCoord::new(0, 1));
    assert_eq!(
        world.drop_at(dragged, Board::B, onto_locked, &mut events),
        DropOutcome::Reverted
    );
    assert_eq!(events, vec![Event::UnitDropReverted { instance: dragged }]);
    assert_eq!(query::occupant(&world, Board::B, CellCoord::new(0, 1)), Some(locked));
    assert_eq!(query::location(&world, dragged), Some((Board::B, CellCoord::new(4, 4))));

    world.tick(query::merge_lock(&world), &mut events);
    let _ = world.pick_up(dragged);
    assert!(matches!(
        world.drop_at(dragged, Board::B, onto_locked, &mut events),
        DropOutcome::Merged(_)
    ));
}

#[test]
fn rejected_merge_on_drop_reports_and_reverts() {
    let mut world = default_world();
    let dragged = knife(&mut world, 1, Board::B, CellCoord::new(2, 2));
    let _ = world
        .spawn_unit(
            &TemplateId::new("gun/1"),
            UnitType::new("Gun"),
            Level::FIRST,
            Board::B,
            CellCoord::new(2, 3),
        )
        .expect("gun");
    let mut events = Vec::new();
    let _ = world.pick_up(dragged);

    let position = centre(&world, Board::B, CellCoord::new(2, 3));
    assert_eq!(world.drop_at(dragged, Board::B, position, &mut events), DropOutcome::Reverted);
    assert!(matches!(
        events.as_slice(),
        [
            Event::MergeRejected {
                reason: MergeRejection::TypeMismatch,
                ..
            },
            Event::UnitDropReverted { .. },
        ]
    ));
    assert_eq!(query::location(&world, dragged), Some((Board::B, CellCoord::new(2, 2))));
}

#[test]
fn dropping_a_released_instance_is_ignored() {
    let mut world = default_world();
    let unit = knife(&mut world, 1, Board::B, CellCoord::new(1, 1));
    assert_eq!(world.clear_board(Board::B), 1);
    let mut events = Vec::new();

    let position = centre(&world, Board::B, CellCoord::new(1, 1));
    assert_eq!(world.drop_at(unit, Board::B, position, &mut events), DropOutcome::Ignored);
    assert!(events.is_empty());
    assert_eq!(query::occupant(&world, Board::B, CellCoord::new(1, 1)), None);
}

#[test]
fn swapping_boards_moves_units_and_tiles_without_respawning() {
    let mut world = default_world();
    let unit = knife(&mut world, 1, Board::A, CellCoord::new(0, 0));
    let tile = query::tiles(&world, Board::A)[0];
    let before = query::placement(&world, unit).map(|placement| placement.position);
    let mut events = Vec::new();

    world::apply(&mut world, Command::SwapBoards, &mut events);

    assert_eq!(events, vec![Event::BoardsSwapped { swapped: true }]);
    assert!(query::layout(&world).is_swapped());
    assert_eq!(query::occupant(&world, Board::A, CellCoord::new(0, 0)), Some(unit));
    let after = query::placement(&world, unit).map(|placement| placement.position);
    assert_ne!(before, after);
    assert_eq!(after, Some(query::layout(&world).to_world(Board::A, CellCoord::new(0, 0))));
    assert_eq!(
        query::placement(&world, tile).map(|placement| placement.position),
        after
    );
    assert_eq!(query::body(&world, unit).map(|body| body.spawns()), Some(1));
}

#[test]
fn releasing_tiles_returns_them_to_the_pool() {
    let mut world = default_world();
    let mut events = Vec::new();

    world::apply(&mut world, Command::ReleaseTiles { board: Board::A }, &mut events);

    assert_eq!(
        events,
        vec![Event::TilesReleased {
            board: Board::A,
            released: 64,
        }]
    );
    assert!(query::tiles(&world, Board::A).is_empty());
    let stats = query::pool_stats(&world, query::tile_template(&world));
    assert_eq!((stats.active, stats.inactive), (64, 64));
}

#[test]
fn clear_all_reports_each_board() {
    let mut world = default_world();
    let _ = knife(&mut world, 1, Board::A, CellCoord::new(0, 0));
    let _ = knife(&mut world, 1, Board::B, CellCoord::new(0, 0));
    let _ = knife(&mut world, 1, Board::B, CellCoord::new(0, 1));
    let mut events = Vec::new();

    world::apply(&mut world, Command::ClearAll, &mut events);

    assert_eq!(
        events,
        vec![
            Event::BoardCleared {
                board: Board::A,
                released: 1,
            },
            Event::BoardCleared {
                board: Board::B,
                released: 2,
            },
        ]
    );
}

#[test]
fn non_finite_drop_reverts_home() {
    let mut world = default_world();
    let unit = knife(&mut world, 1, Board::B, CellCoord::new(2, 2));
    let mut events = Vec::new();
    let _ = world.pick_up(unit);

    let outcome = world.drop_at(unit, Board::B, Vec3::new(f32::NAN, 0.0, f32::NAN), &mut events);

    assert_eq!(outcome, DropOutcome::Reverted);
    assert_eq!(query::location(&world, unit), Some((Board::B, CellCoord::new(2, 2))));
    assert_eq!(query::occupant(&world, Board::B, CellCoord::new(0, 0)), None);
}

#[test]
fn reverting_into_a_taken_home_releases_the_unit() {
    let mut world = default_world();
    let home = CellCoord::new(0, 0);
    let lifted = knife(&mut world, 1, Board::B, home);
    let _ = world.pick_up(lifted);
    let squatter = knife(&mut world, 2, Board::B, home);
    let mut events = Vec::new();

    let outcome = world.drop_at(lifted, Board::B, Vec3::new(-3.0, 0.0, 40.0), &mut events);

    assert_eq!(outcome, DropOutcome::Released);
    assert_eq!(events, vec![Event::UnitReleased { instance: lifted }]);
    assert!(!query::is_active(&world, lifted));
    assert!(query::unit(&world, lifted).is_none());
    assert_eq!(query::occupant(&world, Board::B, home), Some(squatter));

    assert_eq!(world.clear_all(), 1);
    assert_eq!(query::units(&world).count(), 0);
    assert_eq!(
        query::pool_stats(&world, &TemplateId::new("knife/1")).active,
        0
    );
}
