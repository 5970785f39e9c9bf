//! Board occupancy, control rules and pointer gestures through the table.

mod common;

use vtt_core::interaction::MouseButton;
use vtt_core::tabletop::TableEvent;
use vtt_core::testing::{assert_empty, assert_occupied, TableHarness};
use vtt_core::{
    can_control, Board, BoardError, Cell, EntityRef, GridConfig, GridSystem, Point, PointerEvent,
    Rect, TabletopError, User,
};

fn party() -> (TableHarness, EntityRef, EntityRef, EntityRef) {
    common::init_tracing();
    let mut harness = TableHarness::new();
    let aria = harness.character(1, "player1", "Aria", 12);
    let bram = harness.character(2, "player2", "Bram", 14);
    let wolf = harness.monster(1, "Wolf", 11);
    harness.place(aria, 1, 1).unwrap();
    harness.place(bram, 1, 3).unwrap();
    harness.place(wolf, 5, 5).unwrap();
    (harness, aria, bram, wolf)
}

#[test]
fn test_place_then_entity_at() {
    let mut board = Board::new();
    let aria = EntityRef::character(1);
    for row in 0..5 {
        for col in 0..5 {
            let mut board = board.clone();
            board.place(aria, Cell::new(row, col)).unwrap();
            assert_eq!(board.entity_at(Cell::new(row, col)), Some(aria));
        }
    }

    board.place(aria, Cell::new(0, 0)).unwrap();
    let before = board.snapshot();
    assert!(matches!(
        board.place(EntityRef::monster(1), Cell::new(0, 0)),
        Err(BoardError::CellOccupied { .. })
    ));
    assert_eq!(board.snapshot(), before);
}

#[test]
fn test_control_matrix() {
    let (harness, aria, bram, wolf) = party();
    let roster = harness.table.roster();
    let dm = User::dm("dm");
    let p1 = User::player("player1");
    let p2 = User::player("player2");

    for entity in [aria, bram, wolf] {
        assert!(can_control(entity, &dm, roster));
    }
    assert!(can_control(aria, &p1, roster));
    assert!(can_control(bram, &p2, roster));
    assert!(!can_control(bram, &p1, roster));
    assert!(!can_control(aria, &p2, roster));
    assert!(!can_control(wolf, &p1, roster));
    assert!(!can_control(wolf, &p2, roster));
}

#[test]
fn test_player_drags_own_token() {
    let (mut harness, aria, _, _) = party();
    let p1 = User::player("player1");

    let events = harness.drag(&p1, Cell::new(1, 1), Cell::new(2, 2));
    assert_eq!(
        events,
        vec![
            TableEvent::SelectionChanged(vec![aria]),
            TableEvent::Moved(vec![(aria, Cell::new(2, 2))]),
        ]
    );
    assert_occupied(&harness, Cell::new(2, 2), aria);
    assert_empty(&harness, Cell::new(1, 1));
}

#[test]
fn test_player_cannot_drag_others() {
    let (mut harness, _, bram, wolf) = party();
    let p1 = User::player("player1");

    let events = harness.drag(&p1, Cell::new(1, 3), Cell::new(3, 3));
    assert_eq!(events, vec![TableEvent::SelectionChanged(vec![bram])]);
    assert_occupied(&harness, Cell::new(1, 3), bram);

    let events = harness.drag(&p1, Cell::new(5, 5), Cell::new(6, 6));
    assert_eq!(events, vec![TableEvent::SelectionChanged(vec![wolf])]);
    assert_occupied(&harness, Cell::new(5, 5), wolf);
}

#[test]
fn test_drag_onto_occupied_cell_is_refused() {
    let (mut harness, aria, bram, _) = party();
    let dm = harness.dm.clone();

    let events = harness.drag(&dm, Cell::new(1, 1), Cell::new(1, 3));
    match events.as_slice() {
        [TableEvent::SelectionChanged(_), TableEvent::MoveRefused(TabletopError::Board(
            BoardError::CellOccupied { occupant, .. },
        ))] => assert_eq!(*occupant, bram),
        other => panic!("unexpected events {other:?}"),
    }
    assert_occupied(&harness, Cell::new(1, 1), aria);
}

#[test]
fn test_marquee_through_zoomed_viewport() {
    let (mut harness, aria, bram, _) = party();
    let dm = harness.dm.clone();
    {
        let viewport = harness.table.interaction_mut().viewport_mut();
        viewport.zoom = 2.0;
        viewport.pan = Point::new(-40.0, -40.0);
    }

    // Screen (40, 80)-(380, 150) is world (40, 60)-(210, 95), starting on the
    // empty cell left of Aria.
    harness.table.pointer(
        &dm,
        PointerEvent::Down {
            pos: Point::new(40.0, 80.0),
            button: MouseButton::Left,
            shift: false,
        },
    );
    let events = harness.table.pointer(
        &dm,
        PointerEvent::Up {
            pos: Point::new(380.0, 150.0),
            button: MouseButton::Left,
        },
    );
    assert_eq!(events, vec![TableEvent::SelectionChanged(vec![aria, bram])]);
    assert_eq!(harness.table.interaction().selection(), &[aria, bram]);
}

#[test]
fn test_group_drag_keeps_formation() {
    let (mut harness, aria, bram, _) = party();
    let dm = harness.dm.clone();
    harness
        .table
        .interaction_mut()
        .set_selection(vec![aria, bram]);

    let events = harness.drag(&dm, Cell::new(1, 1), Cell::new(3, 2));
    assert_eq!(
        events,
        vec![TableEvent::Moved(vec![
            (aria, Cell::new(3, 2)),
            (bram, Cell::new(3, 4)),
        ])]
    );
    assert_occupied(&harness, Cell::new(3, 4), bram);
}

#[test]
fn test_occupants_in_rect_on_hex_grid() {
    let grid = GridSystem::new(GridConfig::hex(30.0));
    let mut board = Board::new();
    board.place(EntityRef::character(1), Cell::new(0, 0)).unwrap();
    board.place(EntityRef::monster(1), Cell::new(6, 6)).unwrap();

    let around_origin = Rect::from_corners(Point::new(-10.0, -10.0), Point::new(10.0, 10.0));
    let hits = board.occupants_in_rect(&around_origin, &grid);
    assert_eq!(hits, vec![(Cell::new(0, 0), EntityRef::character(1))]);
}
