//! Testing utilities for tabletop scenarios.
//!
//! - `ScriptedRoller` replays fixed die values for deterministic combat
//! - `TableHarness` sets up a table with a DM and drives pointer gestures
//! - assertion helpers for HP and board occupancy

use crate::catalog::Catalog;
use crate::combat::{Resolution, Target};
use crate::dice::DieRoller;
use crate::entity::{Character, EntityRef, Monster, StatBlock, User};
use crate::grid::{Cell, Point};
use crate::interaction::{MouseButton, PointerEvent};
use crate::tabletop::{TableEvent, Tabletop, TabletopConfig, TabletopError};
use std::collections::VecDeque;
use std::sync::Arc;

/// A die roller that returns scripted values in order.
///
/// Values are returned as given, even if they exceed the die's sides. Once
/// the script runs out every roll returns the fallback (1 unless changed).
#[derive(Debug, Clone)]
pub struct ScriptedRoller {
    values: VecDeque<u32>,
    fallback: u32,
    consumed: usize,
}

impl ScriptedRoller {
    pub fn new(values: Vec<u32>) -> Self {
        Self {
            values: values.into(),
            fallback: 1,
            consumed: 0,
        }
    }

    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Queue more values after the current script.
    pub fn push(&mut self, value: u32) {
        self.values.push_back(value);
    }

    /// Scripted values not yet used.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Number of dice rolled so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl DieRoller for ScriptedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.consumed += 1;
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

/// A table with a DM, ready for scripted scenarios.
pub struct TableHarness {
    pub table: Tabletop,
    pub dm: User,
}

impl TableHarness {
    /// A table using the standard catalog and a roller that always rolls 1.
    pub fn new() -> Self {
        Self::with_catalog(Catalog::standard())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let table = Tabletop::new(TabletopConfig::new("Test Table"), Arc::new(catalog))
            .with_roller(ScriptedRoller::new(Vec::new()));
        Self {
            table,
            dm: User::dm("dm"),
        }
    }

    /// Script the next die values.
    pub fn script_rolls(&mut self, values: Vec<u32>) -> &mut Self {
        self.table.set_roller(ScriptedRoller::new(values));
        self
    }

    /// Add a character owned by `owner`.
    pub fn character(&mut self, id: u32, owner: &str, name: &str, hp: i32) -> EntityRef {
        self.table
            .add_character(Character::new(id, owner, StatBlock::new(name, hp)))
    }

    pub fn monster(&mut self, id: u32, name: &str, hp: i32) -> EntityRef {
        self.table.add_monster(Monster::new(id, StatBlock::new(name, hp)))
    }

    /// Place as the DM.
    pub fn place(&mut self, entity: EntityRef, row: u32, col: u32) -> Result<(), TabletopError> {
        let dm = self.dm.clone();
        self.table.place(&dm, entity, Cell::new(row, col))
    }

    /// Start an attack as the DM and resolve it against `target`.
    pub fn attack(
        &mut self,
        attacker: EntityRef,
        attack_index: usize,
        target: Target,
    ) -> Result<Resolution, TabletopError> {
        let dm = self.dm.clone();
        self.table.begin_attack(&dm, attacker, attack_index)?;
        self.table.target(&dm, target)
    }

    pub fn hp(&self, entity: EntityRef) -> Option<i32> {
        self.table.roster().stats(entity).map(|s| s.hp)
    }

    /// Screen position of a cell's center under the current viewport.
    fn screen_pos(&self, cell: Cell) -> Point {
        let world = self.table.grid().center_of(cell);
        self.table.interaction().viewport().world_to_screen(world)
    }

    /// Left click on a cell center.
    pub fn click(&mut self, user: &User, cell: Cell) -> Vec<TableEvent> {
        let pos = self.screen_pos(cell);
        let mut events = self.table.pointer(
            user,
            PointerEvent::Down {
                pos,
                button: MouseButton::Left,
                shift: false,
            },
        );
        events.extend(self.table.pointer(
            user,
            PointerEvent::Up {
                pos,
                button: MouseButton::Left,
            },
        ));
        events
    }

    /// Left drag from one cell center to another.
    pub fn drag(&mut self, user: &User, from: Cell, to: Cell) -> Vec<TableEvent> {
        let start = self.screen_pos(from);
        let end = self.screen_pos(to);
        let mut events = self.table.pointer(
            user,
            PointerEvent::Down {
                pos: start,
                button: MouseButton::Left,
                shift: false,
            },
        );
        events.extend(self.table.pointer(user, PointerEvent::Move { pos: end }));
        events.extend(self.table.pointer(
            user,
            PointerEvent::Up {
                pos: end,
                button: MouseButton::Left,
            },
        ));
        events
    }
}

impl Default for TableHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert an entity's current HP.
#[track_caller]
pub fn assert_hp(harness: &TableHarness, entity: EntityRef, expected: i32) {
    let actual = harness.hp(entity);
    assert_eq!(
        actual,
        Some(expected),
        "Expected {entity} to have {expected} HP, got {actual:?}"
    );
}

/// Assert that `entity` stands on `cell`.
#[track_caller]
pub fn assert_occupied(harness: &TableHarness, cell: Cell, entity: EntityRef) {
    let actual = harness.table.board().entity_at(cell);
    assert_eq!(
        actual,
        Some(entity),
        "Expected {entity} at {cell}, found {actual:?}"
    );
}

/// Assert that nothing stands on `cell`.
#[track_caller]
pub fn assert_empty(harness: &TableHarness, cell: Cell) {
    let actual = harness.table.board().entity_at(cell);
    assert!(actual.is_none(), "Expected {cell} to be empty, found {actual:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_roller_replays_then_falls_back() {
        let mut roller = ScriptedRoller::new(vec![6, 2]).with_fallback(3);
        assert_eq!(roller.roll_die(6), 6);
        assert_eq!(roller.roll_die(6), 2);
        assert_eq!(roller.roll_die(6), 3);
        assert_eq!(roller.roll_die(0), 0);
        assert_eq!(roller.consumed(), 3);
        assert_eq!(roller.remaining(), 0);
    }

    #[test]
    fn test_harness_click_and_drag() {
        let mut harness = TableHarness::new();
        let hero = harness.character(1, "alice", "Aria", 10);
        harness.place(hero, 1, 1).unwrap();
        let alice = User::player("alice");

        let events = harness.click(&alice, Cell::new(1, 1));
        assert_eq!(events, vec![TableEvent::SelectionChanged(vec![hero])]);

        let events = harness.drag(&alice, Cell::new(1, 1), Cell::new(3, 2));
        assert_eq!(events, vec![TableEvent::Moved(vec![(hero, Cell::new(3, 2))])]);
        assert_occupied(&harness, Cell::new(3, 2), hero);
        assert_empty(&harness, Cell::new(1, 1));
    }

    #[test]
    fn test_harness_attack() {
        let mut harness = TableHarness::new();
        let hero = harness.character(1, "alice", "Aria", 10);
        let rat = harness.monster(1, "Rat", 3);
        harness
            .table
            .roster_mut()
            .character_mut(1)
            .unwrap()
            .attacks
            .push(crate::entity::AttackEntry::weapon("dagger", 0));

        harness.script_rolls(vec![10, 4]);
        harness.attack(hero, 0, Target::Entity(rat)).unwrap();
        assert_hp(&harness, rat, -1);
    }
}
