//! Virtual tabletop core.
//!
//! This crate provides:
//! - Dice expression parsing and rolling behind a swappable randomness source
//! - Square and hex grid coordinate mapping, snapping and area-of-effect shapes
//! - Board occupancy with single-occupant cells and DM/player control rules
//! - Single-target and area attack resolution with an effect pipeline
//! - Pointer gesture handling for selection, token drags and targeting
//! - Versioned JSON save/load of a table
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use vtt_core::{
//!     AttackEntry, Catalog, Cell, Character, Monster, StatBlock, Tabletop, TabletopConfig,
//!     Target, User,
//! };
//!
//! let mut table = Tabletop::new(TabletopConfig::new("Goblin Cave"), Arc::new(Catalog::standard()));
//! let dm = User::dm("gm");
//! let alice = User::player("alice");
//!
//! let hero = table.add_character(
//!     Character::new(1, "alice", StatBlock::new("Aria", 12))
//!         .with_attack(AttackEntry::weapon("longsword", 0)),
//! );
//! let goblin = table.add_monster(Monster::new(1, StatBlock::new("Goblin", 7)));
//! table.place(&alice, hero, Cell::new(2, 2)).unwrap();
//! table.place(&dm, goblin, Cell::new(2, 3)).unwrap();
//!
//! table.begin_attack(&alice, hero, 0).unwrap();
//! let resolution = table.target(&alice, Target::Entity(goblin)).unwrap();
//! println!("{}", resolution.narrative());
//! ```

pub mod board;
pub mod catalog;
pub mod chat;
pub mod combat;
pub mod dice;
pub mod entity;
pub mod grid;
pub mod interaction;
pub mod persist;
pub mod tabletop;
pub mod testing;

// Primary public API
pub use board::{can_control, Board, BoardError, BoardSnapshot, TerrainEffect};
pub use catalog::{AttackDefinition, Catalog, CatalogId, Weapon};
pub use chat::{process_chat, ChatLog, ChatOutcome};
pub use combat::{apply_effects, CombatError, CombatResolver, Effect, Resolution, Target};
pub use dice::{DiceExpression, DiceRollResult, DieRoller, RngRoller};
pub use entity::{
    Ability, AbilityScores, AttackEntry, Character, EntityKind, EntityRef, Monster, Roster,
    StatBlock, User,
};
pub use grid::{area_cells, AreaShape, Cell, GridConfig, GridKind, GridSystem, Point, Rect};
pub use interaction::{Command, Interaction, InteractionConfig, PointerEvent, Viewport};
pub use persist::{PersistError, SavedTable};
pub use tabletop::{TableEvent, Tabletop, TabletopConfig, TabletopError};
