//! Board occupancy.
//!
//! The board is the single source of truth for which entity stands in which
//! cell. At most one entity occupies a cell; placing into an occupied cell is
//! refused and leaves the board untouched. Terrain effects left by area attacks
//! are stored per cell alongside occupancy.

use crate::entity::{EntityKind, EntityRef, Roster, User};
use crate::grid::{Cell, CellKeyError, GridSystem, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Errors from board operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("cell {cell} is already occupied by {occupant}")]
    CellOccupied { cell: Cell, occupant: EntityRef },

    #[error("{entity} is already on the board at {cell}")]
    AlreadyPlaced { entity: EntityRef, cell: Cell },

    #[error("{0} is not on the board")]
    NotPlaced(EntityRef),

    #[error(transparent)]
    InvalidCellKey(#[from] CellKeyError),
}

/// A persistent marker left on a cell, e.g. "acidic ground".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainEffect {
    #[serde(rename = "type")]
    pub kind: String,
    /// Stored as given; nothing in the core counts it down.
    pub duration: u32,
}

impl TerrainEffect {
    pub fn new(kind: impl Into<String>, duration: u32) -> Self {
        Self {
            kind: kind.into(),
            duration,
        }
    }
}

/// Whether `user` may move, target with or otherwise command `entity`.
///
/// The DM controls everything. Players control only characters they own;
/// monsters are never player-controlled.
pub fn can_control(entity: EntityRef, user: &User, roster: &Roster) -> bool {
    if user.is_dm() {
        return true;
    }
    match entity.kind {
        EntityKind::Character => roster.owner_of(entity) == Some(user.name.as_str()),
        EntityKind::Monster => false,
    }
}

/// Who stands where, plus terrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    occupancy: HashMap<Cell, EntityRef>,
    terrain: HashMap<Cell, TerrainEffect>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an entity that is not yet on the board into `cell`.
    pub fn place(&mut self, entity: EntityRef, cell: Cell) -> Result<(), BoardError> {
        if let Some(&occupant) = self.occupancy.get(&cell) {
            return Err(BoardError::CellOccupied { cell, occupant });
        }
        if let Some(existing) = self.position_of(entity.kind, entity.id) {
            return Err(BoardError::AlreadyPlaced {
                entity,
                cell: existing,
            });
        }
        self.occupancy.insert(cell, entity);
        debug!(%entity, %cell, "entity placed");
        Ok(())
    }

    /// Move a placed entity to `to`, returning the cell it left.
    ///
    /// Moving onto the entity's own cell is a no-op.
    pub fn move_entity(&mut self, entity: EntityRef, to: Cell) -> Result<Cell, BoardError> {
        let from = self
            .position_of(entity.kind, entity.id)
            .ok_or(BoardError::NotPlaced(entity))?;
        if from == to {
            return Ok(from);
        }
        if let Some(&occupant) = self.occupancy.get(&to) {
            return Err(BoardError::CellOccupied { cell: to, occupant });
        }
        self.occupancy.remove(&from);
        self.occupancy.insert(to, entity);
        debug!(%entity, %from, %to, "entity moved");
        Ok(from)
    }

    /// Move several placed entities at once. Either every move lands or none do.
    ///
    /// Movers may swap into each other's vacated cells; only the final layout
    /// has to respect single occupancy.
    pub fn move_group(&mut self, moves: &[(EntityRef, Cell)]) -> Result<(), BoardError> {
        let mut next = self.clone();
        for &(entity, _) in moves {
            next.remove(entity).ok_or(BoardError::NotPlaced(entity))?;
        }
        for &(entity, to) in moves {
            next.place(entity, to)?;
        }
        self.occupancy = next.occupancy;
        debug!(count = moves.len(), "group moved");
        Ok(())
    }

    /// Take an entity off the board, returning the cell it occupied.
    pub fn remove(&mut self, entity: EntityRef) -> Option<Cell> {
        let cell = self.position_of(entity.kind, entity.id)?;
        self.occupancy.remove(&cell);
        Some(cell)
    }

    pub fn entity_at(&self, cell: Cell) -> Option<EntityRef> {
        self.occupancy.get(&cell).copied()
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.occupancy.contains_key(&cell)
    }

    /// Reverse lookup; linear in the number of occupied cells.
    pub fn position_of(&self, kind: EntityKind, id: u32) -> Option<Cell> {
        self.occupancy
            .iter()
            .find(|(_, e)| e.kind == kind && e.id == id)
            .map(|(&cell, _)| cell)
    }

    /// All occupied cells, in cell order.
    pub fn occupants(&self) -> Vec<(Cell, EntityRef)> {
        let mut occupants: Vec<_> = self.occupancy.iter().map(|(&c, &e)| (c, e)).collect();
        occupants.sort();
        occupants
    }

    pub fn occupied_count(&self) -> usize {
        self.occupancy.len()
    }

    /// Occupied cells whose pixel footprint intersects `rect` (world space).
    pub fn occupants_in_rect(&self, rect: &Rect, grid: &GridSystem) -> Vec<(Cell, EntityRef)> {
        self.occupants()
            .into_iter()
            .filter(|(cell, _)| grid.cell_bounds(*cell).intersects(rect))
            .collect()
    }

    // --- terrain ------------------------------------------------------------

    /// Set the terrain on a cell, replacing whatever was there.
    pub fn set_terrain(&mut self, cell: Cell, effect: TerrainEffect) {
        self.terrain.insert(cell, effect);
    }

    pub fn terrain_at(&self, cell: Cell) -> Option<&TerrainEffect> {
        self.terrain.get(&cell)
    }

    pub fn clear_terrain(&mut self, cell: Cell) -> Option<TerrainEffect> {
        self.terrain.remove(&cell)
    }

    /// All terrain effects, in cell order.
    pub fn terrain(&self) -> Vec<(Cell, &TerrainEffect)> {
        let mut terrain: Vec<_> = self.terrain.iter().map(|(&c, t)| (c, t)).collect();
        terrain.sort_by_key(|(c, _)| *c);
        terrain
    }

    // --- snapshot -----------------------------------------------------------

    /// Plain key-value form for save/load collaborators.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            occupancy: self
                .occupancy
                .iter()
                .map(|(cell, &entity)| (cell.key(), entity))
                .collect(),
            terrain: self
                .terrain
                .iter()
                .map(|(cell, effect)| (cell.key(), effect.clone()))
                .collect(),
        }
    }

    /// Build a board from a snapshot, validating keys and occupancy.
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Result<Self, BoardError> {
        let mut board = Board::new();
        for (key, &entity) in &snapshot.occupancy {
            let cell: Cell = key.parse()?;
            board.place(entity, cell)?;
        }
        for (key, effect) in &snapshot.terrain {
            let cell: Cell = key.parse()?;
            board.set_terrain(cell, effect.clone());
        }
        Ok(board)
    }

    /// Replace this board's contents with a snapshot. On error the board is unchanged.
    pub fn restore(&mut self, snapshot: &BoardSnapshot) -> Result<(), BoardError> {
        *self = Board::from_snapshot(snapshot)?;
        Ok(())
    }
}

/// Serializable board state keyed by `"row,col"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub occupancy: BTreeMap<String, EntityRef>,
    #[serde(default)]
    pub terrain: BTreeMap<String, TerrainEffect>,
}
