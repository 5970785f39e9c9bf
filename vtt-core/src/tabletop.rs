//! One table session.
//!
//! [`Tabletop`] owns the grid, board, roster, combat resolver, pointer
//! interaction and chat log for a single table, and enforces who may do what.
//! It is the entry point UI collaborators drive.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vtt_core::{Catalog, Cell, Character, StatBlock, Tabletop, TabletopConfig, User};
//!
//! let mut table = Tabletop::new(TabletopConfig::new("Crypt"), Arc::new(Catalog::standard()));
//! let dm = User::dm("gm");
//! let hero = table.add_character(Character::new(1, "alice", StatBlock::new("Aria", 12)));
//!
//! table.place(&dm, hero, Cell::new(2, 3)).unwrap();
//! assert_eq!(table.board().entity_at(Cell::new(2, 3)), Some(hero));
//!
//! let outcome = table.chat(&User::player("alice"), "/roll 1d20+5");
//! assert_eq!(outcome.kind(), "roll");
//! ```

use crate::board::{can_control, Board, BoardError, BoardSnapshot};
use crate::catalog::Catalog;
use crate::chat::{process_chat, Author, ChatLog, ChatOutcome};
use crate::combat::{CombatError, CombatResolver, Resolution, Target, DEFAULT_TERRAIN_DURATION};
use crate::dice::{DieRoller, RngRoller};
use crate::entity::{Character, EntityKind, EntityRef, Monster, Roster, User};
use crate::grid::{Cell, GridConfig, GridSystem};
use crate::interaction::{Command, Interaction, InteractionConfig, PointerEvent, Scene};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from table operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabletopError {
    #[error("board error: {0}")]
    Board(#[from] BoardError),

    #[error("combat error: {0}")]
    Combat(#[from] CombatError),

    #[error("{user} cannot control {entity}")]
    NotControllable { user: String, entity: EntityRef },

    #[error("unknown entity {0}")]
    UnknownEntity(EntityRef),
}

/// Configuration for a table session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabletopConfig {
    pub name: String,
    pub grid: GridConfig,
    pub interaction: InteractionConfig,
    /// Duration stamped on terrain left by area attacks.
    pub terrain_duration: u32,
}

impl TabletopConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_interaction(mut self, interaction: InteractionConfig) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn with_terrain_duration(mut self, duration: u32) -> Self {
        self.terrain_duration = duration;
        self
    }
}

impl Default for TabletopConfig {
    fn default() -> Self {
        Self {
            name: "Untitled Table".to_string(),
            grid: GridConfig::default(),
            interaction: InteractionConfig::default(),
            terrain_duration: DEFAULT_TERRAIN_DURATION,
        }
    }
}

/// Something that happened in response to a pointer gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    SelectionChanged(Vec<EntityRef>),
    Moved(Vec<(EntityRef, Cell)>),
    MoveRefused(TabletopError),
    AttackResolved(Resolution),
    TargetRefused(TabletopError),
}

/// A single tabletop session.
pub struct Tabletop {
    config: TabletopConfig,
    grid: GridSystem,
    board: Board,
    roster: Roster,
    combat: CombatResolver,
    interaction: Interaction,
    chat: ChatLog,
    roller: Box<dyn DieRoller + Send>,
}

impl Tabletop {
    /// Create an empty table rolling with an entropy-seeded RNG.
    pub fn new(config: TabletopConfig, catalog: Arc<Catalog>) -> Self {
        Self::with_parts(config, catalog, Board::new(), Roster::new())
    }

    /// Create a table from existing board and roster state.
    pub fn with_parts(
        config: TabletopConfig,
        catalog: Arc<Catalog>,
        board: Board,
        roster: Roster,
    ) -> Self {
        let mut table = Self {
            grid: GridSystem::new(config.grid),
            board,
            roster,
            combat: CombatResolver::new(catalog).with_terrain_duration(config.terrain_duration),
            interaction: Interaction::new(config.interaction.clone()),
            chat: ChatLog::new(),
            roller: Box::new(RngRoller::new(StdRng::from_entropy())),
            config,
        };
        table.sync_placed_flags();
        table
    }

    /// Replace the dice source, e.g. with a seeded or scripted roller.
    pub fn with_roller(mut self, roller: impl DieRoller + Send + 'static) -> Self {
        self.set_roller(roller);
        self
    }

    pub fn set_roller(&mut self, roller: impl DieRoller + Send + 'static) {
        self.roller = Box::new(roller);
    }

    // --- accessors ----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &TabletopConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridSystem {
        &self.grid
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn catalog(&self) -> &Catalog {
        self.combat.catalog()
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut Interaction {
        &mut self.interaction
    }

    pub fn chat_log(&self) -> &ChatLog {
        &self.chat
    }

    pub fn chat_log_mut(&mut self) -> &mut ChatLog {
        &mut self.chat
    }

    // --- roster -------------------------------------------------------------

    /// Add a character. Its `placed` flag is taken from the board, not the input.
    pub fn add_character(&mut self, character: Character) -> EntityRef {
        let entity = self.roster.add_character(character);
        let placed = self.board.position_of(entity.kind, entity.id).is_some();
        self.roster.set_placed(entity, placed);
        entity
    }

    pub fn add_monster(&mut self, monster: Monster) -> EntityRef {
        self.roster.add_monster(monster)
    }

    // --- board --------------------------------------------------------------

    fn authorize(&self, user: &User, entity: EntityRef) -> Result<(), TabletopError> {
        if !self.roster.contains(entity) {
            return Err(TabletopError::UnknownEntity(entity));
        }
        if !can_control(entity, user, &self.roster) {
            warn!(user = %user.name, %entity, "action refused");
            return Err(TabletopError::NotControllable {
                user: user.name.clone(),
                entity,
            });
        }
        Ok(())
    }

    /// Place an entity the user controls onto a free cell.
    pub fn place(&mut self, user: &User, entity: EntityRef, cell: Cell) -> Result<(), TabletopError> {
        self.authorize(user, entity)?;
        self.board.place(entity, cell)?;
        self.roster.set_placed(entity, true);
        Ok(())
    }

    /// Move a placed entity the user controls. Returns the cell it left.
    pub fn move_entity(
        &mut self,
        user: &User,
        entity: EntityRef,
        to: Cell,
    ) -> Result<Cell, TabletopError> {
        self.authorize(user, entity)?;
        Ok(self.board.move_entity(entity, to)?)
    }

    /// Move several entities at once; every one must be controllable.
    pub fn move_tokens(
        &mut self,
        user: &User,
        moves: &[(EntityRef, Cell)],
    ) -> Result<(), TabletopError> {
        for &(entity, _) in moves {
            self.authorize(user, entity)?;
        }
        Ok(self.board.move_group(moves)?)
    }

    /// Take an entity off the board. Returns the cell it occupied.
    pub fn remove(&mut self, user: &User, entity: EntityRef) -> Result<Option<Cell>, TabletopError> {
        self.authorize(user, entity)?;
        let cell = self.board.remove(entity);
        self.roster.set_placed(entity, false);
        Ok(cell)
    }

    // --- combat -------------------------------------------------------------

    /// Start targeting with one of the attacker's attacks.
    pub fn begin_attack(
        &mut self,
        user: &User,
        attacker: EntityRef,
        attack_index: usize,
    ) -> Result<(), TabletopError> {
        self.authorize(user, attacker)?;
        let area = self
            .combat
            .begin_attack(&self.roster, attacker, attack_index)?
            .is_area();
        self.interaction.begin_targeting(area);
        Ok(())
    }

    /// Abort a pending attack. Returns whether one was pending.
    pub fn cancel_attack(&mut self) -> bool {
        let pending = self.combat.cancel().is_some();
        if pending {
            self.interaction.cancel();
        }
        pending
    }

    /// Resolve the pending attack against `target` and narrate it to chat.
    ///
    /// Only a user who controls the pending attacker may pick the target.
    pub fn target(&mut self, user: &User, target: Target) -> Result<Resolution, TabletopError> {
        let attacker = self
            .combat
            .pending()
            .map(|pending| pending.attacker)
            .ok_or(CombatError::NotTargeting)?;
        self.authorize(user, attacker)?;
        let resolution = self.combat.resolve_target(
            &mut self.roster,
            &mut self.board,
            target,
            &mut *self.roller,
        )?;
        self.interaction.cancel();
        for message in &resolution.messages {
            self.chat.narrate(message.clone());
        }
        info!(defeated = resolution.defeated().len(), "attack narrated");
        Ok(resolution)
    }

    // --- chat ---------------------------------------------------------------

    /// Process a chat line from `user` and record it in the log.
    pub fn chat(&mut self, user: &User, input: &str) -> ChatOutcome {
        let outcome = process_chat(input, &mut *self.roller);
        debug!(user = %user.name, kind = outcome.kind(), "chat");
        self.chat.push(Author::User(user.name.clone()), outcome.clone());
        outcome
    }

    // --- pointer ------------------------------------------------------------

    /// Feed a pointer event from `user` and execute the resulting commands.
    pub fn pointer(&mut self, user: &User, event: PointerEvent) -> Vec<TableEvent> {
        let scene = Scene {
            grid: &self.grid,
            board: &self.board,
            roster: &self.roster,
            user,
        };
        let commands = self.interaction.handle(event, &scene);
        commands
            .into_iter()
            .map(|command| self.execute(user, command))
            .collect()
    }

    fn execute(&mut self, user: &User, command: Command) -> TableEvent {
        match command {
            Command::Select(selection) => TableEvent::SelectionChanged(selection),
            Command::MoveTokens(moves) => match self.move_tokens(user, &moves) {
                Ok(()) => TableEvent::Moved(moves),
                Err(err) => TableEvent::MoveRefused(err),
            },
            Command::TargetEntity(entity) => {
                self.target_from_pointer(user, Target::Entity(entity))
            }
            Command::TargetCell(cell) => self.target_from_pointer(user, Target::Cell(cell)),
        }
    }

    fn target_from_pointer(&mut self, user: &User, target: Target) -> TableEvent {
        match self.target(user, target) {
            Ok(resolution) => TableEvent::AttackResolved(resolution),
            Err(err) => {
                // Still pending: keep listening for a usable click.
                if let Some(pending) = self.combat.pending() {
                    let area = pending.is_area();
                    self.interaction.begin_targeting(area);
                }
                TableEvent::TargetRefused(err)
            }
        }
    }

    // --- snapshot -----------------------------------------------------------

    pub fn snapshot(&self) -> BoardSnapshot {
        self.board.snapshot()
    }

    /// Replace board state from a snapshot. On error nothing changes.
    pub fn restore(&mut self, snapshot: &BoardSnapshot) -> Result<(), TabletopError> {
        self.board.restore(snapshot)?;
        self.sync_placed_flags();
        Ok(())
    }

    fn sync_placed_flags(&mut self) {
        for (id, character) in self.roster.characters.iter_mut() {
            character.placed = self
                .board
                .position_of(EntityKind::Character, *id)
                .is_some();
        }
    }
}
