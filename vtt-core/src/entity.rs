//! Tabletop entities: characters, monsters and their stat blocks.
//!
//! Entities are created by outer collaborators (character sheets, monster
//! lists) and handed to the core through a [`Roster`]. The core only mutates
//! hit points and the `placed` flag.

use crate::catalog::AttackDefinition;
use crate::catalog::CatalogId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    #[serde(rename = "STR")]
    Strength,
    #[serde(rename = "DEX")]
    Dexterity,
    #[serde(rename = "CON")]
    Constitution,
    #[serde(rename = "INT")]
    Intelligence,
    #[serde(rename = "WIS")]
    Wisdom,
    #[serde(rename = "CHA")]
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Ability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ability::all()
            .into_iter()
            .find(|a| a.abbreviation().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown ability: {s}"))
    }
}

/// Standard ability-score-to-bonus conversion: `floor((score - 10) / 2)`.
pub fn ability_modifier(score: i32) -> i32 {
    score.saturating_sub(10).div_euclid(2)
}

/// Ability scores container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(rename = "STR")]
    pub strength: i32,
    #[serde(rename = "DEX")]
    pub dexterity: i32,
    #[serde(rename = "CON")]
    pub constitution: i32,
    #[serde(rename = "INT")]
    pub intelligence: i32,
    #[serde(rename = "WIS")]
    pub wisdom: i32,
    #[serde(rename = "CHA")]
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: i32) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Stat blocks
// ============================================================================

/// The part of an entity that combat reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pub name: String,
    pub abilities: AbilityScores,
    /// Current hit points. Not clamped; may go negative.
    #[serde(rename = "HP")]
    pub hp: i32,
    pub max_hp: i32,
    #[serde(rename = "AC")]
    pub armor_class: i32,
}

impl StatBlock {
    pub fn new(name: impl Into<String>, hp: i32) -> Self {
        Self {
            name: name.into(),
            abilities: AbilityScores::default(),
            hp,
            max_hp: hp,
            armor_class: 10,
        }
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_armor_class(mut self, ac: i32) -> Self {
        self.armor_class = ac;
        self
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }
}

/// One entry in an entity's attack list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AttackEntry {
    /// A weapon looked up in the catalog, with a per-entity bonus.
    Weapon {
        weapon_id: CatalogId,
        #[serde(default)]
        custom_mod: i32,
    },
    /// An attack definition looked up in the catalog.
    Catalog { attack_id: CatalogId },
    /// An attack defined inline on the entity.
    Custom(AttackDefinition),
}

impl AttackEntry {
    pub fn weapon(weapon_id: impl Into<CatalogId>, custom_mod: i32) -> Self {
        AttackEntry::Weapon {
            weapon_id: weapon_id.into(),
            custom_mod,
        }
    }

    pub fn catalog(attack_id: impl Into<CatalogId>) -> Self {
        AttackEntry::Catalog {
            attack_id: attack_id.into(),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Which collection an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Character,
    Monster,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Character => write!(f, "character"),
            EntityKind::Monster => write!(f, "monster"),
        }
    }
}

/// Reference to an entity: ids are unique within their kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: u32,
}

impl EntityRef {
    pub fn character(id: u32) -> Self {
        Self {
            kind: EntityKind::Character,
            id,
        }
    }

    pub fn monster(id: u32) -> Self {
        Self {
            kind: EntityKind::Monster,
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

/// A player character, controlled by its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: u32,
    pub owner: String,
    pub stats: StatBlock,
    pub attacks: Vec<AttackEntry>,
    /// Whether the character currently occupies a board cell.
    pub placed: bool,
}

impl Character {
    pub fn new(id: u32, owner: impl Into<String>, stats: StatBlock) -> Self {
        Self {
            id,
            owner: owner.into(),
            stats,
            attacks: Vec::new(),
            placed: false,
        }
    }

    pub fn with_attack(mut self, attack: AttackEntry) -> Self {
        self.attacks.push(attack);
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::character(self.id)
    }
}

/// A monster. Only the DM controls monsters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: u32,
    pub stats: StatBlock,
    pub attacks: Vec<AttackEntry>,
}

impl Monster {
    pub fn new(id: u32, stats: StatBlock) -> Self {
        Self {
            id,
            stats,
            attacks: Vec::new(),
        }
    }

    pub fn with_attack(mut self, attack: AttackEntry) -> Self {
        self.attacks.push(attack);
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::monster(self.id)
    }
}

// ============================================================================
// Roster
// ============================================================================

/// All entities known to a table, keyed by id within each kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub characters: BTreeMap<u32, Character>,
    pub monsters: BTreeMap<u32, Monster>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a character.
    pub fn add_character(&mut self, character: Character) -> EntityRef {
        let entity = character.entity_ref();
        self.characters.insert(character.id, character);
        entity
    }

    /// Add or replace a monster.
    pub fn add_monster(&mut self, monster: Monster) -> EntityRef {
        let entity = monster.entity_ref();
        self.monsters.insert(monster.id, monster);
        entity
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.stats(entity).is_some()
    }

    pub fn character(&self, id: u32) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: u32) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn monster(&self, id: u32) -> Option<&Monster> {
        self.monsters.get(&id)
    }

    pub fn stats(&self, entity: EntityRef) -> Option<&StatBlock> {
        match entity.kind {
            EntityKind::Character => self.characters.get(&entity.id).map(|c| &c.stats),
            EntityKind::Monster => self.monsters.get(&entity.id).map(|m| &m.stats),
        }
    }

    pub fn stats_mut(&mut self, entity: EntityRef) -> Option<&mut StatBlock> {
        match entity.kind {
            EntityKind::Character => self.characters.get_mut(&entity.id).map(|c| &mut c.stats),
            EntityKind::Monster => self.monsters.get_mut(&entity.id).map(|m| &mut m.stats),
        }
    }

    pub fn attacks_of(&self, entity: EntityRef) -> Option<&[AttackEntry]> {
        match entity.kind {
            EntityKind::Character => self
                .characters
                .get(&entity.id)
                .map(|c| c.attacks.as_slice()),
            EntityKind::Monster => self.monsters.get(&entity.id).map(|m| m.attacks.as_slice()),
        }
    }

    /// Owner of a character; monsters have none.
    pub fn owner_of(&self, entity: EntityRef) -> Option<&str> {
        match entity.kind {
            EntityKind::Character => self
                .characters
                .get(&entity.id)
                .map(|c| c.owner.as_str()),
            EntityKind::Monster => None,
        }
    }

    pub fn name_of(&self, entity: EntityRef) -> Option<&str> {
        self.stats(entity).map(|s| s.name.as_str())
    }

    /// Update a character's `placed` flag. Monsters carry no flag.
    pub fn set_placed(&mut self, entity: EntityRef, placed: bool) {
        if entity.kind == EntityKind::Character {
            if let Some(character) = self.characters.get_mut(&entity.id) {
                character.placed = placed;
            }
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Dm,
    Player,
}

/// The user issuing a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn dm(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Dm,
        }
    }

    pub fn player(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Player,
        }
    }

    pub fn is_dm(&self) -> bool {
        self.role == Role::Dm
    }
}
