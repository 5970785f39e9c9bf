//! Weapon and attack reference tables.
//!
//! A [`Catalog`] is read-only data handed to combat at construction. The
//! standard tables below cover common weapons and a few area attacks; tables
//! loaded by outer collaborators can replace or extend them.

use crate::entity::{Ability, AttackEntry};
use crate::grid::AreaShape;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Catalog key. Tables may use integer or string ids; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CatalogId(pub String);

impl<'de> Deserialize<'de> for CatalogId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => CatalogId(n.to_string()),
            RawId::Text(s) => CatalogId(s),
        })
    }
}

impl From<&str> for CatalogId {
    fn from(s: &str) -> Self {
        CatalogId(s.to_string())
    }
}

impl From<String> for CatalogId {
    fn from(s: String) -> Self {
        CatalogId(s)
    }
}

impl From<u32> for CatalogId {
    fn from(n: u32) -> Self {
        CatalogId(n.to_string())
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown weapon: {0}")]
    UnknownWeapon(CatalogId),
    #[error("unknown attack: {0}")]
    UnknownAttack(CatalogId),
}

// ============================================================================
// Definitions
// ============================================================================

/// A weapon usable as a single-target attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: CatalogId,
    pub name: String,
    pub damage_dice: String,
    /// Ability that drives attack and damage modifiers.
    pub stat: Ability,
    #[serde(default)]
    pub base_mod: i32,
}

impl Weapon {
    pub fn new(
        id: impl Into<CatalogId>,
        name: impl Into<String>,
        damage_dice: impl Into<String>,
        stat: Ability,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            damage_dice: damage_dice.into(),
            stat,
            base_mod: 0,
        }
    }

    pub fn with_base_mod(mut self, base_mod: i32) -> Self {
        self.base_mod = base_mod;
        self
    }
}

/// Area covered by an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaOfEffect {
    pub shape: AreaShape,
    pub radius: u32,
}

/// Extra targeting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttackConditions {
    /// Skip characters that share the attacker's owner.
    #[serde(default)]
    pub exclude_allies: bool,
}

/// Generalized attack: single-target or area, with optional terrain effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDefinition {
    pub id: CatalogId,
    pub name: String,
    pub damage_dice: String,
    /// Ability driving the modifier; a missing stat counts as a score of 10.
    #[serde(default)]
    pub stat: Option<Ability>,
    #[serde(default)]
    pub base_mod: i32,
    #[serde(default)]
    pub custom_mod: Option<i32>,
    /// `None` for single-target attacks.
    #[serde(default)]
    pub area: Option<AreaOfEffect>,
    #[serde(default)]
    pub conditions: AttackConditions,
    /// Terrain left on every affected cell, e.g. "acidic ground".
    #[serde(default)]
    pub terrain_effect: Option<String>,
}

impl AttackDefinition {
    pub fn new(
        id: impl Into<CatalogId>,
        name: impl Into<String>,
        damage_dice: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            damage_dice: damage_dice.into(),
            stat: None,
            base_mod: 0,
            custom_mod: None,
            area: None,
            conditions: AttackConditions::default(),
            terrain_effect: None,
        }
    }

    pub fn with_stat(mut self, stat: Ability) -> Self {
        self.stat = Some(stat);
        self
    }

    pub fn with_base_mod(mut self, base_mod: i32) -> Self {
        self.base_mod = base_mod;
        self
    }

    pub fn with_custom_mod(mut self, custom_mod: i32) -> Self {
        self.custom_mod = Some(custom_mod);
        self
    }

    pub fn with_area(mut self, shape: AreaShape, radius: u32) -> Self {
        self.area = Some(AreaOfEffect { shape, radius });
        self
    }

    pub fn excluding_allies(mut self) -> Self {
        self.conditions.exclude_allies = true;
        self
    }

    pub fn with_terrain_effect(mut self, kind: impl Into<String>) -> Self {
        self.terrain_effect = Some(kind.into());
        self
    }

    pub fn is_area(&self) -> bool {
        self.area.is_some()
    }

    pub fn creates_terrain_effect(&self) -> bool {
        self.terrain_effect.is_some()
    }
}

/// An attack entry reduced to the numbers combat needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    pub name: String,
    pub damage_dice: String,
    pub stat: Option<Ability>,
    pub base_mod: i32,
    pub custom_mod: i32,
    pub area: Option<AreaOfEffect>,
    pub exclude_allies: bool,
    pub terrain_effect: Option<String>,
}

impl AttackProfile {
    fn from_weapon(weapon: &Weapon, custom_mod: i32) -> Self {
        Self {
            name: weapon.name.clone(),
            damage_dice: weapon.damage_dice.clone(),
            stat: Some(weapon.stat),
            base_mod: weapon.base_mod,
            custom_mod,
            area: None,
            exclude_allies: false,
            terrain_effect: None,
        }
    }

    fn from_definition(def: &AttackDefinition) -> Self {
        Self {
            name: def.name.clone(),
            damage_dice: def.damage_dice.clone(),
            stat: def.stat,
            base_mod: def.base_mod,
            custom_mod: def.custom_mod.unwrap_or(0),
            area: def.area,
            exclude_allies: def.conditions.exclude_allies,
            terrain_effect: def.terrain_effect.clone(),
        }
    }

    pub fn is_area(&self) -> bool {
        self.area.is_some()
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Read-only weapon and attack tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub weapons: BTreeMap<CatalogId, Weapon>,
    pub attacks: BTreeMap<CatalogId, AttackDefinition>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the standard tables.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for weapon in STANDARD_WEAPONS.iter() {
            catalog.add_weapon(weapon.clone());
        }
        for attack in STANDARD_ATTACKS.iter() {
            catalog.add_attack(attack.clone());
        }
        catalog
    }

    pub fn add_weapon(&mut self, weapon: Weapon) {
        self.weapons.insert(weapon.id.clone(), weapon);
    }

    pub fn add_attack(&mut self, attack: AttackDefinition) {
        self.attacks.insert(attack.id.clone(), attack);
    }

    pub fn with_weapon(mut self, weapon: Weapon) -> Self {
        self.add_weapon(weapon);
        self
    }

    pub fn with_attack(mut self, attack: AttackDefinition) -> Self {
        self.add_attack(attack);
        self
    }

    pub fn weapon(&self, id: &CatalogId) -> Option<&Weapon> {
        self.weapons.get(id)
    }

    pub fn attack(&self, id: &CatalogId) -> Option<&AttackDefinition> {
        self.attacks.get(id)
    }

    /// Find a weapon by display name, ignoring case.
    pub fn find_weapon_by_name(&self, name: &str) -> Option<&Weapon> {
        let name_lower = name.to_lowercase();
        self.weapons
            .values()
            .find(|w| w.name.to_lowercase() == name_lower)
    }

    /// Resolve an entity's attack entry against the tables.
    pub fn profile_for(&self, entry: &AttackEntry) -> Result<AttackProfile, CatalogError> {
        match entry {
            AttackEntry::Weapon {
                weapon_id,
                custom_mod,
            } => self
                .weapon(weapon_id)
                .map(|w| AttackProfile::from_weapon(w, *custom_mod))
                .ok_or_else(|| CatalogError::UnknownWeapon(weapon_id.clone())),
            AttackEntry::Catalog { attack_id } => self
                .attack(attack_id)
                .map(AttackProfile::from_definition)
                .ok_or_else(|| CatalogError::UnknownAttack(attack_id.clone())),
            AttackEntry::Custom(def) => Ok(AttackProfile::from_definition(def)),
        }
    }
}

// ============================================================================
// Standard tables
// ============================================================================

lazy_static::lazy_static! {
    /// Common melee and ranged weapons.
    pub static ref STANDARD_WEAPONS: Vec<Weapon> = vec![
        Weapon::new("club", "Club", "1d4", Ability::Strength),
        Weapon::new("dagger", "Dagger", "1d4", Ability::Dexterity),
        Weapon::new("handaxe", "Handaxe", "1d6", Ability::Strength),
        Weapon::new("mace", "Mace", "1d6", Ability::Strength),
        Weapon::new("shortsword", "Shortsword", "1d6", Ability::Dexterity),
        Weapon::new("scimitar", "Scimitar", "1d6", Ability::Dexterity),
        Weapon::new("longsword", "Longsword", "1d8", Ability::Strength),
        Weapon::new("rapier", "Rapier", "1d8", Ability::Dexterity),
        Weapon::new("warhammer", "Warhammer", "1d8", Ability::Strength),
        Weapon::new("greataxe", "Greataxe", "1d12", Ability::Strength),
        Weapon::new("greatsword", "Greatsword", "2d6", Ability::Strength),
        Weapon::new("shortbow", "Shortbow", "1d6", Ability::Dexterity),
        Weapon::new("longbow", "Longbow", "1d8", Ability::Dexterity),
        Weapon::new("light_crossbow", "Light Crossbow", "1d8", Ability::Dexterity),
    ];

    /// Area attacks and monster abilities.
    pub static ref STANDARD_ATTACKS: Vec<AttackDefinition> = vec![
        AttackDefinition::new("fireball", "Fireball", "8d6")
            .with_stat(Ability::Intelligence)
            .with_area(AreaShape::Circle, 2),
        AttackDefinition::new("burning_hands", "Burning Hands", "3d6")
            .with_stat(Ability::Intelligence)
            .with_area(AreaShape::Cone, 3),
        AttackDefinition::new("spirit_guardians", "Spirit Guardians", "3d8")
            .with_stat(Ability::Wisdom)
            .with_area(AreaShape::Circle, 3)
            .excluding_allies(),
        AttackDefinition::new("acid_spray", "Acid Spray", "2d6")
            .with_area(AreaShape::Cone, 2)
            .with_terrain_effect("acidic ground"),
        AttackDefinition::new("bite", "Bite", "1d6")
            .with_stat(Ability::Strength),
        AttackDefinition::new("claw", "Claw", "1d4")
            .with_stat(Ability::Strength)
            .with_base_mod(1),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_lookup() {
        let catalog = Catalog::standard();
        let sword = catalog.weapon(&"longsword".into()).unwrap();
        assert_eq!(sword.damage_dice, "1d8");
        assert_eq!(sword.stat, Ability::Strength);
        assert_eq!(
            catalog.find_weapon_by_name("LONGBOW").map(|w| &w.id),
            Some(&CatalogId::from("longbow"))
        );
        assert!(catalog.attack(&"fireball".into()).unwrap().is_area());
    }

    #[test]
    fn test_profile_for_weapon_entry() {
        let catalog = Catalog::new().with_weapon(
            Weapon::new(7u32, "Spear", "1d6", Ability::Strength).with_base_mod(2),
        );
        let profile = catalog.profile_for(&AttackEntry::weapon(7u32, 1)).unwrap();
        assert_eq!(profile.name, "Spear");
        assert_eq!(profile.stat, Some(Ability::Strength));
        assert_eq!(profile.base_mod, 2);
        assert_eq!(profile.custom_mod, 1);
        assert!(!profile.is_area());
    }

    #[test]
    fn test_profile_for_missing_entries() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.profile_for(&AttackEntry::weapon("nope", 0)),
            Err(CatalogError::UnknownWeapon("nope".into()))
        );
        assert_eq!(
            catalog.profile_for(&AttackEntry::catalog("nada")),
            Err(CatalogError::UnknownAttack("nada".into()))
        );
    }

    #[test]
    fn test_profile_for_inline_definition() {
        let def = AttackDefinition::new("breath", "Frost Breath", "4d6")
            .with_area(AreaShape::Cone, 3)
            .with_custom_mod(2)
            .excluding_allies();
        let profile = Catalog::new()
            .profile_for(&AttackEntry::Custom(def))
            .unwrap();
        assert_eq!(profile.custom_mod, 2);
        assert!(profile.exclude_allies);
        assert_eq!(profile.stat, None);
    }

    #[test]
    fn test_catalog_ids_accept_numbers_and_text() {
        let json = r#"{"id": 3, "name": "Net", "damage_dice": "0", "stat": "DEX"}"#;
        let weapon: Weapon = serde_json::from_str(json).unwrap();
        assert_eq!(weapon.id, CatalogId::from(3u32));
        assert_eq!(weapon.base_mod, 0);

        let json = r#"{"id": "cone-of-cold", "name": "Cone of Cold", "damage_dice": "8d8",
                       "area": {"shape": "cone", "radius": 4},
                       "conditions": {"exclude_allies": true}}"#;
        let def: AttackDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.id, CatalogId::from("cone-of-cold"));
        assert_eq!(
            def.area,
            Some(AreaOfEffect {
                shape: AreaShape::Cone,
                radius: 4
            })
        );
        assert!(def.conditions.exclude_allies);
        assert!(!def.creates_terrain_effect());
    }
}
