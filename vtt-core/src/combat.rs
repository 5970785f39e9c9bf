//! Attack resolution with an effect pipeline.
//!
//! Combat mechanics run in two steps:
//! 1. A `resolve_*` call reads the roster and board, rolls dice and produces a
//!    [`Resolution`]: narrative lines plus the [`Effect`]s describing every
//!    state change.
//! 2. [`apply_effects`] writes those effects back into the roster and board.
//!
//! `perform_attack` and `perform_aoe_attack` do both in one call. The
//! [`CombatResolver`] additionally tracks the targeting state between
//! "Attack!" being pressed on an entity sheet and a target being picked.
//!
//! The attack roll is reported next to the target's AC but never gates
//! damage: every attack that reaches the damage step deals damage. HP is not
//! clamped and may go negative.

use crate::board::{Board, TerrainEffect};
use crate::catalog::{AreaOfEffect, AttackProfile, Catalog};
use crate::dice::{DiceExpression, DiceRollResult, DieRoller};
use crate::entity::{ability_modifier, AttackEntry, EntityKind, EntityRef, Roster, StatBlock};
use crate::grid::{area_cells, Cell};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Duration given to terrain created by area attacks. Nothing counts it down.
pub const DEFAULT_TERRAIN_DURATION: u32 = 5;

/// Ability score assumed when an attack names no stat.
const DEFAULT_ABILITY_SCORE: i32 = 10;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityRef),

    #[error("{attacker} has no attack at index {index}")]
    UnknownAttack { attacker: EntityRef, index: usize },

    #[error("no attack is awaiting a target")]
    NotTargeting,

    #[error("no entity at cell {0}")]
    NoTargetAtCell(Cell),

    #[error("{0} is not on the board")]
    NotOnBoard(EntityRef),
}

// ============================================================================
// Effects
// ============================================================================

/// A concrete state change or roll produced by resolving an attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// The d20 attack roll, reported against the target's AC.
    AttackRolled {
        attacker: EntityRef,
        target: EntityRef,
        roll: DiceRollResult,
        target_ac: i32,
    },

    /// Damage dice plus flat modifiers.
    DamageRolled {
        roll: DiceRollResult,
        modifier: i32,
        total: i32,
    },

    /// HP changed by `amount` (negative for damage).
    HpChanged {
        target: EntityRef,
        amount: i32,
        new_hp: i32,
    },

    /// The target's HP dropped to zero or below.
    Defeated { target: EntityRef, name: String },

    /// A terrain marker was laid on a cell.
    TerrainCreated { cell: Cell, effect: TerrainEffect },
}

/// The result of resolving one attack action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub messages: Vec<String>,
    pub effects: Vec<Effect>,
}

impl Resolution {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            effects: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// All messages joined into one block of text.
    pub fn narrative(&self) -> String {
        self.messages.join("\n")
    }

    /// True when nothing would change if the effects were applied.
    pub fn is_noop(&self) -> bool {
        !self
            .effects
            .iter()
            .any(|e| matches!(e, Effect::HpChanged { .. } | Effect::TerrainCreated { .. }))
    }

    /// Damage dealt to `target`, if it was hit.
    pub fn damage_to(&self, target: EntityRef) -> Option<i32> {
        self.effects.iter().find_map(|e| match e {
            Effect::HpChanged {
                target: t, amount, ..
            } if *t == target => Some(amount.saturating_neg()),
            _ => None,
        })
    }

    /// Entities whose HP this resolution changes, in order.
    pub fn targets_hit(&self) -> Vec<EntityRef> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::HpChanged { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn defeated(&self) -> Vec<EntityRef> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Defeated { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }
}

/// Apply effects to the roster and board.
pub fn apply_effects(roster: &mut Roster, board: &mut Board, effects: &[Effect]) {
    for effect in effects {
        apply_effect(roster, board, effect);
    }
}

/// Apply a single effect. Roll records carry no state and are skipped.
pub fn apply_effect(roster: &mut Roster, board: &mut Board, effect: &Effect) {
    match effect {
        Effect::HpChanged { target, amount, .. } => match roster.stats_mut(*target) {
            Some(stats) => stats.hp = stats.hp.saturating_add(*amount),
            None => warn!(%target, "hp change for unknown entity dropped"),
        },
        Effect::TerrainCreated { cell, effect } => board.set_terrain(*cell, effect.clone()),
        Effect::AttackRolled { .. } | Effect::DamageRolled { .. } | Effect::Defeated { .. } => {}
    }
}

/// `floor((score - 10) / 2)` for the profile's stat plus both flat bonuses.
pub fn attack_modifier(attacker: &StatBlock, profile: &AttackProfile) -> i32 {
    let score = profile
        .stat
        .map(|ability| attacker.abilities.get(ability))
        .unwrap_or(DEFAULT_ABILITY_SCORE);
    ability_modifier(score)
        .saturating_add(profile.base_mod)
        .saturating_add(profile.custom_mod)
}

// ============================================================================
// Targeting
// ============================================================================

/// An attack that has been started and is waiting for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAttack {
    pub attacker: EntityRef,
    pub attack_index: usize,
    pub entry: AttackEntry,
    /// Set for area attacks; decides whether a cell or an entity is expected.
    pub area: Option<AreaOfEffect>,
}

impl PendingAttack {
    pub fn is_area(&self) -> bool {
        self.area.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetingState {
    #[default]
    Idle,
    Targeting(PendingAttack),
}

/// What the user clicked while an attack was pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Entity(EntityRef),
    Cell(Cell),
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves single-target and area attacks against a shared catalog.
#[derive(Debug, Clone)]
pub struct CombatResolver {
    catalog: Arc<Catalog>,
    state: TargetingState,
    terrain_duration: u32,
}

impl CombatResolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            state: TargetingState::Idle,
            terrain_duration: DEFAULT_TERRAIN_DURATION,
        }
    }

    pub fn with_terrain_duration(mut self, duration: u32) -> Self {
        self.terrain_duration = duration;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &TargetingState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingAttack> {
        match &self.state {
            TargetingState::Targeting(pending) => Some(pending),
            TargetingState::Idle => None,
        }
    }

    pub fn is_targeting(&self) -> bool {
        self.pending().is_some()
    }

    /// Enter targeting with the attacker's `attack_index`-th attack.
    ///
    /// Starting a new attack replaces any pending one.
    pub fn begin_attack(
        &mut self,
        roster: &Roster,
        attacker: EntityRef,
        attack_index: usize,
    ) -> Result<&PendingAttack, CombatError> {
        let attacks = roster
            .attacks_of(attacker)
            .ok_or(CombatError::UnknownEntity(attacker))?;
        let entry = attacks
            .get(attack_index)
            .cloned()
            .ok_or(CombatError::UnknownAttack {
                attacker,
                index: attack_index,
            })?;
        // A missing catalog entry still enters targeting; resolution degrades.
        let area = self
            .catalog
            .profile_for(&entry)
            .ok()
            .and_then(|profile| profile.area);

        if let Some(previous) = self.pending() {
            debug!(attacker = %previous.attacker, "pending attack replaced");
        }
        debug!(%attacker, attack_index, area = area.is_some(), "targeting started");

        self.state = TargetingState::Targeting(PendingAttack {
            attacker,
            attack_index,
            entry,
            area,
        });
        match &self.state {
            TargetingState::Targeting(pending) => Ok(pending),
            TargetingState::Idle => Err(CombatError::NotTargeting),
        }
    }

    /// Abort targeting. No dice are rolled and nothing changes.
    pub fn cancel(&mut self) -> Option<PendingAttack> {
        match std::mem::take(&mut self.state) {
            TargetingState::Targeting(pending) => {
                debug!(attacker = %pending.attacker, "targeting cancelled");
                Some(pending)
            }
            TargetingState::Idle => None,
        }
    }

    /// Resolve the pending attack against `target` and return to idle.
    ///
    /// Single-target attacks need an entity (a clicked cell must be occupied);
    /// area attacks need a cell (a clicked entity must be on the board). An
    /// unusable target leaves the attack pending.
    pub fn resolve_target<R: DieRoller + ?Sized>(
        &mut self,
        roster: &mut Roster,
        board: &mut Board,
        target: Target,
        roller: &mut R,
    ) -> Result<Resolution, CombatError> {
        let pending = self.pending().cloned().ok_or(CombatError::NotTargeting)?;

        let resolution = if pending.is_area() {
            let center = match target {
                Target::Cell(cell) => cell,
                Target::Entity(entity) => board
                    .position_of(entity.kind, entity.id)
                    .ok_or(CombatError::NotOnBoard(entity))?,
            };
            self.perform_aoe_attack(roster, board, pending.attacker, &pending.entry, center, roller)?
        } else {
            let entity = match target {
                Target::Entity(entity) => entity,
                Target::Cell(cell) => board
                    .entity_at(cell)
                    .ok_or(CombatError::NoTargetAtCell(cell))?,
            };
            self.perform_attack(roster, board, pending.attacker, entity, &pending.entry, roller)?
        };

        self.state = TargetingState::Idle;
        Ok(resolution)
    }

    /// Resolve and apply a single-target attack.
    pub fn perform_attack<R: DieRoller + ?Sized>(
        &self,
        roster: &mut Roster,
        board: &mut Board,
        attacker: EntityRef,
        target: EntityRef,
        entry: &AttackEntry,
        roller: &mut R,
    ) -> Result<Resolution, CombatError> {
        let resolution = self.resolve_attack(roster, attacker, target, entry, roller)?;
        apply_effects(roster, board, &resolution.effects);
        Ok(resolution)
    }

    /// Resolve and apply an area attack centered on `center`.
    pub fn perform_aoe_attack<R: DieRoller + ?Sized>(
        &self,
        roster: &mut Roster,
        board: &mut Board,
        attacker: EntityRef,
        entry: &AttackEntry,
        center: Cell,
        roller: &mut R,
    ) -> Result<Resolution, CombatError> {
        let resolution = self.resolve_aoe_attack(roster, board, attacker, entry, center, roller)?;
        apply_effects(roster, board, &resolution.effects);
        Ok(resolution)
    }

    /// Roll a single-target attack without mutating anything.
    ///
    /// Attack roll is `1d20 + mod`, damage is the weapon dice `+ mod`, where
    /// `mod` is the stat modifier plus base and custom bonuses.
    pub fn resolve_attack<R: DieRoller + ?Sized>(
        &self,
        roster: &Roster,
        attacker: EntityRef,
        target: EntityRef,
        entry: &AttackEntry,
        roller: &mut R,
    ) -> Result<Resolution, CombatError> {
        let attacker_stats = roster
            .stats(attacker)
            .ok_or(CombatError::UnknownEntity(attacker))?;
        let target_stats = roster
            .stats(target)
            .ok_or(CombatError::UnknownEntity(target))?;

        let profile = match self.catalog.profile_for(entry) {
            Ok(profile) => profile,
            Err(err) => {
                warn!(%attacker, error = %err, "attack degraded to no-op");
                return Ok(Resolution::new(format!(
                    "{} cannot attack: {err}",
                    attacker_stats.name
                )));
            }
        };

        let damage_expr = DiceExpression::parse(&profile.damage_dice);
        if damage_expr.is_empty() {
            warn!(%attacker, dice = %profile.damage_dice, "unusable damage dice");
            return Ok(Resolution::new(format!(
                "{}'s {} has no usable damage dice (\"{}\"); no damage dealt",
                attacker_stats.name, profile.name, profile.damage_dice
            )));
        }

        let modifier = attack_modifier(attacker_stats, &profile);
        let attack_roll = DiceExpression::parse(&format!("1d20{modifier:+}")).roll_with(roller);
        let damage_roll = damage_expr.roll_with(roller);
        let damage = damage_roll.total.saturating_add(modifier);
        let new_hp = target_stats.hp.saturating_sub(damage);

        let mut resolution = Resolution::new(format!(
            "{} attacks {} with {}: {} vs AC {}",
            attacker_stats.name,
            target_stats.name,
            profile.name,
            attack_roll,
            target_stats.armor_class
        ))
        .with_message(format!(
            "{} takes {damage} damage ({}{modifier:+}), HP now {new_hp}",
            target_stats.name, damage_roll.details
        ))
        .with_effect(Effect::AttackRolled {
            attacker,
            target,
            roll: attack_roll,
            target_ac: target_stats.armor_class,
        })
        .with_effect(Effect::DamageRolled {
            roll: damage_roll,
            modifier,
            total: damage,
        })
        .with_effect(Effect::HpChanged {
            target,
            amount: damage.saturating_neg(),
            new_hp,
        });

        if new_hp <= 0 {
            resolution = resolution
                .with_message(format!("{} is defeated!", target_stats.name))
                .with_effect(Effect::Defeated {
                    target,
                    name: target_stats.name.clone(),
                });
        }

        info!(%attacker, %target, damage, new_hp, "attack resolved");
        Ok(resolution)
    }

    /// Roll an area attack without mutating anything.
    ///
    /// Damage is rolled once and dealt to every occupant of the area. With
    /// `exclude_allies`, characters sharing the attacker's owner are spared.
    /// Terrain, when the attack creates it, covers every cell of the area.
    pub fn resolve_aoe_attack<R: DieRoller + ?Sized>(
        &self,
        roster: &Roster,
        board: &Board,
        attacker: EntityRef,
        entry: &AttackEntry,
        center: Cell,
        roller: &mut R,
    ) -> Result<Resolution, CombatError> {
        let attacker_stats = roster
            .stats(attacker)
            .ok_or(CombatError::UnknownEntity(attacker))?;

        let profile = match self.catalog.profile_for(entry) {
            Ok(profile) => profile,
            Err(err) => {
                warn!(%attacker, error = %err, "area attack degraded to no-op");
                return Ok(Resolution::new(format!(
                    "{} cannot attack: {err}",
                    attacker_stats.name
                )));
            }
        };
        let Some(area) = profile.area else {
            warn!(%attacker, attack = %profile.name, "area attack without an area");
            return Ok(Resolution::new(format!(
                "{} is not an area attack",
                profile.name
            )));
        };

        let damage_expr = DiceExpression::parse(&profile.damage_dice);
        if damage_expr.is_empty() {
            warn!(%attacker, dice = %profile.damage_dice, "unusable damage dice");
            return Ok(Resolution::new(format!(
                "{}'s {} has no usable damage dice (\"{}\"); no damage dealt",
                attacker_stats.name, profile.name, profile.damage_dice
            )));
        }

        let modifier = attack_modifier(attacker_stats, &profile);
        let damage_roll = damage_expr.roll_with(roller);
        let damage = damage_roll.total.saturating_add(modifier);
        let cells = area_cells(center, area.shape, area.radius);
        let attacker_owner = roster.owner_of(attacker);

        let mut resolution = Resolution::new(format!(
            "{} uses {} at {center}: {}{modifier:+} = {damage} damage",
            attacker_stats.name, profile.name, damage_roll.details
        ))
        .with_effect(Effect::DamageRolled {
            roll: damage_roll,
            modifier,
            total: damage,
        });

        let mut hit = 0usize;
        for &cell in &cells {
            let Some(target) = board.entity_at(cell) else {
                continue;
            };
            if profile.exclude_allies && is_ally(roster, attacker_owner, target) {
                debug!(%target, "ally spared");
                continue;
            }
            let Some(target_stats) = roster.stats(target) else {
                warn!(%target, %cell, "occupant missing from roster");
                continue;
            };

            let new_hp = target_stats.hp.saturating_sub(damage);
            hit += 1;
            resolution = resolution
                .with_message(format!(
                    "{} takes {damage} damage, HP now {new_hp}",
                    target_stats.name
                ))
                .with_effect(Effect::HpChanged {
                    target,
                    amount: damage.saturating_neg(),
                    new_hp,
                });
            if new_hp <= 0 {
                resolution = resolution
                    .with_message(format!("{} is defeated!", target_stats.name))
                    .with_effect(Effect::Defeated {
                        target,
                        name: target_stats.name.clone(),
                    });
            }
        }

        if hit == 0 {
            resolution = resolution.with_message("No targets in the area.");
        }

        if let Some(kind) = &profile.terrain_effect {
            let effect = TerrainEffect::new(kind.clone(), self.terrain_duration);
            resolution = resolution
                .with_message(format!("The area is now {kind}."))
                .with_effects(cells.iter().map(|&cell| Effect::TerrainCreated {
                    cell,
                    effect: effect.clone(),
                }));
        }

        info!(%attacker, %center, damage, targets = hit, "area attack resolved");
        Ok(resolution)
    }
}

/// Characters belonging to the attacker's owner.
fn is_ally(roster: &Roster, attacker_owner: Option<&str>, target: EntityRef) -> bool {
    target.kind == EntityKind::Character
        && attacker_owner.is_some()
        && roster.owner_of(target) == attacker_owner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttackDefinition, Weapon};
    use crate::entity::{Ability, AbilityScores, Character, Monster};
    use crate::grid::AreaShape;
    use crate::testing::ScriptedRoller;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::standard()
                .with_weapon(
                    Weapon::new("test_blade", "Test Blade", "1d6", Ability::Strength)
                        .with_base_mod(2),
                )
                .with_weapon(Weapon::new("broken", "Broken Blade", "lots", Ability::Strength))
                .with_attack(
                    AttackDefinition::new("blast", "Blast", "2d4")
                        .with_stat(Ability::Intelligence)
                        .with_area(AreaShape::Circle, 1),
                ),
        )
    }

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.add_character(
            Character::new(
                1,
                "alice",
                StatBlock::new("Aria", 24)
                    .with_abilities(AbilityScores::new(14, 12, 12, 16, 10, 10)),
            )
            .with_attack(AttackEntry::weapon("test_blade", 0))
            .with_attack(AttackEntry::catalog("blast"))
            .with_attack(AttackEntry::weapon("broken", 0))
            .with_attack(AttackEntry::weapon("missing", 0)),
        );
        roster.add_monster(Monster::new(1, StatBlock::new("Goblin", 7).with_armor_class(15)));
        roster
    }

    #[test]
    fn test_attack_modifier() {
        let roster = roster();
        let catalog = catalog();
        let aria = roster.stats(EntityRef::character(1)).unwrap();
        let profile = catalog
            .profile_for(&AttackEntry::weapon("test_blade", 1))
            .unwrap();
        // STR 14 -> +2, base +2, custom +1
        assert_eq!(attack_modifier(aria, &profile), 5);

        let unstatted = AttackProfile {
            stat: None,
            base_mod: 0,
            custom_mod: 0,
            ..profile
        };
        assert_eq!(attack_modifier(aria, &unstatted), 0);
    }

    #[test]
    fn test_single_target_attack() {
        let mut roster = roster();
        let mut board = Board::new();
        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![12, 3]);
        let entry = AttackEntry::weapon("test_blade", 0);

        let resolution = resolver
            .perform_attack(
                &mut roster,
                &mut board,
                EntityRef::character(1),
                EntityRef::monster(1),
                &entry,
                &mut roller,
            )
            .unwrap();

        // 1d20 [12] + 4 = 16; 1d6 [3] + 4 = 7
        match &resolution.effects[0] {
            Effect::AttackRolled {
                roll, target_ac, ..
            } => {
                assert_eq!(roll.total, 16);
                assert_eq!(*target_ac, 15);
            }
            other => panic!("expected attack roll, got {other:?}"),
        }
        assert_eq!(resolution.damage_to(EntityRef::monster(1)), Some(7));
        assert_eq!(roster.stats(EntityRef::monster(1)).unwrap().hp, 0);
        assert_eq!(resolution.defeated(), vec![EntityRef::monster(1)]);
        assert!(resolution.narrative().contains("Goblin is defeated!"));
    }

    #[test]
    fn test_low_attack_roll_still_deals_damage() {
        let mut roster = roster();
        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![1, 1]);

        let resolution = resolver
            .resolve_attack(
                &roster,
                EntityRef::character(1),
                EntityRef::monster(1),
                &AttackEntry::weapon("test_blade", 0),
                &mut roller,
            )
            .unwrap();
        assert_eq!(resolution.damage_to(EntityRef::monster(1)), Some(5));

        // Resolving alone changes nothing.
        assert_eq!(roster.stats(EntityRef::monster(1)).unwrap().hp, 7);
        apply_effects(&mut roster, &mut Board::new(), &resolution.effects);
        assert_eq!(roster.stats(EntityRef::monster(1)).unwrap().hp, 2);
    }

    #[test]
    fn test_malformed_catalog_data_degrades() {
        let roster = roster();
        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![]);

        for weapon in ["broken", "missing"] {
            let resolution = resolver
                .resolve_attack(
                    &roster,
                    EntityRef::character(1),
                    EntityRef::monster(1),
                    &AttackEntry::weapon(weapon, 0),
                    &mut roller,
                )
                .unwrap();
            assert!(resolution.is_noop());
            assert!(!resolution.narrative().is_empty());
        }
        assert_eq!(roller.consumed(), 0);
    }

    #[test]
    fn test_unknown_entities_are_errors() {
        let roster = roster();
        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![]);
        let entry = AttackEntry::weapon("test_blade", 0);

        assert_eq!(
            resolver
                .resolve_attack(
                    &roster,
                    EntityRef::character(9),
                    EntityRef::monster(1),
                    &entry,
                    &mut roller
                )
                .unwrap_err(),
            CombatError::UnknownEntity(EntityRef::character(9))
        );
        assert_eq!(
            resolver
                .resolve_attack(
                    &roster,
                    EntityRef::character(1),
                    EntityRef::monster(9),
                    &entry,
                    &mut roller
                )
                .unwrap_err(),
            CombatError::UnknownEntity(EntityRef::monster(9))
        );
    }

    #[test]
    fn test_extreme_damage_dice_saturate() {
        let mut roster = roster();
        roster.add_character(Character::new(
            2,
            "bob",
            StatBlock::new("Bram", 10).with_abilities(AbilityScores::new(8, 10, 10, 10, 10, 10)),
        ));
        let catalog = Arc::new(catalog().as_ref().clone().with_weapon(Weapon::new(
            "sink",
            "Healing Sink",
            "-9999999999-9999999999",
            Ability::Strength,
        )));
        let resolver = CombatResolver::new(catalog);
        let mut roller = ScriptedRoller::new(vec![10]);

        let resolution = resolver
            .perform_attack(
                &mut roster,
                &mut Board::new(),
                EntityRef::character(2),
                EntityRef::monster(1),
                &AttackEntry::weapon("sink", 0),
                &mut roller,
            )
            .unwrap();

        let damage = resolution.effects.iter().find_map(|effect| match effect {
            Effect::DamageRolled { total, .. } => Some(*total),
            _ => None,
        });
        assert_eq!(damage, Some(i32::MIN));
        assert_eq!(roster.stats(EntityRef::monster(1)).unwrap().hp, i32::MAX);
        assert!(resolution.defeated().is_empty());
    }

    #[test]
    fn test_extreme_modifiers_saturate() {
        let mut roster = roster();
        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![10, 2]);
        let entry = AttackEntry::Custom(
            AttackDefinition::new("overcharged", "Overcharged Strike", "1d4")
                .with_stat(Ability::Strength)
                .with_base_mod(i32::MAX)
                .with_custom_mod(1),
        );

        let profile = resolver.catalog().profile_for(&entry).unwrap();
        let aria = roster.stats(EntityRef::character(1)).unwrap();
        assert_eq!(attack_modifier(aria, &profile), i32::MAX);
        assert_eq!(ability_modifier(i32::MIN), i32::MIN / 2);

        let resolution = resolver
            .perform_attack(
                &mut roster,
                &mut Board::new(),
                EntityRef::character(1),
                EntityRef::monster(1),
                &entry,
                &mut roller,
            )
            .unwrap();
        assert_eq!(resolution.damage_to(EntityRef::monster(1)), Some(i32::MAX));
        assert_eq!(
            roster.stats(EntityRef::monster(1)).unwrap().hp,
            7 - i32::MAX
        );
        assert_eq!(resolution.defeated(), vec![EntityRef::monster(1)]);
    }

    #[test]
    fn test_aoe_rolls_damage_once() {
        let mut roster = roster();
        roster.add_monster(Monster::new(2, StatBlock::new("Orc", 15)));
        let mut board = Board::new();
        board.place(EntityRef::monster(1), Cell::new(5, 5)).unwrap();
        board.place(EntityRef::monster(2), Cell::new(5, 6)).unwrap();
        board.place(EntityRef::character(1), Cell::new(9, 9)).unwrap();

        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![2, 3]);
        let resolution = resolver
            .perform_aoe_attack(
                &mut roster,
                &mut board,
                EntityRef::character(1),
                &AttackEntry::catalog("blast"),
                Cell::new(5, 5),
                &mut roller,
            )
            .unwrap();

        // 2d4 [2, 3] + INT 16 (+3) = 8 to both monsters
        assert_eq!(roller.consumed(), 2);
        assert_eq!(
            resolution.targets_hit(),
            vec![EntityRef::monster(1), EntityRef::monster(2)]
        );
        assert_eq!(roster.stats(EntityRef::monster(1)).unwrap().hp, -1);
        assert_eq!(roster.stats(EntityRef::monster(2)).unwrap().hp, 7);
        assert_eq!(resolution.defeated(), vec![EntityRef::monster(1)]);
    }

    #[test]
    fn test_aoe_terrain_covers_whole_area() {
        let mut roster = roster();
        let mut board = Board::new();
        let resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![1, 1]);

        let entry = AttackEntry::catalog("acid_spray");
        let resolution = resolver
            .perform_aoe_attack(
                &mut roster,
                &mut board,
                EntityRef::character(1),
                &entry,
                Cell::new(4, 4),
                &mut roller,
            )
            .unwrap();

        // Cone of radius 2 pointing north: 5 + 3 + 1 cells.
        assert_eq!(board.terrain().len(), 9);
        let terrain = board.terrain_at(Cell::new(2, 4)).unwrap();
        assert_eq!(terrain.kind, "acidic ground");
        assert_eq!(terrain.duration, DEFAULT_TERRAIN_DURATION);
        assert!(resolution.targets_hit().is_empty());
        assert!(!resolution.is_noop());
    }

    #[test]
    fn test_targeting_state_machine() {
        let mut roster = roster();
        let mut board = Board::new();
        board.place(EntityRef::monster(1), Cell::new(1, 1)).unwrap();
        let mut resolver = CombatResolver::new(catalog());
        let mut roller = ScriptedRoller::new(vec![10, 2]);

        assert_eq!(
            resolver
                .resolve_target(&mut roster, &mut board, Target::Cell(Cell::new(1, 1)), &mut roller)
                .unwrap_err(),
            CombatError::NotTargeting
        );

        let pending = resolver
            .begin_attack(&roster, EntityRef::character(1), 0)
            .unwrap();
        assert!(!pending.is_area());

        // Empty cell: attack stays pending.
        assert_eq!(
            resolver
                .resolve_target(&mut roster, &mut board, Target::Cell(Cell::new(0, 0)), &mut roller)
                .unwrap_err(),
            CombatError::NoTargetAtCell(Cell::new(0, 0))
        );
        assert!(resolver.is_targeting());

        let resolution = resolver
            .resolve_target(&mut roster, &mut board, Target::Cell(Cell::new(1, 1)), &mut roller)
            .unwrap();
        assert_eq!(resolution.damage_to(EntityRef::monster(1)), Some(6));
        assert_eq!(resolver.state(), &TargetingState::Idle);
    }

    #[test]
    fn test_cancel_has_no_side_effects() {
        let roster = roster();
        let mut resolver = CombatResolver::new(catalog());

        let pending = resolver
            .begin_attack(&roster, EntityRef::character(1), 1)
            .unwrap();
        assert!(pending.is_area());
        let cancelled = resolver.cancel().unwrap();
        assert_eq!(cancelled.attack_index, 1);
        assert!(!resolver.is_targeting());
        assert_eq!(resolver.cancel(), None);
    }

    #[test]
    fn test_begin_attack_validates_index() {
        let roster = roster();
        let mut resolver = CombatResolver::new(catalog());
        assert_eq!(
            resolver
                .begin_attack(&roster, EntityRef::character(1), 10)
                .unwrap_err(),
            CombatError::UnknownAttack {
                attacker: EntityRef::character(1),
                index: 10
            }
        );
        assert_eq!(
            resolver
                .begin_attack(&roster, EntityRef::monster(5), 0)
                .unwrap_err(),
            CombatError::UnknownEntity(EntityRef::monster(5))
        );
        assert!(!resolver.is_targeting());
    }
}
