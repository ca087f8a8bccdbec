/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Modifiers - id-keyed effects attached to Abilities or Agents.
//! 
//! A [`Modifier`] remembers which targets it has been applied to, which makes both 
//! `apply()` and `remove()` idempotent: applying twice changes nothing the second time, 
//! and removing from a target it was never applied to is a no-op. An optional matcher 
//! restricts which targets the Modifier may attach to at all (e.g. only fire spells).
//! 
//! While attached, the Modifier's `update()` runs once per tick for each target, which 
//! lets effects vary over time (e.g. a bonus that decays).
use bevy::platform::sync::Arc;

use crate::ability::Ability;
use crate::agent::Agent;
use crate::attributes::{Attribute, ModifierKind};
use crate::errors::ContractViolation;
use crate::types::{AbilityId, EntityRef, KvSet, ModifierId, Seconds};

/// Something a Modifier can attach to.
pub trait ModifierTarget {
    /// Identifies the target in the Modifier's applied set.
    type Key: Clone + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync;

    fn modifier_key(&self) -> Self::Key;

    /// Called after a Modifier was applied (`true`) or removed (`false`).
    fn note_modifier(&mut self, _id: &ModifierId, _applied: bool) {}
}

impl ModifierTarget for Ability {
    type Key = (EntityRef, AbilityId);

    fn modifier_key(&self) -> Self::Key {
        (self.caster(), self.id().clone())
    }

    fn note_modifier(&mut self, id: &ModifierId, applied: bool) {
        match applied {
            true => { self.applied_modifiers_mut().insert(id.clone()); },
            false => { self.applied_modifiers_mut().remove(id); },
        }
    }
}

impl ModifierTarget for Agent {
    type Key = EntityRef;

    fn modifier_key(&self) -> Self::Key {
        self.entity()
    }
}

/// What a Modifier actually does to its target.
pub trait ModifierEffect<T: ModifierTarget>: Send + Sync {
    fn on_apply(&self, id: &ModifierId, target: &mut T);

    /// Must undo `on_apply()`.
    fn on_remove(&self, id: &ModifierId, target: &mut T);

    fn on_update(&self, _id: &ModifierId, _target: &mut T, _dt: Seconds) {}
}

pub trait ModifierMatcher<T>: Send + Sync + Fn(&T) -> bool {}
impl<T, F: Send + Sync + Fn(&T) -> bool> ModifierMatcher<T> for F {}

pub struct Modifier<T: ModifierTarget> {
    id: ModifierId,
    matcher: Option<Arc<dyn ModifierMatcher<T>>>,
    effect: Arc<dyn ModifierEffect<T>>,
    applied: KvSet<T::Key>,
}

impl<T: ModifierTarget> Modifier<T> {
    pub fn new<I: Into<ModifierId>, E: ModifierEffect<T> + 'static>(id: I, effect: E) -> Self {
        Self {
            id: id.into(),
            matcher: None,
            effect: Arc::new(effect),
            applied: KvSet::default(),
        }
    }

    pub fn with_matcher<M: ModifierMatcher<T> + 'static>(mut self, matcher: M) -> Self {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    pub fn id(&self) -> &ModifierId {
        &self.id
    }

    pub fn matches(&self, target: &T) -> bool {
        self.matcher.as_ref().map(|matcher| matcher(target)).unwrap_or(true)
    }

    /// Attaches to the target unless it fails the matcher or already has this Modifier.
    /// Returns whether anything changed.
    pub fn apply(&mut self, target: &mut T) -> bool {
        if !self.matches(target) {
            return false;
        }

        if !self.applied.insert(target.modifier_key()) {
            return false;
        }

        self.effect.on_apply(&self.id, target);
        target.note_modifier(&self.id, true);
        true
    }

    /// Detaches from the target. Returns false if it was not attached.
    pub fn remove(&mut self, target: &mut T) -> bool {
        if !self.applied.remove(&target.modifier_key()) {
            return false;
        }

        self.effect.on_remove(&self.id, target);
        target.note_modifier(&self.id, false);
        true
    }

    /// Runs the per-tick hook, if attached to the target.
    pub fn update(&self, target: &mut T, dt: Seconds) -> bool {
        match self.applied.contains(&target.modifier_key()) {
            true => {
                self.effect.on_update(&self.id, target, dt);
                true
            },
            false => false,
        }
    }

    pub fn is_applied(&self, target: &T) -> bool {
        self.applied.contains(&target.modifier_key())
    }

    pub fn is_applied_to(&self, key: &T::Key) -> bool {
        self.applied.contains(key)
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn applied_keys(&self) -> impl Iterator<Item = &T::Key> {
        self.applied.iter()
    }

    /// Drops a target from the applied set without running the removal hook 
    /// (used when the target itself is gone).
    pub fn forget(&mut self, key: &T::Key) -> bool {
        self.applied.remove(key)
    }
}

impl<T: ModifierTarget> core::fmt::Debug for Modifier<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Modifier")
            .field("id", &self.id)
            .field("has_matcher", &self.matcher.is_some())
            .field("applied", &self.applied)
            .finish()
    }
}


/// A static bonus on one of an Agent's Attributes (or a Resource's maximum).
#[derive(Debug, Clone)]
pub struct AttributeBonus {
    pub attribute: String,
    pub kind: ModifierKind,
    pub value: f32,
}

impl AttributeBonus {
    pub fn new<S: Into<String>>(attribute: S, kind: ModifierKind, value: f32) -> Self {
        Self { attribute: attribute.into(), kind, value }
    }
}

impl ModifierEffect<Agent> for AttributeBonus {
    fn on_apply(&self, id: &ModifierId, target: &mut Agent) {
        if !target.attributes.set_modifier(&self.attribute, id.clone(), self.kind, self.value) {
            #[cfg(feature = "logging")]
            bevy::log::warn!(
                "AttributeBonus::on_apply: {:?} has no attribute {}, Modifier {} does nothing", 
                target.entity(), self.attribute, id,
            );
        }
    }

    fn on_remove(&self, id: &ModifierId, target: &mut Agent) {
        target.attributes.remove_modifier(&self.attribute, id.as_str());
    }
}

/// A bonus that starts at `initial` and shrinks towards zero by `decay_per_second`. 
/// Once it hits zero it stays attached (doing nothing) until removed.
#[derive(Debug, Clone)]
pub struct DecayingAttributeBonus {
    pub attribute: String,
    pub kind: ModifierKind,
    pub initial: f32,
    pub decay_per_second: f32,
}

impl ModifierEffect<Agent> for DecayingAttributeBonus {
    fn on_apply(&self, id: &ModifierId, target: &mut Agent) {
        target.attributes.set_modifier(&self.attribute, id.clone(), self.kind, self.initial);
    }

    fn on_remove(&self, id: &ModifierId, target: &mut Agent) {
        target.attributes.remove_modifier(&self.attribute, id.as_str());
    }

    fn on_update(&self, id: &ModifierId, target: &mut Agent, dt: Seconds) {
        let current = target.attributes
            .attribute(&self.attribute)
            .or_else(|| target.attributes.resource(&self.attribute).map(|pool| pool.total()))
            .and_then(|attr| attr.modifier(id.as_str()))
            .map(|modifier| modifier.value);

        let Some(current) = current else {
            return;
        };

        let step = self.decay_per_second.abs() * dt;
        let decayed = match current >= 0. {
            true => (current - step).max(0.),
            false => (current + step).min(0.),
        };

        target.attributes.set_modifier(&self.attribute, id.clone(), self.kind, decayed);
    }
}

fn set_or_clear(attr: &mut Attribute, id: &ModifierId, kind: ModifierKind, value: f32, applied: bool) {
    match applied {
        true => { attr.set_modifier(id.clone(), kind, value); },
        false => { attr.remove_modifier(id.as_str()); },
    }
}

/// Modifies an Ability's cast time (e.g. Percent -0.2 for 20% haste).
#[derive(Debug, Clone)]
pub struct CastTimeBonus {
    pub kind: ModifierKind,
    pub value: f32,
}

impl ModifierEffect<Ability> for CastTimeBonus {
    fn on_apply(&self, id: &ModifierId, target: &mut Ability) {
        set_or_clear(&mut target.cast_time, id, self.kind, self.value, true);
    }

    fn on_remove(&self, id: &ModifierId, target: &mut Ability) {
        set_or_clear(&mut target.cast_time, id, self.kind, self.value, false);
    }
}

/// Modifies an Ability's cooldown.
#[derive(Debug, Clone)]
pub struct CooldownBonus {
    pub kind: ModifierKind,
    pub value: f32,
}

impl ModifierEffect<Ability> for CooldownBonus {
    fn on_apply(&self, id: &ModifierId, target: &mut Ability) {
        set_or_clear(&mut target.cooldown, id, self.kind, self.value, true);
    }

    fn on_remove(&self, id: &ModifierId, target: &mut Ability) {
        set_or_clear(&mut target.cooldown, id, self.kind, self.value, false);
    }
}


/// The Modifiers known for one target type, in registration order.
pub struct ModifierRegistry<T: ModifierTarget> {
    modifiers: Vec<Modifier<T>>,
}

impl<T: ModifierTarget> Default for ModifierRegistry<T> {
    fn default() -> Self {
        Self { modifiers: Vec::new() }
    }
}

impl<T: ModifierTarget> ModifierRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same id twice is a caller bug.
    pub fn register(&mut self, modifier: Modifier<T>) -> Result<(), ContractViolation> {
        if self.contains(modifier.id.as_str()) {
            return Err(ContractViolation::DuplicateModifier(modifier.id.clone()));
        }

        self.modifiers.push(modifier);
        Ok(())
    }

    /// Takes the Modifier out of the registry. Its targets are NOT reverted here; 
    /// callers that own the targets should `remove()` it from each of them first.
    pub fn unregister(&mut self, id: &str) -> Option<Modifier<T>> {
        match self.modifiers.iter().position(|known| known.id.as_str() == id) {
            Some(idx) => Some(self.modifiers.remove(idx)),
            None => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("ModifierRegistry::unregister: unknown Modifier {}", id);
                None
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Modifier<T>> {
        self.modifiers.iter().find(|known| known.id.as_str() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Modifier<T>> {
        self.modifiers.iter_mut().find(|known| known.id.as_str() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modifier<T>> {
        self.modifiers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Modifier<T>> {
        self.modifiers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

impl<T: ModifierTarget> core::fmt::Debug for ModifierRegistry<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.modifiers.iter()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::World;
    use crate::attributes::{AttributeSet, ResourcePool};

    fn knight() -> Agent {
        let mut world = World::new();
        Agent::new(world.spawn_empty().id()).with_attributes(
            AttributeSet::new()
                .with_attribute("strength", 10.)
                .with_resource("health", ResourcePool::new(100.))
        )
    }

    #[test]
    fn apply_and_remove_are_idempotent() {
        let mut agent = knight();
        let mut modifier = Modifier::new("giant_belt", AttributeBonus::new("strength", ModifierKind::Flat, 5.));

        assert!(modifier.apply(&mut agent));
        assert!(!modifier.apply(&mut agent));
        assert_eq!(agent.attributes.value("strength"), Some(15.));
        assert_eq!(modifier.applied_count(), 1);

        assert!(modifier.remove(&mut agent));
        assert!(!modifier.remove(&mut agent));
        assert_eq!(agent.attributes.value("strength"), Some(10.));
        assert_eq!(modifier.applied_count(), 0);
    }

    #[test]
    fn matcher_filters_targets() {
        let mut world = World::new();
        let caster = world.spawn_empty().id();
        let mut fireball = Ability::new("Fireball", caster, 2.);
        let mut heal = Ability::new("Heal", caster, 2.);

        let mut pyromancy = Modifier::new("pyromancy", CastTimeBonus { kind: ModifierKind::Percent, value: -0.5 })
            .with_matcher(|ability: &Ability| ability.id().as_str().starts_with("Fire"));

        assert!(pyromancy.apply(&mut fireball));
        assert!(!pyromancy.apply(&mut heal));
        assert_eq!(fireball.cast_time.value(), 1.);
        assert_eq!(heal.cast_time.value(), 2.);
        assert!(fireball.applied_modifiers().contains("pyromancy"));

        assert!(pyromancy.remove(&mut fireball));
        assert!(fireball.applied_modifiers().is_empty());
        assert_eq!(fireball.cast_time.value(), 2.);
    }

    #[test]
    fn update_only_runs_while_applied() {
        let mut agent = knight();
        let mut adrenaline = Modifier::new("adrenaline", DecayingAttributeBonus {
            attribute: "strength".to_owned(),
            kind: ModifierKind::Flat,
            initial: 4.,
            decay_per_second: 1.,
        });

        assert!(!adrenaline.update(&mut agent, 1.));
        adrenaline.apply(&mut agent);
        assert_eq!(agent.attributes.value("strength"), Some(14.));

        assert!(adrenaline.update(&mut agent, 1.5));
        assert_eq!(agent.attributes.value("strength"), Some(12.5));

        adrenaline.update(&mut agent, 10.);
        assert_eq!(agent.attributes.value("strength"), Some(10.));

        adrenaline.remove(&mut agent);
        assert!(agent.attributes.attribute("strength").map(|attr| attr.modifiers().is_empty()).unwrap_or(false));
    }

    #[test]
    fn bonus_on_resource_total() {
        let mut agent = knight();
        let mut fortitude = Modifier::new("fortitude", AttributeBonus::new("health", ModifierKind::Percent, 0.25));

        fortitude.apply(&mut agent);
        assert_eq!(agent.attributes.total("health"), Some(125.));
        fortitude.remove(&mut agent);
        assert_eq!(agent.attributes.total("health"), Some(100.));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry: ModifierRegistry<Agent> = ModifierRegistry::new();
        registry.register(Modifier::new("a", AttributeBonus::new("strength", ModifierKind::Flat, 1.))).unwrap();

        let duplicate = registry.register(Modifier::new("a", AttributeBonus::new("strength", ModifierKind::Flat, 2.)));
        assert_eq!(duplicate, Err(ContractViolation::DuplicateModifier("a".into())));

        assert!(registry.unregister("missing").is_none());
        assert!(registry.unregister("a").is_some());
        assert!(registry.is_empty());
    }
}
