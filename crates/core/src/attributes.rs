/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Attributes, Resources and modifier stacking.
//! 
//! An [`Attribute`] is a base value plus a stack of id-keyed modifiers:
//! 
//! `Value = (base + sum(Flat)) * (1 + sum(Percent))`
//! 
//! Modifiers are kept sorted by [`ModifierId`] and summed in that order, with exactly one 
//! multiplicative pass. Float addition is not associative, so the order in which modifiers 
//! were set must never leak into the sums; the result is bit-identical for any application 
//! order. Do not 'optimize' this into sequential multipliers.
//! 
//! A [`ResourcePool`] is a depletable value (Health, Mana...) whose maximum is an Attribute.

use bevy::prelude::Component;
use bevy::reflect::Reflect;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{KvMap, ModifierId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModifierKind {
    /// Added to the base value.
    Flat,
    /// Summed with other Percent modifiers; 0.25 means +25%, -0.5 means -50%.
    Percent,
}

#[derive(Debug, Clone, PartialEq, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttributeModifier {
    pub id: ModifierId,
    pub kind: ModifierKind,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attribute {
    base_value: f32,
    modifiers: Vec<AttributeModifier>,
}

impl Default for Attribute {
    fn default() -> Self {
        Self::new(0.)
    }
}

impl Attribute {
    pub fn new(base_value: f32) -> Self {
        Self { base_value, modifiers: Vec::new() }
    }

    pub fn base_value(&self) -> f32 {
        self.base_value
    }

    pub fn set_base_value(&mut self, value: f32) -> &mut Self {
        self.base_value = value;
        self
    }

    /// The current value. Recomputed on every call, so it can never go stale.
    /// 
    /// Sums run in ModifierId order (the storage order), never in insertion order.
    pub fn value(&self) -> f32 {
        let mut flat = 0.;
        let mut percent = 0.;

        for modifier in self.modifiers.iter() {
            match modifier.kind {
                ModifierKind::Flat => flat += modifier.value,
                ModifierKind::Percent => percent += modifier.value,
            }
        }

        (self.base_value + flat) * (1. + percent)
    }

    /// Adds a modifier, replacing any existing one with the same id (even one of another kind).
    pub fn set_modifier<I: Into<ModifierId>>(&mut self, id: I, kind: ModifierKind, value: f32) -> &mut Self {
        let id = id.into();
        match self.modifiers.binary_search_by(|m| m.id.cmp(&id)) {
            Ok(idx) => {
                let existing = &mut self.modifiers[idx];
                existing.kind = kind;
                existing.value = value;
            },
            Err(idx) => self.modifiers.insert(idx, AttributeModifier { id, kind, value }),
        }
        self
    }

    /// Removes the modifier with this id. Returns false (and does nothing) if there was none.
    pub fn remove_modifier(&mut self, id: &str) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.id.as_str() != id);
        before != self.modifiers.len()
    }

    pub fn modifier(&self, id: &str) -> Option<&AttributeModifier> {
        self.modifiers
            .binary_search_by(|m| m.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.modifiers[idx])
    }

    /// All modifiers, sorted by id.
    pub fn modifiers(&self) -> &[AttributeModifier] {
        &self.modifiers
    }

    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }

    pub fn set_percent_bonus<I: Into<ModifierId>>(&mut self, id: I, value: f32) -> &mut Self {
        self.set_modifier(id, ModifierKind::Percent, value)
    }

    /// The Percent bonus registered under this id; 0.0 if absent or if the id holds a Flat modifier.
    pub fn get_percent_bonus(&self, id: &str) -> f32 {
        self.bonus_of_kind(id, ModifierKind::Percent)
    }

    pub fn set_flat_bonus<I: Into<ModifierId>>(&mut self, id: I, value: f32) -> &mut Self {
        self.set_modifier(id, ModifierKind::Flat, value)
    }

    /// The Flat bonus registered under this id; 0.0 if absent or if the id holds a Percent modifier.
    pub fn get_flat_bonus(&self, id: &str) -> f32 {
        self.bonus_of_kind(id, ModifierKind::Flat)
    }

    fn bonus_of_kind(&self, id: &str, kind: ModifierKind) -> f32 {
        self.modifier(id)
            .filter(|m| m.kind == kind)
            .map(|m| m.value)
            .unwrap_or(0.)
    }
}

impl From<f32> for Attribute {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}


/// A depletable value whose maximum is an [`Attribute`] (so the maximum can be buffed).
/// 
/// Sign convention: [`ResourcePool::adjust`] takes a signed delta; [`ResourcePool::increase`] 
/// and [`ResourcePool::decrease`] take *magnitudes* and use their absolute value, so 
/// `decrease(-5.)` still lowers the pool by 5. Nothing here negates a value twice.
#[derive(Debug, Clone, PartialEq, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourcePool {
    current: f32,
    total: Attribute,
}

impl ResourcePool {
    /// A full pool.
    pub fn new(total: f32) -> Self {
        Self { current: total.max(0.), total: Attribute::new(total) }
    }

    pub fn with_current(mut self, current: f32) -> Self {
        self.current = current;
        self.clamp_current();
        self
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn total_value(&self) -> f32 {
        self.total.value().max(0.)
    }

    /// current / total, or 0.0 for an empty maximum.
    pub fn fraction(&self) -> f32 {
        let total = self.total_value();
        match total > 0. {
            true => self.current / total,
            false => 0.,
        }
    }

    pub fn total(&self) -> &Attribute {
        &self.total
    }

    /// Mutates the maximum. The current value is re-clamped afterwards.
    pub fn with_total_mut<R>(&mut self, func: impl FnOnce(&mut Attribute) -> R) -> R {
        let out = func(&mut self.total);
        self.clamp_current();
        out
    }

    /// Applies a signed delta, clamped to `[0, total]`. Returns the delta actually applied.
    pub fn adjust(&mut self, delta: f32) -> f32 {
        let before = self.current;
        self.current += delta;
        self.clamp_current();
        self.current - before
    }

    pub fn increase(&mut self, amount: f32) -> f32 {
        self.adjust(amount.abs())
    }

    pub fn decrease(&mut self, amount: f32) -> f32 {
        self.adjust(-amount.abs())
    }

    pub fn refill(&mut self) {
        self.current = self.total_value();
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.
    }

    fn clamp_current(&mut self) {
        self.current = self.current.clamp(0., self.total_value());
    }
}


/// A name-sorted copy of attribute values, taken at a specific point in time 
/// (e.g. the moment a cast completes) so that effects resolve against the values 
/// the caster had then, not whatever they have by the time the effect lands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSnapshot {
    values: Vec<(String, f32)>,
}

impl AttributeSnapshot {
    pub fn from_pairs<I: IntoIterator<Item = (String, f32)>>(pairs: I) -> Self {
        let mut values: Vec<(String, f32)> = pairs.into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values.dedup_by(|later, earlier| later.0 == earlier.0);
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values
            .binary_search_by(|(key, _)| key.as_str().cmp(name))
            .ok()
            .map(|idx| self.values[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}


#[derive(Debug, Clone)]
enum Stat {
    Attribute(Attribute),
    Resource(ResourcePool),
}

/// The Attributes and Resources owned by a single Entity (or Ability).
/// 
/// Plain string-keyed: a lookup is one hash of the name and never allocates. 
/// A name refers to either an Attribute or a Resource, not both; inserting one replaces 
/// the other.
#[derive(Component, Debug, Clone, Default)]
pub struct AttributeSet {
    stats: KvMap<String, Stat>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute<A: Into<Attribute>>(mut self, name: &str, attribute: A) -> Self {
        self.insert_attribute(name, attribute);
        self
    }

    pub fn with_resource(mut self, name: &str, pool: ResourcePool) -> Self {
        self.insert_resource(name, pool);
        self
    }

    pub fn insert_attribute<A: Into<Attribute>>(&mut self, name: &str, attribute: A) {
        self.stats.insert(name.to_owned(), Stat::Attribute(attribute.into()));
    }

    pub fn insert_resource(&mut self, name: &str, pool: ResourcePool) {
        self.stats.insert(name.to_owned(), Stat::Resource(pool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    fn stat(&self, name: &str) -> Option<&Stat> {
        self.stats.get(name)
    }

    fn stat_mut(&mut self, name: &str) -> Option<&mut Stat> {
        self.stats.get_mut(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        match self.stat(name)? {
            Stat::Attribute(attr) => Some(attr),
            Stat::Resource(_) => None,
        }
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        match self.stat_mut(name)? {
            Stat::Attribute(attr) => Some(attr),
            Stat::Resource(_) => None,
        }
    }

    pub fn resource(&self, name: &str) -> Option<&ResourcePool> {
        match self.stat(name)? {
            Stat::Resource(pool) => Some(pool),
            Stat::Attribute(_) => None,
        }
    }

    pub fn resource_mut(&mut self, name: &str) -> Option<&mut ResourcePool> {
        match self.stat_mut(name)? {
            Stat::Resource(pool) => Some(pool),
            Stat::Attribute(_) => None,
        }
    }

    /// An Attribute's value or a Resource's current value.
    pub fn value(&self, name: &str) -> Option<f32> {
        self.stat(name).map(|stat| match stat {
            Stat::Attribute(attr) => attr.value(),
            Stat::Resource(pool) => pool.value(),
        })
    }

    /// An Attribute's value or a Resource's maximum.
    pub fn total(&self, name: &str) -> Option<f32> {
        self.stat(name).map(|stat| match stat {
            Stat::Attribute(attr) => attr.value(),
            Stat::Resource(pool) => pool.total_value(),
        })
    }

    /// A Resource's fill fraction. Plain Attributes count as 'full' (1.0).
    pub fn fraction(&self, name: &str) -> Option<f32> {
        self.stat(name).map(|stat| match stat {
            Stat::Attribute(_) => 1.,
            Stat::Resource(pool) => pool.fraction(),
        })
    }

    /// Sets a modifier on an Attribute, or on a Resource's maximum. 
    /// Returns false if there is no stat with that name.
    pub fn set_modifier<I: Into<ModifierId>>(&mut self, name: &str, id: I, kind: ModifierKind, value: f32) -> bool {
        match self.stat_mut(name) {
            Some(Stat::Attribute(attr)) => {
                attr.set_modifier(id, kind, value);
                true
            },
            Some(Stat::Resource(pool)) => {
                pool.with_total_mut(|total| { total.set_modifier(id, kind, value); });
                true
            },
            None => false,
        }
    }

    /// Removes a modifier from an Attribute or a Resource's maximum. No-op if either is missing.
    pub fn remove_modifier(&mut self, name: &str, id: &str) -> bool {
        match self.stat_mut(name) {
            Some(Stat::Attribute(attr)) => attr.remove_modifier(id),
            Some(Stat::Resource(pool)) => pool.with_total_mut(|total| total.remove_modifier(id)),
            None => false,
        }
    }

    /// Applies a signed delta to a Resource. Returns the delta actually applied, 
    /// or None if there is no Resource with that name.
    pub fn adjust_resource(&mut self, name: &str, delta: f32) -> Option<f32> {
        self.resource_mut(name).map(|pool| pool.adjust(delta))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    pub fn snapshot(&self) -> AttributeSnapshot {
        AttributeSnapshot::from_pairs(
            self.stats.iter().map(|(name, stat)| {
                let value = match stat {
                    Stat::Attribute(attr) => attr.value(),
                    Stat::Resource(pool) => pool.value(),
                };
                (name.clone(), value)
            })
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn value_follows_flat_then_percent_formula() {
        let mut attr = Attribute::new(10.);
        attr.set_flat_bonus("ring", 5.);
        attr.set_percent_bonus("blessing", 0.2);
        attr.set_percent_bonus("aura", 0.3);

        // (10 + 5) * (1 + 0.5)
        assert!(approx(attr.value(), 22.5));
    }

    #[test]
    fn remove_after_set_restores_value_exactly() {
        let mut attr = Attribute::new(7.25);
        attr.set_flat_bonus("gear", 3.);
        let before = attr.value();

        attr.set_percent_bonus("haste", -0.3);
        assert!(attr.remove_modifier("haste"));
        assert_eq!(attr.value(), before);
    }

    #[test]
    fn application_order_does_not_matter() {
        let mods = [
            ("a", ModifierKind::Flat, 2.5),
            ("b", ModifierKind::Percent, 0.1),
            ("c", ModifierKind::Flat, -1.),
            ("d", ModifierKind::Percent, -0.35),
        ];

        let mut forward = Attribute::new(4.);
        for (id, kind, value) in mods.iter() {
            forward.set_modifier(*id, *kind, *value);
        }

        let mut backward = Attribute::new(4.);
        for (id, kind, value) in mods.iter().rev() {
            backward.set_modifier(*id, *kind, *value);
        }

        assert_eq!(forward.value(), backward.value());
    }

    #[test]
    fn same_kind_sums_are_bit_identical_in_any_order() {
        // Summed left to right, 0.1 + 0.2 + 0.3 + 0.7 and 0.7 + 0.3 + 0.2 + 0.1 differ in f32.
        let percents = [("p1", 0.1), ("p2", 0.2), ("p3", 0.3), ("p4", 0.7)];
        let flats = [("f1", 0.1), ("f2", 0.2), ("f3", 0.3), ("f4", 0.7)];

        let build = |reverse: bool| {
            let mut attr = Attribute::new(10.);
            let mut mods: Vec<(&str, ModifierKind, f32)> = percents.iter()
                .map(|(id, val)| (*id, ModifierKind::Percent, *val))
                .chain(flats.iter().map(|(id, val)| (*id, ModifierKind::Flat, *val)))
                .collect();
            if reverse {
                mods.reverse();
            }
            for (id, kind, value) in mods {
                attr.set_modifier(id, kind, value);
            }
            attr
        };

        let forward = build(false);
        let backward = build(true);

        assert_eq!(forward.value().to_bits(), backward.value().to_bits());
        assert_eq!(forward.modifiers(), backward.modifiers());

        let ids: Vec<&str> = backward.modifiers().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["f1", "f2", "f3", "f4", "p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn replacing_a_modifier_keeps_the_sum_order() {
        let mut first = Attribute::new(10.);
        first.set_percent_bonus("a", 0.1).set_percent_bonus("b", 0.2).set_percent_bonus("c", 0.3);

        let mut second = Attribute::new(10.);
        second.set_percent_bonus("c", 0.9).set_percent_bonus("b", 0.2).set_percent_bonus("a", 0.1);
        second.set_percent_bonus("c", 0.3);

        assert_eq!(first.value().to_bits(), second.value().to_bits());
        assert_eq!(second.modifier("b").map(|m| m.value), Some(0.2));
    }

    #[test]
    fn same_id_replaces_instead_of_stacking() {
        let mut attr = Attribute::new(10.);
        attr.set_flat_bonus("buff", 5.);
        attr.set_flat_bonus("buff", 2.);

        assert_eq!(attr.modifiers().len(), 1);
        assert!(approx(attr.value(), 12.));

        // Re-adding under another kind still replaces.
        attr.set_percent_bonus("buff", 0.5);
        assert_eq!(attr.modifiers().len(), 1);
        assert!(approx(attr.value(), 15.));
        assert_eq!(attr.get_flat_bonus("buff"), 0.);
    }

    #[test]
    fn removing_unknown_modifier_is_a_noop() {
        let mut attr = Attribute::new(3.);
        assert!(!attr.remove_modifier("nothing"));
        assert_eq!(attr.value(), 3.);
    }

    #[test]
    fn haste_halves_cast_time() {
        let mut cast_time = Attribute::new(10.);
        cast_time.set_percent_bonus("haste", -0.5);

        assert_eq!(cast_time.value(), 5.);
        assert_eq!(cast_time.get_percent_bonus("haste"), -0.5);
        assert_eq!(cast_time.get_percent_bonus("missing"), 0.);
    }

    #[test]
    fn resource_clamps_to_bounds() {
        let mut health = ResourcePool::new(100.);
        assert_eq!(health.decrease(30.), -30.);
        assert_eq!(health.value(), 70.);

        assert_eq!(health.increase(50.), 30.);
        assert_eq!(health.value(), 100.);

        health.adjust(-500.);
        assert!(health.is_depleted());
        assert_eq!(health.value(), 0.);
    }

    #[test]
    fn resource_magnitudes_ignore_sign() {
        let mut mana = ResourcePool::new(50.);
        mana.decrease(-10.);
        assert_eq!(mana.value(), 40.);
        mana.increase(-5.);
        assert_eq!(mana.value(), 45.);
    }

    #[test]
    fn shrinking_total_reclamps_current() {
        let mut health = ResourcePool::new(100.);
        health.with_total_mut(|total| { total.set_percent_bonus("curse", -0.5); });

        assert_eq!(health.total_value(), 50.);
        assert_eq!(health.value(), 50.);
        assert_eq!(health.fraction(), 1.);
    }

    #[test]
    fn attribute_set_routes_by_name() {
        let mut set = AttributeSet::new()
            .with_attribute("armor", 12.)
            .with_resource("health", ResourcePool::new(80.).with_current(20.));

        assert_eq!(set.value("armor"), Some(12.));
        assert_eq!(set.value("health"), Some(20.));
        assert_eq!(set.total("health"), Some(80.));
        assert_eq!(set.fraction("health"), Some(0.25));
        assert_eq!(set.fraction("armor"), Some(1.));
        assert_eq!(set.value("luck"), None);

        assert!(set.set_modifier("armor", "shield", ModifierKind::Flat, 3.));
        assert_eq!(set.value("armor"), Some(15.));
        assert!(set.remove_modifier("armor", "shield"));
        assert!(!set.remove_modifier("armor", "shield"));
        assert!(!set.set_modifier("luck", "clover", ModifierKind::Flat, 1.));

        assert_eq!(set.adjust_resource("health", 100.), Some(60.));
        assert_eq!(set.adjust_resource("armor", 1.), None);
    }

    #[test]
    fn names_are_plain_string_keys() {
        let mut set = AttributeSet::new().with_attribute("stamina", 4.);
        let dynamic = format!("{}_{}", "fire", "resist");
        set.insert_attribute(&dynamic, 0.5);

        assert!(set.contains("fire_resist"));
        assert_eq!(set.value("fire_resist"), Some(0.5));

        // Re-inserting a name as a Resource replaces the Attribute.
        set.insert_resource("stamina", ResourcePool::new(10.));
        assert!(set.attribute("stamina").is_none());
        assert_eq!(set.total("stamina"), Some(10.));

        let mut names: Vec<&str> = set.names().collect();
        names.sort();
        assert_eq!(names, ["fire_resist", "stamina"]);
    }

    #[test]
    fn snapshot_is_sorted_and_detached() {
        let mut set = AttributeSet::new()
            .with_attribute("power", 5.)
            .with_attribute("armor", 2.);

        let snapshot = set.snapshot();
        set.attribute_mut("power").map(|attr| attr.set_base_value(50.));

        assert_eq!(snapshot.get("power"), Some(5.));
        let names: Vec<&str> = snapshot.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["armor", "power"]);
    }
}
