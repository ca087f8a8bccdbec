/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Test doubles for the host-side collaborators: a scriptable host world, 
//! a recording effect sink and a loaded die.
use bevy::math::{Dir3, Vec3};

use crate::dice::DiceRoller;
use crate::effects::{EffectRequest, EffectSink};
use crate::types::{EntityRef, KvMap};
use crate::world::{FactionMask, HostWorld};

#[derive(Debug, Clone)]
struct MockEntity {
    position: Vec3,
    forward: Dir3,
    moving: bool,
    alive: bool,
    faction: FactionMask,
    target: Option<EntityRef>,
}

/// A [`HostWorld`] backed by plain data, with no spatial index.
/// 
/// Friendly factions (Player, Ally) and Hostile are hostile to each other; Neutral and 
/// Wildlife are hostile to nobody. Dead Entities never show up in range queries.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    order: Vec<EntityRef>,
    entities: KvMap<EntityRef, MockEntity>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or resets) an Entity, alive, standing still and facing +Z.
    pub fn spawn(&mut self, entity: EntityRef, position: Vec3, faction: FactionMask) -> &mut Self {
        if !self.entities.contains_key(&entity) {
            self.order.push(entity);
        }

        self.entities.insert(entity, MockEntity {
            position,
            forward: Dir3::Z,
            moving: false,
            alive: true,
            faction,
            target: None,
        });
        self
    }

    fn with_entity(&mut self, entity: EntityRef, func: impl FnOnce(&mut MockEntity)) -> &mut Self {
        if let Some(state) = self.entities.get_mut(&entity) {
            func(state);
        }
        self
    }

    pub fn set_position(&mut self, entity: EntityRef, position: Vec3) -> &mut Self {
        self.with_entity(entity, |state| state.position = position)
    }

    pub fn set_forward(&mut self, entity: EntityRef, forward: Dir3) -> &mut Self {
        self.with_entity(entity, |state| state.forward = forward)
    }

    pub fn set_moving(&mut self, entity: EntityRef, moving: bool) -> &mut Self {
        self.with_entity(entity, |state| state.moving = moving)
    }

    pub fn set_alive(&mut self, entity: EntityRef, alive: bool) -> &mut Self {
        self.with_entity(entity, |state| state.alive = alive)
    }

    pub fn kill(&mut self, entity: EntityRef) -> &mut Self {
        self.set_alive(entity, false)
    }

    pub fn set_target(&mut self, entity: EntityRef, target: Option<EntityRef>) -> &mut Self {
        self.with_entity(entity, |state| state.target = target)
    }

    fn hostile(a: FactionMask, b: FactionMask) -> bool {
        (a.intersects(FactionMask::FRIENDLY) && b.intersects(FactionMask::HOSTILE))
        || (a.intersects(FactionMask::HOSTILE) && b.intersects(FactionMask::FRIENDLY))
    }

    /// Living Entities within `radius` of `origin` passing `filter`, nearest first; 
    /// ties keep spawn order.
    fn in_range(&self, origin: Vec3, radius: f32, filter: impl Fn(EntityRef, &MockEntity) -> bool) -> Vec<EntityRef> {
        let mut found: Vec<(EntityRef, f32)> = self.order
            .iter()
            .filter_map(|entity| self.entities.get(entity).map(|state| (*entity, state)))
            .filter(|(_, state)| state.alive)
            .map(|(entity, state)| (entity, state, state.position.distance(origin)))
            .filter(|(entity, state, distance)| *distance <= radius && filter(*entity, *state))
            .map(|(entity, _, distance)| (entity, distance))
            .collect();

        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found.into_iter().map(|(entity, _)| entity).collect()
    }
}

impl HostWorld for MockHost {
    fn position(&self, entity: EntityRef) -> Option<Vec3> {
        self.entities.get(&entity).map(|state| state.position)
    }

    fn forward(&self, entity: EntityRef) -> Option<Dir3> {
        self.entities.get(&entity).map(|state| state.forward)
    }

    fn is_moving(&self, entity: EntityRef) -> bool {
        self.entities.get(&entity).is_some_and(|state| state.moving)
    }

    fn is_alive(&self, entity: EntityRef) -> bool {
        self.entities.get(&entity).is_some_and(|state| state.alive)
    }

    fn faction(&self, entity: EntityRef) -> FactionMask {
        self.entities.get(&entity).map(|state| state.faction).unwrap_or_default()
    }

    fn current_target(&self, entity: EntityRef) -> Option<EntityRef> {
        self.entities.get(&entity).and_then(|state| state.target)
    }

    fn nearest_hostiles(&self, entity: EntityRef, radius: f32) -> Vec<EntityRef> {
        let Some(me) = self.entities.get(&entity) else {
            return Vec::new()
        };

        self.in_range(me.position, radius, |other, state| {
            other != entity && Self::hostile(me.faction, state.faction)
        })
    }

    fn find_entities_in_range(&self, position: Vec3, radius: f32, mask: FactionMask) -> Vec<EntityRef> {
        self.in_range(position, radius, |_, state| state.faction.intersects(mask))
    }
}


/// An [`EffectSink`] that keeps everything, with a few lookup helpers for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingEffectSink {
    pub requests: Vec<EffectRequest>,
}

impl RecordingEffectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all SpawnEffect requests, in submission order.
    pub fn spawned(&self) -> Vec<&str> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                EffectRequest::SpawnEffect { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Sum of all resource deltas submitted for `target` and `attribute`.
    pub fn total_adjustment(&self, target: EntityRef, attribute: &str) -> f32 {
        self.requests
            .iter()
            .filter_map(|request| match request {
                EffectRequest::AdjustResource { target: t, attribute: a, delta, .. } 
                    if *t == target && a == attribute => Some(*delta),
                _ => None,
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

impl EffectSink for RecordingEffectSink {
    fn submit(&mut self, request: EffectRequest) {
        self.requests.push(request);
    }
}


/// A [`DiceRoller`] that always rolls the same total.
#[derive(Debug, Clone, Copy)]
pub struct FixedRoller {
    total: i32,
}

impl FixedRoller {
    pub fn new(total: i32) -> Self {
        Self { total }
    }
}

impl DiceRoller for FixedRoller {
    fn roll(&mut self, _count: u32, _die: u32) -> i32 {
        self.total
    }
}
