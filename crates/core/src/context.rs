/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Contexts - immutable snapshots of 'who is deciding, and about what'.
//! 
//! A Context binds the deciding Entity to some situational payload (a target, a point, 
//! a direction...) for one evaluation cycle. Contexts are produced by Context Factories, 
//! scored by Considerations and, if picked, used to seed an Ability cast.
//! 
//! Contexts are only valid for the cycle that produced them; the world may have 
//! moved on by the next tick, so re-derive them rather than caching them.
use bevy::math::{Dir3, Vec3};

use crate::errors::ContractViolation;
use crate::types::{EntityRef, KvMap};

/// The variant-specific part of a Context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextPayload {
    /// Nothing beyond the deciding Entity itself (e.g. self-buffs).
    SelfOnly,
    SingleTarget { target: EntityRef },
    Point { point: Vec3 },
    MultiPoint { points: Vec<Vec3> },
    Directional { direction: Dir3 },
}

/// Ad-hoc values carried along with a Context for generic Requirements and Considerations.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
    Entity(EntityRef),
}

impl ContextValue {
    /// Numeric view of the value; Ints are widened, everything else is None.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(val) => Some(*val),
            Self::Int(val) => Some(*val as f32),
            _ => None,
        }
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for ContextValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<EntityRef> for ContextValue {
    fn from(value: EntityRef) -> Self {
        Self::Entity(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    entity: EntityRef,
    payload: ContextPayload,
    values: KvMap<String, ContextValue>,
}

impl Context {
    fn build(entity: EntityRef, payload: ContextPayload) -> Result<Self, ContractViolation> {
        if entity == EntityRef::PLACEHOLDER {
            return Err(ContractViolation::PlaceholderEntity);
        }

        Ok(Self { entity, payload, values: KvMap::default() })
    }

    pub fn self_only(entity: EntityRef) -> Result<Self, ContractViolation> {
        Self::build(entity, ContextPayload::SelfOnly)
    }

    pub fn single_target(entity: EntityRef, target: EntityRef) -> Result<Self, ContractViolation> {
        if target == EntityRef::PLACEHOLDER {
            return Err(ContractViolation::PlaceholderEntity);
        }
        Self::build(entity, ContextPayload::SingleTarget { target })
    }

    pub fn point(entity: EntityRef, point: Vec3) -> Result<Self, ContractViolation> {
        Self::build(entity, ContextPayload::Point { point })
    }

    pub fn multi_point(entity: EntityRef, points: Vec<Vec3>) -> Result<Self, ContractViolation> {
        Self::build(entity, ContextPayload::MultiPoint { points })
    }

    /// The direction gets normalized; zero-length and non-finite vectors are rejected.
    pub fn directional(entity: EntityRef, direction: Vec3) -> Result<Self, ContractViolation> {
        let direction = Dir3::new(direction).map_err(|_| ContractViolation::InvalidDirection)?;
        Self::build(entity, ContextPayload::Directional { direction })
    }

    /// Attaches a named ad-hoc value. Re-using a key overwrites the previous value.
    pub fn with_value<K: Into<String>, V: Into<ContextValue>>(mut self, key: K, value: V) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    pub fn target(&self) -> Option<EntityRef> {
        match &self.payload {
            ContextPayload::SingleTarget { target } => Some(*target),
            _ => None,
        }
    }

    pub fn point_value(&self) -> Option<Vec3> {
        match &self.payload {
            ContextPayload::Point { point } => Some(*point),
            _ => None,
        }
    }

    pub fn points(&self) -> Option<&[Vec3]> {
        match &self.payload {
            ContextPayload::MultiPoint { points } => Some(points.as_slice()),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<Dir3> {
        match &self.payload {
            ContextPayload::Directional { direction } => Some(*direction),
            _ => None,
        }
    }

    pub fn value(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn float_value(&self, key: &str) -> Option<f32> {
        self.value(key).and_then(ContextValue::as_float)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::World;

    #[test]
    fn placeholder_entities_are_rejected() {
        let mut world = World::new();
        let real = world.spawn_empty().id();

        assert_eq!(Context::self_only(EntityRef::PLACEHOLDER), Err(ContractViolation::PlaceholderEntity));
        assert_eq!(
            Context::single_target(real, EntityRef::PLACEHOLDER), 
            Err(ContractViolation::PlaceholderEntity)
        );
    }

    #[test]
    fn zero_direction_is_rejected() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();

        assert_eq!(Context::directional(entity, Vec3::ZERO), Err(ContractViolation::InvalidDirection));
        assert_eq!(
            Context::directional(entity, Vec3::new(f32::NAN, 0., 0.)), 
            Err(ContractViolation::InvalidDirection)
        );

        let ctx = Context::directional(entity, Vec3::new(0., 0., 5.)).unwrap();
        assert_eq!(ctx.direction(), Some(Dir3::Z));
    }

    #[test]
    fn accessors_match_payload_variant() {
        let mut world = World::new();
        let me = world.spawn_empty().id();
        let them = world.spawn_empty().id();

        let ctx = Context::single_target(me, them).unwrap();
        assert_eq!(ctx.entity(), me);
        assert_eq!(ctx.target(), Some(them));
        assert_eq!(ctx.point_value(), None);
        assert_eq!(ctx.points(), None);

        let ctx = Context::multi_point(me, vec![Vec3::X, Vec3::Y]).unwrap();
        assert_eq!(ctx.points().map(|pts| pts.len()), Some(2));
        assert_eq!(ctx.target(), None);
    }

    #[test]
    fn value_bag_lookups() {
        let mut world = World::new();
        let me = world.spawn_empty().id();

        let ctx = Context::self_only(me).unwrap()
            .with_value("armor", 12_i64)
            .with_value("threat", 0.75_f32)
            .with_value("enraged", true);

        assert_eq!(ctx.float_value("armor"), Some(12.));
        assert_eq!(ctx.float_value("threat"), Some(0.75));
        assert_eq!(ctx.float_value("enraged"), None);
        assert_eq!(ctx.value("enraged"), Some(&ContextValue::Bool(true)));
        assert_eq!(ctx.value("nothing"), None);
    }
}
