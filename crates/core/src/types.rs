/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Type aliases and 'abstracting' newtypes.

/// The opaque handle the core uses to refer to entities owned by the host engine.
/// 
/// The core never dereferences these; it only passes them back to the host through 
/// the [`crate::world::HostWorld`] interface and uses them as map keys.
pub type EntityRef = bevy::ecs::entity::Entity;

/// The value type for all Utility math (Consideration outputs, composite scores, Curves).
pub type UtilityScore = f32;

pub const MIN_UTILITY_SCORE: UtilityScore = 0.;
pub const MAX_UTILITY_SCORE: UtilityScore = 1.;

/// Simulation time, in seconds. All durations (cast times, cooldowns, statuses) use this.
pub type Seconds = f32;

/// The key-value map type used across the library.
pub type KvMap<K, V> = bevy::platform::collections::HashMap<K, V>;

/// The set type used across the library.
pub type KvSet<K> = bevy::platform::collections::HashSet<K>;

pub use crate::identifiers::{
    AbilityId, 
    ConsiderationKey, 
    ContextFactoryKey, 
    CurveKey, 
    ModifierId, 
    StatusId,
};
