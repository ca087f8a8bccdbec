/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! The boundary between the core and the host engine.
//! 
//! The core never owns positions, physics or spatial indices. The host engine exposes 
//! them through [`HostWorld`]; the core combines that with the state it *does* own 
//! (Attributes, Abilities) into a [`WorldView`] which Considerations, Requirements and 
//! Context Factories read from.
use bevy::math::{Dir3, Vec3};
use bitflags::bitflags;

use crate::ability::Ability;
use crate::agent::Roster;
use crate::attributes::AttributeSet;
use crate::types::EntityRef;

bitflags! {
    /// Which factions an Entity belongs to, or which factions a spatial query should match.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FactionMask: u32 {
        const PLAYER   = 1 << 0;
        const ALLY     = 1 << 1;
        const HOSTILE  = 1 << 2;
        const NEUTRAL  = 1 << 3;
        const WILDLIFE = 1 << 4;

        const FRIENDLY = Self::PLAYER.bits() | Self::ALLY.bits();
    }
}

/// Queries the core needs answered by the host engine.
/// 
/// Every method must be a read-only query. Unknown Entities should get `None`/empty 
/// answers rather than panics; the core treats those as missing data.
pub trait HostWorld {
    fn position(&self, entity: EntityRef) -> Option<Vec3>;

    fn forward(&self, entity: EntityRef) -> Option<Dir3>;

    fn is_moving(&self, entity: EntityRef) -> bool;

    fn is_alive(&self, entity: EntityRef) -> bool;

    fn faction(&self, entity: EntityRef) -> FactionMask;

    fn current_target(&self, entity: EntityRef) -> Option<EntityRef>;

    /// Entities hostile to `entity` within `radius` of it, nearest first.
    fn nearest_hostiles(&self, entity: EntityRef, radius: f32) -> Vec<EntityRef>;

    /// Entities within `radius` of `position` whose faction intersects `mask`.
    fn find_entities_in_range(&self, position: Vec3, radius: f32, mask: FactionMask) -> Vec<EntityRef>;
}

/// Everything scoring and gating code may read: the host's spatial state plus core-owned data.
pub trait WorldView: HostWorld {
    fn attributes(&self, entity: EntityRef) -> Option<&AttributeSet>;

    fn ability(&self, entity: EntityRef, ability: &str) -> Option<&Ability>;

    fn attribute_value(&self, entity: EntityRef, name: &str) -> Option<f32> {
        self.attributes(entity)?.value(name)
    }

    fn attribute_total(&self, entity: EntityRef, name: &str) -> Option<f32> {
        self.attributes(entity)?.total(name)
    }

    fn attribute_fraction(&self, entity: EntityRef, name: &str) -> Option<f32> {
        self.attributes(entity)?.fraction(name)
    }

    fn distance(&self, from: EntityRef, to: EntityRef) -> Option<f32> {
        Some(self.position(from)?.distance(self.position(to)?))
    }
}

/// A [`WorldView`] stitched together from the host engine and the core's Agent roster.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    host: &'a dyn HostWorld,
    roster: &'a Roster,
}

impl<'a> SceneView<'a> {
    pub fn new(host: &'a dyn HostWorld, roster: &'a Roster) -> Self {
        Self { host, roster }
    }
}

impl<'a> HostWorld for SceneView<'a> {
    fn position(&self, entity: EntityRef) -> Option<Vec3> {
        self.host.position(entity)
    }

    fn forward(&self, entity: EntityRef) -> Option<Dir3> {
        self.host.forward(entity)
    }

    fn is_moving(&self, entity: EntityRef) -> bool {
        self.host.is_moving(entity)
    }

    fn is_alive(&self, entity: EntityRef) -> bool {
        self.host.is_alive(entity)
    }

    fn faction(&self, entity: EntityRef) -> FactionMask {
        self.host.faction(entity)
    }

    fn current_target(&self, entity: EntityRef) -> Option<EntityRef> {
        self.host.current_target(entity)
    }

    fn nearest_hostiles(&self, entity: EntityRef, radius: f32) -> Vec<EntityRef> {
        self.host.nearest_hostiles(entity, radius)
    }

    fn find_entities_in_range(&self, position: Vec3, radius: f32, mask: FactionMask) -> Vec<EntityRef> {
        self.host.find_entities_in_range(position, radius, mask)
    }
}

impl<'a> WorldView for SceneView<'a> {
    fn attributes(&self, entity: EntityRef) -> Option<&AttributeSet> {
        self.roster.get(entity).map(|agent| &agent.attributes)
    }

    fn ability(&self, entity: EntityRef, ability: &str) -> Option<&Ability> {
        self.roster.get(entity).and_then(|agent| agent.abilities.get(ability))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::World;
    use crate::agent::Agent;
    use crate::attributes::ResourcePool;
    use crate::testing::MockHost;

    #[test]
    fn scene_view_merges_host_and_roster() {
        let mut world = World::new();
        let knight = world.spawn_empty().id();
        let stranger = world.spawn_empty().id();

        let mut host = MockHost::new();
        host.spawn(knight, Vec3::ZERO, FactionMask::PLAYER);
        host.spawn(stranger, Vec3::new(3., 4., 0.), FactionMask::NEUTRAL);

        let mut roster = Roster::default();
        roster.insert(Agent::new(knight).with_attributes(
            AttributeSet::new().with_resource("health", ResourcePool::new(40.).with_current(10.))
        )).unwrap();

        let view = SceneView::new(&host, &roster);
        assert_eq!(view.attribute_value(knight, "health"), Some(10.));
        assert_eq!(view.attribute_total(knight, "health"), Some(40.));
        assert_eq!(view.attribute_fraction(knight, "health"), Some(0.25));
        assert_eq!(view.attribute_value(stranger, "health"), None);
        assert_eq!(view.distance(knight, stranger), Some(5.));
        assert_eq!(view.faction(stranger), FactionMask::NEUTRAL);
    }

    #[test]
    fn friendly_mask_covers_players_and_allies() {
        assert!(FactionMask::FRIENDLY.contains(FactionMask::ALLY));
        assert!(FactionMask::FRIENDLY.intersects(FactionMask::PLAYER | FactionMask::HOSTILE));
        assert!(!FactionMask::FRIENDLY.intersects(FactionMask::HOSTILE));
    }
}
