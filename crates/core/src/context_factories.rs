/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Context Factories - producers of candidate Contexts for one decision cycle.
//! 
//! A Decision asks its Factory 'what could I do this to?' and gets back a list of Contexts; 
//! each of them is then scored independently. Factories are pure reads of the world: 
//! they query the host's spatial index and never mutate anything.
//! 
//! An empty candidate list is a perfectly normal answer (nobody around); it just means 
//! the Decision has nothing to score this cycle.
use bevy::math::Vec3;
use bevy::platform::sync::Arc;

use crate::context::Context;
use crate::types::{ContextFactoryKey, EntityRef, KvMap};
use crate::world::{FactionMask, WorldView};

pub trait ContextFactory: Send + Sync {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context>;
}

impl<F: Fn(EntityRef, &dyn WorldView) -> Vec<Context> + Send + Sync> ContextFactory for F {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        self(entity, world)
    }
}

/// Hostiles of `entity` with a known position, in the host's nearest-first order.
fn hostiles_with_positions(entity: EntityRef, radius: f32, world: &dyn WorldView) -> Vec<(EntityRef, Vec3)> {
    world.nearest_hostiles(entity, radius)
        .into_iter()
        .filter(|hostile| *hostile != entity)
        .filter_map(|hostile| world.position(hostile).map(|pos| (hostile, pos)))
        .collect()
}

/// A single SelfOnly Context for the deciding Entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfFactory;

impl ContextFactory for SelfFactory {
    fn create_contexts(&self, entity: EntityRef, _world: &dyn WorldView) -> Vec<Context> {
        Context::self_only(entity).into_iter().collect()
    }
}

/// One SingleTarget Context per hostile in range.
#[derive(Debug, Clone, Copy)]
pub struct HostileTargetsFactory {
    pub radius: f32,
}

impl ContextFactory for HostileTargetsFactory {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        world.nearest_hostiles(entity, self.radius)
            .into_iter()
            .filter(|hostile| *hostile != entity)
            .filter_map(|hostile| Context::single_target(entity, hostile).ok())
            .collect()
    }
}

/// One Point Context per hostile in range, at the hostile's current position.
#[derive(Debug, Clone, Copy)]
pub struct HostilePositionsFactory {
    pub radius: f32,
}

impl ContextFactory for HostilePositionsFactory {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        hostiles_with_positions(entity, self.radius, world)
            .into_iter()
            .filter_map(|(_, pos)| Context::point(entity, pos).ok())
            .collect()
    }
}

/// One Directional Context per hostile in range, pointing from the caster at it.
/// 
/// Hostiles standing exactly on top of the caster have no direction and are skipped.
#[derive(Debug, Clone, Copy)]
pub struct HostileDirectionsFactory {
    pub radius: f32,
}

impl ContextFactory for HostileDirectionsFactory {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        let Some(origin) = world.position(entity) else {
            return Vec::new();
        };

        hostiles_with_positions(entity, self.radius, world)
            .into_iter()
            .filter_map(|(_, pos)| Context::directional(entity, pos - origin).ok())
            .collect()
    }
}

/// One MultiPoint Context per hostile 'seed' in range, holding the positions of every 
/// hostile (seed included) within `cluster_radius` of the seed. Good for area effects.
#[derive(Debug, Clone, Copy)]
pub struct HostileClusterFactory {
    pub radius: f32,
    pub cluster_radius: f32,
}

impl ContextFactory for HostileClusterFactory {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        let hostiles = hostiles_with_positions(entity, self.radius, world);

        hostiles.iter()
            .filter_map(|(_, seed)| {
                let cluster: Vec<Vec3> = hostiles.iter()
                    .map(|(_, pos)| *pos)
                    .filter(|pos| pos.distance(*seed) <= self.cluster_radius)
                    .collect();
                Context::multi_point(entity, cluster).ok()
            })
            .collect()
    }
}

/// One SingleTarget Context per Entity in range matching the faction mask, excluding the caster.
#[derive(Debug, Clone, Copy)]
pub struct AlliesInRangeFactory {
    pub radius: f32,
    pub mask: FactionMask,
}

impl ContextFactory for AlliesInRangeFactory {
    fn create_contexts(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        let Some(origin) = world.position(entity) else {
            return Vec::new();
        };

        world.find_entities_in_range(origin, self.radius, self.mask)
            .into_iter()
            .filter(|ally| *ally != entity)
            .filter_map(|ally| Context::single_target(entity, ally).ok())
            .collect()
    }
}


/// Maps [`ContextFactoryKey`]s to Context Factories.
#[derive(Clone, Default)]
pub struct ContextFactoryRegistry {
    mapping: KvMap<ContextFactoryKey, Arc<dyn ContextFactory>>,
}

impl ContextFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the parameterless [`SelfFactory`] (under "Self"); radius-based 
    /// Factories need their parameters and must be registered explicitly.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Self", SelfFactory);
        registry
    }

    pub fn register<F: ContextFactory + 'static, K: Into<ContextFactoryKey>>(&mut self, key: K, factory: F) -> &mut Self {
        let key = key.into();
        let old = self.mapping.insert(key.clone(), Arc::new(factory));

        if old.is_some() {
            #[cfg(feature = "logging")]
            bevy::log::warn!("ContextFactoryRegistry::register: replacing existing Context Factory {}", key);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn ContextFactory>> {
        self.mapping.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.mapping.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn clear(&mut self) {
        self.mapping.clear();
    }
}

impl core::fmt::Debug for ContextFactoryRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.mapping.keys()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::World;
    use crate::agent::Roster;
    use crate::testing::MockHost;
    use crate::world::SceneView;

    struct Scene {
        host: MockHost,
        roster: Roster,
        hero: EntityRef,
        orcs: Vec<EntityRef>,
        cleric: EntityRef,
    }

    fn scene() -> Scene {
        let mut world = World::new();
        let hero = world.spawn_empty().id();
        let cleric = world.spawn_empty().id();
        let orcs: Vec<EntityRef> = (0..3).map(|_| world.spawn_empty().id()).collect();

        let mut host = MockHost::new();
        host.spawn(hero, Vec3::ZERO, FactionMask::PLAYER);
        host.spawn(cleric, Vec3::new(-2., 0., 0.), FactionMask::ALLY);
        host.spawn(orcs[0], Vec3::new(5., 0., 0.), FactionMask::HOSTILE);
        host.spawn(orcs[1], Vec3::new(6., 0., 0.), FactionMask::HOSTILE);
        host.spawn(orcs[2], Vec3::new(30., 0., 0.), FactionMask::HOSTILE);

        Scene { host, roster: Roster::default(), hero, orcs, cleric }
    }

    #[test]
    fn no_candidates_means_empty_not_error() {
        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        // The cleric has no hostiles within a single unit.
        assert!(HostileTargetsFactory { radius: 1. }.create_contexts(scene.cleric, &view).is_empty());
        assert!(HostileClusterFactory { radius: 1., cluster_radius: 3. }.create_contexts(scene.cleric, &view).is_empty());
    }

    #[test]
    fn hostile_targets_in_radius_nearest_first() {
        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        let contexts = HostileTargetsFactory { radius: 10. }.create_contexts(scene.hero, &view);
        let targets: Vec<_> = contexts.iter().filter_map(Context::target).collect();
        assert_eq!(targets, vec![scene.orcs[0], scene.orcs[1]]);
        assert!(contexts.iter().all(|ctx| ctx.entity() == scene.hero));
    }

    #[test]
    fn directions_skip_coincident_hostiles() {
        let mut scene = scene();
        scene.host.set_position(scene.orcs[0], Vec3::ZERO);
        let view = SceneView::new(&scene.host, &scene.roster);

        let contexts = HostileDirectionsFactory { radius: 10. }.create_contexts(scene.hero, &view);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].direction().map(|dir| dir.as_vec3()), Some(Vec3::X));
    }

    #[test]
    fn clusters_group_neighbours() {
        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        let contexts = HostileClusterFactory { radius: 50., cluster_radius: 2. }.create_contexts(scene.hero, &view);
        let sizes: Vec<usize> = contexts.iter().filter_map(|ctx| ctx.points().map(<[Vec3]>::len)).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn allies_exclude_self() {
        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        let factory = AlliesInRangeFactory { radius: 10., mask: FactionMask::FRIENDLY };
        let contexts = factory.create_contexts(scene.hero, &view);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].target(), Some(scene.cleric));
    }

    #[test]
    fn registry_with_closures() {
        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        let mut registry = ContextFactoryRegistry::with_builtins();
        registry.register("Nothing", |_: EntityRef, _: &dyn WorldView| Vec::<Context>::new());

        assert_eq!(registry.get("Self").map(|f| f.create_contexts(scene.hero, &view).len()), Some(1));
        assert_eq!(registry.get("Nothing").map(|f| f.create_contexts(scene.hero, &view).len()), Some(0));
        assert!(registry.get("Everything").is_none());
    }
}
