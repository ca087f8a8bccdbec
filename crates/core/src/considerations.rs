/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Considerations - single-axis scoring of a Context.
//! 
//! A Consideration reads some domain value for a Context (distance to the target, 
//! the caster's remaining mana, how many enemies a point would hit...). That raw value 
//! is rescaled from the designer-provided `[min, max]` range onto the unit interval and 
//! fed through a Response Curve, yielding a score in `[0, 1]`.
//! 
//! If a Consideration cannot compute its value (no target, the attribute does not exist), 
//! it reports `None` and the score becomes its documented fallback. This is never an error.
use bevy::math::Vec3;
use bevy::platform::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::curves::{CurveRegistry, ResponseCurve, SupportedResponseCurve};
use crate::errors::{NoMatchStrategy, RegistryError};
use crate::types::{ConsiderationKey, CurveKey, KvMap, UtilityScore, MAX_UTILITY_SCORE, MIN_UTILITY_SCORE};
use crate::world::WorldView;

pub trait Consideration: Send + Sync {
    /// The un-normalized domain value, or None if the Context lacks the data for it.
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32>;

    /// The final score used when `raw_score()` returns None. Not passed through the Curve.
    fn missing_data_score(&self) -> UtilityScore {
        MIN_UTILITY_SCORE
    }
}

/// Caster-to-target distance; Point Contexts measure to the point instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetDistance;

impl Consideration for TargetDistance {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        match (ctx.target(), ctx.point_value()) {
            (Some(target), _) => world.distance(ctx.entity(), target),
            (None, Some(point)) => Some(world.position(ctx.entity())?.distance(point)),
            (None, None) => None,
        }
    }
}

fn centroid(points: &[Vec3]) -> Option<Vec3> {
    match points.is_empty() {
        true => None,
        false => Some(points.iter().copied().sum::<Vec3>() / points.len() as f32),
    }
}

/// Distance from the caster to the Context's point, or to the centroid of a MultiPoint Context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointDistance;

impl Consideration for PointDistance {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        let point = match ctx.point_value() {
            Some(point) => point,
            None => centroid(ctx.points()?)?,
        };
        Some(world.position(ctx.entity())?.distance(point))
    }
}

#[derive(Debug, Clone)]
pub struct SelfAttributeFraction {
    pub attribute: String,
}

impl SelfAttributeFraction {
    pub fn new<S: Into<String>>(attribute: S) -> Self {
        Self { attribute: attribute.into() }
    }
}

impl Consideration for SelfAttributeFraction {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        world.attribute_fraction(ctx.entity(), &self.attribute)
    }
}

#[derive(Debug, Clone)]
pub struct TargetAttributeFraction {
    pub attribute: String,
}

impl TargetAttributeFraction {
    pub fn new<S: Into<String>>(attribute: S) -> Self {
        Self { attribute: attribute.into() }
    }
}

impl Consideration for TargetAttributeFraction {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        world.attribute_fraction(ctx.target()?, &self.attribute)
    }
}

#[derive(Debug, Clone)]
pub struct SelfAttributeValue {
    pub attribute: String,
}

impl SelfAttributeValue {
    pub fn new<S: Into<String>>(attribute: S) -> Self {
        Self { attribute: attribute.into() }
    }
}

impl Consideration for SelfAttributeValue {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        world.attribute_value(ctx.entity(), &self.attribute)
    }
}

#[derive(Debug, Clone)]
pub struct TargetAttributeValue {
    pub attribute: String,
}

impl TargetAttributeValue {
    pub fn new<S: Into<String>>(attribute: S) -> Self {
        Self { attribute: attribute.into() }
    }
}

impl Consideration for TargetAttributeValue {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        world.attribute_value(ctx.target()?, &self.attribute)
    }
}

/// 1.0 if the deciding Entity is moving, 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct CasterMoving;

impl Consideration for CasterMoving {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        match world.is_moving(ctx.entity()) {
            true => Some(1.),
            false => Some(0.),
        }
    }
}

/// How closely the caster already faces the Context's direction, target or point.
/// 
/// Dot product of the forward vector and the wanted direction, remapped from `[-1, 1]` 
/// to `[0, 1]` (so 1.0 = facing it, 0.5 = perpendicular, 0.0 = facing away).
#[derive(Debug, Clone, Copy, Default)]
pub struct FacingAlignment;

impl Consideration for FacingAlignment {
    fn raw_score(&self, ctx: &Context, world: &dyn WorldView) -> Option<f32> {
        let caster = ctx.entity();
        let forward = world.forward(caster)?;

        let wanted = match (ctx.direction(), ctx.target(), ctx.point_value()) {
            (Some(direction), _, _) => direction.as_vec3(),
            (None, Some(target), _) => world.position(target)? - world.position(caster)?,
            (None, None, Some(point)) => point - world.position(caster)?,
            (None, None, None) => return None,
        };

        let wanted = wanted.try_normalize()?;
        Some((forward.dot(wanted) + 1.) / 2.)
    }
}

/// Number of points in a MultiPoint Context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointCount;

impl Consideration for PointCount {
    fn raw_score(&self, ctx: &Context, _world: &dyn WorldView) -> Option<f32> {
        ctx.points().map(|points| points.len() as f32)
    }
}

/// Reads a numeric value from the Context's value bag.
#[derive(Debug, Clone)]
pub struct ContextValueLookup {
    pub key: String,
}

impl ContextValueLookup {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self { key: key.into() }
    }
}

impl Consideration for ContextValueLookup {
    fn raw_score(&self, ctx: &Context, _world: &dyn WorldView) -> Option<f32> {
        ctx.float_value(&self.key)
    }
}

/// Always the same raw value; handy as a baseline score.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f32);

impl Consideration for Constant {
    fn raw_score(&self, _ctx: &Context, _world: &dyn WorldView) -> Option<f32> {
        Some(self.0)
    }
}


fn default_weight() -> f32 {
    1.
}

/// Designer-facing description of one Consideration in a Decision.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsiderationSpec {
    pub consideration: ConsiderationKey,
    pub curve: CurveKey,
    pub min: f32,
    pub max: f32,
    #[cfg_attr(feature = "serde", serde(default = "default_weight"))]
    pub weight: f32,
}

impl ConsiderationSpec {
    pub fn new<C: Into<ConsiderationKey>, K: Into<CurveKey>>(consideration: C, curve: K, min: f32, max: f32) -> Self {
        Self {
            consideration: consideration.into(),
            curve: curve.into(),
            min,
            max,
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// A [`ConsiderationSpec`] with its keys resolved, ready for scoring.
#[derive(Clone)]
pub struct BoundConsideration {
    key: ConsiderationKey,
    consideration: Arc<dyn Consideration>,
    curve: SupportedResponseCurve,
    min: f32,
    max: f32,
    weight: f32,
}

impl BoundConsideration {
    pub fn new(
        key: ConsiderationKey, 
        consideration: Arc<dyn Consideration>, 
        curve: SupportedResponseCurve, 
        min: f32, 
        max: f32, 
        weight: f32,
    ) -> Self {
        let (min, max) = match min <= max {
            true => (min, max),
            false => {
                #[cfg(feature = "logging")]
                bevy::log::warn!(
                    "BoundConsideration::new: Consideration {} has min={} > max={}; swapping them.",
                    key, min, max,
                );
                (max, min)
            }
        };

        let weight = match weight.is_finite() && weight >= 0. {
            true => weight,
            false => {
                #[cfg(feature = "logging")]
                bevy::log::warn!(
                    "BoundConsideration::new: Consideration {} has an invalid weight {}; using 0.",
                    key, weight,
                );
                0.
            }
        };

        Self { key, consideration, curve, min, max, weight }
    }

    /// Resolves the keys of a spec.
    /// 
    /// `Ok(None)` means the Consideration was dropped as per the `NoMatchStrategy`.
    pub fn bind(
        spec: &ConsiderationSpec, 
        considerations: &ConsiderationRegistry, 
        curves: &CurveRegistry, 
        strategy: &NoMatchStrategy,
    ) -> Result<Option<Self>, RegistryError> {
        let consideration = match considerations.get(spec.consideration.as_str()) {
            Some(found) => found,
            None => return match strategy {
                NoMatchStrategy::Reject => Err(RegistryError::UnknownConsideration(
                    spec.consideration.as_str().to_owned()
                )),
                _ => {
                    #[cfg(feature = "logging")]
                    bevy::log::warn!(
                        "BoundConsideration::bind: unknown Consideration key {}, skipping it.", 
                        spec.consideration
                    );
                    Ok(None)
                }
            },
        };

        let curve = match curves.get(spec.curve.as_str()) {
            Some(found) => found,
            None => match strategy {
                NoMatchStrategy::Reject => return Err(RegistryError::UnknownCurve(
                    spec.curve.as_str().to_owned()
                )),
                NoMatchStrategy::SkipConsiderationWithLog => {
                    #[cfg(feature = "logging")]
                    bevy::log::warn!(
                        "BoundConsideration::bind: unknown Curve key {} for Consideration {}, skipping it.", 
                        spec.curve, spec.consideration
                    );
                    return Ok(None)
                },
                NoMatchStrategy::DefaultCurveWithLog(fallback) => {
                    let curve = fallback(spec.curve.as_str());
                    #[cfg(feature = "logging")]
                    bevy::log::warn!(
                        "BoundConsideration::bind: unknown Curve key {} for Consideration {}, using fallback {:?}.", 
                        spec.curve, spec.consideration, curve
                    );
                    curve
                }
            },
        };

        Ok(Some(Self::new(
            spec.consideration.clone(), 
            consideration, 
            curve, 
            spec.min, 
            spec.max, 
            spec.weight,
        )))
    }

    pub fn key(&self) -> &ConsiderationKey {
        &self.key
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Maps a raw value onto the unit interval. A zero-width range acts as a step at max.
    pub fn normalize(&self, raw: f32) -> UtilityScore {
        let width = self.max - self.min;
        match width > 0. {
            true => ((raw - self.min) / width).clamp(MIN_UTILITY_SCORE, MAX_UTILITY_SCORE),
            false => match raw >= self.max {
                true => MAX_UTILITY_SCORE,
                false => MIN_UTILITY_SCORE,
            },
        }
    }

    pub fn score(&self, ctx: &Context, world: &dyn WorldView) -> UtilityScore {
        let raw = self.consideration.raw_score(ctx, world).filter(|raw| !raw.is_nan());

        let score = match raw {
            None => self.consideration.missing_data_score().clamp(MIN_UTILITY_SCORE, MAX_UTILITY_SCORE),
            Some(raw) => self.curve.sample_safe(self.normalize(raw)),
        };

        #[cfg(feature = "logging")]
        bevy::log::debug!(
            "BoundConsideration::score: {} for {:?} - raw {:?} => score {:?}",
            self.key, ctx.entity(), raw, score,
        );

        score
    }
}

impl core::fmt::Debug for BoundConsideration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundConsideration")
            .field("key", &self.key)
            .field("curve", &self.curve)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("weight", &self.weight)
            .finish()
    }
}


/// Maps [`ConsiderationKey`]s to Consideration implementations.
#[derive(Clone, Default)]
pub struct ConsiderationRegistry {
    mapping: KvMap<ConsiderationKey, Arc<dyn Consideration>>,
}

impl ConsiderationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the library's parameterless Considerations 
    /// plus 'health'/'mana' flavors of the attribute-based ones.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("TargetDistance", TargetDistance);
        registry.register("PointDistance", PointDistance);
        registry.register("CasterMoving", CasterMoving);
        registry.register("FacingAlignment", FacingAlignment);
        registry.register("PointCount", PointCount);
        registry.register("Constant", Constant(1.));
        registry.register("SelfHealthFraction", SelfAttributeFraction::new("health"));
        registry.register("SelfManaFraction", SelfAttributeFraction::new("mana"));
        registry.register("TargetHealthFraction", TargetAttributeFraction::new("health"));
        registry.register("TargetHealth", TargetAttributeValue::new("health"));
        registry
    }

    /// Registers a Consideration; an existing entry under the same key gets replaced.
    pub fn register<C: Consideration + 'static, K: Into<ConsiderationKey>>(&mut self, key: K, consideration: C) -> &mut Self {
        let key = key.into();
        let old = self.mapping.insert(key.clone(), Arc::new(consideration));

        if old.is_some() {
            #[cfg(feature = "logging")]
            bevy::log::warn!("ConsiderationRegistry::register: replacing existing Consideration {}", key);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Consideration>> {
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

impl core::fmt::Debug for ConsiderationRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.mapping.keys()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::World;
    use bevy::math::Dir3;
    use crate::agent::{Agent, Roster};
    use crate::attributes::{AttributeSet, ResourcePool};
    use crate::curves::BuiltinCurve;
    use crate::testing::MockHost;
    use crate::types::EntityRef;
    use crate::world::{FactionMask, SceneView};

    fn bound<C: Consideration + 'static>(consideration: C, curve: BuiltinCurve, min: f32, max: f32) -> BoundConsideration {
        BoundConsideration::new("test".into(), Arc::new(consideration), curve.into(), min, max, 1.)
    }

    fn scene() -> (MockHost, Roster, EntityRef, EntityRef) {
        let mut world = World::new();
        let archer = world.spawn_empty().id();
        let wolf = world.spawn_empty().id();

        let mut host = MockHost::new();
        host.spawn(archer, Vec3::ZERO, FactionMask::PLAYER);
        host.spawn(wolf, Vec3::new(0., 0., 10.), FactionMask::WILDLIFE);
        host.set_forward(archer, Dir3::Z);

        let mut roster = Roster::default();
        roster.insert(Agent::new(archer)).unwrap();
        roster.insert(Agent::new(wolf).with_attributes(
            AttributeSet::new().with_resource("health", ResourcePool::new(40.).with_current(10.))
        )).unwrap();

        (host, roster, archer, wolf)
    }

    #[test]
    fn raw_values_are_rescaled_then_curved() {
        let (host, roster, archer, wolf) = scene();
        let view = SceneView::new(&host, &roster);
        let ctx = Context::single_target(archer, wolf).unwrap();

        let linear = bound(TargetDistance, BuiltinCurve::Linear, 0., 40.);
        assert!((linear.score(&ctx, &view) - 0.25).abs() < 1e-5);

        let anti = bound(TargetDistance, BuiltinCurve::AntiLinear, 0., 40.);
        assert!((anti.score(&ctx, &view) - 0.75).abs() < 1e-5);

        let saturated = bound(TargetDistance, BuiltinCurve::Linear, 0., 5.);
        assert_eq!(saturated.score(&ctx, &view), 1.);
    }

    #[test]
    fn flipped_range_is_swapped() {
        let flipped = bound(Constant(3.), BuiltinCurve::Linear, 4., 2.);
        let upright = bound(Constant(3.), BuiltinCurve::Linear, 2., 4.);
        assert_eq!(flipped.normalize(3.), upright.normalize(3.));
        assert_eq!(flipped.normalize(3.), 0.5);
    }

    #[test]
    fn zero_width_range_steps_at_max() {
        let step = bound(Constant(0.), BuiltinCurve::Linear, 5., 5.);
        assert_eq!(step.normalize(4.99), 0.);
        assert_eq!(step.normalize(5.), 1.);
    }

    #[test]
    fn missing_data_uses_fallback_without_curve() {
        let (host, roster, archer, _) = scene();
        let view = SceneView::new(&host, &roster);
        let ctx = Context::self_only(archer).unwrap();

        // AntiLinear would turn a 0.0 into 1.0 if the fallback were curved.
        let anti = bound(TargetDistance, BuiltinCurve::AntiLinear, 0., 10.);
        assert_eq!(anti.score(&ctx, &view), 0.);

        let fraction = bound(TargetAttributeFraction::new("health"), BuiltinCurve::AntiLinear, 0., 1.);
        assert_eq!(fraction.score(&ctx, &view), 0.);
    }

    #[test]
    fn facing_alignment_remaps_dot_product() {
        let (host, roster, archer, wolf) = scene();
        let view = SceneView::new(&host, &roster);

        let ahead = Context::single_target(archer, wolf).unwrap();
        assert_eq!(FacingAlignment.raw_score(&ahead, &view), Some(1.));

        let behind = Context::directional(archer, Vec3::new(0., 0., -1.)).unwrap();
        assert_eq!(FacingAlignment.raw_score(&behind, &view), Some(0.));

        let side = Context::point(archer, Vec3::new(3., 0., 0.)).unwrap();
        assert!((FacingAlignment.raw_score(&side, &view).unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn multipoint_considerations() {
        let (host, roster, archer, _) = scene();
        let view = SceneView::new(&host, &roster);
        let ctx = Context::multi_point(archer, vec![Vec3::new(2., 0., 0.), Vec3::new(4., 0., 0.)]).unwrap();

        assert_eq!(PointCount.raw_score(&ctx, &view), Some(2.));
        assert_eq!(PointDistance.raw_score(&ctx, &view), Some(3.));
    }

    #[test]
    fn bind_respects_no_match_strategy() {
        let considerations = ConsiderationRegistry::with_builtins();
        let curves = CurveRegistry::new();

        let bad_curve = ConsiderationSpec::new("TargetDistance", "Squiggle", 0., 10.);
        let bad_key = ConsiderationSpec::new("Vibes", "Linear", 0., 10.);

        assert_eq!(
            BoundConsideration::bind(&bad_curve, &considerations, &curves, &NoMatchStrategy::reject()).err(),
            Some(RegistryError::UnknownCurve("Squiggle".to_owned()))
        );
        assert_eq!(
            BoundConsideration::bind(&bad_key, &considerations, &curves, &NoMatchStrategy::reject()).err(),
            Some(RegistryError::UnknownConsideration("Vibes".to_owned()))
        );
        assert!(matches!(
            BoundConsideration::bind(&bad_curve, &considerations, &curves, &NoMatchStrategy::skip_consideration()),
            Ok(None)
        ));

        let fallback = NoMatchStrategy::log_and_default_to(
            |_: &str| -> SupportedResponseCurve { BuiltinCurve::ConstHalf.into() }
        );
        let bound = BoundConsideration::bind(&bad_curve, &considerations, &curves, &fallback)
            .unwrap()
            .unwrap();
        assert_eq!(bound.key().as_str(), "TargetDistance");
    }
}
