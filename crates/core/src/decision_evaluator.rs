/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Decision Evaluators and the Decision Maker.
//! 
//! A [`DecisionEvaluator`] answers 'what is the best Context for this one kind of action?': 
//! it asks its Context Factory for candidates, scores each of them against all of its 
//! Considerations and keeps the best one.
//! 
//! A [`DecisionMaker`] answers 'what should I do?': it runs one evaluator per Ability, 
//! weighs their results by priority and picks the overall winner, which then seeds a cast.
//! 
//! Scoring rule, applied uniformly:
//! 
//! `composite = compensate(Π score_i ^ weight_i)`
//! 
//! where `compensate` is [`consideration_adjustment`] (unless disabled in the config). 
//! A zero from any Consideration vetoes the candidate outright. Ties are broken in favor 
//! of whichever candidate came first in the Factory's output, so evaluation is deterministic.
use bevy::platform::sync::Arc;

use crate::config::GambitConfig;
use crate::considerations::{BoundConsideration, ConsiderationSpec};
use crate::context::Context;
use crate::context_factories::ContextFactory;
use crate::errors::{NoMatchStrategy, RegistryError};
use crate::simulation::Catalog;
use crate::types::{AbilityId, ContextFactoryKey, EntityRef, UtilityScore, MAX_UTILITY_SCORE, MIN_UTILITY_SCORE};
use crate::world::WorldView;

/// Correction formula as per the GDC 2015 "Building a Better Centaur AI" 
/// presentation by Dave Mark and Mike Lewis.
/// 
/// Multiplying scores means each extra Consideration can only drag the total down, 
/// which would make well-specified Decisions lose to sloppy ones. This gives back 
/// a share of the lost score that grows with the number of Considerations.
/// 
/// Example w/ 5 Considerations:
/// - Input 0.900 => Output = 0.972
/// - Input 0.500 => Output = 0.700
/// - Input 1.000 => Output = 1.000
pub fn consideration_adjustment(score: UtilityScore, num_considerations: usize) -> UtilityScore {
    if score <= MIN_UTILITY_SCORE {
        return MIN_UTILITY_SCORE
    }

    if score >= MAX_UTILITY_SCORE {
        return MAX_UTILITY_SCORE
    }

    if num_considerations == 0 {
        return score
    }

    let modification_factor = 1. - (1. / num_considerations as f32);
    let makeup = (1. - score) * modification_factor;
    score + (makeup * score)
}

/// A candidate Context together with its composite score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredContext {
    pub context: Context,
    pub score: UtilityScore,
}

#[derive(Clone)]
pub struct DecisionEvaluator {
    name: String,
    factory: Option<Arc<dyn ContextFactory>>,
    considerations: Vec<BoundConsideration>,
    priority: f32,
    compensate: bool,
}

impl DecisionEvaluator {
    pub fn builder<S: Into<String>>(name: S) -> DecisionEvaluatorBuilder {
        DecisionEvaluatorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn considerations(&self) -> &[BoundConsideration] {
        &self.considerations
    }

    /// Candidates for `entity` this cycle; empty if the Factory could not be resolved.
    pub fn candidates(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<Context> {
        match &self.factory {
            Some(factory) => factory.create_contexts(entity, world),
            None => Vec::new(),
        }
    }

    /// The composite score of one Context, excluding priority.
    /// 
    /// Zero-weight Considerations neither score nor count towards the compensation.
    pub fn composite_score(&self, ctx: &Context, world: &dyn WorldView) -> UtilityScore {
        let mut score = MAX_UTILITY_SCORE;
        let mut contributing = 0;

        for consideration in self.considerations.iter() {
            let weight = consideration.weight();
            if weight == 0. {
                continue;
            }

            contributing += 1;
            score *= consideration.score(ctx, world).powf(weight);

            // Nothing can bring a zero back, so skip the remaining Considerations.
            if score <= MIN_UTILITY_SCORE {
                return MIN_UTILITY_SCORE;
            }
        }

        match self.compensate {
            true => consideration_adjustment(score, contributing),
            false => score,
        }
    }

    pub fn score_all(&self, entity: EntityRef, world: &dyn WorldView) -> Vec<ScoredContext> {
        self.candidates(entity, world)
            .into_iter()
            .map(|context| {
                let score = self.composite_score(&context, world);
                ScoredContext { context, score }
            })
            .collect()
    }

    /// The best candidate whose score is strictly above `threshold`, or None.
    pub fn evaluate(&self, entity: EntityRef, world: &dyn WorldView, threshold: UtilityScore) -> Option<ScoredContext> {
        let mut best: Option<ScoredContext> = None;

        for context in self.candidates(entity, world) {
            let score = self.composite_score(&context, world);

            let beats_best = match &best {
                None => score > threshold,
                Some(current) => score > current.score,
            };

            if beats_best {
                best = Some(ScoredContext { context, score });
            }
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!(
            "DecisionEvaluator::evaluate: {} for {:?} => {:?}", 
            self.name, entity, best.as_ref().map(|scored| scored.score),
        );

        best
    }
}

impl core::fmt::Debug for DecisionEvaluator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecisionEvaluator")
            .field("name", &self.name)
            .field("has_factory", &self.factory.is_some())
            .field("considerations", &self.considerations)
            .field("priority", &self.priority)
            .field("compensate", &self.compensate)
            .finish()
    }
}

enum FactorySource {
    Key(ContextFactoryKey),
    Instance(Arc<dyn ContextFactory>),
}

/// Builds a [`DecisionEvaluator`] from designer-facing keys, resolved against a [`Catalog`].
pub struct DecisionEvaluatorBuilder {
    name: String,
    factory: Option<FactorySource>,
    considerations: Vec<ConsiderationSpec>,
    bound: Vec<BoundConsideration>,
    priority: f32,
}

impl DecisionEvaluatorBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            factory: None,
            considerations: Vec::new(),
            bound: Vec::new(),
            priority: 1.,
        }
    }

    pub fn factory<K: Into<ContextFactoryKey>>(mut self, key: K) -> Self {
        self.factory = Some(FactorySource::Key(key.into()));
        self
    }

    pub fn factory_instance<F: ContextFactory + 'static>(mut self, factory: F) -> Self {
        self.factory = Some(FactorySource::Instance(Arc::new(factory)));
        self
    }

    pub fn consideration(mut self, spec: ConsiderationSpec) -> Self {
        self.considerations.push(spec);
        self
    }

    /// Adds an already-resolved Consideration; it is scored after the keyed ones.
    pub fn bound_consideration(mut self, consideration: BoundConsideration) -> Self {
        self.bound.push(consideration);
        self
    }

    pub fn priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    pub fn build(self, catalog: &Catalog, config: &GambitConfig) -> Result<DecisionEvaluator, RegistryError> {
        let strategy = &config.no_match_strategy;

        let factory = match self.factory {
            Some(FactorySource::Instance(instance)) => Some(instance),
            Some(FactorySource::Key(key)) => match catalog.context_factories.get(key.as_str()) {
                Some(found) => Some(found),
                None => match strategy {
                    NoMatchStrategy::Reject => return Err(RegistryError::UnknownContextFactory(
                        key.as_str().to_owned()
                    )),
                    _ => {
                        #[cfg(feature = "logging")]
                        bevy::log::warn!(
                            "DecisionEvaluatorBuilder::build: {} - unknown Context Factory {}; it will never produce candidates.", 
                            self.name, key
                        );
                        None
                    }
                }
            },
            None => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("DecisionEvaluatorBuilder::build: {} - no Context Factory set.", self.name);
                None
            },
        };

        let mut considerations = Vec::with_capacity(self.considerations.len() + self.bound.len());
        for spec in self.considerations.iter() {
            let bound = BoundConsideration::bind(spec, &catalog.considerations, &catalog.curves, strategy)?;
            considerations.extend(bound);
        }
        considerations.extend(self.bound);

        Ok(DecisionEvaluator {
            name: self.name,
            factory,
            considerations,
            priority: self.priority,
            compensate: config.apply_consideration_compensation,
        })
    }
}


/// One entry of a [`DecisionMaker`]: which Ability to cast, and how to pick its Context.
#[derive(Debug, Clone)]
pub struct Decision {
    pub ability: AbilityId,
    pub evaluator: DecisionEvaluator,
}

/// The winning Ability/Context pair of a decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenDecision {
    pub ability: AbilityId,
    pub context: Context,
    /// Composite score times priority.
    pub score: UtilityScore,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionMaker {
    decisions: Vec<Decision>,
}

impl DecisionMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decision<A: Into<AbilityId>>(mut self, ability: A, evaluator: DecisionEvaluator) -> Self {
        self.push(ability, evaluator);
        self
    }

    pub fn push<A: Into<AbilityId>>(&mut self, ability: A, evaluator: DecisionEvaluator) {
        self.decisions.push(Decision { ability: ability.into(), evaluator });
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Picks the highest-scoring Decision whose Ability `is_available`. 
    /// 
    /// Unavailable Abilities (casting, on cooldown) are skipped before any scoring happens.
    pub fn decide(
        &self, 
        entity: EntityRef, 
        world: &dyn WorldView, 
        threshold: UtilityScore,
        is_available: impl Fn(&AbilityId) -> bool,
    ) -> Option<ChosenDecision> {
        let mut best: Option<ChosenDecision> = None;

        for decision in self.decisions.iter() {
            if !is_available(&decision.ability) {
                continue;
            }

            let Some(scored) = decision.evaluator.evaluate(entity, world, threshold) else {
                continue;
            };

            let score = scored.score * decision.evaluator.priority();
            let beats_best = match &best {
                None => score > threshold,
                Some(current) => score > current.score,
            };

            if beats_best {
                best = Some(ChosenDecision { 
                    ability: decision.ability.clone(), 
                    context: scored.context, 
                    score,
                });
            }
        }

        match &best {
            None => {
                #[cfg(feature = "logging")]
                bevy::log::debug!("DecisionMaker::decide: {:?} - no suitable Decision found.", entity);
            },
            Some(_chosen) => {
                #[cfg(feature = "logging")]
                bevy::log::debug!(
                    "DecisionMaker::decide: {:?} - picked {} w/ score {:?}.", 
                    entity, _chosen.ability, _chosen.score,
                );
            }
        }

        best
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::World;
    use bevy::math::Vec3;
    use crate::agent::{Agent, Roster};
    use crate::attributes::{AttributeSet, ResourcePool};
    use crate::considerations::{Constant, ContextValueLookup, TargetAttributeFraction};
    use crate::context_factories::HostileTargetsFactory;
    use crate::curves::BuiltinCurve;
    use crate::testing::MockHost;
    use crate::world::{FactionMask, SceneView};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn fixed(score: f32, weight: f32) -> BoundConsideration {
        BoundConsideration::new("fixed".into(), Arc::new(Constant(score)), BuiltinCurve::Linear.into(), 0., 1., weight)
    }

    #[test]
    fn adjustment_matches_reference_values() {
        assert!(approx(consideration_adjustment(0.9, 5), 0.972));
        assert!(approx(consideration_adjustment(0.5, 5), 0.7));
        assert!(approx(consideration_adjustment(0.5, 10), 0.725));
        assert_eq!(consideration_adjustment(1., 5), 1.);
        assert_eq!(consideration_adjustment(0., 5), 0.);
        assert_eq!(consideration_adjustment(0.4, 1), 0.4);
    }

    struct Scene {
        host: MockHost,
        roster: Roster,
        priest: EntityRef,
        bandits: [EntityRef; 3],
    }

    fn scene() -> Scene {
        let mut world = World::new();
        let priest = world.spawn_empty().id();
        let bandits = [world.spawn_empty().id(), world.spawn_empty().id(), world.spawn_empty().id()];

        let mut host = MockHost::new();
        host.spawn(priest, Vec3::ZERO, FactionMask::PLAYER);
        for (idx, bandit) in bandits.iter().enumerate() {
            host.spawn(*bandit, Vec3::new(1. + idx as f32, 0., 0.), FactionMask::HOSTILE);
        }

        let mut roster = Roster::default();
        roster.insert(Agent::new(priest)).unwrap();
        for (bandit, health) in bandits.iter().zip([30., 5., 5.]) {
            roster.insert(Agent::new(*bandit).with_attributes(
                AttributeSet::new().with_resource("health", ResourcePool::new(30.).with_current(health))
            )).unwrap();
        }

        Scene { host, roster, priest, bandits }
    }

    fn finisher(catalog: &Catalog, config: &GambitConfig) -> DecisionEvaluator {
        DecisionEvaluator::builder("Finisher")
            .factory_instance(HostileTargetsFactory { radius: 10. })
            .bound_consideration(BoundConsideration::new(
                "TargetHealth".into(), 
                Arc::new(TargetAttributeFraction::new("health")), 
                BuiltinCurve::AntiLinear.into(), 
                0., 1., 1.,
            ))
            .build(catalog, config)
            .unwrap()
    }

    #[test]
    fn weighted_product_without_compensation() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::builder().set_apply_consideration_compensation(false).build();

        let evaluator = DecisionEvaluator::builder("Product")
            .factory("Self")
            .bound_consideration(fixed(0.5, 1.))
            .bound_consideration(fixed(0.5, 2.))
            .bound_consideration(fixed(0.1, 0.))
            .build(&catalog, &config)
            .unwrap();

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);
        let best = evaluator.evaluate(scene.priest, &view, 0.).unwrap();
        assert!(approx(best.score, 0.125));
    }

    #[test]
    fn zero_weight_considerations_do_not_change_compensation() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::default();

        let plain = DecisionEvaluator::builder("Plain")
            .factory("Self")
            .bound_consideration(fixed(0.5, 1.))
            .bound_consideration(fixed(0.5, 1.))
            .build(&catalog, &config)
            .unwrap();

        let padded = DecisionEvaluator::builder("Padded")
            .factory("Self")
            .bound_consideration(fixed(0.5, 1.))
            .bound_consideration(fixed(0.1, 0.))
            .bound_consideration(fixed(0.5, 1.))
            .bound_consideration(fixed(0.9, 0.))
            .build(&catalog, &config)
            .unwrap();

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);
        let plain = plain.evaluate(scene.priest, &view, 0.).unwrap();
        let padded = padded.evaluate(scene.priest, &view, 0.).unwrap();

        assert!(approx(plain.score, consideration_adjustment(0.25, 2)));
        assert_eq!(padded.score, plain.score);
    }

    #[test]
    fn zero_score_vetoes() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::default();

        let evaluator = DecisionEvaluator::builder("Veto")
            .factory("Self")
            .bound_consideration(fixed(0., 1.))
            .bound_consideration(fixed(1., 1.))
            .build(&catalog, &config)
            .unwrap();

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);
        assert_eq!(evaluator.evaluate(scene.priest, &view, 0.), None);
    }

    #[test]
    fn ties_keep_the_first_candidate_and_repeat() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::default();
        let evaluator = finisher(&catalog, &config);

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        // Bandits 1 and 2 are equally hurt; 1 is nearer and so listed first.
        let first = evaluator.evaluate(scene.priest, &view, 0.).unwrap();
        assert_eq!(first.context.target(), Some(scene.bandits[1]));

        for _ in 0..5 {
            assert_eq!(evaluator.evaluate(scene.priest, &view, 0.), Some(first.clone()));
        }
    }

    #[test]
    fn empty_candidate_set_means_no_decision() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::default();
        let evaluator = finisher(&catalog, &config);

        let mut scene = scene();
        for bandit in scene.bandits {
            scene.host.set_position(bandit, Vec3::new(500., 0., 0.));
        }
        let view = SceneView::new(&scene.host, &scene.roster);

        assert!(evaluator.score_all(scene.priest, &view).is_empty());
        assert_eq!(evaluator.evaluate(scene.priest, &view, 0.), None);
    }

    #[test]
    fn threshold_is_strict() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::builder().set_apply_consideration_compensation(false).build();
        let evaluator = DecisionEvaluator::builder("Half")
            .factory("Self")
            .bound_consideration(fixed(0.5, 1.))
            .build(&catalog, &config)
            .unwrap();

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);
        assert_eq!(evaluator.evaluate(scene.priest, &view, 0.5), None);
        assert!(evaluator.evaluate(scene.priest, &view, 0.49).is_some());
    }

    #[test]
    fn unknown_factory_follows_strategy() {
        let catalog = Catalog::with_builtins();

        let strict = GambitConfig::builder().set_no_match_strategy(NoMatchStrategy::reject()).build();
        let result = DecisionEvaluator::builder("Lost").factory("Nowhere").build(&catalog, &strict);
        assert_eq!(result.err(), Some(RegistryError::UnknownContextFactory("Nowhere".to_owned())));

        let lenient = GambitConfig::default();
        let evaluator = DecisionEvaluator::builder("Lost").factory("Nowhere").build(&catalog, &lenient).unwrap();
        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);
        assert!(evaluator.candidates(scene.priest, &view).is_empty());
    }

    #[test]
    fn maker_weighs_priority_and_availability() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::builder().set_apply_consideration_compensation(false).build();

        let smite = DecisionEvaluator::builder("Smite")
            .factory("Self")
            .bound_consideration(fixed(0.6, 1.))
            .build(&catalog, &config)
            .unwrap();
        let pray = DecisionEvaluator::builder("Pray")
            .factory("Self")
            .consideration(ConsiderationSpec::new("Constant", "ConstHalf", 0., 1.))
            .priority(1.5)
            .build(&catalog, &config)
            .unwrap();

        let maker = DecisionMaker::new()
            .with_decision("Smite", smite)
            .with_decision("Pray", pray);

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);

        let chosen = maker.decide(scene.priest, &view, 0., |_| true).unwrap();
        assert_eq!(chosen.ability.as_str(), "Pray");
        assert!(approx(chosen.score, 0.75));

        let chosen = maker.decide(scene.priest, &view, 0., |id| id.as_str() != "Pray").unwrap();
        assert_eq!(chosen.ability.as_str(), "Smite");

        assert_eq!(maker.decide(scene.priest, &view, 0., |_| false), None);
    }

    #[test]
    fn context_values_feed_scores() {
        let catalog = Catalog::with_builtins();
        let config = GambitConfig::builder().set_apply_consideration_compensation(false).build();
        let evaluator = DecisionEvaluator::builder("Threat")
            .factory_instance(|entity: EntityRef, _: &dyn WorldView| {
                [0.2_f32, 0.9, 0.4]
                    .into_iter()
                    .filter_map(|threat| Context::self_only(entity).ok().map(|ctx| ctx.with_value("threat", threat)))
                    .collect::<Vec<Context>>()
            })
            .bound_consideration(BoundConsideration::new(
                "Threat".into(), 
                Arc::new(ContextValueLookup::new("threat")), 
                BuiltinCurve::Linear.into(), 
                0., 1., 1.,
            ))
            .build(&catalog, &config)
            .unwrap();

        let scene = scene();
        let view = SceneView::new(&scene.host, &scene.roster);
        let best = evaluator.evaluate(scene.priest, &view, 0.).unwrap();
        assert_eq!(best.context.float_value("threat"), Some(0.9));
        assert_eq!(evaluator.score_all(scene.priest, &view).len(), 3);
    }
}
