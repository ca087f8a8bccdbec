/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
use bevy::ecs::world::World;
use bevy::math::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use gambit::prelude::*;
use gambit::context_factories::{AlliesInRangeFactory, HostileTargetsFactory};
use gambit::requirements::{TargetAlive, TargetInRange};
use gambit::status::{DispelOutcome, DispelResistance, PeriodicResource};
use gambit_core::testing::{MockHost, RecordingEffectSink};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

struct Skirmish {
    sim: Simulation,
    host: MockHost,
    priest: EntityRef,
    knight: EntityRef,
    bandit: EntityRef,
}

fn catalog() -> Catalog {
    let mut catalog = Catalog::with_builtins();
    catalog.context_factories.register("AlliesInRange", AlliesInRangeFactory { radius: 10., mask: FactionMask::FRIENDLY });
    catalog.context_factories.register("HostilesInRange", HostileTargetsFactory { radius: 10. });
    catalog.register_status(
        StatusPrototype::builder("Bleeding")
            .duration(4.)
            .tick_interval(1.)
            .stackable(true)
            .max_stacks(3)
            .tag("Physical")
            .resistance(DispelResistance::new(1, 20, 21))
            .action(PeriodicResource::new("health", -1.))
            .build()
    ).unwrap();
    catalog
}

fn skirmish(config: GambitConfig) -> Skirmish {
    let mut world = World::new();
    let priest = world.spawn_empty().id();
    let knight = world.spawn_empty().id();
    let bandit = world.spawn_empty().id();

    let mut host = MockHost::new();
    host.spawn(priest, Vec3::ZERO, FactionMask::PLAYER);
    host.spawn(knight, Vec3::new(3., 0., 0.), FactionMask::ALLY);
    host.spawn(bandit, Vec3::new(6., 0., 0.), FactionMask::HOSTILE);

    let catalog = catalog();

    let heal = DecisionEvaluator::builder("Patch up")
        .factory("AlliesInRange")
        .consideration(ConsiderationSpec::new("TargetHealthFraction", "AntiLinear", 0., 1.))
        .build(&catalog, &config)
        .unwrap();

    let smite = DecisionEvaluator::builder("Smite the wicked")
        .factory("HostilesInRange")
        .consideration(ConsiderationSpec::new("Constant", "ConstHalf", 0., 1.))
        .build(&catalog, &config)
        .unwrap();

    let mut sim = Simulation::new(config, catalog);

    sim.add_agent(
        Agent::new(priest)
            .with_ability(
                Ability::new("Heal", priest, 1.)
                    .with_requirement(TargetAlive::default())
                    .with_requirement(TargetInRange::new(10.))
                    .with_component(AdjustResource::new("health", 30., Recipient::Target))
            )
            .with_ability(
                Ability::new("Smite", priest, 1.)
                    .with_stat("power", 1.5)
                    .with_component(AdjustResource::new("health", -10., Recipient::Target).scaled_by("power"))
                    .with_component(ApplyStatus::new("Bleeding", Recipient::Target))
            )
            .with_decisions(DecisionMaker::new().with_decision("Heal", heal).with_decision("Smite", smite))
    ).unwrap();

    for who in [knight, bandit] {
        sim.add_agent(
            Agent::new(who).with_attributes(AttributeSet::new().with_resource("health", ResourcePool::new(100.)))
        ).unwrap();
    }

    Skirmish { sim, host, priest, knight, bandit }
}

fn health(skirmish: &Skirmish, who: EntityRef) -> f32 {
    skirmish.sim
        .agent(who)
        .and_then(|agent| agent.attributes.value("health"))
        .unwrap_or(f32::NAN)
}

#[test]
fn priest_smites_until_an_ally_needs_healing() {
    let mut skirmish = skirmish(GambitConfig::default());
    let mut sink = RecordingEffectSink::new();

    // Everyone is healthy, so healing scores zero and smiting wins.
    let chosen = skirmish.sim.think_and_cast(skirmish.priest, &skirmish.host).unwrap().unwrap();
    assert_eq!(chosen.ability.as_str(), "Smite");
    assert_eq!(chosen.context.target(), Some(skirmish.bandit));
    assert!(approx(chosen.score, 0.5));

    let report = skirmish.sim.tick(1., &skirmish.host, &mut sink).unwrap();
    assert_eq!(report.cast_events.len(), 1);
    assert_eq!(health(&skirmish, skirmish.bandit), 85.);
    assert_eq!(skirmish.sim.statuses(skirmish.bandit).map(|s| s.stacks("Bleeding")), Some(1));

    // The knight takes a beating; the Smite cast winds down meanwhile.
    skirmish.sim.adjust_resource(skirmish.knight, "health", -80., Some(skirmish.bandit));
    skirmish.sim.tick(1., &skirmish.host, &mut sink).unwrap();
    assert_eq!(health(&skirmish, skirmish.bandit), 84.);

    let chosen = skirmish.sim.think_and_cast(skirmish.priest, &skirmish.host).unwrap().unwrap();
    assert_eq!(chosen.ability.as_str(), "Heal");
    assert_eq!(chosen.context.target(), Some(skirmish.knight));
    assert!(approx(chosen.score, 0.8));

    skirmish.sim.tick(1., &skirmish.host, &mut sink).unwrap();
    assert_eq!(health(&skirmish, skirmish.knight), 50.);
}

#[test]
fn dead_targets_cancel_the_heal() {
    let mut skirmish = skirmish(GambitConfig::default());
    let mut sink = RecordingEffectSink::new();

    let ctx = Context::single_target(skirmish.priest, skirmish.knight).unwrap();
    skirmish.sim.start_cast(skirmish.priest, "Heal", ctx, &skirmish.host).unwrap();
    skirmish.sim.tick(0.5, &skirmish.host, &mut sink).unwrap();

    skirmish.host.kill(skirmish.knight);
    let report = skirmish.sim.tick(0.5, &skirmish.host, &mut sink).unwrap();

    assert_eq!(report.cast_events, vec![CastEvent::Cancelled {
        caster: skirmish.priest,
        ability: "Heal".into(),
        reason: CancelReason::RequirementFailed("Target is dead".to_owned()),
    }]);
    assert_eq!(sink.total_adjustment(skirmish.knight, "health"), 0.);
}

#[test]
fn cooldown_can_start_with_the_cast() {
    let config = GambitConfig::builder().set_cooldown_policy(CooldownPolicy::OnCastStarted).build();
    let mut skirmish = skirmish(config);

    if let Some(smite) = skirmish.sim.agent_mut(skirmish.priest).and_then(|agent| agent.abilities.get_mut("Smite")) {
        smite.cooldown.set_base_value(5.);
    }

    let ctx = Context::single_target(skirmish.priest, skirmish.bandit).unwrap();
    skirmish.sim.start_cast(skirmish.priest, "Smite", ctx, &skirmish.host).unwrap();

    let smite = skirmish.sim.agent(skirmish.priest).and_then(|agent| agent.abilities.get("Smite"));
    assert_eq!(smite.map(Ability::cooldown_remaining), Some(5.));
}

#[test]
fn unknown_keys_follow_the_no_match_strategy() {
    let catalog = catalog();

    let strict = GambitConfig::builder().set_no_match_strategy(NoMatchStrategy::reject()).build();
    let result = DecisionEvaluator::builder("Broken")
        .factory("Self")
        .consideration(ConsiderationSpec::new("Nope", "Linear", 0., 1.))
        .build(&catalog, &strict);
    assert_eq!(result.err(), Some(RegistryError::UnknownConsideration("Nope".to_owned())));

    let lenient = GambitConfig::default();
    let evaluator = DecisionEvaluator::builder("Broken")
        .factory("Self")
        .consideration(ConsiderationSpec::new("Nope", "Linear", 0., 1.))
        .consideration(ConsiderationSpec::new("Constant", "NotACurve", 0., 1.))
        .consideration(ConsiderationSpec::new("Constant", "Linear", 0., 1.))
        .build(&catalog, &lenient)
        .unwrap();
    assert_eq!(evaluator.considerations().len(), 1);
}

#[test]
fn physical_cleanse_removes_bleeding() {
    let mut skirmish = skirmish(GambitConfig::default());
    let mut sink = RecordingEffectSink::new();

    for _ in 0..5 {
        skirmish.sim.apply_status_now(skirmish.bandit, "Bleeding", Some(skirmish.priest), &mut sink);
    }
    assert_eq!(skirmish.sim.statuses(skirmish.bandit).map(|s| s.stacks("Bleeding")), Some(3));

    skirmish.sim.tick(1., &skirmish.host, &mut sink).unwrap();
    assert_eq!(health(&skirmish, skirmish.bandit), 97.);

    let mut roller = RandomRoller::new(StdRng::seed_from_u64(42));
    let cleanse = TagCollection::new().with("Physical");
    let outcomes = skirmish.sim.dispel_tagged(skirmish.bandit, &cleanse, &mut roller, &mut sink);

    assert_eq!(outcomes, vec![(StatusId::from("Bleeding"), DispelOutcome::Dispelled)]);
    assert_eq!(skirmish.sim.statuses(skirmish.bandit).map(StatusContainer::len), Some(0));
}
