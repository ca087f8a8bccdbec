/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! The Simulation - the explicitly constructed owner of all core state, and its tick.
//! 
//! A tick processes everything in a fixed order:
//! 1. Modifier updates (time-varying Modifiers move their bonuses),
//! 2. Ability casts (every continue-cast gate is evaluated against an immutable view 
//!    of the scene first; only then are the Abilities advanced),
//! 3. Status durations and intervals.
//! 
//! Effect requests raised along the way are collected and only settled once all three 
//! phases are done, so nothing a tick does can change what the same tick reads.
use bevy::platform::sync::Arc;

use crate::ability::{Ability, CancelReason, CastEvent};
use crate::agent::{Agent, Roster};
use crate::config::GambitConfig;
use crate::considerations::ConsiderationRegistry;
use crate::context::Context;
use crate::context_factories::ContextFactoryRegistry;
use crate::curves::CurveRegistry;
use crate::decision_evaluator::ChosenDecision;
use crate::dice::DiceRoller;
use crate::effects::{EffectRequest, EffectSink};
use crate::errors::{CastError, ContractViolation};
use crate::modifiers::{Modifier, ModifierRegistry};
use crate::requirements::RequirementFailure;
use crate::status::{ApplyOutcome, DispelOutcome, StatusContainer, StatusEnded, StatusPrototype};
use crate::tags::TagCollection;
use crate::types::{AbilityId, EntityRef, KvMap, Seconds, StatusId};
use crate::world::{HostWorld, SceneView};

/// How many rounds of follow-up requests (e.g. a Status whose `on_apply()` deals damage) 
/// get applied within one settle before the rest is only forwarded to the host.
const MAX_SETTLE_ROUNDS: usize = 8;

/// The process-wide registries: Curves, Considerations, Context Factories and Status prototypes.
/// 
/// Constructed explicitly and passed around; nothing in the core reaches for a global.
#[derive(Debug, Default)]
pub struct Catalog {
    pub curves: CurveRegistry,
    pub considerations: ConsiderationRegistry,
    pub context_factories: ContextFactoryRegistry,
    statuses: KvMap<StatusId, Arc<StatusPrototype>>,
}

impl Catalog {
    /// Empty registries (built-in Curves always resolve regardless).
    pub fn new() -> Self {
        Self {
            curves: CurveRegistry::new(),
            considerations: ConsiderationRegistry::new(),
            context_factories: ContextFactoryRegistry::new(),
            statuses: KvMap::default(),
        }
    }

    pub fn with_builtins() -> Self {
        Self {
            curves: CurveRegistry::new(),
            considerations: ConsiderationRegistry::with_builtins(),
            context_factories: ContextFactoryRegistry::with_builtins(),
            statuses: KvMap::default(),
        }
    }

    pub fn register_status(&mut self, prototype: StatusPrototype) -> Result<Arc<StatusPrototype>, ContractViolation> {
        if self.statuses.contains_key(prototype.id.as_str()) {
            return Err(ContractViolation::DuplicateStatus(prototype.id.clone()));
        }

        let prototype = Arc::new(prototype);
        self.statuses.insert(prototype.id.clone(), prototype.clone());
        Ok(prototype)
    }

    pub fn status(&self, id: &str) -> Option<Arc<StatusPrototype>> {
        self.statuses.get(id).cloned()
    }

    pub fn status_count(&self) -> usize {
        self.statuses.len()
    }

    /// Teardown. Drops everything that was registered, built-ins included.
    pub fn clear(&mut self) {
        self.curves.clear();
        self.considerations.clear();
        self.context_factories.clear();
        self.statuses.clear();
    }
}


/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Simulation time after this tick.
    pub elapsed: Seconds,
    pub cast_events: Vec<CastEvent>,
    pub status_events: Vec<StatusEnded>,
}

pub struct Simulation {
    pub config: GambitConfig,
    pub catalog: Catalog,
    roster: Roster,
    entity_modifiers: ModifierRegistry<Agent>,
    ability_modifiers: ModifierRegistry<Ability>,
    elapsed: Seconds,
}

impl Simulation {
    pub fn new(config: GambitConfig, catalog: Catalog) -> Self {
        Self {
            config,
            catalog,
            roster: Roster::default(),
            entity_modifiers: ModifierRegistry::new(),
            ability_modifiers: ModifierRegistry::new(),
            elapsed: 0.,
        }
    }

    pub fn elapsed(&self) -> Seconds {
        self.elapsed
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn add_agent(&mut self, agent: Agent) -> Result<(), ContractViolation> {
        self.roster.insert(agent)
    }

    /// Takes the Agent out of the Simulation. Modifiers forget it without running their removal hooks.
    pub fn remove_agent(&mut self, entity: EntityRef) -> Option<Agent> {
        let agent = self.roster.remove(entity)?;

        for modifier in self.entity_modifiers.iter_mut() {
            modifier.forget(&entity);
        }

        for ability in agent.abilities.iter() {
            let key = (entity, ability.id().clone());
            for modifier in self.ability_modifiers.iter_mut() {
                modifier.forget(&key);
            }
        }

        Some(agent)
    }

    pub fn agent(&self, entity: EntityRef) -> Option<&Agent> {
        self.roster.get(entity)
    }

    pub fn agent_mut(&mut self, entity: EntityRef) -> Option<&mut Agent> {
        self.roster.get_mut(entity)
    }

    pub fn view<'a>(&'a self, host: &'a dyn HostWorld) -> SceneView<'a> {
        SceneView::new(host, &self.roster)
    }

    /// Advances the whole Simulation by `dt` seconds.
    pub fn tick(&mut self, dt: Seconds, host: &dyn HostWorld, sink: &mut dyn EffectSink) -> Result<TickReport, ContractViolation> {
        if !dt.is_finite() || dt < 0. {
            return Err(ContractViolation::InvalidTimeDelta(dt));
        }

        self.elapsed += dt;
        let mut report = TickReport::default();
        let mut pending: Vec<EffectRequest> = Vec::new();

        // 1. Modifiers
        for modifier in self.entity_modifiers.iter() {
            for agent in self.roster.iter_mut() {
                modifier.update(agent, dt);
            }
        }

        for modifier in self.ability_modifiers.iter() {
            for agent in self.roster.iter_mut() {
                for ability in agent.abilities.iter_mut() {
                    modifier.update(ability, dt);
                }
            }
        }

        // 2. Casts
        let gates: Vec<Vec<Option<RequirementFailure>>> = {
            let view = SceneView::new(host, &self.roster);
            self.roster
                .iter()
                .map(|agent| agent.abilities.iter().map(|ability| ability.continue_gate(&view)).collect())
                .collect()
        };

        let policy = self.config.cooldown_policy;
        for (agent, agent_gates) in self.roster.iter_mut().zip(gates) {
            for (ability, gate) in agent.abilities.iter_mut().zip(agent_gates) {
                report.cast_events.extend(ability.advance(dt, gate, policy, &mut pending));
            }
        }

        // 3. Statuses
        for agent in self.roster.iter_mut() {
            let owner = agent.entity();
            report.status_events.extend(agent.statuses.tick(owner, dt, &mut pending));
        }

        self.settle(pending, sink);

        report.elapsed = self.elapsed;
        Ok(report)
    }

    /// Applies the core-owned requests to their recipients and forwards every request to `sink`.
    fn settle(&mut self, requests: Vec<EffectRequest>, sink: &mut dyn EffectSink) {
        let mut round = requests;

        for _ in 0..MAX_SETTLE_ROUNDS {
            if round.is_empty() {
                return;
            }

            let mut follow_ups = Vec::new();
            for request in round.into_iter() {
                self.apply_request(&request, &mut follow_ups);
                sink.submit(request);
            }
            round = follow_ups;
        }

        if !round.is_empty() {
            #[cfg(feature = "logging")]
            bevy::log::warn!(
                "Simulation::settle: effects kept cascading after {} rounds; forwarding {} requests without applying them", 
                MAX_SETTLE_ROUNDS, round.len(),
            );

            for request in round.into_iter() {
                sink.submit(request);
            }
        }
    }

    fn apply_request(&mut self, request: &EffectRequest, follow_ups: &mut Vec<EffectRequest>) {
        match request {
            EffectRequest::SpawnEffect { .. } => {},
            EffectRequest::AdjustResource { target, attribute, delta, source } => {
                self.adjust_resource(*target, attribute, *delta, *source);
            },
            EffectRequest::ApplyStatus { target, status, source } => {
                self.apply_status(*target, status.as_str(), *source, follow_ups);
            },
        }
    }

    /// Runs the Agent's DecisionMaker against the current scene.
    pub fn think(&self, entity: EntityRef, host: &dyn HostWorld) -> Option<ChosenDecision> {
        let view = SceneView::new(host, &self.roster);
        self.roster.get(entity)?.think(&view, self.config.decision_threshold)
    }

    /// `think()`, then starts casting whatever won.
    pub fn think_and_cast(&mut self, entity: EntityRef, host: &dyn HostWorld) -> Result<Option<ChosenDecision>, CastError> {
        let Some(chosen) = self.think(entity, host) else {
            return Ok(None)
        };

        self.start_cast(entity, chosen.ability.as_str(), chosen.context.clone(), host)?;
        Ok(Some(chosen))
    }

    pub fn start_cast(&mut self, entity: EntityRef, ability: &str, ctx: Context, host: &dyn HostWorld) -> Result<(), CastError> {
        {
            let view = SceneView::new(host, &self.roster);
            let agent = self.roster.get(entity).ok_or(CastError::UnknownAgent(entity))?;

            match agent.abilities.get(ability) {
                Some(found) => found.can_start_cast(&ctx, &view)?,
                None => {
                    #[cfg(feature = "logging")]
                    bevy::log::warn!("Simulation::start_cast: {:?} has no Ability {}", entity, ability);
                    return Err(CastError::UnknownAbility(AbilityId::from(ability)))
                }
            }
        }

        let policy = self.config.cooldown_policy;
        let found = self.roster
            .get_mut(entity)
            .and_then(|agent| agent.abilities.get_mut(ability))
            .ok_or_else(|| CastError::UnknownAbility(AbilityId::from(ability)))?;

        found.begin_cast(ctx, policy);
        Ok(())
    }

    /// Requests a cooperative cancel; takes effect on the next tick.
    pub fn cancel_cast(&mut self, entity: EntityRef, ability: &str) -> bool {
        self.roster
            .get_mut(entity)
            .and_then(|agent| agent.abilities.get_mut(ability))
            .is_some_and(|found| found.request_cancel(CancelReason::Explicit))
    }

    /// Flags every damage-interruptible cast of the Entity. Returns how many were flagged.
    pub fn notify_damage_taken(&mut self, entity: EntityRef) -> usize {
        match self.roster.get_mut(entity) {
            Some(agent) => agent.abilities
                .iter_mut()
                .map(Ability::notify_damage_taken)
                .filter(|flagged| *flagged)
                .count(),
            None => 0,
        }
    }

    /// Applies a signed delta to one of the Entity's Resources and returns what was actually applied. 
    /// 
    /// Only an actual loss of the configured damage Resource counts as damage taken, and only 
    /// when it was not self-inflicted; paying a mana cost never interrupts the payer's own casts.
    /// A loss with no known source counts.
    pub fn adjust_resource(
        &mut self, 
        entity: EntityRef, 
        attribute: &str, 
        delta: f32, 
        source: Option<EntityRef>,
    ) -> Option<f32> {
        let agent = self.roster.get_mut(entity)?;
        let applied = agent.attributes.adjust_resource(attribute, delta);

        match applied {
            None => {
                #[cfg(feature = "logging")]
                bevy::log::debug!("Simulation::adjust_resource: {:?} has no Resource {}", entity, attribute);
            },
            Some(change) if change < 0. 
                && attribute == self.config.damage_resource 
                && source != Some(entity) => {
                for ability in agent.abilities.iter_mut() {
                    ability.notify_damage_taken();
                }
            },
            Some(_) => {},
        }

        applied
    }

    /// Applies a registered Status prototype. None if the prototype or the Agent is unknown.
    pub fn apply_status(
        &mut self, 
        target: EntityRef, 
        status: &str, 
        source: Option<EntityRef>, 
        sink: &mut dyn EffectSink,
    ) -> Option<ApplyOutcome> {
        let Some(prototype) = self.catalog.status(status) else {
            #[cfg(feature = "logging")]
            bevy::log::warn!("Simulation::apply_status: unknown Status {}", status);
            return None
        };

        let agent = self.roster.get_mut(target)?;
        Some(agent.statuses.apply(prototype, source, target, sink))
    }

    /// Like `apply_status()`, but settles whatever the Status' hooks requested right away.
    pub fn apply_status_now(
        &mut self, 
        target: EntityRef, 
        status: &str, 
        source: Option<EntityRef>, 
        sink: &mut dyn EffectSink,
    ) -> Option<ApplyOutcome> {
        let mut raised = Vec::new();
        let outcome = self.apply_status(target, status, source, &mut raised);
        self.settle(raised, sink);
        outcome
    }

    pub fn dispel(
        &mut self, 
        target: EntityRef, 
        status: &str, 
        roller: &mut dyn DiceRoller, 
        sink: &mut dyn EffectSink,
    ) -> DispelOutcome {
        let mut raised = Vec::new();
        let outcome = match self.roster.get_mut(target) {
            Some(agent) => agent.statuses.dispel(target, status, roller, &mut raised),
            None => DispelOutcome::NotFound,
        };
        self.settle(raised, sink);
        outcome
    }

    pub fn dispel_tagged(
        &mut self, 
        target: EntityRef, 
        tags: &TagCollection, 
        roller: &mut dyn DiceRoller, 
        sink: &mut dyn EffectSink,
    ) -> Vec<(StatusId, DispelOutcome)> {
        let mut raised = Vec::new();
        let outcomes = match self.roster.get_mut(target) {
            Some(agent) => agent.statuses.dispel_tagged(target, tags, roller, &mut raised),
            None => Vec::new(),
        };
        self.settle(raised, sink);
        outcomes
    }

    pub fn remove_status(&mut self, target: EntityRef, status: &str, sink: &mut dyn EffectSink) -> bool {
        let mut raised = Vec::new();
        let removed = self.roster
            .get_mut(target)
            .is_some_and(|agent| agent.statuses.remove(target, status, &mut raised));
        self.settle(raised, sink);
        removed
    }

    /// The Entity died: every Status ends and every cast in progress is cancelled.
    pub fn kill(&mut self, entity: EntityRef, sink: &mut dyn EffectSink) -> Vec<StatusEnded> {
        let mut raised = Vec::new();
        let ended = match self.roster.get_mut(entity) {
            Some(agent) => {
                agent.abilities.cancel_all(CancelReason::Explicit);
                agent.statuses.remove_all(entity, &mut raised)
            },
            None => Vec::new(),
        };
        self.settle(raised, sink);
        ended
    }

    pub fn statuses(&self, entity: EntityRef) -> Option<&StatusContainer> {
        self.roster.get(entity).map(|agent| &agent.statuses)
    }

    pub fn register_entity_modifier(&mut self, modifier: Modifier<Agent>) -> Result<(), ContractViolation> {
        self.entity_modifiers.register(modifier)
    }

    pub fn register_ability_modifier(&mut self, modifier: Modifier<Ability>) -> Result<(), ContractViolation> {
        self.ability_modifiers.register(modifier)
    }

    pub fn apply_entity_modifier(&mut self, modifier: &str, entity: EntityRef) -> bool {
        match (self.entity_modifiers.get_mut(modifier), self.roster.get_mut(entity)) {
            (Some(modifier), Some(agent)) => modifier.apply(agent),
            _ => false,
        }
    }

    pub fn remove_entity_modifier(&mut self, modifier: &str, entity: EntityRef) -> bool {
        match (self.entity_modifiers.get_mut(modifier), self.roster.get_mut(entity)) {
            (Some(modifier), Some(agent)) => modifier.remove(agent),
            _ => false,
        }
    }

    pub fn apply_ability_modifier(&mut self, modifier: &str, entity: EntityRef, ability: &str) -> bool {
        let target = self.roster.get_mut(entity).and_then(|agent| agent.abilities.get_mut(ability));
        match (self.ability_modifiers.get_mut(modifier), target) {
            (Some(modifier), Some(target)) => modifier.apply(target),
            _ => false,
        }
    }

    pub fn remove_ability_modifier(&mut self, modifier: &str, entity: EntityRef, ability: &str) -> bool {
        let target = self.roster.get_mut(entity).and_then(|agent| agent.abilities.get_mut(ability));
        match (self.ability_modifiers.get_mut(modifier), target) {
            (Some(modifier), Some(target)) => modifier.remove(target),
            _ => false,
        }
    }

    /// Applies an Ability Modifier to every Ability of the Entity its matcher accepts.
    pub fn apply_ability_modifier_to_all(&mut self, modifier: &str, entity: EntityRef) -> usize {
        match (self.ability_modifiers.get_mut(modifier), self.roster.get_mut(entity)) {
            (Some(modifier), Some(agent)) => agent.abilities
                .iter_mut()
                .map(|ability| modifier.apply(ability))
                .filter(|applied| *applied)
                .count(),
            _ => 0,
        }
    }

    /// Removes the Modifier from every target, then forgets it.
    pub fn unregister_entity_modifier(&mut self, modifier: &str) -> Option<Modifier<Agent>> {
        let mut removed = self.entity_modifiers.unregister(modifier)?;
        for agent in self.roster.iter_mut() {
            removed.remove(agent);
        }
        Some(removed)
    }

    /// Removes the Modifier from every target, then forgets it.
    pub fn unregister_ability_modifier(&mut self, modifier: &str) -> Option<Modifier<Ability>> {
        let mut removed = self.ability_modifiers.unregister(modifier)?;
        for agent in self.roster.iter_mut() {
            for ability in agent.abilities.iter_mut() {
                removed.remove(ability);
            }
        }
        Some(removed)
    }
}

impl core::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("elapsed", &self.elapsed)
            .field("agents", &self.roster.len())
            .field("entity_modifiers", &self.entity_modifiers)
            .field("ability_modifiers", &self.ability_modifiers)
            .finish_non_exhaustive()
    }
}
