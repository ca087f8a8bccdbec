/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Abilities and their cast state machine.
//! 
//! ```text
//! Idle -> Precast (requirement-gated) -> Casting -> Completed | Cancelled -> Idle
//! ```
//! 
//! - `start_cast()` runs the Precast checks (not busy, not on cooldown, Context belongs 
//!   to the caster, every Requirement's `can_start_cast`). On failure nothing changes.
//! - Every tick while Casting, the Requirements' `can_continue_cast` gate is evaluated 
//!   and elapsed time accumulates. Failing the gate, or a pending cancellation request, 
//!   moves the cast to Cancelled.
//! - Once elapsed time reaches the (modified) cast time, the cast Completes and each 
//!   AbilityComponent's completion hook fires, in registration order.
//! - Completed and Cancelled last for one tick boundary, then the Ability is Idle again.
//! 
//! Cancellation is cooperative: `request_cancel()` only raises a flag, which is consumed 
//! on the next tick. Nothing ever interrupts a check that is already running.
use bevy::platform::sync::Arc;
use bevy::prelude::Component;
use bevy::reflect::Reflect;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::attributes::{Attribute, AttributeSet, AttributeSnapshot};
use crate::config::CooldownPolicy;
use crate::context::Context;
use crate::effects::{CastSnapshot, EffectRequest, EffectSink};
use crate::errors::CastError;
use crate::requirements::{Requirement, RequirementFailure, RequirementSet};
use crate::types::{AbilityId, EntityRef, KvSet, ModifierId, Seconds, StatusId};
use crate::world::WorldView;

/// The names under which an Ability's cast time and cooldown appear in cast snapshots.
pub const CAST_TIME_STAT: &str = "cast_time";
pub const COOLDOWN_STAT: &str = "cooldown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CastState {
    #[default]
    Idle,
    Precast,
    Casting,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CancelReason {
    Explicit,
    DamageTaken,
    Movement,
    /// A continue-cast Requirement stopped holding; carries its failure message.
    RequirementFailed(String),
}

/// A terminal cast transition, reported by the tick that caused it.
#[derive(Debug, Clone, PartialEq)]
pub enum CastEvent {
    Completed {
        caster: EntityRef,
        ability: AbilityId,
    },
    Cancelled {
        caster: EntityRef,
        ability: AbilityId,
        reason: CancelReason,
    },
}

/// Who a built-in component acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Recipient {
    Caster,
    /// The cast Context's target. Components skip Contexts without one.
    Target,
}

impl Recipient {
    fn resolve(&self, snapshot: &CastSnapshot) -> Option<EntityRef> {
        match self {
            Self::Caster => Some(snapshot.caster),
            Self::Target => snapshot.context.target(),
        }
    }
}

/// The payload of an Ability - what actually happens when the cast goes through.
pub trait AbilityComponent: Send + Sync {
    fn on_cast_started(&self, _caster: EntityRef, _ctx: &Context) {}

    /// Fires exactly once per completed cast.
    fn on_cast_completed(&self, snapshot: &CastSnapshot, sink: &mut dyn EffectSink);

    /// Fires instead of `on_cast_completed()` for cancelled casts.
    fn on_cast_cancelled(&self, _caster: EntityRef, _reason: &CancelReason, _sink: &mut dyn EffectSink) {}
}

/// Asks the host to spawn a named world effect (projectile, explosion...).
#[derive(Debug, Clone)]
pub struct SpawnEffect {
    pub name: String,
}

impl SpawnEffect {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl AbilityComponent for SpawnEffect {
    fn on_cast_completed(&self, snapshot: &CastSnapshot, sink: &mut dyn EffectSink) {
        sink.submit(EffectRequest::SpawnEffect {
            name: self.name.clone(),
            source: snapshot.caster,
            context: Some(snapshot.context.clone()),
            snapshot: snapshot.attributes.clone(),
        });
    }
}

/// Adjusts a Resource of the caster or target by a signed amount, 
/// optionally multiplied by one of the snapshotted stats (e.g. "power").
#[derive(Debug, Clone)]
pub struct AdjustResource {
    pub attribute: String,
    pub amount: f32,
    pub recipient: Recipient,
    pub scale_by: Option<String>,
}

impl AdjustResource {
    pub fn new<S: Into<String>>(attribute: S, amount: f32, recipient: Recipient) -> Self {
        Self { attribute: attribute.into(), amount, recipient, scale_by: None }
    }

    pub fn scaled_by<S: Into<String>>(mut self, stat: S) -> Self {
        self.scale_by = Some(stat.into());
        self
    }
}

impl AbilityComponent for AdjustResource {
    fn on_cast_completed(&self, snapshot: &CastSnapshot, sink: &mut dyn EffectSink) {
        let Some(target) = self.recipient.resolve(snapshot) else {
            #[cfg(feature = "logging")]
            bevy::log::debug!("AdjustResource::on_cast_completed: {} has no target, skipping", snapshot.ability);
            return;
        };

        let scale = self.scale_by
            .as_deref()
            .and_then(|stat| snapshot.attributes.get(stat))
            .unwrap_or(1.);

        sink.submit(EffectRequest::AdjustResource {
            target,
            attribute: self.attribute.clone(),
            delta: self.amount * scale,
            source: Some(snapshot.caster),
        });
    }
}

/// Applies a registered Status to the caster or target.
#[derive(Debug, Clone)]
pub struct ApplyStatus {
    pub status: StatusId,
    pub recipient: Recipient,
}

impl ApplyStatus {
    pub fn new<S: Into<StatusId>>(status: S, recipient: Recipient) -> Self {
        Self { status: status.into(), recipient }
    }
}

impl AbilityComponent for ApplyStatus {
    fn on_cast_completed(&self, snapshot: &CastSnapshot, sink: &mut dyn EffectSink) {
        let Some(target) = self.recipient.resolve(snapshot) else {
            #[cfg(feature = "logging")]
            bevy::log::debug!("ApplyStatus::on_cast_completed: {} has no target, skipping", snapshot.ability);
            return;
        };

        sink.submit(EffectRequest::ApplyStatus {
            target,
            status: self.status.clone(),
            source: Some(snapshot.caster),
        });
    }
}


/// One castable Ability of one caster. Persistent; only the cast state resets between casts.
#[derive(Clone)]
pub struct Ability {
    id: AbilityId,
    caster: EntityRef,
    pub cast_time: Attribute,
    pub cooldown: Attribute,
    /// Free-form numbers for the Components (e.g. "power"); snapshotted on completion.
    pub stats: AttributeSet,
    requirements: RequirementSet,
    components: Vec<Arc<dyn AbilityComponent>>,
    state: CastState,
    elapsed_cast_time: Seconds,
    cooldown_remaining: Seconds,
    interruptible_by_damage: bool,
    pending_cancel: Option<CancelReason>,
    context: Option<Context>,
    applied_modifiers: KvSet<ModifierId>,
}

impl Ability {
    pub fn new<I: Into<AbilityId>>(id: I, caster: EntityRef, cast_time: Seconds) -> Self {
        Self {
            id: id.into(),
            caster,
            cast_time: Attribute::new(cast_time),
            cooldown: Attribute::new(0.),
            stats: AttributeSet::new(),
            requirements: RequirementSet::new(),
            components: Vec::new(),
            state: CastState::Idle,
            elapsed_cast_time: 0.,
            cooldown_remaining: 0.,
            interruptible_by_damage: false,
            pending_cancel: None,
            context: None,
            applied_modifiers: KvSet::default(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Seconds) -> Self {
        self.cooldown = Attribute::new(cooldown);
        self
    }

    pub fn with_requirement<R: Requirement + 'static>(mut self, requirement: R) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_requirements(mut self, requirements: RequirementSet) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_component<C: AbilityComponent + 'static>(mut self, component: C) -> Self {
        self.components.push(Arc::new(component));
        self
    }

    pub fn with_stat(mut self, name: &str, value: f32) -> Self {
        self.stats.insert_attribute(name, value);
        self
    }

    pub fn interruptible_by_damage(mut self, interruptible: bool) -> Self {
        self.interruptible_by_damage = interruptible;
        self
    }

    pub fn id(&self) -> &AbilityId {
        &self.id
    }

    pub fn caster(&self) -> EntityRef {
        self.caster
    }

    pub fn state(&self) -> CastState {
        self.state
    }

    pub fn elapsed_cast_time(&self) -> Seconds {
        self.elapsed_cast_time
    }

    /// The Context of the current (or just-finished) cast.
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    pub fn is_on_cooldown(&self) -> bool {
        self.cooldown_remaining > 0.
    }

    pub fn cooldown_remaining(&self) -> Seconds {
        self.cooldown_remaining
    }

    /// Idle and off cooldown.
    pub fn is_ready(&self) -> bool {
        self.state == CastState::Idle && !self.is_on_cooldown()
    }

    /// Cast completion in `[0, 1]`; 0 when not casting.
    pub fn progress(&self) -> f32 {
        match self.state {
            CastState::Casting => {
                let total = self.cast_time.value();
                match total > 0. {
                    true => (self.elapsed_cast_time / total).clamp(0., 1.),
                    false => 1.,
                }
            },
            CastState::Completed => 1.,
            _ => 0.,
        }
    }

    pub fn applied_modifiers(&self) -> &KvSet<ModifierId> {
        &self.applied_modifiers
    }

    pub(crate) fn applied_modifiers_mut(&mut self) -> &mut KvSet<ModifierId> {
        &mut self.applied_modifiers
    }

    fn start_cooldown(&mut self) {
        self.cooldown_remaining = self.cooldown.value().max(0.);
    }

    /// Attempts to start a cast. On any failure, the Ability is left exactly as it was.
    pub fn start_cast(&mut self, ctx: Context, world: &dyn WorldView, policy: CooldownPolicy) -> Result<(), CastError> {
        self.can_start_cast(&ctx, world)?;
        self.begin_cast(ctx, policy);
        Ok(())
    }

    /// The Precast checks of `start_cast()`, without touching any state.
    pub fn can_start_cast(&self, ctx: &Context, world: &dyn WorldView) -> Result<(), CastError> {
        if self.state != CastState::Idle {
            return Err(CastError::AlreadyCasting(self.id.clone()));
        }

        if self.is_on_cooldown() {
            return Err(CastError::OnCooldown { 
                ability: self.id.clone(), 
                remaining: self.cooldown_remaining,
            });
        }

        if ctx.entity() != self.caster {
            return Err(CastError::WrongCaster { caster: self.caster, context_entity: ctx.entity() });
        }

        if let Some(failure) = self.requirements.first_start_failure(ctx, world) {
            #[cfg(feature = "logging")]
            bevy::log::debug!(
                "Ability::can_start_cast: {:?} cannot cast {} - {}", 
                self.caster, self.id, failure,
            );
            return Err(CastError::RequirementFailed(failure));
        }

        Ok(())
    }

    /// Enters Casting unconditionally. Only valid right after `can_start_cast()` passed.
    pub(crate) fn begin_cast(&mut self, ctx: Context, policy: CooldownPolicy) {
        self.state = CastState::Precast;

        for component in self.components.iter() {
            component.on_cast_started(self.caster, &ctx);
        }

        self.state = CastState::Casting;
        self.elapsed_cast_time = 0.;
        self.pending_cancel = None;
        self.context = Some(ctx);

        if policy == CooldownPolicy::OnCastStarted {
            self.start_cooldown();
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Ability::begin_cast: {:?} started casting {}", self.caster, self.id);
    }

    /// Flags the cast for cancellation on the next tick. 
    /// Returns false if there is nothing to cancel. The first reason given wins.
    pub fn request_cancel(&mut self, reason: CancelReason) -> bool {
        match self.state {
            CastState::Precast | CastState::Casting => {
                if self.pending_cancel.is_none() {
                    self.pending_cancel = Some(reason);
                }
                true
            },
            _ => false,
        }
    }

    /// Requests a cancellation if this Ability is interruptible by damage.
    pub fn notify_damage_taken(&mut self) -> bool {
        match self.interruptible_by_damage {
            true => self.request_cancel(CancelReason::DamageTaken),
            false => false,
        }
    }

    /// The first failing continue-cast Requirement, if a cast is in progress.
    /// 
    /// Split from `advance()` so that a whole batch of gates can be evaluated against 
    /// an immutable world before any Ability gets mutated.
    pub fn continue_gate(&self, world: &dyn WorldView) -> Option<RequirementFailure> {
        match (self.state, &self.context) {
            (CastState::Casting, Some(ctx)) => self.requirements.first_continue_failure(ctx, world),
            _ => None,
        }
    }

    /// Moves the state machine forward by `dt`, given a pre-computed continue-cast gate.
    pub fn advance(
        &mut self, 
        dt: Seconds, 
        gate: Option<RequirementFailure>, 
        policy: CooldownPolicy, 
        sink: &mut dyn EffectSink,
    ) -> Option<CastEvent> {
        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.);

        match self.state {
            CastState::Completed | CastState::Cancelled | CastState::Precast => {
                self.state = CastState::Idle;
                self.context = None;
                self.elapsed_cast_time = 0.;
                None
            },
            CastState::Idle => None,
            CastState::Casting => {
                if let Some(reason) = self.pending_cancel.take() {
                    return Some(self.cancel(reason, sink));
                }

                if let Some(failure) = gate {
                    return Some(self.cancel(CancelReason::RequirementFailed(failure.message), sink));
                }

                self.elapsed_cast_time += dt;
                match self.elapsed_cast_time >= self.cast_time.value() {
                    true => Some(self.complete(policy, sink)),
                    false => None,
                }
            },
        }
    }

    /// `continue_gate()` followed by `advance()`, for callers that own the Ability outright.
    pub fn tick(
        &mut self, 
        dt: Seconds, 
        world: &dyn WorldView, 
        policy: CooldownPolicy, 
        sink: &mut dyn EffectSink,
    ) -> Option<CastEvent> {
        let gate = self.continue_gate(world);
        self.advance(dt, gate, policy, sink)
    }

    fn cancel(&mut self, reason: CancelReason, sink: &mut dyn EffectSink) -> CastEvent {
        self.state = CastState::Cancelled;

        for component in self.components.iter() {
            component.on_cast_cancelled(self.caster, &reason, sink);
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Ability::cancel: {:?} - {} cancelled ({:?})", self.caster, self.id, reason);

        CastEvent::Cancelled { caster: self.caster, ability: self.id.clone(), reason }
    }

    fn complete(&mut self, policy: CooldownPolicy, sink: &mut dyn EffectSink) -> CastEvent {
        self.state = CastState::Completed;

        if let Some(context) = self.context.clone() {
            let snapshot = CastSnapshot {
                ability: self.id.clone(),
                caster: self.caster,
                context,
                attributes: self.snapshot_stats(),
            };

            for component in self.components.iter() {
                component.on_cast_completed(&snapshot, sink);
            }
        }

        if policy == CooldownPolicy::OnCastCompleted {
            self.start_cooldown();
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Ability::complete: {:?} - {} completed", self.caster, self.id);

        CastEvent::Completed { caster: self.caster, ability: self.id.clone() }
    }

    /// The Ability's stats plus its current cast time and cooldown.
    pub fn snapshot_stats(&self) -> AttributeSnapshot {
        let stats = self.stats.snapshot();
        AttributeSnapshot::from_pairs(
            stats.iter()
                .map(|(name, value)| (name.to_owned(), value))
                .chain([
                    (CAST_TIME_STAT.to_owned(), self.cast_time.value()),
                    (COOLDOWN_STAT.to_owned(), self.cooldown.value()),
                ])
        )
    }
}

impl core::fmt::Debug for Ability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ability")
            .field("id", &self.id)
            .field("caster", &self.caster)
            .field("state", &self.state)
            .field("elapsed_cast_time", &self.elapsed_cast_time)
            .field("cast_time", &self.cast_time.value())
            .field("cooldown_remaining", &self.cooldown_remaining)
            .field("requirements", &self.requirements)
            .field("components", &self.components.len())
            .finish()
    }
}


/// All Abilities of a single caster, in insertion order.
#[derive(Component, Debug, Clone, Default)]
pub struct AbilityBook {
    abilities: Vec<Ability>,
}

impl AbilityBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ability: Ability) -> Self {
        self.insert(ability);
        self
    }

    /// Adds an Ability, replacing (and returning) any previous one with the same id.
    pub fn insert(&mut self, ability: Ability) -> Option<Ability> {
        match self.abilities.iter().position(|known| known.id == ability.id) {
            Some(idx) => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("AbilityBook::insert: replacing existing Ability {}", ability.id);
                Some(core::mem::replace(&mut self.abilities[idx], ability))
            },
            None => {
                self.abilities.push(ability);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Ability> {
        let idx = self.abilities.iter().position(|known| known.id.as_str() == id)?;
        Some(self.abilities.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Ability> {
        self.abilities.iter().find(|known| known.id.as_str() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Ability> {
        self.abilities.iter_mut().find(|known| known.id.as_str() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ability> {
        self.abilities.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    /// Whether the Ability exists and could start a cast right now (ignoring Requirements).
    pub fn is_available(&self, id: &str) -> bool {
        self.get(id).map(Ability::is_ready).unwrap_or(false)
    }

    pub fn start_cast(
        &mut self, 
        id: &str, 
        ctx: Context, 
        world: &dyn WorldView, 
        policy: CooldownPolicy,
    ) -> Result<(), CastError> {
        match self.get_mut(id) {
            Some(ability) => ability.start_cast(ctx, world, policy),
            None => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("AbilityBook::start_cast: unknown Ability {}", id);
                Err(CastError::UnknownAbility(AbilityId::from(id)))
            }
        }
    }

    /// Requests cancellation of every in-progress cast. Returns how many were flagged.
    pub fn cancel_all(&mut self, reason: CancelReason) -> usize {
        self.abilities
            .iter_mut()
            .map(|ability| ability.request_cancel(reason.clone()))
            .filter(|flagged| *flagged)
            .count()
    }
}
