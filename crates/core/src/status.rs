/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Statuses - timed, stackable effects living on an Entity (buffs, debuffs, damage-over-time).
//! 
//! A [`StatusPrototype`] is the shared, immutable definition (duration, stacking rules, 
//! dispel rules, tags and the [`StatusAction`] hooks). A [`Status`] is one live instance 
//! of a prototype on one Entity, owned by that Entity's [`StatusContainer`].
//! 
//! An Entity holds at most one instance per prototype id. Re-applying a prototype that is 
//! already present either adds a stack, refreshes the duration, or does nothing, depending 
//! on the prototype's flags. Every instance ends in exactly one of Expired, Dispelled 
//! or Removed.
use bevy::platform::sync::Arc;
use bevy::prelude::Component;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dice::DiceRoller;
use crate::effects::{EffectRequest, EffectSink};
use crate::tags::{Tag, TagCollection};
use crate::types::{EntityRef, Seconds, StatusId};

/// A dice check that can block an otherwise-valid dispel.
/// 
/// The dispel is resisted if `count`d`die` rolls at or above `resist_at_or_above`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DispelResistance {
    pub count: u32,
    pub die: u32,
    pub resist_at_or_above: i32,
}

impl DispelResistance {
    pub fn new(count: u32, die: u32, resist_at_or_above: i32) -> Self {
        Self { count, die, resist_at_or_above }
    }

    pub fn resists(&self, roller: &mut dyn DiceRoller) -> bool {
        roller.roll(self.count, self.die) >= self.resist_at_or_above
    }
}

/// What a [`StatusAction`] hook gets to know about the instance that triggered it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusHookContext {
    pub owner: EntityRef,
    pub source: Option<EntityRef>,
    pub stacks: u32,
}

/// The behaviour of a Status. All hooks default to doing nothing.
/// 
/// Hooks never touch game state directly; anything they want to happen goes into the sink.
pub trait StatusAction: Send + Sync {
    fn on_apply(&self, _ctx: &StatusHookContext, _sink: &mut dyn EffectSink) {}
    fn on_refresh(&self, _ctx: &StatusHookContext, _sink: &mut dyn EffectSink) {}
    fn on_interval(&self, _ctx: &StatusHookContext, _sink: &mut dyn EffectSink) {}
    fn on_expire(&self, _ctx: &StatusHookContext, _sink: &mut dyn EffectSink) {}
    fn on_dispel(&self, _ctx: &StatusHookContext, _sink: &mut dyn EffectSink) {}

    /// Fires last for every ending, whatever the reason.
    fn on_remove(&self, _ctx: &StatusHookContext, _sink: &mut dyn EffectSink) {}
}

/// A Status that does nothing but exist (useful as a pure marker, e.g. "Stunned").
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAction;

impl StatusAction for NoAction {}

/// Adjusts a Resource of the owner on every interval, scaled by the stack count.
/// 
/// Negative deltas make a damage-over-time, positive ones a heal-over-time.
#[derive(Debug, Clone)]
pub struct PeriodicResource {
    pub attribute: String,
    pub delta_per_stack: f32,
}

impl PeriodicResource {
    pub fn new<S: Into<String>>(attribute: S, delta_per_stack: f32) -> Self {
        Self { attribute: attribute.into(), delta_per_stack }
    }
}

impl StatusAction for PeriodicResource {
    fn on_interval(&self, ctx: &StatusHookContext, sink: &mut dyn EffectSink) {
        sink.submit(EffectRequest::AdjustResource {
            target: ctx.owner,
            attribute: self.attribute.clone(),
            delta: self.delta_per_stack * ctx.stacks as f32,
            source: ctx.source,
        });
    }
}


pub struct StatusPrototype {
    pub id: StatusId,
    pub tags: TagCollection,
    /// None means the Status never expires on its own.
    pub duration: Option<Seconds>,
    pub max_stacks: u32,
    pub stackable: bool,
    pub refreshable: bool,
    pub dispellable: bool,
    pub resistance: Option<DispelResistance>,
    pub tick_interval: Option<Seconds>,
    pub action: Arc<dyn StatusAction>,
}

impl StatusPrototype {
    pub fn builder<I: Into<StatusId>>(id: I) -> StatusPrototypeBuilder {
        StatusPrototypeBuilder::new(id.into())
    }

    fn hook_context(&self, owner: EntityRef, status: &Status) -> StatusHookContext {
        StatusHookContext { owner, source: status.source, stacks: status.stacks }
    }
}

impl core::fmt::Debug for StatusPrototype {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StatusPrototype")
            .field("id", &self.id)
            .field("tags", &self.tags)
            .field("duration", &self.duration)
            .field("max_stacks", &self.max_stacks)
            .field("stackable", &self.stackable)
            .field("refreshable", &self.refreshable)
            .field("dispellable", &self.dispellable)
            .field("resistance", &self.resistance)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

pub struct StatusPrototypeBuilder {
    prototype: StatusPrototype,
}

impl StatusPrototypeBuilder {
    fn new(id: StatusId) -> Self {
        Self {
            prototype: StatusPrototype {
                id,
                tags: TagCollection::new(),
                duration: None,
                max_stacks: 1,
                stackable: false,
                refreshable: true,
                dispellable: true,
                resistance: None,
                tick_interval: None,
                action: Arc::new(NoAction),
            }
        }
    }

    /// Non-finite or negative durations are treated as infinite.
    pub fn duration(mut self, duration: Seconds) -> Self {
        self.prototype.duration = match duration.is_finite() && duration >= 0. {
            true => Some(duration),
            false => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("StatusPrototypeBuilder::duration: invalid duration {} for {}, using infinite", duration, self.prototype.id);
                None
            }
        };
        self
    }

    pub fn infinite(mut self) -> Self {
        self.prototype.duration = None;
        self
    }

    pub fn max_stacks(mut self, max_stacks: u32) -> Self {
        self.prototype.max_stacks = max_stacks.max(1);
        self
    }

    pub fn stackable(mut self, stackable: bool) -> Self {
        self.prototype.stackable = stackable;
        self
    }

    pub fn refreshable(mut self, refreshable: bool) -> Self {
        self.prototype.refreshable = refreshable;
        self
    }

    pub fn dispellable(mut self, dispellable: bool) -> Self {
        self.prototype.dispellable = dispellable;
        self
    }

    pub fn resistance(mut self, resistance: DispelResistance) -> Self {
        self.prototype.resistance = Some(resistance);
        self
    }

    /// How often `on_interval()` fires. Non-positive intervals disable it.
    pub fn tick_interval(mut self, interval: Seconds) -> Self {
        self.prototype.tick_interval = match interval.is_finite() && interval > 0. {
            true => Some(interval),
            false => None,
        };
        self
    }

    pub fn tag<T: Into<Tag>>(mut self, tag: T) -> Self {
        self.prototype.tags.insert(tag.into());
        self
    }

    pub fn action<A: StatusAction + 'static>(mut self, action: A) -> Self {
        self.prototype.action = Arc::new(action);
        self
    }

    pub fn build(self) -> StatusPrototype {
        self.prototype
    }
}


/// A live instance of a [`StatusPrototype`] on one Entity.
#[derive(Debug, Clone)]
pub struct Status {
    prototype: Arc<StatusPrototype>,
    stacks: u32,
    remaining: Option<Seconds>,
    source: Option<EntityRef>,
    interval_elapsed: Seconds,
}

impl Status {
    fn new(prototype: Arc<StatusPrototype>, source: Option<EntityRef>) -> Self {
        let remaining = prototype.duration;
        Self { prototype, stacks: 1, remaining, source, interval_elapsed: 0. }
    }

    pub fn id(&self) -> &StatusId {
        &self.prototype.id
    }

    pub fn prototype(&self) -> &Arc<StatusPrototype> {
        &self.prototype
    }

    pub fn stacks(&self) -> u32 {
        self.stacks
    }

    /// None for Statuses without a duration.
    pub fn remaining(&self) -> Option<Seconds> {
        self.remaining
    }

    pub fn source(&self) -> Option<EntityRef> {
        self.source
    }

    pub fn tags(&self) -> &TagCollection {
        &self.prototype.tags
    }

    fn refresh(&mut self) {
        self.remaining = self.prototype.duration;
    }

    /// The latest applier owns the instance; a sourceless re-application keeps the old source.
    fn take_source(&mut self, source: Option<EntityRef>) {
        if source.is_some() {
            self.source = source;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new instance was created.
    Applied,
    /// An existing instance gained a stack.
    Stacked,
    /// An existing instance had its duration reset without gaining a stack.
    Refreshed,
    /// The instance was already present and could neither stack nor refresh.
    /// Nothing about it changed, including its source.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispelOutcome {
    Dispelled,
    NotDispellable,
    Resisted,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EndReason {
    Expired,
    Dispelled,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEnded {
    pub owner: EntityRef,
    pub status: StatusId,
    pub reason: EndReason,
}

/// All Statuses currently active on one Entity, in application order.
/// 
/// Lookups by StatusId are a linear scan. An Entity carries a handful of Statuses at most, 
/// and the Vec keeps ticks in a deterministic order.
#[derive(Component, Debug, Clone, Default)]
pub struct StatusContainer {
    statuses: Vec<Status>,
}

impl StatusContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.statuses.iter().position(|status| status.id().as_str() == id)
    }

    pub fn apply(
        &mut self, 
        prototype: Arc<StatusPrototype>, 
        source: Option<EntityRef>, 
        owner: EntityRef, 
        sink: &mut dyn EffectSink,
    ) -> ApplyOutcome {
        let existing = match self.position(prototype.id.as_str()) {
            Some(idx) => &mut self.statuses[idx],
            None => {
                let status = Status::new(prototype.clone(), source);
                prototype.action.on_apply(&prototype.hook_context(owner, &status), sink);
                self.statuses.push(status);
                return ApplyOutcome::Applied
            }
        };

        let proto = existing.prototype.clone();

        if proto.stackable && existing.stacks < proto.max_stacks {
            existing.stacks += 1;
            existing.take_source(source);
            if proto.refreshable {
                existing.refresh();
                proto.action.on_refresh(&proto.hook_context(owner, existing), sink);
            }
            return ApplyOutcome::Stacked
        }

        if proto.refreshable {
            existing.take_source(source);
            existing.refresh();
            proto.action.on_refresh(&proto.hook_context(owner, existing), sink);
            return ApplyOutcome::Refreshed
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("StatusContainer::apply: {} is already active on {} and cannot stack or refresh", prototype.id, owner);
        ApplyOutcome::Ignored
    }

    /// Advances every Status by `dt`, firing interval hooks and expiring what ran out.
    /// 
    /// Interval hooks never fire for time past a Status' remaining duration.
    pub fn tick(&mut self, owner: EntityRef, dt: Seconds, sink: &mut dyn EffectSink) -> Vec<StatusEnded> {
        let mut ended = Vec::new();

        self.statuses.retain_mut(|status| {
            let step = match status.remaining {
                Some(remaining) => dt.min(remaining),
                None => dt,
            };

            if let Some(interval) = status.prototype.tick_interval {
                status.interval_elapsed += step;
                while status.interval_elapsed >= interval {
                    status.interval_elapsed -= interval;
                    status.prototype.action.on_interval(&status.prototype.hook_context(owner, status), sink);
                }
            }

            let Some(remaining) = status.remaining.as_mut() else {
                return true
            };

            *remaining -= dt;
            if *remaining > 0. {
                return true
            }

            let hook_ctx = status.prototype.hook_context(owner, status);
            status.prototype.action.on_expire(&hook_ctx, sink);
            status.prototype.action.on_remove(&hook_ctx, sink);
            ended.push(StatusEnded { owner, status: status.id().clone(), reason: EndReason::Expired });
            false
        });

        ended
    }

    pub fn dispel(
        &mut self, 
        owner: EntityRef, 
        id: &str, 
        roller: &mut dyn DiceRoller, 
        sink: &mut dyn EffectSink,
    ) -> DispelOutcome {
        let Some(idx) = self.position(id) else {
            return DispelOutcome::NotFound
        };

        let prototype = self.statuses[idx].prototype.clone();

        if !prototype.dispellable {
            return DispelOutcome::NotDispellable
        }

        if prototype.resistance.is_some_and(|resistance| resistance.resists(roller)) {
            #[cfg(feature = "logging")]
            bevy::log::debug!("StatusContainer::dispel: {} on {} resisted the dispel", id, owner);
            return DispelOutcome::Resisted
        }

        let status = self.statuses.remove(idx);
        let hook_ctx = prototype.hook_context(owner, &status);
        prototype.action.on_dispel(&hook_ctx, sink);
        prototype.action.on_remove(&hook_ctx, sink);
        DispelOutcome::Dispelled
    }

    /// Attempts to dispel every Status carrying any of `tags`. Each attempt rolls separately.
    pub fn dispel_tagged(
        &mut self, 
        owner: EntityRef, 
        tags: &TagCollection, 
        roller: &mut dyn DiceRoller, 
        sink: &mut dyn EffectSink,
    ) -> Vec<(StatusId, DispelOutcome)> {
        let matching: Vec<StatusId> = self.statuses
            .iter()
            .filter(|status| status.tags().contains_any(tags))
            .map(|status| status.id().clone())
            .collect();

        matching
            .into_iter()
            .map(|id| {
                let outcome = self.dispel(owner, id.as_str(), roller, sink);
                (id, outcome)
            })
            .collect()
    }

    /// Unconditionally ends a Status. Only `on_remove()` fires.
    pub fn remove(&mut self, owner: EntityRef, id: &str, sink: &mut dyn EffectSink) -> bool {
        let Some(idx) = self.position(id) else {
            return false
        };

        let status = self.statuses.remove(idx);
        status.prototype.action.on_remove(&status.prototype.hook_context(owner, &status), sink);
        true
    }

    /// Ends every Status (death, cleanse-all).
    pub fn remove_all(&mut self, owner: EntityRef, sink: &mut dyn EffectSink) -> Vec<StatusEnded> {
        self.statuses
            .drain(..)
            .map(|status| {
                status.prototype.action.on_remove(&status.prototype.hook_context(owner, &status), sink);
                StatusEnded { owner, status: status.id().clone(), reason: EndReason::Removed }
            })
            .collect()
    }

    /// Zero if the Status is not active.
    pub fn stacks(&self, id: &str) -> u32 {
        self.get(id).map(Status::stacks).unwrap_or(0)
    }

    pub fn get(&self, id: &str) -> Option<&Status> {
        self.statuses.iter().find(|status| status.id().as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.statuses.iter().any(|status| status.tags().contains(tag))
    }

    /// The union of all active Statuses' tags.
    pub fn tags(&self) -> TagCollection {
        let mut all = TagCollection::new();
        for status in self.statuses.iter() {
            all.union_with(status.tags());
        }
        all
    }

    pub fn iter(&self) -> impl Iterator<Item = &Status> {
        self.statuses.iter()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
