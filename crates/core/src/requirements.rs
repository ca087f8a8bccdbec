/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Requirements - boolean gates on starting and continuing an Ability cast.
//! 
//! Each Requirement carries a short, human-readable failure message. When a set of 
//! Requirements is checked, evaluation stops at the first failure and that message 
//! is what gets surfaced to the caller (and, ultimately, the player).
//! 
//! Missing data (no target, unknown attribute) always counts as *not met*.
use bevy::platform::sync::Arc;

use crate::context::Context;
use crate::types::EntityRef;
use crate::world::WorldView;

/// The message of the first Requirement that did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementFailure {
    pub message: String,
}

impl RequirementFailure {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }
}

impl core::fmt::Display for RequirementFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

pub trait Requirement: Send + Sync {
    fn failure_message(&self) -> &str;

    /// Whether the Context is acceptable at all, independent of any cast.
    fn check_context(&self, ctx: &Context, world: &dyn WorldView) -> bool;

    fn can_start_cast(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        self.check_context(ctx, world)
    }

    /// Checked on every tick while the cast is in progress. Most Requirements only gate the start.
    fn can_continue_cast(&self, _ctx: &Context, _world: &dyn WorldView) -> bool {
        true
    }
}

fn target_of(ctx: &Context) -> Option<EntityRef> {
    ctx.target()
}

/// The caster must be standing still, both to start and for the whole cast.
#[derive(Debug, Clone)]
pub struct NotMoving {
    pub message: String,
}

impl Default for NotMoving {
    fn default() -> Self {
        Self { message: "Cannot do that while moving".to_owned() }
    }
}

impl Requirement for NotMoving {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        !world.is_moving(ctx.entity())
    }

    fn can_continue_cast(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        self.check_context(ctx, world)
    }
}

#[derive(Debug, Clone)]
pub struct HasTarget {
    pub message: String,
}

impl Default for HasTarget {
    fn default() -> Self {
        Self { message: "No target".to_owned() }
    }
}

impl Requirement for HasTarget {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, _world: &dyn WorldView) -> bool {
        target_of(ctx).is_some()
    }
}

/// The Context's target must exist and be alive, at the start and throughout the cast.
#[derive(Debug, Clone)]
pub struct TargetAlive {
    pub message: String,
}

impl Default for TargetAlive {
    fn default() -> Self {
        Self { message: "Target is dead".to_owned() }
    }
}

impl Requirement for TargetAlive {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        target_of(ctx).map(|target| world.is_alive(target)).unwrap_or(false)
    }

    fn can_continue_cast(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        self.check_context(ctx, world)
    }
}

/// The target (or the Context's point) must be within `max` units of the caster.
#[derive(Debug, Clone)]
pub struct TargetInRange {
    pub max: f32,
    pub message: String,
}

impl TargetInRange {
    pub fn new(max: f32) -> Self {
        Self { max, message: "Target is out of range".to_owned() }
    }
}

impl Requirement for TargetInRange {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        let distance = match (target_of(ctx), ctx.point_value()) {
            (Some(target), _) => world.distance(ctx.entity(), target),
            (None, Some(point)) => world.position(ctx.entity()).map(|pos| pos.distance(point)),
            (None, None) => None,
        };

        distance.map(|dist| dist <= self.max).unwrap_or(false)
    }

    fn can_continue_cast(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        self.check_context(ctx, world)
    }
}

/// The caster must have at least `amount` of a named Resource or Attribute (e.g. mana).
#[derive(Debug, Clone)]
pub struct ResourceAtLeast {
    pub attribute: String,
    pub amount: f32,
    pub message: String,
}

impl ResourceAtLeast {
    pub fn new<S: Into<String>>(attribute: S, amount: f32) -> Self {
        let attribute = attribute.into();
        let message = format!("Not enough {}", attribute);
        Self { attribute, amount, message }
    }
}

impl Requirement for ResourceAtLeast {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        world.attribute_value(ctx.entity(), &self.attribute)
            .map(|value| value >= self.amount)
            .unwrap_or(false)
    }
}

/// A numeric value in the Context's value bag must be at least `min`.
#[derive(Debug, Clone)]
pub struct ContextValueAtLeast {
    pub key: String,
    pub min: f32,
    pub message: String,
}

impl ContextValueAtLeast {
    pub fn new<S: Into<String>>(key: S, min: f32) -> Self {
        let key = key.into();
        let message = format!("{} is too low", key);
        Self { key, min, message }
    }
}

impl Requirement for ContextValueAtLeast {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, _world: &dyn WorldView) -> bool {
        ctx.float_value(&self.key).map(|value| value >= self.min).unwrap_or(false)
    }
}

/// The target must carry a named Attribute or Resource (e.g. only things with "health" can be healed).
#[derive(Debug, Clone)]
pub struct TargetHasAttribute {
    pub name: String,
    pub message: String,
}

impl TargetHasAttribute {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), message: "Invalid target".to_owned() }
    }
}

impl Requirement for TargetHasAttribute {
    fn failure_message(&self) -> &str {
        &self.message
    }

    fn check_context(&self, ctx: &Context, world: &dyn WorldView) -> bool {
        target_of(ctx)
            .and_then(|target| world.attributes(target))
            .map(|attrs| attrs.contains(&self.name))
            .unwrap_or(false)
    }
}


/// An ordered list of Requirements, checked first to last with short-circuiting.
#[derive(Clone, Default)]
pub struct RequirementSet {
    requirements: Vec<Arc<dyn Requirement>>,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R: Requirement + 'static>(mut self, requirement: R) -> Self {
        self.push(requirement);
        self
    }

    pub fn with_shared(mut self, requirement: Arc<dyn Requirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn push<R: Requirement + 'static>(&mut self, requirement: R) {
        self.requirements.push(Arc::new(requirement));
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    fn first_failure(
        &self, 
        check: impl Fn(&dyn Requirement) -> bool,
    ) -> Option<RequirementFailure> {
        self.requirements
            .iter()
            .find(|req| !check(req.as_ref()))
            .map(|req| RequirementFailure::new(req.failure_message()))
    }

    pub fn first_context_failure(&self, ctx: &Context, world: &dyn WorldView) -> Option<RequirementFailure> {
        self.first_failure(|req| req.check_context(ctx, world))
    }

    pub fn first_start_failure(&self, ctx: &Context, world: &dyn WorldView) -> Option<RequirementFailure> {
        self.first_failure(|req| req.can_start_cast(ctx, world))
    }

    pub fn first_continue_failure(&self, ctx: &Context, world: &dyn WorldView) -> Option<RequirementFailure> {
        self.first_failure(|req| req.can_continue_cast(ctx, world))
    }
}

impl core::fmt::Debug for RequirementSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.requirements.iter().map(|req| req.failure_message()))
            .finish()
    }
}
