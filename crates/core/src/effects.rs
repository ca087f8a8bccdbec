/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Effect requests - how the core asks the outside world to make things happen.
//! 
//! The core decides *that* a fireball should be spawned or that a target loses 20 health; 
//! it does not render anything or run physics. Completed casts and Status hooks push 
//! [`EffectRequest`]s into an [`EffectSink`]. The Simulation applies the requests it owns 
//! (Resource adjustments, Status applications) to its Agents and forwards everything 
//! to the host's sink, which is free to act on or ignore each request.
use crate::attributes::AttributeSnapshot;
use crate::context::Context;
use crate::types::{AbilityId, EntityRef, StatusId};

/// Everything an effect may need to know about the cast that produced it, frozen at completion time.
#[derive(Debug, Clone, PartialEq)]
pub struct CastSnapshot {
    pub ability: AbilityId,
    pub caster: EntityRef,
    pub context: Context,
    pub attributes: AttributeSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectRequest {
    /// Spawn a named visual/world effect (projectile, explosion...). Executed by the host only.
    SpawnEffect {
        name: String,
        source: EntityRef,
        context: Option<Context>,
        snapshot: AttributeSnapshot,
    },
    /// Apply a signed delta to one of the target's Resources.
    AdjustResource {
        target: EntityRef,
        attribute: String,
        delta: f32,
        source: Option<EntityRef>,
    },
    /// Apply a registered Status prototype to the target.
    ApplyStatus {
        target: EntityRef,
        status: StatusId,
        source: Option<EntityRef>,
    },
}

impl EffectRequest {
    /// The Entity the request acts upon, if it targets one.
    pub fn target(&self) -> Option<EntityRef> {
        match self {
            Self::SpawnEffect { .. } => None,
            Self::AdjustResource { target, .. } => Some(*target),
            Self::ApplyStatus { target, .. } => Some(*target),
        }
    }
}

pub trait EffectSink {
    fn submit(&mut self, request: EffectRequest);
}

impl EffectSink for Vec<EffectRequest> {
    fn submit(&mut self, request: EffectRequest) {
        self.push(request);
    }
}

impl<S: EffectSink + ?Sized> EffectSink for &mut S {
    fn submit(&mut self, request: EffectRequest) {
        (**self).submit(request);
    }
}

/// A sink for callers that do not care about effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardEffects;

impl EffectSink for DiscardEffects {
    fn submit(&mut self, _request: EffectRequest) {}
}
