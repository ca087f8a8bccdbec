/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Error types and the strategies for handling unresolvable registry keys.
//! 
//! The library sorts failures into three buckets:
//! - Contract violations ([`ContractViolation`]) - the caller did something that can only be a bug 
//!   (e.g. a Context for the placeholder Entity). These abort the operation that was attempted.
//! - Recoverable cast failures ([`CastError`]) - a cast could not start right now; the state is left untouched.
//! - Invalid configuration ([`RegistryError`], or just a logged warning) - a key did not resolve.

use crate::curves::SupportedResponseCurve;
use crate::requirements::RequirementFailure;
use crate::types::{AbilityId, EntityRef, ModifierId, Seconds, StatusId};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("a Context cannot be built for the placeholder Entity")]
    PlaceholderEntity,

    #[error("a directional Context needs a finite, non-zero direction")]
    InvalidDirection,

    #[error("Modifier {0} is already registered")]
    DuplicateModifier(ModifierId),

    #[error("Status prototype {0} is already registered")]
    DuplicateStatus(StatusId),

    #[error("Agent {0} is already part of the simulation")]
    DuplicateAgent(EntityRef),

    #[error("tick delta must be finite and non-negative, got {0}")]
    InvalidTimeDelta(Seconds),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CastError {
    #[error("no Ability {0} is known for this caster")]
    UnknownAbility(AbilityId),

    #[error("Ability {0} is already casting")]
    AlreadyCasting(AbilityId),

    #[error("Ability {ability} is on cooldown for another {remaining}s")]
    OnCooldown {
        ability: AbilityId,
        remaining: Seconds,
    },

    #[error("the cast Context belongs to {context_entity}, but the caster is {caster}")]
    WrongCaster {
        caster: EntityRef,
        context_entity: EntityRef,
    },

    #[error("{0}")]
    RequirementFailed(RequirementFailure),

    #[error("Entity {0} is not part of the simulation")]
    UnknownAgent(EntityRef),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("no Curve is registered under the key {0:?}")]
    UnknownCurve(String),

    #[error("no Consideration is registered under the key {0:?}")]
    UnknownConsideration(String),

    #[error("no Context Factory is registered under the key {0:?}")]
    UnknownContextFactory(String),

    #[error("the key {0:?} is reserved by a built-in")]
    ReservedKey(String),
}


pub trait CurveResolverFn: Send + Sync + Fn(&str) -> SupportedResponseCurve {}
impl<F: Send + Sync + Fn(&str) -> SupportedResponseCurve> CurveResolverFn for F {}

/// A config value indicating how evaluator builders should handle Consideration or Curve 
/// keys that do not correspond to any registered value.
/// 
/// Unresolvable keys are a designer error rather than a runtime condition, so by default 
/// the offending Consideration is dropped with a warning and the rest of the Decision keeps 
/// working. Stricter setups can opt into `Reject` to fail the build instead.
#[derive(Default)]
pub enum NoMatchStrategy {
    Reject,
    #[default]
    SkipConsiderationWithLog,
    DefaultCurveWithLog(Box<dyn CurveResolverFn>),
}

impl NoMatchStrategy {
    pub const fn reject() -> Self {
        Self::Reject
    }

    pub const fn skip_consideration() -> Self {
        Self::SkipConsiderationWithLog
    }

    /// Falls back to a Curve picked by `curve_fn` when a Curve key is unknown. 
    /// 
    /// Good fallbacks match the expected Curve on shape class first (increasing, 
    /// decreasing, peaking) and on falloff sharpness second. Unknown *Consideration* 
    /// keys have no sensible fallback and are skipped with a warning under this strategy.
    pub fn log_and_default_to<F: CurveResolverFn + 'static>(curve_fn: F) -> Self {
        Self::DefaultCurveWithLog(Box::new(curve_fn))
    }
}

impl core::fmt::Debug for NoMatchStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Reject => write!(f, "Reject"),
            Self::SkipConsiderationWithLog => write!(f, "SkipConsiderationWithLog"),
            Self::DefaultCurveWithLog(_) => write!(f, "DefaultCurveWithLog"),
        }
    }
}
