/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! App-wide configuration for the Simulation.
//! 
//! Build one with [`GambitConfig::builder()`]; anything you leave unset falls back 
//! to the library defaults documented on each setter.

use bevy::reflect::Reflect;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::NoMatchStrategy;
use crate::types::UtilityScore;

/// When an Ability's cooldown starts counting down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CooldownPolicy {
    /// The cooldown starts when the cast starts; long casts eat into it.
    OnCastStarted,
    /// The cooldown starts when the cast completes. Cancelled casts never trigger it.
    #[default]
    OnCastCompleted,
}

#[derive(Debug)]
pub struct GambitConfig {
    pub cooldown_policy: CooldownPolicy,
    /// A candidate is only eligible if its composite score is strictly above this.
    pub decision_threshold: UtilityScore,
    pub no_match_strategy: NoMatchStrategy,
    /// Whether composite scores get the consideration-count compensation.
    /// See [`crate::decision_evaluator::consideration_adjustment`].
    pub apply_consideration_compensation: bool,
    /// The Resource whose losses count as damage taken for interruptible casts.
    pub damage_resource: String,
}

impl Default for GambitConfig {
    fn default() -> Self {
        GambitConfigBuilder::default().build()
    }
}

impl GambitConfig {
    pub fn builder() -> GambitConfigBuilder {
        GambitConfigBuilder::default()
    }
}

/// Builder pattern for GambitConfig
#[derive(Default, Debug)]
pub struct GambitConfigBuilder {
    cooldown_policy: Option<CooldownPolicy>,
    decision_threshold: Option<UtilityScore>,
    no_match_strategy: Option<NoMatchStrategy>,
    apply_consideration_compensation: Option<bool>,
    damage_resource: Option<String>,
}

impl GambitConfigBuilder {
    pub fn build(self) -> GambitConfig {
        GambitConfig {
            cooldown_policy: self.cooldown_policy.unwrap_or_default(),
            decision_threshold: self.decision_threshold.unwrap_or(0.),
            no_match_strategy: self.no_match_strategy.unwrap_or_default(),
            apply_consideration_compensation: self.apply_consideration_compensation.unwrap_or(true),
            damage_resource: self.damage_resource.unwrap_or_else(|| String::from("health")),
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults to [`CooldownPolicy::OnCastCompleted`].
    pub fn set_cooldown_policy(mut self, val: CooldownPolicy) -> Self {
        self.cooldown_policy = Some(val); self
    }

    /// Defaults to 0.0, i.e. anything scoring above zero is eligible.
    pub fn set_decision_threshold(mut self, val: UtilityScore) -> Self {
        self.decision_threshold = Some(val); self
    }

    /// Defaults to [`NoMatchStrategy::SkipConsiderationWithLog`].
    pub fn set_no_match_strategy(mut self, val: NoMatchStrategy) -> Self {
        self.no_match_strategy = Some(val); self
    }

    /// Defaults to true.
    pub fn set_apply_consideration_compensation(mut self, val: bool) -> Self {
        self.apply_consideration_compensation = Some(val); self
    }

    /// Defaults to "health".
    pub fn set_damage_resource<S: Into<String>>(mut self, val: S) -> Self {
        self.damage_resource = Some(val.into()); self
    }
}

impl From<GambitConfigBuilder> for GambitConfig {
    fn from(value: GambitConfigBuilder) -> Self {
        value.build()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = GambitConfig::default();
        assert_eq!(config.cooldown_policy, CooldownPolicy::OnCastCompleted);
        assert_eq!(config.decision_threshold, 0.);
        assert!(config.apply_consideration_compensation);
        assert_eq!(config.damage_resource, "health");
        assert!(matches!(config.no_match_strategy, NoMatchStrategy::SkipConsiderationWithLog));
    }

    #[test]
    fn builder_overrides_stick() {
        let config = GambitConfig::builder()
            .set_cooldown_policy(CooldownPolicy::OnCastStarted)
            .set_decision_threshold(0.25)
            .set_no_match_strategy(NoMatchStrategy::reject())
            .set_apply_consideration_compensation(false)
            .set_damage_resource("hull")
            .build();

        assert_eq!(config.cooldown_policy, CooldownPolicy::OnCastStarted);
        assert_eq!(config.decision_threshold, 0.25);
        assert!(!config.apply_consideration_compensation);
        assert_eq!(config.damage_resource, "hull");
        assert!(matches!(config.no_match_strategy, NoMatchStrategy::Reject));
    }
}
