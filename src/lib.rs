#![doc = include_str!("../README.md")]
#![no_std]

pub use gambit_core::*;

pub mod prelude {
    pub use gambit_core::types::*;
    pub use gambit_core::ability::{
        Ability, AbilityBook, AbilityComponent, AdjustResource, ApplyStatus, 
        CancelReason, CastEvent, CastState, Recipient, SpawnEffect,
    };
    pub use gambit_core::agent::{Agent, Roster};
    pub use gambit_core::attributes::{Attribute, AttributeSet, AttributeSnapshot, ModifierKind, ResourcePool};
    pub use gambit_core::config::{CooldownPolicy, GambitConfig};
    pub use gambit_core::considerations::{BoundConsideration, Consideration, ConsiderationSpec};
    pub use gambit_core::context::{Context, ContextPayload, ContextValue};
    pub use gambit_core::context_factories::ContextFactory;
    pub use gambit_core::curves::{BuiltinCurve, ResponseCurve, SupportedResponseCurve};
    pub use gambit_core::decision_evaluator::{ChosenDecision, DecisionEvaluator, DecisionMaker};
    pub use gambit_core::dice::{DiceRoller, RandomRoller};
    pub use gambit_core::effects::{CastSnapshot, EffectRequest, EffectSink};
    pub use gambit_core::errors::{CastError, ContractViolation, NoMatchStrategy, RegistryError};
    pub use gambit_core::modifiers::{Modifier, ModifierEffect};
    pub use gambit_core::requirements::{Requirement, RequirementFailure, RequirementSet};
    pub use gambit_core::simulation::{Catalog, Simulation, TickReport};
    pub use gambit_core::status::{StatusAction, StatusContainer, StatusPrototype};
    pub use gambit_core::tags::{Tag, TagCollection};
    pub use gambit_core::world::{FactionMask, HostWorld, SceneView, WorldView};

    #[cfg(feature = "testing")]
    pub use gambit_core::testing::{FixedRoller, MockHost, RecordingEffectSink};
}
