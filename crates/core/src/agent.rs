/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Agents - the core-owned state of one host Entity - and the Roster that holds them.
//! 
//! Everything an Agent holds is owned exclusively by it. Other Agents can only affect it 
//! through the Simulation's explicit operations (resource adjustments, status applications).
use crate::ability::{Ability, AbilityBook};
use crate::attributes::AttributeSet;
use crate::decision_evaluator::{ChosenDecision, DecisionMaker};
use crate::errors::ContractViolation;
use crate::status::StatusContainer;
use crate::types::{EntityRef, KvMap, UtilityScore};
use crate::world::WorldView;

/// The Entity is fixed at construction; the Roster indexes Agents by it.
#[derive(Debug, Clone)]
pub struct Agent {
    entity: EntityRef,
    pub attributes: AttributeSet,
    pub abilities: AbilityBook,
    pub statuses: StatusContainer,
    /// None for Agents that never pick their own Abilities (players, scripted dummies).
    pub decisions: Option<DecisionMaker>,
}

impl Agent {
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            attributes: AttributeSet::default(),
            abilities: AbilityBook::default(),
            statuses: StatusContainer::default(),
            decisions: None,
        }
    }

    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    pub fn with_attributes(mut self, attributes: AttributeSet) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.abilities.insert(ability);
        self
    }

    pub fn with_decisions(mut self, decisions: DecisionMaker) -> Self {
        self.decisions = Some(decisions);
        self
    }

    /// Runs this Agent's DecisionMaker, considering only Abilities that could start right now.
    pub fn think(&self, world: &dyn WorldView, threshold: UtilityScore) -> Option<ChosenDecision> {
        let decisions = self.decisions.as_ref()?;
        decisions.decide(self.entity, world, threshold, |ability| self.abilities.is_available(ability.as_str()))
    }
}


/// The Agents of a Simulation, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<Agent>,
    index: KvMap<EntityRef, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, agent: Agent) -> Result<(), ContractViolation> {
        let entity = agent.entity();
        if self.index.contains_key(&entity) {
            return Err(ContractViolation::DuplicateAgent(entity));
        }

        self.index.insert(entity, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    pub fn remove(&mut self, entity: EntityRef) -> Option<Agent> {
        let idx = self.index.remove(&entity)?;
        let agent = self.agents.remove(idx);

        for later in self.agents[idx..].iter() {
            if let Some(slot) = self.index.get_mut(&later.entity()) {
                *slot -= 1;
            }
        }

        Some(agent)
    }

    pub fn get(&self, entity: EntityRef) -> Option<&Agent> {
        self.index.get(&entity).and_then(|idx| self.agents.get(*idx))
    }

    pub fn get_mut(&mut self, entity: EntityRef) -> Option<&mut Agent> {
        let idx = *self.index.get(&entity)?;
        self.agents.get_mut(idx)
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.index.contains_key(&entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.iter_mut()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.agents.iter().map(Agent::entity)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
