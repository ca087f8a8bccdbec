/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
pub mod ability;
pub mod agent;
pub mod attributes;
pub mod config;
pub mod considerations;
pub mod context;
pub mod context_factories;
pub mod curves;
pub mod decision_evaluator;
pub mod dice;
pub mod effects;
pub mod errors;
pub mod identifiers;
pub mod modifiers;
pub mod requirements;
pub mod simulation;
pub mod status;
pub mod tags;
pub mod types;
pub mod world;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
