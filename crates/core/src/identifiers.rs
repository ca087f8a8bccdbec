/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Identifiers for key types.
//! 
//! These are, broadly speaking, simple newtype wrappers whose main purpose is to 
//! keep different kinds of string keys from being mixed up (an AbilityId is not a 
//! StatusId, even if both happen to read "Fireball") and to allow for trait impls 
//! that will not 'leak' into the underlying String.

use core::borrow::Borrow;

use bevy::reflect::Reflect;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Reflect, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl<IS: Into<String>> From<IS> for $name {
            fn from(value: IS) -> Self {
                Self::from_string(value.into())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.borrow()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

string_identifier!(
    /// Identifies an Ability within its caster's AbilityBook (e.g. "Fireball").
    AbilityId
);

string_identifier!(
    /// Identifies a Modifier. Applying or removing is idempotent per ModifierId.
    ModifierId
);

string_identifier!(
    /// Identifies a Status prototype; two Statuses are 'the same' iff their StatusIds match.
    StatusId
);

string_identifier!(
    /// Registry key for a Consideration implementation.
    ConsiderationKey
);

string_identifier!(
    /// Registry key for a Response Curve.
    CurveKey
);

string_identifier!(
    /// Registry key for a Context Factory.
    ContextFactoryKey
);


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KvMap;

    #[test]
    fn identifiers_borrow_as_str() {
        let mut map: KvMap<AbilityId, u32> = KvMap::default();
        map.insert(AbilityId::from("Fireball"), 3);

        assert_eq!(map.get("Fireball"), Some(&3));
        assert_eq!(AbilityId::from("Fireball").to_string(), "Fireball");
    }
}
