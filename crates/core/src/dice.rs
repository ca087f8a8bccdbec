/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Dice rolling, as a capability injected into whatever needs randomness (dispel resistance).
//! 
//! Nothing in the core owns an RNG; callers pass a [`DiceRoller`] in, so tests can 
//! substitute a deterministic one.
use rand::Rng;

pub trait DiceRoller {
    /// The sum of `count` rolls of a `die`-sided die. Zero if either is zero.
    /// Totals past `i32::MAX` saturate.
    fn roll(&mut self, count: u32, die: u32) -> i32;
}

impl<D: DiceRoller + ?Sized> DiceRoller for &mut D {
    fn roll(&mut self, count: u32, die: u32) -> i32 {
        (**self).roll(count, die)
    }
}

/// A [`DiceRoller`] backed by any `rand` RNG.
#[derive(Debug, Clone)]
pub struct RandomRoller<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomRoller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: Rng> DiceRoller for RandomRoller<R> {
    fn roll(&mut self, count: u32, die: u32) -> i32 {
        if count == 0 || die == 0 {
            return 0;
        }

        let mut total: i64 = 0;
        for _ in 0..count {
            total = total.saturating_add(i64::from(self.rng.gen_range(1..=die)));
            if total >= i64::from(i32::MAX) {
                return i32::MAX;
            }
        }

        i32::try_from(total).unwrap_or(i32::MAX)
    }
}
