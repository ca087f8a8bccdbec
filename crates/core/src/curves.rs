/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Response Curves - pure functions on a unit interval that reshape Consideration scores.
//! 
//! A Consideration tells us *how far* a value sits within its configured range 
//! (e.g. a target is 40% of the way to max range). The Curve decides what that means 
//! for Utility: is closer better or worse, does the preference grow linearly, or is 
//! there a sweet spot in the middle?
//! 
//! All Response Curves have a unit domain AND a unit range (visually, they fit in a 1x1 square).
//! Use [`ResponseCurve::sample_safe`] when sampling for scoring purposes; it enforces both.
//! 
//! The built-in shapes live in [`BuiltinCurve`] and are resolved by name without any 
//! allocation. Custom Curves can be added through the [`CurveRegistry`] as long as their 
//! key does not shadow a built-in one.
use bevy::math::curve::{Curve, Interval};
use bevy::platform::sync::Arc;
use bevy::reflect::Reflect;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::RegistryError;
use crate::types::{CurveKey, KvMap, UtilityScore, MAX_UTILITY_SCORE, MIN_UTILITY_SCORE};

pub use bevy::math::curve::{
    ExponentialInCurve, 
    LinearCurve, 
    QuadraticInCurve, 
    QuadraticInOutCurve, 
    SmoothStepCurve,
};

/// A Curve suitable for Utility scoring.
/// 
/// Implementors promise a unit domain; outputs outside of the unit range are tolerated, 
/// but will be clamped by `sample_safe()`.
pub trait ResponseCurve: Curve<UtilityScore> + Send + Sync {
    /// Samples the curve, clamping **both** the input and the output to the unit interval.
    /// 
    /// This is stricter than `Curve::sample_clamped()`, which only clamps the input.
    fn sample_safe(&self, t: UtilityScore) -> UtilityScore {
        let t = match t.is_nan() {
            true => MIN_UTILITY_SCORE,
            false => Interval::UNIT.clamp(t),
        };
        self.sample_unchecked(t).clamp(MIN_UTILITY_SCORE, MAX_UTILITY_SCORE)
    }
}

/// Constructors for derived shapes that remain valid Response Curves.
pub trait ResponseCurveExt: ResponseCurve + Sized {
    /// Mirrors the curve around t=0.5, so that increasing curves turn into peaks and decreasing ones into dips.
    fn mirrored(self) -> MirrorCurve<Self> {
        MirrorCurve::new(self)
    }

    /// Squashes the output above a floor, e.g. `c.with_floor(0.25)` never outputs less than 0.25.
    fn with_floor(self, floor: UtilityScore) -> FloorCurve<Self> {
        FloorCurve::new(self, floor)
    }

    fn inverted(self) -> CurveSampler<Self> {
        CurveSampler::inverse(self)
    }
}

impl<T: ResponseCurve + Sized> ResponseCurveExt for T {}

// Easing curves that already map the unit interval onto itself.
impl ResponseCurve for LinearCurve {}
impl ResponseCurve for QuadraticInCurve {}
impl ResponseCurve for QuadraticInOutCurve {}
impl ResponseCurve for ExponentialInCurve {}
impl ResponseCurve for SmoothStepCurve {}


/// Outputs the same value everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantCurve {
    value: UtilityScore,
}

impl ConstantCurve {
    /// Clamps the value into the unit range.
    pub fn new(value: UtilityScore) -> Self {
        Self { value: Interval::UNIT.clamp(value) }
    }

    /// Const-friendly constructor; the caller vouches the value is within the unit range.
    pub const fn new_unchecked(value: UtilityScore) -> Self {
        Self { value }
    }
}

impl Curve<UtilityScore> for ConstantCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, _t: f32) -> UtilityScore {
        self.value
    }
}

impl ResponseCurve for ConstantCurve {}


/// A binary curve: 1.0 for `t >= 1.0` (the raw value reached the Consideration's max), 0.0 otherwise.
/// 
/// Cheapest usable curve there is; good for filtering candidates out early.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepCurve;

impl Curve<UtilityScore> for StepCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> UtilityScore {
        match t >= 1. {
            true => MAX_UTILITY_SCORE,
            false => MIN_UTILITY_SCORE,
        }
    }
}

impl ResponseCurve for StepCurve {}


/// The wrapped curve sampled at double speed up to t=0.5, then played backwards.
/// 
/// A Linear base gives a triangle peaking at 0.5, which models 'not too little, not too much' 
/// preferences (e.g. a slow area attacker scoring clusters by size).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorCurve<C: ResponseCurve> {
    curve: C,
}

impl<C: ResponseCurve> MirrorCurve<C> {
    pub const fn new(curve: C) -> Self {
        Self { curve }
    }
}

impl<C: ResponseCurve> Curve<UtilityScore> for MirrorCurve<C> {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> UtilityScore {
        let folded = match t <= 0.5 {
            true => 2. * t,
            false => 2. - 2. * t,
        };
        self.curve.sample_safe(folded)
    }
}

impl<C: ResponseCurve> ResponseCurve for MirrorCurve<C> {}


/// Adds a baseline of Utility and rescales the rest so the max stays at 1.0:
/// 
/// `floor + (1 - floor) * f(t)`
/// 
/// The wrapped shape is preserved (just squashed), so a candidate is never eliminated outright. 
/// Apply this OVER a [`CurveSampler`], not under it, or inverse sampling will flip the floor into a ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorCurve<C: ResponseCurve> {
    curve: C,
    floor: UtilityScore,
}

impl<C: ResponseCurve> FloorCurve<C> {
    pub const fn new(curve: C, floor: UtilityScore) -> Self {
        Self { curve, floor }
    }
}

impl<C: ResponseCurve> Curve<UtilityScore> for FloorCurve<C> {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> UtilityScore {
        self.floor + (1. - self.floor) * self.curve.sample_safe(t)
    }
}

impl<C: ResponseCurve> ResponseCurve for FloorCurve<C> {}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SamplerMode {
    Forward,
    /// `1 - f(t)`
    Inverse,
}

/// Wraps a curve with an optional output inversion. 
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSampler<C: ResponseCurve> {
    curve: C,
    mode: SamplerMode,
}

impl<C: ResponseCurve> CurveSampler<C> {
    pub const fn forward(curve: C) -> Self {
        Self { curve, mode: SamplerMode::Forward }
    }

    pub const fn inverse(curve: C) -> Self {
        Self { curve, mode: SamplerMode::Inverse }
    }

    pub fn mode(&self) -> SamplerMode {
        self.mode
    }
}

impl<C: ResponseCurve> Curve<UtilityScore> for CurveSampler<C> {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> UtilityScore {
        match self.mode {
            SamplerMode::Forward => self.curve.sample_safe(t),
            SamplerMode::Inverse => 1. - self.curve.sample_safe(t),
        }
    }
}

impl<C: ResponseCurve> ResponseCurve for CurveSampler<C> {}


/// The library's built-in Curve shapes, resolvable by name.
/// 
/// The 'Anti' variants are the inverse (`1 - f(t)`) of their namesakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BuiltinCurve {
    /// Always 0.0; knocks a Decision out without deleting it. A smell in production data.
    ConstZero,
    ConstHalf,
    /// Always 1.0; mostly a placeholder.
    ConstMax,
    /// 1.0 when the raw value is at or above max, 0.0 otherwise.
    AtLeast,
    /// 1.0 when the raw value is below max, 0.0 otherwise.
    LessThan,
    /// The default first pick for anything monotonic.
    Linear,
    AntiLinear,
    /// Like Linear, but falls off faster away from max.
    Square,
    AntiSquare,
    /// Halves with every 10% drop below max; strongly favors the top of the range.
    ExponentialIn,
    AntiExponentialIn,
    SmoothStep,
    /// Peaks at the middle of the range, linearly.
    Triangle,
    AntiTriangle,
    /// Peaks at the middle of the range with a rounded top; tolerant of small deviations.
    QuadGauss,
    AntiQuadGauss,
    /// Linear, but never lower than 0.25.
    Linear25pSoftLeak,
    AntiLinear25pSoftLeak,
}

impl BuiltinCurve {
    pub const ALL: [BuiltinCurve; 18] = [
        Self::ConstZero,
        Self::ConstHalf,
        Self::ConstMax,
        Self::AtLeast,
        Self::LessThan,
        Self::Linear,
        Self::AntiLinear,
        Self::Square,
        Self::AntiSquare,
        Self::ExponentialIn,
        Self::AntiExponentialIn,
        Self::SmoothStep,
        Self::Triangle,
        Self::AntiTriangle,
        Self::QuadGauss,
        Self::AntiQuadGauss,
        Self::Linear25pSoftLeak,
        Self::AntiLinear25pSoftLeak,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ConstZero => "ConstZero",
            Self::ConstHalf => "ConstHalf",
            Self::ConstMax => "ConstMax",
            Self::AtLeast => "AtLeast",
            Self::LessThan => "LessThan",
            Self::Linear => "Linear",
            Self::AntiLinear => "AntiLinear",
            Self::Square => "Square",
            Self::AntiSquare => "AntiSquare",
            Self::ExponentialIn => "ExponentialIn",
            Self::AntiExponentialIn => "AntiExponentialIn",
            Self::SmoothStep => "SmoothStep",
            Self::Triangle => "Triangle",
            Self::AntiTriangle => "AntiTriangle",
            Self::QuadGauss => "QuadGauss",
            Self::AntiQuadGauss => "AntiQuadGauss",
            Self::Linear25pSoftLeak => "Linear25%SoftLeak",
            Self::AntiLinear25pSoftLeak => "AntiLinear25%SoftLeak",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|curve| curve.name() == name)
    }

    fn sample_forward(&self, t: f32) -> UtilityScore {
        match self {
            Self::ConstZero => 0.,
            Self::ConstHalf => 0.5,
            Self::ConstMax => 1.,
            Self::AtLeast | Self::LessThan => StepCurve.sample_safe(t),
            Self::Linear | Self::AntiLinear => LinearCurve {}.sample_safe(t),
            Self::Square | Self::AntiSquare => QuadraticInCurve {}.sample_safe(t),
            Self::ExponentialIn | Self::AntiExponentialIn => ExponentialInCurve {}.sample_safe(t),
            Self::SmoothStep => SmoothStepCurve {}.sample_safe(t),
            Self::Triangle | Self::AntiTriangle => LinearCurve {}.mirrored().sample_safe(t),
            Self::QuadGauss | Self::AntiQuadGauss => QuadraticInOutCurve {}.mirrored().sample_safe(t),
            Self::Linear25pSoftLeak => LinearCurve {}.with_floor(0.25).sample_safe(t),
            Self::AntiLinear25pSoftLeak => LinearCurve {}.inverted().with_floor(0.25).sample_safe(t),
        }
    }

    fn is_inverse(&self) -> bool {
        matches!(
            self, 
            Self::LessThan 
            | Self::AntiLinear 
            | Self::AntiSquare 
            | Self::AntiExponentialIn 
            | Self::AntiTriangle 
            | Self::AntiQuadGauss
        )
    }
}

impl Curve<UtilityScore> for BuiltinCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> UtilityScore {
        let forward = self.sample_forward(t);
        match self.is_inverse() {
            true => 1. - forward,
            false => forward,
        }
    }
}

impl ResponseCurve for BuiltinCurve {}


/// A resolved Curve: either a built-in shape or a registered custom one.
#[derive(Clone)]
pub enum SupportedResponseCurve {
    Builtin(BuiltinCurve),
    /// Custom curves pay for an Arc indirection on every sample.
    Custom(Arc<dyn ResponseCurve>),
}

impl core::fmt::Debug for SupportedResponseCurve {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Builtin(curve) => f.debug_tuple("Builtin").field(curve).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").finish(),
        }
    }
}

impl From<BuiltinCurve> for SupportedResponseCurve {
    fn from(value: BuiltinCurve) -> Self {
        Self::Builtin(value)
    }
}

impl Curve<UtilityScore> for SupportedResponseCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> UtilityScore {
        match self {
            Self::Builtin(curve) => curve.sample_safe(t),
            Self::Custom(curve) => curve.sample_safe(t),
        }
    }
}

impl ResponseCurve for SupportedResponseCurve {}

/// Resolves a built-in Curve by name. Custom Curves need a [`CurveRegistry`].
pub fn resolve_curve_from_name<S: core::borrow::Borrow<str>>(curve_name: S) -> Option<SupportedResponseCurve> {
    BuiltinCurve::from_name(curve_name.borrow()).map(SupportedResponseCurve::Builtin)
}


/// Maps string keys to Curves. Built-ins always win lookups and cannot be overridden.
#[derive(Clone, Default)]
pub struct CurveRegistry {
    custom: KvMap<CurveKey, SupportedResponseCurve>,
}

impl CurveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<S: core::borrow::Borrow<str>>(&self, name: S) -> Option<SupportedResponseCurve> {
        let name = name.borrow();
        resolve_curve_from_name(name).or_else(|| self.custom.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        BuiltinCurve::from_name(name).is_some() || self.custom.contains_key(name)
    }

    /// Registers a custom Curve. 
    /// 
    /// Fails for keys used by built-in Curves; replaces (with a warning) earlier custom registrations.
    pub fn register<C: ResponseCurve + 'static, K: Into<CurveKey>>(
        &mut self, 
        key: K, 
        curve: C,
    ) -> Result<SupportedResponseCurve, RegistryError> {
        let key = key.into();
        if BuiltinCurve::from_name(key.as_str()).is_some() {
            return Err(RegistryError::ReservedKey(key.as_str().to_owned()));
        }

        let wrapped = SupportedResponseCurve::Custom(Arc::new(curve));
        let old = self.custom.insert(key.clone(), wrapped.clone());

        if old.is_some() {
            #[cfg(feature = "logging")]
            bevy::log::warn!("CurveRegistry::register: key {} was already registered, replacing it", key);
        }

        Ok(wrapped)
    }

    pub fn custom_len(&self) -> usize {
        self.custom.len()
    }

    pub fn clear(&mut self) {
        self.custom.clear();
    }
}

impl core::fmt::Debug for CurveRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CurveRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn every_builtin_resolves_by_its_own_name() {
        for curve in BuiltinCurve::ALL {
            assert_eq!(BuiltinCurve::from_name(curve.name()), Some(curve));
        }
        assert!(resolve_curve_from_name("NoSuchCurve").is_none());
    }

    #[test]
    fn builtin_outputs_stay_in_unit_range() {
        let samples = [-3., -0.1, 0., 0.1, 0.25, 0.5, 0.75, 0.9, 1., 1.5, f32::NAN];
        for curve in BuiltinCurve::ALL {
            for t in samples {
                let out = curve.sample_safe(t);
                assert!((0. ..=1.).contains(&out), "{} at {} gave {}", curve.name(), t, out);
            }
        }
    }

    #[test]
    fn linear_family_shapes() {
        assert!(approx(BuiltinCurve::Linear.sample_safe(0.3), 0.3));
        assert!(approx(BuiltinCurve::AntiLinear.sample_safe(0.3), 0.7));
        assert!(approx(BuiltinCurve::Square.sample_safe(0.5), 0.25));
        assert!(approx(BuiltinCurve::Linear25pSoftLeak.sample_safe(0.), 0.25));
        assert!(approx(BuiltinCurve::Linear25pSoftLeak.sample_safe(1.), 1.));
        assert!(approx(BuiltinCurve::AntiLinear25pSoftLeak.sample_safe(1.), 0.25));
    }

    #[test]
    fn step_curves_split_at_max() {
        assert_eq!(BuiltinCurve::AtLeast.sample_safe(0.99), 0.);
        assert_eq!(BuiltinCurve::AtLeast.sample_safe(1.), 1.);
        assert_eq!(BuiltinCurve::LessThan.sample_safe(0.99), 1.);
        assert_eq!(BuiltinCurve::LessThan.sample_safe(1.), 0.);
    }

    #[test]
    fn triangle_peaks_in_the_middle() {
        assert!(approx(BuiltinCurve::Triangle.sample_safe(0.), 0.));
        assert!(approx(BuiltinCurve::Triangle.sample_safe(0.25), 0.5));
        assert!(approx(BuiltinCurve::Triangle.sample_safe(0.5), 1.));
        assert!(approx(BuiltinCurve::Triangle.sample_safe(0.75), 0.5));
        assert!(approx(BuiltinCurve::AntiTriangle.sample_safe(0.5), 0.));
        assert!(BuiltinCurve::QuadGauss.sample_safe(0.5) > BuiltinCurve::QuadGauss.sample_safe(0.9));
    }

    #[test]
    fn registry_rejects_builtin_keys() {
        let mut registry = CurveRegistry::new();
        let result = registry.register("Linear", ConstantCurve::new(0.3));

        assert_eq!(result.err(), Some(RegistryError::ReservedKey("Linear".to_owned())));
        assert_eq!(registry.custom_len(), 0);
    }

    #[test]
    fn registry_replaces_custom_duplicates() {
        let mut registry = CurveRegistry::new();
        registry.register("Flat", ConstantCurve::new(0.3)).unwrap();
        registry.register("Flat", ConstantCurve::new(0.6)).unwrap();

        let curve = registry.get("Flat").unwrap();
        assert!(approx(curve.sample_safe(0.1), 0.6));
        assert_eq!(registry.custom_len(), 1);
        assert!(registry.get("Linear").is_some());
        assert!(registry.get("Wobbly").is_none());
    }
}
