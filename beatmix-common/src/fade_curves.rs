//! Fade curves and transition styles
//!
//! A transition style ([`FadeType`]) is the tag the track selector attaches to
//! every crossfade. The mixer never interprets the tag itself: it asks a
//! [`CurvePolicy`] which pair of [`FadeCurve`]s to use for it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Fade curve shapes
///
/// Each curve type provides a different perceptual quality:
/// - Linear: Constant rate of change (precise, predictable)
/// - Exponential: Slow start, fast finish
/// - Logarithmic: Fast start, slow finish
/// - SCurve: Smooth acceleration and deceleration
/// - EqualPower: Constant perceived loudness during a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    Linear,

    /// v(t) = t²
    Exponential,

    /// v(t) = (1-t)² when fading out
    Logarithmic,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "cosine", alias = "s-curve")]
    SCurve,

    /// v(t) = sin(t × π/2)
    #[serde(alias = "equalpower", alias = "constant_power")]
    EqualPower,
}

impl FadeCurve {
    /// Fade-in multiplier at `position` (0.0 = start of fade, 1.0 = end).
    ///
    /// Returns 0.0 (silence) at the start and 1.0 (full volume) at the end.
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            // Inverse of the quadratic fade-out
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Fade-out multiplier at `position` (0.0 = start of fade, 1.0 = end).
    ///
    /// Returns 1.0 (full volume) at the start and 0.0 (silence) at the end.
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential | FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Curve that balances this one when used on the other side of a crossfade.
    pub fn recommended_pair(&self) -> FadeCurve {
        match self {
            FadeCurve::Exponential => FadeCurve::Logarithmic,
            FadeCurve::Logarithmic => FadeCurve::Exponential,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Exponential => "exponential",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }
}

impl Default for FadeCurve {
    fn default() -> Self {
        FadeCurve::Linear
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FadeCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "exponential" => Ok(FadeCurve::Exponential),
            "logarithmic" => Ok(FadeCurve::Logarithmic),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Ok(FadeCurve::SCurve),
            "equal_power" | "equalpower" | "constant_power" => Ok(FadeCurve::EqualPower),
            other => Err(Error::InvalidInput(format!("unknown fade curve '{}'", other))),
        }
    }
}

/// Transition style chosen by the track selector
///
/// Also used in the "now playing" text while two songs overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeType {
    /// Long, smooth blend between calm sections
    Chill,
    /// Blend over a running groove
    Rolling,
    /// Both songs drop together
    DoubleDrop,
}

impl FadeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeType::Chill => "chill",
            FadeType::Rolling => "rolling",
            FadeType::DoubleDrop => "double drop",
        }
    }

    pub fn all_variants() -> &'static [FadeType] {
        &[FadeType::Chill, FadeType::Rolling, FadeType::DoubleDrop]
    }
}

impl Default for FadeType {
    fn default() -> Self {
        FadeType::Chill
    }
}

impl fmt::Display for FadeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FadeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], " ").as_str() {
            "chill" => Ok(FadeType::Chill),
            "rolling" => Ok(FadeType::Rolling),
            "double drop" | "doubledrop" => Ok(FadeType::DoubleDrop),
            other => Err(Error::InvalidInput(format!("unknown fade type '{}'", other))),
        }
    }
}

/// Curves applied to the incoming and the outgoing song of one crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePair {
    /// Applied (rising) to the incoming song
    pub fade_in: FadeCurve,
    /// Applied (falling) to the outgoing song
    pub fade_out: FadeCurve,
}

impl CurvePair {
    /// Pair built from one curve and its recommended partner.
    pub fn matched(fade_in: FadeCurve) -> Self {
        Self {
            fade_in,
            fade_out: fade_in.recommended_pair(),
        }
    }

    /// Incoming gain at crossfade progress `t`.
    pub fn incoming_gain(&self, t: f32) -> f32 {
        self.fade_in.calculate_fade_in(t)
    }

    /// Outgoing gain at crossfade progress `t`.
    pub fn outgoing_gain(&self, t: f32) -> f32 {
        self.fade_out.calculate_fade_out(t)
    }
}

impl Default for CurvePair {
    fn default() -> Self {
        Self::matched(FadeCurve::Linear)
    }
}

/// Maps every transition style to the curves used to render it
///
/// Styles missing from the map fall back to `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePolicy {
    #[serde(default)]
    pub default: CurvePair,
    #[serde(default, flatten)]
    pub by_type: BTreeMap<FadeType, CurvePair>,
}

impl CurvePolicy {
    /// Same curve pair for every fade type.
    pub fn uniform(pair: CurvePair) -> Self {
        Self {
            default: pair,
            by_type: BTreeMap::new(),
        }
    }

    pub fn with(mut self, fade_type: FadeType, pair: CurvePair) -> Self {
        self.by_type.insert(fade_type, pair);
        self
    }

    pub fn curves_for(&self, fade_type: FadeType) -> CurvePair {
        self.by_type.get(&fade_type).copied().unwrap_or(self.default)
    }
}

impl Default for CurvePolicy {
    fn default() -> Self {
        Self::uniform(CurvePair::default())
            .with(FadeType::Chill, CurvePair::matched(FadeCurve::EqualPower))
            .with(FadeType::Rolling, CurvePair::matched(FadeCurve::SCurve))
            .with(FadeType::DoubleDrop, CurvePair::matched(FadeCurve::Linear))
    }
}
