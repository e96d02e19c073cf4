//! # beatmix common library
//!
//! Shared code for the beatmix crates:
//! - Error types
//! - Configuration file resolution
//! - Fade curves and transition styles

pub mod config;
pub mod error;
pub mod fade_curves;

pub use error::{Error, Result};
pub use fade_curves::{CurvePair, CurvePolicy, FadeCurve, FadeType};
