//! Decay schedules for the neighborhood radius and the learning rate.
//!
//! Every schedule starts at the initial value on iteration 0 and reaches a
//! fixed floor on the last iteration (`total - 1`).

use crate::error::{Result, SomError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Radius reached on the last iteration.
pub const MIN_RADIUS: f64 = 1.0;

/// Learning rate reached on the last iteration.
pub const MIN_LEARNING_RATE: f64 = 0.01;

/// Decay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Decay {
    /// `v0 * exp(-i / λ)`.
    #[default]
    #[serde(rename = "exp")]
    Exponential,
    /// Straight line from `v0` to the floor.
    #[serde(rename = "lin")]
    Linear,
    /// `v0 / (1 + c * i)`.
    #[serde(rename = "inv")]
    Inverse,
}

impl Decay {
    /// Canonical short name.
    pub fn name(self) -> &'static str {
        match self {
            Decay::Exponential => "exp",
            Decay::Linear => "lin",
            Decay::Inverse => "inv",
        }
    }

    /// Parses a strategy name, falling back to exponential decay for
    /// anything unknown.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown decay strategy '{}', using exponential decay", name);
            Decay::Exponential
        })
    }

    /// Value of the schedule at `iteration` when decaying from `v0` to `floor`
    /// over `total` iterations.
    fn value(self, iteration: usize, total: usize, v0: f64, floor: f64) -> f64 {
        let span = total.saturating_sub(1);
        if span == 0 || iteration == 0 {
            return v0;
        }
        let t = iteration as f64 / span as f64;

        match self {
            // λ = span / ln(v0 / floor), so exp(-i / λ) == (floor / v0)^(i / span)
            Decay::Exponential => v0 * (floor / v0).powf(t),
            Decay::Linear => v0 - t * (v0 - floor),
            Decay::Inverse => {
                let c = (v0 / floor - 1.0) / span as f64;
                v0 / (1.0 + c * iteration as f64)
            }
        }
    }
}

impl fmt::Display for Decay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Decay {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exp" | "exponential" => Ok(Decay::Exponential),
            "lin" | "linear" => Ok(Decay::Linear),
            "inv" | "inverse" => Ok(Decay::Inverse),
            other => Err(SomError::Config(format!(
                "unsupported decay strategy: {}",
                other
            ))),
        }
    }
}

fn check_schedule(what: &str, total: usize, v0: f64) -> Result<()> {
    if !(v0 > 0.0) || !v0.is_finite() {
        return Err(SomError::Config(format!("invalid initial {}: {}", what, v0)));
    }
    if total == 0 {
        return Err(SomError::Config(format!(
            "invalid number of iterations for {} decay: {}",
            what, total
        )));
    }
    Ok(())
}

/// Neighborhood radius at `iteration`.
///
/// Returns `radius0` on iteration 0 and [`MIN_RADIUS`] on iteration
/// `total - 1`. Fails if `radius0` is not strictly positive.
pub fn radius(iteration: usize, total: usize, strategy: Decay, radius0: f64) -> Result<f64> {
    check_schedule("radius", total, radius0)?;
    Ok(strategy.value(iteration, total, radius0, MIN_RADIUS))
}

/// Learning rate at `iteration`.
///
/// Returns `rate0` on iteration 0 and [`MIN_LEARNING_RATE`] on iteration
/// `total - 1`. Fails if `rate0` is not strictly positive.
pub fn learning_rate(iteration: usize, total: usize, strategy: Decay, rate0: f64) -> Result<f64> {
    check_schedule("learning rate", total, rate0)?;
    Ok(strategy.value(iteration, total, rate0, MIN_LEARNING_RATE))
}
