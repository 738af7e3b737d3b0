//! Neighborhood kernels.
//!
//! A kernel turns the lattice distance between a unit and the BMU, together
//! with the current radius, into an update weight. All kernels are pure
//! functions of `(distance, radius)`.

use crate::error::{Result, SomError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Supported neighborhood kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Neighborhood {
    /// `exp(-d² / 2r²)`.
    #[default]
    Gaussian,
    /// 1 inside the radius (inclusive), 0 outside.
    Bubble,
    /// Second derivative of a Gaussian (Ricker wavelet).
    #[serde(alias = "mexicanhat")]
    Mexican,
}

impl Neighborhood {
    /// Evaluates the kernel.
    #[inline]
    pub fn weight(self, distance: f64, radius: f64) -> f64 {
        match self {
            Neighborhood::Gaussian => gaussian(distance, radius),
            Neighborhood::Bubble => bubble(distance, radius),
            Neighborhood::Mexican => mexican_hat(distance, radius),
        }
    }

    /// Canonical short name.
    pub fn name(self) -> &'static str {
        match self {
            Neighborhood::Gaussian => "gaussian",
            Neighborhood::Bubble => "bubble",
            Neighborhood::Mexican => "mexican",
        }
    }
}

impl fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Neighborhood {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Neighborhood::Gaussian),
            "bubble" => Ok(Neighborhood::Bubble),
            "mexican" | "mexicanhat" | "mexican-hat" => Ok(Neighborhood::Mexican),
            other => Err(SomError::Config(format!(
                "unsupported neighbourhood function: {}",
                other
            ))),
        }
    }
}

/// Gaussian neighborhood.
#[inline]
pub fn gaussian(distance: f64, radius: f64) -> f64 {
    (-(distance * distance) / (2.0 * radius * radius)).exp()
}

/// Bubble neighborhood. The boundary is inclusive.
#[inline]
pub fn bubble(distance: f64, radius: f64) -> f64 {
    if distance <= radius {
        1.0
    } else {
        0.0
    }
}

/// Mexican hat neighborhood: positive inside the radius, zero on it,
/// negative outside.
#[inline]
pub fn mexican_hat(distance: f64, radius: f64) -> f64 {
    let ratio = (distance * distance) / (radius * radius);
    2.0 / ((3.0 * radius).sqrt() * PI.powf(0.25))
        * (1.0 - ratio)
        * (-(distance * distance) / (2.0 * radius * radius)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian() {
        for r in [0.5, 1.0, 3.0, 10.0] {
            assert_eq!(gaussian(0.0, r), 1.0);
        }
        assert!(gaussian(1.0, 1.0) < 1.0);
        assert!(gaussian(1e3, 1.0) < 1e-12);
        assert!(gaussian(2.0, 1.0) < gaussian(1.0, 1.0));
    }

    #[test]
    fn test_bubble_boundary_inclusive() {
        assert_eq!(bubble(0.0, 2.0), 1.0);
        assert_eq!(bubble(2.0, 2.0), 1.0);
        assert_eq!(bubble(2.0001, 2.0), 0.0);
    }

    #[test]
    fn test_mexican_hat_sign() {
        let r = 2.0;
        assert!(mexican_hat(0.0, r) > 0.0);
        assert!(mexican_hat(1.0, r) > 0.0);
        assert!(mexican_hat(r, r).abs() < 1e-12);
        assert!(mexican_hat(3.0, r) < 0.0);
    }

    #[test]
    fn test_dispatch_and_parse() {
        assert_eq!("gaussian".parse::<Neighborhood>().unwrap(), Neighborhood::Gaussian);
        assert_eq!("Bubble".parse::<Neighborhood>().unwrap(), Neighborhood::Bubble);
        assert_eq!("mexican".parse::<Neighborhood>().unwrap(), Neighborhood::Mexican);
        assert!("foobar".parse::<Neighborhood>().is_err());

        assert_eq!(Neighborhood::Bubble.weight(1.0, 1.0), 1.0);
        assert_eq!(Neighborhood::Gaussian.weight(0.0, 4.0), 1.0);
    }
}
