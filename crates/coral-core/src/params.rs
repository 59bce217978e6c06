//! Gray–Scott reaction–diffusion parameters.

use std::error::Error;
use std::fmt;

/// Parameter set for the Gray–Scott system.
///
/// The defaults reproduce the coral-growth regime. Every participant in a
/// group must hold an identical set; there is no per-participant variation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Params {
    /// Diffusion coefficient for U.
    pub du: f64,
    /// Diffusion coefficient for V.
    pub dv: f64,
    /// Feed rate F.
    pub feed: f64,
    /// Kill rate k.
    pub kill: f64,
    /// Time step.
    pub dt: f64,
    /// Grid spacing.
    pub dx: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            du: 0.2,
            dv: 0.1,
            feed: 0.0545,
            kill: 0.062,
            dt: 1.0,
            dx: 1.0,
        }
    }
}

impl Params {
    /// Validate the parameter set.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any value is non-finite, a rate or coefficient is
    /// negative, or `dt`/`dx` is not strictly positive.
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (name, value) in [
            ("du", self.du),
            ("dv", self.dv),
            ("feed", self.feed),
            ("kill", self.kill),
            ("dt", self.dt),
            ("dx", self.dx),
        ] {
            if !value.is_finite() {
                return Err(ParamsError::NotFinite { name, value });
            }
        }
        for (name, value) in [
            ("du", self.du),
            ("dv", self.dv),
            ("feed", self.feed),
            ("kill", self.kill),
        ] {
            if value < 0.0 {
                return Err(ParamsError::Negative { name, value });
            }
        }
        for (name, value) in [("dt", self.dt), ("dx", self.dx)] {
            if value <= 0.0 {
                return Err(ParamsError::NotPositive { name, value });
            }
        }
        Ok(())
    }
}

/// Rejection reasons from [`Params::validate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamsError {
    /// A value is NaN or infinite.
    NotFinite {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A diffusion coefficient or rate is negative.
    Negative {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// `dt` or `dx` is zero or negative.
    NotPositive {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFinite { name, value } => {
                write!(f, "parameter {name} must be finite, got {value}")
            }
            Self::Negative { name, value } => {
                write!(f, "parameter {name} must be >= 0, got {value}")
            }
            Self::NotPositive { name, value } => {
                write!(f, "parameter {name} must be > 0, got {value}")
            }
        }
    }
}

impl Error for ParamsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn rejects_nan_coefficient() {
        let p = Params {
            du: f64::NAN,
            ..Params::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::NotFinite { name: "du", .. })
        ));
    }

    #[test]
    fn rejects_negative_feed() {
        let p = Params {
            feed: -0.01,
            ..Params::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::Negative { name: "feed", .. })
        ));
    }

    #[test]
    fn rejects_zero_dt() {
        let p = Params {
            dt: 0.0,
            ..Params::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::NotPositive { name: "dt", .. })
        ));
    }

    #[test]
    fn rejects_infinite_dx() {
        let p = Params {
            dx: f64::INFINITY,
            ..Params::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::NotFinite { name: "dx", .. })
        ));
    }
}
