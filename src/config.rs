//! Adjustment parameters
//!
//! Contrast, brightness and gamma are each given as one coefficient per
//! color channel. The identity value 1.0 leaves a channel unchanged.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::core::errors::{GammaError, Result};

/// A color channel of the gamma table, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Position of this channel's block inside a flat table
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseTripleError {
    #[error("expected 3 colon-separated values (r:g:b), got {0}")]
    WrongCount(usize),

    #[error("invalid number {token:?} for {channel} channel")]
    InvalidNumber { token: String, channel: Channel },

    #[error("non-finite value for {0} channel")]
    NonFinite(Channel),
}

/// One coefficient per channel, red first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTriple(pub [f64; 3]);

impl ColorTriple {
    pub const IDENTITY: ColorTriple = ColorTriple([1.0, 1.0, 1.0]);

    pub fn splat(value: f64) -> Self {
        Self([value; 3])
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.0[channel.index()]
    }
}

impl Default for ColorTriple {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FromStr for ColorTriple {
    type Err = ParseTripleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split(':').collect();
        if tokens.len() != 3 {
            return Err(ParseTripleError::WrongCount(tokens.len()));
        }

        let mut values = [0.0; 3];
        for (channel, token) in Channel::ALL.into_iter().zip(tokens) {
            let value: f64 = token.trim().parse().map_err(|_| ParseTripleError::InvalidNumber {
                token: token.to_string(),
                channel,
            })?;
            if !value.is_finite() {
                return Err(ParseTripleError::NonFinite(channel));
            }
            values[channel.index()] = value;
        }
        Ok(Self(values))
    }
}

/// Printed the way the progress report shows it: `1.00 1.00 1.00`
impl fmt::Display for ColorTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "{:.2} {:.2} {:.2}", r, g, b)
    }
}

/// The full set of coefficients applied to every output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Adjustment {
    pub contrast: ColorTriple,
    pub brightness: ColorTriple,
    pub gamma: ColorTriple,
}

impl Adjustment {
    pub fn new(contrast: ColorTriple, brightness: ColorTriple, gamma: ColorTriple) -> Self {
        Self {
            contrast,
            brightness,
            gamma,
        }
    }

    /// Reject coefficients that would push NaN or infinity into a ramp.
    pub fn validate(&self) -> Result<()> {
        for channel in Channel::ALL {
            let checks = [
                ("contrast", self.contrast.get(channel)),
                ("brightness", self.brightness.get(channel)),
                ("gamma", self.gamma.get(channel)),
            ];
            for (parameter, value) in checks {
                if !value.is_finite() {
                    return Err(GammaError::InvalidParameter {
                        parameter,
                        channel,
                        value,
                    });
                }
            }

            let gamma = self.gamma.get(channel);
            if gamma <= 0.0 {
                return Err(GammaError::InvalidParameter {
                    parameter: "gamma",
                    channel,
                    value: gamma,
                });
            }
        }
        Ok(())
    }
}
