//! Port allocation strategies
//!
//! A [`PortStrategy`] describes which ports an application may receive.
//! [`PortStrategy::candidates`] turns it into a lazy, ordered sequence of
//! ports; the allocator walks that sequence and takes the first free entry.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest port an application may be assigned (first non-privileged port)
pub const MIN_APP_PORT: u16 = 1024;

/// Highest valid TCP port
pub const MAX_APP_PORT: u16 = u16::MAX;

// ============================================================================
// Strategy
// ============================================================================

/// Rule by which an application's eligible ports are derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortStrategy {
    /// Exactly one fixed port
    Dedicated(u16),

    /// Every port in `start..=end`
    Range { start: u16, end: u16 },

    /// The given ports, in listed order
    List(Vec<u16>),

    /// `start + i * step` for `i` in `0..count`
    Stepped { start: u16, step: u16, count: u16 },

    /// No app-specific ports; the coordinator's default range applies
    Any,
}

/// Discriminant of a [`PortStrategy`], as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Dedicated,
    Range,
    List,
    Stepped,
    #[default]
    Any,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dedicated => "dedicated",
            Self::Range => "range",
            Self::List => "list",
            Self::Stepped => "stepped",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PortStrategy {
    /// Build a dedicated strategy, validating the port
    pub fn dedicated(port: u16) -> Result<Self, StrategyError> {
        let strategy = Self::Dedicated(port);
        strategy.validate()?;
        Ok(strategy)
    }

    /// Build an inclusive range strategy
    pub fn range(start: u16, end: u16) -> Result<Self, StrategyError> {
        let strategy = Self::Range { start, end };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Build a list strategy
    pub fn list(ports: Vec<u16>) -> Result<Self, StrategyError> {
        let strategy = Self::List(ports);
        strategy.validate()?;
        Ok(strategy)
    }

    /// Build a stepped strategy
    pub fn stepped(start: u16, step: u16, count: u16) -> Result<Self, StrategyError> {
        let strategy = Self::Stepped { start, step, count };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Strategy discriminant
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Dedicated(_) => StrategyKind::Dedicated,
            Self::Range { .. } => StrategyKind::Range,
            Self::List(_) => StrategyKind::List,
            Self::Stepped { .. } => StrategyKind::Stepped,
            Self::Any => StrategyKind::Any,
        }
    }

    /// Check the strategy parameters
    pub fn validate(&self) -> Result<(), StrategyError> {
        match self {
            Self::Dedicated(port) => check_port("port", *port),
            Self::Range { start, end } => {
                check_port("port_range", *start)?;
                check_port("port_range", *end)?;
                if start > end {
                    return Err(StrategyError::InvalidParameter {
                        field: "port_range",
                        reason: format!("start {start} is greater than end {end}"),
                    });
                }
                Ok(())
            }
            Self::List(ports) => {
                if ports.is_empty() {
                    return Err(StrategyError::InvalidParameter {
                        field: "ports",
                        reason: "port list is empty".to_string(),
                    });
                }
                ports.iter().try_for_each(|port| check_port("ports", *port))
            }
            Self::Stepped { start, step, count } => {
                check_port("port_step.start", *start)?;
                if *step == 0 {
                    return Err(StrategyError::InvalidParameter {
                        field: "port_step.step",
                        reason: "step must be at least 1".to_string(),
                    });
                }
                if *count == 0 {
                    return Err(StrategyError::InvalidParameter {
                        field: "port_step.count",
                        reason: "count must be at least 1".to_string(),
                    });
                }
                let last = u32::from(*start) + (u32::from(*count) - 1) * u32::from(*step);
                if last > u32::from(MAX_APP_PORT) {
                    return Err(StrategyError::InvalidParameter {
                        field: "port_step",
                        reason: format!("sequence ends at {last}, past {MAX_APP_PORT}"),
                    });
                }
                Ok(())
            }
            Self::Any => Ok(()),
        }
    }

    /// Ordered candidate ports for this strategy
    ///
    /// `Any` yields nothing; the caller substitutes the default range.
    pub fn candidates(&self) -> Candidates {
        match self {
            Self::Dedicated(port) => Candidates::List(vec![*port].into_iter()),
            Self::Range { start, end } => Candidates::range(*start, *end),
            Self::List(ports) => Candidates::List(ports.clone().into_iter()),
            Self::Stepped { start, step, count } => Candidates::Stepped {
                next: u32::from(*start),
                step: u32::from(*step),
                remaining: u32::from(*count),
            },
            Self::Any => Candidates::Empty,
        }
    }

    /// Whether this strategy yields no app-specific candidates
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

fn check_port(field: &'static str, port: u16) -> Result<(), StrategyError> {
    if port < MIN_APP_PORT {
        return Err(StrategyError::PortOutOfRange { field, port });
    }
    Ok(())
}

// ============================================================================
// Candidate Sequence
// ============================================================================

/// Lazy, finite sequence of candidate ports
///
/// A clone continues from the current position. Call
/// [`PortStrategy::candidates`] again to start over.
#[derive(Debug, Clone)]
pub enum Candidates {
    Empty,
    Range(RangeInclusive<u16>),
    List(std::vec::IntoIter<u16>),
    Stepped { next: u32, step: u32, remaining: u32 },
}

impl Candidates {
    /// Inclusive range of ports
    pub fn range(start: u16, end: u16) -> Self {
        Self::Range(start..=end)
    }

    /// True if the sequence can never yield a port
    pub fn is_empty(&self) -> bool {
        self.size_hint().1 == Some(0)
    }
}

impl Iterator for Candidates {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        match self {
            Self::Empty => None,
            Self::Range(range) => range.next(),
            Self::List(ports) => ports.next(),
            Self::Stepped {
                next,
                step,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let port = u16::try_from(*next).ok()?;
                *remaining -= 1;
                *next += *step;
                Some(port)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Empty => (0, Some(0)),
            Self::Range(range) => range.size_hint(),
            Self::List(ports) => ports.size_hint(),
            Self::Stepped { remaining, .. } => (0, Some(*remaining as usize)),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Invalid strategy parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("{field}: port {port} is outside {MIN_APP_PORT}-{MAX_APP_PORT}")]
    PortOutOfRange { field: &'static str, port: u16 },

    #[error("{field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("strategy '{kind}' requires field '{field}'")]
    MissingField { kind: StrategyKind, field: &'static str },

    #[error("field '{field}' is not allowed with strategy '{kind}'")]
    UnexpectedField { kind: StrategyKind, field: &'static str },
}
