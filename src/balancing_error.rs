//! Error handling for balancing settings and the constraint evaluator

use std::io;

/// Unified error reporting invalid balancing configuration, both when built in code
/// and when read from YAML. Apart from [`BalancingError::DimensionMismatch`], every
/// variant is raised at construction time only.
#[derive(Debug)]
pub enum BalancingError {
    IoError(io::Error),
    ParseError(String),
    /// Contact references an object that is not in the object map
    UnknownObject { contact: usize, name: String },
    /// Interval with lower bound above the upper bound (or not a number)
    EmptyInterval { object: String, parameter: String, lower: f64, upper: f64 },
    /// Nominal value outside its own bounds
    NominalOutOfBounds { object: String, parameter: String, value: f64 },
    NonPositiveMass { object: String, lower: f64 },
    NegativeFriction { contact: Option<usize>, mu: f64 },
    NonPositiveDelta(f64),
    ZeroNormal { contact: usize },
    DegenerateSupportArea { object: String, reason: String },
    /// Object supported by more than one contact
    DuplicateSupport { object: String },
    /// Chain of supporting objects loops back onto itself
    SupportCycle { object: String },
    /// Chain of supporting objects ends at an object that nothing supports
    UnsupportedChain { object: String, base: String },
    TooManyUncertainParameters { contact: usize, count: usize, max: usize },
    DimensionMismatch { what: &'static str, expected: usize, found: usize },
}

impl std::fmt::Display for BalancingError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            BalancingError::IoError(ref err) =>
                write!(f, "IO Error: {}", err),
            BalancingError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            BalancingError::UnknownObject { contact, ref name } =>
                write!(f, "Contact {} references unknown object '{}'", contact, name),
            BalancingError::EmptyInterval { ref object, ref parameter, lower, upper } =>
                write!(f, "Empty bounds for {} of '{}': [{}, {}]", parameter, object, lower, upper),
            BalancingError::NominalOutOfBounds { ref object, ref parameter, value } =>
                write!(f, "Nominal {} of '{}' ({}) is outside its bounds", parameter, object, value),
            BalancingError::NonPositiveMass { ref object, lower } =>
                write!(f, "Mass of '{}' must be positive (lower bound {})", object, lower),
            BalancingError::NegativeFriction { contact: Some(contact), mu } =>
                write!(f, "Friction coefficient of contact {} must not be negative (got {})", contact, mu),
            BalancingError::NegativeFriction { contact: None, mu } =>
                write!(f, "Friction coefficient floor mu must not be negative (got {})", mu),
            BalancingError::NonPositiveDelta(delta) =>
                write!(f, "Smoothing margin delta must be positive (got {})", delta),
            BalancingError::ZeroNormal { contact } =>
                write!(f, "Contact {} has a zero or non-finite normal, or a non-finite position", contact),
            BalancingError::DegenerateSupportArea { ref object, ref reason } =>
                write!(f, "Degenerate support area of '{}': {}", object, reason),
            BalancingError::DuplicateSupport { ref object } =>
                write!(f, "Object '{}' is supported by more than one contact", object),
            BalancingError::SupportCycle { ref object } =>
                write!(f, "Support chain of '{}' does not end at the end effector", object),
            BalancingError::UnsupportedChain { ref object, ref base } =>
                write!(f, "Support chain of '{}' ends at '{}', which rests on nothing", object, base),
            BalancingError::TooManyUncertainParameters { contact, count, max } =>
                write!(f, "Contact {} depends on {} uncertain parameters, at most {} are supported",
                       contact, count, max),
            BalancingError::DimensionMismatch { what, expected, found } =>
                write!(f, "Invalid {} dimension: expected {}, found {}", what, expected, found),
        }
    }
}

impl std::error::Error for BalancingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BalancingError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BalancingError {
    fn from(err: io::Error) -> Self {
        BalancingError::IoError(err)
    }
}
