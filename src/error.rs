use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::analysis::FaultTreeResult;
use crate::budget::Interrupt;

/// Structural defects of a model. Each one is fatal for the fault tree it
/// affects and names the offending entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate event name `{0}`")]
    DuplicateEvent(String),

    #[error("duplicate fault tree name `{0}`")]
    DuplicateFaultTree(String),

    #[error("event {0} is not defined in this model")]
    UndefinedEvent(String),

    #[error("event `{0}` is not a gate")]
    NotAGate(String),

    #[error("event `{0}` is not a basic event")]
    NotABasicEvent(String),

    #[error("gate `{gate}` has {args} argument(s), but `{connective}` requires {expected}")]
    Arity {
        gate: String,
        connective: String,
        args: usize,
        expected: String,
    },

    #[error("gate `{gate}` references `{argument}` more than once")]
    DuplicateArgument { gate: String, argument: String },

    #[error("gate `{0}` references itself")]
    SelfCycle(String),

    #[error("cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("fault tree `{tree}` must have exactly one top gate, found {}", describe_candidates(candidates))]
    TopGate { tree: String, candidates: Vec<String> },

    #[error("CCF group `{group}`: {reason}")]
    CcfGroup { group: String, reason: String },
}

fn describe_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "none".to_string()
    } else {
        candidates.join(", ")
    }
}

/// Numeric defects in probability data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("probability {value} of `{event}` is outside [0, 1]")]
    ProbabilityOutOfRange { event: String, value: f64 },

    #[error("failure rate {rate} of `{event}` is negative")]
    NegativeRate { event: String, rate: f64 },

    #[error("mission time {time} used for `{event}` is negative")]
    NegativeMissionTime { event: String, time: f64 },

    #[error("invalid {parameter} = {value} in the distribution of `{event}`")]
    InvalidDeviate {
        event: String,
        parameter: &'static str,
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("limit order must be at least 1")]
    LimitOrder,

    #[error("mission time {0} must be non-negative and finite")]
    MissionTime(f64),

    #[error("cut-off {0} must be within [0, 1]")]
    CutOff(f64),

    #[error("number of trials must be at least 1")]
    NumTrials,

    #[error("number of bins must be at least 1")]
    NumBins,

    #[error("node limit must be at least 2")]
    NodeLimit,

    #[error("product limit must be at least 1")]
    ProductLimit,

    #[error("rare-event divergence threshold {0} must be positive")]
    DivergenceThreshold(f64),

    #[error("prime implicants require the exact quantification")]
    PrimeImplicantsApproximation,
}

/// Which resource ran out.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Limit {
    Time,
    Nodes,
    Products,
}

impl Display for Limit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Time => write!(f, "time limit"),
            Limit::Nodes => write!(f, "node limit"),
            Limit::Products => write!(f, "product limit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidExpression(#[from] ExpressionError),

    /// The analysis ran out of a resource; `partial` holds what was
    /// computed before that.
    #[error("{limit} exceeded")]
    LimitExceeded {
        limit: Limit,
        partial: Box<FaultTreeResult>,
    },

    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    pub(crate) fn interrupted(reason: Interrupt, partial: FaultTreeResult) -> Self {
        match reason {
            Interrupt::Cancelled => AnalysisError::Cancelled,
            Interrupt::Timeout => AnalysisError::LimitExceeded {
                limit: Limit::Time,
                partial: Box::new(partial),
            },
            Interrupt::NodeLimit => AnalysisError::LimitExceeded {
                limit: Limit::Nodes,
                partial: Box::new(partial),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_entity() {
        let e = ValidationError::Cycle {
            path: vec!["G1".into(), "G2".into(), "G1".into()],
        };
        assert_eq!(e.to_string(), "cycle detected: G1 -> G2 -> G1");

        let e = ValidationError::TopGate {
            tree: "FT".into(),
            candidates: vec![],
        };
        assert_eq!(e.to_string(), "fault tree `FT` must have exactly one top gate, found none");

        let e = ExpressionError::NegativeRate {
            event: "pump".into(),
            rate: -1.0,
        };
        assert!(e.to_string().contains("`pump`"));
    }

    #[test]
    fn test_from_conversions() {
        let e: AnalysisError = ValidationError::SelfCycle("G".into()).into();
        assert!(matches!(e, AnalysisError::Validation(ValidationError::SelfCycle(_))));
        assert_eq!(e.to_string(), "gate `G` references itself");
    }
}
