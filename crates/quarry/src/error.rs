//! Error types for the quarry crate.
//!
//! Every variant is a caller error raised where the malformed input was
//! supplied. Evaluation itself never fails.

use thiserror::Error;

/// Lookup failure raised by the operator registry.
///
/// Kept as the `source` of [`QueryError::UnknownOperator`] so callers can
/// see which registry lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no operator is registered under `{0}`")]
pub struct UnknownOperatorName(pub String);

/// Errors that can occur when building scopes or queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Filter input could not be turned into criteria.
    #[error("invalid criteria: {message}")]
    InvalidCriteria { message: String },

    /// Operator name or alias is not registered.
    #[error("unknown operator `{name}`")]
    UnknownOperator {
        name: String,
        #[source]
        source: UnknownOperatorName,
    },

    /// Operator has no logical complement.
    #[error("operator `{operator}` cannot be inverted")]
    UninvertibleOperator { operator: &'static str },

    /// Scope variant has no inverse.
    #[error("{scope_type} scope cannot be inverted")]
    UninvertibleScope { scope_type: &'static str },

    /// Serialized scope carries a `type` tag the builder does not know.
    #[error("unknown scope type `{scope_type}` for {class}")]
    UnknownScopeType { scope_type: String, class: String },

    /// A scope was required but something else was supplied.
    #[error("invalid scope: {message}")]
    InvalidScope { message: String },

    /// Limit, offset or order argument failed validation.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Query builder input does not fit the requested strategy.
    #[error("unable to parse query with strategy `{strategy}`: {message}")]
    ParseError { strategy: String, message: String },

    /// Invalid regular expression pattern.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Serialized input could not be decoded.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    pub(crate) fn invalid_criteria(message: impl Into<String>) -> Self {
        QueryError::InvalidCriteria {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_scope(message: impl Into<String>) -> Self {
        QueryError::InvalidScope {
            message: message.into(),
        }
    }

    pub(crate) fn parse(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::ParseError {
            strategy: strategy.into(),
            message: message.into(),
        }
    }
}

impl From<UnknownOperatorName> for QueryError {
    fn from(err: UnknownOperatorName) -> Self {
        QueryError::UnknownOperator {
            name: err.0.clone(),
            source: err,
        }
    }
}

/// Result type for quarry operations.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn unknown_operator_keeps_lookup_failure() {
        let err = QueryError::from(UnknownOperatorName("random_call".to_string()));
        assert_eq!(err.to_string(), "unknown operator `random_call`");

        let source = err.source().expect("lookup failure is the cause");
        assert_eq!(
            source.to_string(),
            "no operator is registered under `random_call`"
        );
    }

    #[test]
    fn messages_name_the_offender() {
        let err = QueryError::UninvertibleOperator {
            operator: "contains",
        };
        assert_eq!(err.to_string(), "operator `contains` cannot be inverted");

        let err = QueryError::UnknownScopeType {
            scope_type: "xor".to_string(),
            class: "GenericScopeBuilder".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown scope type `xor` for GenericScopeBuilder"
        );
    }
}
