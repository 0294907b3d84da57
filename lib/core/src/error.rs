//! The `Result` alias shared by the tollgate crates.
//!
//! Fallible library operations return `Result<T, E>` where `E` is the
//! crate's own error enum: `ClientError` in the client flow,
//! `ParameterError` in the service's parameter stores. The enum travels as
//! the report's current context, so callers branch on it with
//! `report.current_context()` while logs get the full report.
//!
//! Plain domain errors convert into a report with `?` or `.into()`; there
//! is no separate wrapping step.

use rootcause::Report;

/// `Result` whose error is a [`Report`] carrying the context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, PartialEq, Eq)]
    enum LookupError {
        Missing { key: String },
    }

    impl fmt::Display for LookupError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Missing { key } => write!(f, "no value stored for {key}"),
            }
        }
    }

    impl std::error::Error for LookupError {}

    fn lookup(key: &str) -> std::result::Result<String, LookupError> {
        Err(LookupError::Missing {
            key: key.to_string(),
        })
    }

    fn load(key: &str) -> Result<String, LookupError> {
        let value = lookup(key)?;
        Ok(value)
    }

    #[test]
    fn domain_error_is_the_current_context() {
        let report = load("cognito-domain").expect_err("lookup fails");

        assert_eq!(
            report.current_context(),
            &LookupError::Missing {
                key: "cognito-domain".to_string()
            }
        );
        assert!(report.to_string().contains("cognito-domain"));
    }
}
