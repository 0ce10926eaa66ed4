use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the shearing cell list core.
///
/// Errors fall into two tiers: configuration errors are detected once at
/// initialization and are fatal to setup; invariant violations are
/// programming-logic faults reported as structured errors when the
/// always-compiled validation mode is enabled.
#[derive(Debug, Error)]
pub enum Error {
    /// Initialization precondition failed (wrong boundary-condition type,
    /// unsupported overlink factor, grid too coarse). Setup cannot proceed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Internal bookkeeping desynchronized (particle missing from its cell
    /// list, classification fell through, stale crossing prediction).
    /// Raised only when validation mode is on.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Numerical pathology (NaN event time, degenerate crossing).
    #[error("numerical error: {0}")]
    MathError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::Config("overlink factor 2 is unsupported".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("overlink"));
    }

    #[test]
    fn invariant_tier_is_distinguishable() {
        let e = Error::InvariantViolation("particle 3 not found in cell 17".to_string());
        assert!(format!("{e}").contains("invariant violation"));
    }
}
