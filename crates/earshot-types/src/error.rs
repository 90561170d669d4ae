//! Validation errors for shared types.

/// Errors raised while constructing shared value types from raw input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// A sound identifier was blank.
    #[error("sound identifier is empty")]
    EmptyIdentifier,

    /// A sound identifier did not match the `namespace:path` grammar.
    #[error("invalid sound identifier {raw:?}: {reason}")]
    InvalidIdentifier {
        /// The identifier as written.
        raw: String,
        /// What is wrong with it.
        reason: String,
    },
}
