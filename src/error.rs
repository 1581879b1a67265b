use thiserror::Error;

/// Reasons a graph payload or a structural edit is refused.
///
/// Every variant is raised before any state changes, so a caller that gets
/// an error still holds the graph it had before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The payload is not a `{companies, people}` document or one of its
    /// records is malformed.
    #[error("invalid graph structure: {0}")]
    Structure(String),

    #[error("company '{0}' cannot be its own parent")]
    SelfParent(String),

    #[error("duplicate id '{0}'")]
    DuplicateId(String),

    #[error("company '{id}' already lists '{parent}' as a parent")]
    DuplicateParent { id: String, parent: String },

    #[error("company '{0}' not found")]
    UnknownCompany(String),

    #[error("person '{0}' not found")]
    UnknownPerson(String),

    #[error("'{parent}' is not a parent of company '{id}'")]
    NotAParent { id: String, parent: String },

    #[error("ownership of '{id}' by '{parent}' must be within 0..=100, got {value}")]
    InvalidOwnership { id: String, parent: String, value: f64 },

    #[error("name must not be empty")]
    EmptyName,
}

impl GraphError {
    /// True for errors caused by referring to something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::UnknownCompany(_) | GraphError::UnknownPerson(_)
        )
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
