//! Error types for search operations

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Broad class of a [`SearchError`], deciding where it surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed startup configuration; the process must not serve
    Configuration,
    /// Bad client request; reported to the caller
    Validation,
    /// Engine call failed, timed out or answered garbage
    Engine,
}

/// Errors that can occur while configuring, compiling or executing a search
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Generic configuration problem
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two filters or facets of a domain share an identifier
    #[error("Duplicate identifier '{identifier}' in domain '{index}'")]
    DuplicateIdentifier { index: String, identifier: String },

    /// No sort option is marked default
    #[error("Domain '{0}' declares no default sort option")]
    MissingDefaultSort(String),

    /// More than one sort option is marked default
    #[error("Domain '{0}' declares more than one default sort option")]
    MultipleDefaultSorts(String),

    /// Two sort options share an id
    #[error("Duplicate sort option '{id}' in domain '{index}'")]
    DuplicateSortOption { index: String, id: String },

    /// A facet is backed by a filter the domain does not declare
    #[error("Facet '{facet}' references undeclared filter '{filter}'")]
    UndeclaredFilter { facet: String, filter: String },

    /// Two composed domains produce the same GraphQL name
    #[error("Name '{name}' is claimed by both '{first}' and '{second}'")]
    DuplicateTypeName {
        name: String,
        first: String,
        second: String,
    },

    /// Sort id not declared by the domain
    #[error("Unknown sort option: {0}")]
    UnknownSort(String),

    /// Selection for a filter identifier the domain does not declare
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// Selected value cannot be parsed for a strongly-typed filter
    #[error("Invalid value '{value}' for filter '{identifier}': {reason}")]
    InvalidFilterValue {
        identifier: String,
        value: String,
        reason: String,
    },

    /// Pagination window out of bounds
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Engine could not be reached
    #[error("Search engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Engine answered with an error status
    #[error("Search engine returned {status}: {message}")]
    EngineFailed { status: u16, message: String },

    /// Engine did not answer within the request budget
    #[error("Search engine timed out after {0}ms")]
    EngineTimeout(u64),

    /// Engine answer does not have the expected shape
    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::InvalidConfiguration(_)
            | SearchError::DuplicateIdentifier { .. }
            | SearchError::MissingDefaultSort(_)
            | SearchError::MultipleDefaultSorts(_)
            | SearchError::DuplicateSortOption { .. }
            | SearchError::UndeclaredFilter { .. }
            | SearchError::DuplicateTypeName { .. } => ErrorKind::Configuration,
            SearchError::UnknownSort(_)
            | SearchError::UnknownFilter(_)
            | SearchError::InvalidFilterValue { .. }
            | SearchError::InvalidPage(_) => ErrorKind::Validation,
            SearchError::EngineUnavailable(_)
            | SearchError::EngineFailed { .. }
            | SearchError::EngineTimeout(_)
            | SearchError::MalformedResponse(_) => ErrorKind::Engine,
        }
    }

    /// Machine-readable code reported in error extensions
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::EngineTimeout(_) => "ENGINE_TIMEOUT",
            _ => match self.kind() {
                ErrorKind::Configuration => "CONFIGURATION_ERROR",
                ErrorKind::Validation => "VALIDATION_ERROR",
                ErrorKind::Engine => "ENGINE_ERROR",
            },
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SearchError::MalformedResponse(err.to_string())
        } else {
            SearchError::EngineUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SearchError::MissingDefaultSort("freelancers".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(SearchError::UnknownSort("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(SearchError::EngineTimeout(500).kind(), ErrorKind::Engine);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SearchError::EngineTimeout(500).code(), "ENGINE_TIMEOUT");
        assert_eq!(
            SearchError::EngineFailed {
                status: 500,
                message: "boom".into()
            }
            .code(),
            "ENGINE_ERROR"
        );
        assert_eq!(SearchError::UnknownFilter("x".into()).code(), "VALIDATION_ERROR");
    }
}
