use std::{error::Error, fmt};

use stock_schema::{ErrorBody, ToolResult};
use stock_schema::schema::{
    ERROR_INVALID_ARGUMENT,
    ERROR_NOT_FOUND,
    ERROR_UNKNOWN_TOOL,
    ERROR_UPSTREAM_SCHEMA,
    ERROR_UPSTREAM_UNAVAILABLE,
};

/// Failures raised by a market data provider or the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The instrument or the requested data does not exist upstream.
    NotFound(String),
    /// Network failure, rate limiting, or timeout. Retryable.
    Unavailable(String),
    /// The upstream response did not have the expected shape.
    Schema(String),
}

impl ProviderError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Unavailable(message) => write!(f, "upstream unavailable: {message}"),
            Self::Schema(message) => write!(f, "unexpected upstream schema: {message}"),
        }
    }
}

impl Error for ProviderError {}

/// Errors surfaced to callers as structured tool results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    InvalidArgument { field: String, message: String },
    UnknownTool(String),
    NotFound(String),
    UpstreamUnavailable(String),
    UpstreamSchema(String),
}

impl ToolError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => ERROR_INVALID_ARGUMENT,
            Self::UnknownTool(_) => ERROR_UNKNOWN_TOOL,
            Self::NotFound(_) => ERROR_NOT_FOUND,
            Self::UpstreamUnavailable(_) => ERROR_UPSTREAM_UNAVAILABLE,
            Self::UpstreamSchema(_) => ERROR_UPSTREAM_SCHEMA,
        }
    }

    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }

    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { field, .. } => Some(field),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
            retryable: self.retryable(),
        }
    }

    #[must_use]
    pub fn to_result(&self) -> ToolResult {
        ToolResult::failure(self.to_body())
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { field, message } => {
                write!(f, "invalid argument `{field}`: {message}")
            }
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::UpstreamUnavailable(message) => {
                write!(f, "upstream temporarily unavailable: {message}")
            }
            Self::UpstreamSchema(message) => write!(f, "unexpected upstream response: {message}"),
        }
    }
}

impl Error for ToolError {}

impl From<ProviderError> for ToolError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(message) => Self::NotFound(message),
            ProviderError::Unavailable(message) => Self::UpstreamUnavailable(message),
            ProviderError::Schema(message) => Self::UpstreamSchema(message),
        }
    }
}
