use thiserror::Error;

/// Errors from repository operations (used by trait definitions in axkan-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from outbound calls to external providers (WhatsApp Graph API,
/// object storage, speech-to-text, email, order sink).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure, timeout, or 5xx. Degrade, do not retry.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The credential was rejected (401/403).
    #[error("provider rejected credentials (HTTP {status})")]
    Auth { status: u16, body: String },

    /// Any other non-success response.
    #[error("provider returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ProviderError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Auth { status, body },
            500..=599 | 408 | 429 => ProviderError::Transient(format!("HTTP {status}: {body}")),
            _ => ProviderError::Rejected { status, body },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth { .. })
    }
}

/// A structured directive in a model reply could not be parsed.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("directive is missing its closing marker")]
    Unterminated,

    #[error("directive body is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Errors from order execution.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The directive lacks fields an order requires. No order is created.
    #[error("invalid order: {0}")]
    Validation(String),

    /// The local store failed; the transaction was rolled back.
    #[error("order persistence failed: {0}")]
    Persistence(String),

    /// The external order sink failed; the local transaction was rolled back.
    #[error("order sink failed: {0}")]
    Sink(String),
}

impl From<RepositoryError> for OrderError {
    fn from(e: RepositoryError) -> Self {
        OrderError::Persistence(e.to_string())
    }
}
