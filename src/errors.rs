use thiserror::Error;

/// Fieldless discriminant of [`ThothError`].
///
/// Used where only the class of a failure matters, e.g. when the retry layer
/// decides whether an error is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Internal,
    Timeout,
    Canceled,
    Aborted,
}

impl ErrorKind {
    /// Tag used by the textual wire encoding, see [`ThothError::to_wire`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Internal => "internal",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Aborted => "aborted",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "not_found" => ErrorKind::NotFound,
            "conflict" => ErrorKind::Conflict,
            "bad_request" => ErrorKind::BadRequest,
            "internal" => ErrorKind::Internal,
            "timeout" => ErrorKind::Timeout,
            "canceled" => ErrorKind::Canceled,
            "aborted" => ErrorKind::Aborted,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThothError {
    /// The requested key is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A key that must be unique already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input, including a rich query issued outside a read-only call.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Serialization failures, a missing consistency flag, a closed connection.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A classified network timeout. The outcome of the call is unknown.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The caller's context was cancelled or its deadline passed.
    #[error("Canceled: {0}")]
    Canceled(String),

    /// The ledger refused to commit the transaction.
    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

impl ThothError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThothError::NotFound(_) => ErrorKind::NotFound,
            ThothError::Conflict(_) => ErrorKind::Conflict,
            ThothError::BadRequest(_) => ErrorKind::BadRequest,
            ThothError::Internal(_) => ErrorKind::Internal,
            ThothError::Timeout(_) => ErrorKind::Timeout,
            ThothError::Canceled(_) => ErrorKind::Canceled,
            ThothError::Aborted(_) => ErrorKind::Aborted,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ThothError::NotFound(m)
            | ThothError::Conflict(m)
            | ThothError::BadRequest(m)
            | ThothError::Internal(m)
            | ThothError::Timeout(m)
            | ThothError::Canceled(m)
            | ThothError::Aborted(m) => m,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Builds an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NotFound => ThothError::NotFound(message),
            ErrorKind::Conflict => ThothError::Conflict(message),
            ErrorKind::BadRequest => ThothError::BadRequest(message),
            ErrorKind::Internal => ThothError::Internal(message),
            ErrorKind::Timeout => ThothError::Timeout(message),
            ErrorKind::Canceled => ThothError::Canceled(message),
            ErrorKind::Aborted => ThothError::Aborted(message),
        }
    }

    /// Encodes the error as `"[<kind>] <message>"`.
    ///
    /// Ledger networks only carry error strings back to the invoker, so the
    /// kind has to survive the trip for the caller (and the retry layer) to
    /// tell a conflict apart from any other failure.
    pub fn to_wire(&self) -> String {
        format!("[{}] {}", self.kind().as_str(), self.message())
    }

    /// Decodes an error produced by [`ThothError::to_wire`].
    ///
    /// Text that does not carry a known kind tag is reported as
    /// [`ThothError::Internal`] with the full text as message.
    pub fn from_wire(text: &str) -> Self {
        let parsed = text
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
            .and_then(|(tag, message)| ErrorKind::from_tag(tag).map(|kind| (kind, message)));

        match parsed {
            Some((kind, message)) => ThothError::new(kind, message),
            None => ThothError::Internal(text.to_string()),
        }
    }
}

impl From<serde_json::Error> for ThothError {
    fn from(e: serde_json::Error) -> Self {
        ThothError::Internal(format!("serialization failure: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, ThothError>;
