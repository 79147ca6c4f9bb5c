use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for docshift operations
///
/// This enum represents all possible error types that can occur while
/// configuring or running migrations. Each kind describes a specific category
/// of failure, enabling precise error handling at the call site.
///
/// # Examples
///
/// ```rust,ignore
/// use docshift::errors::{DocshiftError, ErrorKind, DocshiftResult};
///
/// fn example() -> DocshiftResult<()> {
///     Err(DocshiftError::new("Database name must not be blank", ErrorKind::ValidationError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Validation errors - configuration and input checking
    /// Generic validation error (blank names, malformed records)
    ValidationError,
    /// A version string does not have exactly three dot-separated components
    InvalidVersionFormat,
    /// A version component is not a non-negative integer in range
    VersionOutOfRange,

    // Catalog errors - raised during discovery, before any storage interaction
    /// Two migration units in a catalog share the same version
    DuplicateVersion,
    /// A migration factory failed to produce a unit
    InstantiationError,

    // Coordination errors
    /// Another process holds the migration lock
    MigrationInProgress,
    /// The run was cancelled via its cancellation token
    Cancelled,

    // Execution errors
    /// A migration body (forward or backward operation) failed
    MigrationError,
    /// Commit or abort violated the session protocol
    TransactionError,
    /// The operation is not valid in the current context
    InvalidOperation,

    // Storage errors
    /// A unique constraint was violated
    UniqueConstraintViolation,
    /// The requested resource was not found
    NotFound,
    /// Error from the storage backend
    BackendError,

    // Generic/internal errors - used as fallback
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidVersionFormat => write!(f, "Invalid version format"),
            ErrorKind::VersionOutOfRange => write!(f, "Version out of range"),
            ErrorKind::DuplicateVersion => write!(f, "Duplicate version"),
            ErrorKind::InstantiationError => write!(f, "Instantiation error"),
            ErrorKind::MigrationInProgress => write!(f, "Migration in progress"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
            ErrorKind::MigrationError => write!(f, "Migration error"),
            ErrorKind::TransactionError => write!(f, "Transaction error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom docshift error type.
///
/// `DocshiftError` encapsulates error information including the error message,
/// kind, and optional cause. It supports error chaining and backtraces for
/// debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use docshift::errors::{DocshiftError, ErrorKind};
///
/// // Create a simple error
/// let err = DocshiftError::new("Lock is already held", ErrorKind::MigrationInProgress);
///
/// // Create an error with a cause
/// let cause = DocshiftError::new("Insert rejected", ErrorKind::UniqueConstraintViolation);
/// let err = DocshiftError::new_with_cause("Ledger write failed", ErrorKind::BackendError, cause);
/// ```
///
/// # Type alias
///
/// The `DocshiftResult<T>` type alias is equivalent to `Result<T, DocshiftError>`
/// and is used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct DocshiftError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocshiftError>>,
    backtrace: Atomic<Backtrace>,
}

impl DocshiftError {
    /// Creates a new `DocshiftError` with the specified message and error kind.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    ///
    /// # Returns
    ///
    /// A new `DocshiftError` instance.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocshiftError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `DocshiftError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The underlying error that caused this error
    ///
    /// # Returns
    ///
    /// A new `DocshiftError` instance with the cause error attached.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocshiftError) -> Self {
        DocshiftError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<DocshiftError>> {
        self.cause.as_ref()
    }
}

impl Display for DocshiftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocshiftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for DocshiftError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for docshift operations.
///
/// `DocshiftResult<T>` is shorthand for `Result<T, DocshiftError>`.
/// All fallible docshift operations return this type.
pub type DocshiftResult<T> = Result<T, DocshiftError>;

#[cfg(feature = "serde")]
impl serde::de::Error for DocshiftError {
    fn custom<T: Display>(msg: T) -> Self {
        DocshiftError::new(&msg.to_string(), ErrorKind::ValidationError)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for DocshiftError {
    fn custom<T: Display>(msg: T) -> Self {
        DocshiftError::new(&msg.to_string(), ErrorKind::ValidationError)
    }
}

// From trait implementations for automatic error conversion
impl From<std::num::ParseIntError> for DocshiftError {
    fn from(err: std::num::ParseIntError) -> Self {
        DocshiftError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::VersionOutOfRange,
        )
    }
}

impl From<String> for DocshiftError {
    fn from(msg: String) -> Self {
        DocshiftError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocshiftError {
    fn from(msg: &str) -> Self {
        DocshiftError::new(msg, ErrorKind::InternalError)
    }
}
