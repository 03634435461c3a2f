//! Errors returned by this crate.

use std::error as stderr;
use std::fmt;
use std::time::Duration;

/// Convenient type alias to shorten the signature on every usage.
pub(crate) type BoxError = Box<dyn stderr::Error + Send + Sync>;

/// The error type that this crate use for wrapping errors.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identifies errors produced by the internal implementation (e.g. decoding values exchanged
    /// with the satellite, etc.) that aren't expected to happen.
    #[error(transparent)]
    Internal(Internal),
    /// Identifies invalid arguments passed to a function or method.
    #[error(transparent)]
    InvalidArguments(Args),
    /// Identifies an error returned by the satellite or the network.
    #[error(transparent)]
    Uplink(Uplink),
    /// The satellite node URL, the API key or the serialized access grant cannot be parsed.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    /// A permission that doesn't allow any operation was used for sharing an access grant.
    #[error("permission is empty; it must allow at least one operation")]
    EmptyPermission,
    /// A permission whose not before time is after its not after time was used for sharing an
    /// access grant.
    #[error("invalid time window: not before ({not_before:?}) is after not after ({not_after:?})")]
    InvalidTimeWindow {
        /// Not before time, measured since the Unix Epoch time.
        not_before: Duration,
        /// Not after time, measured since the Unix Epoch time.
        not_after: Duration,
    },
    /// An operation was attempted on an upload or download that was already finished.
    #[error("transaction closed")]
    TransactionClosed,
    /// The internal interface required by a backward compatible function isn't exposed by this
    /// version of the crate.
    #[error("incompatible internal interface: {0}")]
    SdkIncompatibility(String),
}

impl Error {
    /// Creates an [`Internal` variant](Self::Internal) from the provided context message and the
    /// error that originated it.
    pub(crate) fn new_internal(ctx_msg: &str, err: BoxError) -> Self {
        Error::Internal(Internal {
            ctx_msg: String::from(ctx_msg),
            inner: Some(err),
        })
    }

    /// Creates an [`Internal` variant](Self::Internal) from the provided context message without
    /// any error that originated it.
    pub(crate) fn new_internal_without_inner(ctx_msg: &str) -> Self {
        Error::Internal(Internal {
            ctx_msg: String::from(ctx_msg),
            inner: None,
        })
    }

    /// Convenient constructor for creating an [`InvalidArguments` variant](Self::InvalidArguments)
    /// Error.
    ///
    /// See [`Args`] documentation to know about the convention for the value of the `names`
    /// parameter.
    pub(crate) fn new_invalid_arguments(names: &str, msg: &str) -> Self {
        Self::InvalidArguments(Args::new(names, msg))
    }

    /// Convenient constructor for creating an [`Uplink` variant](Self::Uplink).
    pub(crate) fn new_uplink(err: Uplink) -> Self {
        Self::Uplink(err)
    }

    /// Returns true if the error is an [`Uplink::Canceled`] error.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Uplink(Uplink::Canceled(_)))
    }

    /// Returns true if the error is an [`Uplink::PermissionDenied`] error.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Uplink(Uplink::PermissionDenied(_)))
    }

    /// Returns true if the error is an [`Uplink::AuthorizationExpired`] error.
    pub fn is_authorization_expired(&self) -> bool {
        matches!(self, Self::Uplink(Uplink::AuthorizationExpired(_)))
    }

    /// Returns true if the error is an [`Uplink::UploadDone`] error.
    pub fn is_upload_done(&self) -> bool {
        matches!(self, Self::Uplink(Uplink::UploadDone(_)))
    }
}

/// Represents invalid arguments error regarding the business domain.
///
/// # Example
///
/// ```ignore
/// // This example is ignored because it shows how to return an `InvalidArguments` error through
/// // the constructor methods that aren't exported outside of this crate.
///
/// use uplink::{Error, Result};
///
/// fn positive_non_zero_div_and_mul(a: i64, b: i64, div: i64) ->Result<i64> {
///     if div == 0 {
///         return Err(Error::new_invalid_arguments("div", "div cannot be 0"));
///     }
///
///     if (a == 0 && b != 0) || (a != 0 && b == 0) {
///         return Err(Error::new_invalid_arguments(
///             "(a,b)", "a and b can only be 0 if both are 0",
///         ));
///     }
///
///     if (a >= 0 && b >= 0 && div > 0) || (a <= 0 && b <= 0 && div < 0 ) {
///         return Ok((a/div) * (b/div));
///     }
///
///     Err(Error::new_invalid_arguments(
///         "<all>", "all the arguments must be positive or negative, they cannot be mixed",
///     ))
/// }
/// ```
#[derive(Debug)]
pub struct Args {
    /// One or several parameters names; it has several conventions for expressing the involved
    /// parameters.
    ///
    /// * When a specific parameter is invalid its value is the exact parameter name.
    /// * When the parameter is a list (vector, array, etc.), the invalid items can be
    ///   __optionally__ indicated using square brackets (e.g. `l[3,5,7]`).
    /// * when the parameter is struct, the invalid fields or method return return values can be
    ///    __optionally__ indicated using curly brackets (e.g invalid field: `person{name}`, invalid
    ///    method return value: `person{full_name()}`, invalid fields/methods:
    ///   `employee{name, position()}`).
    /// * When several parameters are invalid, its values is the parameters names wrapped in round
    ///   brackets (e.g. `(p1,p3)`); it also accepts any above combination of parameters types
    ///   (e.g. `(p1, l[2,10], person{name})`).
    /// * When all the function parameters are invalid, `<all>` is used.
    pub names: String,
    /// A human friendly message that explains why the argument(s) are invalid.
    pub msg: String,
}

impl Args {
    fn new(names: &str, msg: &str) -> Self {
        Args {
            names: String::from(names),
            msg: String::from(msg),
        }
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{} arguments have invalid values. {}",
            self.names, self.msg
        )
    }
}

impl stderr::Error for Args {}

/// Errors returned by the satellite or by the network layer, providing access to its details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uplink {
    /// A satellite internal error.
    Internal(String),
    /// The operation was canceled through its [`Context`](crate::Context) or its deadline
    /// elapsed.
    Canceled(String),
    /// The satellite couldn't be reached.
    DialFailed(String),
    /// The satellite rejected the operation because the client over passed the rate-limit
    /// allowance.
    TooManyRequests(String),
    /// The satellite rejected the operation because the access grant doesn't allow it, or the
    /// access grant doesn't contain the encryption key of the requested path.
    PermissionDenied(String),
    /// The satellite rejected the operation because the current time is outside of the validity
    /// period of the access grant.
    AuthorizationExpired(String),
    /// The satellite rejected the operation because the bucket's name contains non-allowed
    /// characters.
    BucketNameInvalid(String),
    /// The satellite rejected the operation because the bucket already exists.
    BucketAlreadyExists(String),
    /// The satellite rejected the operation because the bucket still contains some objects.
    BucketNotEmpty(String),
    /// The satellite rejected the operation because the bucket doesn't exist.
    BucketNotFound(String),
    /// The satellite rejected the operation because the object's key contains non-allowed
    /// characters.
    ObjectKeyInvalid(String),
    /// The satellite rejected the operation because it doesn't exist an object in the specified
    /// bucket and key.
    ObjectNotFound(String),
    /// The operation was rejected because the specified upload was already committed or aborted.
    UploadDone(String),
    /// Unknown isn't returned by this crate. It's used by transports that cannot map an error to
    /// any of the other variants.
    Unknown(String),
}

impl fmt::Display for Uplink {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let (code, details) = match self {
            Self::Internal(msg) => ("internal", msg),
            Self::Canceled(msg) => ("canceled", msg),
            Self::DialFailed(msg) => ("dial failed", msg),
            Self::TooManyRequests(msg) => ("too many requests", msg),
            Self::PermissionDenied(msg) => ("permission denied", msg),
            Self::AuthorizationExpired(msg) => ("authorization expired", msg),
            Self::BucketNameInvalid(msg) => ("bucket name invalid", msg),
            Self::BucketAlreadyExists(msg) => ("bucket already exists", msg),
            Self::BucketNotEmpty(msg) => ("bucket not empty", msg),
            Self::BucketNotFound(msg) => ("bucket not found", msg),
            Self::ObjectKeyInvalid(msg) => ("object key invalid", msg),
            Self::ObjectNotFound(msg) => ("object not found", msg),
            Self::UploadDone(msg) => ("upload done", msg),
            Self::Unknown(msg) => ("unknown", msg),
        };

        write!(f, r#"code: "{}", details: "{}""#, code, details)
    }
}

impl stderr::Error for Uplink {}

/// Recovers the error that an [`Upload`](crate::object::Upload) or a
/// [`Download`](crate::object::Download) returned through the `std::io` traits; any other I/O
/// error is converted to an [`Error::Internal`].
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<Error>() {
                Ok(err) => *err,
                Err(inner) => Error::new_internal("I/O operation", inner),
            },
            None => Error::new_internal_without_inner(&format!("I/O operation: {}", kind)),
        }
    }
}

/// Represents an error that happen because of the violation of an internal assumption.
///
/// An assumption can be violated by the use of a function that returns an error when it should
/// never return it or because it's validated explicitly by the implementation.
///
/// An assumption example is: the encrypted metadata returned by the satellite must always be
/// decryptable with the key that the access grant derives for the object.
#[derive(Debug)]
pub struct Internal {
    /// A human friendly message to provide context of the error.
    pub ctx_msg: String,
    /// The inner error that caused this internal error.
    inner: Option<BoxError>,
}

impl fmt::Display for Internal {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match &self.inner {
            Some(inner) => write!(f, "{}: {}", self.ctx_msg, inner),
            None => write!(f, "{}", self.ctx_msg),
        }
    }
}

impl stderr::Error for Internal {
    fn source(&self) -> Option<&(dyn stderr::Error + 'static)> {
        self.inner
            .as_ref()
            .map(|err| err.as_ref() as &(dyn stderr::Error + 'static))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::new_invalid_arguments("bucket", "cannot be empty");
        assert_eq!(
            err.to_string(),
            "bucket arguments have invalid values. cannot be empty",
            "invalid arguments"
        );

        let err = Error::new_uplink(Uplink::UploadDone(String::from("already committed")));
        assert_eq!(
            err.to_string(),
            r#"code: "upload done", details: "already committed""#,
            "uplink"
        );
        assert!(err.is_upload_done(), "is upload done");
        assert!(!err.is_permission_denied(), "is permission denied");

        let err = Error::InvalidTimeWindow {
            not_before: Duration::from_secs(10),
            not_after: Duration::from_secs(5),
        };
        assert_eq!(
            err.to_string(),
            "invalid time window: not before (10s) is after not after (5s)",
            "invalid time window"
        );
    }

    #[test]
    fn test_internal_source() {
        use std::error::Error as _;

        let inner = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::new_internal("decoding satellite response", inner.into());
        assert_eq!(err.to_string(), "decoding satellite response: boom");
        assert!(err.source().is_some(), "internal error has source");

        let err = Error::new_internal_without_inner("no source");
        assert!(err.source().is_none(), "internal error without source");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other(Error::new_uplink(Uplink::PermissionDenied(
            String::from("no write permission"),
        )));
        assert!(
            Error::from(io_err).is_permission_denied(),
            "uplink error through an I/O error"
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        if let Error::Internal(Internal { ctx_msg, .. }) = Error::from(io_err) {
            assert_eq!(ctx_msg, "I/O operation", "context message");
        } else {
            panic!("expected an internal error");
        }
    }
}
