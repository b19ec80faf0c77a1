//! Numeric error-code model shared across the upload protocol.
//!
//! Transport and store errors carry an HTTP-flavored numeric code. The
//! uploader's retry loop treats two codes as non-retryable and aborts
//! immediately on them; every other failure is retried up to the
//! configured ceiling.

/// Bad request - malformed record or chunk. Never retried.
pub const CODE_BAD_REQUEST: u16 = 400;

/// Referenced file id is unknown. Never retried.
pub const CODE_NOT_FOUND: u16 = 404;

/// Generic server-side failure. Retryable.
pub const CODE_INTERNAL: u16 = 500;

/// Classification helpers for numeric protocol error codes.
pub trait ErrorCode {
    /// The numeric code attached to this error.
    fn code(&self) -> u16;

    /// Whether the uploader may retry the failed operation.
    ///
    /// Bad requests and unknown file ids are permanent failures; a retry
    /// would fail identically, so the session aborts instead.
    fn is_retryable(&self) -> bool {
        !matches!(self.code(), CODE_BAD_REQUEST | CODE_NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Code(u16);

    impl ErrorCode for Code {
        fn code(&self) -> u16 {
            self.0
        }
    }

    #[test]
    fn bad_request_and_not_found_are_permanent() {
        assert!(!Code(CODE_BAD_REQUEST).is_retryable());
        assert!(!Code(CODE_NOT_FOUND).is_retryable());
    }

    #[test]
    fn other_codes_are_retryable() {
        assert!(Code(CODE_INTERNAL).is_retryable());
        assert!(Code(503).is_retryable());
        assert!(Code(0).is_retryable());
    }
}
