//! Mapping of backend connect error tokens to user-facing categories.

use std::fmt;

/// What the user can do about a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    ClientAccess,
    InvalidCredentials,
    ConnectionRefused,
    ConnectionTimeout,
    DnsResolution,
    BucketSpecifiedInEndpoint,
    Unknown,
    ApiUnreachable,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::ClientAccess => "client access",
            ErrorCategory::InvalidCredentials => "invalid credentials",
            ErrorCategory::ConnectionRefused => "connection refused",
            ErrorCategory::ConnectionTimeout => "connection timeout",
            ErrorCategory::DnsResolution => "DNS resolution",
            ErrorCategory::BucketSpecifiedInEndpoint => "bucket specified in endpoint",
            ErrorCategory::Unknown => "unknown",
            ErrorCategory::ApiUnreachable => "API unreachable",
        };
        f.write_str(name)
    }
}

/// Error token as sent by the backend in a failed connect reply.
///
/// Tokens the backend is known to emit get their own variant, so that
/// [`ErrorToken::category`] has to be updated when a new one is added.
/// Anything else is kept verbatim in [`ErrorToken::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorToken {
    ClientError,
    AccessError,
    ConnectionError,
    EndpointConnectionError,
    EndpointResolutionError,
    BucketError,
    UnknownError,
    ApiError,
    Unrecognized(String),
}

impl ErrorToken {
    pub fn parse(token: &str) -> Self {
        match token {
            "ClientError" => ErrorToken::ClientError,
            "AccessError" => ErrorToken::AccessError,
            "ConnectionError" => ErrorToken::ConnectionError,
            "EndpointConnectionError" => ErrorToken::EndpointConnectionError,
            "EndpointResolutionError" => ErrorToken::EndpointResolutionError,
            "BucketError" => ErrorToken::BucketError,
            "UnknownError" => ErrorToken::UnknownError,
            "APIError" => ErrorToken::ApiError,
            other => ErrorToken::Unrecognized(other.to_string()),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorToken::ClientError => ErrorCategory::ClientAccess,
            ErrorToken::AccessError => ErrorCategory::InvalidCredentials,
            ErrorToken::ConnectionError => ErrorCategory::ConnectionRefused,
            ErrorToken::EndpointConnectionError => ErrorCategory::ConnectionTimeout,
            ErrorToken::EndpointResolutionError => ErrorCategory::DnsResolution,
            ErrorToken::BucketError => ErrorCategory::BucketSpecifiedInEndpoint,
            ErrorToken::UnknownError => ErrorCategory::Unknown,
            ErrorToken::ApiError => ErrorCategory::ApiUnreachable,
            ErrorToken::Unrecognized(_) => ErrorCategory::Unknown,
        }
    }

    /// User-facing message for a failed connection to `endpoint`.
    pub fn describe(&self, endpoint: &str) -> String {
        let prefix = match self {
            ErrorToken::ClientError => "Client access error for ",
            ErrorToken::AccessError => "Invalid access or secret key for ",
            ErrorToken::ConnectionError => "Is the port open ? Failed to connect to ",
            ErrorToken::EndpointConnectionError => "Failed to connect to ",
            ErrorToken::EndpointResolutionError => "Failed to resolve endpoint for ",
            ErrorToken::BucketError => "Bucket name should not be specified in the URI for ",
            ErrorToken::UnknownError => "Unknown error occurred when trying to connect to ",
            ErrorToken::ApiError => "Error connecting to the API to create the connection for ",
            ErrorToken::Unrecognized(_) => "Failed to connect to ",
        };
        format!("{}{}", prefix, endpoint)
    }
}

pub fn classify(token: &str) -> ErrorCategory {
    ErrorToken::parse(token).category()
}

/// Result of classifying a failed connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub category: ErrorCategory,
    pub message: String,
}

/// Classifies a structured error reply carrying `token`.
pub fn classify_reply(token: &str, endpoint: &str) -> Classified {
    let token = ErrorToken::parse(token);
    Classified {
        category: token.category(),
        message: token.describe(endpoint),
    }
}

/// Classifies a connect call that never produced a structured reply.
pub fn classify_unreachable(endpoint: &str) -> Classified {
    Classified {
        category: ErrorCategory::ApiUnreachable,
        message: ErrorToken::ApiError.describe(endpoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_map_to_their_category() {
        let cases = [
            ("ClientError", ErrorCategory::ClientAccess),
            ("AccessError", ErrorCategory::InvalidCredentials),
            ("ConnectionError", ErrorCategory::ConnectionRefused),
            ("EndpointConnectionError", ErrorCategory::ConnectionTimeout),
            ("EndpointResolutionError", ErrorCategory::DnsResolution),
            ("BucketError", ErrorCategory::BucketSpecifiedInEndpoint),
            ("UnknownError", ErrorCategory::Unknown),
            ("APIError", ErrorCategory::ApiUnreachable),
        ];
        for (token, expected) in cases {
            assert_eq!(classify(token), expected, "token {}", token);
        }
    }

    #[test]
    fn unrecognized_token_is_unknown_with_generic_message() {
        let classified = classify_reply("SlowDown", "http://minio:9000");
        assert_eq!(classified.category, ErrorCategory::Unknown);
        assert_eq!(classified.message, "Failed to connect to http://minio:9000");
    }

    #[test]
    fn access_error_message_names_endpoint() {
        let classified = classify_reply("AccessError", "http://minio:9000");
        assert_eq!(classified.category, ErrorCategory::InvalidCredentials);
        assert_eq!(
            classified.message,
            "Invalid access or secret key for http://minio:9000"
        );
    }

    #[test]
    fn token_matching_is_case_sensitive() {
        assert_eq!(classify("accesserror"), ErrorCategory::Unknown);
        assert_eq!(classify(""), ErrorCategory::Unknown);
    }

    #[test]
    fn unreachable_backend_is_its_own_category() {
        let classified = classify_unreachable("http://minio:9000");
        assert_eq!(classified.category, ErrorCategory::ApiUnreachable);
        assert!(classified.message.ends_with("http://minio:9000"));
    }
}
