//! Client-level error types shared across the transport, session, and recovery layers.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body did not match the expected JSON shape.
	#[error("Response body could not be decoded (status {status}).")]
	Decode {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status of the response that failed to decode.
		status: u16,
	},

	/// The backend rejected the access token with a 401.
	#[error("Access token was rejected: {}.", describe(.message))]
	AuthExpired {
		/// Backend-provided message, when present.
		message: Option<String>,
	},
	/// Token refresh failed, so the session was torn down.
	#[error("Session could not be recovered: {reason}.")]
	AuthInvalid {
		/// Human-readable reason for the failed recovery.
		reason: String,
		/// HTTP status of the refresh call, when one was made.
		status: Option<u16>,
		/// Underlying refresh failure, when one exists.
		#[source]
		source: Option<Box<Error>>,
	},
	/// The backend answered with a 4xx other than 401.
	#[error("Request was rejected with status {status}: {}.", describe(.message))]
	Client {
		/// HTTP status code.
		status: u16,
		/// Backend-provided message, when present.
		message: Option<String>,
	},
	/// The backend answered with a 5xx.
	#[error("Server failed with status {status}: {}.", describe(.message))]
	Server {
		/// HTTP status code.
		status: u16,
		/// Backend-provided message, when present.
		message: Option<String>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl Error {
	/// Returns the coarse category used by notification and recovery policies.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Storage(_) => ErrorKind::Storage,
			Self::Config(_) => ErrorKind::Config,
			Self::Transport(_) => ErrorKind::Network,
			Self::Decode { .. } => ErrorKind::Decode,
			Self::AuthExpired { .. } => ErrorKind::AuthExpired,
			Self::AuthInvalid { .. } => ErrorKind::AuthInvalid,
			Self::Client { .. } => ErrorKind::Client,
			Self::Server { .. } => ErrorKind::Server,
		}
	}

	/// Returns the HTTP status tied to the failure, if a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthExpired { .. } => Some(401),
			Self::AuthInvalid { status, .. } => *status,
			Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
			Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns the backend-provided message, if the response carried one.
	pub fn message(&self) -> Option<&str> {
		match self {
			Self::AuthExpired { message }
			| Self::Client { message, .. }
			| Self::Server { message, .. } => message.as_deref(),
			Self::AuthInvalid { source: Some(source), .. } => source.message(),
			_ => None,
		}
	}
}

/// Coarse error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// No response was received.
	Network,
	/// 401 that may be recoverable through a refresh.
	AuthExpired,
	/// Refresh failed; the session was cleared.
	AuthInvalid,
	/// 4xx other than 401.
	Client,
	/// 5xx.
	Server,
	/// Malformed response body.
	Decode,
	/// Local configuration failure.
	Config,
	/// Durable storage failure.
	Storage,
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// API origin cannot be parsed.
	#[error("API URL is invalid.")]
	InvalidApiUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// API origin uses a scheme other than http or https.
	#[error("API URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// Base path or endpoint path does not start with `/`.
	#[error("Path `{path}` must start with `/`.")]
	RelativePath {
		/// Offending path.
		path: String,
	},
	/// Resolved endpoint URL cannot be parsed.
	#[error("Endpoint URL for `{path}` is invalid.")]
	InvalidEndpoint {
		/// Request path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
	/// Token source chain is empty.
	#[error("At least one token source must be configured.")]
	NoTokenSources,
	/// Environment variable holds an unusable value.
	#[error("Environment variable {var} has an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		var: &'static str,
		/// Raw value.
		value: String,
	},
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (no HTTP response was received).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

fn describe(message: &Option<String>) -> &str {
	message.as_deref().unwrap_or("no message")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_and_message_follow_the_variant() {
		let err = Error::Client { status: 404, message: Some("Not found".into()) };

		assert_eq!(err.kind(), ErrorKind::Client);
		assert_eq!(err.status(), Some(404));
		assert_eq!(err.message(), Some("Not found"));
		assert_eq!(err.to_string(), "Request was rejected with status 404: Not found.");

		let err = Error::AuthExpired { message: None };

		assert_eq!(err.status(), Some(401));
		assert_eq!(err.to_string(), "Access token was rejected: no message.");
	}

	#[test]
	fn auth_invalid_exposes_refresh_failure() {
		let refresh = Error::Client { status: 400, message: Some("Refresh token expired".into()) };
		let err = Error::AuthInvalid {
			reason: "refresh rejected".into(),
			status: Some(400),
			source: Some(Box::new(refresh)),
		};

		assert_eq!(err.kind(), ErrorKind::AuthInvalid);
		assert_eq!(err.status(), Some(400));
		assert_eq!(err.message(), Some("Refresh token expired"));

		let source =
			StdError::source(&err).expect("AuthInvalid should expose the refresh failure.");

		assert!(source.to_string().contains("Refresh token expired"));
	}

	#[test]
	fn transport_errors_carry_no_status() {
		let err: Error = TransportError::Io(std::io::Error::other("reset")).into();

		assert_eq!(err.kind(), ErrorKind::Network);
		assert_eq!(err.status(), None);
		assert_eq!(err.message(), None);
	}
}
