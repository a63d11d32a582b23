//! Durable key/value storage contracts and built-in backends for persisted sessions.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Client-side key/value persistence holding the serialized session and legacy token keys.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes `key`; removing a missing key is not an error.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or the session codec.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("disk full"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
