//! Thread-safe in-memory [`KeyValueStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Storage backend that keeps entries in-process; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Creates a store pre-seeded with `entries`.
	pub fn with_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns `true` when `key` holds a value.
	pub fn contains_key(&self, key: &str) -> bool {
		self.0.read().contains_key(key)
	}
}
impl KeyValueStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}
}
