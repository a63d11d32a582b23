//! Ordered token providers queried before each request.
//!
//! The client resolves a bearer token by walking a [`TokenSourceChain`] in priority order and
//! taking the first non-empty value. The default chain keeps older storage layouts readable:
//! the live session first, then the flat `memberToken` and `token` keys, then the
//! `state.accessToken` field of the persisted session document.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::TokenSourceSpec,
	obs,
	session::SessionStore,
	store::KeyValueStore,
};

/// Boxed future returned by [`TokenSource::resolve`].
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<TokenSecret>>> + 'a + Send>>;

/// A named location that may hold a bearer token.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Stable label used in logs.
	fn name(&self) -> &str;

	/// Returns the token held by this source, or `None` when it is absent or blank.
	fn resolve(&self) -> SourceFuture<'_>;
}

/// Reads the access token of the in-memory session.
#[derive(Clone, Debug)]
pub struct SessionTokenSource(pub Arc<SessionStore>);
impl TokenSource for SessionTokenSource {
	fn name(&self) -> &str {
		"session"
	}

	fn resolve(&self) -> SourceFuture<'_> {
		Box::pin(async move {
			Ok(self.0.access_token().and_then(|token| TokenSecret::non_empty(token.expose())))
		})
	}
}

/// Reads a raw token stored under a flat key.
#[derive(Clone)]
pub struct StorageKeySource {
	store: Arc<dyn KeyValueStore>,
	key: String,
}
impl StorageKeySource {
	/// Creates a source reading `key` from `store`.
	pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
		Self { store, key: key.into() }
	}
}
impl TokenSource for StorageKeySource {
	fn name(&self) -> &str {
		&self.key
	}

	fn resolve(&self) -> SourceFuture<'_> {
		Box::pin(async move {
			let raw = self.store.get(&self.key).await?;

			Ok(raw.and_then(TokenSecret::non_empty))
		})
	}
}

/// Reads a string field out of a JSON document stored under a key.
///
/// `pointer` uses JSON Pointer syntax, e.g. `/state/accessToken`. An unparsable document is
/// treated as holding no token.
#[derive(Clone)]
pub struct PersistedFieldSource {
	store: Arc<dyn KeyValueStore>,
	key: String,
	pointer: String,
	label: String,
}
impl PersistedFieldSource {
	/// Creates a source reading `pointer` inside the document stored at `key`.
	pub fn new(
		store: Arc<dyn KeyValueStore>,
		key: impl Into<String>,
		pointer: impl Into<String>,
	) -> Self {
		let key = key.into();
		let pointer = pointer.into();
		let label = format!("{key}#{pointer}");

		Self { store, key, pointer, label }
	}
}
impl TokenSource for PersistedFieldSource {
	fn name(&self) -> &str {
		&self.label
	}

	fn resolve(&self) -> SourceFuture<'_> {
		Box::pin(async move {
			let Some(raw) = self.store.get(&self.key).await? else {
				return Ok(None);
			};
			let document = match serde_json::from_str::<Value>(&raw) {
				Ok(document) => document,
				Err(e) => {
					obs::unreadable_document(&self.key, &e);

					return Ok(None);
				},
			};

			Ok(document.pointer(&self.pointer).and_then(Value::as_str).and_then(TokenSecret::non_empty))
		})
	}
}

/// Combines a selector key and a token key into `selector:token`.
#[derive(Clone)]
pub struct SelectorTokenSource {
	store: Arc<dyn KeyValueStore>,
	selector_key: String,
	token_key: String,
	label: String,
}
impl SelectorTokenSource {
	/// Creates a source that yields a token only when both keys hold values.
	pub fn new(
		store: Arc<dyn KeyValueStore>,
		selector_key: impl Into<String>,
		token_key: impl Into<String>,
	) -> Self {
		let selector_key = selector_key.into();
		let token_key = token_key.into();
		let label = format!("{selector_key}:{token_key}");

		Self { store, selector_key, token_key, label }
	}
}
impl TokenSource for SelectorTokenSource {
	fn name(&self) -> &str {
		&self.label
	}

	fn resolve(&self) -> SourceFuture<'_> {
		Box::pin(async move {
			let selector = self.store.get(&self.selector_key).await?.and_then(TokenSecret::non_empty);
			let token = self.store.get(&self.token_key).await?.and_then(TokenSecret::non_empty);

			Ok(match (selector, token) {
				(Some(selector), Some(token)) =>
					Some(TokenSecret::new(format!("{}:{}", selector.expose(), token.expose()))),
				_ => None,
			})
		})
	}
}

/// Token picked by a [`TokenSourceChain`] together with the source that supplied it.
#[derive(Clone, Debug)]
pub struct ResolvedToken {
	/// Name of the winning source.
	pub source: String,
	/// Token value.
	pub token: TokenSecret,
}

/// Priority-ordered list of token sources.
#[derive(Clone, Default)]
pub struct TokenSourceChain(Vec<Arc<dyn TokenSource>>);
impl TokenSourceChain {
	/// Builds the chain described by `specs`, reading storage through the session's backend.
	pub fn from_specs(specs: &[TokenSourceSpec], session: &Arc<SessionStore>) -> Self {
		let store = session.storage();

		specs.iter().fold(Self::default(), |chain, spec| match spec {
			TokenSourceSpec::Session => chain.push(SessionTokenSource(Arc::clone(session))),
			TokenSourceSpec::StorageKey { key } =>
				chain.push(StorageKeySource::new(Arc::clone(&store), key.clone())),
			TokenSourceSpec::PersistedField { key, pointer } => chain.push(
				PersistedFieldSource::new(Arc::clone(&store), key.clone(), pointer.clone()),
			),
			TokenSourceSpec::Selector { selector_key, token_key } => chain.push(
				SelectorTokenSource::new(Arc::clone(&store), selector_key.clone(), token_key.clone()),
			),
		})
	}

	/// Appends a source with the lowest priority so far.
	pub fn push(mut self, source: impl TokenSource + 'static) -> Self {
		self.0.push(Arc::new(source));

		self
	}

	/// Names of the configured sources, in priority order.
	pub fn names(&self) -> Vec<&str> {
		self.0.iter().map(|source| source.name()).collect()
	}

	/// Returns the first non-empty token, querying sources in priority order.
	pub async fn resolve(&self) -> Result<Option<ResolvedToken>> {
		for source in &self.0 {
			if let Some(token) = source.resolve().await? {
				return Ok(Some(ResolvedToken { source: source.name().to_owned(), token }));
			}
		}

		Ok(None)
	}
}
impl Debug for TokenSourceChain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSourceChain").field(&self.names()).finish()
	}
}
