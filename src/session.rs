//! Member session state, its persisted form, and the store that owns both.
//!
//! [`SessionStore`] is constructed explicitly from durable storage at startup and mutated only
//! through its named operations. Every mutation writes the snapshot back under the namespaced
//! session key as `{"state": {...}, "version": 0}`, the layout older frontends read
//! `state.accessToken` from.

// crates.io
use serde::{Deserializer, de::Error as _};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::StorageKeys,
	obs,
	store::{KeyValueStore, StoreError},
};

/// Free-form member profile as returned by the backend.
pub type UserProfile = Map<String, Value>;

const PERSIST_VERSION: u32 = 0;

/// Persisted subset of the member session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Session {
	/// Member profile, if known.
	pub user: Option<UserProfile>,
	/// Short-lived credential for normal requests.
	pub access_token: Option<TokenSecret>,
	/// Long-lived credential used to mint new access tokens.
	pub refresh_token: Option<TokenSecret>,
	/// Whether a login or registration established this session.
	pub is_authenticated: bool,
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
	state: Session,
	#[serde(default)]
	version: u32,
}

/// Session grant returned by the login and register endpoints.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
	/// Member profile.
	#[serde(default)]
	pub user: Option<UserProfile>,
	/// Access token; blank values are rejected.
	#[serde(deserialize_with = "non_blank_secret")]
	pub access_token: TokenSecret,
	/// Refresh token, when the backend issues one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}

/// Payload returned by the refresh endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
	/// Replacement access token; blank values are rejected.
	#[serde(deserialize_with = "non_blank_secret")]
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the backend rotates.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}

/// Process-wide owner of the member session.
pub struct SessionStore {
	state: RwLock<Session>,
	last_error: RwLock<Option<String>>,
	storage: Arc<dyn KeyValueStore>,
	keys: StorageKeys,
	write_order: AsyncMutex<()>,
}
impl SessionStore {
	/// Loads the persisted session from `storage`, starting empty when none is stored.
	///
	/// A document that cannot be parsed is discarded rather than treated as fatal.
	pub async fn load(storage: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Result<Self> {
		let state = match storage.get(&keys.session).await? {
			Some(raw) => match serde_json::from_str::<PersistedSession>(&raw) {
				Ok(persisted) => persisted.state,
				Err(e) => {
					obs::unreadable_document(&keys.session, &e);

					Session::default()
				},
			},
			None => Session::default(),
		};

		Ok(Self {
			state: RwLock::new(state),
			last_error: RwLock::new(None),
			storage,
			keys,
			write_order: AsyncMutex::new(()),
		})
	}

	/// Returns a copy of the current session.
	pub fn snapshot(&self) -> Session {
		self.state.read().clone()
	}

	/// Current access token.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.state.read().access_token.clone()
	}

	/// Current refresh token.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.state.read().refresh_token.clone()
	}

	/// Current member profile.
	pub fn user(&self) -> Option<UserProfile> {
		self.state.read().user.clone()
	}

	/// Whether the member is logged in.
	pub fn is_authenticated(&self) -> bool {
		self.state.read().is_authenticated
	}

	/// Message recorded by the last failed login or registration.
	pub fn last_error(&self) -> Option<String> {
		self.last_error.read().clone()
	}

	/// Forgets the last recorded error.
	pub fn clear_error(&self) {
		*self.last_error.write() = None;
	}

	/// Storage backend shared with the token sources.
	pub fn storage(&self) -> Arc<dyn KeyValueStore> {
		Arc::clone(&self.storage)
	}

	/// Storage keys owned by this session.
	pub fn keys(&self) -> &StorageKeys {
		&self.keys
	}

	/// Replaces the session with a freshly issued grant.
	pub async fn establish(&self, grant: AuthGrant) -> Result<()> {
		self.clear_error();
		self.mutate(|state| {
			*state = Session {
				user: grant.user,
				access_token: Some(grant.access_token),
				refresh_token: grant.refresh_token,
				is_authenticated: true,
			};
		})
		.await
	}

	/// Stores a refreshed access token, rotating the refresh token when one is supplied.
	pub async fn apply_refresh(
		&self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
	) -> Result<()> {
		self.mutate(|state| {
			state.access_token = Some(access_token);

			if let Some(refresh_token) =
				refresh_token.and_then(|token| TokenSecret::non_empty(token.expose()))
			{
				state.refresh_token = Some(refresh_token);
			}
		})
		.await
	}

	/// Shallow-merges `partial` into the stored profile; does nothing without a profile.
	pub async fn update_user(&self, partial: UserProfile) -> Result<()> {
		self.mutate(|state| {
			if let Some(user) = state.user.as_mut() {
				user.extend(partial);
			}
		})
		.await
	}

	/// Shallow-merges a freshly fetched profile, creating one when none is stored.
	pub async fn merge_profile(&self, profile: UserProfile) -> Result<()> {
		self.mutate(|state| state.user.get_or_insert_with(Map::new).extend(profile)).await
	}

	/// Clears the session and removes every legacy token key.
	pub async fn clear(&self) -> Result<()> {
		self.clear_error();
		self.mutate(|state| *state = Session::default()).await?;

		for key in &self.keys.legacy {
			self.storage.remove(key).await?;
		}

		Ok(())
	}

	pub(crate) fn record_error(&self, message: impl Into<String>) {
		*self.last_error.write() = Some(message.into());
	}

	async fn mutate<F>(&self, apply: F) -> Result<()>
	where
		F: FnOnce(&mut Session),
	{
		let _ordered = self.write_order.lock().await;
		let snapshot = {
			let mut state = self.state.write();

			apply(&mut state);

			state.clone()
		};
		let persisted = PersistedSession { state: snapshot, version: PERSIST_VERSION };
		let encoded = serde_json::to_string(&persisted).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize session: {e}"),
		})?;

		self.storage.set(&self.keys.session, encoded).await?;

		Ok(())
	}
}
fn non_blank_secret<'de, D>(deserializer: D) -> Result<TokenSecret, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	TokenSecret::non_empty(raw).ok_or_else(|| D::Error::custom("access token must not be blank"))
}

impl Debug for SessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionStore")
			.field("state", &*self.state.read())
			.field("keys", &self.keys)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn profile(value: Value) -> UserProfile {
		match value {
			Value::Object(map) => map,
			other => panic!("Profile fixture must be an object, got {other}."),
		}
	}

	async fn open(store: &MemoryStore) -> SessionStore {
		SessionStore::load(Arc::new(store.clone()), StorageKeys::default())
			.await
			.expect("Session should load from memory storage.")
	}

	fn grant() -> AuthGrant {
		AuthGrant {
			user: Some(profile(json!({"username": "somchai", "credit": 100}))),
			access_token: TokenSecret::new("access-1"),
			refresh_token: Some(TokenSecret::new("refresh-1")),
		}
	}

	#[tokio::test]
	async fn establish_persists_the_envelope() {
		let store = MemoryStore::default();
		let session = open(&store).await;

		session.establish(grant()).await.expect("Establishing a session should succeed.");

		let raw = store
			.get("auth-storage")
			.await
			.expect("Reading the session document should succeed.")
			.expect("Session document should be written.");
		let document: Value = serde_json::from_str(&raw).expect("Session document should be JSON.");

		assert_eq!(document["state"]["accessToken"], "access-1");
		assert_eq!(document["state"]["refreshToken"], "refresh-1");
		assert_eq!(document["state"]["isAuthenticated"], true);
		assert_eq!(document["state"]["user"]["username"], "somchai");
		assert_eq!(document["version"], 0);
	}

	#[tokio::test]
	async fn persisted_session_is_restored() {
		let store = MemoryStore::default();

		open(&store).await.establish(grant()).await.expect("Establishing a session should succeed.");

		let restored = open(&store).await;

		assert!(restored.is_authenticated());
		assert_eq!(restored.access_token().as_ref().map(TokenSecret::expose), Some("access-1"));
		assert_eq!(restored.refresh_token().as_ref().map(TokenSecret::expose), Some("refresh-1"));
	}

	#[tokio::test]
	async fn unreadable_document_starts_empty() {
		let store = MemoryStore::with_entries([("auth-storage", "{]")]);
		let session = open(&store).await;

		assert_eq!(session.snapshot(), Session::default());
	}

	#[tokio::test]
	async fn clear_removes_legacy_keys() {
		let store = MemoryStore::with_entries([
			("memberToken", "legacy"),
			("token", "generic"),
			("user", "{}"),
			("member-storage", "{}"),
			("memberSelector", "sel"),
			("theme", "dark"),
		]);
		let session = open(&store).await;

		session.establish(grant()).await.expect("Establishing a session should succeed.");
		session.record_error("stale");
		session.clear().await.expect("Clearing the session should succeed.");

		assert_eq!(session.snapshot(), Session::default());
		assert_eq!(session.last_error(), None);

		for key in ["memberToken", "token", "user", "member-storage", "memberSelector"] {
			assert!(!store.contains_key(key), "Legacy key {key} should be removed.");
		}

		assert!(store.contains_key("theme"));

		let raw = store
			.get("auth-storage")
			.await
			.expect("Reading the session document should succeed.")
			.expect("Cleared session should still be written.");
		let document: Value = serde_json::from_str(&raw).expect("Session document should be JSON.");

		assert_eq!(document["state"]["accessToken"], Value::Null);
	}

	#[tokio::test]
	async fn refresh_keeps_refresh_token_unless_rotated() {
		let store = MemoryStore::default();
		let session = open(&store).await;

		session.establish(grant()).await.expect("Establishing a session should succeed.");
		session
			.apply_refresh(TokenSecret::new("access-2"), None)
			.await
			.expect("Applying a refresh should succeed.");

		assert_eq!(session.access_token().as_ref().map(TokenSecret::expose), Some("access-2"));
		assert_eq!(session.refresh_token().as_ref().map(TokenSecret::expose), Some("refresh-1"));

		session
			.apply_refresh(TokenSecret::new("access-3"), Some(TokenSecret::new("refresh-2")))
			.await
			.expect("Applying a rotating refresh should succeed.");

		assert_eq!(session.refresh_token().as_ref().map(TokenSecret::expose), Some("refresh-2"));
	}

	#[test]
	fn grants_reject_blank_access_tokens() {
		assert!(serde_json::from_str::<AuthGrant>(r#"{"accessToken":""}"#).is_err());
		assert!(serde_json::from_str::<RefreshGrant>(r#"{"accessToken":"   "}"#).is_err());

		let grant = serde_json::from_str::<RefreshGrant>(r#"{"accessToken":" fresh "}"#)
			.expect("Padded token should decode.");

		assert_eq!(grant.access_token.expose(), "fresh");
	}

	#[tokio::test]
	async fn blank_rotated_refresh_token_is_ignored() {
		let store = MemoryStore::default();
		let session = open(&store).await;

		session.establish(grant()).await.expect("Establishing a session should succeed.");
		session
			.apply_refresh(TokenSecret::new("access-2"), Some(TokenSecret::new(" ")))
			.await
			.expect("Applying a refresh should succeed.");

		assert_eq!(session.refresh_token().as_ref().map(TokenSecret::expose), Some("refresh-1"));
	}

	#[tokio::test]
	async fn update_user_merges_only_existing_profiles() {
		let store = MemoryStore::default();
		let session = open(&store).await;

		session
			.update_user(profile(json!({"credit": 5})))
			.await
			.expect("Updating without a profile should succeed.");

		assert_eq!(session.user(), None);

		session.establish(grant()).await.expect("Establishing a session should succeed.");
		session
			.update_user(profile(json!({"credit": 250, "level": "gold"})))
			.await
			.expect("Updating the profile should succeed.");

		let user = session.user().expect("Profile should exist after login.");

		assert_eq!(user["username"], "somchai");
		assert_eq!(user["credit"], 250);
		assert_eq!(user["level"], "gold");
	}
}
