//! Client configuration: API location, endpoint paths, storage keys, token-source order, and
//! notification policy.

// std
use std::{env, time::Duration as StdDuration};
// self
use crate::{_prelude::*, error::ConfigError};

/// Default API origin.
pub const DEFAULT_API_URL: &str = "http://localhost:3001";
/// Default versioned base path appended to the API origin.
pub const DEFAULT_BASE_PATH: &str = "/api/v1";
/// Default request timeout.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Environment variable overriding the API origin.
pub const ENV_API_URL: &str = "MEMBER_API_URL";
/// Environment variable overriding the base path.
pub const ENV_BASE_PATH: &str = "MEMBER_API_BASE_PATH";
/// Environment variable overriding the timeout, in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "MEMBER_API_TIMEOUT_SECS";

/// Reaction to a 401 on a request that is still eligible for recovery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnauthorizedPolicy {
	/// Refresh the access token once and replay the request.
	#[default]
	RefreshAndRetry,
	/// Skip refresh: clear the session and send the user to the login path.
	ForceRelogin,
}

/// Backend paths for the session endpoints, relative to the base path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// `POST` credentials, returns a session grant.
	pub login: String,
	/// `POST` registration data, returns a session grant.
	pub register: String,
	/// `POST` to invalidate the session server-side.
	pub logout: String,
	/// `POST` a refresh token, returns a new access token.
	pub refresh: String,
	/// `GET` the current member profile.
	pub profile: String,
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			login: "/login".into(),
			register: "/register".into(),
			logout: "/logout".into(),
			refresh: "/token/refresh".into(),
			profile: "/profile".into(),
		}
	}
}

/// Storage keys owned by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
	/// Namespaced key holding the persisted session document.
	pub session: String,
	/// Legacy keys removed on logout.
	pub legacy: Vec<String>,
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self {
			session: "auth-storage".into(),
			legacy: ["memberToken", "token", "user", "member-storage", "memberSelector"]
				.into_iter()
				.map(String::from)
				.collect(),
		}
	}
}

/// Declarative description of a token source; see [`crate::auth::TokenSourceChain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenSourceSpec {
	/// Access token of the in-memory session.
	Session,
	/// Raw token stored under a flat key.
	StorageKey {
		/// Storage key.
		key: String,
	},
	/// String field inside a JSON document stored under a key.
	PersistedField {
		/// Storage key.
		key: String,
		/// JSON Pointer to the field.
		pointer: String,
	},
	/// `selector:token` pair read from two keys.
	Selector {
		/// Key holding the selector.
		selector_key: String,
		/// Key holding the token.
		token_key: String,
	},
}
impl TokenSourceSpec {
	/// Session, `memberToken`, `token`, then `auth-storage` `state.accessToken`.
	pub fn defaults() -> Vec<Self> {
		vec![
			Self::Session,
			Self::StorageKey { key: "memberToken".into() },
			Self::StorageKey { key: "token".into() },
			Self::PersistedField { key: "auth-storage".into(), pointer: "/state/accessToken".into() },
		]
	}
}

/// User-facing notice texts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Messages {
	/// Shown when a failure carries no backend message.
	pub fallback: String,
	/// Shown when the session could not be recovered.
	pub relogin: String,
	/// Stored as the last error when login fails without a backend message.
	pub login_failed: String,
	/// Stored as the last error when registration fails without a backend message.
	pub register_failed: String,
}
impl Default for Messages {
	fn default() -> Self {
		Self {
			fallback: "Something went wrong. Please try again.".into(),
			relogin: "Please log in again.".into(),
			login_failed: "Login failed.".into(),
			register_failed: "Registration failed.".into(),
		}
	}
}

/// Validated client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// API origin without a trailing slash, e.g. `https://api.example.com`.
	pub api_url: String,
	/// Versioned base path prefixed to every request path.
	pub base_path: String,
	/// Per-request timeout.
	pub timeout: StdDuration,
	/// Statuses that never produce a notification.
	pub silent_statuses: BTreeSet<u16>,
	/// Reaction to recoverable 401s.
	pub unauthorized_policy: UnauthorizedPolicy,
	/// Where users are sent after an unrecoverable auth failure.
	pub login_path: String,
	/// Session endpoint paths.
	pub endpoints: Endpoints,
	/// Session storage keys.
	pub storage_keys: StorageKeys,
	/// Token sources in priority order.
	pub token_sources: Vec<TokenSourceSpec>,
	/// Notice texts.
	pub messages: Messages,
}
impl ClientConfig {
	/// Returns a builder seeded with defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Builds a configuration from defaults overridden by `MEMBER_API_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		ClientConfigBuilder::default().with_env_overrides()?.build()
	}

	/// Resolves `path` against the API origin and base path.
	pub fn endpoint_url(&self, path: &str) -> Result<Url, ConfigError> {
		if !path.starts_with('/') {
			return Err(ConfigError::RelativePath { path: path.to_owned() });
		}

		let raw = format!("{}{}{}", self.api_url, self.base_path, path);

		Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })
	}

	/// Resolves a possibly relative asset path against the API origin.
	///
	/// Absolute http(s) URLs are returned unchanged and empty paths stay empty.
	pub fn asset_url(&self, path: Option<&str>) -> String {
		let Some(path) = path.filter(|path| !path.is_empty()) else {
			return String::new();
		};

		if path.starts_with("http://") || path.starts_with("https://") {
			return path.to_owned();
		}

		format!("{}/{}", self.api_url, path.strip_prefix('/').unwrap_or(path))
	}

	/// Returns `true` when failures with `status` stay silent.
	pub fn is_silent(&self, status: u16) -> bool {
		self.silent_statuses.contains(&status)
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_url: DEFAULT_API_URL.into(),
			base_path: DEFAULT_BASE_PATH.into(),
			timeout: DEFAULT_TIMEOUT,
			silent_statuses: [400, 404, 422].into_iter().collect(),
			unauthorized_policy: UnauthorizedPolicy::default(),
			login_path: "/member/login".into(),
			endpoints: Endpoints::default(),
			storage_keys: StorageKeys::default(),
			token_sources: TokenSourceSpec::defaults(),
			messages: Messages::default(),
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	/// Sets the API origin, e.g. `https://api.example.com`.
	pub fn api_url(mut self, url: impl Into<String>) -> Self {
		self.config.api_url = url.into();

		self
	}

	/// Sets the versioned base path; an empty string disables the prefix.
	pub fn base_path(mut self, path: impl Into<String>) -> Self {
		self.config.base_path = path.into();

		self
	}

	/// Sets the per-request timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.config.timeout = timeout;

		self
	}

	/// Replaces the silent status set.
	pub fn silent_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.config.silent_statuses = statuses.into_iter().collect();

		self
	}

	/// Overrides the 401 policy.
	pub fn unauthorized_policy(mut self, policy: UnauthorizedPolicy) -> Self {
		self.config.unauthorized_policy = policy;

		self
	}

	/// Overrides the login redirect path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.config.login_path = path.into();

		self
	}

	/// Overrides the session endpoint paths.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.config.endpoints = endpoints;

		self
	}

	/// Overrides the session storage keys.
	pub fn storage_keys(mut self, keys: StorageKeys) -> Self {
		self.config.storage_keys = keys;

		self
	}

	/// Replaces the token source order.
	pub fn token_sources<I>(mut self, sources: I) -> Self
	where
		I: IntoIterator<Item = TokenSourceSpec>,
	{
		self.config.token_sources = sources.into_iter().collect();

		self
	}

	/// Overrides the notice texts.
	pub fn messages(mut self, messages: Messages) -> Self {
		self.config.messages = messages;

		self
	}

	/// Applies `MEMBER_API_URL`, `MEMBER_API_BASE_PATH`, and `MEMBER_API_TIMEOUT_SECS`.
	pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
		self.with_overrides(|var| env::var(var).ok())
	}

	fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&'static str) -> Option<String>,
	{
		if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
			self.config.api_url = url;
		}
		if let Some(path) = lookup(ENV_BASE_PATH) {
			self.config.base_path = path;
		}
		if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
			let secs = raw
				.trim()
				.parse::<u64>()
				.map_err(|_| ConfigError::InvalidEnv { var: ENV_TIMEOUT_SECS, value: raw.clone() })?;

			self.config.timeout = StdDuration::from_secs(secs);
		}

		Ok(self)
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut config = self.config;
		let api_url = Url::parse(config.api_url.trim())
			.map_err(|source| ConfigError::InvalidApiUrl { source })?;

		if !matches!(api_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: api_url.to_string() });
		}

		config.api_url = api_url.as_str().trim_end_matches('/').to_owned();
		config.base_path = config.base_path.trim_end_matches('/').to_owned();

		config.validate()?;

		Ok(config)
	}
}
impl ClientConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if !self.base_path.is_empty() {
			validate_path(&self.base_path)?;
		}

		validate_path(&self.login_path)?;
		validate_path(&self.endpoints.login)?;
		validate_path(&self.endpoints.register)?;
		validate_path(&self.endpoints.logout)?;
		validate_path(&self.endpoints.refresh)?;
		validate_path(&self.endpoints.profile)?;

		if self.timeout.is_zero() {
			return Err(ConfigError::NonPositiveTimeout);
		}
		if self.token_sources.is_empty() {
			return Err(ConfigError::NoTokenSources);
		}

		Ok(())
	}
}

fn validate_path(path: &str) -> Result<(), ConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(ConfigError::RelativePath { path: path.to_owned() })
	}
}
