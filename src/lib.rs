//! Session-aware member API client: bearer attachment from ordered token sources, single-flight
//! refresh recovery on 401, persisted sessions, and centralized error notices.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod session;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::{Map, Value};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
