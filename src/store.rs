//! Storage contract and built-in stores for the current session.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Credential, SessionRecord, UserIdentity},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable holder for the credential/identity pair.
///
/// `set` and `clear` always write both halves together; implementations keep a single
/// `Option<SessionRecord>` so a partial session cannot be observed.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Loads the stored session, if any.
	fn load(&self) -> StoreFuture<'_, Option<SessionRecord>>;

	/// Replaces the stored credential and identity.
	fn set(&self, credential: Credential, identity: UserIdentity) -> StoreFuture<'_, ()>;

	/// Removes both the credential and the identity.
	fn clear(&self) -> StoreFuture<'_, ()>;

	/// Returns the stored credential, if any.
	fn get(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async move { Ok(self.load().await?.map(|record| record.credential)) })
	}

	/// Returns the stored identity, if any.
	fn identity(&self) -> StoreFuture<'_, Option<UserIdentity>> {
		Box::pin(async move { Ok(self.load().await?.map(|record| record.identity)) })
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
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
