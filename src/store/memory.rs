//! In-memory [`CredentialStore`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::{Credential, SessionRecord, UserIdentity},
	store::{CredentialStore, StoreFuture},
};

type Slot = Arc<RwLock<Option<SessionRecord>>>;

/// Keeps the session in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Slot);
impl MemoryStore {
	/// Creates a store pre-seeded with a session.
	pub fn with_session(record: SessionRecord) -> Self {
		Self(Arc::new(RwLock::new(Some(record))))
	}

	/// Synchronous snapshot used by tests and diagnostics.
	pub fn snapshot(&self) -> Option<SessionRecord> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<SessionRecord>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn set(&self, credential: Credential, identity: UserIdentity) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(SessionRecord::new(credential, identity));

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
