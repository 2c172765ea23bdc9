//! File-backed [`CredentialStore`] so a restarted client resumes its session.
//!
//! The document holds two named records, `credential` and `identity`, which are always
//! written and cleared together. On open, a document with only one record or with an
//! already expired credential is discarded instead of restored.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, SessionRecord, UserIdentity},
	store::{CredentialStore, StoreError, StoreFuture},
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
	#[serde(default)]
	credential: Option<Credential>,
	#[serde(default)]
	identity: Option<UserIdentity>,
}
impl Document {
	fn from_record(record: Option<&SessionRecord>) -> Self {
		match record {
			Some(record) => Self {
				credential: Some(record.credential.clone()),
				identity: Some(record.identity.clone()),
			},
			None => Self::default(),
		}
	}

	fn is_empty(&self) -> bool {
		self.credential.is_none() && self.identity.is_none()
	}

	fn into_record(self, now: OffsetDateTime) -> Option<SessionRecord> {
		match (self.credential, self.identity) {
			(Some(credential), Some(identity)) if credential.is_valid_at(now) =>
				Some(SessionRecord::new(credential, identity)),
			_ => None,
		}
	}
}

/// Persists the session to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Option<SessionRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, restoring a still-valid session.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		Self::open_at(path, OffsetDateTime::now_utc())
	}

	/// Same as [`FileStore::open`] but judges expiry against `now`.
	pub fn open_at(path: impl Into<PathBuf>, now: OffsetDateTime) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let document = Self::load_document(&path)?;
		let had_contents = !document.is_empty();
		let record = document.into_record(now);
		let store = Self { path, inner: Arc::new(RwLock::new(record)) };

		if had_contents && store.inner.read().is_none() {
			store.persist_locked(None)?;
		}

		Ok(store)
	}

	/// Path of the backing document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_document(path: &Path) -> Result<Document, StoreError> {
		if !path.exists() {
			return Ok(Document::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Document::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, record: Option<&SessionRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&Document::from_record(record)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize session: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<SessionRecord>> {
		Box::pin(async move { Ok(self.inner.read().clone()) })
	}

	fn set(&self, credential: Credential, identity: UserIdentity) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let record = SessionRecord::new(credential, identity);
			let mut guard = self.inner.write();

			self.persist_locked(Some(&record))?;
			*guard = Some(record);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			self.persist_locked(None)?;
			guard.take();

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros;
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::auth::UserId;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"easyedit_session_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn fixture(expires_at: OffsetDateTime) -> (Credential, UserIdentity) {
		let credential = Credential::builder()
			.access_token("access-token")
			.refresh_token("refresh-token")
			.expires_at(expires_at)
			.build()
			.expect("Failed to build file-store credential fixture.");
		let identity = UserIdentity {
			user_id: UserId::new("demo_user").expect("Failed to build user fixture."),
			email: "demo@easyedit.com".into(),
			role: "admin".into(),
			has_api_key: true,
		};

		(credential, identity)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let store = FileStore::open_at(&path, now).expect("Failed to open file store.");
		let (credential, identity) = fixture(now + Duration::hours(1));
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(credential.clone(), identity.clone()))
			.expect("Failed to save fixture session to file store.");
		drop(store);

		let reopened = FileStore::open_at(&path, now).expect("Failed to reopen file store.");
		let restored = rt
			.block_on(reopened.load())
			.expect("Failed to load session from file store.")
			.expect("File store lost the session after reopen.");

		assert_eq!(restored.credential, credential);
		assert_eq!(restored.identity, identity);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store document {}: {e}", path.display())
		});
	}

	#[test]
	fn expired_credential_is_discarded_on_open() {
		let path = temp_path("expired");
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let store = FileStore::open_at(&path, now).expect("Failed to open file store.");
		let (credential, identity) = fixture(now);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(credential, identity)).expect("Failed to save fixture session.");
		drop(store);

		let reopened = FileStore::open_at(&path, now).expect("Failed to reopen file store.");

		assert!(rt.block_on(reopened.load()).expect("Load should succeed.").is_none());

		let on_disk: serde_json::Value =
			serde_json::from_slice(&fs::read(&path).expect("Document should still exist."))
				.expect("Document should stay valid JSON.");

		assert!(on_disk["credential"].is_null() && on_disk["identity"].is_null());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store document {}: {e}", path.display())
		});
	}

	#[test]
	fn half_written_document_is_not_restored() {
		let path = temp_path("partial");
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let (credential, _) = fixture(now + Duration::hours(1));
		let partial = serde_json::json!({ "credential": credential, "identity": null });

		fs::write(&path, serde_json::to_vec(&partial).expect("Fixture should serialize."))
			.expect("Failed to seed partial document.");

		let store = FileStore::open_at(&path, now).expect("Failed to open file store.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		assert!(rt.block_on(store.get()).expect("Get should succeed.").is_none());
		assert!(rt.block_on(store.identity()).expect("Identity should succeed.").is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store document {}: {e}", path.display())
		});
	}
}
