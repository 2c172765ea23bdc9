//! Authenticated identity and the paired session record.

// self
use crate::{
	_prelude::*,
	auth::{Credential, UserId},
};

/// Identity returned by the service's verify endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
	/// Service-side user identifier.
	pub user_id: UserId,
	/// Contact email.
	pub email: String,
	/// Role label; interpreted by the service, never by this crate.
	pub role: String,
	/// Whether the account carries an API key.
	#[serde(default)]
	pub has_api_key: bool,
}

/// Credential and identity persisted as one unit.
///
/// Stores hold `Option<SessionRecord>`, so one half can never exist without the other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
	/// Current credential.
	pub credential: Credential,
	/// Identity the credential belongs to.
	pub identity: UserIdentity,
}
impl SessionRecord {
	/// Pairs a credential with its identity.
	pub fn new(credential: Credential, identity: UserIdentity) -> Self {
		Self { credential, identity }
	}
}

/// Read-only view of the current session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
	record: Option<SessionRecord>,
}
impl Session {
	/// Stored credential, if authenticated.
	pub fn credential(&self) -> Option<&Credential> {
		self.record.as_ref().map(|record| &record.credential)
	}

	/// Stored identity, if authenticated.
	pub fn identity(&self) -> Option<&UserIdentity> {
		self.record.as_ref().map(|record| &record.identity)
	}

	/// `true` iff both credential and identity are present.
	pub fn authenticated(&self) -> bool {
		self.record.is_some()
	}
}
impl From<Option<SessionRecord>> for Session {
	fn from(record: Option<SessionRecord>) -> Self {
		Self { record }
	}
}
