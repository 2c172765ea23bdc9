//! Credential lifecycle: validity checks, single-flight refresh, login, and logout.
//!
//! One [`TokenLifecycleManager`] owns the pending-refresh slot. A caller that needs a refresh
//! while one is pending awaits the same shared future, so a single network refresh runs per
//! episode and every caller observes the identical outcome. The shared future clears the slot
//! itself when it settles, before any waiter sees the result.
//!
//! A failed refresh is terminal for the session: the store is cleared and
//! [`SessionEvent::LoggedOut`] is broadcast. Refresh is never retried here.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	api::{CredentialPayload, RefreshRequest, VerifyResponse},
	auth::{Credential, Session, SessionRecord, TokenSecret, UserId},
	error::RefreshError,
	gateway::classify,
	http::{ApiRequest, ApiTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	service::ServiceDescriptor,
	store::CredentialStore,
};

const EVENT_CAPACITY: usize = 16;

type RefreshOutcome = std::result::Result<TokenSecret, RefreshError>;

struct PendingRefresh {
	id: u64,
	outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogoutReason {
	/// [`TokenLifecycleManager::logout`] was called.
	Requested,
	/// A refresh failed and the session was invalidated.
	RefreshFailed(RefreshError),
}

/// Session changes broadcast to the rest of the system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// A new credential and identity were stored.
	LoggedIn {
		/// Authenticated user.
		user_id: UserId,
	},
	/// The credential was replaced by a refresh.
	Refreshed {
		/// Expiry of the new credential.
		expires_at: OffsetDateTime,
	},
	/// Credential and identity were both removed.
	LoggedOut {
		/// Cause of the logout.
		reason: LogoutReason,
	},
}

/// Owns credential validity, refresh, and session transitions.
///
/// Cloning is cheap and every clone shares the same pending-refresh slot, so construct one
/// manager per session and hand clones to dependents.
#[derive(Clone)]
pub struct TokenLifecycleManager {
	inner: Arc<Inner>,
}
impl TokenLifecycleManager {
	/// Creates a manager over the provided store and transport.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		transport: Arc<dyn ApiTransport>,
		descriptor: Arc<ServiceDescriptor>,
	) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		Self {
			inner: Arc::new(Inner {
				store,
				transport,
				descriptor,
				pending: Mutex::new(None),
				next_refresh_id: AtomicU64::new(0),
				events,
				metrics: RefreshMetrics::default(),
			}),
		}
	}

	/// Service configuration used for endpoint paths.
	pub fn descriptor(&self) -> &ServiceDescriptor {
		&self.inner.descriptor
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Subscribes to login, refresh, and logout notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.inner.events.subscribe()
	}

	/// `true` while the credential's expiry is in the future.
	pub fn is_valid(&self, credential: &Credential) -> bool {
		credential.is_valid()
	}

	/// Same as [`TokenLifecycleManager::is_valid`] against an explicit instant.
	pub fn is_valid_at(&self, credential: &Credential, now: OffsetDateTime) -> bool {
		credential.is_valid_at(now)
	}

	/// `true` while a refresh episode is in flight.
	pub fn refresh_pending(&self) -> bool {
		self.inner.pending.lock().is_some()
	}

	/// Snapshot of the stored session.
	pub async fn session(&self) -> Result<Session> {
		Ok(Session::from(self.inner.store.load().await?))
	}

	/// Stored access token without any validity check.
	pub async fn stored_access_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.inner.store.get().await?.map(|credential| credential.access_token))
	}

	/// Returns the stored access token if still valid, otherwise the result of a refresh.
	///
	/// A failed refresh yields `Ok(None)`; the session has been cleared by then. Store read
	/// failures propagate.
	pub async fn usable_access_token(&self) -> Result<Option<TokenSecret>> {
		if let Some(credential) = self.inner.store.get().await? {
			if self.is_valid(&credential) {
				return Ok(Some(credential.access_token));
			}
		}

		match self.refresh().await {
			Ok(token) => Ok(Some(token)),
			Err(e) => {
				obs::debug(OpKind::Refresh, format_args!("No usable access token: {e}"));

				Ok(None)
			},
		}
	}

	/// Exchanges the stored refresh token for a new credential, joining any pending refresh.
	pub async fn refresh(&self) -> RefreshOutcome {
		self.inner.metrics.record_attempt();

		let outcome = {
			let mut pending = self.inner.pending.lock();

			match pending.as_ref() {
				Some(existing) => {
					self.inner.metrics.record_joined();
					obs::debug(OpKind::Refresh, "Joining the pending refresh.");

					existing.outcome.clone()
				},
				None => {
					let id = self.inner.next_refresh_id.fetch_add(1, Ordering::Relaxed);
					let outcome = self.inner.clone().run_refresh(id).boxed().shared();

					*pending = Some(PendingRefresh { id, outcome: outcome.clone() });

					outcome
				},
			}
		};

		outcome.await
	}

	/// Obtains a demo credential, verifies its identity, and stores both.
	pub async fn login(&self) -> Result<Session> {
		const KIND: OpKind = OpKind::Login;

		let span = OpSpan::new(KIND, "login");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.issue_and_verify()).await;

		obs::record_result(KIND, &result);

		result
	}

	/// Clears the session and notifies subscribers.
	pub async fn logout(&self) -> Result<()> {
		self.inner.store.clear().await?;

		let _ = self.inner.events.send(SessionEvent::LoggedOut { reason: LogoutReason::Requested });

		Ok(())
	}

	pub(crate) fn transport(&self) -> Arc<dyn ApiTransport> {
		self.inner.transport.clone()
	}

	async fn issue_and_verify(&self) -> Result<Session> {
		let inner = &self.inner;
		let endpoints = &inner.descriptor.endpoints;
		let issued = classify(inner.transport.execute(ApiRequest::get(&endpoints.issue)).await?)?;
		let credential =
			issued.json::<CredentialPayload>()?.into_credential(None, OffsetDateTime::now_utc())?;
		let verify = ApiRequest::get(&endpoints.verify).with_bearer(credential.access_token.clone());
		let identity = classify(inner.transport.execute(verify).await?)?.json::<VerifyResponse>()?.user;
		let user_id = identity.user_id.clone();

		inner.store.set(credential.clone(), identity.clone()).await?;

		let _ = inner.events.send(SessionEvent::LoggedIn { user_id });

		Ok(Session::from(Some(SessionRecord::new(credential, identity))))
	}
}
impl Debug for TokenLifecycleManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycleManager")
			.field("base_url", &self.inner.descriptor.base_url.as_str())
			.field("refresh_pending", &self.refresh_pending())
			.field("metrics", &self.inner.metrics)
			.finish_non_exhaustive()
	}
}

struct Inner {
	store: Arc<dyn CredentialStore>,
	transport: Arc<dyn ApiTransport>,
	descriptor: Arc<ServiceDescriptor>,
	pending: Mutex<Option<PendingRefresh>>,
	next_refresh_id: AtomicU64,
	events: broadcast::Sender<SessionEvent>,
	metrics: RefreshMetrics,
}
impl Inner {
	async fn run_refresh(self: Arc<Self>, id: u64) -> RefreshOutcome {
		const KIND: OpKind = OpKind::Refresh;

		// Clears the slot even if the exchange unwinds.
		let _settle = SettleOnDrop { inner: &*self, id };
		let span = OpSpan::new(KIND, "refresh");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let outcome = span.instrument(self.exchange_refresh_token()).await;

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(e) => {
				self.metrics.record_failure();
				self.end_session(e.clone()).await;
			},
		}

		obs::record_result(KIND, &outcome);

		outcome
	}

	async fn exchange_refresh_token(&self) -> RefreshOutcome {
		let record = self
			.store
			.load()
			.await
			.map_err(|e| RefreshError::Storage { reason: e.to_string() })?
			.ok_or(RefreshError::MissingCredential)?;
		let request = ApiRequest::post(&self.descriptor.endpoints.refresh)
			.with_json(&RefreshRequest { refresh_token: record.credential.refresh_token.expose() })
			.map_err(|e| refresh_failure(e.into()))?;

		self.metrics.record_network_call();

		let response =
			self.transport.execute(request).await.and_then(classify).map_err(refresh_failure)?;
		let credential = response
			.json::<CredentialPayload>()
			.map_err(refresh_failure)?
			.into_credential(Some(&record.credential.refresh_token), OffsetDateTime::now_utc())
			.map_err(|e| refresh_failure(e.into()))?;
		let access_token = credential.access_token.clone();
		let expires_at = credential.expires_at;

		self.store
			.set(credential, record.identity)
			.await
			.map_err(|e| RefreshError::Storage { reason: e.to_string() })?;

		let _ = self.events.send(SessionEvent::Refreshed { expires_at });

		Ok(access_token)
	}

	async fn end_session(&self, cause: RefreshError) {
		obs::warn(OpKind::Refresh, format_args!("Ending the session: {cause}"));

		if let Err(e) = self.store.clear().await {
			obs::warn(OpKind::Refresh, format_args!("Failed to clear the session: {e}"));
		}

		let _ = self.events.send(SessionEvent::LoggedOut { reason: LogoutReason::RefreshFailed(cause) });
	}

	fn settle(&self, id: u64) {
		let mut pending = self.pending.lock();

		if pending.as_ref().is_some_and(|current| current.id == id) {
			pending.take();
		}
	}
}

struct SettleOnDrop<'a> {
	inner: &'a Inner,
	id: u64,
}
impl Drop for SettleOnDrop<'_> {
	fn drop(&mut self) {
		self.inner.settle(self.id);
	}
}

fn refresh_failure(err: Error) -> RefreshError {
	match err {
		Error::Rejected { message, .. } | Error::Validation { reason: message } =>
			RefreshError::Rejected { reason: message },
		Error::IncompleteCredential(e) => RefreshError::Rejected { reason: e.to_string() },
		Error::Storage(e) => RefreshError::Storage { reason: e.to_string() },
		other => RefreshError::Network { reason: other.to_string() },
	}
}
