#![cfg(all(feature = "test", feature = "reqwest"))]

// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use easyedit_session::{
	_preludet::*,
	error::RefreshError,
	lifecycle::{LogoutReason, SessionEvent},
	store::MemoryStore,
};

fn expired_store() -> MemoryStore {
	MemoryStore::with_session(session_record(
		"stale-access",
		"refresh-1",
		OffsetDateTime::now_utc() - Duration::minutes(1),
	))
}

#[tokio::test]
async fn expired_credential_triggers_exactly_one_refresh() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.header("content-type", "application/json")
				.body("{\"refresh_token\":\"refresh-1\"}");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"fresh-access\",\"expires_in\":3600,\"token_type\":\"Bearer\"}");
		})
		.await;
	let store = expired_store();

	assert!(server.base_url().starts_with("https://"), "Mock server should serve TLS.");

	let client = reqwest_client(&server.base_url(), &store);
	let token = client
		.lifecycle()
		.usable_access_token()
		.await
		.expect("Usable token lookup should not fail.")
		.expect("Refresh should produce a token.");

	assert_eq!(token.expose(), "fresh-access");
	mock.assert_calls_async(1).await;

	let record = store.snapshot().expect("Refreshed session should stay stored.");

	assert_eq!(record.credential.access_token.expose(), "fresh-access");
	assert_eq!(record.credential.refresh_token.expose(), "refresh-1");
	assert_eq!(record.identity, demo_identity());
	assert!(record.credential.is_valid());
	assert!(!client.lifecycle().refresh_pending());
}

#[tokio::test]
async fn valid_credential_is_returned_without_network() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(500);
		})
		.await;
	let store = MemoryStore::with_session(session_record(
		"current-access",
		"refresh-1",
		OffsetDateTime::now_utc() + Duration::hours(1),
	));
	let client = reqwest_client(&server.base_url(), &store);
	let token = client
		.lifecycle()
		.usable_access_token()
		.await
		.expect("Usable token lookup should not fail.")
		.expect("Stored token should be usable.");

	assert_eq!(token.expose(), "current-access");
	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.delay(StdDuration::from_millis(200))
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"shared-access\",\"refresh_token\":\"refresh-2\",\"expires_at\":\"2099-01-01T00:00:00\"}",
				);
		})
		.await;
	let store = expired_store();
	let client = reqwest_client(&server.base_url(), &store);
	let lifecycle = client.lifecycle();
	let (first, second, third) = tokio::join!(
		lifecycle.usable_access_token(),
		lifecycle.usable_access_token(),
		lifecycle.usable_access_token(),
	);
	let tokens = [first, second, third].map(|result| {
		result
			.expect("Usable token lookup should not fail.")
			.expect("Shared refresh should produce a token.")
			.expose()
			.to_owned()
	});

	assert_eq!(tokens, ["shared-access", "shared-access", "shared-access"]);
	mock.assert_calls_async(1).await;
	assert_eq!(lifecycle.metrics().attempts(), 3);
	assert_eq!(lifecycle.metrics().network_calls(), 1);
	assert_eq!(lifecycle.metrics().joined(), 2);
	assert_eq!(
		store.snapshot().map(|record| record.credential.refresh_token.expose().to_owned()),
		Some("refresh-2".to_owned())
	);
}

#[tokio::test]
async fn concurrent_callers_share_one_failure_and_session_is_cleared() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401)
				.delay(StdDuration::from_millis(200))
				.header("content-type", "application/json")
				.body("{\"error\":\"Invalid refresh token\"}");
		})
		.await;
	let store = expired_store();
	let client = reqwest_client(&server.base_url(), &store);
	let lifecycle = client.lifecycle();
	let mut events = lifecycle.subscribe();
	let outcomes = refresh_concurrently(lifecycle).await;
	let expected = Err(RefreshError::Rejected { reason: "Invalid refresh token".into() });

	assert!(outcomes.iter().all(|outcome| outcome == &expected), "{outcomes:?}");
	mock.assert_calls_async(1).await;
	assert!(store.snapshot().is_none());

	let session = lifecycle.session().await.expect("Session snapshot should load.");

	assert!(!session.authenticated());
	assert!(session.credential().is_none() && session.identity().is_none());
	assert_eq!(
		events.recv().await.expect("Failure should broadcast a logout."),
		SessionEvent::LoggedOut {
			reason: LogoutReason::RefreshFailed(RefreshError::Rejected {
				reason: "Invalid refresh token".into()
			})
		}
	);
	assert_eq!(lifecycle.metrics().failures(), 1);
}

async fn refresh_concurrently(
	lifecycle: &easyedit_session::lifecycle::TokenLifecycleManager,
) -> Vec<Result<String, RefreshError>> {
	let (a, b, c) = tokio::join!(lifecycle.refresh(), lifecycle.refresh(), lifecycle.refresh());

	[a, b, c].into_iter().map(|outcome| outcome.map(|token| token.expose().to_owned())).collect()
}

#[tokio::test]
async fn missing_credential_fails_without_network_call() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200);
		})
		.await;
	let store = MemoryStore::default();
	let client = reqwest_client(&server.base_url(), &store);
	let lifecycle = client.lifecycle();
	let (first, second, third) = tokio::join!(
		lifecycle.usable_access_token(),
		lifecycle.usable_access_token(),
		lifecycle.usable_access_token(),
	);

	for outcome in [first, second, third] {
		assert!(outcome.expect("Missing credentials should not be an error.").is_none());
	}

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn login_issues_and_verifies_demo_session() {
	let server = MockServer::start_async().await;
	let issue = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/demo-token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"expires_at\":\"2099-01-01T00:00:00\",\"expires_in\":3600,\"token_type\":\"Bearer\"}",
			);
		})
		.await;
	let verify = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/verify").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body(serde_json::json!({ "user": demo_identity() }).to_string());
		})
		.await;
	let store = MemoryStore::default();
	let client = reqwest_client(&server.base_url(), &store);
	let session = client.login().await.expect("Demo login should succeed.");

	assert!(session.authenticated());
	issue.assert_calls_async(1).await;
	verify.assert_calls_async(1).await;
	assert_eq!(store.snapshot().map(|record| record.identity), Some(demo_identity()));

	client.logout().await.expect("Logout should succeed.");

	assert!(store.snapshot().is_none());
}
