use ando_core::config::ProjectConfig;
use ando_core::identity::Identity;
use ando_store::KvStore;
use http::HeaderMap;

use super::cookie;
use super::AuthOutcome;

/// Session-cookie path of the authenticator (spec §4.2). Reads
/// `sessionCookieName` (default `SESSION`), and tests existence of
/// `spring:session:sessions:<value>` in the store. A store error is treated
/// the same as a missing key — `Absent`, never propagated.
pub async fn authenticate(
    headers: &HeaderMap,
    project: &ProjectConfig,
    store: &dyn KvStore,
) -> AuthOutcome {
    let Some(session_id) = cookie::read(headers, &project.session_cookie_name) else {
        return AuthOutcome::Absent;
    };

    let key = format!("spring:session:sessions:{session_id}");
    match store.exists(&key).await {
        Ok(true) => AuthOutcome::Identity(Identity::new("session-user", "ROLE_USER", "FREE")),
        Ok(false) => AuthOutcome::Absent,
        Err(err) => {
            tracing::warn!(error = %err, key = %key, "session store lookup failed");
            AuthOutcome::Absent
        }
    }
}
