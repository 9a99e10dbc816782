//! Session refresh guard
//!
//! Decides, for each request, whether the session's access token can be used
//! as is, must be refreshed through the provider, or whether the session has
//! to end. The guard never touches cookies itself; the request pipeline turns
//! its outcome into a reissued or removed session cookie.

use super::{SessionPrincipal, TokenBundle};
use crate::error::{GuardError, RefreshError};
use crate::oidc::TokenResponse;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Provider token endpoint used for the `refresh_token` grant
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError>;
}

/// Result of one refresh-token exchange
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed(TokenBundle),
    Failed(GuardError),
}

/// What the pipeline must do with the request's session
#[derive(Debug)]
pub enum GuardOutcome {
    /// No usable session cookie; the request continues anonymously
    Anonymous,
    /// Access token still valid; nothing to write
    Valid(SessionPrincipal),
    /// New tokens obtained; the session cookie must be reissued
    Refreshed(SessionPrincipal),
    /// Session is over; clear the cookie and send the user to login
    Ended(GuardError),
}

pub struct RefreshGuard {
    refresher: Arc<dyn TokenRefresher>,
    clock_skew: Duration,
}

impl RefreshGuard {
    pub fn new(refresher: Arc<dyn TokenRefresher>, clock_skew: std::time::Duration) -> Self {
        Self {
            refresher,
            clock_skew: Duration::from_std(clock_skew).unwrap_or_else(|_| Duration::zero()),
        }
    }

    /// Inspect the session principal (if any) at time `now`
    pub async fn check(&self, principal: Option<SessionPrincipal>, now: DateTime<Utc>) -> GuardOutcome {
        let Some(principal) = principal else {
            tracing::trace!(reason = %GuardError::SessionAbsent, "Continuing anonymously");
            return GuardOutcome::Anonymous;
        };

        if !principal.tokens.is_expired(now, self.clock_skew) {
            return GuardOutcome::Valid(principal);
        }

        tracing::debug!(
            expiry = %principal.tokens.access_token_expiry,
            "Access token expired, attempting refresh"
        );

        match self.refresh(&principal.tokens, now).await {
            RefreshOutcome::Refreshed(tokens) => {
                tracing::debug!(expiry = %tokens.access_token_expiry, "Access token refreshed");
                GuardOutcome::Refreshed(principal.with_tokens(tokens))
            }
            RefreshOutcome::Failed(reason) => GuardOutcome::Ended(reason),
        }
    }

    /// Exchange the bundle's refresh token for a new bundle
    ///
    /// Exactly one call to the token endpoint is made, and none when the bundle
    /// has no refresh token.
    pub async fn refresh(&self, tokens: &TokenBundle, now: DateTime<Utc>) -> RefreshOutcome {
        let Some(refresh_token) = tokens.refresh_token.as_deref().filter(|_| tokens.can_refresh())
        else {
            return RefreshOutcome::Failed(GuardError::TokenExpiredNoRefresh);
        };

        let next = match self.refresher.refresh(refresh_token).await {
            Ok(response) => tokens.rotate(response, now),
            Err(e) => return RefreshOutcome::Failed(GuardError::RefreshExchangeFailed(e)),
        };

        // The replacement must outlive both the request and the token it replaces
        if next.access_token_expiry <= now.max(tokens.access_token_expiry) {
            return RefreshOutcome::Failed(GuardError::RefreshExchangeFailed(
                RefreshError::Malformed(format!(
                    "refreshed access token expires at {}, not after {}",
                    next.access_token_expiry,
                    now.max(tokens.access_token_expiry)
                )),
            ));
        }

        RefreshOutcome::Refreshed(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Token endpoint double returning a canned result and counting calls
    struct FakeRefresher {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        result: fn() -> Result<TokenResponse, RefreshError>,
    }

    impl FakeRefresher {
        fn new(result: fn() -> Result<TokenResponse, RefreshError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                result,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(refresh_token.to_string());
            (self.result)()
        }
    }

    fn success() -> Result<TokenResponse, RefreshError> {
        Ok(TokenResponse {
            access_token: "A2".to_string(),
            refresh_token: Some("R2".to_string()),
            expires_in: Some(3600),
            token_type: Some("Bearer".to_string()),
            id_token: None,
            scope: None,
        })
    }

    fn invalid_grant() -> Result<TokenResponse, RefreshError> {
        Err(RefreshError::Rejected {
            status: 400,
            error: "invalid_grant".to_string(),
            description: None,
        })
    }

    fn already_expired() -> Result<TokenResponse, RefreshError> {
        Ok(TokenResponse {
            expires_in: Some(0),
            ..success()?
        })
    }

    fn short_lived() -> Result<TokenResponse, RefreshError> {
        Ok(TokenResponse {
            expires_in: Some(10),
            ..success()?
        })
    }

    fn timeout() -> Result<TokenResponse, RefreshError> {
        Err(RefreshError::Timeout)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn principal(expiry: i64, refresh_token: Option<&str>) -> SessionPrincipal {
        SessionPrincipal::new(
            BTreeMap::from([("name".to_string(), vec!["Ada".to_string()])]),
            TokenBundle {
                access_token: "A1".to_string(),
                access_token_expiry: at(expiry),
                refresh_token: refresh_token.map(String::from),
                id_token: None,
            },
        )
    }

    fn guard(refresher: &Arc<FakeRefresher>, skew_secs: u64) -> RefreshGuard {
        RefreshGuard::new(refresher.clone(), std::time::Duration::from_secs(skew_secs))
    }

    #[tokio::test]
    async fn test_no_cookie_is_anonymous() {
        let refresher = FakeRefresher::new(success);
        let outcome = guard(&refresher, 0).check(None, at(101)).await;

        assert!(matches!(outcome, GuardOutcome::Anonymous));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_unexpired_token_is_noop() {
        let refresher = FakeRefresher::new(success);
        let input = principal(1000, Some("R1"));

        let outcome = guard(&refresher, 60).check(Some(input.clone()), at(101)).await;

        match outcome {
            GuardOutcome::Valid(p) => assert_eq!(p, input),
            other => panic!("expected Valid, got {other:?}"),
        }
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_token_inside_skew_window_is_refreshed() {
        let refresher = FakeRefresher::new(success);

        let outcome = guard(&refresher, 60)
            .check(Some(principal(150, Some("R1"))), at(101))
            .await;

        assert!(matches!(outcome, GuardOutcome::Refreshed(_)));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let refresher = FakeRefresher::new(success);

        let outcome = guard(&refresher, 0)
            .check(Some(principal(100, Some("R1"))), at(101))
            .await;

        let GuardOutcome::Refreshed(refreshed) = outcome else {
            panic!("expected Refreshed");
        };
        assert_eq!(
            refreshed.tokens,
            TokenBundle {
                access_token: "A2".to_string(),
                access_token_expiry: at(3701),
                refresh_token: Some("R2".to_string()),
                id_token: None,
            }
        );
        assert_eq!(refreshed.claim("name"), Some("Ada"));
        assert_eq!(refresher.calls(), 1);
        assert_eq!(*refresher.seen.lock().unwrap(), vec!["R1".to_string()]);
    }

    #[tokio::test]
    async fn test_refreshed_expiry_is_strictly_later() {
        let refresher = FakeRefresher::new(success);
        let old = principal(100, Some("R1"));

        let GuardOutcome::Refreshed(refreshed) =
            guard(&refresher, 0).check(Some(old.clone()), at(101)).await
        else {
            panic!("expected Refreshed");
        };

        assert!(refreshed.tokens.access_token_expiry > old.tokens.access_token_expiry);
    }

    #[tokio::test]
    async fn test_second_check_after_refresh_is_noop() {
        let refresher = FakeRefresher::new(success);
        let guard = guard(&refresher, 0);

        let GuardOutcome::Refreshed(refreshed) =
            guard.check(Some(principal(100, Some("R1"))), at(101)).await
        else {
            panic!("expected Refreshed");
        };

        let second = guard.check(Some(refreshed.clone()), at(102)).await;
        match second {
            GuardOutcome::Valid(p) => assert_eq!(p, refreshed),
            other => panic!("expected Valid, got {other:?}"),
        }
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_never_calls_endpoint() {
        let refresher = FakeRefresher::new(success);

        let outcome = guard(&refresher, 0)
            .check(Some(principal(100, None)), at(101))
            .await;

        assert!(matches!(
            outcome,
            GuardOutcome::Ended(GuardError::TokenExpiredNoRefresh)
        ));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_refresh_token_treated_as_missing() {
        let refresher = FakeRefresher::new(success);

        let outcome = guard(&refresher, 0)
            .check(Some(principal(100, Some(""))), at(101))
            .await;

        assert!(matches!(
            outcome,
            GuardOutcome::Ended(GuardError::TokenExpiredNoRefresh)
        ));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_refresh_ends_session() {
        let refresher = FakeRefresher::new(invalid_grant);

        let outcome = guard(&refresher, 0)
            .check(Some(principal(100, Some("R1"))), at(101))
            .await;

        assert!(matches!(
            outcome,
            GuardOutcome::Ended(GuardError::RefreshExchangeFailed(RefreshError::Rejected { .. }))
        ));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_ends_session_without_retry() {
        let refresher = FakeRefresher::new(timeout);

        let outcome = guard(&refresher, 0)
            .check(Some(principal(100, Some("R1"))), at(101))
            .await;

        assert!(matches!(
            outcome,
            GuardOutcome::Ended(GuardError::RefreshExchangeFailed(RefreshError::Timeout))
        ));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_returning_expired_token_ends_session() {
        let refresher = FakeRefresher::new(already_expired);

        let outcome = guard(&refresher, 0)
            .check(Some(principal(100, Some("R1"))), at(101))
            .await;

        assert!(matches!(
            outcome,
            GuardOutcome::Ended(GuardError::RefreshExchangeFailed(RefreshError::Malformed(_)))
        ));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_must_extend_token_inside_skew_window() {
        let refresher = FakeRefresher::new(short_lived);

        // Old token still valid until 150; the replacement would expire at 111
        let outcome = guard(&refresher, 60)
            .check(Some(principal(150, Some("R1"))), at(101))
            .await;

        assert!(matches!(
            outcome,
            GuardOutcome::Ended(GuardError::RefreshExchangeFailed(RefreshError::Malformed(_)))
        ));
    }
}
