//! Cancellation and deadline carrier for provider calls
//!
//! `CredentialProvider::authenticate` is the only operation in this crate that
//! blocks on external I/O. Callers hand it a [`CallContext`]; when the
//! deadline elapses or the token is cancelled, the in-flight work is dropped
//! and the provider reports [`AuthError::ProviderUnavailable`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, AuthResult};

/// Per-call cancellation signal and optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// A context with no deadline that is never cancelled externally.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancellation: CancellationToken::new(),
        }
    }

    /// A context driven by an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancellation,
        }
    }

    /// Derive a child context whose deadline is at most `timeout` from now.
    ///
    /// Cancelling the parent cancels the child; the child never outlives the
    /// parent's deadline. An unrepresentable `timeout` keeps the parent's
    /// deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(candidate)) => Some(parent.min(candidate)),
            (parent, candidate) => parent.or(candidate),
        };
        Self {
            deadline,
            cancellation: self.cancellation.child_token(),
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the context is already cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `fut` until it completes or the context fires.
    ///
    /// Returns [`AuthError::ProviderUnavailable`] if the deadline elapses or
    /// the context is cancelled first; `fut` is dropped in that case.
    pub async fn guard<F, T>(&self, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                tracing::debug!("Call cancelled before provider responded");
                Err(AuthError::ProviderUnavailable)
            }
            _ = deadline => {
                tracing::debug!("Call deadline elapsed before provider responded");
                Err(AuthError::ProviderUnavailable)
            }
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_guard_passes_through_fast_result() {
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let result = ctx.guard(async { Ok::<_, AuthError>(7) }).await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_deadline_wins_over_slow_future() {
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let result = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, AuthError>("late")
            })
            .await;

        assert_eq!(result, Err(AuthError::ProviderUnavailable));
    }

    #[tokio::test]
    async fn test_guard_cancelled() {
        let ctx = CallContext::background();
        ctx.cancel();

        let result = ctx.guard(std::future::pending::<AuthResult<()>>()).await;
        assert_eq!(result, Err(AuthError::ProviderUnavailable));
        assert!(ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_never_outlives_parent() {
        let parent = CallContext::with_timeout(Duration::from_millis(50));
        let child = parent.child_with_timeout(Duration::from_secs(10));

        assert_eq!(child.deadline(), parent.deadline());

        parent.cancel();
        assert!(child.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_does_not_panic() {
        assert_eq!(CallContext::with_timeout(Duration::MAX).deadline(), None);
        assert_eq!(CallContext::background().child_with_timeout(Duration::MAX).deadline(), None);

        let parent = CallContext::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());

        let result = child.guard(async { Ok::<_, AuthError>(1) }).await;
        assert_eq!(result, Ok(1));
    }
}
