//! Request metadata attached to audit entries.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Best-effort request metadata; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Authenticated session user, when the transport knows it
    pub actor_id: Option<String>,
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

impl RequestContext {
    /// Run `future` with `self` as the current context.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        REQUEST_CONTEXT.scope(self, future).await
    }

    /// Context of the current task, empty outside a scope.
    pub fn current() -> Self {
        REQUEST_CONTEXT.try_with(Clone::clone).unwrap_or_default()
    }
}

/// Source of request metadata for the coordinator.
pub trait ContextProvider: Send + Sync {
    fn current(&self) -> RequestContext;
}

/// Reads the task-local context set by `AuditContextLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalContext;

impl ContextProvider for TaskLocalContext {
    fn current(&self) -> RequestContext {
        RequestContext::current()
    }
}

/// Fixed context, for jobs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticContext(pub RequestContext);

impl ContextProvider for StaticContext {
    fn current(&self) -> RequestContext {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_outside_scope_is_empty() {
        assert_eq!(RequestContext::current(), RequestContext::default());
    }

    #[tokio::test]
    async fn test_scope_exposes_context() {
        let context = RequestContext {
            url: Some("http://localhost/articles".into()),
            ip_address: Some("127.0.0.1".into()),
            ..Default::default()
        };

        let seen = context
            .clone()
            .scope(async { TaskLocalContext.current() })
            .await;

        assert_eq!(seen, context);
    }
}
