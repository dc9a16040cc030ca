//! Actor resolution as an ordered chain of strategies.
//!
//! The first resolver that returns an id wins. A resolver that fails is
//! logged and skipped; an exhausted chain yields `None`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::context::RequestContext;

#[async_trait]
pub trait ActorResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self) -> anyhow::Result<Option<String>>;
}

/// A named authentication context, e.g. `web` or `api`.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Id of the user authenticated through this guard, if any.
    async fn user_id(&self) -> anyhow::Result<Option<String>>;
}

/// Wraps a closure as a resolver.
pub struct FnResolver<F> {
    name: String,
    f: F,
}

impl<F> FnResolver<F>
where
    F: Fn() -> anyhow::Result<Option<String>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F> ActorResolver for FnResolver<F>
where
    F: Fn() -> anyhow::Result<Option<String>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self) -> anyhow::Result<Option<String>> {
        (self.f)()
    }
}

/// Probes the configured guards in order.
///
/// Configured names without a registered guard are skipped.
pub struct GuardResolver {
    order: Vec<String>,
    guards: HashMap<String, Arc<dyn Guard>>,
}

impl GuardResolver {
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: order.into_iter().map(Into::into).collect(),
            guards: HashMap::new(),
        }
    }

    pub fn with_guard(mut self, name: impl Into<String>, guard: Arc<dyn Guard>) -> Self {
        self.guards.insert(name.into(), guard);
        self
    }
}

#[async_trait]
impl ActorResolver for GuardResolver {
    fn name(&self) -> &str {
        "guards"
    }

    async fn resolve(&self) -> anyhow::Result<Option<String>> {
        for name in &self.order {
            let Some(guard) = self.guards.get(name) else {
                continue;
            };
            if let Some(id) = guard.user_id().await? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

/// Session user captured into the request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionResolver;

#[async_trait]
impl ActorResolver for SessionResolver {
    fn name(&self) -> &str {
        "session"
    }

    async fn resolve(&self) -> anyhow::Result<Option<String>> {
        Ok(RequestContext::current().actor_id)
    }
}

#[derive(Clone, Default)]
pub struct ActorChain {
    resolvers: Vec<Arc<dyn ActorResolver>>,
}

impl std::fmt::Debug for ActorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.resolvers.iter().map(|r| r.name().to_string()))
            .finish()
    }
}

impl ActorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain used when nothing else is configured: session only.
    pub fn session_only() -> Self {
        Self::new().then(Arc::new(SessionResolver))
    }

    pub fn then(mut self, resolver: Arc<dyn ActorResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub async fn resolve(&self) -> Option<String> {
        for resolver in &self.resolvers {
            match resolver.resolve().await {
                Ok(Some(id)) => return Some(id),
                Ok(None) => {},
                Err(e) => {
                    warn!(resolver = resolver.name(), error = %e, "Actor resolver failed");
                },
            }
        }
        None
    }
}
