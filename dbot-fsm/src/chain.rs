//! # Update chain
//!
//! Runs middleware (before/after) around the handlers for each [`UpdateContext`]. Middleware are
//! registered for every update or for one update kind (see [`dbot_core::Update::kind`]); for an
//! update, the kind-specific ones run first, each group in registration order.
//!
//! A middleware whose `before` returns false skips the handlers. The first handler that returns
//! [`HandlerResponse::Stop`] ends handler execution. `after` runs in reverse order for every
//! middleware whose `before` ran.

use async_trait::async_trait;
use dbot_core::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::update_context::UpdateContext;

/// Bag key under which [`StateDataMiddleware`] stores the conversation state.
pub const STATE_KEY: &str = "fsm_state";
/// Bag key under which [`StateDataMiddleware`] stores the conversation data.
pub const DATA_KEY: &str = "fsm_data";

/// Outcome of the handler phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Pass to the next handler.
    Continue,
    /// Stop the handler phase.
    Stop,
    /// A middleware skipped the handlers.
    Skipped,
}

/// Hook around the handlers of one update.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used for logging and duplicate detection; the implementing type's name by default.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Runs before the handlers. Return false to skip them.
    async fn before(&self, _ctx: &mut UpdateContext) -> Result<bool> {
        Ok(true)
    }

    /// Runs after the handlers (reverse order), with the final response.
    async fn after(&self, _ctx: &mut UpdateContext, _response: &HandlerResponse) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, ctx: &mut UpdateContext) -> Result<HandlerResponse>;
}

struct Registered {
    kind: Option<&'static str>,
    middleware: Arc<dyn Middleware>,
}

/// Middleware and handlers for incoming updates.
#[derive(Default)]
pub struct UpdateChain {
    middleware: Vec<Registered>,
    handlers: Vec<Arc<dyn UpdateHandler>>,
}

impl UpdateChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware run for every update kind.
    pub fn add_middleware(self, middleware: Arc<dyn Middleware>) -> Self {
        self.register(None, middleware)
    }

    /// Appends a middleware run only for updates of `kind` (e.g. `"message"`).
    pub fn add_middleware_for(self, kind: &'static str, middleware: Arc<dyn Middleware>) -> Self {
        self.register(Some(kind), middleware)
    }

    pub fn add_handler(mut self, handler: Arc<dyn UpdateHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Removes `middleware` from every registration; returns whether it was registered.
    pub fn remove_middleware(&mut self, middleware: &Arc<dyn Middleware>) -> bool {
        let target = Arc::as_ptr(middleware) as *const ();
        let before = self.middleware.len();
        self.middleware
            .retain(|entry| Arc::as_ptr(&entry.middleware) as *const () != target);
        self.middleware.len() != before
    }

    /// Middleware that apply to `kind`: kind-specific first, then the ones for every kind.
    pub fn middleware_for(&self, kind: &str) -> Vec<Arc<dyn Middleware>> {
        let specific = self
            .middleware
            .iter()
            .filter(|entry| entry.kind.is_some_and(|k| k == kind));
        let global = self.middleware.iter().filter(|entry| entry.kind.is_none());
        specific
            .chain(global)
            .map(|entry| Arc::clone(&entry.middleware))
            .collect()
    }

    /// A second middleware of the same type for the same kind is ignored.
    fn register(mut self, kind: Option<&'static str>, middleware: Arc<dyn Middleware>) -> Self {
        let entry = Registered { kind, middleware };
        let name = entry.middleware.name();
        let duplicate = self
            .middleware
            .iter()
            .any(|existing| existing.kind == kind && existing.middleware.name() == name);
        if duplicate {
            debug!(middleware = name, kind = ?kind, "middleware already registered");
        } else {
            self.middleware.push(entry);
        }
        self
    }

    /// Runs middleware before, the handlers, then middleware after in reverse.
    #[instrument(skip(self, ctx), fields(key = %ctx.fsm().key(), kind = ctx.update().kind()))]
    pub async fn handle(&self, ctx: &mut UpdateContext) -> Result<HandlerResponse> {
        let middleware = self.middleware_for(ctx.update().kind());
        let mut entered = 0;
        let mut response = HandlerResponse::Continue;

        for mw in &middleware {
            let proceed = mw.before(ctx).await?;
            entered += 1;
            if !proceed {
                info!(middleware = mw.name(), "middleware skipped handlers");
                response = HandlerResponse::Skipped;
                break;
            }
        }

        if response == HandlerResponse::Continue {
            for (index, handler) in self.handlers.iter().enumerate() {
                let outcome = handler.handle(ctx).await?;
                debug!(handler = index, response = ?outcome, "handler done");
                if outcome == HandlerResponse::Stop {
                    response = outcome;
                    break;
                }
            }
        }

        for mw in middleware[..entered].iter().rev() {
            mw.after(ctx, &response).await?;
        }
        Ok(response)
    }
}

/// Puts the conversation's current state and data into the context bag under [`STATE_KEY`] and
/// [`DATA_KEY`] before the handlers run.
#[derive(Debug, Default)]
pub struct StateDataMiddleware;

#[async_trait]
impl Middleware for StateDataMiddleware {
    async fn before(&self, ctx: &mut UpdateContext) -> Result<bool> {
        let (state, data) = ctx.fsm().get_state_data().await?;
        ctx.insert(STATE_KEY, state.map_or(Value::Null, Value::String));
        ctx.insert(DATA_KEY, Value::Object(data));
        Ok(true)
    }
}
