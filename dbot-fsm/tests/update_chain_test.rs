//! Integration tests for [`dbot_fsm::UpdateChain`].
//!
//! Covers: middleware before/after order around handlers, a middleware skipping the handlers,
//! Stop ending the handler phase, kind-specific registration, duplicate and removal handling, and
//! [`dbot_fsm::StateDataMiddleware`] filling the context bag.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use dbot_core::{CallbackQuery, Chat, Message, Update, User};
use dbot_fsm::{
    HandlerResponse, Middleware, StateDataMiddleware, UpdateChain, UpdateContext, UpdateHandler,
    DATA_KEY, STATE_KEY,
};
use fsm_core::{into_data_map, FsmStorage};
use fsm_memory::MemoryStorage;

type Log = Arc<Mutex<Vec<String>>>;

fn message_update() -> Update {
    Update::Message(Message {
        id: 1,
        chat: Chat {
            id: 3,
            chat_type: "private".to_string(),
        },
        from: Some(User::with_id(2)),
        text: Some("hi".to_string()),
        date: chrono::Utc::now(),
    })
}

fn callback_update() -> Update {
    Update::CallbackQuery(CallbackQuery {
        id: "cb".to_string(),
        from: User::with_id(2),
        message: None,
        data: Some("pizza".to_string()),
    })
}

async fn context(update: Update) -> (Arc<MemoryStorage>, UpdateContext) {
    let storage = Arc::new(MemoryStorage::new());
    let ctx = UpdateContext::load(storage.clone(), 1, update).await.unwrap();
    (storage, ctx)
}

struct Recording {
    name: &'static str,
    proceed: bool,
    log: Log,
}

#[async_trait]
impl Middleware for Recording {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn before(&self, _ctx: &mut UpdateContext) -> dbot_core::Result<bool> {
        self.log.lock().unwrap().push(format!("before {}", self.name));
        Ok(self.proceed)
    }

    async fn after(
        &self,
        _ctx: &mut UpdateContext,
        response: &HandlerResponse,
    ) -> dbot_core::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("after {} {:?}", self.name, response));
        Ok(())
    }
}

fn recording(name: &'static str, proceed: bool, log: &Log) -> Arc<dyn Middleware> {
    Arc::new(Recording {
        name,
        proceed,
        log: log.clone(),
    })
}

struct RecordingHandler {
    name: &'static str,
    response: HandlerResponse,
    log: Log,
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn handle(&self, _ctx: &mut UpdateContext) -> dbot_core::Result<HandlerResponse> {
        self.log.lock().unwrap().push(format!("handle {}", self.name));
        Ok(self.response.clone())
    }
}

fn handler(name: &'static str, response: HandlerResponse, log: &Log) -> Arc<dyn UpdateHandler> {
    Arc::new(RecordingHandler {
        name,
        response,
        log: log.clone(),
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// **Test: Middleware wrap the handlers like an onion.**
///
/// **Setup:** Middleware a, b; handlers h1, h2 returning Continue.
/// **Action:** `chain.handle(&mut ctx)`.
/// **Expected:** before a, before b, handle h1, handle h2, after b, after a; response Continue.
#[tokio::test]
async fn test_middleware_order() {
    let log = Log::default();
    let chain = UpdateChain::new()
        .add_middleware(recording("a", true, &log))
        .add_middleware(recording("b", true, &log))
        .add_handler(handler("h1", HandlerResponse::Continue, &log))
        .add_handler(handler("h2", HandlerResponse::Continue, &log));
    let (_, mut ctx) = context(message_update()).await;

    let response = chain.handle(&mut ctx).await.unwrap();

    assert_eq!(response, HandlerResponse::Continue);
    assert_eq!(
        entries(&log),
        vec![
            "before a",
            "before b",
            "handle h1",
            "handle h2",
            "after b Continue",
            "after a Continue",
        ]
    );
}

/// **Test: A middleware returning false skips the handlers.**
///
/// **Setup:** Middleware a (proceeds), gate (stops), c; one handler.
/// **Action:** `chain.handle(&mut ctx)`.
/// **Expected:** c and the handler never run; after runs for gate and a only; response Skipped.
#[tokio::test]
async fn test_middleware_skips_handlers() {
    let log = Log::default();
    let chain = UpdateChain::new()
        .add_middleware(recording("a", true, &log))
        .add_middleware(recording("gate", false, &log))
        .add_middleware(recording("c", true, &log))
        .add_handler(handler("h", HandlerResponse::Continue, &log));
    let (_, mut ctx) = context(message_update()).await;

    let response = chain.handle(&mut ctx).await.unwrap();

    assert_eq!(response, HandlerResponse::Skipped);
    assert_eq!(
        entries(&log),
        vec![
            "before a",
            "before gate",
            "after gate Skipped",
            "after a Skipped",
        ]
    );
}

/// **Test: Stop from a handler ends the handler phase and reaches after.**
#[tokio::test]
async fn test_handler_stop() {
    let log = Log::default();
    let chain = UpdateChain::new()
        .add_middleware(recording("a", true, &log))
        .add_handler(handler("h1", HandlerResponse::Stop, &log))
        .add_handler(handler("h2", HandlerResponse::Continue, &log));
    let (_, mut ctx) = context(message_update()).await;

    let response = chain.handle(&mut ctx).await.unwrap();

    assert_eq!(response, HandlerResponse::Stop);
    assert_eq!(entries(&log), vec!["before a", "handle h1", "after a Stop"]);
}

/// **Test: Kind-specific middleware run first and only for their kind.**
///
/// **Setup:** Global middleware g, then message-only middleware m.
/// **Action:** Handle a message update, then a callback query update.
/// **Expected:** Message: m before g. Callback query: only g.
#[tokio::test]
async fn test_kind_specific_middleware() {
    let log = Log::default();
    let chain = UpdateChain::new()
        .add_middleware(recording("g", true, &log))
        .add_middleware_for("message", recording("m", true, &log));

    let (_, mut ctx) = context(message_update()).await;
    chain.handle(&mut ctx).await.unwrap();
    assert_eq!(
        entries(&log),
        vec!["before m", "before g", "after g Continue", "after m Continue"]
    );

    log.lock().unwrap().clear();
    let (_, mut ctx) = context(callback_update()).await;
    chain.handle(&mut ctx).await.unwrap();
    assert_eq!(entries(&log), vec!["before g", "after g Continue"]);
}

/// **Test: Duplicate registrations are ignored and removal unregisters.**
#[tokio::test]
async fn test_duplicate_and_remove() {
    let log = Log::default();
    let first = recording("a", true, &log);
    let mut chain = UpdateChain::new()
        .add_middleware(first.clone())
        .add_middleware(recording("a", true, &log))
        .add_middleware_for("message", recording("a", true, &log));
    assert_eq!(chain.middleware_for("message").len(), 2);
    assert_eq!(chain.middleware_for("callback_query").len(), 1);

    assert!(chain.remove_middleware(&first));
    assert!(!chain.remove_middleware(&first));
    assert_eq!(chain.middleware_for("callback_query").len(), 0);
    assert_eq!(chain.middleware_for("message").len(), 1);
}

/// **Test: StateDataMiddleware fills the bag for handlers.**
///
/// **Setup:** Stored state "waiting_age" with data {"name": "Alice"} for the update's key.
/// **Action:** Chain with StateDataMiddleware and a handler copying the bag entries out.
/// **Expected:** The handler sees the state and data under the bag keys.
#[tokio::test]
async fn test_state_data_middleware() {
    struct Capture(Arc<Mutex<Option<(serde_json::Value, serde_json::Value)>>>);

    #[async_trait]
    impl UpdateHandler for Capture {
        async fn handle(&self, ctx: &mut UpdateContext) -> dbot_core::Result<HandlerResponse> {
            let state = ctx.get(STATE_KEY).cloned().unwrap_or_default();
            let data = ctx.get(DATA_KEY).cloned().unwrap_or_default();
            *self.0.lock().unwrap() = Some((state, data));
            Ok(HandlerResponse::Stop)
        }
    }

    let (storage, mut ctx) = context(message_update()).await;
    storage
        .set_state_data(
            "1-2-3",
            "waiting_age",
            into_data_map(json!({"name": "Alice"})).unwrap(),
            None,
        )
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let chain = UpdateChain::new()
        .add_middleware(Arc::new(StateDataMiddleware))
        .add_handler(Arc::new(Capture(seen.clone())));
    chain.handle(&mut ctx).await.unwrap();

    let (state, data) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(state, json!("waiting_age"));
    assert_eq!(data, json!({"name": "Alice"}));
}
