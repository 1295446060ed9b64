//! # dbot-fsm
//!
//! What handler code sees of the FSM layer. An incoming [`dbot_core::Update`] is turned into an
//! [`UpdateContext`] once; its [`FsmContext`] reads and writes the conversation's state through
//! whichever [`fsm_core::FsmStorage`] backend [`build_storage`] produced from [`FsmConfig`].
//!
//! Per-update work can be split into [`Middleware`] and [`UpdateHandler`]s run by an
//! [`UpdateChain`].
//!
//! ```rust,ignore
//! let config = FsmConfig::from_env()?;
//! let storage = build_storage(&config).await?;
//!
//! let ctx = UpdateContext::load(storage.clone(), bot_id, update).await?;
//! if ctx.state() == Some(Registration::waiting_name) {
//!     ctx.fsm().update_data(json!({ "name": text })).await?;
//!     ctx.fsm().set_state(Some(Registration::waiting_age)).await?;
//! }
//! ```

pub mod chain;
pub mod config;
pub mod context;
pub mod factory;
pub mod update_context;

pub use chain::{
    HandlerResponse, Middleware, StateDataMiddleware, UpdateChain, UpdateHandler, DATA_KEY,
    STATE_KEY,
};
pub use config::{FsmConfig, StorageBackend};
pub use context::FsmContext;
pub use factory::build_storage;
pub use update_context::UpdateContext;
