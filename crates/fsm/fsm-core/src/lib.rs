//! # fsm-core
//!
//! Core types and the storage contract for conversation finite state machines.
//!
//! ## Modules
//!
//! - [`record`] – [`StateRecord`], [`DataMap`], the "no state" sentinel
//! - [`error`] – [`StorageError`] taxonomy shared by every backend
//! - [`options`] – [`StorageOptions`] (size cap, default TTL, `set_data` auto-create policy)
//! - [`storage`] – the [`FsmStorage`] trait, [`StateFilter`], [`StateKeyStream`]
//! - [`helpers`] – derived operations as free functions (`state_exists`, `update_ttl`, sweeper)
//! - [`handle`] – [`StateHandle`], a per-key convenience wrapper
//! - [`key`] – [`ConversationKey`] derivation
//! - [`custom`] – template for custom backends built from four raw primitives
//! - [`states`] – the [`states_group!`] macro
//!
//! ## Backends
//!
//! - `fsm-memory`: in-process map, reference and test backend
//! - `fsm-redis`: two keys per record with native TTL
//! - `fsm-mongo`: one document per record with a TTL index
//! - Custom: implement [`custom::RawStateStore`] or [`FsmStorage`] directly

pub mod custom;
pub mod error;
pub mod handle;
pub mod helpers;
pub mod key;
pub mod options;
pub mod record;
pub mod states;
pub mod storage;
pub mod validation;

pub use custom::{CustomStorage, RawStateStore};
pub use error::{Result, StorageError};
pub use handle::StateHandle;
pub use helpers::{collect_states, spawn_expiry_sweeper, state_exists, update_ttl};
pub use key::{ConversationKey, UNKNOWN_IDENTITY};
pub use options::{StorageOptions, DEFAULT_MAX_DATA_SIZE};
pub use record::{expires_at_from, state_from_persisted, DataMap, StateRecord, NO_STATE};
pub use storage::{FsmStorage, StateFilter, StateKeyStream};
pub use validation::{into_data_map, validate_data, validate_key, validate_state};
