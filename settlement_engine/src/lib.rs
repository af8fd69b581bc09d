//! Order Settlement Engine
//!
//! This library contains the core logic of the order settlement pipeline: taking a priced shopping cart,
//! opening a hosted payment session, confirming payment, and propagating the outcome to the loyalty reward
//! ledger over a durable event channel. It is provider-agnostic: the payment provider and the storage
//! backend are both trait boundaries.
//!
//! The library is divided into three main sections:
//! 1. Storage management ([`mod@sqlite`]). SQLite is the supported backend. You should never need to access
//!    the database directly; use the public APIs instead. The exception is the data types used in the
//!    database, which are defined in the [`db_types`] module and are public.
//! 2. The public APIs ([`OrderFlowApi`] and [`RewardsApi`]). `OrderFlowApi` owns the order aggregate and
//!    its state machine; `RewardsApi` owns the append-only reward ledger. Specific backends implement the
//!    traits in [`traits`] to back these APIs.
//! 3. The settlement event channel ([`mod@events`]): the wire message, the publish/subscribe plumbing with
//!    at-least-once delivery, and the [`events::SettlementEventConsumer`] that drives the reward ledger.
mod api;

pub mod db_types;
pub mod events;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use api::{ConfirmOutcome, OrderFlowApi, OrderFlowError, RewardsApi};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
