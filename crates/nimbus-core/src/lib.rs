//! # nimbus-core
//!
//! Core types and contracts for the Nimbus pub/sub dispatch engine.
//!
//! This crate defines the seams between the message store, the dispatch
//! engine and the client layer:
//!
//! - **Message / Subscription** - the metadata model the engine works on
//! - **MessageStore** - abstract view of the store owning all state
//! - **TopicListener / ClientEventSink** - event surfaces in and out
//! - **VersionSignal** - the engine's wait/notify primitive
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  events   ┌─────────────┐  queries   ┌─────────────┐
//! │    Store    │──────────▶│  Listener   │            │   Engine    │
//! │             │◀──────────│  (signal)   │◀───────────│  (dispatch) │
//! └─────────────┘ mutations └─────────────┘    wake    └─────────────┘
//! ```
//!
//! The store notifies the engine; the engine mutates the store. The
//! engine registers itself by interface and holds a plain handle to the
//! store, so there is no owning cycle.

pub mod event;
pub mod message;
pub mod signal;
pub mod store;
pub mod subscription;

pub use event::{ClientEventSink, ClientEventType, TopicListener, PUBSUB_POLL_EVENT_CODE};
pub use message::{
    AssignmentState, ClientId, DeliveryOption, MessageId, MessageInfo, MessageRef, RemovalReason,
    TopicName,
};
pub use signal::VersionSignal;
pub use store::{AssignmentKind, MessageStore, OperationContext, StoreError, TopicOperation};
pub use subscription::{SubscriptionInfo, SubscriptionRole};
