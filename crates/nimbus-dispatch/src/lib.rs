//! # nimbus-dispatch
//!
//! The message dispatch engine of the Nimbus pub/sub subsystem.
//!
//! For every topic in the cache, the engine continuously assigns fresh
//! messages to eligible subscribers, reassigns messages whose
//! acknowledgements timed out, garbage-collects delivered and expired
//! messages, evicts inactive subscriptions, reclaims space under memory
//! pressure, and wakes notifiable clients so they poll for pending
//! deliveries.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────┐
//!        topic events   │  DispatchManager │  evict / set interval
//!       ┌──────────────▶│   (lifecycle)    │◀─────────────────────
//!       │               └────────┬─────────┘
//! ┌─────┴─────┐    spawns        │
//! │   Store   │        ┌─────────┼──────────────┐
//! │ (external)│        ▼         ▼              ▼
//! └───────────┘  ┌──────────┐ ┌────────────┐ ┌────────────┐
//!       ▲        │ Dispatch │ │Notification│ │ Expiration │
//!       └────────│  worker  │ │   worker   │ │    task    │
//!    queries &   └──────────┘ └────────────┘ └────────────┘
//!    mutations
//! ```
//!
//! The dispatch worker runs five phases per iteration, then parks on
//! the version signal; the other two workers run on their own cadences.
//! All engine state lives in the store: the engine itself only carries
//! the version counter and its shutdown token.
//!
//! ## Usage
//!
//! ```no_run
//! use nimbus_dispatch::{DispatchConfig, DispatchManager};
//! # use std::sync::Arc;
//! # fn example(store: Arc<dyn nimbus_core::MessageStore>,
//! #            sink: Arc<dyn nimbus_core::ClientEventSink>) {
//! let manager = DispatchManager::new(store, sink, DispatchConfig::default());
//! manager.start();
//! // ...
//! manager.stop();
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod metrics;

mod expiry;
mod notifier;
mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::DispatchConfig;
pub use manager::DispatchManager;
