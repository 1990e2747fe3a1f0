//! Upstream synchronization engine
//!
//! Keeps the local replica of members, concerts and rehearsals converged
//! with the owning services. Two entry points, both driven by the host
//! process at startup and stopped through a shared cancellation token:
//!
//! - [`BootstrapSync::run_once`] performs the one-shot full fetch.
//! - [`ConsumerLoop::run`] consumes the Kafka change feed.
//!
//! Upstream is authoritative and every reconciliation step is an
//! idempotent upsert or delete, so the two may interleave freely: at worst
//! the replica is transiently stale, never permanently wrong. Duplicate
//! delivery from the broker is absorbed the same way.

mod bootstrap;
mod consumer;
mod dispatcher;
mod event;
mod kafka;

pub use bootstrap::BootstrapSync;
pub use consumer::{BrokerMessage, ConsumerError, ConsumerLoop, MessageConsumer};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use event::ChangeEvent;
pub use kafka::KafkaConsumer;
