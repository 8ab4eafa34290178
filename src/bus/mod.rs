//! Fan-out of freshly appended events.
//!
//! ```text
//!  EventStore::append ──► Publisher::publish(header, meta, events)
//!                              │  (one registry lock, synchronous)
//!              ┌───────────────┼────────────────┐
//!              ▼               ▼                ▼
//!        Subscriber A     Subscriber B     Subscriber C
//!        rules: none      rules: orders    rules: orders/[Paid]
//!        (everything)     (any event)      (only Paid)
//! ```
//!
//! Delivery is at-least-once and best-effort: a subscriber sees a batch
//! while the publisher waits, so a slow handler slows every append.

mod message;
mod publisher;
mod subscriber;

pub use message::Message;
pub use publisher::Publisher;
pub use subscriber::{Rule, Subscriber, SubscriberId};
