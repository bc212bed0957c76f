//! Message-bus adapter: the `hosh.` subject hierarchy and a thin NATS client
//! wrapper with JSON payloads and bounded publish retry.

mod client;
mod subjects;

pub use async_nats::{Message, Subscriber};
pub use client::{backoff_delay, BusClient, BusError};
pub use subjects::Subjects;
