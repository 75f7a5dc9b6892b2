//! Observability subsystem for sparsestore
//!
//! Structured JSON logging through explicit [`Logger`] handles and a typed
//! [`Event`] catalog.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on storage behaviour
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use sparsestore::observability::{Event, Logger};
//!
//! let logger = Logger::stdio("relational");
//! logger.info(Event::ConnectionActivated, &[("dialect", "client.SQLite")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{DiscardSink, LogSink, Logger, MemorySink, Severity, StdioSink};
