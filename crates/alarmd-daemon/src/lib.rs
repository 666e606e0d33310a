//! alarmd-daemon — runtime components of the alarm daemon.
//!
//! The core registry and its synchronization protocol live in
//! `alarmd-core`; this crate provides the threads and boundaries around it:
//! the [`dispatcher`] loop, the per-job [`worker`] loop, the producer-side
//! command [`parse`]r, and the console/JSON event [`sink`]s. The binary in
//! `main.rs` wires them together around an interactive prompt.

pub mod dispatcher;
pub mod parse;
pub mod sink;
pub mod worker;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherError};
pub use parse::{parse_line, ParseError};
pub use sink::{ConsoleSink, JsonSink};
