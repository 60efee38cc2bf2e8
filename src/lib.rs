//! Bucketed usage-event export pipeline.
//!
//! Moves accumulated usage counters out of a time-bucketed store and delivers
//! them, transformed and filtered, to a durable external event stream. A
//! single checkpoint marker records the latest exported bucket; it advances
//! only after the stream sink has accepted the whole batch, so an aborted run
//! never loses a range and a rerun never re-reads an exported one.
//!
//! The crate is a library invoked by an external scheduling harness. It has
//! no command-line or network surface of its own; the harness registers the
//! job descriptor and triggers runs with an `end_time` instant.

pub mod bucket;
pub mod config;
pub mod job;
pub mod pipeline;
pub mod reader;
pub mod sink;
pub mod store;

pub use job::{ExportError, ExportJob, JobDescriptor, RunReport};
pub use pipeline::{ParseError, Period, UsageEvent};
