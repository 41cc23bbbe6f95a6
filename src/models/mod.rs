//! Domain model module declarations.

pub mod worker;

pub use worker::{WorkerRecord, WorkerState, WorkerTable};
