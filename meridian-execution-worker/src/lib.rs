// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! # General description
//!
//! The execution ingestion worker drives finalized blocks from announcement
//! to durable execution results:
//! * the **queue** (`queue.rs`) tracks pending blocks and enforces
//!   parent-before-child scheduling,
//! * the **fetch thread** (`fetcher.rs`) acquires guaranteed collections
//!   from collection nodes, deduplicating in-flight requests,
//! * the **loader** (`loader.rs`) replays unexecuted finalized blocks at
//!   startup and on finalization events,
//! * the **stop controller** (`stop.rs`) refuses execution at and above a
//!   configured height once that height is finalized,
//! * the **executor pool** (`executor.rs`) computes complete blocks in
//!   parallel where the chain structure allows it, uploads the results and
//!   persists them through `meridian-execution-state`.
//!
//! The ingestion thread (`worker/`) owns all queue mutations; the
//! controller (`controller.rs`) posts commands to it and reads shared
//! state.

#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod commands;
mod controller;
mod executor;
mod fetcher;
mod loader;
mod metrics;
mod queue;
mod state;
mod stop;
mod upload;
mod worker;

pub use worker::start_execution_worker;

#[cfg(test)]
mod tests;
