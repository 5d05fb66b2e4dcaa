// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! `v49-agent` is the control-plane machine built on the `vita49` wire
//! codec: a resource table, a polymorphic channel layer, a message
//! dispatcher, a manager owning resource discovery/access/release, a
//! per-stream worker state machine, and the tool-side expect engine and
//! sequence library used to drive request sequences against a daemon.
#![deny(missing_docs)]
#![deny(unstable_features, unused_import_braces, unreachable_pub)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod expect;
pub mod manager;
pub mod resource;
pub mod sequence;
pub mod worker;

pub use crate::channel::{Channel, LoopbackChannel, Readiness};
#[cfg(unix)]
pub use crate::channel::UnixChannel;
pub use crate::config::DaemonConfig;
pub use crate::context::{ControlClient, DaemonContext};
pub use crate::errors::AgentError;
pub use crate::expect::{expect_common, ExpectOutcome, Expecter, Matcher};
pub use crate::manager::Manager;
pub use crate::resource::{ResourceTable, ResourceTableBuilder};
pub use crate::sequence::{SequenceEntry, SEQUENCES};
pub use crate::worker::{IoctlTarget, NullIoctlTarget, Worker, WorkerHandle, WorkerState};
