// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Error types for the `v49-agent` crate: the three error families named by
the control-plane design (parse/format, protocol, fatal).
*/

use thiserror::Error;
use uuid::Uuid;
use vita49::VitaError;

/// Generic `v49-agent` crate error enumeration.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A parse/format error from the wire codec. Recovered locally by
    /// logging and dropping the offending packet; the connection stays up.
    #[error("codec error: {0}")]
    Codec(#[from] VitaError),
    /// No resource exists with the given identifier or name.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// The resource named by `uuid` is already accessed by another client.
    #[error("resource {uuid} already accessed by another client")]
    AlreadyAccessed {
        /// The contended resource.
        uuid: Uuid,
    },
    /// No worker is assigned to the given Stream ID.
    #[error("no worker for stream id {0}")]
    UnknownStreamId(u32),
    /// The requesting Client ID does not match the worker's owning client.
    #[error("client id does not own stream id {0}")]
    NotOwner(u32),
    /// A command's fields were malformed or inconsistent for the current
    /// worker state (maps to `CommandResult::InvalidArg`).
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),
    /// A worker received a request that doesn't apply to its current
    /// state (maps to `CommandResult::InvalidArg`).
    #[error("worker in state {state} cannot handle this request")]
    WrongState {
        /// The worker's current state at the time of the request.
        state: &'static str,
    },
    /// Claiming the underlying pipeline's access bits failed (maps to
    /// `CommandResult::AccessDenied`).
    #[error("access denied: {0}")]
    AccessDenied(&'static str),
    /// A channel operation failed (maps to `SubCode::Enqueue` at the wire
    /// layer, or a closed/EOF channel at the transport layer).
    #[error("channel error: {0}")]
    Channel(String),
    /// A fatal error: child exec failure, channel EOF, or resource table
    /// load failure at startup. Terminates the affected component.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl AgentError {
    /// Maps this error to the Command `result` code it should be reported
    /// as, when it can be recovered by a Result-role response rather than
    /// by dropping the connection.
    pub fn to_command_result(&self) -> vita49::CommandResult {
        use vita49::CommandResult;
        match self {
            AgentError::ResourceNotFound(_) | AgentError::UnknownStreamId(_) => {
                CommandResult::NotFound
            }
            AgentError::AlreadyAccessed { .. } | AgentError::NotOwner(_) => {
                CommandResult::AccessDenied
            }
            AgentError::AccessDenied(_) => CommandResult::AccessDenied,
            AgentError::InvalidArg(_) | AgentError::WrongState { .. } => CommandResult::InvalidArg,
            AgentError::Codec(_) => CommandResult::InvalidArg,
            AgentError::Channel(_) | AgentError::Fatal(_) => CommandResult::Unspecified,
        }
    }
}
