// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The tool's sequence library: one request builder per verb, registered
by name in a static table so the CLI can list and dispatch verbs
without a build-time plugin registry. Each entry also names the
[`Request`] its response is expected to echo, so the caller can build a
matcher with [`crate::expect::expect_common`] generically instead of
every entry carrying its own closure.
*/

use uuid::Uuid;
use vita49::{Command, Request, TimestampInterpretation};

use crate::errors::AgentError;

fn parse_uuid(s: &str) -> Result<Uuid, AgentError> {
    Uuid::parse_str(s).map_err(|_| AgentError::InvalidArg("expected a UUID argument"))
}

fn parse_sid(s: &str) -> Result<u32, AgentError> {
    s.parse()
        .map_err(|_| AgentError::InvalidArg("expected a Stream ID argument"))
}

/// One named entry in the sequence table: a verb's human-readable name,
/// the [`Request`] its reply echoes, a one-line description for CLI
/// help text, and the function that turns CLI arguments into a request
/// `Command` with a fresh Client ID.
pub struct SequenceEntry {
    /// CLI-visible verb name (`disco`, `enum`, `access`, ...).
    pub name: &'static str,
    /// The request code this sequence's response will echo.
    pub request: Request,
    /// One-line help text.
    pub help: &'static str,
    /// Builds the request `Command` from positional CLI arguments.
    pub build: fn(&[String]) -> Result<Command, AgentError>,
}

fn build_disco(args: &[String]) -> Result<Command, AgentError> {
    let mut cmd = Command::new_request(Request::Discovery);
    cmd.set_client_id(Some(Uuid::new_v4()));
    if !args.is_empty() {
        let rids = args.iter().map(|s| parse_uuid(s)).collect::<Result<Vec<_>, _>>()?;
        cmd.set_resource_id_list(Some(rids));
    }
    Ok(cmd)
}

fn build_enumerate(args: &[String]) -> Result<Command, AgentError> {
    let mut cmd = Command::new_request(Request::Enumeration);
    cmd.set_client_id(Some(Uuid::new_v4()));
    if !args.is_empty() {
        let rids = args.iter().map(|s| parse_uuid(s)).collect::<Result<Vec<_>, _>>()?;
        cmd.set_resource_id_list(Some(rids));
    }
    Ok(cmd)
}

fn build_access(args: &[String]) -> Result<Command, AgentError> {
    let rid = args
        .first()
        .ok_or(AgentError::InvalidArg("access requires a resource UUID"))?;
    let mut cmd = Command::new_request(Request::Access);
    cmd.set_client_id(Some(Uuid::new_v4()));
    cmd.set_resource_id_list(Some(vec![parse_uuid(rid)?]));
    Ok(cmd)
}

fn build_release(args: &[String]) -> Result<Command, AgentError> {
    let sid = args
        .first()
        .ok_or(AgentError::InvalidArg("release requires a Stream ID"))?;
    let cid = args
        .get(1)
        .ok_or(AgentError::InvalidArg("release requires the owning Client ID"))?;
    let mut cmd = Command::new_request(Request::Release);
    cmd.set_client_id(Some(parse_uuid(cid)?));
    cmd.set_stream_id_assignment(Some(parse_sid(sid)?));
    Ok(cmd)
}

fn sid_only(request: Request) -> impl Fn(&[String]) -> Result<Command, AgentError> {
    move |args: &[String]| {
        let sid = args
            .first()
            .ok_or(AgentError::InvalidArg("this sequence requires a Stream ID"))?;
        let mut cmd = Command::new_request(request);
        cmd.set_client_id(Some(Uuid::new_v4()));
        cmd.set_stream_id_assignment(Some(parse_sid(sid)?));
        Ok(cmd)
    }
}

fn build_open(args: &[String]) -> Result<Command, AgentError> {
    sid_only(Request::Open)(args)
}

fn build_configure(args: &[String]) -> Result<Command, AgentError> {
    let sid = args
        .first()
        .ok_or(AgentError::InvalidArg("configure requires a Stream ID"))?;
    let packet_samples = args
        .get(1)
        .ok_or(AgentError::InvalidArg("configure requires a packet sample count"))?;
    let mut cmd = Command::new_request(Request::Configure);
    cmd.set_client_id(Some(Uuid::new_v4()));
    cmd.set_stream_id_assignment(Some(parse_sid(sid)?));
    cmd.set_event_period(Some(
        packet_samples
            .parse()
            .map_err(|_| AgentError::InvalidArg("expected an integer packet sample count"))?,
    ));
    Ok(cmd)
}

fn build_start(args: &[String]) -> Result<Command, AgentError> {
    sid_only(Request::Start)(args)
}

fn build_stop(args: &[String]) -> Result<Command, AgentError> {
    let sid = args
        .first()
        .ok_or(AgentError::InvalidArg("stop requires a Stream ID"))?;
    let mut cmd = Command::new_request(Request::Stop);
    cmd.set_client_id(Some(Uuid::new_v4()));
    cmd.set_stream_id_assignment(Some(parse_sid(sid)?));
    cmd.set_timestamp_interpretation(Some(TimestampInterpretation::Relative));
    Ok(cmd)
}

fn build_close(args: &[String]) -> Result<Command, AgentError> {
    sid_only(Request::Close)(args)
}

fn build_tstamp(args: &[String]) -> Result<Command, AgentError> {
    sid_only(Request::TimestampControl)(args)
}

/// The full verb registry, in the CLI's listed order: disco, enum,
/// access, release, open, configure, start, stop, close, tstamp.
/// `configure` is included even though spec.md's component-table prose
/// only names nine verbs, because every worker-facing request in the
/// wire `Request` enum gets a sequence entry.
pub static SEQUENCES: &[SequenceEntry] = &[
    SequenceEntry {
        name: "disco",
        request: Request::Discovery,
        help: "List known resource UUIDs, optionally filtered",
        build: build_disco,
    },
    SequenceEntry {
        name: "enum",
        request: Request::Enumeration,
        help: "Describe one or more resources in full",
        build: build_enumerate,
    },
    SequenceEntry {
        name: "access",
        request: Request::Access,
        help: "Claim a resource, assigning it a Stream ID",
        build: build_access,
    },
    SequenceEntry {
        name: "release",
        request: Request::Release,
        help: "Release a previously accessed worker",
        build: build_release,
    },
    SequenceEntry {
        name: "open",
        request: Request::Open,
        help: "Claim the pipeline for an accessed worker",
        build: build_open,
    },
    SequenceEntry {
        name: "configure",
        request: Request::Configure,
        help: "Set a worker's sample-count timestamp format",
        build: build_configure,
    },
    SequenceEntry {
        name: "start",
        request: Request::Start,
        help: "Arm and start a configured worker",
        build: build_start,
    },
    SequenceEntry {
        name: "stop",
        request: Request::Stop,
        help: "Stop a running worker",
        build: build_stop,
    },
    SequenceEntry {
        name: "close",
        request: Request::Close,
        help: "Reset and gate off a worker's pipeline",
        build: build_close,
    },
    SequenceEntry {
        name: "tstamp",
        request: Request::TimestampControl,
        help: "Set a worker's timestamp interpretation mode",
        build: build_tstamp,
    },
];

/// Looks up a sequence entry by its CLI verb name.
pub fn find(name: &str) -> Option<&'static SequenceEntry> {
    SEQUENCES.iter().find(|entry| entry.name == name)
}
