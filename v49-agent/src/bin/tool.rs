// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Example VITA-49 control-plane tool. Sends one sequence request to a
daemon over a Unix-domain socket and waits for its matching reply,
exiting 0 on Success and non-zero on any other result or on timeout,
per spec.md's "CLI (tool)" behavior.
*/

use std::os::unix::net::UnixStream;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use uuid::Uuid;
use v49_agent::{expect_common, Channel, Expecter, Matcher, UnixChannel};
use vita49::{CommandResult, Packet};

/// Default request timeout, matching the original tool's select loop
/// bound of a handful of poll intervals.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
struct Args {
    /// Unix-domain socket path the daemon is listening on.
    #[arg(short, long)]
    socket: Option<String>,
    /// Sequence verb to run (disco, enum, access, release, open,
    /// configure, start, stop, close, tstamp).
    verb: String,
    /// Positional arguments for the chosen verb.
    verb_args: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let entry = v49_agent::sequence::find(&args.verb)
        .ok_or_else(|| format!("unknown sequence verb '{}'", args.verb))?;

    let socket = match &args.socket {
        Some(path) => path.clone(),
        None => std::env::var("V49_AGENT_SOCK")?,
    };
    let stream = UnixStream::connect(&socket)?;
    let mut channel = UnixChannel::new(stream)?;

    let request = (entry.build)(&args.verb_args)?;
    let cid = request.client_id();
    let request_frame = Packet::new_command(request).format()?;

    let expected_request = entry.request;
    let matcher: Matcher<CommandResult> =
        Box::new(move |cmd| match expect_common(cmd, expected_request, cid) {
            v49_agent::expect::MatchOutcome::Match(resp) => {
                v49_agent::expect::MatchOutcome::Match(resp.result())
            }
            v49_agent::expect::MatchOutcome::NoMatch => v49_agent::expect::MatchOutcome::NoMatch,
            v49_agent::expect::MatchOutcome::Fatal(e) => v49_agent::expect::MatchOutcome::Fatal(e),
        });

    let mut expecter = Expecter::new(&mut channel as &mut dyn Channel);
    match expecter.run(request_frame, &[matcher], DEFAULT_TIMEOUT) {
        v49_agent::ExpectOutcome::Match(result) => {
            info!("{}: {:?}", args.verb, result);
            Ok(result == CommandResult::Success)
        }
        v49_agent::ExpectOutcome::Fatal(e) => {
            error!("{}: {e}", args.verb);
            Ok(false)
        }
        v49_agent::ExpectOutcome::Timeout => {
            error!("{}: timed out waiting for a reply", args.verb);
            Ok(false)
        }
    }
}
