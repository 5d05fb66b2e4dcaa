// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The tool-side expect engine: drains a send queue, polls a channel at a
bounded interval, and runs an ordered list of matchers against every
received frame until one matches, a fatal error occurs, or a deadline
passes.
*/

use std::time::{Duration, Instant};

use log::{debug, trace};
use uuid::Uuid;
use vita49::{Command, Packet, Request};

use crate::channel::Channel;
use crate::errors::AgentError;

/// Default poll interval, matching the original tool's `tv_usec =
/// 333000` select timeout.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(333);

/// A matcher's verdict on one received Command.
pub enum MatchOutcome<T> {
    /// Not the message this matcher is looking for; keep waiting.
    NoMatch,
    /// The message matched; carries the matcher's extracted value.
    Match(T),
    /// An unrecoverable condition; stop waiting immediately.
    Fatal(AgentError),
}

/// A matcher function: inspects one received Command and reports
/// [`MatchOutcome`].
pub type Matcher<T> = Box<dyn Fn(&Command) -> MatchOutcome<T>>;

/// How an [`Expecter::run`] call ended.
pub enum ExpectOutcome<T> {
    /// A matcher matched; carries its value.
    Match(T),
    /// A matcher reported a fatal condition.
    Fatal(AgentError),
    /// The deadline passed with no match.
    Timeout,
}

/// Drives a channel against an ordered list of matchers until one
/// matches, one reports `Fatal`, or `timeout` elapses. Polls at
/// [`DEFAULT_POLL_INTERVAL`] so a missing deadline is still noticed
/// promptly even with no I/O ready.
pub struct Expecter<'a> {
    channel: &'a mut dyn Channel,
    poll_interval: Duration,
}

impl<'a> Expecter<'a> {
    /// Builds an expecter over `channel` using the default poll interval.
    pub fn new(channel: &'a mut dyn Channel) -> Expecter<'a> {
        Expecter {
            channel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the poll interval (used by tests to avoid a 333ms wait
    /// per assertion).
    pub fn with_poll_interval(mut self, interval: Duration) -> Expecter<'a> {
        self.poll_interval = interval;
        self
    }

    /// Enqueues `frame`, then drives the channel against `matchers` in
    /// declaration order until a match, a fatal error, or `timeout`.
    pub fn run<T>(&mut self, frame: Vec<u8>, matchers: &[Matcher<T>], timeout: Duration) -> ExpectOutcome<T> {
        if let Err(e) = self.channel.enqueue(frame) {
            return ExpectOutcome::Fatal(e);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Err(e) = self.channel.flush_writes() {
                return ExpectOutcome::Fatal(e);
            }
            match self.channel.try_read() {
                Ok(Some(bytes)) => match Packet::parse(&bytes) {
                    Ok(Packet::Command { command, .. }) => {
                        for matcher in matchers {
                            match matcher(&command) {
                                MatchOutcome::NoMatch => continue,
                                MatchOutcome::Match(value) => return ExpectOutcome::Match(value),
                                MatchOutcome::Fatal(e) => return ExpectOutcome::Fatal(e),
                            }
                        }
                        trace!("expect: received Command matched no installed matcher");
                    }
                    Ok(_) => trace!("expect: received non-Command frame, ignored"),
                    Err(e) => return ExpectOutcome::Fatal(AgentError::Codec(e)),
                },
                Ok(None) => {}
                Err(e) => return ExpectOutcome::Fatal(e),
            }
            if Instant::now() >= deadline {
                return ExpectOutcome::Timeout;
            }
            std::thread::sleep(self.poll_interval.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}

/// The common response-matching check shared by every sequence in
/// `sequence`: verifies `role == Result`, `request == expected_request`,
/// and CID presence/equality are consistent with `expected_cid`. A
/// non-`Success` result is mapped to `Fatal`, matching the original's
/// `expect_common()`.
pub fn expect_common(
    response: &Command,
    expected_request: Request,
    expected_cid: Option<Uuid>,
) -> MatchOutcome<Command> {
    use vita49::{CommandResult, Role};

    if response.role() != Role::Result {
        return MatchOutcome::NoMatch;
    }
    if response.request() != expected_request {
        return MatchOutcome::NoMatch;
    }
    match (expected_cid, response.client_id()) {
        (Some(expected), Some(actual)) if expected != actual => return MatchOutcome::NoMatch,
        (Some(_), None) | (None, Some(_)) => return MatchOutcome::NoMatch,
        _ => {}
    }
    if response.result() != CommandResult::Success {
        debug!("expect_common: {:?} failed with {:?}", expected_request, response.result());
        return MatchOutcome::Fatal(AgentError::InvalidArg("request failed"));
    }
    MatchOutcome::Match(response.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;
    use vita49::CommandResult;

    #[test]
    fn run_matches_expected_response() {
        let (mut tool, mut daemon) = LoopbackChannel::pair();
        let cid = Uuid::new_v4();
        let mut request = Command::new_request(Request::Discovery);
        request.set_client_id(Some(cid));
        let request_frame = Packet::new_command(request).format().unwrap();

        let mut response = Command::new_result(Request::Discovery, CommandResult::Success);
        response.set_client_id(Some(cid));
        daemon.enqueue(Packet::new_command(response).format().unwrap()).unwrap();
        daemon.flush_writes().unwrap();

        let matcher: Matcher<Command> = Box::new(move |cmd| expect_common(cmd, Request::Discovery, Some(cid)));
        let mut expecter = Expecter::new(&mut tool).with_poll_interval(Duration::from_millis(1));
        match expecter.run(request_frame, &[matcher], Duration::from_millis(50)) {
            ExpectOutcome::Match(cmd) => assert_eq!(cmd.result(), CommandResult::Success),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn run_times_out_with_no_response() {
        let (mut tool, _daemon) = LoopbackChannel::pair();
        let request = Command::new_request(Request::Discovery);
        let request_frame = Packet::new_command(request).format().unwrap();
        let matcher: Matcher<Command> = Box::new(|cmd| expect_common(cmd, Request::Discovery, None));
        let mut expecter = Expecter::new(&mut tool).with_poll_interval(Duration::from_millis(1));
        match expecter.run(request_frame, &[matcher], Duration::from_millis(10)) {
            ExpectOutcome::Timeout => {}
            _ => panic!("expected a timeout"),
        }
    }
}
