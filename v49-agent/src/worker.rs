// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The per-stream worker controller: the state machine behind one assigned
Stream ID, handling Open/Configure/Start/Stop/Close/Release and
Timestamp-Control commands.
*/

use log::debug;
use uuid::Uuid;
use vita49::{
    AccessBits, Command, CommandResult, CommonHeader, Request, ResourceDescriptor, Role, Tsf, Tsi,
    TimestampInterpretation,
};

use crate::errors::AgentError;

/// A worker's lifecycle state. `Armed` is entered by `Start`'s
/// trigger-arm step before the pipeline begins moving samples; `Running`
/// follows immediately once packet assembly/unpacking is enabled.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WorkerState {
    /// SID assigned, pipeline not yet claimed.
    Allocated,
    /// Pipeline access bits claimed; packetizer/packer configured.
    Open,
    /// Trigger armed, about to start moving samples.
    Armed,
    /// Packet assembly/unpacking enabled.
    Running,
    /// Stopped; pipeline still claimed.
    Stopped,
    /// Pipeline reset and gated off.
    Closed,
    /// Torn down; no longer addressable by its former SID.
    Released,
}

impl WorkerState {
    fn name(self) -> &'static str {
        match self {
            WorkerState::Allocated => "Allocated",
            WorkerState::Open => "Open",
            WorkerState::Armed => "Armed",
            WorkerState::Running => "Running",
            WorkerState::Stopped => "Stopped",
            WorkerState::Closed => "Closed",
            WorkerState::Released => "Released",
        }
    }
}

/// A capability a real process-per-worker deployment would need beyond
/// the in-process object this crate ships by default: terminating the
/// child on Release/daemon shutdown. The bundled [`Worker`] implements
/// this as a state transition; a process-per-worker deployment would
/// send `SIGTERM` and reap the child here instead.
pub trait WorkerHandle {
    /// Terminates the worker, releasing any resources it still holds.
    fn terminate(&mut self);
}

/// The hardware/pipeline binding a worker's Open/Close handlers claim
/// and release. This crate ships no SPI/AD9361/ASFE/DMA driver; a
/// deployment wires a real implementation in, and tests use
/// [`NullIoctlTarget`].
pub trait IoctlTarget {
    /// Claims the pipeline resources for `direction`. An error here maps
    /// to `AgentError::AccessDenied` at the call site.
    fn claim(&mut self, direction: AccessBits) -> Result<(), String>;
    /// Releases whatever the most recent successful `claim` acquired.
    fn release(&mut self);
}

/// An `IoctlTarget` that always succeeds and does nothing, standing in
/// for real hardware in tests and in deployments with no pipeline to
/// drive.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullIoctlTarget;

impl IoctlTarget for NullIoctlTarget {
    fn claim(&mut self, _direction: AccessBits) -> Result<(), String> {
        Ok(())
    }
    fn release(&mut self) {}
}

/// One accessed resource stream: assigned Stream ID, owning client,
/// resource descriptor, direction, and lifecycle state. Exactly one
/// `Worker` exists per assigned SID at any moment, owned by the
/// manager's worker set.
#[derive(Debug)]
pub struct Worker {
    sid: u32,
    client_id: Uuid,
    resource: ResourceDescriptor,
    direction: AccessBits,
    state: WorkerState,
    running: bool,
    claimed_access: AccessBits,
    /// Packet payload size in samples, set by Configure. Stop divides
    /// the requested sample count by this to get a packet count.
    configured_packet_samples: Option<u32>,
    /// Control-client handle this worker's northbound traffic is
    /// unicast to, set when the worker was accessed.
    destination: Uuid,
}

impl Worker {
    /// Allocates a new worker bound to `resource`, owned by `client_id`,
    /// with the given Stream ID. Starts in `Allocated` state; no access
    /// bits are claimed yet.
    pub fn new(
        sid: u32,
        client_id: Uuid,
        resource: ResourceDescriptor,
        direction: AccessBits,
    ) -> Worker {
        Worker {
            sid,
            client_id,
            resource,
            direction,
            state: WorkerState::Allocated,
            running: false,
            claimed_access: AccessBits::empty(),
            configured_packet_samples: None,
            destination: client_id,
        }
    }

    /// Assigned Stream ID.
    pub fn sid(&self) -> u32 {
        self.sid
    }
    /// Client ID that accessed this worker; authorizes Release.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }
    /// The resource descriptor this worker streams to/from.
    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }
    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state
    }
    /// True while the worker is in the `Running` state.
    pub fn running(&self) -> bool {
        self.running
    }
    /// The control-client handle this worker's northbound traffic is
    /// unicast to.
    pub fn destination(&self) -> Uuid {
        self.destination
    }

    fn wrong_state(&self) -> AgentError {
        AgentError::WrongState {
            state: self.state.name(),
        }
    }

    /// Handles an Open command: claims the resource's access bits for
    /// this worker's direction, then claims the underlying pipeline
    /// through `ioctl_target`. Fails `AccessDenied` if the descriptor
    /// doesn't grant the requested direction, or if the pipeline claim
    /// itself fails (process-wide exclusivity of the access bits is
    /// enforced by the manager before this is called).
    pub fn open(&mut self, ioctl_target: &mut dyn IoctlTarget) -> Result<Command, AgentError> {
        if self.state != WorkerState::Allocated {
            return Err(self.wrong_state());
        }
        if !self.resource.access().contains(self.direction) {
            return Err(AgentError::AccessDenied(
                "resource does not grant requested direction",
            ));
        }
        ioctl_target
            .claim(self.direction)
            .map_err(|_| AgentError::AccessDenied("pipeline claim failed"))?;
        self.claimed_access = self.direction;
        self.state = WorkerState::Open;
        Ok(self.result(Request::Open, CommandResult::Success))
    }

    /// Handles a Configure command. Only `TSI=None, TSF=SampleCount` is
    /// an accepted timestamp mode; any other combination is
    /// `InvalidArg`. `packet_samples` (carried as the command's
    /// `EventPeriod` field) sets the packet payload size Stop will use
    /// to compute a packet count.
    pub fn configure(
        &mut self,
        header: &CommonHeader,
        packet_samples: Option<u32>,
    ) -> Result<Command, AgentError> {
        if self.state != WorkerState::Open {
            return Err(self.wrong_state());
        }
        if header.tsi() != Tsi::None || header.tsf() != Tsf::SampleCount {
            return Err(AgentError::InvalidArg(
                "Configure requires TSI=None, TSF=SampleCount",
            ));
        }
        let packet_samples = packet_samples
            .filter(|n| *n > 0)
            .ok_or(AgentError::InvalidArg("Configure requires a non-zero EventPeriod"))?;
        self.configured_packet_samples = Some(packet_samples);
        Ok(self.result(Request::Configure, CommandResult::Success))
    }

    /// Handles a TimestampControl command, using the same TSI/TSF
    /// acceptance rule as Configure.
    pub fn timestamp_control(&mut self, header: &CommonHeader) -> Result<Command, AgentError> {
        if header.tsi() != Tsi::None || header.tsf() != Tsf::SampleCount {
            return Err(AgentError::InvalidArg(
                "TimestampControl requires TSI=None, TSF=SampleCount",
            ));
        }
        Ok(self.result(Request::TimestampControl, CommandResult::Success))
    }

    /// Handles a Start command: requires a prior Configure (a configured
    /// packet size), arms the trigger, and transitions to Running.
    pub fn start(&mut self) -> Result<Command, AgentError> {
        if self.state != WorkerState::Open && self.state != WorkerState::Stopped {
            return Err(self.wrong_state());
        }
        if self.configured_packet_samples.is_none() {
            return Err(AgentError::InvalidArg("Start requires a prior Configure"));
        }
        self.state = WorkerState::Armed;
        self.running = true;
        self.state = WorkerState::Running;
        Ok(self.result(Request::Start, CommandResult::Success))
    }

    /// Handles a Stop command. Requires
    /// `TimestampInterpretation::Relative`; the header's `ts_fractional`
    /// field is interpreted as a sample count, from which a packet count
    /// is computed using the configured packet size
    /// (`packets = samples / packet_payload_samples`).
    pub fn stop(
        &mut self,
        header: &CommonHeader,
        interpretation: Option<TimestampInterpretation>,
    ) -> Result<Command, AgentError> {
        if self.state != WorkerState::Running {
            return Err(self.wrong_state());
        }
        if interpretation != Some(TimestampInterpretation::Relative) {
            return Err(AgentError::InvalidArg(
                "Stop requires TimestampInterpretation=Relative",
            ));
        }
        let samples = header.ts_fractional().unwrap_or(0);
        let packet_samples = self.configured_packet_samples.unwrap_or(1).max(1) as u64;
        let packets = samples / packet_samples;
        debug!(
            "stop: sid {} -> {samples} samples, {packets} pkts",
            self.sid
        );
        self.running = false;
        self.state = WorkerState::Stopped;
        Ok(self.result(Request::Stop, CommandResult::Success))
    }

    /// Handles a Close command: resets and gates off the pipeline.
    pub fn close(&mut self, ioctl_target: &mut dyn IoctlTarget) -> Result<Command, AgentError> {
        if self.state == WorkerState::Running {
            return Err(self.wrong_state());
        }
        ioctl_target.release();
        self.claimed_access = AccessBits::empty();
        self.state = WorkerState::Closed;
        Ok(self.result(Request::Close, CommandResult::Success))
    }

    /// Handles a Release command: terminates the worker. The manager is
    /// responsible for removing it from the worker set and freeing its
    /// SID for eventual (non-immediate) reuse after this returns.
    pub fn release(&mut self) -> Result<Command, AgentError> {
        self.running = false;
        self.state = WorkerState::Released;
        Ok(self.result(Request::Release, CommandResult::Success))
    }

    fn result(&self, request: Request, result: CommandResult) -> Command {
        let mut cmd = Command::new_result(request, result);
        cmd.set_client_id(Some(self.client_id));
        cmd.set_stream_id_assignment(Some(self.sid));
        cmd
    }
}

impl WorkerHandle for Worker {
    fn terminate(&mut self) {
        self.running = false;
        self.state = WorkerState::Released;
    }
}

/// Dispatches `command` (already known to target this worker's SID) to
/// the matching state-machine handler, returning the Result-role
/// response. `header` carries the packet-level TSI/TSF/`ts_fractional`
/// fields Configure/TimestampControl/Stop consult; `ioctl_target` is the
/// pipeline binding Open/Close claim and release. `role` must be
/// `Request`; any other role is a logged, silently-dropped condition at
/// the dispatcher layer, not handled here.
pub fn handle(
    worker: &mut Worker,
    header: &CommonHeader,
    command: &Command,
    ioctl_target: &mut dyn IoctlTarget,
) -> Result<Command, AgentError> {
    debug_assert_eq!(command.role(), Role::Request);
    match command.request() {
        Request::Open => worker.open(ioctl_target),
        Request::Configure => worker.configure(header, command.event_period()),
        Request::Start => worker.start(),
        Request::Stop => worker.stop(header, command.timestamp_interpretation()),
        Request::Close => worker.close(ioctl_target),
        Request::Release => worker.release(),
        Request::TimestampControl => worker.timestamp_control(header),
        Request::Discovery | Request::Enumeration | Request::Access => Err(AgentError::InvalidArg(
            "routed to worker by mistake: manager-only request",
        )),
        Request::ContextReport => Err(AgentError::InvalidArg(
            "ContextReport is not yet handled by the worker state machine",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita49::PacketType;

    fn resource(access: AccessBits) -> ResourceDescriptor {
        ResourceDescriptor::new(Uuid::new_v4(), "radio0", 1, 1, 61.44, 64, 4096, access, None)
            .unwrap()
    }

    fn sample_count_header() -> CommonHeader {
        let mut h = CommonHeader::new(PacketType::Command);
        h.set_tsi(Tsi::None);
        h.set_tsf(Tsf::SampleCount);
        h
    }

    #[test]
    fn open_requires_matching_access_bits() {
        let mut worker = Worker::new(1, Uuid::new_v4(), resource(AccessBits::RX), AccessBits::TX);
        let mut target = NullIoctlTarget;
        assert!(worker.open(&mut target).is_err());
        assert_eq!(worker.state(), WorkerState::Allocated);
    }

    #[test]
    fn full_lifecycle_succeeds() {
        let mut worker = Worker::new(1, Uuid::new_v4(), resource(AccessBits::TX), AccessBits::TX);
        let mut target = NullIoctlTarget;
        let header = sample_count_header();
        worker.open(&mut target).unwrap();
        worker.configure(&header, Some(1024)).unwrap();
        worker.start().unwrap();
        assert!(worker.running());

        let mut stop_header = CommonHeader::new(PacketType::Command);
        stop_header.set_timestamps(Tsi::None, None, Tsf::SampleCount, Some(4096)).unwrap();
        worker
            .stop(&stop_header, Some(TimestampInterpretation::Relative))
            .unwrap();
        assert!(!worker.running());
        worker.close(&mut target).unwrap();
        worker.release().unwrap();
        assert_eq!(worker.state(), WorkerState::Released);
    }

    #[test]
    fn stop_requires_relative_interpretation() {
        let mut worker = Worker::new(1, Uuid::new_v4(), resource(AccessBits::TX), AccessBits::TX);
        let mut target = NullIoctlTarget;
        let header = sample_count_header();
        worker.open(&mut target).unwrap();
        worker.configure(&header, Some(1024)).unwrap();
        worker.start().unwrap();
        let err = worker
            .stop(&header, Some(TimestampInterpretation::Absolute))
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArg(_)));
    }

    #[test]
    fn start_without_configure_is_invalid_arg() {
        let mut worker = Worker::new(1, Uuid::new_v4(), resource(AccessBits::TX), AccessBits::TX);
        let mut target = NullIoctlTarget;
        worker.open(&mut target).unwrap();
        assert!(matches!(worker.start(), Err(AgentError::InvalidArg(_))));
    }

    #[test]
    fn configure_rejects_non_sample_count_format() {
        let mut worker = Worker::new(1, Uuid::new_v4(), resource(AccessBits::TX), AccessBits::TX);
        let mut target = NullIoctlTarget;
        worker.open(&mut target).unwrap();
        let mut bad_header = CommonHeader::new(PacketType::Command);
        bad_header.set_tsi(Tsi::Utc);
        let err = worker.configure(&bad_header, Some(1024)).unwrap_err();
        assert!(matches!(err, AgentError::InvalidArg(_)));
    }
}
