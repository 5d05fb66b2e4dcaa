// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to Command sub-packets: Discovery,
Enumeration, Access, Open, Configure, Start, Stop, Close, Release,
ContextReport, and TimestampControl.
*/

use core::fmt;

use uuid::Uuid;

use crate::errors::{Category, SubCode, VitaError};
use crate::resource::{ResourceDescriptor, RESOURCE_INFO_SIZE};

/// Who is speaking: a request from a tool, a result from the daemon, an
/// unsolicited notification, or an internal local-control message.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    /// A request from a tool.
    Request,
    /// A result from the daemon, in response to a request.
    Result,
    /// An unsolicited notification from the daemon.
    Notify,
    /// An internal local-control message.
    Internal,
}

impl Role {
    fn from_wire(v: u8) -> Result<Role, VitaError> {
        match v {
            0 => Ok(Role::Request),
            1 => Ok(Role::Result),
            2 => Ok(Role::Notify),
            3 => Ok(Role::Internal),
            _ => Err(VitaError::parse(Category::Command, SubCode::CommandRange)),
        }
    }
    fn to_wire(self) -> u8 {
        match self {
            Role::Request => 0,
            Role::Result => 1,
            Role::Notify => 2,
            Role::Internal => 3,
        }
    }
}

/// The verb a Command packet carries.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Request {
    /// List the UUIDs of every resource the daemon knows about.
    Discovery,
    /// Describe one or more resources in full.
    Enumeration,
    /// Claim exclusive use of a resource, assigning it a Stream ID.
    Access,
    /// Claim the underlying pipeline for an accessed resource's worker.
    Open,
    /// Set a worker's timestamp/sample-format configuration.
    Configure,
    /// Arm and start a configured worker.
    Start,
    /// Stop a running worker.
    Stop,
    /// Reset and gate off a worker's pipeline.
    Close,
    /// Tear down a worker and free its Stream ID.
    Release,
    /// Report a worker's current Context values.
    ContextReport,
    /// Set a worker's timestamp interpretation mode.
    TimestampControl,
}

impl Request {
    fn from_wire(v: u8) -> Result<Request, VitaError> {
        match v {
            0 => Ok(Request::Discovery),
            1 => Ok(Request::Enumeration),
            2 => Ok(Request::Access),
            3 => Ok(Request::Open),
            4 => Ok(Request::Configure),
            5 => Ok(Request::Start),
            6 => Ok(Request::Stop),
            7 => Ok(Request::Close),
            8 => Ok(Request::Release),
            9 => Ok(Request::ContextReport),
            10 => Ok(Request::TimestampControl),
            _ => Err(VitaError::parse(Category::Command, SubCode::CommandRange)),
        }
    }
    fn to_wire(self) -> u8 {
        match self {
            Request::Discovery => 0,
            Request::Enumeration => 1,
            Request::Access => 2,
            Request::Open => 3,
            Request::Configure => 4,
            Request::Start => 5,
            Request::Stop => 6,
            Request::Close => 7,
            Request::Release => 8,
            Request::ContextReport => 9,
            Request::TimestampControl => 10,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Outcome reported in a Result-role Command.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandResult {
    /// The request was processed successfully.
    Success,
    /// The request failed for a reason not otherwise enumerated.
    Unspecified,
    /// The request's arguments were malformed or inconsistent.
    InvalidArg,
    /// A named resource or Stream ID does not exist.
    NotFound,
    /// Resource allocation (e.g. a new worker) failed.
    AllocFailed,
    /// The resource is already in use by another client.
    AccessDenied,
}

impl CommandResult {
    fn from_wire(v: u8) -> Result<CommandResult, VitaError> {
        match v {
            0 => Ok(CommandResult::Success),
            1 => Ok(CommandResult::Unspecified),
            2 => Ok(CommandResult::InvalidArg),
            3 => Ok(CommandResult::NotFound),
            4 => Ok(CommandResult::AllocFailed),
            5 => Ok(CommandResult::AccessDenied),
            _ => Err(VitaError::parse(Category::Command, SubCode::CommandRange)),
        }
    }
    fn to_wire(self) -> u8 {
        match self {
            CommandResult::Success => 0,
            CommandResult::Unspecified => 1,
            CommandResult::InvalidArg => 2,
            CommandResult::NotFound => 3,
            CommandResult::AllocFailed => 4,
            CommandResult::AccessDenied => 5,
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// How a `TimestampControl`/Stop request's `ts_fractional` field should be
/// interpreted.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimestampInterpretation {
    /// Act as soon as possible, ignoring the timestamp fields.
    Immediate,
    /// The timestamp fields give an absolute point in time.
    Absolute,
    /// The timestamp fields give an offset relative to the current time.
    Relative,
}

impl TimestampInterpretation {
    fn from_wire(v: u32) -> Result<TimestampInterpretation, VitaError> {
        match v {
            0 => Ok(TimestampInterpretation::Immediate),
            1 => Ok(TimestampInterpretation::Absolute),
            2 => Ok(TimestampInterpretation::Relative),
            _ => Err(VitaError::parse(Category::Command, SubCode::CommandRange)),
        }
    }
    fn to_wire(self) -> u32 {
        match self {
            TimestampInterpretation::Immediate => 0,
            TimestampInterpretation::Absolute => 1,
            TimestampInterpretation::Relative => 2,
        }
    }
}

/// Bit positions of the optional fields in a Command packet's indicator
/// bitmap, descending from bit 31. Bits 21..0 are reserved and must be
/// zero.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandIndicators(u32);

macro_rules! indicator_bit {
    ($get:ident, $set:ident, $bit:expr) => {
        /// See field documentation on the enclosing type.
        pub fn $get(&self) -> bool {
            self.0 & (1 << $bit) != 0
        }
        /// See field documentation on the enclosing type.
        pub fn $set(&mut self, value: bool) {
            self.0 = (self.0 & !(1 << $bit)) | ((value as u32) << $bit);
        }
    };
}

impl CommandIndicators {
    indicator_bit!(paging, set_paging, 31);
    indicator_bit!(client_id, set_client_id, 30);
    indicator_bit!(priority, set_priority, 29);
    indicator_bit!(resource_id_list, set_resource_id_list, 28);
    indicator_bit!(resource_info_list, set_resource_info_list, 27);
    indicator_bit!(stream_id_assignment, set_stream_id_assignment, 26);
    indicator_bit!(
        timestamp_interpretation,
        set_timestamp_interpretation,
        25
    );
    indicator_bit!(timestamp_format, set_timestamp_format, 24);
    indicator_bit!(event_period, set_event_period, 23);
    indicator_bit!(context_indicators, set_context_indicators, 22);

    /// Raw bitmap value.
    pub fn bits(&self) -> u32 {
        self.0
    }
    /// Builds from a raw bitmap value, rejecting reserved bits.
    pub fn from_bits(bits: u32) -> Result<CommandIndicators, VitaError> {
        if bits & 0x003F_FFFF != 0 {
            return Err(VitaError::ReservedField);
        }
        Ok(CommandIndicators(bits))
    }
}

/// A Command sub-packet: Discovery, Enumeration, Access, Open, Configure,
/// Start, Stop, Close, Release, ContextReport, or TimestampControl.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    role: Role,
    request: Request,
    result: CommandResult,
    indicators: CommandIndicators,
    client_id: Option<Uuid>,
    priority: Option<u32>,
    resource_id_list: Option<Vec<Uuid>>,
    resource_info_list: Option<Vec<ResourceDescriptor>>,
    stream_id_assignment: Option<u32>,
    timestamp_interpretation: Option<TimestampInterpretation>,
    timestamp_format: Option<u32>,
    event_period: Option<u32>,
    context_indicators: Option<u32>,
}

impl Command {
    /// Builds a bare request with no optional fields set.
    pub fn new_request(request: Request) -> Command {
        Command {
            role: Role::Request,
            request,
            result: CommandResult::Success,
            indicators: CommandIndicators::default(),
            client_id: None,
            priority: None,
            resource_id_list: None,
            resource_info_list: None,
            stream_id_assignment: None,
            timestamp_interpretation: None,
            timestamp_format: None,
            event_period: None,
            context_indicators: None,
        }
    }

    /// Builds a bare Result-role response to `request` with the given
    /// outcome code and no other optional fields set.
    pub fn new_result(request: Request, result: CommandResult) -> Command {
        Command {
            role: Role::Result,
            request,
            result,
            indicators: CommandIndicators::default(),
            client_id: None,
            priority: None,
            resource_id_list: None,
            resource_info_list: None,
            stream_id_assignment: None,
            timestamp_interpretation: None,
            timestamp_format: None,
            event_period: None,
            context_indicators: None,
        }
    }

    /// Gets the role.
    pub fn role(&self) -> Role {
        self.role
    }
    /// Sets the role.
    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }
    /// Gets the request verb.
    pub fn request(&self) -> Request {
        self.request
    }
    /// Sets the request verb.
    pub fn set_request(&mut self, request: Request) {
        self.request = request;
    }
    /// Gets the result code. Only meaningful when `role() == Role::Result`.
    pub fn result(&self) -> CommandResult {
        self.result
    }
    /// Sets the result code.
    pub fn set_result(&mut self, result: CommandResult) {
        self.result = result;
    }
    /// Gets the indicator bitmap.
    pub fn indicators(&self) -> CommandIndicators {
        self.indicators
    }

    /// Gets the `Paging` indicator: true if more fragments follow.
    pub fn paging(&self) -> bool {
        self.indicators.paging()
    }
    /// Sets the `Paging` indicator.
    pub fn set_paging(&mut self, paging: bool) {
        self.indicators.set_paging(paging);
    }

    /// Gets the client identifier, if present.
    pub fn client_id(&self) -> Option<Uuid> {
        self.client_id
    }
    /// Sets the client identifier, updating the indicator bit to match.
    pub fn set_client_id(&mut self, cid: Option<Uuid>) {
        self.indicators.set_client_id(cid.is_some());
        self.client_id = cid;
    }

    /// Gets the priority field, if present.
    pub fn priority(&self) -> Option<u32> {
        self.priority
    }
    /// Sets the priority field, updating the indicator bit to match.
    pub fn set_priority(&mut self, priority: Option<u32>) {
        self.indicators.set_priority(priority.is_some());
        self.priority = priority;
    }

    /// Gets the resource identifier list, if present.
    pub fn resource_id_list(&self) -> Option<&[Uuid]> {
        self.resource_id_list.as_deref()
    }
    /// Sets the resource identifier list, updating the indicator bit to
    /// match.
    pub fn set_resource_id_list(&mut self, list: Option<Vec<Uuid>>) {
        self.indicators.set_resource_id_list(list.is_some());
        self.resource_id_list = list;
    }

    /// Gets the resource info list, if present.
    pub fn resource_info_list(&self) -> Option<&[ResourceDescriptor]> {
        self.resource_info_list.as_deref()
    }
    /// Sets the resource info list, updating the indicator bit to match.
    pub fn set_resource_info_list(&mut self, list: Option<Vec<ResourceDescriptor>>) {
        self.indicators.set_resource_info_list(list.is_some());
        self.resource_info_list = list;
    }

    /// Gets the assigned Stream ID, if present.
    pub fn stream_id_assignment(&self) -> Option<u32> {
        self.stream_id_assignment
    }
    /// Sets the assigned Stream ID, updating the indicator bit to match.
    pub fn set_stream_id_assignment(&mut self, sid: Option<u32>) {
        self.indicators.set_stream_id_assignment(sid.is_some());
        self.stream_id_assignment = sid;
    }

    /// Gets the timestamp interpretation mode, if present.
    pub fn timestamp_interpretation(&self) -> Option<TimestampInterpretation> {
        self.timestamp_interpretation
    }
    /// Sets the timestamp interpretation mode, updating the indicator bit
    /// to match.
    pub fn set_timestamp_interpretation(&mut self, ti: Option<TimestampInterpretation>) {
        self.indicators.set_timestamp_interpretation(ti.is_some());
        self.timestamp_interpretation = ti;
    }

    /// Gets the timestamp format field, if present.
    pub fn timestamp_format(&self) -> Option<u32> {
        self.timestamp_format
    }
    /// Sets the timestamp format field, updating the indicator bit to
    /// match.
    pub fn set_timestamp_format(&mut self, tf: Option<u32>) {
        self.indicators.set_timestamp_format(tf.is_some());
        self.timestamp_format = tf;
    }

    /// Gets the event period field, if present.
    pub fn event_period(&self) -> Option<u32> {
        self.event_period
    }
    /// Sets the event period field, updating the indicator bit to match.
    pub fn set_event_period(&mut self, period: Option<u32>) {
        self.indicators.set_event_period(period.is_some());
        self.event_period = period;
    }

    /// Gets the nested Context indicator bitmap carried by a
    /// `ContextReport` result, if present.
    pub fn context_indicators(&self) -> Option<u32> {
        self.context_indicators
    }
    /// Sets the nested Context indicator bitmap, updating the indicator
    /// bit to match.
    pub fn set_context_indicators(&mut self, bits: Option<u32>) {
        self.indicators.set_context_indicators(bits.is_some());
        self.context_indicators = bits;
    }

    /// Parses a Command sub-packet body (everything after the class id
    /// and stream id/timestamp fields). Walks the indicator bitmap from
    /// most significant to least significant, per spec, consuming
    /// exactly the bytes declared for each present field.
    pub fn parse(buf: &[u8]) -> Result<Command, VitaError> {
        let short = || VitaError::parse(Category::Command, SubCode::ShortRead);
        if buf.len() < 4 {
            return Err(short());
        }
        let role = Role::from_wire(buf[0])?;
        let request = Request::from_wire(buf[1])?;
        let result = CommandResult::from_wire(buf[2])?;
        // buf[3] reserved/pad.
        if buf.len() < 8 {
            return Err(short());
        }
        let indicators =
            CommandIndicators::from_bits(u32::from_be_bytes(buf[4..8].try_into().unwrap()))?;
        let mut cursor = 8usize;
        let mut take = |n: usize| -> Result<&[u8], VitaError> {
            let end = cursor.checked_add(n).ok_or_else(short)?;
            let slice = buf.get(cursor..end).ok_or_else(short)?;
            cursor = end;
            Ok(slice)
        };

        let client_id = if indicators.client_id() {
            Some(Uuid::from_u128(u128::from_be_bytes(
                take(16)?.try_into().unwrap(),
            )))
        } else {
            None
        };
        let priority = if indicators.priority() {
            Some(u32::from_be_bytes(take(4)?.try_into().unwrap()))
        } else {
            None
        };
        let resource_id_list = if indicators.resource_id_list() {
            let count = u32::from_be_bytes(take(4)?.try_into().unwrap()) as usize;
            let needed = count
                .checked_mul(16)
                .ok_or_else(|| VitaError::parse(Category::Command, SubCode::ListSize))?;
            if buf.len() < cursor + needed {
                return Err(VitaError::parse(Category::Command, SubCode::ListSize));
            }
            let mut list = Vec::with_capacity(count);
            for _ in 0..count {
                list.push(Uuid::from_u128(u128::from_be_bytes(
                    take(16)?.try_into().unwrap(),
                )));
            }
            Some(list)
        } else {
            None
        };
        let resource_info_list = if indicators.resource_info_list() {
            let count = u32::from_be_bytes(take(4)?.try_into().unwrap()) as usize;
            let needed = count
                .checked_mul(RESOURCE_INFO_SIZE)
                .ok_or_else(|| VitaError::parse(Category::Command, SubCode::ListSize))?;
            if buf.len() < cursor + needed {
                return Err(VitaError::parse(Category::Command, SubCode::ListSize));
            }
            let mut list = Vec::with_capacity(count);
            for _ in 0..count {
                let raw: [u8; RESOURCE_INFO_SIZE] = take(RESOURCE_INFO_SIZE)?.try_into().unwrap();
                list.push(ResourceDescriptor::from_wire(&raw)?);
            }
            Some(list)
        } else {
            None
        };
        let stream_id_assignment = if indicators.stream_id_assignment() {
            Some(u32::from_be_bytes(take(4)?.try_into().unwrap()))
        } else {
            None
        };
        let timestamp_interpretation = if indicators.timestamp_interpretation() {
            Some(TimestampInterpretation::from_wire(u32::from_be_bytes(
                take(4)?.try_into().unwrap(),
            ))?)
        } else {
            None
        };
        let timestamp_format = if indicators.timestamp_format() {
            Some(u32::from_be_bytes(take(4)?.try_into().unwrap()))
        } else {
            None
        };
        let event_period = if indicators.event_period() {
            Some(u32::from_be_bytes(take(4)?.try_into().unwrap()))
        } else {
            None
        };
        let context_indicators = if indicators.context_indicators() {
            Some(u32::from_be_bytes(take(4)?.try_into().unwrap()))
        } else {
            None
        };

        Ok(Command {
            role,
            request,
            result,
            indicators,
            client_id,
            priority,
            resource_id_list,
            resource_info_list,
            stream_id_assignment,
            timestamp_interpretation,
            timestamp_format,
            event_period,
            context_indicators,
        })
    }

    /// Formats this Command sub-packet into its wire body (everything
    /// after the class id and stream id/timestamp fields).
    pub fn format(&self) -> Result<Vec<u8>, VitaError> {
        let mut out = Vec::new();
        out.push(self.role.to_wire());
        out.push(self.request.to_wire());
        out.push(self.result.to_wire());
        out.push(0); // reserved
        out.extend_from_slice(&self.indicators.bits().to_be_bytes());

        if let Some(cid) = self.client_id {
            out.extend_from_slice(&cid.as_u128().to_be_bytes());
        }
        if let Some(priority) = self.priority {
            out.extend_from_slice(&priority.to_be_bytes());
        }
        if let Some(list) = &self.resource_id_list {
            out.extend_from_slice(&(list.len() as u32).to_be_bytes());
            for uuid in list {
                out.extend_from_slice(&uuid.as_u128().to_be_bytes());
            }
        }
        if let Some(list) = &self.resource_info_list {
            out.extend_from_slice(&(list.len() as u32).to_be_bytes());
            for desc in list {
                out.extend_from_slice(&desc.to_wire()?);
            }
        }
        if let Some(sid) = self.stream_id_assignment {
            out.extend_from_slice(&sid.to_be_bytes());
        }
        if let Some(ti) = self.timestamp_interpretation {
            out.extend_from_slice(&ti.to_wire().to_be_bytes());
        }
        if let Some(tf) = self.timestamp_format {
            out.extend_from_slice(&tf.to_be_bytes());
        }
        if let Some(period) = self.event_period {
            out.extend_from_slice(&period.to_be_bytes());
        }
        if let Some(bits) = self.context_indicators {
            out.extend_from_slice(&bits.to_be_bytes());
        }
        Ok(out)
    }

    /// Splits this Command into one or more fragments whose formatted
    /// size each fits within `max_body_bytes`, setting the `Paging`
    /// indicator on every fragment but the last. Only the
    /// `resource_info_list` or `resource_id_list` field (whichever is
    /// present) is split across fragments; every other field is repeated
    /// identically on each fragment.
    ///
    /// Returns a single-element vector, unmodified, if this Command
    /// already fits.
    pub fn paginate(&self, max_body_bytes: usize) -> Result<Vec<Command>, VitaError> {
        if self.format()?.len() <= max_body_bytes {
            return Ok(vec![self.clone()]);
        }
        let too_large = |category| VitaError::parse(category, SubCode::BadSize);

        if let Some(list) = &self.resource_info_list {
            let mut base = self.clone();
            base.set_resource_info_list(None);
            let base_len = base.format()?.len();
            let budget = max_body_bytes
                .checked_sub(base_len + 4)
                .ok_or_else(|| too_large(Category::Command))?;
            let per_entry = crate::resource::RESOURCE_INFO_SIZE;
            let chunk_size = (budget / per_entry).max(1);
            let mut fragments = Vec::new();
            for (i, chunk) in list.chunks(chunk_size).enumerate() {
                let is_last = (i + 1) * chunk_size >= list.len();
                let mut frag = base.clone();
                frag.set_resource_info_list(Some(chunk.to_vec()));
                frag.set_paging(!is_last);
                fragments.push(frag);
            }
            return Ok(fragments);
        }
        if let Some(list) = &self.resource_id_list {
            let mut base = self.clone();
            base.set_resource_id_list(None);
            let base_len = base.format()?.len();
            let budget = max_body_bytes
                .checked_sub(base_len + 4)
                .ok_or_else(|| too_large(Category::Command))?;
            let chunk_size = (budget / 16).max(1);
            let mut fragments = Vec::new();
            for (i, chunk) in list.chunks(chunk_size).enumerate() {
                let is_last = (i + 1) * chunk_size >= list.len();
                let mut frag = base.clone();
                frag.set_resource_id_list(Some(chunk.to_vec()));
                frag.set_paging(!is_last);
                fragments.push(frag);
            }
            return Ok(fragments);
        }
        Err(too_large(Category::Command))
    }

    /// Re-assembles a sequence of fragments produced by [`Command::paginate`]
    /// (or received from the wire in `packet_count` order) back into one
    /// logical Command, concatenating whichever list field was split and
    /// clearing the `Paging` indicator. Fragments must share `role`,
    /// `request`, and `client_id`, per the pagination invariant (same
    /// `stream_id`/`client_id` throughout).
    pub fn reassemble(fragments: Vec<Command>) -> Result<Command, VitaError> {
        let mut iter = fragments.into_iter();
        let mut acc = iter
            .next()
            .ok_or_else(|| VitaError::parse(Category::Command, SubCode::Paging))?;
        for frag in iter {
            if frag.role != acc.role || frag.request != acc.request || frag.client_id != acc.client_id
            {
                return Err(VitaError::parse(Category::Command, SubCode::Paging));
            }
            if let Some(more) = frag.resource_info_list {
                acc.resource_info_list
                    .get_or_insert_with(Vec::new)
                    .extend(more);
            }
            if let Some(more) = frag.resource_id_list {
                acc.resource_id_list.get_or_insert_with(Vec::new).extend(more);
            }
        }
        acc.set_paging(false);
        if acc.resource_info_list.is_some() {
            acc.indicators.set_resource_info_list(true);
        }
        if acc.resource_id_list.is_some() {
            acc.indicators.set_resource_id_list(true);
        }
        Ok(acc)
    }
}
