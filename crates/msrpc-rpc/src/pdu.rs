//! DCE/RPC PDUs for connection-oriented RPC (C706 chapter 12, MS-RPCE 2.2.2).

use binrw::io::TakeSeekExt;
use binrw::prelude::*;
use modular_bitfield::prelude::*;
use msrpc_dtyp::Guid;
use msrpc_dtyp::binrw_util::prelude::*;
use msrpc_dtyp::make_guid;
use msrpc_ndr::NdrSyntax;

pub const DCE_RPC_VERSION: DceRpcVersion = DceRpcVersion { major: 5, minor: 0 };

/// Integer: little endian, character: ASCII, floating point: IEEE.
pub const PACKED_DREP_LE: u32 = 0x0000_0010;

pub const NDR20_SYNTAX: DceRpcSyntaxId = DceRpcSyntaxId {
    uuid: make_guid!("8a885d04-1ceb-11c9-9fe8-08002b104860"),
    version: 2,
};

pub const NDR64_SYNTAX: DceRpcSyntaxId = DceRpcSyntaxId {
    uuid: make_guid!("71710533-beba-4937-8319-b5dbef9ccc36"),
    version: 1,
};

/// Bind time feature negotiation (MS-RPCE 3.3.1.5.3).
/// The feature bits replace the first two bytes of `data4`.
pub const BIND_TIME_NEGOTIATION: DceRpcSyntaxId = DceRpcSyntaxId {
    uuid: make_guid!("6cb71c2c-9812-4540-0000-000000000000"),
    version: 1,
};

macro_rules! rpc_pkts {
    ($
        ($name:ident {
            $($pdu_type:ident = $pdu_oper_id:literal $(($pdu_args:ident))?,)+
        }),+
    ) => {
        pastey::paste! {
                    $(
// Entire Packet, for each direction (Request/Response).
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct [<DceRpcCo $name Pkt>] {
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _save_pdu_start: PosMarker<()>,
    // Checked by the receiver, so a bad version can be answered properly.
    rpc_ver: DceRpcVersion,
    #[bw(calc = content.get_type())]
    ptype: [<DceRpcCoPkt $name Type>],
    pfc_flags: DceRpcCoPktFlags,
    pub packed_drep: u32,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _frag_length: PosMarker<u16>,
    #[br(assert(auth_length == 0))]
    #[bw(calc = 0)]
    auth_length: u16, // authentication is not supported.
    call_id: u32,
    #[br(args(ptype, pfc_flags.object_uuid()), map_stream = |s| s.take_seek((_frag_length.value as u64).saturating_sub(16)))]
    content: [<DcRpcCoPkt $name Content>],

    #[bw(write_with = PosMarker::write_roff_b, args(&_frag_length, &_save_pdu_start))]
    _write_pdu_size: ()
}

impl [<DceRpcCo $name Pkt>] {
    pub const COMMON_SIZE_BYTES: usize = 16;

    pub fn new(content: [<DcRpcCoPkt $name Content>], call_id: u32, flags: DceRpcCoPktFlags, packed_drep: u32) -> Self {
        Self {
            rpc_ver: DCE_RPC_VERSION,
            pfc_flags: flags,
            packed_drep,
            call_id,
            content,
            _write_pdu_size: (),
        }
    }

    pub fn content(&self) -> &[<DcRpcCoPkt $name Content>] {
        &self.content
    }

    pub fn into_content(self) -> [<DcRpcCoPkt $name Content>] {
        self.content
    }

    pub fn rpc_ver(&self) -> DceRpcVersion {
        self.rpc_ver
    }

    pub fn call_id(&self) -> u32 {
        self.call_id
    }

    pub fn pfc_flags(&self) -> DceRpcCoPktFlags {
        self.pfc_flags
    }

    pub fn packed_drep(&self) -> u32 {
        self.packed_drep
    }
}

impl TryFrom<&[u8]> for [<DceRpcCo $name Pkt>] {
    type Error = binrw::Error;
    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let mut cursor = std::io::Cursor::new(data);
        Self::read_le(&mut cursor)
    }
}

impl TryInto<Vec<u8>> for [<DceRpcCo $name Pkt>] {
    type Error = binrw::Error;
    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        self.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

// Packet Type (Bind/BindAck, etc.)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum [<DceRpcCoPkt $name Type>] {
    $(
        $pdu_type = $pdu_oper_id,
    )+
}

// Packet Content, redefined for each direction.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[br(import(ptype: [<DceRpcCoPkt $name Type>], object_uuid: bool))]
pub enum [<DcRpcCoPkt $name Content>] {
        $(
            #[br(pre_assert(ptype == [<DceRpcCoPkt $name Type>]::$pdu_type))]
            $pdu_type(
                $(#[br(args_raw = $pdu_args(object_uuid))])?
                [<DcRpcCoPkt $pdu_type>]
            ),
        )+
}

impl [<DcRpcCoPkt $name Content>] {
    /// Returns the Type of the packet by its content.
    pub fn get_type(&self) -> [<DceRpcCoPkt $name Type>] {
        match self {
            $(
                Self::$pdu_type(_) => [<DceRpcCoPkt $name Type>]::$pdu_type,
            )+
        }
    }
}

$(
    impl From<[<DcRpcCoPkt $pdu_type>]> for [<DcRpcCoPkt $name Content>] {
        fn from(pkt: [<DcRpcCoPkt $pdu_type>]) -> [<DcRpcCoPkt $name Content>] {
            [<DcRpcCoPkt $name Content>]::$pdu_type(pkt)
        }
    }
)+
                    )+
                }
    };
}

rpc_pkts! {
    Request {
        Request = 0 (request_args),
        Bind = 11,
        AlterContext = 14,
        CoCancel = 18,
        Orphaned = 19,
    },
    Response {
        Response = 2,
        Fault = 3,
        BindAck = 12,
        BindNak = 13,
        AlterContextResp = 15,
        Shutdown = 17,
    }
}

/// Read arguments of a Request body: whether the object field is present.
fn request_args(object_uuid: bool) -> (bool,) {
    (object_uuid,)
}

/// The common header of every connection-oriented PDU, read without
/// interpreting the body.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(little)]
pub struct DceRpcCoHeader {
    pub rpc_ver: DceRpcVersion,
    pub ptype: u8,
    pub pfc_flags: DceRpcCoPktFlags,
    pub packed_drep: u32,
    pub frag_length: u16,
    pub auth_length: u16,
    pub call_id: u32,
}

impl DceRpcCoHeader {
    pub const SIZE: usize = 16;

    pub fn is_little_endian(&self) -> bool {
        self.packed_drep & PACKED_DREP_LE != 0
    }
}

/// Reads the common header from the start of a PDU.
pub fn peek_header(data: &[u8]) -> BinResult<DceRpcCoHeader> {
    DceRpcCoHeader::read(&mut std::io::Cursor::new(data))
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DceRpcVersion {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for DceRpcVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[msrpc_dtyp::mbitfield]
pub struct DceRpcCoPktFlags {
    pub first_frag: bool,
    pub last_frag: bool,
    /// Cancel was pending at sender
    pub pending_cancel: bool,
    #[skip]
    __: bool, // reserved
    /// supports concurrent multiplexing of a single connection.
    pub conc_mpx: bool,
    /// only meaningful on `fault' packet;
    /// if true, guaranteed call did not execute.
    pub did_not_execute: bool,
    #[skip]
    __: bool, // implementations may ignore the `maybe` flag (MS-RPCE)
    /// if true, a non-nil object UUID was specified in the handle,
    /// and is present in the optional object field.
    /// If false, the object field is omitted.
    pub object_uuid: bool,
}

impl DceRpcCoPktFlags {
    /// A PDU that is both the first and the last fragment of its call.
    pub fn single_fragment() -> Self {
        Self::new().with_first_frag(true).with_last_frag(true)
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktBind {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,

    #[bw(calc = context_elements.len() as u8)]
    num_context_items: u8,

    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u16,

    #[br(count = num_context_items)]
    pub context_elements: Vec<DcRpcCoPktBindContextElement>,
}

/// Adds presentation contexts to a bound association. Same layout as bind.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktAlterContext(pub DcRpcCoPktBind);

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktBindContextElement {
    pub context_id: u16,
    #[bw(calc = transfer_syntaxes.len() as u8)]
    pub num_transfer_syntaxes: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    pub abstract_syntax: DceRpcSyntaxId,
    #[br(count = num_transfer_syntaxes)]
    pub transfer_syntaxes: Vec<DceRpcSyntaxId>,
}

/// An interface or transfer syntax: UUID and version.
///
/// `version` packs the major version in its low 16 bits and the minor in its high 16 bits.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct DceRpcSyntaxId {
    pub uuid: Guid,
    pub version: u32,
}

impl DceRpcSyntaxId {
    pub const ZERO: Self = Self {
        uuid: Guid::ZERO,
        version: 0,
    };

    pub const fn new(uuid: Guid, major: u16, minor: u16) -> Self {
        Self {
            uuid,
            version: major as u32 | ((minor as u32) << 16),
        }
    }

    pub const fn major(&self) -> u16 {
        (self.version & 0xffff) as u16
    }

    pub const fn minor(&self) -> u16 {
        (self.version >> 16) as u16
    }

    /// The NDR flavor this transfer syntax stands for, if any.
    pub fn ndr_syntax(&self) -> Option<NdrSyntax> {
        match *self {
            NDR20_SYNTAX => Some(NdrSyntax::Ndr20),
            NDR64_SYNTAX => Some(NdrSyntax::Ndr64),
            _ => None,
        }
    }

    /// If this is a bind time feature negotiation syntax, the features it proposes.
    pub fn bind_time_features(&self) -> Option<BindTimeFeatures> {
        let prefix = BIND_TIME_NEGOTIATION.uuid;
        let is_negotiation = self.uuid.data1 == prefix.data1
            && self.uuid.data2 == prefix.data2
            && self.uuid.data3 == prefix.data3
            && self.uuid.data4[2..] == prefix.data4[2..];
        is_negotiation
            .then(|| BindTimeFeatures::from_bytes([self.uuid.data4[0], self.uuid.data4[1]]))
    }

    pub fn for_bind_time_features(features: BindTimeFeatures) -> Self {
        let mut syntax = BIND_TIME_NEGOTIATION;
        let [low, high] = features.into_bytes();
        syntax.uuid.data4[0] = low;
        syntax.uuid.data4[1] = high;
        syntax
    }
}

impl From<NdrSyntax> for DceRpcSyntaxId {
    fn from(value: NdrSyntax) -> Self {
        match value {
            NdrSyntax::Ndr20 => NDR20_SYNTAX,
            NdrSyntax::Ndr64 => NDR64_SYNTAX,
        }
    }
}

impl std::fmt::Display for DceRpcSyntaxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} v{}.{})", self.uuid, self.major(), self.minor())
    }
}

/// Features proposed by the client in a bind time feature negotiation syntax,
/// or agreed by the server in a [`DceRpcCoPktBindAckDefResult::NegotiateAck`] result.
#[msrpc_dtyp::mbitfield]
pub struct BindTimeFeatures {
    pub security_context_multiplexing: bool,
    pub keep_connection_on_orphan: bool,
    #[skip]
    __: B14,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktBindAck {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,

    #[bw(calc = port_spec.len() as u16)]
    port_spec_len: u16,
    /// The secondary address, including its null terminator.
    #[br(count = port_spec_len, try_map = |bytes: Vec<u8>| String::from_utf8(bytes))]
    #[bw(map = |s: &String| s.as_bytes().to_vec())]
    pub port_spec: String,

    #[brw(align_before = 4)]
    #[bw(calc = results.len() as u8)]
    num_results: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u16,

    #[br(count = num_results)]
    pub results: Vec<DcRpcCoPktBindAckResult>,
}

/// Answers an alter context. Same layout as bind ack.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktAlterContextResp(pub DcRpcCoPktBindAck);

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktBindAckResult {
    pub result: DceRpcCoPktBindAckDefResult,
    pub reason: DcRpcCoPktBindAckReason,
    pub syntax: DceRpcSyntaxId,
}

impl DcRpcCoPktBindAckResult {
    pub fn accepted(syntax: DceRpcSyntaxId) -> Self {
        Self {
            result: DceRpcCoPktBindAckDefResult::Acceptance,
            reason: DcRpcCoPktBindAckReason::NotSpecified,
            syntax,
        }
    }

    pub fn rejected(reason: DcRpcCoPktBindAckReason) -> Self {
        Self {
            result: DceRpcCoPktBindAckDefResult::ProviderRejection,
            reason,
            syntax: DceRpcSyntaxId::ZERO,
        }
    }

    /// A negotiate ack carries the agreed feature bits in its reason field.
    pub fn negotiate_ack(features: BindTimeFeatures) -> Self {
        let reason = match u16::from_le_bytes(features.into_bytes()) & 0x3 {
            0 => DcRpcCoPktBindAckReason::NotSpecified,
            1 => DcRpcCoPktBindAckReason::AbstractSyntaxNotSupported,
            2 => DcRpcCoPktBindAckReason::ProposedTransferSyntaxesNotSupported,
            _ => DcRpcCoPktBindAckReason::LocalLimitExceeded,
        };
        Self {
            result: DceRpcCoPktBindAckDefResult::NegotiateAck,
            reason,
            syntax: DceRpcSyntaxId::ZERO,
        }
    }

    pub fn negotiated_features(&self) -> Option<BindTimeFeatures> {
        (self.result == DceRpcCoPktBindAckDefResult::NegotiateAck)
            .then(|| BindTimeFeatures::from_bytes((self.reason as u16).to_le_bytes()))
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[brw(repr(u16))]
pub enum DceRpcCoPktBindAckDefResult {
    Acceptance = 0,
    UserRejection = 1,
    ProviderRejection = 2,
    NegotiateAck = 3,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[brw(repr(u16))]
pub enum DcRpcCoPktBindAckReason {
    NotSpecified = 0,
    AbstractSyntaxNotSupported = 1,
    ProposedTransferSyntaxesNotSupported = 2,
    LocalLimitExceeded = 3,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktBindNak {
    pub reason: DceRpcCoPktBindRejectReason,
    #[bw(calc = protocols.len() as u8)]
    num_protocols: u8,
    #[br(count = num_protocols)]
    pub protocols: Vec<DceRpcVersion>,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[brw(repr(u16))]
pub enum DceRpcCoPktBindRejectReason {
    ReasonNotSpecified = 0,
    TemporaryCongestion = 1,
    LocalLimitExceeded = 2,
    CalledPaddrUnknown = 3,
    ProtocolVersionNotSupported = 4,
    DefaultContextNotSupported = 5,
    UserDataNotReadable = 6,
    NoPsapAvailable = 7,
    AuthenticationTypeNotRecognized = 8,
    AuthenticationTypeNotSupported = 9,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
#[br(import(object_uuid: bool))]
pub struct DcRpcCoPktRequest {
    pub alloc_hint: u32,
    pub context_id: u16,
    pub opnum: u16,
    /// Present only when the header carries `PFC_OBJECT_UUID`.
    #[br(if(object_uuid))]
    pub object: Option<Guid>,

    #[br(parse_with = binrw::helpers::until_eof)]
    pub stub_data: Vec<u8>,
}

impl DcRpcCoPktRequest {
    pub const ALLOC_HINT_NONE: u32 = 0;
    /// Common header plus the request fields before the stub.
    pub const HEADER_SIZE: usize = 24;
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktResponse {
    pub alloc_hint: u32,
    pub context_id: u16,
    pub cancel_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,

    #[br(parse_with = binrw::helpers::until_eof)]
    pub stub_data: Vec<u8>,
}

impl DcRpcCoPktResponse {
    pub const HEADER_SIZE: usize = 24;
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktFault {
    pub alloc_hint: u32,
    pub context_id: u16,
    pub cancel_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    pub status: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,

    #[br(parse_with = binrw::helpers::until_eof)]
    pub stub_data: Vec<u8>,
}

/// Sent by the server before it closes the connection.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktShutdown;

/// Asks the server to cancel the call with the same call id.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktCoCancel;

/// The client abandoned the call with the same call id.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DcRpcCoPktOrphaned;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bind_writes() {
        let wkksvc_abstract_syntax = DceRpcSyntaxId {
            uuid: make_guid!("6bffd098-a112-3610-9833-46c3f87e345a"),
            version: 1,
        };

        let bind_request = DceRpcCoRequestPkt::new(
            DcRpcCoPktBind {
                max_xmit_frag: 4280,
                max_recv_frag: 4280,
                assoc_group_id: 0,
                context_elements: vec![
                    DcRpcCoPktBindContextElement {
                        context_id: 0,
                        abstract_syntax: wkksvc_abstract_syntax,
                        transfer_syntaxes: vec![DceRpcSyntaxId {
                            uuid: make_guid!("8a885d04-1ceb-11c9-9fe8-08002b104860"),
                            version: 2,
                        }],
                    },
                    DcRpcCoPktBindContextElement {
                        context_id: 1,
                        abstract_syntax: wkksvc_abstract_syntax,
                        transfer_syntaxes: vec![DceRpcSyntaxId {
                            uuid: make_guid!("71710533-beba-4937-8319-b5dbef9ccc36"),
                            version: 1,
                        }],
                    },
                    DcRpcCoPktBindContextElement {
                        context_id: 2,
                        abstract_syntax: wkksvc_abstract_syntax,
                        transfer_syntaxes: vec![DceRpcSyntaxId {
                            uuid: make_guid!("6cb71c2c-9812-4540-0300-000000000000"),
                            version: 1,
                        }],
                    },
                ],
            }
            .into(),
            2,
            DceRpcCoPktFlags::new()
                .with_first_frag(true)
                .with_last_frag(true),
            0x00000010,
        );

        let mut cursor = std::io::Cursor::new(Vec::new());
        bind_request.write_le(&mut cursor).unwrap();
        assert_eq!(
            cursor.into_inner(),
            [
                0x5, 0x0, 0xb, 0x3, 0x10, 0x0, 0x0, 0x0, 0xa0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0,
                0xb8, 0x10, 0xb8, 0x10, 0x0, 0x0, 0x0, 0x0, 0x3, 0x0, 0x0, 0x0, 0x0, 0x0, 0x1, 0x0,
                0x98, 0xd0, 0xff, 0x6b, 0x12, 0xa1, 0x10, 0x36, 0x98, 0x33, 0x46, 0xc3, 0xf8, 0x7e,
                0x34, 0x5a, 0x1, 0x0, 0x0, 0x0, 0x4, 0x5d, 0x88, 0x8a, 0xeb, 0x1c, 0xc9, 0x11,
                0x9f, 0xe8, 0x8, 0x0, 0x2b, 0x10, 0x48, 0x60, 0x2, 0x0, 0x0, 0x0, 0x1, 0x0, 0x1,
                0x0, 0x98, 0xd0, 0xff, 0x6b, 0x12, 0xa1, 0x10, 0x36, 0x98, 0x33, 0x46, 0xc3, 0xf8,
                0x7e, 0x34, 0x5a, 0x1, 0x0, 0x0, 0x0, 0x33, 0x5, 0x71, 0x71, 0xba, 0xbe, 0x37,
                0x49, 0x83, 0x19, 0xb5, 0xdb, 0xef, 0x9c, 0xcc, 0x36, 0x1, 0x0, 0x0, 0x0, 0x2, 0x0,
                0x1, 0x0, 0x98, 0xd0, 0xff, 0x6b, 0x12, 0xa1, 0x10, 0x36, 0x98, 0x33, 0x46, 0xc3,
                0xf8, 0x7e, 0x34, 0x5a, 0x1, 0x0, 0x0, 0x0, 0x2c, 0x1c, 0xb7, 0x6c, 0x12, 0x98,
                0x40, 0x45, 0x3, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0
            ]
        )
    }

    #[test]
    fn test_bind_ack_parses() {
        let data = [
            0x5, 0x0, 0xc, 0x3, 0x10, 0x0, 0x0, 0x0, 0x74, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0xb8,
            0x10, 0xb8, 0x10, 0x29, 0x3b, 0x0, 0x0, 0xd, 0x0, 0x5c, 0x50, 0x49, 0x50, 0x45, 0x5c,
            0x77, 0x6b, 0x73, 0x73, 0x76, 0x63, 0x0, 0x0, 0x3, 0x0, 0x0, 0x0, 0x2, 0x0, 0x2, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x33, 0x5, 0x71, 0x71, 0xba, 0xbe, 0x37, 0x49, 0x83,
            0x19, 0xb5, 0xdb, 0xef, 0x9c, 0xcc, 0x36, 0x1, 0x0, 0x0, 0x0, 0x3, 0x0, 0x3, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0,
        ];
        let mut cursor = std::io::Cursor::new(data);
        let bind_ack: DceRpcCoResponsePkt = DceRpcCoResponsePkt::read_le(&mut cursor).unwrap();
        assert_eq!(
            bind_ack,
            DceRpcCoResponsePkt::new(
                DcRpcCoPktBindAck {
                    max_xmit_frag: 4280,
                    max_recv_frag: 4280,
                    assoc_group_id: 0x3b29,
                    port_spec: "\\PIPE\\wkssvc\0".into(),
                    results: vec![
                        DcRpcCoPktBindAckResult {
                            result: DceRpcCoPktBindAckDefResult::ProviderRejection,
                            reason: DcRpcCoPktBindAckReason::ProposedTransferSyntaxesNotSupported,
                            syntax: DceRpcSyntaxId::ZERO
                        },
                        DcRpcCoPktBindAckResult {
                            result: DceRpcCoPktBindAckDefResult::Acceptance,
                            reason: DcRpcCoPktBindAckReason::NotSpecified,
                            syntax: DceRpcSyntaxId {
                                uuid: make_guid!("71710533-beba-4937-8319-b5dbef9ccc36"),
                                version: 1,
                            }
                        },
                        DcRpcCoPktBindAckResult {
                            result: DceRpcCoPktBindAckDefResult::NegotiateAck,
                            reason: DcRpcCoPktBindAckReason::LocalLimitExceeded,
                            syntax: DceRpcSyntaxId::ZERO
                        }
                    ]
                }
                .into(),
                2,
                DceRpcCoPktFlags::new()
                    .with_first_frag(true)
                    .with_last_frag(true),
                0x00000010,
            )
        )
    }

    #[test]
    fn test_bind_nak_parses() {
        let data = [
            0x5, 0x0, 0xd, 0x3, 0x10, 0x0, 0x0, 0x0, 0x18, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x1, 0x5, 0x0, 0x0, 0x0, 0x0,
        ];
        let mut cursor = std::io::Cursor::new(data);
        let bind_nak: DceRpcCoResponsePkt = DceRpcCoResponsePkt::read_le(&mut cursor).unwrap();
        assert_eq!(
            bind_nak,
            DceRpcCoResponsePkt::new(
                DcRpcCoPktBindNak {
                    reason: DceRpcCoPktBindRejectReason::ReasonNotSpecified,
                    protocols: vec![DceRpcVersion { major: 5, minor: 0 }],
                }
                .into(),
                2,
                DceRpcCoPktFlags::new()
                    .with_first_frag(true)
                    .with_last_frag(true),
                0x00000010,
            )
        );
    }

    #[test]
    fn test_request_write() {
        let request = DceRpcCoRequestPkt::new(
            DcRpcCoPktRequest {
                alloc_hint: 112,
                context_id: 1,
                opnum: 15,
                object: None,
                stub_data: [
                    0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0, 0x0, 0xc, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                    0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xc, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                    0x5c, 0x0, 0x5c, 0x0, 0x6c, 0x0, 0x6f, 0x0, 0x63, 0x0, 0x61, 0x0, 0x6c, 0x0,
                    0x68, 0x0, 0x6f, 0x0, 0x73, 0x0, 0x74, 0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x0,
                    0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0,
                    0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                    0x0, 0x0, 0x0, 0xff, 0xff, 0xff, 0xff, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                    0x0, 0x0, 0x0, 0x0,
                ]
                .to_vec(),
            }
            .into(),
            2,
            DceRpcCoPktFlags::new()
                .with_first_frag(true)
                .with_last_frag(true),
            0x00000010,
        );
        let data: Vec<u8> = request.try_into().unwrap();
        assert_eq!(
            data,
            [
                0x5, 0x0, 0x0, 0x3, 0x10, 0x0, 0x0, 0x0, 0x88, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0,
                0x70, 0x0, 0x0, 0x0, 0x1, 0x0, 0xf, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0, 0x0,
                0xc, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                0xc, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x5c, 0x0, 0x5c, 0x0, 0x6c, 0x0, 0x6f, 0x0,
                0x63, 0x0, 0x61, 0x0, 0x6c, 0x0, 0x68, 0x0, 0x6f, 0x0, 0x73, 0x0, 0x74, 0x0, 0x0,
                0x0, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xff, 0xff, 0xff, 0xff, 0x0, 0x0, 0x0,
                0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0
            ]
        );
    }

    #[test]
    fn test_request_with_object_uuid() {
        let data = [
            0x5, 0x0, 0x0, 0x83, 0x10, 0x0, 0x0, 0x0, 0x2c, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0,
            0x4, 0x0, 0x0, 0x0, 0x1, 0x0, 0x3, 0x0, 0x78, 0x56, 0x34, 0x12, 0x34, 0x12, 0x78,
            0x56, 0x9a, 0xbc, 0xde, 0xf0, 0x12, 0x34, 0x56, 0x78, 0xaa, 0xbb, 0xcc, 0xdd,
        ];
        let request = DceRpcCoRequestPkt::try_from(data.as_slice()).unwrap();
        let expected = DceRpcCoRequestPkt::new(
            DcRpcCoPktRequest {
                alloc_hint: 4,
                context_id: 1,
                opnum: 3,
                object: Some(make_guid!("12345678-1234-5678-9abc-def012345678")),
                stub_data: vec![0xaa, 0xbb, 0xcc, 0xdd],
            }
            .into(),
            2,
            DceRpcCoPktFlags::single_fragment().with_object_uuid(true),
            PACKED_DREP_LE,
        );
        assert_eq!(request, expected);

        let written: Vec<u8> = expected.try_into().unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn test_response_parse() {
        let data = [
            0x5, 0x0, 0x2, 0x3, 0x10, 0x0, 0x0, 0x0, 0xa0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x88,
            0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x64, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x2, 0x0, 0x0, 0x0, 0x0, 0x0, 0xf4, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x2,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x7, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x7, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x41, 0x0, 0x56, 0x0, 0x49, 0x0,
            0x56, 0x0, 0x56, 0x0, 0x4d, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x57, 0x0, 0x4f, 0x0, 0x52, 0x0, 0x4b, 0x0, 0x47, 0x0, 0x52, 0x0, 0x4f, 0x0, 0x55, 0x0,
            0x50, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
        ];
        let mut cursor = std::io::Cursor::new(data);
        let response: DceRpcCoResponsePkt = DceRpcCoResponsePkt::read_le(&mut cursor).unwrap();
        assert_eq!(
            response,
            DceRpcCoResponsePkt {
                rpc_ver: DCE_RPC_VERSION,
                pfc_flags: DceRpcCoPktFlags::new()
                    .with_first_frag(true)
                    .with_last_frag(true),
                packed_drep: 0x00000010,
                call_id: 2,
                content: DcRpcCoPktResponseContent::Response(DcRpcCoPktResponse {
                    alloc_hint: 0x88,
                    context_id: 1,
                    cancel_count: 0,
                    stub_data: [
                        0x64, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0,
                        0x0, 0xf4, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0,
                        0x0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0,
                        0x0, 0x0, 0x0, 0x7, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                        0x0, 0x0, 0x0, 0x0, 0x7, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x41, 0x0,
                        0x56, 0x0, 0x49, 0x0, 0x56, 0x0, 0x56, 0x0, 0x4d, 0x0, 0x0, 0x0, 0x0, 0x0,
                        0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
                        0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x57, 0x0, 0x4f, 0x0, 0x52,
                        0x0, 0x4b, 0x0, 0x47, 0x0, 0x52, 0x0, 0x4f, 0x0, 0x55, 0x0, 0x50, 0x0, 0x0,
                        0x0, 0x0, 0x0, 0x0, 0x0
                    ]
                    .into()
                }),
                _write_pdu_size: ()
            }
        );
    }

    #[test]
    fn test_fault_writes() {
        let fault = DceRpcCoResponsePkt::new(
            DcRpcCoPktFault {
                alloc_hint: 0,
                context_id: 1,
                cancel_count: 0,
                status: 0x1c010002,
                stub_data: vec![],
            }
            .into(),
            7,
            DceRpcCoPktFlags::single_fragment().with_did_not_execute(true),
            PACKED_DREP_LE,
        );
        let data: Vec<u8> = fault.try_into().unwrap();
        assert_eq!(
            data,
            [
                0x5, 0x0, 0x3, 0x23, 0x10, 0x0, 0x0, 0x0, 0x20, 0x0, 0x0, 0x0, 0x7, 0x0, 0x0, 0x0,
                0x0, 0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x2, 0x0, 0x1, 0x1c, 0x0, 0x0, 0x0, 0x0
            ]
        );
        let parsed = DceRpcCoResponsePkt::try_from(data.as_slice()).unwrap();
        assert!(parsed.pfc_flags().did_not_execute());
        assert!(matches!(
            parsed.content(),
            DcRpcCoPktResponseContent::Fault(DcRpcCoPktFault {
                status: 0x1c010002,
                ..
            })
        ));
    }

    #[test]
    fn test_shutdown_writes() {
        let shutdown = DceRpcCoResponsePkt::new(
            DcRpcCoPktShutdown.into(),
            0,
            DceRpcCoPktFlags::single_fragment(),
            PACKED_DREP_LE,
        );
        let data: Vec<u8> = shutdown.try_into().unwrap();
        assert_eq!(
            data,
            [0x5, 0x0, 0x11, 0x3, 0x10, 0x0, 0x0, 0x0, 0x10, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0]
        );
    }

    #[test]
    fn test_co_cancel_and_orphaned_parse() {
        let cancel = [
            0x5, 0x0, 0x12, 0x3, 0x10, 0x0, 0x0, 0x0, 0x10, 0x0, 0x0, 0x0, 0x9, 0x0, 0x0, 0x0,
        ];
        let pkt = DceRpcCoRequestPkt::try_from(cancel.as_slice()).unwrap();
        assert_eq!(pkt.call_id(), 9);
        assert_eq!(pkt.content(), &DcRpcCoPktRequestContent::CoCancel(DcRpcCoPktCoCancel));

        let orphaned = [
            0x5, 0x0, 0x13, 0x3, 0x10, 0x0, 0x0, 0x0, 0x10, 0x0, 0x0, 0x0, 0x9, 0x0, 0x0, 0x0,
        ];
        let pkt = DceRpcCoRequestPkt::try_from(orphaned.as_slice()).unwrap();
        assert_eq!(pkt.content().get_type(), DceRpcCoPktRequestType::Orphaned);
    }

    #[test]
    fn test_response_type_in_request_direction_fails() {
        let shutdown = [
            0x5, 0x0, 0x11, 0x3, 0x10, 0x0, 0x0, 0x0, 0x10, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
        ];
        assert!(DceRpcCoRequestPkt::try_from(shutdown.as_slice()).is_err());
    }

    #[test]
    fn test_alter_context_resp_roundtrip() {
        let resp = DceRpcCoResponsePkt::new(
            DcRpcCoPktAlterContextResp(DcRpcCoPktBindAck {
                max_xmit_frag: 4280,
                max_recv_frag: 4280,
                assoc_group_id: 0x1234,
                port_spec: String::new(),
                results: vec![DcRpcCoPktBindAckResult::accepted(NDR20_SYNTAX)],
            })
            .into(),
            3,
            DceRpcCoPktFlags::single_fragment(),
            PACKED_DREP_LE,
        );
        let data: Vec<u8> = resp.try_into().unwrap();
        // 16 header + 10 fixed + 2 alignment + 4 result count + 24 result.
        assert_eq!(data.len(), 56);
        assert_eq!(&data[24..28], [0, 0, 0, 0]);
        assert_eq!(data[28], 1);
        let parsed = DceRpcCoResponsePkt::try_from(data.as_slice()).unwrap();
        let DcRpcCoPktResponseContent::AlterContextResp(DcRpcCoPktAlterContextResp(ack)) =
            parsed.content()
        else {
            panic!("unexpected content {:?}", parsed.content());
        };
        assert_eq!(ack.assoc_group_id, 0x1234);
        assert_eq!(ack.results[0].syntax.ndr_syntax(), Some(NdrSyntax::Ndr20));
    }

    #[test]
    fn test_peek_header() {
        let data = [
            0x5, 0x0, 0x0, 0x3, 0x10, 0x0, 0x0, 0x0, 0x88, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x0,
            0x70, 0x0,
        ];
        let header = peek_header(&data).unwrap();
        assert_eq!(header.rpc_ver, DCE_RPC_VERSION);
        assert_eq!(header.ptype, 0);
        assert_eq!(header.frag_length, 0x88);
        assert_eq!(header.call_id, 2);
        assert!(header.pfc_flags.first_frag() && header.pfc_flags.last_frag());
        assert!(header.is_little_endian());
    }

    #[test]
    fn test_bind_time_features() {
        let proposed = DceRpcSyntaxId {
            uuid: make_guid!("6cb71c2c-9812-4540-0300-000000000000"),
            version: 1,
        };
        let features = proposed.bind_time_features().unwrap();
        assert!(features.security_context_multiplexing());
        assert!(features.keep_connection_on_orphan());
        assert_eq!(
            DceRpcSyntaxId::for_bind_time_features(features).uuid,
            proposed.uuid
        );
        assert!(NDR64_SYNTAX.bind_time_features().is_none());

        let ack = DcRpcCoPktBindAckResult::negotiate_ack(
            BindTimeFeatures::new().with_keep_connection_on_orphan(true),
        );
        assert_eq!(
            ack.reason,
            DcRpcCoPktBindAckReason::ProposedTransferSyntaxesNotSupported
        );
        assert!(
            ack.negotiated_features()
                .unwrap()
                .keep_connection_on_orphan()
        );
    }

    #[test]
    fn test_syntax_version_packing() {
        let nspi = DceRpcSyntaxId::new(make_guid!("f5cc5a18-4264-101a-8c59-08002b2f8426"), 56, 0);
        assert_eq!(nspi.version, 56);
        assert_eq!(nspi.major(), 56);
        let versioned = DceRpcSyntaxId::new(Guid::ZERO, 3, 1);
        assert_eq!(versioned.version, 0x0001_0003);
        assert_eq!(versioned.minor(), 1);
        assert_eq!(DceRpcSyntaxId::from(NdrSyntax::Ndr64), NDR64_SYNTAX);
    }
}
