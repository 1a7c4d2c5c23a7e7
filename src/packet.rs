use crate::error::{Result, SourceQueryError};
use crate::parse::PacketReader;

/// The 4-byte marker leading every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    /// `-1`: the whole answer fits in this datagram.
    Single,
    /// `-2`: one fragment of a multi-datagram answer.
    Split,
}

impl TryFrom<i32> for PacketHeader {
    type Error = SourceQueryError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(PacketHeader::Single),
            -2 => Ok(PacketHeader::Split),
            n => Err(SourceQueryError::HeaderMismatch(n)),
        }
    }
}

impl PacketHeader {
    pub fn to_le_bytes(self) -> [u8; 4] {
        let value: i32 = match self {
            PacketHeader::Single => -1,
            PacketHeader::Split => -2,
        };
        value.to_le_bytes()
    }

    /// Read and classify the leading marker.
    pub fn read(reader: &mut PacketReader) -> Result<Self> {
        reader.read_i32()?.try_into()
    }

    /// Read the leading marker and fail unless it is [PacketHeader::Single].
    pub fn expect_single(reader: &mut PacketReader) -> Result<()> {
        match reader.read_i32()? {
            -1 => Ok(()),
            n => Err(SourceQueryError::HeaderMismatch(n)),
        }
    }

    /// Classify a raw datagram by its leading marker without consuming it.
    pub fn peek(datagram: &[u8]) -> Result<Self> {
        PacketHeader::read(&mut PacketReader::new(datagram))
    }
}

/// Query and reply type bytes -- https://developer.valvesoftware.com/wiki/Server_queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// A2S_INFO
    InfoRequest,
    /// A2S_PLAYER
    PlayersRequest,
    /// A2S_RULES
    RulesRequest,
    /// A2S_PING
    PingRequest,
    /// S2C_CHALLENGE
    ///
    /// The server wants the request repeated with the 4 bytes following this type appended.
    Challenge,
    /// A2S_PLAYER response
    PlayersResponse,
    /// A2S_RULES response
    RulesResponse,
    /// A2S_PING response
    PingResponse,
}

impl PacketType {
    pub fn to_byte(self) -> u8 {
        match self {
            PacketType::InfoRequest => 0x54,
            PacketType::PlayersRequest => 0x55,
            PacketType::RulesRequest => 0x56,
            PacketType::PingRequest => 0x69,
            PacketType::Challenge => 0x41,
            PacketType::PlayersResponse => 0x44,
            PacketType::RulesResponse => 0x45,
            PacketType::PingResponse => 0x6A,
        }
    }

    /// Read one type byte and fail unless it is `self`.
    pub fn expect(self, reader: &mut PacketReader) -> Result<()> {
        let found = reader.read_u8()?;
        if found != self.to_byte() {
            return Err(SourceQueryError::UnexpectedPacketType {
                expected: self.to_byte(),
                found,
            });
        }
        Ok(())
    }
}

/// Append-only encoder for outgoing packets.
#[derive(Debug, Default)]
pub struct PacketBuilder {
    buf: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        PacketBuilder::default()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    /// Write `value` followed by a single null terminator.
    pub fn write_cstring(&mut self, value: &str) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A challenge token, echoed back to the server verbatim.
pub type Challenge = [u8; 4];

/// Sent in place of a real challenge to ask the server for one.
pub const CHALLENGE_PLACEHOLDER: Challenge = [0xFF; 4];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPacket {
    packet_type: PacketType,
    body: Option<&'static str>,
    challenge: Option<Challenge>,
}

impl RequestPacket {
    const INFO_BODY: &'static str = "Source Engine Query";

    /// A2S_INFO, optionally answering a challenge.
    pub fn info(challenge: Option<Challenge>) -> Self {
        RequestPacket {
            packet_type: PacketType::InfoRequest,
            body: Some(Self::INFO_BODY),
            challenge,
        }
    }

    /// A2S_PLAYER, carrying either [CHALLENGE_PLACEHOLDER] or a real token.
    pub fn players(challenge: Challenge) -> Self {
        RequestPacket {
            packet_type: PacketType::PlayersRequest,
            body: None,
            challenge: Some(challenge),
        }
    }

    /// A2S_RULES, carrying either [CHALLENGE_PLACEHOLDER] or a real token.
    pub fn rules(challenge: Challenge) -> Self {
        RequestPacket {
            packet_type: PacketType::RulesRequest,
            body: None,
            challenge: Some(challenge),
        }
    }

    pub fn ping() -> Self {
        RequestPacket {
            packet_type: PacketType::PingRequest,
            body: None,
            challenge: None,
        }
    }

    /// The same request, answering `challenge`.
    pub fn with_challenge(&self, challenge: Challenge) -> Self {
        RequestPacket {
            challenge: Some(challenge),
            ..self.clone()
        }
    }

    /// Serializes a request packet into an array of bytes.
    pub fn pack(&self) -> Vec<u8> {
        // packet structure: header, type, body + terminator, challenge
        let mut builder = PacketBuilder::new();
        builder
            .write_bytes(&PacketHeader::Single.to_le_bytes())
            .write_u8(self.packet_type.to_byte());
        if let Some(body) = self.body {
            builder.write_cstring(body);
        }
        if let Some(challenge) = &self.challenge {
            builder.write_bytes(challenge);
        }

        builder.into_bytes()
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }
}
