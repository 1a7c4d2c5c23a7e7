//! S2C_CHALLENGE handling.
//!
//! Players and rules queries are first sent with [CHALLENGE_PLACEHOLDER]. The
//! server then either hands out a challenge token, which the client echoes
//! back in a second request, or skips the handshake and answers right away.
//!
//! [CHALLENGE_PLACEHOLDER]: crate::packet::CHALLENGE_PLACEHOLDER
use log::debug;

use crate::error::{Result, SourceQueryError};
use crate::packet::{Challenge, PacketHeader, PacketType};
use crate::parse::PacketReader;

/// What the server sent back to a placeholder request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeReply {
    /// The server answered without a handshake. The datagram is that answer,
    /// either a single response or the first fragment of a split one.
    Immediate(Vec<u8>),
    /// Resend the request with this token appended.
    Token(Challenge),
}

impl ChallengeReply {
    /// Classify the reply to a placeholder request whose full answer carries
    /// the `full_result` type byte.
    pub fn classify(datagram: Vec<u8>, full_result: PacketType) -> Result<Self> {
        let mut reader = PacketReader::new(&datagram);

        match PacketHeader::read(&mut reader)? {
            PacketHeader::Split => {
                debug!("server skipped challenge with a split answer");
                return Ok(ChallengeReply::Immediate(datagram));
            }
            PacketHeader::Single => {}
        }

        let found = reader.read_u8()?;
        if found == PacketType::Challenge.to_byte() {
            let token = read_token(&mut reader)?;
            debug!("received challenge {:02x?}", token);
            Ok(ChallengeReply::Token(token))
        } else if found == full_result.to_byte() {
            debug!("server skipped challenge");
            Ok(ChallengeReply::Immediate(datagram))
        } else {
            Err(SourceQueryError::UnexpectedPacketType {
                expected: full_result.to_byte(),
                found,
            })
        }
    }
}

/// The challenge token in `datagram`, if it is a single S2C_CHALLENGE.
///
/// Used for info queries, where anything else is a regular answer.
pub fn find_challenge(datagram: &[u8]) -> Result<Option<Challenge>> {
    let mut reader = PacketReader::new(datagram);

    if PacketHeader::read(&mut reader)? != PacketHeader::Single
        || reader.read_u8()? != PacketType::Challenge.to_byte()
    {
        return Ok(None);
    }

    read_token(&mut reader).map(Some)
}

fn read_token(reader: &mut PacketReader) -> Result<Challenge> {
    let mut token: Challenge = [0; 4];
    token.copy_from_slice(reader.read_bytes(4)?);
    Ok(token)
}
