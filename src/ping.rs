use crate::error::Result;
use crate::packet::{PacketHeader, PacketType};
use crate::parse::PacketReader;

/// Parse an A2A_PING reply: `true` if the server answered with the ping reply byte.
///
/// Any other byte is a live but unexpected answer, and reads as `false`.
pub fn parse(payload: &[u8]) -> Result<bool> {
    let mut reader = PacketReader::new(payload);
    PacketHeader::expect_single(&mut reader)?;

    Ok(reader.read_u8()? == PacketType::PingResponse.to_byte())
}
