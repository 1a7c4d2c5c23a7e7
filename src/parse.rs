use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Result, SourceQueryError};

/// Cursor over a received packet.
///
/// Protocol integers are little-endian. Addresses and ports are in network
/// (big-endian) order. Every multi-byte read is bounds-checked and fails with
/// [SourceQueryError::OutOfBounds] instead of panicking.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        PacketReader { data, position: 0 }
    }

    /// Offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Are there any unread bytes left?
    pub fn has_more(&self) -> bool {
        self.position < self.data.len()
    }

    /// True when fewer than `size` bytes are left after the cursor.
    pub fn remaining_bytes_insufficient(&self, size: usize) -> bool {
        self.remaining() < size
    }

    /// Take `size` raw bytes.
    ///
    /// Advances the cursor past them.
    pub fn read_bytes(&mut self, size: usize) -> Result<&'a [u8]> {
        if self.remaining_bytes_insufficient(size) {
            return Err(SourceQueryError::OutOfBounds {
                position: self.position,
                requested: size,
                len: self.data.len(),
            });
        }
        let bytes = &self.data[self.position..self.position + size];
        self.position += size;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// Read an IPv4 address, in network order.
    pub fn read_ipv4(&mut self) -> Result<Ipv4Addr> {
        let octets = self.read_bytes(4)?;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    /// Read a port number, in network order.
    pub fn read_port(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    /// Get the value of a null-terminated string at the cursor.
    ///
    /// Advances the cursor past the null-termination byte. Fails without
    /// moving the cursor if no terminator exists before the end of the packet.
    /// Invalid UTF-8 is replaced rather than rejected; servers send whatever
    /// bytes their operators typed.
    pub fn read_string(&mut self) -> Result<String> {
        let rest = &self.data[self.position.min(self.data.len())..];
        let end = rest
            .iter()
            .position(|&c| c == 0)
            .ok_or(SourceQueryError::UnterminatedString(self.position))?;

        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.position += end + 1;
        Ok(value)
    }

    /// Lenient form of [PacketReader::read_string], for decoders that keep
    /// whatever they managed to read before the packet ran out.
    pub fn try_read_string(&mut self) -> Option<String> {
        self.read_string().ok()
    }
}
