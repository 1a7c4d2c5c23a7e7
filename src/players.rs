use crate::error::Result;
use crate::packet::{PacketHeader, PacketType};
use crate::parse::PacketReader;

/// Extra per-player data sent by The Ship servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipPlayer {
    pub deaths: u32,
    pub money: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Index of the player chunk; usually 0 for every player
    pub index: u8,
    pub name: String,
    pub score: i32,
    /// Seconds connected
    pub duration: f32,
    pub ship: Option<ShipPlayer>,
}

/// Player list as obtained by [crate::query::Client::players], in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Players {
    /// Player count declared by the server
    pub count: u8,
    pub players: Vec<Player>,
}

impl Players {
    /// Parse a simple A2S_PLAYER response, marker included.
    ///
    /// `the_ship` adds The Ship's deaths and money fields to every player.
    pub fn parse(payload: &[u8], the_ship: bool) -> Result<Players> {
        let mut reader = PacketReader::new(payload);
        PacketHeader::expect_single(&mut reader)?;
        PacketType::PlayersResponse.expect(&mut reader)?;

        let count = reader.read_u8()?;
        let mut players = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut player = Player {
                index: reader.read_u8()?,
                name: reader.read_string()?,
                score: reader.read_i32()?,
                duration: reader.read_f32()?,
                ship: None,
            };
            if the_ship {
                player.ship = Some(ShipPlayer {
                    deaths: reader.read_u32()?,
                    money: reader.read_u32()?,
                });
            }
            players.push(player);
        }

        Ok(Players { count, players })
    }
}
