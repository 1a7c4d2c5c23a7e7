use crate::config::THE_SHIP_APP_ID;
use crate::error::{Result, SourceQueryError};
use crate::packet::PacketHeader;
use crate::parse::PacketReader;

/// Reply type of the documented Source A2S_INFO response.
const SOURCE_RESPONSE: u8 = 0x49;
/// Reply type of the Source response without protocol byte and with a 32-bit app ID.
const SOURCE_WIDE_ID_RESPONSE: u8 = 0x6C;
/// Reply type of the obsolete GoldSource response.
const GOLDSOURCE_RESPONSE: u8 = 0x6D;

const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    Dedicated,
    /// Listen server
    NonDedicated,
    /// SourceTV relay (proxy)
    SourceTV,
    Unknown,
}

impl From<u8> for ServerType {
    fn from(code: u8) -> Self {
        match code {
            b'd' | b'D' => ServerType::Dedicated,
            b'l' | b'L' => ServerType::NonDedicated,
            b'p' | b'P' => ServerType::SourceTV,
            _ => ServerType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOs {
    Linux,
    Windows,
    Mac,
    Unknown,
}

impl From<u8> for ServerOs {
    fn from(code: u8) -> Self {
        match code {
            b'l' | b'L' => ServerOs::Linux,
            b'w' | b'W' => ServerOs::Windows,
            b'm' => ServerOs::Mac,
            _ => ServerOs::Unknown,
        }
    }
}

/// The Ship game mode data.
///
/// Only the documented (`0x49`) response carries witnesses and duration;
/// elsewhere they are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TheShip {
    pub mode: u8,
    pub witnesses: u8,
    pub duration: u8,
}

/// Half-Life mod data, sent by GoldSource servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    pub link: String,
    pub download_link: String,
    pub version: i32,
    /// Size in bytes
    pub size: i32,
    /// `0` for single and multiplayer, `1` for multiplayer only
    pub mod_type: u8,
    /// `1` if the mod uses its own DLL
    pub dll: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectatorServer {
    pub port: u16,
    pub name: String,
}

/// Optional trailing fields, each present only if its EDF bit is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraData {
    /// The raw Extra Data Flag byte.
    pub edf: u8,
    /// Game port
    pub port: Option<u16>,
    pub steam_id: Option<u64>,
    pub spectator: Option<SpectatorServer>,
    /// Server tags
    pub keywords: Option<String>,
    /// 64-bit game ID; its low 24 bits are the app ID.
    pub game_id: Option<u64>,
}

/// Server information as obtained by [crate::query::Client::info].
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    /// Network protocol version, absent from the wide-ID response
    pub protocol: Option<u8>,
    /// Server hostname
    pub name: String,
    /// Current map
    pub map: String,
    /// Location of server files
    pub folder: String,
    /// Name of game
    pub game: String,
    /// Steam app ID of game, `0` for GoldSource servers
    pub id: i32,
    /// Current players
    pub players: u8,
    /// Max players
    pub max_players: u8,
    /// Current bots
    pub bots: u8,
    pub server_type: ServerType,
    pub os: ServerOs,
    /// Is the server password protected?
    pub password_protected: bool,
    /// Is the server VAC enabled?
    pub vac_enabled: bool,
    /// Game version; The Ship's wide-ID response sends a mode byte instead
    pub version: Option<String>,
    pub ship: Option<TheShip>,
    pub mod_info: Option<Mod>,
    /// `None` if the response ended after the version
    pub extra: Option<ExtraData>,
}

/// Which framing of the Source response is being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceLayout {
    /// protocol byte, 16-bit ID, three ship bytes then version
    Documented,
    /// no protocol byte, 32-bit ID, one ship byte instead of version
    WideId,
}

impl ServerInfo {
    /// Parse a simple A2S_INFO response, marker included.
    pub fn parse(payload: &[u8]) -> Result<ServerInfo> {
        let mut reader = PacketReader::new(payload);
        PacketHeader::expect_single(&mut reader)?;

        match reader.read_u8()? {
            SOURCE_RESPONSE => Self::parse_source(&mut reader, SourceLayout::Documented),
            SOURCE_WIDE_ID_RESPONSE => Self::parse_source(&mut reader, SourceLayout::WideId),
            GOLDSOURCE_RESPONSE => Self::parse_goldsource(&mut reader),
            n => Err(SourceQueryError::UnsupportedInfoSchema(n)),
        }
    }

    fn parse_source(reader: &mut PacketReader, layout: SourceLayout) -> Result<ServerInfo> {
        let protocol = match layout {
            SourceLayout::Documented => Some(reader.read_u8()?),
            SourceLayout::WideId => None,
        };
        let name = reader.read_string()?;
        let map = reader.read_string()?;
        let folder = reader.read_string()?;
        let game = reader.read_string()?;
        let id = match layout {
            SourceLayout::Documented => i32::from(reader.read_u16()?),
            SourceLayout::WideId => reader.read_i32()?,
        };

        let mut info = ServerInfo {
            protocol,
            name,
            map,
            folder,
            game,
            id,
            players: reader.read_u8()?,
            max_players: reader.read_u8()?,
            bots: reader.read_u8()?,
            server_type: reader.read_u8()?.into(),
            os: reader.read_u8()?.into(),
            password_protected: reader.read_u8()? == 1,
            vac_enabled: reader.read_u8()? == 1,
            version: None,
            ship: None,
            mod_info: None,
            extra: None,
        };

        let is_ship = id == THE_SHIP_APP_ID as i32;
        match layout {
            SourceLayout::WideId if is_ship => {
                info.ship = Some(TheShip {
                    mode: reader.read_u8()?,
                    ..TheShip::default()
                });
            }
            SourceLayout::WideId => info.version = Some(reader.read_string()?),
            SourceLayout::Documented => {
                if is_ship {
                    info.ship = Some(TheShip {
                        mode: reader.read_u8()?,
                        witnesses: reader.read_u8()?,
                        duration: reader.read_u8()?,
                    });
                }
                info.version = Some(reader.read_string()?);
            }
        }

        // A response ending here has no EDF section. A datagram truncated at
        // exactly this point is indistinguishable from that.
        if reader.has_more() {
            info.extra = Some(Self::parse_extra_data(reader)?);
        }

        Ok(info)
    }

    fn parse_extra_data(reader: &mut PacketReader) -> Result<ExtraData> {
        let edf = reader.read_u8()?;
        let mut extra = ExtraData {
            edf,
            ..ExtraData::default()
        };

        // field order on the wire is fixed and differs from bit order
        if edf & EDF_PORT != 0 {
            extra.port = Some(reader.read_u16()?);
        }
        if edf & EDF_STEAM_ID != 0 {
            extra.steam_id = Some(reader.read_u64()?);
        }
        if edf & EDF_SOURCE_TV != 0 {
            extra.spectator = Some(SpectatorServer {
                port: reader.read_u16()?,
                name: reader.read_string()?,
            });
        }
        if edf & EDF_KEYWORDS != 0 {
            extra.keywords = Some(reader.read_string()?);
        }
        if edf & EDF_GAME_ID != 0 {
            extra.game_id = Some(reader.read_u64()?);
        }

        Ok(extra)
    }

    fn parse_goldsource(reader: &mut PacketReader) -> Result<ServerInfo> {
        // server address as "ip:port", superseded by the address we queried
        reader.read_string()?;

        let mut info = ServerInfo {
            name: reader.read_string()?,
            map: reader.read_string()?,
            folder: reader.read_string()?,
            game: reader.read_string()?,
            id: 0,
            players: reader.read_u8()?,
            max_players: reader.read_u8()?,
            protocol: Some(reader.read_u8()?),
            server_type: reader.read_u8()?.into(),
            os: reader.read_u8()?.into(),
            password_protected: reader.read_u8()? == 1,
            bots: 0,
            vac_enabled: false,
            version: None,
            ship: None,
            mod_info: None,
            extra: None,
        };

        if reader.read_u8()? == 1 {
            let link = reader.read_string()?;
            let download_link = reader.read_string()?;
            reader.read_u8()?;
            info.mod_info = Some(Mod {
                link,
                download_link,
                version: reader.read_i32()?,
                size: reader.read_i32()?,
                mod_type: reader.read_u8()?,
                dll: reader.read_u8()?,
            });
        } else {
            info.vac_enabled = reader.read_u8()? == 1;
            info.bots = reader.read_u8()?;
        }

        Ok(info)
    }
}
