use std::collections::HashMap;

use log::warn;

use crate::error::Result;
use crate::packet::{PacketHeader, PacketType};
use crate::parse::PacketReader;

/// Server rules (cvars) as obtained by [crate::query::Client::rules].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rules {
    /// Rule count declared by the server. More than `rules.len()` if the
    /// response was truncated or repeated a name.
    pub count: u16,
    pub rules: HashMap<String, String>,
}

impl Rules {
    /// Parse a simple A2S_RULES response, marker included.
    ///
    /// Plenty of servers send rule lists cut off mid-string. Parsing stops at
    /// the first unterminated string and keeps the rules read up to there.
    /// A repeated rule name keeps its last value.
    pub fn parse(payload: &[u8]) -> Result<Rules> {
        let mut reader = PacketReader::new(payload);
        PacketHeader::expect_single(&mut reader)?;
        PacketType::RulesResponse.expect(&mut reader)?;

        let count = reader.read_u16()?;
        let mut rules = HashMap::with_capacity(count as usize);
        for read in 0..count {
            let pair = reader
                .try_read_string()
                .and_then(|name| reader.try_read_string().map(|value| (name, value)));
            match pair {
                Some((name, value)) => {
                    rules.insert(name, value);
                }
                None => {
                    warn!("rules response truncated after {} of {} rules", read, count);
                    break;
                }
            }
        }

        Ok(Rules { count, rules })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SourceQueryError;
    use crate::packet::PacketBuilder;

    use super::*;

    fn response(count: u16) -> PacketBuilder {
        let mut builder = PacketBuilder::new();
        builder
            .write_bytes(&[0xFF, 0xFF, 0xFF, 0xFF, 0x45])
            .write_bytes(&count.to_le_bytes());
        builder
    }

    #[test]
    fn complete_rules() {
        let mut builder = response(2);
        builder
            .write_cstring("mp_timelimit")
            .write_cstring("30")
            .write_cstring("sv_cheats")
            .write_cstring("0");
        let rules = Rules::parse(&builder.into_bytes()).unwrap();

        assert_eq!(rules.count, 2);
        assert_eq!(rules.rules.len(), 2);
        assert_eq!(rules.rules["mp_timelimit"], "30");
        assert_eq!(rules.rules["sv_cheats"], "0");
    }

    #[test]
    fn truncated_value_keeps_earlier_rules() {
        let mut builder = response(3);
        builder
            .write_cstring("mp_timelimit")
            .write_cstring("30")
            .write_cstring("sv_tags")
            .write_bytes(b"alltalk,incr");
        let rules = Rules::parse(&builder.into_bytes()).unwrap();

        assert!(rules.rules.len() < rules.count as usize);
        assert_eq!(rules.rules.len(), 1);
        assert_eq!(rules.rules["mp_timelimit"], "30");
        assert!(!rules.rules.contains_key("sv_tags"));
    }

    #[test]
    fn truncated_name() {
        let mut builder = response(5);
        builder.write_bytes(b"mp_");
        let rules = Rules::parse(&builder.into_bytes()).unwrap();

        assert_eq!(rules.count, 5);
        assert!(rules.rules.is_empty());
    }

    #[test]
    fn duplicate_name_keeps_last_value() {
        let mut builder = response(2);
        builder
            .write_cstring("sv_gravity")
            .write_cstring("800")
            .write_cstring("sv_gravity")
            .write_cstring("600");
        let rules = Rules::parse(&builder.into_bytes()).unwrap();

        assert_eq!(rules.count, 2);
        assert_eq!(rules.rules.len(), 1);
        assert_eq!(rules.rules["sv_gravity"], "600");
    }

    #[test]
    fn header_still_required() {
        assert!(matches!(
            Rules::parse(&[0xFF, 0xFF, 0xFF, 0xFF, 0x44, 0, 0]),
            Err(SourceQueryError::UnexpectedPacketType {
                expected: 0x45,
                found: 0x44
            })
        ));
        assert!(matches!(
            Rules::parse(&[0xFF, 0xFF, 0xFF, 0xFF, 0x45, 1]),
            Err(SourceQueryError::OutOfBounds { .. })
        ));
    }
}
