//! Configuration-sync sub-protocol: a typed key/value store replicated
//! between server and clients.

use super::{decode_body_of, encode_body_of, WireMessage};
use crate::codec::{Decodable, Encodable, WireError};

/// The eleven value shapes the store understands. `CodeDefinition` is an
/// opaque application type — the core only ever moves its bytes around.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValueKind {
    String(String),
    StringMap(std::collections::HashMap<String, String>),
    Path(String),
    PathArray(Vec<String>),
    CodeDefinition(Vec<u8>),
    Boolean(bool),
    Integer(i64),
    FixedPoint(i64),
    Real(f64),
    RollValue(f64),
    Time(f64),
}

impl ConfigValueKind {
    /// The `type_tag` stored alongside each entry, stable across releases.
    pub fn type_tag(&self) -> u8 {
        match self {
            ConfigValueKind::String(_) => 0,
            ConfigValueKind::StringMap(_) => 1,
            ConfigValueKind::Path(_) => 2,
            ConfigValueKind::PathArray(_) => 3,
            ConfigValueKind::CodeDefinition(_) => 4,
            ConfigValueKind::Boolean(_) => 5,
            ConfigValueKind::Integer(_) => 6,
            ConfigValueKind::FixedPoint(_) => 7,
            ConfigValueKind::Real(_) => 8,
            ConfigValueKind::RollValue(_) => 9,
            ConfigValueKind::Time(_) => 10,
        }
    }

    /// Computed text-mirror projection so UIs can edit numerics through a
    /// string field. This is never stored — only derived on demand.
    pub fn as_text(&self) -> String {
        match self {
            ConfigValueKind::String(s) | ConfigValueKind::Path(s) => s.clone(),
            ConfigValueKind::StringMap(m) => {
                let mut pairs: Vec<String> = m.iter().map(|(k, v)| format!("{k}={v}")).collect();
                pairs.sort();
                pairs.join(";")
            }
            ConfigValueKind::PathArray(paths) => paths.join(";"),
            ConfigValueKind::CodeDefinition(bytes) => format!("<{} bytes>", bytes.len()),
            ConfigValueKind::Boolean(b) => b.to_string(),
            ConfigValueKind::Integer(i) => i.to_string(),
            ConfigValueKind::FixedPoint(i) => i.to_string(),
            ConfigValueKind::Real(f) | ConfigValueKind::RollValue(f) | ConfigValueKind::Time(f) => {
                f.to_string()
            }
        }
    }
}

impl Encodable for ConfigValueKind {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.type_tag().encode(out)?;
        match self {
            ConfigValueKind::String(s) | ConfigValueKind::Path(s) => s.encode(out),
            ConfigValueKind::StringMap(m) => m.encode(out),
            ConfigValueKind::PathArray(paths) => paths.encode(out),
            ConfigValueKind::CodeDefinition(bytes) => bytes.encode(out),
            ConfigValueKind::Boolean(b) => b.encode(out),
            ConfigValueKind::Integer(i) | ConfigValueKind::FixedPoint(i) => i.encode(out),
            ConfigValueKind::Real(f) | ConfigValueKind::RollValue(f) | ConfigValueKind::Time(f) => {
                f.encode(out)
            }
        }
    }
}

impl Decodable for ConfigValueKind {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let tag = u8::decode(buf, cursor)?;
        Ok(match tag {
            0 => ConfigValueKind::String(String::decode(buf, cursor)?),
            1 => ConfigValueKind::StringMap(Decodable::decode(buf, cursor)?),
            2 => ConfigValueKind::Path(String::decode(buf, cursor)?),
            3 => ConfigValueKind::PathArray(Decodable::decode(buf, cursor)?),
            4 => ConfigValueKind::CodeDefinition(Vec::<u8>::decode(buf, cursor)?),
            5 => ConfigValueKind::Boolean(bool::decode(buf, cursor)?),
            6 => ConfigValueKind::Integer(i64::decode(buf, cursor)?),
            7 => ConfigValueKind::FixedPoint(i64::decode(buf, cursor)?),
            8 => ConfigValueKind::Real(f64::decode(buf, cursor)?),
            9 => ConfigValueKind::RollValue(f64::decode(buf, cursor)?),
            10 => ConfigValueKind::Time(f64::decode(buf, cursor)?),
            _ => return Err(WireError::Truncated),
        })
    }
}

/// One entry in the store: `(category, name, type_tag, description, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub category: String,
    pub name: String,
    pub description: String,
    pub value: ConfigValueKind,
}

impl ConfigEntry {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }
}

impl Encodable for ConfigEntry {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.category.encode(out)?;
        self.name.encode(out)?;
        self.description.encode(out)?;
        self.value.encode(out)
    }
}

impl Decodable for ConfigEntry {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let category = String::decode(buf, cursor)?;
        let name = String::decode(buf, cursor)?;
        let description = String::decode(buf, cursor)?;
        let value = ConfigValueKind::decode(buf, cursor)?;
        Ok(Self { category, name, description, value })
    }
}

/// Full-snapshot push from server to a newly connected client.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValueList {
    pub entries: Vec<ConfigEntry>,
}

impl Encodable for ConfigValueList {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.entries.encode(out)
    }
}

impl Decodable for ConfigValueList {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self { entries: Decodable::decode(buf, cursor)? })
    }
}

impl WireMessage for ConfigValueList {
    const ID: &'static str = "D05761BF-6465-448B-9FAC-5A32D4FECEF9";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

/// Single-entry update, sent in either direction when a value is mutated
/// locally. A no-op update (new value equals current) must not be
/// re-broadcast — enforced by [`crate::config_store::ConfigStore`], not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    pub entry: ConfigEntry,
}

impl Encodable for ConfigValue {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.entry.encode(out)
    }
}

impl Decodable for ConfigValue {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self { entry: ConfigEntry::decode(buf, cursor)? })
    }
}

impl WireMessage for ConfigValue {
    const ID: &'static str = "0D8EFD04-9EE7-4656-952E-DF8B9591ACA9";
    fn encode_body(&self) -> Vec<u8> {
        encode_body_of(self)
    }
    fn decode_body(data: &[u8]) -> Option<Self> {
        decode_body_of(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, value: ConfigValueKind) -> ConfigEntry {
        ConfigEntry {
            category: "search".into(),
            name: name.into(),
            description: "test entry".into(),
            value,
        }
    }

    #[test]
    fn every_value_variant_roundtrips() {
        let samples = vec![
            ConfigValueKind::String("Standard".into()),
            ConfigValueKind::StringMap(
                [("a".to_string(), "1".to_string())].into_iter().collect(),
            ),
            ConfigValueKind::Path("/etc/cardsync".into()),
            ConfigValueKind::PathArray(vec!["/a".into(), "/b".into()]),
            ConfigValueKind::CodeDefinition(vec![1, 2, 3]),
            ConfigValueKind::Boolean(true),
            ConfigValueKind::Integer(-7),
            ConfigValueKind::FixedPoint(1000),
            ConfigValueKind::Real(2.5),
            ConfigValueKind::RollValue(0.75),
            ConfigValueKind::Time(12345.0),
        ];
        for value in samples {
            let e = entry("CodeDefinition", value);
            let list = ConfigValueList { entries: vec![e.clone()] };
            let body = list.encode_body();
            let decoded = ConfigValueList::decode_body(&body).unwrap();
            assert_eq!(decoded.entries[0], e);
        }
    }

    #[test]
    fn full_name_joins_category_and_name() {
        let e = entry("ViewportType", ConfigValueKind::Integer(2));
        assert_eq!(e.full_name(), "search.ViewportType");
    }

    #[test]
    fn text_mirror_is_computed_not_stored() {
        let e = entry("ViewportType", ConfigValueKind::Integer(3));
        assert_eq!(e.value.as_text(), "3");
    }

    #[test]
    fn single_update_roundtrip() {
        let e = entry("ViewportType", ConfigValueKind::Integer(3));
        let msg = ConfigValue { entry: e.clone() };
        let decoded = ConfigValue::decode_body(&msg.encode_body()).unwrap();
        assert_eq!(decoded.entry, e);
    }
}
