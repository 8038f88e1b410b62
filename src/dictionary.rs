//! Typed AVP dictionary
//!
//! The dictionary maps `(vendor_id, code)` pairs to AVP definitions and is
//! what drives decode-time type dispatch in the AVP codec. It is built once
//! at startup from JSON dictionary files and read-only afterwards; callers
//! share it by `Arc`. A lookup that misses yields a synthetic `Unknown`
//! definition, never an error.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DiameterError, DiameterResult};

/// Wire type of an AVP, one variant per RFC 6733 basic/derived type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvpType {
    Integer32,
    Integer64,
    Unsigned32,
    Unsigned64,
    Float32,
    Float64,
    OctetString,
    Utf8String,
    Enumerated,
    Time,
    Address,
    Grouped,
    /// Not present in any loaded dictionary
    Unknown,
}

impl AvpType {
    /// Parse a dictionary type name, including the aliases the dictionary
    /// files use for derived types.
    pub fn from_name(name: &str) -> Option<AvpType> {
        match name {
            "OctetString" | "IPFilterRule" | "IPAddress" => Some(AvpType::OctetString),
            "Unsigned32" | "AppId" | "VendorId" => Some(AvpType::Unsigned32),
            "Unsigned64" => Some(AvpType::Unsigned64),
            "Integer32" => Some(AvpType::Integer32),
            "Integer64" => Some(AvpType::Integer64),
            "Float32" => Some(AvpType::Float32),
            "Float64" => Some(AvpType::Float64),
            "UTF8String" | "DiameterURI" | "DiameterIdentity" => Some(AvpType::Utf8String),
            "Enumerated" => Some(AvpType::Enumerated),
            "Grouped" | "grouped" => Some(AvpType::Grouped),
            "Time" => Some(AvpType::Time),
            "Address" => Some(AvpType::Address),
            _ => None,
        }
    }
}

/// One AVP definition from the dictionary
#[derive(Debug, Clone)]
pub struct AvpDef {
    pub code: u32,
    pub vendor_id: u32,
    pub name: String,
    pub avp_type: AvpType,
    /// Enumerated value names, empty for non-enumerated AVPs
    pub enum_names: HashMap<i32, String>,
}

impl AvpDef {
    fn unknown(vendor_id: u32, code: u32) -> Self {
        Self {
            code,
            vendor_id,
            name: "Unknown".to_string(),
            avp_type: AvpType::Unknown,
            enum_names: HashMap::new(),
        }
    }
}

/// JSON schema of one dictionary file
#[derive(Debug, Deserialize)]
struct DictFile {
    #[serde(default)]
    avps: Vec<AvpRow>,
    #[serde(default)]
    commands: Vec<CommandRow>,
    #[serde(default)]
    applications: Vec<ApplicationRow>,
}

#[derive(Debug, Deserialize)]
struct AvpRow {
    code: u32,
    #[serde(rename = "vendor-id", default)]
    vendor_id: u32,
    name: String,
    #[serde(rename = "type")]
    avp_type: String,
    #[serde(rename = "enum", default)]
    enum_values: Vec<EnumRow>,
}

#[derive(Debug, Deserialize)]
struct EnumRow {
    value: i32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommandRow {
    code: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApplicationRow {
    id: u32,
    name: String,
}

/// AVP/command/application dictionary, immutable after load
#[derive(Debug, Default)]
pub struct Dictionary {
    avps: HashMap<(u32, u32), AvpDef>,
    commands: HashMap<u32, String>,
    applications: HashMap<u32, String>,
}

impl Dictionary {
    /// Create an empty dictionary; every AVP lookup resolves to `Unknown`
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` dictionary file from a directory
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> DiameterResult<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            DiameterError::Dictionary(format!("cannot read dict dir {}: {e}", dir.display()))
        })?;

        let mut dict = Dictionary::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path)?;
                dict.merge_json(&content).map_err(|e| {
                    DiameterError::Dictionary(format!("{}: {e}", path.display()))
                })?;
            }
        }
        Ok(dict)
    }

    /// Load a dictionary from a single JSON document
    pub fn load_json(content: &str) -> DiameterResult<Self> {
        let mut dict = Dictionary::new();
        dict.merge_json(content)?;
        Ok(dict)
    }

    fn merge_json(&mut self, content: &str) -> DiameterResult<()> {
        let file: DictFile = serde_json::from_str(content)
            .map_err(|e| DiameterError::Dictionary(e.to_string()))?;

        for row in file.avps {
            let avp_type = AvpType::from_name(&row.avp_type).ok_or_else(|| {
                DiameterError::Dictionary(format!(
                    "unknown avp type in dictionary: {}",
                    row.avp_type
                ))
            })?;
            let enum_names = row
                .enum_values
                .into_iter()
                .map(|e| (e.value, e.name))
                .collect();
            let def = AvpDef {
                code: row.code,
                vendor_id: row.vendor_id,
                name: row.name,
                avp_type,
                enum_names,
            };
            self.avps.insert((def.vendor_id, def.code), def);
        }
        for row in file.commands {
            self.commands.insert(row.code, row.name);
        }
        for row in file.applications {
            self.applications.insert(row.id, row.name);
        }
        Ok(())
    }

    /// Look up an AVP definition by vendor id and code.
    ///
    /// Misses return a synthetic `Unknown` definition so that unrecognized
    /// AVPs decode to a raw passthrough value instead of failing.
    pub fn lookup(&self, vendor_id: u32, code: u32) -> AvpDef {
        match self.avps.get(&(vendor_id, code)) {
            Some(def) => {
                log::trace!("dict lookup success: {vendor_id}.{code} -> {}", def.name);
                def.clone()
            }
            None => {
                log::trace!("dict lookup failed: {vendor_id}.{code}");
                AvpDef::unknown(vendor_id, code)
            }
        }
    }

    /// Name of an enumerated value for a given AVP, if the dictionary has one
    pub fn enum_name(&self, vendor_id: u32, code: u32, value: i32) -> Option<&str> {
        self.avps
            .get(&(vendor_id, code))?
            .enum_names
            .get(&value)
            .map(String::as_str)
    }

    /// Name of a command code, if known
    pub fn command_name(&self, code: u32) -> Option<&str> {
        self.commands.get(&code).map(String::as_str)
    }

    /// Name of an application id, if known
    pub fn application_name(&self, id: u32) -> Option<&str> {
        self.applications.get(&id).map(String::as_str)
    }

    /// Number of AVP definitions loaded
    pub fn len(&self) -> usize {
        self.avps.len()
    }

    /// True if no AVP definitions are loaded
    pub fn is_empty(&self) -> bool {
        self.avps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DICT: &str = r#"{
        "avps": [
            {"code": 263, "vendor-id": 0, "name": "Session-Id", "type": "UTF8String"},
            {"code": 268, "vendor-id": 0, "name": "Result-Code", "type": "Unsigned32"},
            {"code": 416, "vendor-id": 0, "name": "CC-Request-Type", "type": "Enumerated",
             "enum": [{"value": 1, "name": "INITIAL_REQUEST"},
                      {"value": 2, "name": "UPDATE_REQUEST"},
                      {"value": 3, "name": "TERMINATION_REQUEST"}]},
            {"code": 873, "vendor-id": 10415, "name": "Service-Information", "type": "Grouped"}
        ],
        "commands": [
            {"code": 272, "name": "Credit-Control"},
            {"code": 280, "name": "Device-Watchdog"}
        ],
        "applications": [
            {"id": 4, "name": "Diameter Credit Control"}
        ]
    }"#;

    #[test]
    fn test_load_and_lookup() {
        let dict = Dictionary::load_json(DICT).unwrap();
        assert_eq!(dict.len(), 4);

        let def = dict.lookup(0, 263);
        assert_eq!(def.name, "Session-Id");
        assert_eq!(def.avp_type, AvpType::Utf8String);

        let grouped = dict.lookup(10415, 873);
        assert_eq!(grouped.avp_type, AvpType::Grouped);
        assert_eq!(grouped.vendor_id, 10415);
    }

    #[test]
    fn test_lookup_miss_is_synthetic_unknown() {
        let dict = Dictionary::load_json(DICT).unwrap();
        let def = dict.lookup(0, 99999);
        assert_eq!(def.name, "Unknown");
        assert_eq!(def.avp_type, AvpType::Unknown);
        assert_eq!(def.code, 99999);

        // vendor id is part of the compound key
        let def = dict.lookup(1, 263);
        assert_eq!(def.avp_type, AvpType::Unknown);
    }

    #[test]
    fn test_enum_and_name_tables() {
        let dict = Dictionary::load_json(DICT).unwrap();
        assert_eq!(dict.enum_name(0, 416, 1), Some("INITIAL_REQUEST"));
        assert_eq!(dict.enum_name(0, 416, 9), None);
        assert_eq!(dict.command_name(280), Some("Device-Watchdog"));
        assert_eq!(dict.command_name(999), None);
        assert_eq!(dict.application_name(4), Some("Diameter Credit Control"));
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(AvpType::from_name("DiameterIdentity"), Some(AvpType::Utf8String));
        assert_eq!(AvpType::from_name("IPFilterRule"), Some(AvpType::OctetString));
        assert_eq!(AvpType::from_name("AppId"), Some(AvpType::Unsigned32));
        assert_eq!(AvpType::from_name("NoSuchType"), None);
    }

    #[test]
    fn test_unknown_type_is_load_error() {
        let bad = r#"{"avps": [{"code": 1, "name": "X", "type": "Bogus"}]}"#;
        assert!(Dictionary::load_json(bad).is_err());
    }

    #[test]
    fn test_empty_dictionary() {
        let dict = Dictionary::new();
        assert!(dict.is_empty());
        assert_eq!(dict.lookup(0, 263).avp_type, AvpType::Unknown);
    }
}
