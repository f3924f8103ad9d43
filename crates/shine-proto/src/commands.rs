//! Command schema: symbolic names for operation codes.
//!
//! The schema file is a flat JSON object mapping an operation code (decimal
//! or `0x`-prefixed hex string) to its name:
//!
//! ```json
//! { "2055": "NC_MISC_GAMETIME_ACK", "0x0807": "NC_USER_LOGIN_REQ" }
//! ```

use std::{collections::HashMap, fs::File, io::BufReader, path::Path, sync::Arc};

use crate::ProtoError;

/// Read-only operation-code → name lookup.
#[derive(Debug, Clone, Default)]
pub struct CommandSchema {
    names: HashMap<u16, Arc<str>>,
}

impl CommandSchema {
    /// Load a schema from a JSON file.
    ///
    /// # Errors
    ///
    /// [`ProtoError::SchemaRead`] / [`ProtoError::SchemaParse`] on file or
    /// JSON problems, [`ProtoError::SchemaKey`] if a key is not an
    /// operation code.
    pub fn from_path(path: &Path) -> Result<Self, ProtoError> {
        let file = File::open(path)
            .map_err(|source| ProtoError::SchemaRead { path: path.to_path_buf(), source })?;

        let raw: HashMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| ProtoError::SchemaParse { path: path.to_path_buf(), source })?;

        Self::from_map(raw)
    }

    /// Build a schema from an already-parsed key/name map.
    ///
    /// # Errors
    ///
    /// [`ProtoError::SchemaKey`] if a key is neither a decimal nor a
    /// `0x`-hex `u16`.
    pub fn from_map(raw: HashMap<String, String>) -> Result<Self, ProtoError> {
        let mut names = HashMap::with_capacity(raw.len());

        for (key, name) in raw {
            let opcode = parse_opcode(&key).ok_or(ProtoError::SchemaKey { key })?;
            names.insert(opcode, Arc::from(name.as_str()));
        }

        Ok(Self { names })
    }

    /// Name registered for `opcode`, if any.
    #[must_use]
    pub fn name(&self, opcode: u16) -> Option<Arc<str>> {
        self.names.get(&opcode).cloned()
    }

    /// Number of registered operation codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` if no names are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_opcode(key: &str) -> Option<u16> {
    if let Some(hex_digits) = key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        u16::from_str_radix(hex_digits, 16).ok()
    } else {
        key.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_and_hex_keys() {
        let schema = CommandSchema::from_map(HashMap::from([
            ("2055".to_string(), "GameTime".to_string()),
            ("0x0807".to_string(), "Login".to_string()),
        ]))
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.name(2055).as_deref(), Some("GameTime"));
        assert_eq!(schema.name(0x0807).as_deref(), Some("Login"));
        assert_eq!(schema.name(1), None);
    }

    #[test]
    fn bad_key_is_rejected() {
        let err = CommandSchema::from_map(HashMap::from([(
            "not-a-code".to_string(),
            "Broken".to_string(),
        )]))
        .unwrap_err();

        assert!(matches!(err, ProtoError::SchemaKey { key } if key == "not-a-code"));
    }

    #[test]
    fn empty_schema_resolves_nothing() {
        let schema = CommandSchema::default();
        assert!(schema.is_empty());
        assert_eq!(schema.name(2055), None);
    }
}
