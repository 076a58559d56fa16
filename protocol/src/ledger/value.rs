//! Typed contract values.
//!
//! Contract arguments and return values travel as [`ScVal`], a closed set of
//! value kinds. Decoding into plain data is a single exhaustive `match`
//! ([`ScVal::to_native`]) applied recursively through vectors and maps, so a
//! new kind cannot be added without the compiler pointing at the decoder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed ledger value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScVal {
    Void,
    Bool(bool),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Bytes(Vec<u8>),
    String(String),
    Symbol(String),
    Address(String),
    Vec(Vec<ScVal>),
    Map(Vec<ScMapEntry>),
}

/// One key/value pair of an [`ScVal::Map`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScMapEntry {
    pub key: ScVal,
    pub val: ScVal,
}

impl ScVal {
    pub fn string(s: impl Into<String>) -> Self {
        ScVal::String(s.into())
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        ScVal::Symbol(s.into())
    }

    /// `None` encodes as `Void`, the ledger's representation of an absent
    /// optional argument.
    pub fn optional(v: Option<ScVal>) -> Self {
        v.unwrap_or(ScVal::Void)
    }

    /// Build a map. Entries are sorted by key, which is the only order the
    /// ledger accepts, so equal maps always encode identically.
    pub fn map(entries: impl IntoIterator<Item = (ScVal, ScVal)>) -> Self {
        let mut entries: Vec<ScMapEntry> = entries
            .into_iter()
            .map(|(key, val)| ScMapEntry { key, val })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        ScVal::Map(entries)
    }

    /// Name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ScVal::Void => "void",
            ScVal::Bool(_) => "bool",
            ScVal::U32(_) => "u32",
            ScVal::I32(_) => "i32",
            ScVal::U64(_) => "u64",
            ScVal::I64(_) => "i64",
            ScVal::Bytes(_) => "bytes",
            ScVal::String(_) => "string",
            ScVal::Symbol(_) => "symbol",
            ScVal::Address(_) => "address",
            ScVal::Vec(_) => "vec",
            ScVal::Map(_) => "map",
        }
    }

    /// Borrow the text of a `String`, `Symbol` or `Address`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScVal::String(s) | ScVal::Symbol(s) | ScVal::Address(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a map entry by textual key (string or symbol).
    pub fn get(&self, key: &str) -> Option<&ScVal> {
        match self {
            ScVal::Map(entries) => entries
                .iter()
                .find(|e| e.key.as_str() == Some(key))
                .map(|e| &e.val),
            _ => None,
        }
    }

    /// Recursively decode into a native JSON value.
    ///
    /// Strings, symbols and addresses become JSON strings, vectors become
    /// arrays, maps become objects. Map keys that are not textual are
    /// rendered through their own native form.
    pub fn to_native(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            ScVal::Void => Value::Null,
            ScVal::Bool(b) => Value::Bool(*b),
            ScVal::U32(n) => Value::from(*n),
            ScVal::I32(n) => Value::from(*n),
            ScVal::U64(n) => Value::from(*n),
            ScVal::I64(n) => Value::from(*n),
            ScVal::Bytes(b) => Value::String(hex::encode(b)),
            ScVal::String(s) | ScVal::Symbol(s) | ScVal::Address(s) => Value::String(s.clone()),
            ScVal::Vec(items) => Value::Array(items.iter().map(ScVal::to_native).collect()),
            ScVal::Map(entries) => {
                let mut obj = serde_json::Map::with_capacity(entries.len());
                for entry in entries {
                    let key = match entry.key.to_native() {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    obj.insert(key, entry.val.to_native());
                }
                Value::Object(obj)
            }
        }
    }

    /// Append a canonical, self-delimiting encoding of this value.
    ///
    /// One tag byte per kind, fixed-width big-endian integers, and
    /// length-prefixed variable data. Used for transaction signing, where
    /// serde output order is not something to bet a signature on.
    pub fn write_canonical(&self, buf: &mut Vec<u8>) {
        match self {
            ScVal::Void => buf.push(0x00),
            ScVal::Bool(b) => {
                buf.push(0x01);
                buf.push(u8::from(*b));
            }
            ScVal::U32(n) => {
                buf.push(0x02);
                buf.extend_from_slice(&n.to_be_bytes());
            }
            ScVal::I32(n) => {
                buf.push(0x03);
                buf.extend_from_slice(&n.to_be_bytes());
            }
            ScVal::U64(n) => {
                buf.push(0x04);
                buf.extend_from_slice(&n.to_be_bytes());
            }
            ScVal::I64(n) => {
                buf.push(0x05);
                buf.extend_from_slice(&n.to_be_bytes());
            }
            ScVal::Bytes(b) => {
                buf.push(0x06);
                write_len_prefixed(buf, b);
            }
            ScVal::String(s) => {
                buf.push(0x07);
                write_len_prefixed(buf, s.as_bytes());
            }
            ScVal::Symbol(s) => {
                buf.push(0x08);
                write_len_prefixed(buf, s.as_bytes());
            }
            ScVal::Address(s) => {
                buf.push(0x09);
                write_len_prefixed(buf, s.as_bytes());
            }
            ScVal::Vec(items) => {
                buf.push(0x0A);
                buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_canonical(buf);
                }
            }
            ScVal::Map(entries) => {
                buf.push(0x0B);
                buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());
                for entry in entries {
                    entry.key.write_canonical(buf);
                    entry.val.write_canonical(buf);
                }
            }
        }
    }
}

pub(crate) fn write_len_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

impl From<&str> for ScVal {
    fn from(s: &str) -> Self {
        ScVal::String(s.to_string())
    }
}

impl From<String> for ScVal {
    fn from(s: String) -> Self {
        ScVal::String(s)
    }
}

impl fmt::Display for ScVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_native())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(v: &ScVal) -> Vec<u8> {
        let mut buf = Vec::new();
        v.write_canonical(&mut buf);
        buf
    }

    #[test]
    fn decodes_struct_shaped_map() {
        let v = ScVal::map([
            (ScVal::symbol("id"), ScVal::string("abc")),
            (ScVal::symbol("hash"), ScVal::string("ff00")),
        ]);
        assert_eq!(v.to_native(), json!({ "id": "abc", "hash": "ff00" }));
    }

    #[test]
    fn decodes_nested_vec_and_map() {
        let v = ScVal::Vec(vec![
            ScVal::U32(7),
            ScVal::map([(ScVal::string("k"), ScVal::Vec(vec![ScVal::Bool(true)]))]),
            ScVal::Void,
        ]);
        assert_eq!(v.to_native(), json!([7, { "k": [true] }, null]));
    }

    #[test]
    fn non_text_map_keys_are_stringified() {
        let v = ScVal::map([(ScVal::U64(42), ScVal::symbol("answer"))]);
        assert_eq!(v.to_native(), json!({ "42": "answer" }));
    }

    #[test]
    fn bytes_decode_as_hex() {
        assert_eq!(ScVal::Bytes(vec![0xde, 0xad]).to_native(), json!("dead"));
    }

    #[test]
    fn map_lookup_by_symbol_or_string_key() {
        let v = ScVal::map([
            (ScVal::symbol("hash"), ScVal::string("h1")),
            (ScVal::string("id"), ScVal::string("i1")),
        ]);
        assert_eq!(v.get("hash").and_then(ScVal::as_str), Some("h1"));
        assert_eq!(v.get("id").and_then(ScVal::as_str), Some("i1"));
        assert!(v.get("missing").is_none());
        assert!(ScVal::Void.get("hash").is_none());
    }

    #[test]
    fn map_constructor_sorts_entries() {
        let a = ScVal::map([
            (ScVal::symbol("b"), ScVal::Void),
            (ScVal::symbol("a"), ScVal::Void),
        ]);
        let b = ScVal::map([
            (ScVal::symbol("a"), ScVal::Void),
            (ScVal::symbol("b"), ScVal::Void),
        ]);
        assert_eq!(a, b);
        assert_eq!(canonical(&a), canonical(&b));
    }

    #[test]
    fn canonical_encoding_distinguishes_kinds() {
        // Same text, different kinds: must never collide in a signature.
        assert_ne!(
            canonical(&ScVal::string("x")),
            canonical(&ScVal::symbol("x"))
        );
        assert_ne!(canonical(&ScVal::U32(1)), canonical(&ScVal::I32(1)));
    }

    #[test]
    fn canonical_encoding_is_self_delimiting() {
        let ab = ScVal::Vec(vec![ScVal::string("ab"), ScVal::string("")]);
        let a_b = ScVal::Vec(vec![ScVal::string("a"), ScVal::string("b")]);
        assert_ne!(canonical(&ab), canonical(&a_b));
    }

    #[test]
    fn optional_none_is_void() {
        assert_eq!(ScVal::optional(None), ScVal::Void);
        assert_eq!(
            ScVal::optional(Some(ScVal::string("h"))),
            ScVal::string("h")
        );
    }

    #[test]
    fn serde_wire_form_is_tagged() {
        let v = ScVal::string("abc");
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({ "type": "string", "value": "abc" })
        );
        assert_eq!(
            serde_json::to_value(ScVal::Void).unwrap(),
            json!({ "type": "void" })
        );
    }
}
