//! Binary envelope codec for artifacts at rest.
//!
//! Envelope layout: a 4-byte big-endian length, the UTF-8 type name, then
//! the payload running to the end of the buffer. Native variants use the
//! reserved `invariant.*` type names; a Domain's payload is exactly its
//! `to_stream` output, with the registry resolving the type name back to a
//! deserializer. Envelopes nested inside List/Map payloads carry a 4-byte
//! big-endian byte count in front, since a Domain payload is not
//! self-delimiting. The digest of an artifact is computed before envelope
//! wrapping; this format is purely transport.

use crate::store::{StoreError, TypeRegistry};
use crate::value::Value;

pub const TYPE_NULL: &str = "invariant.Null";
pub const TYPE_BOOL: &str = "invariant.Bool";
pub const TYPE_INT: &str = "invariant.Int";
pub const TYPE_DECIMAL: &str = "invariant.Decimal";
pub const TYPE_STR: &str = "invariant.Str";
pub const TYPE_LIST: &str = "invariant.List";
pub const TYPE_MAP: &str = "invariant.Map";

/// Encodes a value as a top-level envelope.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_envelope(&mut out, value);
    out
}

/// Decodes a top-level envelope. `at` labels the source in error messages.
pub fn decode(bytes: &[u8], types: &TypeRegistry, at: &str) -> Result<Value, StoreError> {
    let mut reader = Reader {
        buf: bytes,
        pos: 0,
        at,
    };
    let value = read_envelope_to_end(&mut reader, types)?;
    Ok(value)
}

fn write_envelope(out: &mut Vec<u8>, value: &Value) {
    let (name, payload) = match value {
        Value::Null => (TYPE_NULL, Vec::new()),
        Value::Bool(b) => (TYPE_BOOL, vec![u8::from(*b)]),
        Value::Int(n) => {
            let bytes = n.to_signed_bytes_be();
            let mut payload = Vec::with_capacity(4 + bytes.len());
            write_u32(&mut payload, bytes.len());
            payload.extend_from_slice(&bytes);
            (TYPE_INT, payload)
        }
        Value::Decimal(d) => {
            let text = Value::decimal_canonical(d);
            let mut payload = Vec::with_capacity(4 + text.len());
            write_u32(&mut payload, text.len());
            payload.extend_from_slice(text.as_bytes());
            (TYPE_DECIMAL, payload)
        }
        Value::Str(s) => {
            let mut payload = Vec::with_capacity(4 + s.len());
            write_u32(&mut payload, s.len());
            payload.extend_from_slice(s.as_bytes());
            (TYPE_STR, payload)
        }
        Value::List(items) => {
            let mut payload = Vec::new();
            write_u32(&mut payload, items.len());
            for item in items {
                write_nested(&mut payload, item);
            }
            (TYPE_LIST, payload)
        }
        Value::Map(entries) => {
            let mut payload = Vec::new();
            write_u32(&mut payload, entries.len());
            for (key, val) in entries {
                write_nested(&mut payload, &Value::Str(key.clone()));
                write_nested(&mut payload, val);
            }
            (TYPE_MAP, payload)
        }
        Value::Domain(artifact) => {
            let name = artifact.type_name();
            write_u32(out, name.len());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&artifact.to_stream());
            return;
        }
    };
    write_u32(out, name.len());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&payload);
}

fn write_nested(out: &mut Vec<u8>, value: &Value) {
    let mut envelope = Vec::new();
    write_envelope(&mut envelope, value);
    write_u32(out, envelope.len());
    out.extend_from_slice(&envelope);
}

fn write_u32(out: &mut Vec<u8>, n: usize) {
    out.extend_from_slice(&u32::try_from(n).expect("length fits u32").to_be_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    at: &'a str,
}

impl<'a> Reader<'a> {
    fn corrupt(&self, message: impl Into<String>) -> StoreError {
        StoreError::corrupt(self.at, message)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        if self.pos + n > self.buf.len() {
            return Err(self.corrupt(format!(
                "truncated envelope: wanted {n} bytes at offset {}",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<usize, StoreError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("4 bytes")) as usize)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

/// Reads one envelope whose payload runs to the end of the reader.
fn read_envelope_to_end(
    reader: &mut Reader<'_>,
    types: &TypeRegistry,
) -> Result<Value, StoreError> {
    let name_len = reader.take_u32()?;
    let name = std::str::from_utf8(reader.take(name_len)?)
        .map_err(|_| reader.corrupt("type name is not UTF-8"))?
        .to_string();

    match name.as_str() {
        TYPE_NULL => {
            if !reader.rest().is_empty() {
                return Err(reader.corrupt("Null payload must be empty"));
            }
            Ok(Value::Null)
        }
        TYPE_BOOL => {
            let byte = reader.take(1)?[0];
            expect_drained(reader)?;
            match byte {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(reader.corrupt(format!("invalid Bool byte {other:#04x}"))),
            }
        }
        TYPE_INT => {
            let len = reader.take_u32()?;
            let bytes = reader.take(len)?;
            expect_drained(reader)?;
            Ok(Value::Int(num_bigint::BigInt::from_signed_bytes_be(bytes)))
        }
        TYPE_DECIMAL => {
            let len = reader.take_u32()?;
            let text = std::str::from_utf8(reader.take(len)?)
                .map_err(|_| reader.corrupt("Decimal payload is not UTF-8"))?;
            let value =
                Value::decimal_str(text).map_err(|message| reader.corrupt(message))?;
            expect_drained(reader)?;
            Ok(value)
        }
        TYPE_STR => {
            let len = reader.take_u32()?;
            let text = std::str::from_utf8(reader.take(len)?)
                .map_err(|_| reader.corrupt("Str payload is not UTF-8"))?;
            let value = Value::str(text);
            expect_drained(reader)?;
            Ok(value)
        }
        TYPE_LIST => {
            let count = reader.take_u32()?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(read_nested(reader, types)?);
            }
            expect_drained(reader)?;
            Ok(Value::List(items))
        }
        TYPE_MAP => {
            let count = reader.take_u32()?;
            let mut entries = std::collections::BTreeMap::new();
            for _ in 0..count {
                let key = match read_nested(reader, types)? {
                    Value::Str(key) => key,
                    other => {
                        return Err(
                            reader.corrupt(format!("Map key must be Str, got {}", other.kind()))
                        );
                    }
                };
                let value = read_nested(reader, types)?;
                entries.insert(key, value);
            }
            expect_drained(reader)?;
            Ok(Value::Map(entries))
        }
        other => {
            let deserialize = types
                .get(other)
                .ok_or_else(|| StoreError::UnknownType(other.to_string()))?;
            let payload = reader.rest();
            Ok(Value::Domain(deserialize(payload)?))
        }
    }
}

fn read_nested(reader: &mut Reader<'_>, types: &TypeRegistry) -> Result<Value, StoreError> {
    let len = reader.take_u32()?;
    let bytes = reader.take(len)?;
    let mut nested = Reader {
        buf: bytes,
        pos: 0,
        at: reader.at,
    };
    read_envelope_to_end(&mut nested, types)
}

fn expect_drained(reader: &mut Reader<'_>) -> Result<(), StoreError> {
    if reader.rest().is_empty() {
        Ok(())
    } else {
        Err(reader.corrupt("trailing bytes after payload"))
    }
}
