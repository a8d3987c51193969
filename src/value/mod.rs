//! The closed universe of cacheable values.
//!
//! Everything the engine stores, hashes, or passes across its interfaces is
//! a `Value`. The union is closed under list/map composition and Domain
//! embedding: no floats, no byte strings, no arbitrary objects. Making this
//! a sum type turns "is this cacheable?" into a compile-time guarantee.

pub mod artifact;
pub mod hash;

use std::collections::BTreeMap;
use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

pub use artifact::{Artifact, ArtifactHandle};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// Arbitrary-precision signed integer.
    Int(BigInt),
    /// Exact decimal, held in canonical (normalized) form.
    Decimal(BigDecimal),
    Str(String),
    List(Vec<Value>),
    /// Keys are unique; iteration order is sorted and irrelevant for hashing.
    Map(BTreeMap<String, Value>),
    /// Opaque artifact handle produced by an operation.
    Domain(ArtifactHandle),
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Builds a Decimal in canonical form: trailing non-significant zeros
    /// stripped, `-0` normalized to `0`.
    pub fn decimal(d: BigDecimal) -> Self {
        Value::Decimal(d.normalized())
    }

    /// Parses a decimal literal into canonical form.
    pub fn decimal_str(s: &str) -> Result<Self, String> {
        let parsed: BigDecimal = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid decimal literal '{s}'"))?;
        Ok(Value::decimal(parsed))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Decimal(_) => "Decimal",
            Value::Str(_) => "Str",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Domain(_) => "Domain",
        }
    }

    /// The canonical text form of a Decimal. Also what the hasher feeds.
    pub fn decimal_canonical(d: &BigDecimal) -> String {
        d.normalized().to_string()
    }

    /// Deterministic textual form used when a value is substituted into an
    /// interpolated string. Scalars render bare; composites render with
    /// sorted map keys; a Domain renders as its type name plus a hash
    /// prefix.
    pub fn display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{}", Value::decimal_canonical(d)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Domain(a) => {
                let h = a.stable_hash();
                write!(f, "{}#{}", a.type_name(), hex::encode(&h[..6]))
            }
        }
    }
}

/// Structural equality. Variants must match; contents compare recursively.
/// Domains compare by stable hash, so two handles to equal logical content
/// are equal regardless of identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Domain(a), Value::Domain(b)) => a.stable_hash() == b.stable_hash(),
            _ => false,
        }
    }
}

impl Eq for Value {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_construction_is_canonical() {
        let a = Value::decimal_str("2.50").unwrap();
        let b = Value::decimal_str("2.5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2.5");
    }

    #[test]
    fn negative_zero_normalizes() {
        let z = Value::decimal_str("-0").unwrap();
        assert_eq!(z.to_string(), "0");
    }

    #[test]
    fn map_equality_ignores_construction_order() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), Value::int(1));
        a.insert("y".to_string(), Value::int(2));
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), Value::int(2));
        b.insert("x".to_string(), Value::int(1));
        assert_eq!(Value::Map(a), Value::Map(b));
    }

    #[test]
    fn cross_variant_values_never_equal() {
        assert_ne!(Value::int(1), Value::decimal_str("1").unwrap());
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::int(-7).to_string(), "-7");
        assert_eq!(
            Value::List(vec![Value::int(1), Value::str("a")]).to_string(),
            "[1, a]"
        );
        let mut m = BTreeMap::new();
        m.insert("b".to_string(), Value::int(2));
        m.insert("a".to_string(), Value::int(1));
        assert_eq!(Value::Map(m).to_string(), "{a: 1, b: 2}");
    }
}
