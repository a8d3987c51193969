//! `poly` operation package: integer polynomials as Domain artifacts.

use std::collections::BTreeMap;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::Zero;
use sha2::{Digest, Sha256};

use crate::exec::registry::{OpError, OpSignature, Operation, Registry};
use crate::resolve::Manifest;
use crate::store::{StoreError, TypeRegistry};
use crate::value::{Artifact, ArtifactHandle, Value};

/// An integer polynomial, coefficients in ascending degree order with no
/// trailing zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    coeffs: Vec<BigInt>,
}

impl Polynomial {
    pub const TYPE_NAME: &'static str = "invariant.poly.Polynomial";

    pub fn new(mut coeffs: Vec<BigInt>) -> Self {
        while coeffs.last().is_some_and(Zero::is_zero) {
            coeffs.pop();
        }
        Polynomial { coeffs }
    }

    pub fn coefficients(&self) -> &[BigInt] {
        &self.coeffs
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let len = self.coeffs.len().max(other.coeffs.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let a = self.coeffs.get(i).cloned().unwrap_or_else(BigInt::zero);
            let b = other.coeffs.get(i).cloned().unwrap_or_else(BigInt::zero);
            out.push(a + b);
        }
        Polynomial::new(out)
    }

    pub fn multiply(&self, other: &Polynomial) -> Polynomial {
        if self.coeffs.is_empty() || other.coeffs.is_empty() {
            return Polynomial::new(Vec::new());
        }
        let mut out = vec![BigInt::zero(); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                out[i + j] += a * b;
            }
        }
        Polynomial::new(out)
    }

    /// Horner evaluation at an integer point.
    pub fn evaluate(&self, x: &BigInt) -> BigInt {
        let mut acc = BigInt::zero();
        for coeff in self.coeffs.iter().rev() {
            acc = acc * x + coeff;
        }
        acc
    }

    pub fn from_stream(bytes: &[u8]) -> Result<Self, String> {
        fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], String> {
            if *pos + n > bytes.len() {
                return Err(format!("truncated polynomial stream at offset {pos}"));
            }
            let slice = &bytes[*pos..*pos + n];
            *pos += n;
            Ok(slice)
        }

        let mut pos = 0usize;
        let count =
            u32::from_be_bytes(take(bytes, &mut pos, 4)?.try_into().expect("4 bytes")) as usize;
        let mut coeffs = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let len =
                u32::from_be_bytes(take(bytes, &mut pos, 4)?.try_into().expect("4 bytes")) as usize;
            coeffs.push(BigInt::from_signed_bytes_be(take(bytes, &mut pos, len)?));
        }
        if pos != bytes.len() {
            return Err("trailing bytes in polynomial stream".to_string());
        }
        Ok(Polynomial::new(coeffs))
    }
}

impl Artifact for Polynomial {
    fn type_name(&self) -> &str {
        Polynomial::TYPE_NAME
    }

    fn stable_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(Polynomial::TYPE_NAME.as_bytes());
        hasher.update(self.to_stream());
        hasher.finalize().into()
    }

    fn to_stream(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.coeffs.len() as u32).to_be_bytes());
        for coeff in &self.coeffs {
            let bytes = coeff.to_signed_bytes_be();
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(&bytes);
        }
        out
    }

    fn attrs(&self) -> BTreeMap<String, Value> {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            "coefficients".to_string(),
            Value::List(self.coeffs.iter().cloned().map(Value::Int).collect()),
        );
        attrs.insert(
            "degree".to_string(),
            Value::Int(BigInt::from(self.coeffs.len() as i64 - 1)),
        );
        attrs
    }
}

fn deserialize(bytes: &[u8]) -> Result<ArtifactHandle, StoreError> {
    Polynomial::from_stream(bytes)
        .map(|p| Arc::new(p) as ArtifactHandle)
        .map_err(|message| StoreError::corrupt(Polynomial::TYPE_NAME, message))
}

/// Registers the polynomial deserializer for disk and wire decoding.
pub fn register_types(types: &mut TypeRegistry) {
    types.register(Polynomial::TYPE_NAME, deserialize);
}

/// Registers the `poly:*` operations.
pub fn register(registry: &mut Registry) {
    registry.register_package(
        "poly",
        vec![
            ("from_coefficients", Arc::new(FromCoefficients) as Arc<dyn Operation>),
            ("add", Arc::new(Add) as Arc<dyn Operation>),
            ("multiply", Arc::new(Multiply) as Arc<dyn Operation>),
            ("evaluate", Arc::new(Evaluate) as Arc<dyn Operation>),
        ],
    );
}

/// Reads a polynomial back out of a Domain argument via its attribute
/// projection; works uniformly for freshly built and store-loaded
/// artifacts.
fn poly_arg(args: &Manifest, name: &str) -> Result<Polynomial, OpError> {
    let artifact = match &args[name] {
        Value::Domain(artifact) => artifact,
        other => {
            return Err(OpError::new(format!(
                "parameter '{name}' must be a polynomial, got {}",
                other.kind()
            )));
        }
    };
    if artifact.type_name() != Polynomial::TYPE_NAME {
        return Err(OpError::new(format!(
            "parameter '{name}' must be a polynomial, got {}",
            artifact.type_name()
        )));
    }
    match artifact.attrs().remove("coefficients") {
        Some(Value::List(items)) => coeffs_from_values(&items).map(Polynomial::new),
        _ => Err(OpError::new("polynomial has no coefficient list")),
    }
}

fn coeffs_from_values(items: &[Value]) -> Result<Vec<BigInt>, OpError> {
    items
        .iter()
        .map(|item| match item {
            Value::Int(n) => Ok(n.clone()),
            other => Err(OpError::new(format!(
                "coefficients must be Int, got {}",
                other.kind()
            ))),
        })
        .collect()
}

struct FromCoefficients;

impl Operation for FromCoefficients {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("coefficients")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        let coeffs = match &args["coefficients"] {
            Value::List(items) => coeffs_from_values(items)?,
            other => {
                return Err(OpError::new(format!(
                    "coefficients must be a List of Int, got {}",
                    other.kind()
                )));
            }
        };
        Ok(Value::Domain(Arc::new(Polynomial::new(coeffs))))
    }
}

struct Add;

impl Operation for Add {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("a").required("b")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        let a = poly_arg(args, "a")?;
        let b = poly_arg(args, "b")?;
        Ok(Value::Domain(Arc::new(a.add(&b))))
    }
}

struct Multiply;

impl Operation for Multiply {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("a").required("b")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        let a = poly_arg(args, "a")?;
        let b = poly_arg(args, "b")?;
        Ok(Value::Domain(Arc::new(a.multiply(&b))))
    }
}

struct Evaluate;

impl Operation for Evaluate {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("p").required("x")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        let p = poly_arg(args, "p")?;
        let x = match &args["x"] {
            Value::Int(x) => x.clone(),
            other => {
                return Err(OpError::new(format!(
                    "evaluation point must be Int, got {}",
                    other.kind()
                )));
            }
        };
        Ok(Value::Int(p.evaluate(&x)))
    }
}
