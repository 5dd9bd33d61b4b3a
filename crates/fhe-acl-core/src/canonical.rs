//! Canonical CBOR encoding for input proofs.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Decoding re-encodes and rejects any byte string that is not the canonical
//! form, so one set of claims has exactly one valid proof encoding (and thus
//! one digest for replay tracking).

use ciborium::value::Value;

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature};
use crate::error::CoreError;
use crate::input::{InputProof, ProofClaims, PROOF_VERSION};
use crate::types::{Address, FheType};

/// Proof field keys (integer keys for compact encoding).
mod keys {
    pub const VERSION: u64 = 0;
    pub const CONTRACT: u64 = 1;
    pub const ACCOUNT: u64 = 2;
    pub const FHE_TYPE: u64 = 3;
    pub const CIPHERTEXT_DIGEST: u64 = 4;
    pub const NONCE: u64 = 5;
    pub const VERIFIER: u64 = 6;
    pub const SIGNATURE: u64 = 7;
}

/// Encode proof claims (the signed part) to canonical CBOR bytes.
pub fn proof_claims_bytes(claims: &ProofClaims) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &Value::Map(claims_entries(claims)));
    buf
}

/// Encode a full proof (claims + signature) to canonical CBOR bytes.
pub fn encode_proof(proof: &InputProof) -> Vec<u8> {
    let mut entries = claims_entries(&proof.claims);
    entries.push((
        Value::Integer(keys::SIGNATURE.into()),
        Value::Bytes(proof.signature.0.to_vec()),
    ));
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &Value::Map(entries));
    buf
}

/// Decode proof bytes. Rejects anything that is not canonical.
pub fn decode_proof(bytes: &[u8]) -> Result<InputProof, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let proof = cbor_value_to_proof(&value)?;

    if encode_proof(&proof) != bytes {
        return Err(CoreError::MalformedProof("non-canonical encoding".into()));
    }

    Ok(proof)
}

fn claims_entries(claims: &ProofClaims) -> Vec<(Value, Value)> {
    vec![
        (
            Value::Integer(keys::VERSION.into()),
            Value::Integer(claims.version.into()),
        ),
        (
            Value::Integer(keys::CONTRACT.into()),
            Value::Bytes(claims.contract.0.to_vec()),
        ),
        (
            Value::Integer(keys::ACCOUNT.into()),
            Value::Bytes(claims.account.0.to_vec()),
        ),
        (
            Value::Integer(keys::FHE_TYPE.into()),
            Value::Integer(claims.fhe_type.to_u8().into()),
        ),
        (
            Value::Integer(keys::CIPHERTEXT_DIGEST.into()),
            Value::Bytes(claims.ciphertext_digest.0.to_vec()),
        ),
        (
            Value::Integer(keys::NONCE.into()),
            Value::Integer(claims.nonce.into()),
        ),
        (
            Value::Integer(keys::VERIFIER.into()),
            Value::Bytes(claims.verifier.0.to_vec()),
        ),
    ]
}

fn cbor_value_to_proof(value: &Value) -> Result<InputProof, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedProof("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    };

    let version = uint_field(get(keys::VERSION), "version")?;
    if version != PROOF_VERSION as u64 {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let fhe_tag = uint_field(get(keys::FHE_TYPE), "fhe_type")?;
    let fhe_type = u8::try_from(fhe_tag)
        .map_err(|_| CoreError::MalformedProof("fhe_type out of range".into()))
        .and_then(FheType::from_u8)?;

    let mut contract = [0u8; 20];
    contract.copy_from_slice(fixed_field(get(keys::CONTRACT), "contract", 20)?);
    let mut account = [0u8; 20];
    account.copy_from_slice(fixed_field(get(keys::ACCOUNT), "account", 20)?);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(fixed_field(get(keys::CIPHERTEXT_DIGEST), "ciphertext_digest", 32)?);
    let mut verifier = [0u8; 32];
    verifier.copy_from_slice(fixed_field(get(keys::VERIFIER), "verifier", 32)?);
    let mut signature = [0u8; 64];
    signature.copy_from_slice(fixed_field(get(keys::SIGNATURE), "signature", 64)?);

    Ok(InputProof {
        claims: ProofClaims {
            version: PROOF_VERSION,
            contract: Address(contract),
            account: Address(account),
            fhe_type,
            ciphertext_digest: Blake3Hash(digest),
            nonce: uint_field(get(keys::NONCE), "nonce")?,
            verifier: Ed25519PublicKey(verifier),
        },
        signature: Ed25519Signature(signature),
    })
}

fn uint_field(value: Option<&Value>, name: &str) -> Result<u64, CoreError> {
    match value {
        Some(Value::Integer(i)) => u64::try_from(*i)
            .map_err(|_| CoreError::MalformedProof(format!("{} out of range", name))),
        _ => Err(CoreError::MalformedProof(format!("missing {}", name))),
    }
}

fn fixed_field<'a>(value: Option<&'a Value>, name: &str, len: usize) -> Result<&'a [u8], CoreError> {
    match value {
        Some(Value::Bytes(b)) if b.len() == len => Ok(b.as_slice()),
        _ => Err(CoreError::MalformedProof(format!("invalid {}", name))),
    }
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes used by proofs are supported.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        // Never constructed by this module.
        _ => buf.push(0xf7),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n = i128::from(i);
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5), keys sorted by encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
