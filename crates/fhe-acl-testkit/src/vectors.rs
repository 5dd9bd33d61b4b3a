//! Golden test vectors for deterministic handle derivation.
//!
//! An imported handle's id is a function of the verifier's signed proof,
//! so the same (verifier seed, contract, account, ciphertext, type, nonce)
//! must yield the same id on every platform.

use serde::Serialize;

use fhe_acl_core::{Address, FheType, HandleId, InputProof, Keypair};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed of the verifier keypair.
    pub seed: [u8; 32],
    pub contract: [u8; 20],
    pub account: [u8; 20],
    pub ciphertext: &'static [u8],
    pub fhe_type: FheType,
    pub nonce: u64,
    /// Expected handle id (hex). Empty means "report only".
    pub expected_handle: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "uint64 amount",
            seed: [0x42; 32],
            contract: [0xc0; 20],
            account: [0xa1; 20],
            ciphertext: b"amount",
            fhe_type: FheType::Uint64,
            nonce: 1,
            expected_handle: "",
        },
        GoldenVector {
            name: "bool flag",
            seed: [0x42; 32],
            contract: [0xc0; 20],
            account: [0xa1; 20],
            ciphertext: b"\x01",
            fhe_type: FheType::Bool,
            nonce: 2,
            expected_handle: "",
        },
        GoldenVector {
            name: "empty ciphertext",
            seed: [0x00; 32],
            contract: [0x01; 20],
            account: [0x02; 20],
            ciphertext: b"",
            fhe_type: FheType::Uint8,
            nonce: 0,
            expected_handle: "",
        },
    ]
}

/// Issue the proof described by a golden vector.
pub fn proof_from_vector(vector: &GoldenVector) -> InputProof {
    let verifier = Keypair::from_seed(&vector.seed);
    InputProof::issue(
        &verifier,
        Address::from_bytes(vector.contract),
        Address::from_bytes(vector.account),
        vector.ciphertext,
        vector.fhe_type,
        vector.nonce,
    )
}

/// Handle id an import of this vector's input would register.
pub fn handle_from_vector(vector: &GoldenVector) -> HandleId {
    HandleId::derive_input(&proof_from_vector(vector).digest(), vector.fhe_type)
}

/// Verify all golden vectors produce consistent handle ids.
///
/// Returns `(name, matches, computed_hex)` for each vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = handle_from_vector(v).to_hex();
            let matches = v.expected_handle.is_empty() || hex == v.expected_handle;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}

#[derive(Serialize)]
struct ExportedVector {
    name: &'static str,
    seed: String,
    contract: String,
    account: String,
    ciphertext: String,
    fhe_type: FheType,
    nonce: u64,
    proof: String,
    handle: String,
}

/// Export every vector with its computed proof and handle as JSON, for
/// cross-checking other implementations.
pub fn export_vectors_json() -> serde_json::Result<String> {
    let exported: Vec<ExportedVector> = all_vectors()
        .iter()
        .map(|v| ExportedVector {
            name: v.name,
            seed: hex::encode(v.seed),
            contract: hex::encode(v.contract),
            account: hex::encode(v.account),
            ciphertext: hex::encode(v.ciphertext),
            fhe_type: v.fhe_type,
            nonce: v.nonce,
            proof: hex::encode(proof_from_vector(v).to_bytes()),
            handle: handle_from_vector(v).to_hex(),
        })
        .collect();
    serde_json::to_string_pretty(&exported)
}
