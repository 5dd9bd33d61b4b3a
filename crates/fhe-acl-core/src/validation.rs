//! External input validation: proof decoding, signature and binding checks.

use bytes::Bytes;

use crate::canonical::decode_proof;
use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::ProofError;
use crate::input::ExternalInput;
use crate::types::{Address, Handle, HandleId};

/// An external input that passed every proof check.
///
/// Replay tracking is not done here; the caller must still consult its
/// registry with [`VerifiedInput::proof_digest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInput {
    /// The handle the ciphertext materializes as.
    pub handle: Handle,
    /// Identity of the consumed proof.
    pub proof_digest: Blake3Hash,
    /// The ciphertext, for handing to the coprocessor.
    pub ciphertext: Bytes,
}

/// Validate an external input for import into `contract` by `account`.
///
/// This performs, in order:
/// - Proof decoding (canonical CBOR only)
/// - Verifier trust check against `trusted_verifiers`
/// - Signature verification
/// - Ciphertext digest check
/// - Binding check: the proof must name exactly (`contract`, `account`)
///
/// Failures of the first four yield [`ProofError::InvalidProof`]; a genuine
/// proof bound elsewhere yields [`ProofError::InvalidSigner`].
pub fn verify_external_input(
    input: &ExternalInput,
    contract: &Address,
    account: &Address,
    trusted_verifiers: &[Ed25519PublicKey],
) -> Result<VerifiedInput, ProofError> {
    // 1. Decode
    let proof = decode_proof(&input.proof)?;
    let claims = &proof.claims;

    // 2. Trusted verifier
    if !trusted_verifiers.contains(&claims.verifier) {
        return Err(ProofError::InvalidProof(format!(
            "untrusted input verifier {}",
            &claims.verifier.to_hex()[..16]
        )));
    }

    // 3. Signature
    claims
        .verifier
        .verify(&claims.signed_message(), &proof.signature)
        .map_err(|_| ProofError::InvalidProof("signature verification failed".into()))?;

    // 4. Ciphertext covered by the proof
    if Blake3Hash::hash(&input.ciphertext) != claims.ciphertext_digest {
        return Err(ProofError::InvalidProof(
            "ciphertext does not match proof".into(),
        ));
    }

    // 5. Binding
    if claims.contract != *contract || claims.account != *account {
        return Err(ProofError::InvalidSigner {
            expected_contract: *contract,
            expected_account: *account,
            bound_contract: claims.contract,
            bound_account: claims.account,
        });
    }

    let proof_digest = proof.digest();
    Ok(VerifiedInput {
        handle: Handle::new(
            HandleId::derive_input(&proof_digest, claims.fhe_type),
            claims.fhe_type,
        ),
        proof_digest,
        ciphertext: input.ciphertext.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::types::FheType;

    struct Setup {
        verifier: Keypair,
        contract: Address,
        alice: Address,
        bob: Address,
    }

    fn setup() -> Setup {
        Setup {
            verifier: Keypair::from_seed(&[0x0f; 32]),
            contract: Address::from_bytes([0xc1; 20]),
            alice: Address::from_bytes([0xa1; 20]),
            bob: Address::from_bytes([0xb0; 20]),
        }
    }

    #[test]
    fn test_valid_input_materializes_handle() {
        let s = setup();
        let input = ExternalInput::seal(&s.verifier, s.contract, s.alice, b"ct".to_vec(), FheType::Uint64, 1);

        let verified =
            verify_external_input(&input, &s.contract, &s.alice, &[s.verifier.public_key()])
                .unwrap();
        assert_eq!(verified.handle.fhe_type, FheType::Uint64);

        // Same input, same handle.
        let again =
            verify_external_input(&input, &s.contract, &s.alice, &[s.verifier.public_key()])
                .unwrap();
        assert_eq!(verified.handle, again.handle);
    }

    #[test]
    fn test_wrong_account_is_invalid_signer() {
        let s = setup();
        let input = ExternalInput::seal(&s.verifier, s.contract, s.bob, b"ct".to_vec(), FheType::Uint64, 1);

        let err = verify_external_input(&input, &s.contract, &s.alice, &[s.verifier.public_key()])
            .unwrap_err();
        assert!(matches!(err, ProofError::InvalidSigner { bound_account, .. } if bound_account == s.bob));
    }

    #[test]
    fn test_wrong_contract_is_invalid_signer() {
        let s = setup();
        let other = Address::from_bytes([0xc2; 20]);
        let input = ExternalInput::seal(&s.verifier, s.contract, s.alice, b"ct".to_vec(), FheType::Uint64, 1);

        let err = verify_external_input(&input, &other, &s.alice, &[s.verifier.public_key()])
            .unwrap_err();
        assert!(matches!(err, ProofError::InvalidSigner { .. }));
    }

    #[test]
    fn test_untrusted_verifier_is_invalid_proof() {
        let s = setup();
        let rogue = Keypair::from_seed(&[0xee; 32]);
        let input = ExternalInput::seal(&rogue, s.contract, s.alice, b"ct".to_vec(), FheType::Uint64, 1);

        let err = verify_external_input(&input, &s.contract, &s.alice, &[s.verifier.public_key()])
            .unwrap_err();
        assert!(matches!(err, ProofError::InvalidProof(_)));
    }

    #[test]
    fn test_swapped_ciphertext_is_invalid_proof() {
        let s = setup();
        let mut input = ExternalInput::seal(&s.verifier, s.contract, s.alice, b"ct".to_vec(), FheType::Uint64, 1);
        input.ciphertext = Bytes::from_static(b"other");

        let err = verify_external_input(&input, &s.contract, &s.alice, &[s.verifier.public_key()])
            .unwrap_err();
        assert_eq!(err, ProofError::InvalidProof("ciphertext does not match proof".into()));
    }

    #[test]
    fn test_corrupted_proof_is_invalid_proof() {
        let s = setup();
        let input = ExternalInput::seal(&s.verifier, s.contract, s.alice, b"ct".to_vec(), FheType::Uint64, 1);

        // Flip a byte inside the signature (last bytes of the encoding).
        let mut proof = input.proof.to_vec();
        let last = proof.len() - 1;
        proof[last] ^= 0x01;
        let tampered = ExternalInput::new(input.ciphertext.clone(), proof);

        let err = verify_external_input(&tampered, &s.contract, &s.alice, &[s.verifier.public_key()])
            .unwrap_err();
        assert!(matches!(err, ProofError::InvalidProof(_)));

        let garbage = ExternalInput::new(input.ciphertext, vec![0xde, 0xad]);
        assert!(matches!(
            verify_external_input(&garbage, &s.contract, &s.alice, &[s.verifier.public_key()]),
            Err(ProofError::InvalidProof(_))
        ));
    }
}
