//! End-to-end call scenarios against a deployed contract.
//!
//! Each test drives a [`HostContract`] through several calls and checks the
//! committed capability state between them.

use std::sync::Arc;

use anyhow::Result;
use fhe_acl::core::ProofError;
use fhe_acl::store::SqliteStore;
use fhe_acl::{
    AclConfig, AclError, FheOp, FheType, HostContract, PermsError, Principal, Requirement,
    SymbolicCoprocessor,
};
use fhe_acl_testkit::TestFixture;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn assert_denied(err: &AclError) {
    assert!(err.is_denial(), "expected a denial, got: {}", err);
}

// ─────────────────────────────────────────────────────────────────────────────
// Imported handles start without capabilities
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn imported_handle_must_be_granted_before_use() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([1; 32]);
    let input = fx.seal(fx.alice(), b"balance", FheType::Uint64, 1);

    // Using the handle without grants fails and reverts the call.
    let mut call = fx.host.begin_call(fx.alice()).await;
    let h1 = call.import(&input).await?;
    assert!(call.capabilities_of(&h1.id).await?.is_empty());
    assert!(!call.is_sender_allowed(&h1.id).await?);

    let err = call.compute(FheOp::Add, &[h1.id, h1.id]).await.unwrap_err();
    assert_denied(&err);
    assert!(!call.is_active());
    assert!(matches!(call.commit().await, Err(AclError::CallFinished)));
    assert!(fx.host.handles().await?.is_empty());

    // The reverted call did not consume the proof.
    let mut call = fx.host.begin_call(fx.alice()).await;
    let h1 = call.import(&input).await?;
    assert!(call.allow_this(&h1.id).await?);
    assert!(call.allow(&h1.id, fx.alice()).await?);
    call.commit().await?;

    let this = fx.host.principal();
    assert!(fx.host.is_allowed(&h1.id, &this).await?);
    assert!(fx.host.is_allowed(&h1.id, &Principal::Account(fx.alice())).await?);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let doubled = call.compute(FheOp::Add, &[h1.id, h1.id]).await?;
    assert_eq!(doubled.fhe_type, FheType::Uint64);
    let ticket = call.request_decryption(&h1.id).await?;
    assert_eq!(ticket.requester, Principal::Account(fx.alice()));
    assert!(!ticket.public);
    call.commit().await?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Derived handles do not inherit
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn derived_handle_starts_empty() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([2; 32]);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let h1 = call.import(&fx.seal(fx.alice(), b"a", FheType::Uint32, 1)).await?;
    call.allow_this(&h1.id).await?;
    call.allow(&h1.id, fx.alice()).await?;
    call.commit().await?;

    let mut call = fx.host.begin_call(fx.bob()).await;
    let h2 = call.import(&fx.seal(fx.bob(), b"b", FheType::Uint32, 1)).await?;
    call.allow_this(&h2.id).await?;
    call.allow(&h2.id, fx.bob()).await?;
    call.commit().await?;

    let mut call = fx.host.begin_call(fx.alice()).await;
    let h3 = call.compute(FheOp::Add, &[h1.id, h2.id]).await?;
    assert!(call.capabilities_of(&h3.id).await?.is_empty());

    let err = call.request_decryption(&h3.id).await.unwrap_err();
    match err {
        AclError::Permission(PermsError::Denied {
            handle,
            principal,
            required,
        }) => {
            assert_eq!(handle, h3.id);
            assert_eq!(principal, Principal::Account(fx.alice()));
            assert_eq!(required, Requirement::Permanent);
        }
        other => panic!("expected Denied, got {}", other),
    }
    drop(call);

    // Granted explicitly, the result becomes decryptable in a later call.
    let mut call = fx.host.begin_call(fx.alice()).await;
    let h3 = call.compute(FheOp::Add, &[h1.id, h2.id]).await?;
    call.allow(&h3.id, fx.alice()).await?;
    call.commit().await?;

    let mut call = fx.host.begin_call(fx.alice()).await;
    call.request_decryption(&h3.id).await?;
    // Neither operand's holders gained anything.
    assert!(!call.is_allowed(&h3.id, &Principal::Account(fx.bob())).await?);
    assert!(!call.is_allowed(&h3.id, &fx.host.principal()).await?);

    Ok(())
}

#[tokio::test]
async fn intermediate_needs_grant_before_reuse() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([3; 32]);
    let this = fx.host.principal();

    let mut call = fx.host.begin_call(fx.alice()).await;
    let x = call.import(&fx.seal(fx.alice(), b"x", FheType::Uint8, 1)).await?;
    call.allow_transient(&x.id, this).await?;
    let sum = call.compute(FheOp::Add, &[x.id, x.id]).await?;

    // The contract produced `sum` in this call, so it may grant it.
    assert!(call.allow_transient(&sum.id, this).await?);
    let product = call.compute(FheOp::Mul, &[sum.id, x.id]).await?;
    call.allow_this(&product.id).await?;
    call.commit().await?;

    assert!(fx.host.is_allowed(&product.id, &this).await?);
    assert!(!fx.host.is_allowed(&sum.id, &this).await?);
    assert!(!fx.host.is_allowed(&x.id, &this).await?);

    Ok(())
}

#[tokio::test]
async fn recomputing_a_known_result_grants_nothing() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([17; 32]);
    let this = fx.host.principal();

    let mut call = fx.host.begin_call(fx.alice()).await;
    let x = call.import(&fx.seal(fx.alice(), b"x", FheType::Uint8, 1)).await?;
    call.allow_this(&x.id).await?;
    let doubled = call.compute(FheOp::Add, &[x.id, x.id]).await?;
    call.allow(&doubled.id, fx.alice()).await?;
    call.commit().await?;

    // The same computation yields the same, already registered handle.
    let mut call = fx.host.begin_call(fx.bob()).await;
    let again = call.compute(FheOp::Add, &[x.id, x.id]).await?;
    assert_eq!(again, doubled);
    let err = call
        .allow(&doubled.id, fx.carol())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AclError::Permission(PermsError::Unauthorized { .. })
    ));
    drop(call);

    let set = fx.host.capabilities_of(&doubled.id).await?;
    assert!(set.has_permanent(&Principal::Account(fx.alice())));
    assert!(!set.allows(&Principal::Account(fx.carol())));
    assert!(!set.allows(&this));

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Transient grants expire with their call
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_grant_is_stale_in_later_call() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([4; 32]);
    let this = fx.host.principal();

    let mut call = fx.host.begin_call(fx.alice()).await;
    let first_call = call.id();
    let amount = call.import(&fx.seal(fx.alice(), b"amount", FheType::Uint64, 1)).await?;
    call.allow_transient(&amount.id, this).await?;

    let from = call.trivial_encrypt(&[100], FheType::Uint64).await?;
    let to = call.trivial_encrypt(&[0], FheType::Uint64).await?;
    call.allow_this(&from.id).await?;
    call.allow_this(&to.id).await?;

    let outcome = call.transfer(&amount.id, &from.id, &to.id).await?;
    assert_eq!(outcome.success.fhe_type, FheType::Bool);
    call.allow_this(&outcome.from.id).await?;
    call.allow_this(&outcome.to.id).await?;
    call.commit().await?;

    assert!(!fx.host.is_allowed(&amount.id, &this).await?);
    assert!(fx.host.capabilities_of(&amount.id).await?.is_empty());

    let mut call = fx.host.begin_call(fx.alice()).await;
    let err = call
        .transfer(&amount.id, &outcome.from.id, &outcome.to.id)
        .await
        .unwrap_err();
    assert_denied(&err);
    match err {
        AclError::Permission(PermsError::StaleTransientGrant {
            handle,
            principal,
            granted_in,
            current,
        }) => {
            assert_eq!(handle, amount.id);
            assert_eq!(principal, this);
            assert_eq!(granted_in, first_call);
            assert_ne!(current, first_call);
        }
        other => panic!("expected StaleTransientGrant, got {}", other),
    }

    Ok(())
}

#[tokio::test]
async fn aborted_call_leaves_no_trace() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([5; 32]);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let h = call.import(&fx.seal(fx.alice(), b"v", FheType::Uint16, 1)).await?;
    call.allow_this(&h.id).await?;
    call.allow(&h.id, fx.alice()).await?;
    call.abort();

    assert!(fx.host.handles().await?.is_empty());
    assert!(fx.host.capabilities_of(&h.id).await?.is_empty());

    {
        let mut call = fx.host.begin_call(fx.alice()).await;
        let h = call.import(&fx.seal(fx.alice(), b"w", FheType::Uint16, 2)).await?;
        call.allow_this(&h.id).await?;
        // dropped without commit
    }
    assert!(fx.host.handles().await?.is_empty());

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Delegation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn holder_delegates_permanent_capability() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([6; 32]);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let h1 = call.import(&fx.seal(fx.alice(), b"secret", FheType::Uint64, 1)).await?;
    call.allow_this(&h1.id).await?;
    call.allow(&h1.id, fx.alice()).await?;
    call.commit().await?;

    // Bob cannot decrypt yet.
    let mut call = fx.host.begin_call(fx.bob()).await;
    assert_denied(&call.request_decryption(&h1.id).await.unwrap_err());
    drop(call);

    // Carol holds nothing and cannot delegate.
    let mut call = fx.host.begin_call(fx.carol()).await;
    let err = call
        .delegate(&h1.id, Principal::Account(fx.bob()))
        .await
        .unwrap_err();
    assert!(!err.is_denial());
    assert!(matches!(
        err,
        AclError::Permission(PermsError::Unauthorized { .. })
    ));
    drop(call);

    let mut call = fx.host.begin_call(fx.alice()).await;
    assert!(call.delegate(&h1.id, Principal::Account(fx.bob())).await?);
    // Granting twice is a no-op.
    assert!(!call.delegate(&h1.id, Principal::Account(fx.bob())).await?);
    call.commit().await?;

    for _ in 0..2 {
        let mut call = fx.host.begin_call(fx.bob()).await;
        let ticket = call.request_decryption(&h1.id).await?;
        assert_eq!(ticket.handle, h1);
        assert_eq!(ticket.requester, Principal::Account(fx.bob()));
        call.commit().await?;
    }

    Ok(())
}

#[tokio::test]
async fn public_decryption_needs_no_capability() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([7; 32]);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let h = call.import(&fx.seal(fx.alice(), b"result", FheType::Bool, 1)).await?;
    call.allow_this(&h.id).await?;
    assert!(call.make_publicly_decryptable(&h.id).await?);
    call.commit().await?;

    assert!(fx.host.capabilities_of(&h.id).await?.is_publicly_decryptable());

    let mut call = fx.host.begin_call(fx.carol()).await;
    let ticket = call.request_decryption(&h.id).await?;
    assert!(ticket.public);
    assert_eq!(ticket.requester, Principal::Account(fx.carol()));
    // Public decryption grants nothing else.
    assert!(!call.is_sender_allowed(&h.id).await?);

    Ok(())
}

#[tokio::test]
async fn marking_public_requires_contract_capability() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([8; 32]);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let h = call.import(&fx.seal(fx.alice(), b"r", FheType::Bool, 1)).await?;
    let err = call.make_publicly_decryptable(&h.id).await.unwrap_err();
    assert_denied(&err);

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Input proofs
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn proof_for_another_account_is_rejected() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([9; 32]);
    let for_bob = fx.seal(fx.bob(), b"ct", FheType::Uint64, 1);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let err = call.import(&for_bob).await.unwrap_err();
    match err {
        AclError::Proof(ProofError::InvalidSigner {
            expected_account,
            bound_account,
            ..
        }) => {
            assert_eq!(expected_account, fx.alice());
            assert_eq!(bound_account, fx.bob());
        }
        other => panic!("expected InvalidSigner, got {}", other),
    }
    assert!(!call.is_active());
    assert!(fx.host.handles().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn proof_for_another_contract_is_rejected() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([10; 32]);
    let sibling = fx.sibling_contract(99);
    let input = fx.seal(fx.alice(), b"ct", FheType::Uint64, 1);

    let mut call = sibling.begin_call(fx.alice()).await;
    let err = call.import(&input).await.unwrap_err();
    assert!(matches!(
        err,
        AclError::Proof(ProofError::InvalidSigner { bound_contract, .. }) if bound_contract == fx.contract
    ));

    // The registries of the two contracts are separate.
    let mut call = fx.host.begin_call(fx.alice()).await;
    let h = call.import(&input).await?;
    call.allow_this(&h.id).await?;
    call.commit().await?;
    assert!(sibling.handles().await?.is_empty());
    assert!(!sibling.is_allowed(&h.id, &sibling.principal()).await?);

    Ok(())
}

#[tokio::test]
async fn replayed_proof_is_rejected() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([11; 32]);
    let input = fx.seal(fx.alice(), b"ct", FheType::Uint64, 1);

    let mut call = fx.host.begin_call(fx.alice()).await;
    call.import(&input).await?;
    call.commit().await?;

    let mut call = fx.host.begin_call(fx.alice()).await;
    let err = call.import(&input).await.unwrap_err();
    assert!(matches!(err, AclError::Proof(ProofError::InvalidProof(_))));

    Ok(())
}

#[tokio::test]
async fn untrusted_verifier_is_rejected() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([12; 32]);
    let rogue = TestFixture::with_seed([13; 32]);
    let forged = rogue.seal_for(fx.contract, fx.alice(), b"ct", FheType::Uint64, 1);

    let mut call = fx.host.begin_call(fx.alice()).await;
    let err = call
        .import_bytes(forged.ciphertext.clone(), forged.proof.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::Proof(ProofError::InvalidProof(_))));

    Ok(())
}

#[tokio::test]
async fn operand_limit_applies_to_compute() -> Result<()> {
    init_tracing();
    let fx = TestFixture::with_seed([14; 32]);
    let this = fx.host.principal();

    let mut call = fx.host.begin_call(fx.alice()).await;
    let c = call.trivial_encrypt(&[1], FheType::Bool).await?;
    let a = call.trivial_encrypt(&[1], FheType::Uint8).await?;
    for id in [c.id, a.id] {
        call.allow_transient(&id, this).await?;
    }
    let picked = call.compute(FheOp::Select, &[c.id, a.id, a.id]).await?;
    assert_eq!(picked.fhe_type, FheType::Uint8);

    let err = call
        .compute(FheOp::Add, &[a.id, a.id, a.id, a.id])
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::InvalidOperation(_)));

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Durable registry
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_registry_survives_reopen() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("acl.db");
    let fx = TestFixture::with_seed([15; 32]);
    let config = fx.host.config().clone();

    let h1 = {
        let store = Arc::new(SqliteStore::open(&path)?);
        let host = HostContract::new(fx.contract, store, SymbolicCoprocessor, config.clone());

        let mut call = host.begin_call(fx.alice()).await;
        let h1 = call.import(&fx.seal(fx.alice(), b"ct", FheType::Uint64, 1)).await?;
        call.allow_this(&h1.id).await?;
        call.allow(&h1.id, fx.alice()).await?;
        call.allow_transient(&h1.id, Principal::Account(fx.bob())).await?;
        call.commit().await?;
        h1
    };

    let store = Arc::new(SqliteStore::open(&path)?);
    let host = HostContract::new(fx.contract, store, SymbolicCoprocessor, config);

    assert_eq!(host.handles().await?, vec![h1]);
    let set = host.capabilities_of(&h1.id).await?;
    assert!(set.has_permanent(&host.principal()));
    assert!(set.has_permanent(&Principal::Account(fx.alice())));
    assert!(set.kind_for(&Principal::Account(fx.bob())).is_none());

    let mut call = host.begin_call(fx.alice()).await;
    call.request_decryption(&h1.id).await?;

    Ok(())
}

#[test]
fn config_loads_from_json() -> Result<()> {
    let fx = TestFixture::with_seed([16; 32]);
    let json = serde_json::to_string(fx.host.config())?;
    let parsed: AclConfig = serde_json::from_str(&json)?;
    assert_eq!(parsed.trusted_verifiers, vec![fx.verifier.public_key()]);
    assert!(parsed.single_use_inputs);
    Ok(())
}
