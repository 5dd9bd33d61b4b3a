use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fhe_acl::{AclConfig, FheOp, HostContract, SymbolicCoprocessor};
use fhe_acl_core::{Address, Capability, CapabilitySet, ExternalInput, FheType, HandleId, Keypair, Principal};
use fhe_acl_perms::{authorize_operands, Requirement};
use fhe_acl_store::MemoryStore;

fn bench_authorize_operands(c: &mut Criterion) {
    let this = Principal::Contract(Address::from_bytes([0xc0; 20]));
    let sets: Vec<CapabilitySet> = (0..3u8)
        .map(|i| {
            let handle = HandleId::from_bytes([i; 32]);
            let mut set = CapabilitySet::empty(handle);
            for j in 1..=8u8 {
                let account = Principal::Account(Address::from_bytes([j; 20]));
                set.insert(Capability::permanent(handle, account));
            }
            set.insert(Capability::transient(handle, this));
            set
        })
        .collect();

    c.bench_function("authorize_operands/3", |b| {
        b.iter(|| authorize_operands(black_box(&sets), &this, Requirement::Any))
    });
}

fn bench_call(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let verifier = Keypair::from_seed(&[7; 32]);
    let contract = Address::for_contract(&verifier.address(), 1);
    let alice = Address::from_bytes([0xa1; 20]);
    let config = AclConfig::default()
        .with_verifier(verifier.public_key())
        .allow_input_reuse();
    let host = HostContract::new(contract, Arc::new(MemoryStore::new()), SymbolicCoprocessor, config);
    let input = ExternalInput::seal(&verifier, contract, alice, &b"lhs"[..], FheType::Uint64, 1);

    // Operands are kept by the contract so every iteration may use them.
    let (lhs, one) = rt.block_on(async {
        let mut call = host.begin_call(alice).await;
        let lhs = call.import(&input).await.expect("import");
        let one = call.trivial_encrypt(&[1], FheType::Uint64).await.expect("trivial");
        call.allow_this(&lhs.id).await.expect("keep lhs");
        call.allow_this(&one.id).await.expect("keep one");
        call.commit().await.expect("commit");
        (lhs, one)
    });

    c.bench_function("call/import_add_commit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut call = host.begin_call(alice).await;
                call.import(&input).await.expect("import");
                let sum = call.compute(FheOp::Add, &[lhs.id, one.id]).await.expect("add");
                // Only the first iteration registers `sum`; later ones find it kept.
                call.allow_this(&sum.id).await.expect("allow");
                call.commit().await.expect("commit")
            })
        })
    });
}

criterion_group!(benches, bench_authorize_operands, bench_call);
criterion_main!(benches);
