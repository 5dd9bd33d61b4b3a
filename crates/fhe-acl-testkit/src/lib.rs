//! # fhe-acl testkit
//!
//! Testing utilities for fhe-acl.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known input proofs with their handle ids for cross-platform verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A deployed contract with a trusted verifier and named accounts
//!
//! ## Golden Vectors
//!
//! ```rust
//! use fhe_acl_testkit::vectors::{all_vectors, handle_from_vector};
//!
//! for vector in all_vectors() {
//!     println!("{}: {}", vector.name, handle_from_vector(&vector).to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use fhe_acl_testkit::generators::CallScript;
//!
//! proptest! {
//!     #[test]
//!     fn transients_never_outlive_their_call(script: CallScript) {
//!         // replay script.calls against a fixture
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use fhe_acl_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let input = fixture.seal(fixture.alice(), b"ct", FheType::Uint64, 1);
//! let mut call = fixture.host.begin_call(fixture.alice()).await;
//! let amount = call.import(&input).await?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture};
