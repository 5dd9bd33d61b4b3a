//! Strong type definitions for fhe-acl.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Blake3Hash;
use crate::error::CoreError;

/// Domain tags for handle derivation.
mod domains {
    pub const INPUT: &[u8] = b"fhe-acl-handle-input-v0:";
    pub const COMPUTED: &[u8] = b"fhe-acl-handle-computed-v0:";
    pub const TRIVIAL: &[u8] = b"fhe-acl-handle-trivial-v0:";
}

/// A 32-byte handle identifier.
///
/// Content-derived: two handles produced from the same inputs and metadata
/// have the same id. Handles are never mutated, only superseded.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleId(pub [u8; 32]);

impl HandleId {
    /// Create a new HandleId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// Derive the handle of an imported ciphertext from its proof digest.
    pub fn derive_input(proof_digest: &Blake3Hash, fhe_type: FheType) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domains::INPUT);
        hasher.update(&proof_digest.0);
        hasher.update(&[fhe_type.to_u8()]);
        Self(*hasher.finalize().as_bytes())
    }

    /// Derive the handle of an operation result.
    ///
    /// `op` is a stable operation tag; `operands` are hashed in order.
    pub fn derive_computed(op: &str, operands: &[HandleId], fhe_type: FheType) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domains::COMPUTED);
        hasher.update(op.as_bytes());
        hasher.update(b":");
        hasher.update(&(operands.len() as u32).to_be_bytes());
        for operand in operands {
            hasher.update(&operand.0);
        }
        hasher.update(&[fhe_type.to_u8()]);
        Self(*hasher.finalize().as_bytes())
    }

    /// Derive the handle of a trivially encrypted constant.
    pub fn derive_trivial(value: &[u8], fhe_type: FheType) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domains::TRIVIAL);
        hasher.update(&[fhe_type.to_u8()]);
        hasher.update(value);
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for HandleId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for HandleId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for HandleId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Declared encrypted type of a handle.
///
/// Irrelevant to capability logic; carried for type-safety in callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    Address = 7,
    Uint256 = 8,
}

impl FheType {
    /// Convert to u8 for serialization.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Bool),
            2 => Ok(Self::Uint8),
            3 => Ok(Self::Uint16),
            4 => Ok(Self::Uint32),
            5 => Ok(Self::Uint64),
            6 => Ok(Self::Uint128),
            7 => Ok(Self::Address),
            8 => Ok(Self::Uint256),
            other => Err(CoreError::UnknownFheType(other)),
        }
    }

    /// Plaintext bit width.
    pub fn bit_width(self) -> u16 {
        match self {
            Self::Bool => 1,
            Self::Uint8 => 8,
            Self::Uint16 => 16,
            Self::Uint32 => 32,
            Self::Uint64 => 64,
            Self::Uint128 => 128,
            Self::Address => 160,
            Self::Uint256 => 256,
        }
    }

    /// Whether arithmetic and ordering operations apply.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool | Self::Address)
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "ebool"),
            Self::Address => write!(f, "eaddress"),
            other => write!(f, "euint{}", other.bit_width()),
        }
    }
}

/// An internal handle: id plus declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub id: HandleId,
    pub fhe_type: FheType,
}

impl Handle {
    pub const fn new(id: HandleId, fhe_type: FheType) -> Self {
        Self { id, fhe_type }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.fhe_type, self.id)
    }
}

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the null address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// Deterministic address of a contract deployed by `deployer` at `nonce`.
    pub fn for_contract(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"fhe-acl-contract-v0:");
        hasher.update(&deployer.0);
        hasher.update(&nonce.to_be_bytes());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&hasher.finalize().as_bytes()[..20]);
        Self(arr)
    }

    /// The null address.
    pub const ZERO: Self = Self([0u8; 20]);
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..10])
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// Who a capability is held by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// A contract (usually the hosting contract itself).
    Contract(Address),
    /// An external account.
    Account(Address),
}

impl Principal {
    /// The underlying address.
    pub fn address(&self) -> &Address {
        match self {
            Principal::Contract(a) | Principal::Account(a) => a,
        }
    }

    /// Whether this principal is the null address.
    pub fn is_null(&self) -> bool {
        self.address().is_zero()
    }

    /// Storage tag: 0 = contract, 1 = account.
    pub fn kind_tag(&self) -> u8 {
        match self {
            Principal::Contract(_) => 0,
            Principal::Account(_) => 1,
        }
    }

    /// Rebuild from a storage tag and address.
    pub fn from_tag(tag: u8, address: Address) -> Option<Self> {
        match tag {
            0 => Some(Principal::Contract(address)),
            1 => Some(Principal::Account(address)),
            _ => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Contract(a) => write!(f, "contract:{}", a),
            Principal::Account(a) => write!(f, "account:{}", a),
        }
    }
}
