//! The homomorphic coprocessor seam.
//!
//! The cipher mathematics is an opaque oracle to this crate. The gate only
//! needs something that, given an operation and its operand handles,
//! produces the handle of the result. [`SymbolicCoprocessor`] is a
//! deterministic stand-in that type-checks operations and derives result
//! ids from their content.

use std::fmt;

use async_trait::async_trait;
use fhe_acl_core::{FheType, Handle, HandleId};
use thiserror::Error;

/// A homomorphic operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FheOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Min,
    Max,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Neg,
    Not,
    /// `select(condition, if_true, if_false)`.
    Select,
    /// Re-encrypt under another type.
    Cast(FheType),
    /// Encrypt a public constant. Big-endian plaintext bytes.
    TrivialEncrypt { value: Vec<u8>, fhe_type: FheType },
}

impl FheOp {
    /// Number of operand handles the operation takes.
    pub fn arity(&self) -> usize {
        match self {
            FheOp::TrivialEncrypt { .. } => 0,
            FheOp::Neg | FheOp::Not | FheOp::Cast(_) => 1,
            FheOp::Select => 3,
            _ => 2,
        }
    }

    /// Stable tag used when deriving result ids.
    pub fn tag(&self) -> &'static str {
        match self {
            FheOp::Add => "add",
            FheOp::Sub => "sub",
            FheOp::Mul => "mul",
            FheOp::Div => "div",
            FheOp::Rem => "rem",
            FheOp::Min => "min",
            FheOp::Max => "max",
            FheOp::BitAnd => "and",
            FheOp::BitOr => "or",
            FheOp::BitXor => "xor",
            FheOp::Shl => "shl",
            FheOp::Shr => "shr",
            FheOp::Eq => "eq",
            FheOp::Ne => "ne",
            FheOp::Lt => "lt",
            FheOp::Le => "le",
            FheOp::Gt => "gt",
            FheOp::Ge => "ge",
            FheOp::Neg => "neg",
            FheOp::Not => "not",
            FheOp::Select => "select",
            FheOp::Cast(_) => "cast",
            FheOp::TrivialEncrypt { .. } => "trivial",
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(
            self,
            FheOp::Eq | FheOp::Ne | FheOp::Lt | FheOp::Le | FheOp::Gt | FheOp::Ge
        )
    }
}

impl fmt::Display for FheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FheOp::Cast(to) => write!(f, "cast<{}>", to),
            FheOp::TrivialEncrypt { fhe_type, .. } => write!(f, "trivial<{}>", fhe_type),
            other => write!(f, "{}", other.tag()),
        }
    }
}

/// Errors reported by a coprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoprocessorError {
    /// Wrong number of operands.
    #[error("{op} takes {expected} operands, got {got}")]
    Arity {
        op: String,
        expected: usize,
        got: usize,
    },

    /// Operand types do not fit the operation.
    #[error("{op} is not defined for {detail}")]
    TypeMismatch { op: String, detail: String },

    /// Constant does not fit the requested type.
    #[error("plaintext of {len} bytes does not fit {fhe_type}")]
    InvalidPlaintext { len: usize, fhe_type: FheType },

    /// Backend failure.
    #[error("coprocessor unavailable: {0}")]
    Unavailable(String),
}

/// Evaluates homomorphic operations on handles.
#[async_trait]
pub trait Coprocessor: Send + Sync {
    /// Evaluate `op` over `operands` and return the result handle.
    async fn evaluate(&self, op: &FheOp, operands: &[Handle]) -> Result<Handle, CoprocessorError>;
}

/// Deterministic, type-checking coprocessor.
///
/// Identical operations over identical operands always yield the same
/// handle id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolicCoprocessor;

impl SymbolicCoprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Result type of `op`, or why it is ill-typed.
    pub fn result_type(op: &FheOp, operands: &[FheType]) -> Result<FheType, CoprocessorError> {
        if operands.len() != op.arity() {
            return Err(CoprocessorError::Arity {
                op: op.to_string(),
                expected: op.arity(),
                got: operands.len(),
            });
        }
        let mismatch = |detail: String| CoprocessorError::TypeMismatch {
            op: op.to_string(),
            detail,
        };

        match op {
            FheOp::TrivialEncrypt { value, fhe_type } => {
                let max_len = usize::from(fhe_type.bit_width()).div_ceil(8);
                let fits = match fhe_type {
                    FheType::Bool => value.len() <= 1 && value.iter().all(|b| *b <= 1),
                    _ => value.len() <= max_len,
                };
                if fits {
                    Ok(*fhe_type)
                } else {
                    Err(CoprocessorError::InvalidPlaintext {
                        len: value.len(),
                        fhe_type: *fhe_type,
                    })
                }
            }
            FheOp::Neg => {
                let t = operands[0];
                t.is_numeric()
                    .then_some(t)
                    .ok_or_else(|| mismatch(t.to_string()))
            }
            FheOp::Not => {
                let t = operands[0];
                (t.is_numeric() || t == FheType::Bool)
                    .then_some(t)
                    .ok_or_else(|| mismatch(t.to_string()))
            }
            FheOp::Cast(to) => {
                let from = operands[0];
                let castable = |t: FheType| t.is_numeric() || t == FheType::Bool;
                (castable(from) && castable(*to))
                    .then_some(*to)
                    .ok_or_else(|| mismatch(format!("{} to {}", from, to)))
            }
            FheOp::Select => {
                let (cond, a, b) = (operands[0], operands[1], operands[2]);
                if cond != FheType::Bool {
                    return Err(mismatch(format!("condition of type {}", cond)));
                }
                (a == b)
                    .then_some(a)
                    .ok_or_else(|| mismatch(format!("branches {} and {}", a, b)))
            }
            _ => {
                let (a, b) = (operands[0], operands[1]);
                if a != b {
                    return Err(mismatch(format!("{} and {}", a, b)));
                }
                let allowed = match op {
                    FheOp::Eq | FheOp::Ne => true,
                    FheOp::BitAnd | FheOp::BitOr | FheOp::BitXor => {
                        a.is_numeric() || a == FheType::Bool
                    }
                    _ => a.is_numeric(),
                };
                if !allowed {
                    return Err(mismatch(a.to_string()));
                }
                Ok(if op.is_comparison() { FheType::Bool } else { a })
            }
        }
    }
}

#[async_trait]
impl Coprocessor for SymbolicCoprocessor {
    async fn evaluate(&self, op: &FheOp, operands: &[Handle]) -> Result<Handle, CoprocessorError> {
        let types: Vec<FheType> = operands.iter().map(|h| h.fhe_type).collect();
        let fhe_type = Self::result_type(op, &types)?;

        let id = match op {
            FheOp::TrivialEncrypt { value, .. } => HandleId::derive_trivial(value, fhe_type),
            _ => {
                let ids: Vec<HandleId> = operands.iter().map(|h| h.id).collect();
                HandleId::derive_computed(op.tag(), &ids, fhe_type)
            }
        };

        Ok(Handle::new(id, fhe_type))
    }
}
