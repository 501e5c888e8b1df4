use crate::device::DeviceKind;
use crate::dtype::DType;

/// Errors raised by the Tarn framework.
///
/// Every variant is a contract violation detected eagerly, before any
/// output is written. Messages name the operator and the offending
/// binding or attribute together with expected and actual values.
#[derive(Debug, thiserror::Error)]
pub enum TarnError {
    #[error("operator '{op}': required input '{name}' is not bound")]
    MissingInput { op: String, name: String },

    #[error("operator '{op}': required output '{name}' is not bound")]
    MissingOutput { op: String, name: String },

    #[error("operator '{op}': '{lhs}' has rank {lhs_rank} but '{rhs}' has rank {rhs_rank}")]
    RankMismatch {
        op: String,
        lhs: String,
        rhs: String,
        lhs_rank: usize,
        rhs_rank: usize,
    },

    #[error(
        "operator '{op}': '{lhs}' and '{rhs}' differ at dim {axis} ({lhs_dim} vs {rhs_dim})"
    )]
    DimMismatch {
        op: String,
        lhs: String,
        rhs: String,
        axis: usize,
        lhs_dim: usize,
        rhs_dim: usize,
    },

    #[error("operator '{op}': attribute '{attr}' has invalid value '{value}' (allowed: {allowed})")]
    InvalidAttr {
        op: String,
        attr: String,
        value: String,
        allowed: String,
    },

    #[error("attribute '{attr}': expected {expected}, got {got}")]
    AttrTypeMismatch {
        attr: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("operator '{op}': '{name}' has unresolved placeholder dims at execution time")]
    UnresolvedShape { op: String, name: String },

    #[error("unknown operator '{0}'")]
    UnknownOp(String),

    #[error("no variable named '{0}' in scope")]
    UnknownVar(String),

    #[error("no kernel for operator '{op}' on device {device} with dtype {dtype}")]
    NoKernel {
        op: String,
        device: DeviceKind,
        dtype: DType,
    },

    #[error("unsupported dtype: {0}")]
    UnsupportedDType(DType),

    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("cannot reshape {numel} elements into {shape:?}")]
    InvalidReshape { numel: usize, shape: Vec<usize> },

    #[error("axis {axis} out of range for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let e = TarnError::MissingInput {
            op: "kldiv_loss".into(),
            name: "Target".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("kldiv_loss"));
        assert!(msg.contains("Target"));

        let e = TarnError::DimMismatch {
            op: "kldiv_loss".into(),
            lhs: "X".into(),
            rhs: "Target".into(),
            axis: 1,
            lhs_dim: 3,
            rhs_dim: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("dim 1"));
        assert!(msg.contains("3 vs 4"));
    }

    #[test]
    fn test_no_kernel_message() {
        let e = TarnError::NoKernel {
            op: "kldiv_loss".into(),
            device: DeviceKind::Cuda,
            dtype: DType::I32,
        };
        let msg = e.to_string();
        assert!(msg.contains("cuda"));
        assert!(msg.contains("i32"));
    }
}
