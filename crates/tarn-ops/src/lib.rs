//! # tarn-ops
//!
//! Operator registry and execution for Tarn.
//!
//! Operators are data, not types: an [`OpDef`] bundles a shape-inference
//! function, a kernel table keyed by (device kind, dtype), an optional
//! gradient maker that rewrites a forward node into its backward node(s),
//! and capability hints. A global registry maps string identifiers to
//! definitions; [`run_node`]/[`run_program`] are the thin invocation
//! boundary an external executor drives.

pub mod registry;
pub mod context;
pub mod kldiv;
pub mod backward;
pub mod run;

pub use registry::{op_def, register_builtin_ops, register_op, KernelKey, OpDef};
pub use context::{ExecContext, InferShapeContext};
pub use kldiv::{Reduction, KLDIV_LOSS, KLDIV_LOSS_GRAD};
pub use backward::append_backward;
pub use run::{infer_node_shapes, run_node, run_program};
