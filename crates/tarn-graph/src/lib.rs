//! # tarn-graph
//!
//! Graph description layer for Tarn.
//!
//! An [`OpNode`] is pure description: an operator type name, named input and
//! output bindings mapping to variable names, and an attribute map. A
//! [`Program`] is an ordered list of nodes; a [`Scope`] holds the runtime
//! tensors the variable names refer to. Description types derive serde so
//! programs can be written out and reloaded.

pub mod attrs;
pub mod node;
pub mod program;

pub use attrs::{AttrMap, AttrValue};
pub use node::{grad_var_name, OpNode, GRAD_SUFFIX};
pub use program::{Program, Scope};
