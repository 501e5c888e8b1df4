//! Node and program execution.
//!
//! Execution of one node is three phases: runtime shape inference over the
//! scope's tensors, kernel dispatch on the declared input's (device kind,
//! dtype), and output write-back. Inferred shapes are checked against what
//! the kernel actually produced before anything lands in the scope.

use std::collections::HashMap;

use tracing::trace;

use tarn_core::{PartialShape, Result, TarnError};
use tarn_graph::{OpNode, Program, Scope};

use crate::context::{ExecContext, InferShapeContext};
use crate::registry::{op_def, KernelKey};

/// Run one node's shape inference against a variable-name → shape map.
///
/// Returns the inferred output shapes keyed by output slot name. With
/// `runtime` set, placeholder dims in the inputs are rejected instead of
/// skipped.
pub fn infer_node_shapes(
    node: &OpNode,
    shapes: &HashMap<String, PartialShape>,
    runtime: bool,
) -> Result<HashMap<String, PartialShape>> {
    let def = op_def(node.op_type())?;
    let mut ctx = InferShapeContext::new(node, shapes, runtime);
    def.infer_shape(&mut ctx)?;
    Ok(ctx.into_output_shapes())
}

/// Execute one node against the scope.
pub fn run_node(node: &OpNode, scope: &mut Scope) -> Result<()> {
    let def = op_def(node.op_type())?;

    let mut shapes = HashMap::new();
    for (_, vars) in node.input_bindings() {
        for var in vars {
            if let Some(t) = scope.get(var) {
                shapes.insert(var.clone(), PartialShape::from(t.shape()));
            }
        }
    }
    let inferred = {
        let mut ctx = InferShapeContext::new(node, &shapes, true);
        def.infer_shape(&mut ctx)?;
        ctx.into_output_shapes()
    };

    let dispatch_slot = def.dispatch_input();
    let dispatch_var =
        node.input_var(dispatch_slot)
            .ok_or_else(|| TarnError::MissingInput {
                op: node.op_type().to_string(),
                name: dispatch_slot.to_string(),
            })?;
    let key = {
        let t = scope
            .get(dispatch_var)
            .ok_or_else(|| TarnError::UnknownVar(dispatch_var.to_string()))?;
        KernelKey {
            device: t.device().kind(),
            dtype: t.dtype(),
        }
    };
    let kernel = def.kernel_for(key)?;
    trace!(
        op = node.op_type(),
        device = %key.device,
        dtype = %key.dtype,
        "dispatching kernel"
    );

    let mut ctx = ExecContext::new(node, scope)?;
    kernel(&mut ctx)?;
    let outputs = ctx.into_outputs();

    // Runtime inference produced fully-known shapes; the kernel must agree.
    for (binding, tensor) in &outputs {
        if let Some(expected) = inferred.get(binding).and_then(|p| p.to_shape()) {
            if &expected != tensor.shape() {
                return Err(TarnError::ShapeMismatch {
                    expected: expected.dims().to_vec(),
                    got: tensor.shape().dims().to_vec(),
                });
            }
        }
    }

    for (binding, tensor) in outputs {
        if let Some(var) = node.output_var(&binding) {
            scope.set(var, tensor);
        }
    }
    Ok(())
}

/// Execute every node of a program in order.
pub fn run_program(program: &Program, scope: &mut Scope) -> Result<()> {
    for node in program.nodes() {
        run_node(node, scope)?;
    }
    Ok(())
}
