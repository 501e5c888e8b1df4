use std::collections::HashMap;

use tarn_core::{PartialShape, Result, TarnError, Tensor};
use tarn_graph::{AttrMap, OpNode, Scope};

/// Borrowed view an operator's shape-inference function runs against.
///
/// Construction-time inference (`runtime == false`) sees [`PartialShape`]s
/// that may contain unknown dims and must skip extent checks for them.
/// Runtime inference (`runtime == true`) sees fully-known shapes and
/// enforces every check.
pub struct InferShapeContext<'a> {
    node: &'a OpNode,
    shapes: &'a HashMap<String, PartialShape>,
    outputs: HashMap<String, PartialShape>,
    runtime: bool,
}

impl<'a> InferShapeContext<'a> {
    /// Create a context over a node and a variable-name → shape map.
    pub fn new(
        node: &'a OpNode,
        shapes: &'a HashMap<String, PartialShape>,
        runtime: bool,
    ) -> Self {
        Self {
            node,
            shapes,
            outputs: HashMap::new(),
            runtime,
        }
    }

    /// The operator type of the node under inference.
    pub fn op_type(&self) -> &str {
        self.node.op_type()
    }

    /// Whether inference is running at execution time (strict checks).
    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    /// Attributes of the node under inference.
    pub fn attrs(&self) -> &AttrMap {
        self.node.attrs()
    }

    /// Whether an input slot is bound.
    pub fn has_input(&self, binding: &str) -> bool {
        self.node.has_input(binding)
    }

    /// Whether an output slot is bound.
    pub fn has_output(&self, binding: &str) -> bool {
        self.node.has_output(binding)
    }

    /// Fail unless an input slot is bound.
    pub fn require_input(&self, binding: &str) -> Result<()> {
        if self.node.has_input(binding) {
            Ok(())
        } else {
            Err(TarnError::MissingInput {
                op: self.node.op_type().to_string(),
                name: binding.to_string(),
            })
        }
    }

    /// Fail unless an output slot is bound.
    pub fn require_output(&self, binding: &str) -> Result<()> {
        if self.node.has_output(binding) {
            Ok(())
        } else {
            Err(TarnError::MissingOutput {
                op: self.node.op_type().to_string(),
                name: binding.to_string(),
            })
        }
    }

    /// Shape of the variable bound to an input slot.
    pub fn input_shape(&self, binding: &str) -> Result<&PartialShape> {
        let var = self
            .node
            .input_var(binding)
            .ok_or_else(|| TarnError::MissingInput {
                op: self.node.op_type().to_string(),
                name: binding.to_string(),
            })?;
        self.shapes
            .get(var)
            .ok_or_else(|| TarnError::UnknownVar(var.to_string()))
    }

    /// Record the inferred shape for an output slot.
    pub fn set_output_shape(&mut self, binding: &str, shape: PartialShape) -> Result<()> {
        self.require_output(binding)?;
        self.outputs.insert(binding.to_string(), shape);
        Ok(())
    }

    /// Read back an inferred output shape.
    pub fn output_shape(&self, binding: &str) -> Option<&PartialShape> {
        self.outputs.get(binding)
    }

    /// Consume the context, yielding binding → inferred shape.
    pub fn into_output_shapes(self) -> HashMap<String, PartialShape> {
        self.outputs
    }
}

/// Named tensor bindings a kernel executes against.
///
/// Inputs are resolved from the scope up front (Arc-clone, no copy), so a
/// kernel never touches the scope and validation finishes before any
/// compute starts. Outputs are collected here and written back by the
/// runner.
#[derive(Debug)]
pub struct ExecContext<'a> {
    node: &'a OpNode,
    inputs: HashMap<String, Tensor>,
    outputs: HashMap<String, Tensor>,
}

impl<'a> ExecContext<'a> {
    /// Resolve every input binding of `node` against `scope`.
    ///
    /// Every bound variable must exist; the first variable of each slot
    /// becomes the slot's tensor.
    pub fn new(node: &'a OpNode, scope: &Scope) -> Result<Self> {
        let mut inputs = HashMap::new();
        for (binding, vars) in node.input_bindings() {
            for var in vars {
                if !scope.contains(var) {
                    return Err(TarnError::UnknownVar(var.clone()));
                }
            }
            if let Some(first) = vars.first() {
                // Unwrap-free: containment was checked above
                if let Some(t) = scope.get(first) {
                    inputs.insert(binding.clone(), t.clone());
                }
            }
        }
        Ok(Self {
            node,
            inputs,
            outputs: HashMap::new(),
        })
    }

    /// The operator type of the executing node.
    pub fn op_type(&self) -> &str {
        self.node.op_type()
    }

    /// Attributes of the executing node.
    pub fn attrs(&self) -> &AttrMap {
        self.node.attrs()
    }

    /// Tensor bound to an input slot.
    pub fn input(&self, binding: &str) -> Result<&Tensor> {
        self.inputs
            .get(binding)
            .ok_or_else(|| TarnError::MissingInput {
                op: self.node.op_type().to_string(),
                name: binding.to_string(),
            })
    }

    /// Whether an output slot is bound (unbound outputs are skipped, not errors).
    pub fn has_output(&self, binding: &str) -> bool {
        self.node.has_output(binding)
    }

    /// Record a produced output tensor.
    pub fn set_output(&mut self, binding: &str, tensor: Tensor) -> Result<()> {
        if !self.node.has_output(binding) {
            return Err(TarnError::MissingOutput {
                op: self.node.op_type().to_string(),
                name: binding.to_string(),
            });
        }
        self.outputs.insert(binding.to_string(), tensor);
        Ok(())
    }

    /// Consume the context, yielding binding → produced tensor.
    pub fn into_outputs(self) -> HashMap<String, Tensor> {
        self.outputs
    }
}
