use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attrs::{AttrMap, AttrValue};

/// Suffix appended to a variable name to name its gradient.
pub const GRAD_SUFFIX: &str = "@GRAD";

/// The gradient variable name for a forward variable.
///
/// Backward synthesis wires upstream and produced gradients by this naming
/// convention: the gradient of variable `loss` lives in `loss@GRAD`.
pub fn grad_var_name(name: &str) -> String {
    format!("{name}{GRAD_SUFFIX}")
}

/// One operator invocation in a graph: pure description, no tensors.
///
/// Bindings map an operator-defined slot name (e.g. `X`, `Target`, `Loss`)
/// to the scope variable names that fill it. A binding may list several
/// variables; single-variable bindings are the common case and the
/// `input_var`/`output_var` accessors return the first entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpNode {
    op_type: String,
    inputs: HashMap<String, Vec<String>>,
    outputs: HashMap<String, Vec<String>>,
    attrs: AttrMap,
}

impl OpNode {
    /// Start building a node for the given operator type.
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            attrs: AttrMap::new(),
        }
    }

    /// Bind an input slot to a variable name (appends if the slot exists).
    pub fn input(mut self, binding: impl Into<String>, var: impl Into<String>) -> Self {
        self.inputs.entry(binding.into()).or_default().push(var.into());
        self
    }

    /// Bind an output slot to a variable name (appends if the slot exists).
    pub fn output(mut self, binding: impl Into<String>, var: impl Into<String>) -> Self {
        self.outputs.entry(binding.into()).or_default().push(var.into());
        self
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.set(name, value);
        self
    }

    /// Replace the whole attribute map (used when copying attrs verbatim).
    pub fn with_attrs(mut self, attrs: AttrMap) -> Self {
        self.attrs = attrs;
        self
    }

    /// The operator type name this node invokes.
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Whether an input slot is bound to at least one variable.
    pub fn has_input(&self, binding: &str) -> bool {
        self.inputs.get(binding).is_some_and(|v| !v.is_empty())
    }

    /// Whether an output slot is bound to at least one variable.
    pub fn has_output(&self, binding: &str) -> bool {
        self.outputs.get(binding).is_some_and(|v| !v.is_empty())
    }

    /// First variable bound to an input slot.
    pub fn input_var(&self, binding: &str) -> Option<&str> {
        self.inputs
            .get(binding)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// First variable bound to an output slot.
    pub fn output_var(&self, binding: &str) -> Option<&str> {
        self.outputs
            .get(binding)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All variables bound to an input slot.
    pub fn input_vars(&self, binding: &str) -> &[String] {
        self.inputs.get(binding).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All variables bound to an output slot.
    pub fn output_vars(&self, binding: &str) -> &[String] {
        self.outputs.get(binding).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over input slots and their variable lists.
    pub fn input_bindings(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.inputs.iter()
    }

    /// Iterate over output slots and their variable lists.
    pub fn output_bindings(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.outputs.iter()
    }

    /// Attributes attached to this node.
    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }
}
