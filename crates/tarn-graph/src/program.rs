use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tarn_core::Tensor;

use crate::node::OpNode;

/// An ordered list of op nodes, executed front to back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    nodes: Vec<OpNode>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node.
    pub fn add(&mut self, node: OpNode) {
        self.nodes.push(node);
    }

    /// Nodes in execution order.
    pub fn nodes(&self) -> &[OpNode] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the program has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the last node writing the given variable, if any.
    pub fn producer_of(&self, var: &str) -> Option<usize> {
        self.nodes.iter().rposition(|node| {
            node.output_bindings()
                .any(|(_, vars)| vars.iter().any(|v| v == var))
        })
    }
}

/// Runtime variable store: variable name → tensor.
///
/// The caller owns the scope. Operators read inputs from it and the runner
/// writes outputs back; nothing else holds tensors across invocations.
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Tensor>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable.
    pub fn set(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.vars.insert(name.into(), tensor);
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.vars.get(name)
    }

    /// Whether a variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the scope holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over (name, tensor) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tensor)> {
        self.vars.iter()
    }
}
