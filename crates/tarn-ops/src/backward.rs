//! Gradient graph construction.
//!
//! [`append_backward`] extends a program with the backward nodes for a
//! chosen loss variable. Differentiation happens by node rewriting: each
//! forward node's registered gradient maker emits the node(s) computing
//! its input gradients, and those are appended in reverse forward order.
//!
//! The pass only rewrites the graph. Seeding the upstream gradient (the
//! `<loss>@GRAD` variable the first backward node reads) is the caller's
//! job before execution; backward nodes write their outputs to the scope
//! like any other node.

use tracing::debug;

use tarn_core::{Result, TarnError};
use tarn_graph::Program;

use crate::registry::op_def;

/// Append backward nodes for `loss_var` to `program`.
///
/// The walk starts at the last node producing `loss_var` and visits every
/// earlier node in reverse order. Nodes whose operator has no gradient
/// maker are skipped. On error the program is left untouched.
///
/// Gradients are not accumulated: if two appended nodes write the same
/// gradient variable, later execution order wins.
pub fn append_backward(program: &mut Program, loss_var: &str) -> Result<()> {
    let producer = program
        .producer_of(loss_var)
        .ok_or_else(|| TarnError::UnknownVar(loss_var.to_string()))?;

    let mut appended = Vec::new();
    for node in program.nodes()[..=producer].iter().rev() {
        let def = op_def(node.op_type())?;
        match def.get_grad_maker() {
            Some(maker) => appended.extend(maker(node)),
            None => debug!(op = node.op_type(), "no gradient maker, skipping"),
        }
    }

    debug!(
        loss = loss_var,
        nodes = appended.len(),
        "appended backward nodes"
    );
    for node in appended {
        program.add(node);
    }
    Ok(())
}
