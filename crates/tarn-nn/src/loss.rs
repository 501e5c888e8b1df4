//! Loss functions: KL divergence forward and backward.

use tarn_core::{TarnError, Tensor};
use tarn_graph::{grad_var_name, OpNode, Scope};
use tarn_ops::{register_builtin_ops, run_node, Reduction, KLDIV_LOSS, KLDIV_LOSS_GRAD};

fn take_output(scope: &Scope, var: &str) -> Result<Tensor, TarnError> {
    scope
        .get(var)
        .cloned()
        .ok_or_else(|| TarnError::UnknownVar(var.to_string()))
}

/// Kullback-Leibler divergence loss: target * (ln(target) - x).
///
/// `x`: log-probabilities, any shape
/// `target`: probabilities, same shape as `x`
///
/// Zero-probability targets contribute zero regardless of `x`. Returns
/// the elementwise loss for [`Reduction::None`], otherwise a
/// single-element tensor.
pub fn kl_div_loss(
    x: &Tensor,
    target: &Tensor,
    reduction: Reduction,
) -> Result<Tensor, TarnError> {
    register_builtin_ops();

    let mut scope = Scope::new();
    scope.set("x", x.clone());
    scope.set("target", target.clone());

    let node = OpNode::new(KLDIV_LOSS)
        .input("X", "x")
        .input("Target", "target")
        .output("Loss", "loss")
        .attr("reduction", reduction.as_str());
    run_node(&node, &mut scope)?;
    take_output(&scope, "loss")
}

/// Gradient of [`kl_div_loss`] with respect to `x`.
///
/// `loss_grad` is the upstream gradient: same shape as `x` for
/// [`Reduction::None`], a single element for the reduced modes. The
/// target receives no gradient.
pub fn kl_div_loss_grad(
    x: &Tensor,
    target: &Tensor,
    loss_grad: &Tensor,
    reduction: Reduction,
) -> Result<Tensor, TarnError> {
    register_builtin_ops();

    let loss_grad_var = grad_var_name("loss");
    let x_grad_var = grad_var_name("x");
    let mut scope = Scope::new();
    scope.set("x", x.clone());
    scope.set("target", target.clone());
    scope.set(loss_grad_var.clone(), loss_grad.clone());

    let node = OpNode::new(KLDIV_LOSS_GRAD)
        .input("X", "x")
        .input("Target", "target")
        .input(grad_var_name("Loss"), loss_grad_var)
        .output(grad_var_name("X"), x_grad_var.clone())
        .attr("reduction", reduction.as_str());
    run_node(&node, &mut scope)?;
    take_output(&scope, &x_grad_var)
}
