//! Kullback-Leibler divergence loss operator.
//!
//! Forward computes `target * (ln(target) - x)` per element, where `x`
//! holds log-probabilities and `target` probabilities, then applies an
//! optional reduction. Backward produces the gradient with respect to
//! `x` only; the target never receives a gradient.

use rayon::prelude::*;

use tarn_core::{DType, DeviceKind, PartialShape, Result, Shape, TarnError, Tensor};
use tarn_graph::{grad_var_name, AttrMap, OpNode};

use crate::context::{ExecContext, InferShapeContext};
use crate::registry::{register_op, OpDef};

/// Forward operator identifier.
pub const KLDIV_LOSS: &str = "kldiv_loss";
/// Backward operator identifier.
pub const KLDIV_LOSS_GRAD: &str = "kldiv_loss_grad";

const PAR_THRESHOLD: usize = 8192;

/// How the elementwise divergence collapses into the loss output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reduction {
    /// Keep the elementwise loss tensor.
    None,
    /// Sum over all elements, divided by the element count.
    #[default]
    Mean,
    /// Sum over all elements.
    Sum,
    /// Sum over all elements, divided by the first-dimension extent.
    Batchmean,
}

impl Reduction {
    /// The attribute values accepted for `reduction`.
    pub const ALLOWED: &'static str = "'none' | 'batchmean' | 'sum' | 'mean'";

    /// Parse a `reduction` attribute value, naming `op` on failure.
    pub fn parse(op: &str, value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Reduction::None),
            "mean" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            "batchmean" => Ok(Reduction::Batchmean),
            other => Err(TarnError::InvalidAttr {
                op: op.to_string(),
                attr: "reduction".to_string(),
                value: other.to_string(),
                allowed: Self::ALLOWED.to_string(),
            }),
        }
    }

    /// Read the `reduction` attribute of a node, defaulting to `mean`.
    pub fn from_attrs(op: &str, attrs: &AttrMap) -> Result<Self> {
        let value = attrs.str_or("reduction", "mean")?;
        Self::parse(op, value)
    }

    /// The attribute string for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::None => "none",
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
            Reduction::Batchmean => "batchmean",
        }
    }
}

impl std::fmt::Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First-dimension extent used by `batchmean`; rank-0 tensors count as one batch.
fn batch_size(shape: &Shape) -> usize {
    shape.dim(0).unwrap_or(1)
}

fn infer_forward_shape(ctx: &mut InferShapeContext) -> Result<()> {
    ctx.require_input("X")?;
    ctx.require_input("Target")?;
    ctx.require_output("Loss")?;

    let x = ctx.input_shape("X")?.clone();
    let target = ctx.input_shape("Target")?.clone();

    if x.ndim() != target.ndim() {
        return Err(TarnError::RankMismatch {
            op: ctx.op_type().to_string(),
            lhs: "X".to_string(),
            rhs: "Target".to_string(),
            lhs_rank: x.ndim(),
            rhs_rank: target.ndim(),
        });
    }

    if ctx.is_runtime() {
        for (name, shape) in [("X", &x), ("Target", &target)] {
            if !shape.is_fully_known() {
                return Err(TarnError::UnresolvedShape {
                    op: ctx.op_type().to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    // Placeholder dims are only comparable once both sides are concrete.
    for axis in 0..x.ndim() {
        let xd = x.dim(axis).and_then(|d| d.value());
        let td = target.dim(axis).and_then(|d| d.value());
        if let (Some(a), Some(b)) = (xd, td) {
            if a != b {
                return Err(TarnError::DimMismatch {
                    op: ctx.op_type().to_string(),
                    lhs: "X".to_string(),
                    rhs: "Target".to_string(),
                    axis,
                    lhs_dim: a,
                    rhs_dim: b,
                });
            }
        }
    }

    let reduction = Reduction::from_attrs(ctx.op_type(), ctx.attrs())?;
    match reduction {
        Reduction::None => ctx.set_output_shape("Loss", x)?,
        _ => ctx.set_output_shape("Loss", PartialShape::known(&[1]))?,
    }
    Ok(())
}

fn infer_backward_shape(ctx: &mut InferShapeContext) -> Result<()> {
    let loss_grad = grad_var_name("Loss");
    let x_grad = grad_var_name("X");

    ctx.require_input("X")?;
    ctx.require_input("Target")?;
    ctx.require_input(&loss_grad)?;

    let x = ctx.input_shape("X")?.clone();
    // The gradient output is optional: absent means "not requested".
    if ctx.has_output(&x_grad) {
        ctx.set_output_shape(&x_grad, x)?;
    }
    Ok(())
}

macro_rules! impl_kldiv_kernels {
    ($fwd:ident, $bwd:ident, $ty:ty, $as_slice:ident, $from:ident) => {
        fn $fwd(ctx: &mut ExecContext) -> Result<()> {
            let reduction = Reduction::from_attrs(ctx.op_type(), ctx.attrs())?;
            let x = ctx.input("X")?.contiguous();
            let target = ctx.input("Target")?.contiguous();

            if target.dtype() != x.dtype() {
                return Err(TarnError::DTypeMismatch {
                    expected: x.dtype(),
                    got: target.dtype(),
                });
            }
            let xs = x
                .$as_slice()
                .ok_or(TarnError::UnsupportedDType(x.dtype()))?;
            let ts = target
                .$as_slice()
                .ok_or(TarnError::UnsupportedDType(target.dtype()))?;
            if xs.len() != ts.len() {
                return Err(TarnError::ShapeMismatch {
                    expected: x.shape().dims().to_vec(),
                    got: target.shape().dims().to_vec(),
                });
            }

            // Zero-probability targets contribute exactly zero; the branch
            // keeps the 0 * ln(0) term from producing NaN.
            let point = |ti: $ty, xi: $ty| -> $ty {
                if ti > 0.0 {
                    ti * (ti.ln() - xi)
                } else {
                    0.0
                }
            };

            let n = xs.len();
            if reduction == Reduction::None {
                let out: Vec<$ty> = if n >= PAR_THRESHOLD {
                    xs.par_iter()
                        .zip(ts.par_iter())
                        .map(|(&xi, &ti)| point(ti, xi))
                        .collect()
                } else {
                    xs.iter()
                        .zip(ts.iter())
                        .map(|(&xi, &ti)| point(ti, xi))
                        .collect()
                };
                ctx.set_output("Loss", Tensor::$from(&out, x.shape().dims()))?;
                return Ok(());
            }

            let total: $ty = if n >= PAR_THRESHOLD {
                xs.par_iter()
                    .zip(ts.par_iter())
                    .map(|(&xi, &ti)| point(ti, xi))
                    .sum()
            } else {
                xs.iter()
                    .zip(ts.iter())
                    .map(|(&xi, &ti)| point(ti, xi))
                    .sum()
            };
            let denom: $ty = match reduction {
                Reduction::Mean => n as $ty,
                Reduction::Batchmean => batch_size(x.shape()) as $ty,
                _ => 1.0,
            };
            ctx.set_output("Loss", Tensor::$from(&[total / denom], &[1]))?;
            Ok(())
        }

        fn $bwd(ctx: &mut ExecContext) -> Result<()> {
            let x_grad = grad_var_name("X");
            if !ctx.has_output(&x_grad) {
                // Gradient not requested; skip all computation.
                return Ok(());
            }

            let reduction = Reduction::from_attrs(ctx.op_type(), ctx.attrs())?;
            // X supplies shape and dispatch dtype; its buffer is never read.
            let x = ctx.input("X")?;
            let x_dims: Vec<usize> = x.shape().dims().to_vec();
            let x_numel = x.numel();
            let batch = batch_size(x.shape());
            let target = ctx.input("Target")?.contiguous();
            let dloss = ctx.input(&grad_var_name("Loss"))?.contiguous();

            let ts = target
                .$as_slice()
                .ok_or(TarnError::UnsupportedDType(target.dtype()))?;
            let ds = dloss
                .$as_slice()
                .ok_or(TarnError::UnsupportedDType(dloss.dtype()))?;

            let n = ts.len();
            if x_numel != n {
                return Err(TarnError::ShapeMismatch {
                    expected: x_dims,
                    got: target.shape().dims().to_vec(),
                });
            }

            let dx: Vec<$ty> = if reduction == Reduction::None {
                if ds.len() != n {
                    return Err(TarnError::ShapeMismatch {
                        expected: x_dims,
                        got: dloss.shape().dims().to_vec(),
                    });
                }
                if n >= PAR_THRESHOLD {
                    ts.par_iter()
                        .zip(ds.par_iter())
                        .map(|(&ti, &di)| -ti * di)
                        .collect()
                } else {
                    ts.iter().zip(ds.iter()).map(|(&ti, &di)| -ti * di).collect()
                }
            } else {
                if dloss.numel() != 1 {
                    return Err(TarnError::ShapeMismatch {
                        expected: vec![1],
                        got: dloss.shape().dims().to_vec(),
                    });
                }
                let denom: $ty = match reduction {
                    Reduction::Mean => n as $ty,
                    Reduction::Batchmean => batch as $ty,
                    _ => 1.0,
                };
                let coeff = ds[0] / denom;
                if n >= PAR_THRESHOLD {
                    ts.par_iter().map(|&ti| -ti * coeff).collect()
                } else {
                    ts.iter().map(|&ti| -ti * coeff).collect()
                }
            };

            ctx.set_output(&x_grad, Tensor::$from(&dx, &x_dims))?;
            Ok(())
        }
    };
}

impl_kldiv_kernels!(forward_f32, backward_f32, f32, as_f32_slice, from_f32);
impl_kldiv_kernels!(forward_f64, backward_f64, f64, as_f64_slice, from_f64);

/// Rewrite one forward node into its backward node.
///
/// The backward node reuses the forward `X`/`Target` variables, takes the
/// gradient of the forward loss variable as upstream input, copies the
/// attribute set verbatim, and emits only the gradient of `X`.
fn kldiv_grad_maker(fwd: &OpNode) -> Vec<OpNode> {
    let x_var = fwd.input_var("X").unwrap_or("");
    let target_var = fwd.input_var("Target").unwrap_or("");
    let loss_var = fwd.output_var("Loss").unwrap_or("");

    vec![OpNode::new(KLDIV_LOSS_GRAD)
        .input("X", x_var)
        .input("Target", target_var)
        .input(grad_var_name("Loss"), grad_var_name(loss_var))
        .output(grad_var_name("X"), grad_var_name(x_var))
        .with_attrs(fwd.attrs().clone())]
}

/// Register the forward and backward KL-divergence operators.
pub fn register_kldiv_ops() {
    register_op(
        OpDef::new(KLDIV_LOSS, infer_forward_shape, "X")
            .kernel(DeviceKind::Cpu, DType::F32, forward_f32)
            .kernel(DeviceKind::Cpu, DType::F64, forward_f64)
            .grad_maker(kldiv_grad_maker),
    );
    register_op(
        OpDef::new(KLDIV_LOSS_GRAD, infer_backward_shape, "Loss@GRAD")
            .kernel(DeviceKind::Cpu, DType::F32, backward_f32)
            .kernel(DeviceKind::Cpu, DType::F64, backward_f64)
            .no_need_buffer(&["X"]),
    );
}
