//! Global operator registry.
//!
//! Maps string operator identifiers to [`OpDef`] entries. Definitions are
//! plain data over function pointers; there is no operator type hierarchy.
//! Registration is last-wins so test fixtures can shadow an entry.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use tarn_core::{DType, DeviceKind, Result, TarnError};
use tarn_graph::OpNode;

use crate::context::{ExecContext, InferShapeContext};

/// Shape-inference entry point of an operator.
pub type InferShapeFn = fn(&mut InferShapeContext) -> Result<()>;

/// Execution kernel of an operator for one (device kind, dtype) pair.
pub type KernelFn = fn(&mut ExecContext) -> Result<()>;

/// Gradient maker: rewrites one forward node into its backward node(s).
pub type GradMakerFn = fn(&OpNode) -> Vec<OpNode>;

/// Kernel dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub device: DeviceKind,
    pub dtype: DType,
}

/// A registered operator: shape inference, kernel table, gradient wiring,
/// and capability hints.
#[derive(Debug)]
pub struct OpDef {
    name: &'static str,
    infer_shape: InferShapeFn,
    /// Input slot whose tensor's dtype selects the kernel.
    dispatch_input: &'static str,
    kernels: HashMap<KernelKey, KernelFn>,
    grad_maker: Option<GradMakerFn>,
    /// Input slots whose buffers the backward computation never reads.
    /// Consumed by external memory planners, not by this crate.
    no_need_buffer: &'static [&'static str],
}

impl OpDef {
    /// Create a definition with an empty kernel table.
    pub fn new(
        name: &'static str,
        infer_shape: InferShapeFn,
        dispatch_input: &'static str,
    ) -> Self {
        Self {
            name,
            infer_shape,
            dispatch_input,
            kernels: HashMap::new(),
            grad_maker: None,
            no_need_buffer: &[],
        }
    }

    /// Register a kernel for a (device kind, dtype) pair.
    pub fn kernel(mut self, device: DeviceKind, dtype: DType, f: KernelFn) -> Self {
        self.kernels.insert(KernelKey { device, dtype }, f);
        self
    }

    /// Attach the gradient maker.
    pub fn grad_maker(mut self, f: GradMakerFn) -> Self {
        self.grad_maker = Some(f);
        self
    }

    /// Declare input slots whose buffers need not be retained for backward.
    pub fn no_need_buffer(mut self, slots: &'static [&'static str]) -> Self {
        self.no_need_buffer = slots;
        self
    }

    /// Operator identifier.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Input slot whose dtype keys kernel dispatch.
    pub fn dispatch_input(&self) -> &'static str {
        self.dispatch_input
    }

    /// Run the operator's shape inference.
    pub fn infer_shape(&self, ctx: &mut InferShapeContext) -> Result<()> {
        (self.infer_shape)(ctx)
    }

    /// Look up the kernel for a dispatch key.
    pub fn kernel_for(&self, key: KernelKey) -> Result<KernelFn> {
        self.kernels
            .get(&key)
            .copied()
            .ok_or_else(|| TarnError::NoKernel {
                op: self.name.to_string(),
                device: key.device,
                dtype: key.dtype,
            })
    }

    /// The gradient maker, if this operator is differentiable.
    pub fn get_grad_maker(&self) -> Option<GradMakerFn> {
        self.grad_maker
    }

    /// Input slots whose buffers backward never reads.
    pub fn get_no_need_buffer(&self) -> &'static [&'static str] {
        self.no_need_buffer
    }
}

/// Global registry of operator definitions.
static REGISTRY: OnceLock<RwLock<HashMap<&'static str, Arc<OpDef>>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<&'static str, Arc<OpDef>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register an operator definition. Re-registering a name replaces the
/// previous entry.
pub fn register_op(def: OpDef) {
    let name = def.name();
    let mut map = registry().write();
    if map.insert(name, Arc::new(def)).is_some() {
        debug!(op = name, "replaced operator registration");
    } else {
        debug!(op = name, "registered operator");
    }
}

/// Look up an operator definition by identifier.
pub fn op_def(name: &str) -> Result<Arc<OpDef>> {
    let map = registry().read();
    map.get(name)
        .cloned()
        .ok_or_else(|| TarnError::UnknownOp(name.to_string()))
}

/// Register every built-in operator. Safe to call repeatedly.
pub fn register_builtin_ops() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        crate::kldiv::register_kldiv_ops();
    });
}
