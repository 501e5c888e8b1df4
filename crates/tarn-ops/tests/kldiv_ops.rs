//! End-to-end tests for the KL-divergence operator pair.
//! Run with: cargo test -p tarn-ops -- --nocapture

use std::collections::HashMap;

use tarn_core::{Dim, PartialShape, Tensor};
use tarn_graph::{OpNode, Program, Scope};
use tarn_ops::{append_backward, infer_node_shapes, register_builtin_ops, run_node, run_program};

fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len(), "length mismatch: {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).abs() < tol,
            "element {} differs: {} vs {} (tol={})",
            i, x, y, tol
        );
    }
}

fn kldiv_node(reduction: &str) -> OpNode {
    OpNode::new("kldiv_loss")
        .input("X", "x")
        .input("Target", "target")
        .output("Loss", "loss")
        .attr("reduction", reduction)
}

// ============================================================================
// Forward + backward through a program
// ============================================================================

#[test]
fn test_program_forward_backward_batchmean() {
    register_builtin_ops();

    let x = [-1.2f32, -0.8, -1.5, -0.9, -1.1, -1.3];
    let t = [0.3f32, 0.5, 0.2, 0.25, 0.35, 0.4];
    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f32(&x, &[2, 3]));
    scope.set("target", Tensor::from_f32(&t, &[2, 3]));
    scope.set("loss@GRAD", Tensor::from_f32(&[1.0], &[1]));

    let mut program = Program::new();
    program.add(kldiv_node("batchmean"));
    append_backward(&mut program, "loss").unwrap();
    assert_eq!(program.len(), 2);

    run_program(&program, &mut scope).unwrap();

    let expected_loss: f32 = x
        .iter()
        .zip(t.iter())
        .map(|(&xi, &ti)| ti * (ti.ln() - xi))
        .sum::<f32>()
        / 2.0;
    let loss = scope.get("loss").unwrap();
    assert_eq!(loss.shape().dims(), &[1]);
    assert!((loss.get_f32(0).unwrap() - expected_loss).abs() < 1e-5);

    // dx = -t * g / batch
    let dx = scope.get("x@GRAD").unwrap();
    assert_eq!(dx.shape().dims(), &[2, 3]);
    let expected_dx: Vec<f32> = t.iter().map(|&ti| -ti / 2.0).collect();
    assert_close(dx.as_f32_slice().unwrap(), &expected_dx, 1e-6);

    // The target never receives a gradient.
    assert!(scope.get("target@GRAD").is_none());
}

#[test]
fn test_elementwise_backward_through_program() {
    register_builtin_ops();

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f32(&[-1.0, -2.0, -3.0], &[3]));
    scope.set("target", Tensor::from_f32(&[0.1, 0.0, 0.9], &[3]));
    scope.set("loss@GRAD", Tensor::from_f32(&[1.0, 1.0, 2.0], &[3]));

    let mut program = Program::new();
    program.add(kldiv_node("none"));
    append_backward(&mut program, "loss").unwrap();
    run_program(&program, &mut scope).unwrap();

    let loss = scope.get("loss").unwrap();
    assert_eq!(loss.shape().dims(), &[3]);

    let dx = scope.get("x@GRAD").unwrap();
    assert_close(dx.as_f32_slice().unwrap(), &[-0.1, 0.0, -1.8], 1e-6);
}

// ============================================================================
// Numeric gradient check
// ============================================================================

#[test]
fn test_backward_matches_numeric_gradient() {
    register_builtin_ops();

    let x: Vec<f64> = vec![-1.2, -0.8, -1.5, -0.9, -1.1, -1.3];
    let t: Vec<f64> = vec![0.3, 0.0, 0.2, 0.25, 0.35, 0.4];
    let shape = [2usize, 3];

    let loss_at = |x_data: &[f64]| -> f64 {
        let mut scope = Scope::new();
        scope.set("x", Tensor::from_f64(x_data, &shape));
        scope.set("target", Tensor::from_f64(&t, &shape));
        run_node(&kldiv_node("mean"), &mut scope).unwrap();
        scope.get("loss").unwrap().get_f64(0).unwrap()
    };

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f64(&x, &shape));
    scope.set("target", Tensor::from_f64(&t, &shape));
    scope.set("loss@GRAD", Tensor::from_f64(&[1.0], &[1]));
    let mut program = Program::new();
    program.add(kldiv_node("mean"));
    append_backward(&mut program, "loss").unwrap();
    run_program(&program, &mut scope).unwrap();
    let dx = scope.get("x@GRAD").unwrap();

    let eps = 1e-6;
    for i in 0..x.len() {
        let mut plus = x.clone();
        let mut minus = x.clone();
        plus[i] += eps;
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        let analytic = dx.get_f64(i).unwrap();
        assert!(
            (numeric - analytic).abs() < 1e-8,
            "grad {} differs: numeric {} vs analytic {}",
            i, numeric, analytic
        );
    }
}

// ============================================================================
// Program serialization
// ============================================================================

#[test]
fn test_program_survives_json_round_trip() {
    register_builtin_ops();

    let mut program = Program::new();
    program.add(kldiv_node("sum"));
    append_backward(&mut program, "loss").unwrap();

    let json = serde_json::to_string(&program).unwrap();
    let restored: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(program, restored);

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f32(&[-1.0, -0.5], &[2]));
    scope.set("target", Tensor::from_f32(&[0.6, 0.4], &[2]));
    scope.set("loss@GRAD", Tensor::from_f32(&[1.0], &[1]));
    run_program(&restored, &mut scope).unwrap();

    let expected: f32 = 0.6 * (0.6f32.ln() + 1.0) + 0.4 * (0.4f32.ln() + 0.5);
    assert!((scope.get("loss").unwrap().get_f32(0).unwrap() - expected).abs() < 1e-6);
    assert_close(
        scope.get("x@GRAD").unwrap().as_f32_slice().unwrap(),
        &[-0.6, -0.4],
        1e-6,
    );
}

// ============================================================================
// Layout and dtype handling
// ============================================================================

#[test]
fn test_transposed_input_matches_contiguous() {
    register_builtin_ops();

    // Row-major [2, 3] transposed to a non-contiguous [3, 2] view.
    let x_rows = Tensor::from_f32(&[-1.0, -2.0, -3.0, -4.0, -5.0, -6.0], &[2, 3]);
    let x_view = x_rows.transpose().unwrap();
    assert!(!x_view.is_contiguous());

    let t = [0.2f32, 0.1, 0.25, 0.15, 0.2, 0.1];
    let mut scope = Scope::new();
    scope.set("x", x_view.clone());
    scope.set("target", Tensor::from_f32(&t, &[3, 2]));
    run_node(&kldiv_node("none"), &mut scope).unwrap();
    let from_view = scope.get("loss").unwrap().clone();
    assert_eq!(from_view.shape().dims(), &[3, 2]);

    let mut scope = Scope::new();
    scope.set("x", x_view.contiguous());
    scope.set("target", Tensor::from_f32(&t, &[3, 2]));
    run_node(&kldiv_node("none"), &mut scope).unwrap();
    let from_dense = scope.get("loss").unwrap().clone();

    assert_close(
        from_view.as_f32_slice().unwrap(),
        from_dense.as_f32_slice().unwrap(),
        0.0,
    );
}

#[test]
fn test_f32_and_f64_agree() {
    register_builtin_ops();

    let x32 = [-1.2f32, -0.7, -2.1, -0.4];
    let t32 = [0.35f32, 0.3, 0.15, 0.2];

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f32(&x32, &[4]));
    scope.set("target", Tensor::from_f32(&t32, &[4]));
    run_node(&kldiv_node("batchmean"), &mut scope).unwrap();
    let f32_loss = scope.get("loss").unwrap().get_f32(0).unwrap();

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f64(&x32.map(f64::from), &[4]));
    scope.set("target", Tensor::from_f64(&t32.map(f64::from), &[4]));
    run_node(&kldiv_node("batchmean"), &mut scope).unwrap();
    let f64_loss = scope.get("loss").unwrap().get_f64(0).unwrap();

    assert!((f64::from(f32_loss) - f64_loss).abs() < 1e-6);
}

// ============================================================================
// Shape inference phases
// ============================================================================

#[test]
fn test_placeholder_batch_dim_resolves_at_runtime() {
    register_builtin_ops();

    let node = kldiv_node("mean");
    let mut shapes = HashMap::new();
    shapes.insert(
        "x".to_string(),
        PartialShape::new(&[Dim::Unknown, Dim::Known(10)]),
    );
    shapes.insert(
        "target".to_string(),
        PartialShape::new(&[Dim::Unknown, Dim::Known(10)]),
    );

    // Construction time accepts the placeholder batch dim.
    let out = infer_node_shapes(&node, &shapes, false).unwrap();
    assert_eq!(out.get("Loss"), Some(&PartialShape::known(&[1])));

    // Execution with concrete tensors resolves it.
    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f32(&vec![-1.0; 30], &[3, 10]));
    scope.set("target", Tensor::from_f32(&vec![1.0 / 30.0; 30], &[3, 10]));
    run_node(&node, &mut scope).unwrap();
    assert_eq!(scope.get("loss").unwrap().shape().dims(), &[1]);
}

#[test]
fn test_invalid_reduction_rejected_before_execution() {
    register_builtin_ops();

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_f32(&[-1.0], &[1]));
    scope.set("target", Tensor::from_f32(&[1.0], &[1]));

    let err = run_node(&kldiv_node("average"), &mut scope).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("average"), "message should name the bad value: {msg}");
    // Nothing was written.
    assert!(scope.get("loss").is_none());
}
