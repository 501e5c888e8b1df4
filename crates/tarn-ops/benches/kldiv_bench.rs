//! Benchmark: KL-divergence forward and backward through the node runner.

use std::time::Instant;

use tarn_core::Tensor;
use tarn_graph::{OpNode, Scope};
use tarn_ops::{register_builtin_ops, run_node};

fn make_inputs(n: usize) -> (Tensor, Tensor) {
    let x: Vec<f32> = (0..n).map(|i| -0.1 - ((i * 7 + 3) % 13) as f32 * 0.2).collect();
    let t: Vec<f32> = (0..n)
        .map(|i| ((i * 11 + 5) % 17) as f32 / (17.0 * n as f32 / 2.0))
        .collect();
    (Tensor::from_f32(&x, &[n / 128, 128]), Tensor::from_f32(&t, &[n / 128, 128]))
}

fn forward_node(reduction: &str) -> OpNode {
    OpNode::new("kldiv_loss")
        .input("X", "x")
        .input("Target", "target")
        .output("Loss", "loss")
        .attr("reduction", reduction)
}

fn backward_node(reduction: &str) -> OpNode {
    OpNode::new("kldiv_loss_grad")
        .input("X", "x")
        .input("Target", "target")
        .input("Loss@GRAD", "loss@GRAD")
        .output("X@GRAD", "x@GRAD")
        .attr("reduction", reduction)
}

fn bench_node(node: &OpNode, scope: &mut Scope, iters: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iters {
        run_node(node, scope).unwrap();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn main() {
    register_builtin_ops();

    println!("=== KL-Divergence Loss Benchmark ===\n");
    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12}",
        "Elements", "Fwd (us)", "Fwd Melem/s", "Bwd (us)", "Bwd Melem/s"
    );
    println!("{}", "-".repeat(64));

    for &n in &[1024usize, 8192, 65536, 1048576] {
        let (x, target) = make_inputs(n);
        let mut scope = Scope::new();
        scope.set("x", x);
        scope.set("target", target);
        scope.set("loss@GRAD", Tensor::from_f32(&[1.0], &[1]));

        let iters = if n <= 8192 { 2000 } else if n <= 65536 { 200 } else { 20 };

        let fwd = forward_node("mean");
        let bwd = backward_node("mean");
        let fwd_s = bench_node(&fwd, &mut scope, iters);
        let bwd_s = bench_node(&bwd, &mut scope, iters);

        println!(
            "{:<12} {:>10.2}us {:>12.1} {:>10.2}us {:>12.1}",
            n,
            fwd_s * 1e6,
            n as f64 / fwd_s / 1e6,
            bwd_s * 1e6,
            n as f64 / bwd_s / 1e6,
        );
    }

    println!("\n{:<12} {:>12} {:>12}", "Reduction", "Fwd (us)", "Bwd (us)");
    println!("{}", "-".repeat(38));

    let n = 65536;
    let (x, target) = make_inputs(n);
    for mode in ["none", "mean", "sum", "batchmean"] {
        let mut scope = Scope::new();
        scope.set("x", x.clone());
        scope.set("target", target.clone());
        let upstream = if mode == "none" {
            Tensor::from_f32(&vec![1.0; n], &[n / 128, 128])
        } else {
            Tensor::from_f32(&[1.0], &[1])
        };
        scope.set("loss@GRAD", upstream);

        let fwd_s = bench_node(&forward_node(mode), &mut scope, 200);
        let bwd_s = bench_node(&backward_node(mode), &mut scope, 200);
        println!("{:<12} {:>10.2}us {:>10.2}us", mode, fwd_s * 1e6, bwd_s * 1e6);
    }
}
