//! # tarn-nn
//!
//! Functional neural-network surface for Tarn. Each function assembles a
//! graph node for the matching operator and executes it immediately.

pub mod loss;

pub use loss::{kl_div_loss, kl_div_loss_grad};
