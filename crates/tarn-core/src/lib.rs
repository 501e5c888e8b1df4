//! # tarn-core
//!
//! Core tensor engine for the Tarn operator framework.
//!
//! Provides the foundational `Tensor` type with:
//! - F32/F64 floating-point and I32 integer dtypes
//! - CPU-resident, Arc-shared storage with copy-on-write mutation
//! - Zero-copy views (reshape, transpose)
//! - Concrete `Shape` plus `PartialShape` for graph-construction-time
//!   shape inference with unknown placeholder dimensions

pub mod dtype;
pub mod device;
pub mod storage;
pub mod shape;
pub mod tensor;
pub mod error;

pub use dtype::DType;
pub use device::{Device, DeviceKind};
pub use storage::Storage;
pub use shape::{Dim, PartialShape, Shape};
pub use tensor::Tensor;
pub use error::TarnError;

pub type Result<T> = std::result::Result<T, TarnError>;
