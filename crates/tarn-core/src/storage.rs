use std::sync::Arc;

use crate::{DType, Device, Result, TarnError};

/// Shared, reference-counted tensor storage.
///
/// Storage is `Arc`-backed so multiple tensors can share the same underlying
/// data (e.g., views from reshape/transpose). Mutation goes through
/// copy-on-write: writers clone the buffer if anyone else holds it.
#[derive(Debug, Clone)]
pub struct Storage {
    data: Arc<Vec<u8>>,
    dtype: DType,
    device: Device,
    /// Number of logical elements (not bytes).
    numel: usize,
}

impl Storage {
    /// Allocate new zeroed storage for `numel` elements of the given dtype.
    pub fn zeros(dtype: DType, numel: usize) -> Self {
        let nbytes = dtype.storage_bytes(numel);
        Self {
            data: Arc::new(vec![0u8; nbytes]),
            dtype,
            device: Device::Cpu,
            numel,
        }
    }

    /// Create storage from raw bytes.
    pub fn from_bytes(dtype: DType, numel: usize, bytes: Vec<u8>) -> Result<Self> {
        let expected = dtype.storage_bytes(numel);
        if bytes.len() != expected {
            return Err(TarnError::StorageError(format!(
                "expected {} bytes for {} elements of {}, got {}",
                expected,
                numel,
                dtype,
                bytes.len()
            )));
        }
        Ok(Self {
            data: Arc::new(bytes),
            dtype,
            device: Device::Cpu,
            numel,
        })
    }

    /// Create storage from a slice of f32 values.
    pub fn from_f32(data: &[f32]) -> Self {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self {
            data: Arc::new(bytes),
            dtype: DType::F32,
            device: Device::Cpu,
            numel: data.len(),
        }
    }

    /// Create storage from a slice of f64 values.
    pub fn from_f64(data: &[f64]) -> Self {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self {
            data: Arc::new(bytes),
            dtype: DType::F64,
            device: Device::Cpu,
            numel: data.len(),
        }
    }

    /// Create storage from a slice of i32 values.
    pub fn from_i32(data: &[i32]) -> Self {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self {
            data: Arc::new(bytes),
            dtype: DType::I32,
            device: Device::Cpu,
            numel: data.len(),
        }
    }

    /// Get the dtype of this storage.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Get the device of this storage.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Size in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Get a read-only reference to the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the raw bytes.
    /// Clones the underlying data if there are other references (copy-on-write).
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Interpret storage as a slice of f32 values.
    /// Returns None if dtype is not F32.
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        if self.dtype != DType::F32 {
            return None;
        }
        Some(bytemuck::cast_slice(self.as_bytes()))
    }

    /// Interpret storage as a mutable slice of f32 values (copy-on-write).
    pub fn as_f32_slice_mut(&mut self) -> Option<&mut [f32]> {
        if self.dtype != DType::F32 {
            return None;
        }
        Some(bytemuck::cast_slice_mut(self.as_bytes_mut()))
    }

    /// Interpret storage as a slice of f64 values.
    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        if self.dtype != DType::F64 {
            return None;
        }
        Some(bytemuck::cast_slice(self.as_bytes()))
    }

    /// Interpret storage as a mutable slice of f64 values (copy-on-write).
    pub fn as_f64_slice_mut(&mut self) -> Option<&mut [f64]> {
        if self.dtype != DType::F64 {
            return None;
        }
        Some(bytemuck::cast_slice_mut(self.as_bytes_mut()))
    }

    /// Interpret storage as a slice of i32 values.
    pub fn as_i32_slice(&self) -> Option<&[i32]> {
        if self.dtype != DType::I32 {
            return None;
        }
        Some(bytemuck::cast_slice(self.as_bytes()))
    }

    /// Whether this storage is uniquely owned (no other Arc references).
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.data) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let s = Storage::zeros(DType::F32, 10);
        assert_eq!(s.dtype(), DType::F32);
        assert_eq!(s.device(), Device::Cpu);
        assert_eq!(s.numel(), 10);
        assert_eq!(s.nbytes(), 40);
        assert!(s.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_f32() {
        let data = vec![1.0f32, 2.0, 3.0];
        let s = Storage::from_f32(&data);
        assert_eq!(s.numel(), 3);
        let slice = s.as_f32_slice().unwrap();
        assert_eq!(slice, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_f64() {
        let data = vec![1.0f64, 2.5];
        let s = Storage::from_f64(&data);
        assert_eq!(s.dtype(), DType::F64);
        assert_eq!(s.nbytes(), 16);
        assert_eq!(s.as_f64_slice().unwrap(), &[1.0, 2.5]);
        assert!(s.as_f32_slice().is_none());
    }

    #[test]
    fn test_copy_on_write() {
        let data = vec![1.0f32, 2.0, 3.0];
        let s1 = Storage::from_f32(&data);
        let mut s2 = s1.clone();
        assert!(!s1.is_unique()); // shared

        // Mutating s2 should not affect s1
        let slice = s2.as_f32_slice_mut().unwrap();
        slice[0] = 99.0;

        assert_eq!(s1.as_f32_slice().unwrap()[0], 1.0);
        assert_eq!(s2.as_f32_slice().unwrap()[0], 99.0);
    }

    #[test]
    fn test_from_bytes_validation() {
        let result = Storage::from_bytes(DType::F32, 3, vec![0u8; 11]);
        assert!(result.is_err());

        let result = Storage::from_bytes(DType::F32, 3, vec![0u8; 12]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_i32_storage() {
        let s = Storage::from_i32(&[1, -2, 3]);
        assert_eq!(s.dtype(), DType::I32);
        assert_eq!(s.as_i32_slice().unwrap(), &[1, -2, 3]);
        assert!(s.as_f64_slice().is_none());
    }
}
