//! AVX tile kernels, selected at run time after feature detection.

pub mod kernels;
