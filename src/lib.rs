//! numkern: precision-generic numerical kernels.
//!
//! Algorithms are written once against [`Scalar`] and run at a precision
//! chosen at run time through a [`Dispatcher`]. Data-parallel work goes
//! through the process-wide [`Scheduler`], whose backend (serial, scoped
//! threads, a directive-style rayon loop or a work-stealing rayon pool) is
//! fixed at startup.
//!
//! ```no_run
//! use numkern::{dispatch, Backend, Gemm, GemmArgs, GemmVariant, Matrix, Precision, Scheduler, StorageOrder};
//!
//! # fn main() -> numkern::Result<()> {
//! let scheduler = Scheduler::new(Backend::WorkStealing, 0)?;
//! let a = Matrix::<f64>::identity(64, StorageOrder::RowMajor)?;
//! let b = Matrix::<f64>::from_fn(64, 64, StorageOrder::RowMajor, |i, j| (i + j) as f64)?;
//! let args = GemmArgs::new(a, b);
//! let c = dispatch(&Gemm::new(GemmVariant::Blocked), Precision::Float, &args, &scheduler)?;
//! assert_eq!(c[(3, 4)], 7.0);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod gemm;
pub mod interp;
pub mod linalg;
pub mod matrix;
pub mod precision;
pub mod scheduler;
pub mod simd;
pub mod timer;
pub mod utils;

pub use dispatch::{dispatch, Algorithm, Dispatcher};
pub use error::{KernelError, Result};
pub use gemm::{matmul, matmul_into, Gemm, GemmArgs, GemmVariant};
pub use interp::{InterpolationArgs, Lagrange};
pub use linalg::{DenseSystemArgs, Gauss, Jacobi, JacobiArgs, Thomas, TridiagonalArgs};
pub use matrix::{MatRef, Matrix, StorageOrder};
pub use precision::{Precision, Scalar, MAX_PRECISION};
pub use scheduler::{Backend, Scheduler};
pub use timer::Timer;

#[cfg(feature = "rational")]
pub use num::BigRational;

/// Register-tile rows of the portable kernel.
pub const MR: usize = 4;
/// Upper bound on register-tile columns (vector lanes).
pub const MAX_NR: usize = 8;

/// Upper bound on the depth of a packed panel (L1 block).
pub const KC: usize = 256;
/// Upper bound on the rows of a packed A block (L2 block). Multiple of `MR`.
pub const MC: usize = 96;
/// Upper bound on the columns of a packed B block (L3 block).
pub const NC: usize = 4096;
