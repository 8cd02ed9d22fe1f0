//! General matrix multiplication, `C += A · B`.
//!
//! [`matmul_into`] checks shapes and routes to the blocked or naive kernel.
//! Kernels always write a row-major C; a column-major C is computed as
//! `Cᵀ += Bᵀ · Aᵀ` over transposed views, which needs no copy.

pub mod blis;
pub mod naive;
pub mod panels;

use std::fmt;
use std::str::FromStr;

pub use blis::{gemm_blocked, BlockSizes};
pub use naive::gemm_naive;

use crate::dispatch::Algorithm;
use crate::error::{parameter_error, KernelError, Result};
use crate::matrix::{Matrix, StorageOrder};
use crate::precision::Scalar;
use crate::scheduler::Scheduler;

/// Which GEMM kernel to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GemmVariant {
    Naive,
    #[default]
    Blocked,
}

impl GemmVariant {
    pub const fn name(self) -> &'static str {
        match self {
            GemmVariant::Naive => "naive",
            GemmVariant::Blocked => "blocked",
        }
    }
}

impl fmt::Display for GemmVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GemmVariant {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" | "reference" => Ok(GemmVariant::Naive),
            "blocked" | "blis" => Ok(GemmVariant::Blocked),
            _ => Err(parameter_error(format!("unknown gemm variant `{s}`"))),
        }
    }
}

/// `C += A · B` with the block sizes chosen for `T` on this host.
///
/// # Errors
///
/// [`ParameterError`](crate::KernelError::ParameterError) if the inner
/// dimensions differ or C is not `a.rows() × b.cols()`.
pub fn matmul_into<T: Scalar>(
    scheduler: &Scheduler,
    variant: GemmVariant,
    a: &Matrix<T>,
    b: &Matrix<T>,
    c: &mut Matrix<T>,
) -> Result<()> {
    matmul_into_with(scheduler, variant, &BlockSizes::for_scalar::<T>(), a, b, c)
}

/// [`matmul_into`] with explicit block sizes.
pub fn matmul_into_with<T: Scalar>(
    scheduler: &Scheduler,
    variant: GemmVariant,
    sizes: &BlockSizes,
    a: &Matrix<T>,
    b: &Matrix<T>,
    c: &mut Matrix<T>,
) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(parameter_error(format!(
            "inner dimensions differ: A is {}x{}, B is {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    if c.shape() != (a.rows(), b.cols()) {
        return Err(parameter_error(format!(
            "C is {}x{}, expected {}x{}",
            c.rows(),
            c.cols(),
            a.rows(),
            b.cols()
        )));
    }

    let (lhs, rhs) = match c.order() {
        StorageOrder::RowMajor => (a.view(), b.view()),
        StorageOrder::ColumnMajor => (b.view().t(), a.view().t()),
    };
    let out = c.as_mut_slice();
    match variant {
        GemmVariant::Naive => gemm_naive(scheduler, lhs, rhs, out),
        GemmVariant::Blocked => gemm_blocked(scheduler, sizes, lhs, rhs, out),
    }
}

/// `A · B` into a new matrix stored like A.
pub fn matmul<T: Scalar>(
    scheduler: &Scheduler,
    variant: GemmVariant,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<Matrix<T>> {
    let mut c = Matrix::zeros(a.rows(), b.cols(), a.order())?;
    matmul_into(scheduler, variant, a, b, &mut c)?;
    Ok(c)
}

/// GEMM as a dispatchable algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gemm {
    pub variant: GemmVariant,
}

impl Gemm {
    pub fn new(variant: GemmVariant) -> Self {
        Gemm { variant }
    }
}

/// Operands for [`Gemm`]. When `c` is given the product is accumulated into
/// it, otherwise into zeros stored like `a`.
#[derive(Debug, Clone)]
pub struct GemmArgs {
    pub a: Matrix<f64>,
    pub b: Matrix<f64>,
    pub c: Option<Matrix<f64>>,
}

impl GemmArgs {
    pub fn new(a: Matrix<f64>, b: Matrix<f64>) -> Self {
        GemmArgs { a, b, c: None }
    }

    pub fn accumulate_into(mut self, c: Matrix<f64>) -> Self {
        self.c = Some(c);
        self
    }
}

impl Algorithm for Gemm {
    type Args = GemmArgs;
    type Output = Matrix<f64>;

    fn name(&self) -> &'static str {
        match self.variant {
            GemmVariant::Naive => "gemm-naive",
            GemmVariant::Blocked => "gemm-blocked",
        }
    }

    fn perform<T: Scalar>(&self, args: &GemmArgs, scheduler: &Scheduler) -> Result<Matrix<f64>> {
        let a = args.a.cast::<T>()?;
        let b = args.b.cast::<T>()?;
        let mut c = match &args.c {
            Some(c) => c.cast::<T>()?,
            None => Matrix::zeros(a.rows(), b.cols(), a.order())?,
        };
        matmul_into(scheduler, self.variant, &a, &b, &mut c)?;
        c.cast::<f64>()
    }
}
