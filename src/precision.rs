//! Precision representation catalog.
//!
//! The catalog is a closed, ordered list of numeric representations. Each
//! entry has a stable index starting at zero, a concrete Rust type, and a
//! name used by selector parsing. Entries that are not compiled into the
//! build (the `rational` feature) are absent from the list altogether, so the
//! dispatch table built from it never contains a hole.

use std::fmt;
use std::str::FromStr;

use num::traits::NumAssign;
use num::Signed;

#[cfg(feature = "rational")]
use num::{BigRational, ToPrimitive, Zero};

use crate::dispatch::{call_through, Algorithm, Entry};
use crate::error::{configuration_error, parameter_error, KernelError, Result};
use crate::simd::TileKernel;

/// A numeric type every algorithm can be instantiated for.
///
/// Implementations must not be assumed to be `Copy` or IEEE floats: the
/// arbitrary-precision entry is heap-backed and exact.
pub trait Scalar:
    Clone + fmt::Debug + PartialOrd + Send + Sync + NumAssign + Signed + 'static
{
    /// The catalog entry this type is instantiated for.
    const PRECISION: Precision;

    /// Unit roundoff of the representation (zero for exact types).
    fn epsilon() -> Self;

    fn from_f64(value: f64) -> Self;

    fn to_f64(&self) -> f64;

    /// A hand-vectorised register-tile kernel for this type, if the host
    /// supports one.
    fn tile_kernel() -> Option<TileKernel<Self>> {
        None
    }
}

impl Scalar for f32 {
    const PRECISION: Precision = Precision::Float;

    fn epsilon() -> Self {
        f32::EPSILON
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(&self) -> f64 {
        *self as f64
    }
}

impl Scalar for f64 {
    const PRECISION: Precision = Precision::Double;

    fn epsilon() -> Self {
        f64::EPSILON
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(&self) -> f64 {
        *self
    }

    fn tile_kernel() -> Option<TileKernel<Self>> {
        crate::simd::f64_tile_kernel()
    }
}

#[cfg(feature = "rational")]
impl Scalar for BigRational {
    const PRECISION: Precision = Precision::Rational;

    fn epsilon() -> Self {
        BigRational::zero()
    }

    /// Exact conversion; non-finite inputs map to zero.
    fn from_f64(value: f64) -> Self {
        BigRational::from_float(value).unwrap_or_else(BigRational::zero)
    }

    fn to_f64(&self) -> f64 {
        ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
    }
}

/// Compile-time handle for catalog index `I`.
pub struct Repr<const I: usize>;

/// Maps a catalog index to its concrete numeric type.
pub trait Representation {
    type Scalar: Scalar;
}

/// The concrete numeric type of catalog index `I`.
pub type ScalarOf<const I: usize> = <Repr<I> as Representation>::Scalar;

/// Representation names that exist in the toolkit but may be missing from a
/// particular build. Asking for one of these is a configuration error rather
/// than a typo.
const RESERVED: &[&str] = &["float", "double", "extended", "quadruple", "rational"];

macro_rules! precision_catalog {
    ($( $(#[cfg($cfg:meta)])? $variant:ident = $index:literal => $ty:ty, $name:literal; )*) => {
        /// Run-time precision selector.
        ///
        /// Discriminants are contiguous from zero and equal to the position
        /// in [`Precision::ALL`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(usize)]
        pub enum Precision {
            $( $(#[cfg($cfg)])? $variant = $index, )*
        }

        impl Precision {
            /// Every representation compiled into this build, in index order.
            pub const ALL: &'static [Precision] = &[
                $( $(#[cfg($cfg)])? Precision::$variant, )*
            ];

            pub const fn name(self) -> &'static str {
                match self {
                    $( $(#[cfg($cfg)])? Precision::$variant => $name, )*
                }
            }
        }

        $(
            $(#[cfg($cfg)])?
            impl Representation for Repr<$index> {
                type Scalar = $ty;
            }
        )*

        /// One call-through per catalog entry, in index order.
        pub(crate) fn instantiate<A: Algorithm>() -> [Entry<A>; MAX_PRECISION] {
            [ $( $(#[cfg($cfg)])? call_through::<A, $ty>, )* ]
        }
    };
}

precision_catalog! {
    Float = 0 => f32, "float";
    Double = 1 => f64, "double";
    #[cfg(feature = "rational")]
    Rational = 2 => BigRational, "rational";
}

/// Number of catalog entries in this build; valid selectors are
/// `0..MAX_PRECISION`.
pub const MAX_PRECISION: usize = Precision::ALL.len();

impl Precision {
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Unit roundoff of the representation as an `f64`.
    pub fn epsilon(self) -> f64 {
        match self {
            Precision::Float => f32::EPSILON as f64,
            Precision::Double => f64::EPSILON,
            #[cfg(feature = "rational")]
            Precision::Rational => 0.0,
        }
    }
}

impl TryFrom<usize> for Precision {
    type Error = KernelError;

    fn try_from(index: usize) -> Result<Self> {
        Precision::ALL.get(index).copied().ok_or_else(|| {
            parameter_error(format!(
                "precision index {index} is out of range 0..{MAX_PRECISION}"
            ))
        })
    }
}

impl FromStr for Precision {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        let canonical = match wanted.as_str() {
            "f32" | "single" => "float",
            "f64" => "double",
            "long-double" | "long_double" | "f80" => "extended",
            "quad" | "f128" => "quadruple",
            "bigrational" | "arbitrary" | "mp" => "rational",
            other => other,
        };

        if let Some(precision) = Precision::ALL.iter().find(|p| p.name() == canonical) {
            return Ok(*precision);
        }
        if RESERVED.contains(&canonical) {
            Err(configuration_error(format!(
                "precision `{s}` is not compiled into this build"
            )))
        } else {
            Err(parameter_error(format!("unknown precision `{s}`")))
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_contiguous() {
        for (i, precision) in Precision::ALL.iter().enumerate() {
            assert_eq!(precision.index(), i);
            assert_eq!(Precision::try_from(i).unwrap(), *precision);
        }
        assert_eq!(MAX_PRECISION, Precision::ALL.len());
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let err = Precision::try_from(MAX_PRECISION).unwrap_err();
        assert!(matches!(err, KernelError::ParameterError { .. }));
        assert!(Precision::try_from(usize::MAX).is_err());
    }

    #[test]
    fn test_representation_mapping() {
        assert_eq!(<ScalarOf<0> as Scalar>::PRECISION, Precision::Float);
        assert_eq!(<ScalarOf<1> as Scalar>::PRECISION, Precision::Double);
        assert_eq!(std::mem::size_of::<ScalarOf<1>>(), 8);
    }

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("double".parse::<Precision>().unwrap(), Precision::Double);
        assert_eq!(" F64 ".parse::<Precision>().unwrap(), Precision::Double);
        assert_eq!("single".parse::<Precision>().unwrap(), Precision::Float);
        for precision in Precision::ALL {
            assert_eq!(precision.to_string().parse::<Precision>().unwrap(), *precision);
        }
    }

    #[test]
    fn test_parse_reserved_is_configuration_error() {
        let err = "quad".parse::<Precision>().unwrap_err();
        assert!(matches!(err, KernelError::ConfigurationError { .. }));
        let err = "extended".parse::<Precision>().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_unknown_is_parameter_error() {
        let err = "octonion".parse::<Precision>().unwrap_err();
        assert!(matches!(err, KernelError::ParameterError { .. }));
    }

    #[test]
    fn test_epsilon_matches_scalar() {
        assert_eq!(Precision::Float.epsilon(), <f32 as Scalar>::epsilon() as f64);
        assert_eq!(Precision::Double.epsilon(), <f64 as Scalar>::epsilon());
    }

    #[cfg(feature = "rational")]
    #[test]
    fn test_rational_is_exact() {
        let third = BigRational::new(1.into(), 3.into());
        let sum = third.clone() + third.clone() + third;
        assert_eq!(sum, BigRational::from_f64(1.0));
        assert_eq!(Scalar::to_f64(&<BigRational as Scalar>::from_f64(0.5)), 0.5);
        assert_eq!(Precision::Rational.index(), 2);
        assert_eq!(<ScalarOf<2> as Scalar>::PRECISION, Precision::Rational);
    }

    #[cfg(not(feature = "rational"))]
    #[test]
    fn test_rational_absent_without_feature() {
        let err = "rational".parse::<Precision>().unwrap_err();
        assert!(matches!(err, KernelError::ConfigurationError { .. }));
    }
}
