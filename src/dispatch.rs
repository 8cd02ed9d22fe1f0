//! Precision dispatch.
//!
//! An [`Algorithm`] is written once, generically over [`Scalar`]. A
//! [`Dispatcher`] instantiates it for every catalog entry and routes a
//! run-time [`Precision`] selector to the matching instantiation with an
//! O(1) table lookup.

use crate::error::{configuration_error, Result};
use crate::precision::{instantiate, Precision, Scalar, MAX_PRECISION};
use crate::scheduler::Scheduler;
use crate::timer::Timer;

/// A precision-generic numeric algorithm.
pub trait Algorithm {
    /// Arguments as handed in by the caller, independent of precision.
    type Args;
    /// Result as handed back to the caller.
    type Output;

    /// Number of catalog entries this algorithm accepts, counted from index
    /// zero. Defaults to every entry in the build.
    const MAX_PRECISION: usize = MAX_PRECISION;

    /// Name used in timing and log lines.
    fn name(&self) -> &'static str;

    /// Runs the algorithm with every scalar in representation `T`.
    fn perform<T: Scalar>(&self, args: &Self::Args, scheduler: &Scheduler) -> Result<Self::Output>;
}

/// One row of a dispatch table.
pub type Entry<A> = fn(
    &A,
    &<A as Algorithm>::Args,
    &Scheduler,
) -> Result<<A as Algorithm>::Output>;

pub(crate) fn call_through<A: Algorithm, T: Scalar>(
    algorithm: &A,
    args: &A::Args,
    scheduler: &Scheduler,
) -> Result<A::Output> {
    algorithm.perform::<T>(args, scheduler)
}

/// Precision-indexed table of instantiations of `A`.
pub struct Dispatcher<A: Algorithm> {
    table: [Entry<A>; MAX_PRECISION],
}

impl<A: Algorithm> Dispatcher<A> {
    pub fn new() -> Self {
        Dispatcher {
            table: instantiate::<A>(),
        }
    }

    /// Number of instantiations, always equal to [`MAX_PRECISION`].
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Runs `algorithm` at `precision`.
    ///
    /// The call is timed and reported through the `log` facade. Errors are
    /// logged with the elapsed time and then returned unchanged.
    pub fn call(
        &self,
        algorithm: &A,
        precision: Precision,
        args: &A::Args,
        scheduler: &Scheduler,
    ) -> Result<A::Output> {
        let index = precision.index();
        if index >= A::MAX_PRECISION {
            return Err(configuration_error(format!(
                "{} does not support precision `{precision}` (index {index}, limit {})",
                algorithm.name(),
                A::MAX_PRECISION
            )));
        }

        let timer = Timer::start(format!("{}<{precision}>", algorithm.name()));
        match (self.table[index])(algorithm, args, scheduler) {
            Ok(output) => {
                timer.stop();
                Ok(output)
            }
            Err(error) => {
                timer.fail(&error);
                Err(error)
            }
        }
    }

    /// Runs `algorithm` at the catalog entry with index `index`.
    ///
    /// # Errors
    ///
    /// [`ParameterError`](crate::KernelError::ParameterError) if `index` is
    /// not below [`MAX_PRECISION`].
    pub fn call_index(
        &self,
        algorithm: &A,
        index: usize,
        args: &A::Args,
        scheduler: &Scheduler,
    ) -> Result<A::Output> {
        let precision = Precision::try_from(index)?;
        self.call(algorithm, precision, args, scheduler)
    }
}

impl<A: Algorithm> Default for Dispatcher<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a one-off dispatcher for `A` and runs `algorithm` at `precision`.
pub fn dispatch<A: Algorithm>(
    algorithm: &A,
    precision: Precision,
    args: &A::Args,
    scheduler: &Scheduler,
) -> Result<A::Output> {
    Dispatcher::<A>::new().call(algorithm, precision, args, scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{parameter_error, KernelError};
    use crate::scheduler::{test_lock, Backend};

    /// Sums its arguments in the requested representation and reports which
    /// representation ran.
    struct Sum;

    impl Algorithm for Sum {
        type Args = Vec<f64>;
        type Output = (Precision, f64);

        fn name(&self) -> &'static str {
            "sum"
        }

        fn perform<T: Scalar>(&self, args: &Vec<f64>, _: &Scheduler) -> Result<(Precision, f64)> {
            let mut total = T::zero();
            for value in args {
                total += T::from_f64(*value);
            }
            Ok((T::PRECISION, total.to_f64()))
        }
    }

    /// Only instantiable at `float`.
    struct FloatOnly;

    impl Algorithm for FloatOnly {
        type Args = ();
        type Output = ();
        const MAX_PRECISION: usize = 1;

        fn name(&self) -> &'static str {
            "float-only"
        }

        fn perform<T: Scalar>(&self, _: &(), _: &Scheduler) -> Result<()> {
            Ok(())
        }
    }

    struct AlwaysFails;

    impl Algorithm for AlwaysFails {
        type Args = ();
        type Output = ();

        fn name(&self) -> &'static str {
            "always-fails"
        }

        fn perform<T: Scalar>(&self, _: &(), _: &Scheduler) -> Result<()> {
            Err(parameter_error("nothing to do"))
        }
    }

    #[test]
    fn test_every_index_reaches_its_representation() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        let dispatcher = Dispatcher::<Sum>::new();
        assert_eq!(dispatcher.len(), MAX_PRECISION);

        for (i, precision) in Precision::ALL.iter().enumerate() {
            let (ran, total) = dispatcher
                .call_index(&Sum, i, &vec![0.5, 0.25, 2.0], &scheduler)
                .unwrap();
            assert_eq!(ran, *precision);
            assert_eq!(total, 2.75);
        }
    }

    #[test]
    fn test_out_of_range_index_is_parameter_error() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        let err = Dispatcher::<Sum>::new()
            .call_index(&Sum, MAX_PRECISION, &vec![1.0], &scheduler)
            .unwrap_err();
        assert!(matches!(err, KernelError::ParameterError { .. }));
    }

    #[test]
    fn test_algorithm_limit_is_configuration_error() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        assert!(dispatch(&FloatOnly, Precision::Float, &(), &scheduler).is_ok());
        let err = dispatch(&FloatOnly, Precision::Double, &(), &scheduler).unwrap_err();
        assert!(matches!(err, KernelError::ConfigurationError { .. }));
    }

    #[test]
    fn test_errors_propagate_unchanged() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        let err = dispatch(&AlwaysFails, Precision::Double, &(), &scheduler).unwrap_err();
        assert_eq!(err, parameter_error("nothing to do"));
    }
}
