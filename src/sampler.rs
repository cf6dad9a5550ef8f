//! Noise sampling for Ring-LWE key exchange
//!
//! Provides the three integer distributions the protocol draws from. Each
//! distribution is selected through `DistributionKind` and receives its
//! parameters as an ordered list of arbitrary-precision integers:
//!
//! - `Uniform`: `[min, max]`, draws from `[min, max)`
//! - `DiscreteGaussian`: `[mean, stdev]`, floor of a real Gaussian draw
//! - `FiniteDiscreteGaussian`: `[limit, stdev]`, mean 0, clamped into
//!   `[(1 - limit) / 2, (limit - 1) / 2]`
//!
//! The clamp in the finite distribution is not rejection sampling: draws past
//! either bound collapse onto the bound itself, so the two boundary values
//! carry the whole tail mass.

use num_bigint::{BigInt, RandBigInt};
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use rand::{thread_rng, CryptoRng, RngCore};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use rand_distr::{Distribution, Normal};
use crate::error::{Result, RlweError};

/// Named integer distributions understood by `Sampler::sample`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DistributionKind {
    Uniform,
    DiscreteGaussian,
    FiniteDiscreteGaussian,
}

/// Source of random integers drawn from a `DistributionKind`
///
/// A sampler exclusively owns its generator. Sessions that run in parallel
/// each hold their own sampler, so no sampling state is ever shared.
pub struct Sampler<R = ChaCha20Rng> {
    rng: R,
}

impl Sampler<ChaCha20Rng> {
    /// Creates a sampler whose ChaCha20 stream is seeded from the thread-local
    /// secure generator
    ///
    /// # Returns
    /// * `Result<Self>` - Freshly seeded sampler or error if the secure
    ///   generator could not produce a seed
    pub fn from_entropy() -> Result<Self> {
        let rng = ChaCha20Rng::from_rng(thread_rng())?;
        Ok(Self { rng })
    }

    /// Creates a reproducible sampler from a 64-bit seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Creates a reproducible sampler from a full 256-bit seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }
}

impl<R: RngCore + CryptoRng> Sampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws one integer from the named distribution
    ///
    /// # Arguments
    /// * `kind` - Distribution to draw from
    /// * `params` - Parameter list whose meaning depends on `kind`
    ///
    /// # Returns
    /// * `Result<BigInt>` - Sampled integer or `InvalidParameters`
    pub fn sample(&mut self, kind: DistributionKind, params: &[BigInt]) -> Result<BigInt> {
        match kind {
            DistributionKind::Uniform => self.uniform(params),
            DistributionKind::DiscreteGaussian => self.discrete_gaussian(params),
            DistributionKind::FiniteDiscreteGaussian => self.finite_discrete_gaussian(params),
        }
    }

    /// Draws an integer from `[min, max)` with `params = [min, max]`
    ///
    /// # Algorithm
    /// 1. Draw a candidate with `bits(max)` random bits
    /// 2. If the candidate is below `min`, add `min`
    /// 3. If the candidate is at least `max - min`, fold it with
    ///    `candidate mod (max - min) + min`
    ///
    /// A negative `min` shifts the interval to `[0, max - min)` first and shifts
    /// the result back, which keeps every draw inside `[min, max)`.
    pub fn uniform(&mut self, params: &[BigInt]) -> Result<BigInt> {
        let (min, max) = parameter_pair(params, "uniform")?;
        if min >= max {
            return Err(RlweError::InvalidParameters(format!(
                "uniform requires min < max, got min = {}, max = {}",
                min, max
            )));
        }

        if min.is_negative() {
            let width = max - min;
            return Ok(self.uniform_non_negative(&BigInt::zero(), &width) + min);
        }

        Ok(self.uniform_non_negative(min, max))
    }

    /// Draws the floor of a real Gaussian sample with `params = [mean, stdev]`
    pub fn discrete_gaussian(&mut self, params: &[BigInt]) -> Result<BigInt> {
        let (mean, stdev) = parameter_pair(params, "discrete Gaussian")?;
        let mean = narrow(mean, "mean")?;
        let stdev = narrow(stdev, "standard deviation")?;
        if stdev <= 0.0 {
            return Err(RlweError::InvalidParameters(format!(
                "standard deviation must be positive, got {}",
                stdev
            )));
        }

        let normal = Normal::new(mean, stdev).map_err(|e| {
            RlweError::InvalidParameters(format!("Invalid Gaussian parameters: {}", e))
        })?;

        let draw = normal.sample(&mut self.rng).floor();
        BigInt::from_f64(draw).ok_or_else(|| {
            RlweError::InvalidParameters(format!("Gaussian draw {} is not an integer", draw))
        })
    }

    /// Draws a zero-mean discrete Gaussian clamped into the centered range of
    /// `limit` with `params = [limit, stdev]`
    ///
    /// Bounds use truncating integer division: `min = (1 - limit) / 2` and
    /// `max = (limit - 1) / 2`.
    pub fn finite_discrete_gaussian(&mut self, params: &[BigInt]) -> Result<BigInt> {
        let (limit, stdev) = parameter_pair(params, "finite discrete Gaussian")?;
        if limit < &BigInt::one() {
            return Err(RlweError::InvalidParameters(format!(
                "finite discrete Gaussian limit must be at least 1, got {}",
                limit
            )));
        }

        let two = BigInt::from(2);
        let min_limit = (BigInt::one() - limit) / &two;
        let max_limit = (limit - BigInt::one()) / &two;

        let draw = self.discrete_gaussian(&[BigInt::zero(), stdev.clone()])?;
        Ok(draw.clamp(min_limit, max_limit))
    }

    fn uniform_non_negative(&mut self, min: &BigInt, max: &BigInt) -> BigInt {
        let width = max - min;
        let mut candidate = BigInt::from(self.rng.gen_biguint(max.bits()));
        if &candidate < min {
            candidate += min;
        }
        if candidate >= width {
            candidate = candidate % &width + min;
        }
        candidate
    }
}

fn parameter_pair<'a>(params: &'a [BigInt], distribution: &str) -> Result<(&'a BigInt, &'a BigInt)> {
    match params {
        [first, second] => Ok((first, second)),
        _ => Err(RlweError::InvalidParameters(format!(
            "{} distribution expects 2 parameters, got {}",
            distribution,
            params.len()
        ))),
    }
}

fn narrow(value: &BigInt, name: &str) -> Result<f64> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            RlweError::InvalidParameters(format!("{} {} does not fit in a float", name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ints(values: &[i64]) -> Vec<BigInt> {
        values.iter().map(|&v| BigInt::from(v)).collect()
    }

    #[test]
    fn test_uniform_range() {
        let mut sampler = Sampler::seeded(7);
        let params = ints(&[3, 17]);
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            let x = sampler.uniform(&params).unwrap();
            assert!(x >= params[0] && x < params[1], "{} out of range", x);
            seen.insert(x);
        }

        assert!(seen.len() > 1);
    }

    #[test]
    fn test_uniform_negative_min() {
        let mut sampler = Sampler::seeded(11);
        let params = ints(&[-5, 5]);
        let mut saw_negative = false;

        for _ in 0..10_000 {
            let x = sampler.uniform(&params).unwrap();
            assert!(x >= params[0] && x < params[1], "{} out of range", x);
            saw_negative |= x.is_negative();
        }

        assert!(saw_negative);
    }

    #[test]
    fn test_uniform_single_value_interval() {
        let mut sampler = Sampler::seeded(3);
        let params = ints(&[41, 42]);
        for _ in 0..100 {
            assert_eq!(sampler.uniform(&params).unwrap(), BigInt::from(41));
        }
    }

    #[test]
    fn test_uniform_rejects_bad_parameters() {
        let mut sampler = Sampler::seeded(0);

        assert!(matches!(
            sampler.uniform(&ints(&[5, 5])),
            Err(RlweError::InvalidParameters(_))
        ));
        assert!(matches!(
            sampler.uniform(&ints(&[9, 2])),
            Err(RlweError::InvalidParameters(_))
        ));
        assert!(matches!(
            sampler.uniform(&ints(&[1, 2, 3])),
            Err(RlweError::InvalidParameters(_))
        ));
        assert!(matches!(
            sampler.uniform(&[]),
            Err(RlweError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_discrete_gaussian_statistics() {
        let mut sampler = Sampler::seeded(42);
        let params = ints(&[10, 4]);
        let draws: Vec<f64> = (0..20_000)
            .map(|_| sampler.discrete_gaussian(&params).unwrap().to_f64().unwrap())
            .collect();

        // Flooring shifts the mean down by about one half.
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 9.5).abs() < 0.2, "mean {}", mean);

        let variance = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!((variance.sqrt() - 4.0).abs() < 0.3, "stdev {}", variance.sqrt());
    }

    #[test]
    fn test_discrete_gaussian_rejects_bad_parameters() {
        let mut sampler = Sampler::seeded(0);

        assert!(matches!(
            sampler.discrete_gaussian(&ints(&[0])),
            Err(RlweError::InvalidParameters(_))
        ));
        assert!(matches!(
            sampler.discrete_gaussian(&ints(&[0, 0])),
            Err(RlweError::InvalidParameters(_))
        ));
        assert!(matches!(
            sampler.discrete_gaussian(&ints(&[0, -3])),
            Err(RlweError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_finite_gaussian_clamp_bound() {
        let mut sampler = Sampler::seeded(5);
        // A wide Gaussian against a narrow limit forces clamping on both sides.
        let params = ints(&[9, 50]);
        let lower = BigInt::from(-4);
        let upper = BigInt::from(4);
        let mut hit_lower = false;
        let mut hit_upper = false;

        for _ in 0..5_000 {
            let x = sampler.finite_discrete_gaussian(&params).unwrap();
            assert!(x >= lower && x <= upper, "{} out of range", x);
            hit_lower |= x == lower;
            hit_upper |= x == upper;
        }

        assert!(hit_lower && hit_upper);
    }

    #[test]
    fn test_finite_gaussian_even_limit_bounds() {
        let mut sampler = Sampler::seeded(9);
        // (1 - 10) / 2 = -4 and (10 - 1) / 2 = 4 under truncating division
        let params = ints(&[10, 100]);
        for _ in 0..2_000 {
            let x = sampler.finite_discrete_gaussian(&params).unwrap();
            assert!(x >= BigInt::from(-4) && x <= BigInt::from(4));
        }
    }

    #[test]
    fn test_finite_gaussian_rejects_bad_limit() {
        let mut sampler = Sampler::seeded(0);
        assert!(matches!(
            sampler.finite_discrete_gaussian(&ints(&[0, 4])),
            Err(RlweError::InvalidParameters(_))
        ));
        assert!(matches!(
            sampler.finite_discrete_gaussian(&ints(&[40961])),
            Err(RlweError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_dispatch_matches_direct_calls() {
        let params = ints(&[0, 1000]);
        let mut direct = Sampler::seeded(99);
        let mut dispatched = Sampler::seeded(99);

        for _ in 0..100 {
            assert_eq!(
                direct.uniform(&params).unwrap(),
                dispatched.sample(DistributionKind::Uniform, &params).unwrap()
            );
        }
    }

    #[test]
    fn test_seeded_samplers_are_reproducible() {
        let params = ints(&[40961, 4]);
        let mut first = Sampler::seeded(2024);
        let mut second = Sampler::seeded(2024);

        let a: Vec<BigInt> = (0..64)
            .map(|_| first.finite_discrete_gaussian(&params).unwrap())
            .collect();
        let b: Vec<BigInt> = (0..64)
            .map(|_| second.finite_discrete_gaussian(&params).unwrap())
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_entropy_samplers_are_independent() {
        let params = ints(&[0, 1i64 << 62]);
        let mut first = Sampler::from_entropy().unwrap();
        let mut second = Sampler::from_entropy().unwrap();

        let a: Vec<BigInt> = (0..8).map(|_| first.uniform(&params).unwrap()).collect();
        let b: Vec<BigInt> = (0..8).map(|_| second.uniform(&params).unwrap()).collect();
        assert_ne!(a, b);
    }
}
