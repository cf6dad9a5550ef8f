//! Miller-Rabin primality testing for modulus validation

use num_bigint::BigInt;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use crate::error::Result;
use crate::sampler::Sampler;

/// Tests if a number is prime using the Miller-Rabin primality test
///
/// # Arguments
/// * `n` - Number to test for primality
/// * `rounds` - Number of independent random witnesses
/// * `sampler` - Source of witnesses, drawn uniformly from `[2, n - 1)`
///
/// # Returns
/// * `Result<bool>` - False if `n` is composite, true if `n` is probably
///   prime; a composite survives all rounds with probability at most
///   `4^-rounds`
///
/// # Algorithm
/// 1. Write `n - 1 = d * 2^r` with `d` odd
/// 2. For each witness `a`, compute `x = a^d mod n`
/// 3. The round passes if `x` is 1 or `n - 1`, or if squaring `x` up to
///    `r - 1` times reaches `n - 1`
/// 4. A failed round proves `n` composite
pub fn is_prime<R: RngCore + CryptoRng>(
    n: &BigInt,
    rounds: usize,
    sampler: &mut Sampler<R>,
) -> Result<bool> {
    let one = BigInt::one();
    let two = BigInt::from(2);
    let three = BigInt::from(3);

    // Handle small cases
    if n < &two {
        return Ok(false);
    }
    if n == &two || n == &three {
        return Ok(true);
    }
    if (n % &two).is_zero() {
        return Ok(false);
    }

    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut r = 0u64;
    while (&d % &two).is_zero() {
        d /= &two;
        r += 1;
    }

    let witness_range = [two.clone(), n_minus_one.clone()];
    for _ in 0..rounds {
        let a = sampler.uniform(&witness_range)?;
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }

        let mut composite = true;
        for _ in 1..r {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                composite = false;
                break;
            }
        }

        if composite {
            return Ok(false);
        }
    }

    Ok(true)
}
