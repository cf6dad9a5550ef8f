//! Polynomial arithmetic over arbitrary-precision integer coefficients
//!
//! A `Polynomial` stores coefficients in ascending order of powers, so index
//! `i` holds the coefficient of `x^i`. All arithmetic happens over the
//! integers. Reduction modulo an integer (`mod_z`) and modulo a reduction
//! polynomial (`mod_p`) are always separate, explicit steps, so a product can
//! be inspected with unbounded coefficients before it is brought back into
//! `Z_q[x]/(phi(x))`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::{Add, Mul, Neg, Sub};
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use zeroize::Zeroize;
use crate::error::{Result, RlweError};
use crate::sampler::{DistributionKind, Sampler};

/// Polynomial with integer coefficients, lowest power first
///
/// The coefficient vector is never empty. Coefficients past the stored
/// length are implicitly zero, and equality follows that convention:
/// `[1, 2]` and `[1, 2, 0, 0]` compare equal.
#[derive(Clone, Debug)]
pub struct Polynomial {
    coefficients: Vec<BigInt>,
}

impl Polynomial {
    /// Creates a polynomial from its coefficients, lowest power first
    ///
    /// # Returns
    /// * `Result<Self>` - Polynomial or `InvalidParameters` when `coefficients`
    ///   is empty
    pub fn new(coefficients: Vec<BigInt>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(RlweError::InvalidParameters(
                "Coefficients may not be empty".to_string(),
            ));
        }
        Ok(Self { coefficients })
    }

    pub fn from_coefficients(coefficients: &[i64]) -> Result<Self> {
        Self::new(coefficients.iter().map(|&c| BigInt::from(c)).collect())
    }

    /// Zero polynomial with `degree + 1` zero coefficients
    pub fn zero(degree: usize) -> Self {
        Self {
            coefficients: vec![BigInt::zero(); degree + 1],
        }
    }

    /// The reduction polynomial `x^n + 1`
    pub fn cyclotomic(n: usize) -> Self {
        let mut coefficients = vec![BigInt::zero(); n + 1];
        coefficients[0] = BigInt::one();
        coefficients[n] += BigInt::one();
        Self { coefficients }
    }

    /// Samples a polynomial of the given degree with independent coefficients
    ///
    /// # Arguments
    /// * `degree` - Degree of the result; `degree + 1` coefficients are drawn
    /// * `params` - Parameter list for the distribution
    /// * `kind` - Distribution each coefficient is drawn from
    /// * `sampler` - Random source
    ///
    /// # Returns
    /// * `Result<Self>` - Sampled polynomial or the sampler's
    ///   `InvalidParameters` error
    pub fn random<R: RngCore + CryptoRng>(
        degree: usize,
        params: &[BigInt],
        kind: DistributionKind,
        sampler: &mut Sampler<R>,
    ) -> Result<Self> {
        let coefficients = (0..=degree)
            .map(|_| sampler.sample(kind, params))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { coefficients })
    }

    /// Stored degree, i.e. number of coefficients minus one
    ///
    /// Trailing zero coefficients are not trimmed, so this may exceed the
    /// index of the highest nonzero coefficient.
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[BigInt] {
        &self.coefficients
    }

    pub fn into_coefficients(self) -> Vec<BigInt> {
        self.coefficients
    }

    /// Coefficient of `x^k`; zero past the stored degree
    pub fn coeff_of(&self, k: isize) -> Result<BigInt> {
        let index = usize::try_from(k).map_err(|_| RlweError::IndexError { index: k })?;
        Ok(self.coefficients.get(index).cloned().unwrap_or_default())
    }

    /// Sets the coefficient of `x^k`, growing the polynomial with zeros when
    /// `k` is past the stored degree
    pub fn set_coeff_of(&mut self, k: isize, value: BigInt) -> Result<()> {
        let index = usize::try_from(k).map_err(|_| RlweError::IndexError { index: k })?;
        if index >= self.coefficients.len() {
            self.coefficients.resize(index + 1, BigInt::zero());
        }
        self.coefficients[index] = value;
        Ok(())
    }

    /// Coefficient-wise sum, as long as the longer operand
    pub fn plus(&self, other: &Self) -> Self {
        let (longer, shorter) = if self.coefficients.len() >= other.coefficients.len() {
            (self, other)
        } else {
            (other, self)
        };

        let mut coefficients = longer.coefficients.clone();
        for (sum, term) in coefficients.iter_mut().zip(&shorter.coefficients) {
            *sum += term;
        }
        Self { coefficients }
    }

    /// Schoolbook product of degree `deg(self) + deg(other)`
    ///
    /// Each output coefficient `c_k = sum_{i + j = k} a_i * b_j` is an
    /// independent sum, so the coefficients are computed in parallel.
    pub fn times(&self, other: &Self) -> Self {
        let lhs = &self.coefficients;
        let rhs = &other.coefficients;
        let len = lhs.len() + rhs.len() - 1;

        let coefficients = (0..len)
            .into_par_iter()
            .map(|k| {
                let start = k.saturating_sub(rhs.len() - 1);
                let end = k.min(lhs.len() - 1);
                (start..=end).fold(BigInt::zero(), |acc, i| acc + &lhs[i] * &rhs[k - i])
            })
            .collect();

        Self { coefficients }
    }

    pub fn scalar_times(&self, k: &BigInt) -> Self {
        Self {
            coefficients: self.coefficients.iter().map(|c| c * k).collect(),
        }
    }

    /// Reduces every coefficient into `[0, q)`
    ///
    /// Negative coefficients map to their non-negative representative, so
    /// `-1 mod 7` is `6`, never `-1`.
    pub fn mod_z(&self, q: &BigInt) -> Result<Self> {
        if !q.is_positive() {
            return Err(RlweError::InvalidModulus { modulus: q.clone() });
        }

        let coefficients = self
            .coefficients
            .iter()
            .map(|c| ((c % q) + q) % q)
            .collect();
        Ok(Self { coefficients })
    }

    /// Remainder of division by the monic polynomial `phi`
    ///
    /// The result always has exactly `deg(phi)` coefficients. For
    /// `phi = x^n + 1` this folds `x^(n + i)` onto `-x^i`.
    ///
    /// # Returns
    /// * `Result<Self>` - Remainder or `InvalidParameters` when `phi` has
    ///   degree 0 or a leading coefficient other than 1
    pub fn mod_p(&self, phi: &Self) -> Result<Self> {
        let n = phi
            .leading_index()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                RlweError::InvalidParameters(
                    "Reduction polynomial must have positive degree".to_string(),
                )
            })?;
        if !phi.coefficients[n].is_one() {
            return Err(RlweError::InvalidParameters(format!(
                "Reduction polynomial must be monic, leading coefficient is {}",
                phi.coefficients[n]
            )));
        }

        let mut remainder = self.coefficients.clone();
        if remainder.len() < n {
            remainder.resize(n, BigInt::zero());
        }

        for top in (n..remainder.len()).rev() {
            if remainder[top].is_zero() {
                continue;
            }
            let factor = std::mem::take(&mut remainder[top]);
            for (j, phi_j) in phi.coefficients[..n].iter().enumerate() {
                if !phi_j.is_zero() {
                    remainder[top - n + j] -= &factor * phi_j;
                }
            }
        }

        remainder.truncate(n);
        Ok(Self {
            coefficients: remainder,
        })
    }

    pub fn plus_mod_z(&self, other: &Self, q: &BigInt) -> Result<Self> {
        self.plus(other).mod_z(q)
    }

    pub fn plus_mod_p(&self, other: &Self, phi: &Self) -> Result<Self> {
        self.plus(other).mod_p(phi)
    }

    pub fn times_mod_z(&self, other: &Self, q: &BigInt) -> Result<Self> {
        self.times(other).mod_z(q)
    }

    pub fn times_mod_p(&self, other: &Self, phi: &Self) -> Result<Self> {
        self.times(other).mod_p(phi)
    }

    /// Whether two polynomials are the same element of `Z_q[x]/(phi(x))`
    pub fn ring_eq(&self, other: &Self, q: &BigInt, phi: &Self) -> Result<bool> {
        let lhs = self.mod_p(phi)?.mod_z(q)?;
        let rhs = other.mod_p(phi)?.mod_z(q)?;
        Ok(lhs == rhs)
    }

    /// Index of the highest nonzero coefficient, `None` for the zero polynomial
    fn leading_index(&self) -> Option<usize> {
        self.coefficients.iter().rposition(|c| !c.is_zero())
    }
}

impl PartialEq for Polynomial {
    fn eq(&self, other: &Self) -> bool {
        let len = self.coefficients.len().max(other.coefficients.len());
        let zero = BigInt::zero();
        (0..len).all(|i| {
            let lhs = self.coefficients.get(i).unwrap_or(&zero);
            let rhs = other.coefficients.get(i).unwrap_or(&zero);
            lhs == rhs
        })
    }
}

impl Eq for Polynomial {}

impl Zeroize for Polynomial {
    fn zeroize(&mut self) {
        for coefficient in self.coefficients.iter_mut() {
            coefficient.set_zero();
        }
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, other: Self) -> Polynomial {
        self.plus(other)
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, other: Self) -> Polynomial {
        self.plus(&-other)
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, other: Self) -> Polynomial {
        self.times(other)
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial {
            coefficients: self.coefficients.iter().map(|c| -c).collect(),
        }
    }
}

impl Display for Polynomial {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut wrote_term = false;
        for (power, coefficient) in self.coefficients.iter().enumerate().rev() {
            if coefficient.is_zero() {
                continue;
            }

            if wrote_term {
                let sign = if coefficient.is_negative() { " - " } else { " + " };
                write!(f, "{}", sign)?;
            } else if coefficient.is_negative() {
                write!(f, "-")?;
            }

            let magnitude = coefficient.abs();
            let show_magnitude = !magnitude.is_one() || power == 0;
            if show_magnitude {
                write!(f, "{}", magnitude)?;
            }
            match power {
                0 => {}
                1 => write!(f, "x")?,
                _ => write!(f, "x^{}", power)?,
            }
            wrote_term = true;
        }

        if !wrote_term {
            write!(f, "0")?;
        }
        Ok(())
    }
}
