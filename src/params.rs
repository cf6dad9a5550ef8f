//! Ring-LWE key exchange parameter sets
//!
//! The published "SINGH" set (degree 1024, q = 40961, sigma = 4,
//! phi = x^1024 + 1) is exposed verbatim for interoperability.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, RngCore};
use crate::error::{Result, RlweError};
use crate::polynomial::Polynomial;
use crate::primality::is_prime;
use crate::sampler::Sampler;

/// Ring degree of the SINGH parameter set
pub const SINGH_DEGREE: usize = 1024;

/// Modulus of the SINGH parameter set
pub const SINGH_MODULUS: u64 = 40961;

/// Noise standard deviation of the SINGH parameter set
pub const SINGH_SIGMA: u64 = 4;

/// Miller-Rabin rounds used when validating a modulus
pub const DEFAULT_PRIMALITY_ROUNDS: usize = 20;

/// Parameters shared by both parties of an exchange
///
/// Ring elements live in `Z_q[x]/(phi(x))` where `phi` is monic of degree
/// `degree`; reduced elements therefore have exactly `degree` coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeParams {
    /// Ring degree n
    degree: usize,

    /// Coefficient modulus q (odd, ideally prime)
    modulus: BigInt,

    /// Standard deviation of the noise distribution
    sigma: BigInt,

    /// Reduction polynomial phi
    phi: Polynomial,
}

impl ExchangeParams {
    /// Creates new exchange parameters with validation
    ///
    /// # Arguments
    /// * `degree` - Ring degree n (at least 1)
    /// * `modulus` - Coefficient modulus q (odd, at least 5)
    /// * `sigma` - Noise standard deviation (at least 1)
    /// * `phi` - Monic reduction polynomial of degree n
    ///
    /// # Returns
    /// * `Result<Self>` - Validated parameters or error
    ///
    /// Primality of `modulus` is not checked here since it needs randomness;
    /// see `validate_modulus`.
    pub fn new(degree: usize, modulus: BigInt, sigma: BigInt, phi: Polynomial) -> Result<Self> {
        if degree == 0 {
            return Err(RlweError::InvalidParameters(
                "Ring degree must be at least 1".to_string(),
            ));
        }

        // Reconciliation splits residues around (q - 1) / 2, which needs q odd.
        let two = BigInt::from(2);
        if modulus < BigInt::from(5) || (&modulus % &two).is_zero() {
            return Err(RlweError::InvalidModulus { modulus });
        }

        if sigma < BigInt::one() {
            return Err(RlweError::InvalidParameters(format!(
                "Noise standard deviation must be at least 1, got {}",
                sigma
            )));
        }

        let phi_degree = phi
            .coefficients()
            .iter()
            .rposition(|c| !c.is_zero())
            .unwrap_or(0);
        if phi_degree != degree {
            return Err(RlweError::InvalidDimension {
                expected: degree,
                got: phi_degree,
            });
        }
        if !phi.coefficients()[phi_degree].is_one() {
            return Err(RlweError::InvalidParameters(format!(
                "Reduction polynomial must be monic, leading coefficient is {}",
                phi.coefficients()[phi_degree]
            )));
        }

        Ok(Self {
            degree,
            modulus,
            sigma,
            phi,
        })
    }

    /// Parameters over `Z_q[x]/(x^n + 1)`
    pub fn cyclotomic(degree: usize, modulus: u64, sigma: u64) -> Result<Self> {
        Self::new(
            degree,
            BigInt::from(modulus),
            BigInt::from(sigma),
            Polynomial::cyclotomic(degree),
        )
    }

    /// The published SINGH parameter set
    pub fn singh() -> Self {
        Self {
            degree: SINGH_DEGREE,
            modulus: BigInt::from(SINGH_MODULUS),
            sigma: BigInt::from(SINGH_SIGMA),
            phi: Polynomial::cyclotomic(SINGH_DEGREE),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    pub fn sigma(&self) -> &BigInt {
        &self.sigma
    }

    pub fn phi(&self) -> &Polynomial {
        &self.phi
    }

    /// Parameter list `[q, sigma]` for the finite discrete Gaussian noise
    pub fn noise_parameters(&self) -> Vec<BigInt> {
        vec![self.modulus.clone(), self.sigma.clone()]
    }

    /// Checks that the modulus is prime with `rounds` Miller-Rabin rounds
    pub fn validate_modulus<R: RngCore + CryptoRng>(
        &self,
        sampler: &mut Sampler<R>,
        rounds: usize,
    ) -> Result<()> {
        if is_prime(&self.modulus, rounds, sampler)? {
            Ok(())
        } else {
            Err(RlweError::InvalidModulus {
                modulus: self.modulus.clone(),
            })
        }
    }

    /// Reduces `poly` into the ring: remainder modulo `phi`, then every
    /// coefficient into `[0, q)`
    pub fn reduce(&self, poly: &Polynomial) -> Result<Polynomial> {
        poly.mod_p(&self.phi)?.mod_z(&self.modulus)
    }

    /// Whether `poly` is a reduced ring element: exactly `degree`
    /// coefficients, each in `[0, q)`
    pub fn is_reduced(&self, poly: &Polynomial) -> bool {
        poly.coefficients().len() == self.degree
            && poly
                .coefficients()
                .iter()
                .all(|c| !c.is_negative() && c < &self.modulus)
    }
}
