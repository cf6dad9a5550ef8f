//! Two-party Ring-LWE key exchange with Ding-style reconciliation
//!
//! Protocol over `R_q = Z_q[x]/(phi(x))` with a public basis `a`:
//!
//! 1. Initiator draws `s_i, e_i` and sends `p_i = a * s_i + 2 * e_i`
//! 2. Responder draws `s_r, e_r, e'_r`, sends `p_r = a * s_r + 2 * e_r` and
//!    the signal of `k_r = p_i * s_r + 2 * e'_r`
//! 3. Initiator computes `k_i = p_r * s_i`
//!
//! `k_i` and `k_r` differ by `2 * (e_i * s_r + e'_r - e_r * s_i)`, a small
//! even error. The responder's signal bit per coefficient says whether
//! `k_r` sits in the central region `E = [-floor(q/4), round(q/4)]`. Both
//! parties shift their value by `signal * (q - 1) / 2` so it lands near
//! zero, then take its parity; a small even error cannot change the parity
//! unless it pushes a value across `+-q/2`.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use num_bigint::BigInt;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use rand_chacha::ChaCha20Rng;
use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};
use crate::error::{Result, RlweError};
use crate::params::ExchangeParams;
use crate::polynomial::Polynomial;
use crate::sampler::{DistributionKind, Sampler};

/// Public state shared by both parties: parameters and the basis `a`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RlweContext {
    params: ExchangeParams,
    basis: Polynomial,

    /// (q - 1) / 2
    half_modulus: BigInt,

    /// Bounds of the central region E in centered representation
    region_lower: BigInt,
    region_upper: BigInt,
}

impl RlweContext {
    /// Creates a context from an explicit public basis
    ///
    /// The basis is reduced into the ring before use, so any polynomial that
    /// represents the intended ring element is accepted.
    pub fn new(basis: Polynomial, params: ExchangeParams) -> Result<Self> {
        let basis = params.reduce(&basis)?;
        Ok(Self::with_reduced_basis(basis, params))
    }

    /// Creates a context whose basis is drawn as a noise polynomial
    pub fn generate<R: RngCore + CryptoRng>(
        params: ExchangeParams,
        sampler: &mut Sampler<R>,
    ) -> Result<Self> {
        let basis = noise_polynomial(&params, sampler)?;
        Ok(Self::with_reduced_basis(basis, params))
    }

    /// Context over the published SINGH parameters with a freshly drawn basis
    pub fn singh<R: RngCore + CryptoRng>(sampler: &mut Sampler<R>) -> Result<Self> {
        Self::generate(ExchangeParams::singh(), sampler)
    }

    /// Derives the basis reproducibly from a 32-byte seed, so both parties
    /// can rebuild the same context from the seed alone
    pub fn from_seed(params: ExchangeParams, seed: [u8; 32]) -> Result<Self> {
        let mut sampler = Sampler::from_seed(seed);
        Self::generate(params, &mut sampler)
    }

    fn with_reduced_basis(basis: Polynomial, params: ExchangeParams) -> Self {
        let q = params.modulus();
        let two = BigInt::from(2);
        let four = BigInt::from(4);

        let half_modulus = (q - BigInt::one()) / &two;
        let quarter = q / &four;
        let region_lower = -quarter.clone();
        let region_upper = if q % &four >= two {
            quarter + BigInt::one()
        } else {
            quarter
        };

        Self {
            params,
            basis,
            half_modulus,
            region_lower,
            region_upper,
        }
    }

    pub fn params(&self) -> &ExchangeParams {
        &self.params
    }

    pub fn basis(&self) -> &Polynomial {
        &self.basis
    }

    pub fn phi(&self) -> &Polynomial {
        self.params.phi()
    }

    /// Draws a noise polynomial: finite discrete Gaussian coefficients with
    /// limit q and the configured deviation, reduced into the ring
    pub fn chi_alpha<R: RngCore + CryptoRng>(&self, sampler: &mut Sampler<R>) -> Result<Polynomial> {
        noise_polynomial(&self.params, sampler)
    }

    /// Signal bit of `z`: 0 if its centered residue lies in E, 1 otherwise
    pub fn signal(&self, z: &BigInt) -> u8 {
        let centered = self.centered(z);
        let in_region = centered >= self.region_lower && centered <= self.region_upper;
        u8::from(!in_region)
    }

    /// Agreed bit for `z` given the responder's signal bit
    ///
    /// Computes the parity of the centered residue of
    /// `z + signal * (q - 1) / 2`.
    pub fn reconcile(&self, z: &BigInt, signal: u8) -> u8 {
        let two = BigInt::from(2);
        let shifted = z + &self.half_modulus * BigInt::from(signal);
        let centered = self.centered(&shifted);
        let parity = ((&centered % &two) + &two) % &two;
        u8::from(!parity.is_zero())
    }

    /// Representative of `z` in `[-(q - 1) / 2, (q - 1) / 2]`
    fn centered(&self, z: &BigInt) -> BigInt {
        let q = self.params.modulus();
        let residue = ((z % q) + q) % q;
        if residue > self.half_modulus {
            residue - q
        } else {
            residue
        }
    }

    /// `a * secret + 2 * error`, reduced into the ring
    fn public_value(&self, secret: &Polynomial, error: &Polynomial) -> Result<Polynomial> {
        let masked = Zeroizing::new(self.basis.times(secret));
        self.params
            .reduce(&masked.plus(&error.scalar_times(&BigInt::from(2))))
    }

    fn validate_public(&self, public: &Polynomial) -> Result<()> {
        if self.params.is_reduced(public) {
            Ok(())
        } else {
            Err(RlweError::InvalidMessage(format!(
                "Public value must have {} coefficients in [0, {})",
                self.params.degree(),
                self.params.modulus()
            )))
        }
    }

    fn validate_signal(&self, signal: &ReconciliationSignal) -> Result<()> {
        if signal.len() != self.params.degree() {
            return Err(RlweError::InvalidMessage(format!(
                "Signal must have {} bits, got {}",
                self.params.degree(),
                signal.len()
            )));
        }
        Ok(())
    }
}

fn noise_polynomial<R: RngCore + CryptoRng>(
    params: &ExchangeParams,
    sampler: &mut Sampler<R>,
) -> Result<Polynomial> {
    let noise = Polynomial::random(
        params.degree() - 1,
        &params.noise_parameters(),
        DistributionKind::FiniteDiscreteGaussian,
        sampler,
    )?;
    params.reduce(&noise)
}

/// Per-coefficient reconciliation bits sent by the responder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationSignal {
    bits: Vec<u8>,
}

impl ReconciliationSignal {
    /// # Returns
    /// * `Result<Self>` - Signal or `InvalidMessage` if any entry is not 0 or 1
    pub fn new(bits: Vec<u8>) -> Result<Self> {
        if let Some(position) = bits.iter().position(|&b| b > 1) {
            return Err(RlweError::InvalidMessage(format!(
                "Signal bit at position {} is {}, expected 0 or 1",
                position, bits[position]
            )));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

/// Message 2: the responder's public value and reconciliation signal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponderMessage {
    pub public: Polynomial,
    pub signal: ReconciliationSignal,
}

/// Agreed key material, one bit per ring coefficient
///
/// Cleared on drop. Equality runs in constant time for keys of equal length.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey {
    bits: Vec<u8>,
}

impl SharedKey {
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Packs the bits LSB-first into bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| byte | (bit << i))
            })
            .collect()
    }
}

impl ConstantTimeEq for SharedKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.bits.as_slice().ct_eq(other.bits.as_slice())
    }
}

impl PartialEq for SharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for SharedKey {}

impl Debug for SharedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SharedKey")
            .field("len", &self.bits.len())
            .field("bits", &"<redacted>")
            .finish()
    }
}

/// Observable progress of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    Initiated,
    Responded,
    Completed,
}

enum SessionState {
    Created,
    Initiated(Zeroizing<Polynomial>),
    Responded,
    Completed,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        match self {
            SessionState::Created => SessionStatus::Created,
            SessionState::Initiated(_) => SessionStatus::Initiated,
            SessionState::Responded => SessionStatus::Responded,
            SessionState::Completed => SessionStatus::Completed,
        }
    }
}

/// One party's side of a key exchange session
///
/// The same type plays either role: an initiator calls `initiate` then
/// `complete`, a responder calls `respond` once. Secret polynomials are owned
/// by the session and wiped as soon as the shared key is derived.
pub struct RlweKeyExchange<R = ChaCha20Rng> {
    context: RlweContext,
    sampler: Sampler<R>,
    state: SessionState,
}

impl<R> Debug for RlweKeyExchange<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RlweKeyExchange")
            .field("context", &self.context)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl RlweKeyExchange<ChaCha20Rng> {
    /// Creates a session whose sampler is freshly seeded from the secure
    /// generator
    pub fn with_entropy(context: RlweContext) -> Result<Self> {
        Ok(Self::new(context, Sampler::from_entropy()?))
    }
}

impl<R: RngCore + CryptoRng> RlweKeyExchange<R> {
    pub fn new(context: RlweContext, sampler: Sampler<R>) -> Self {
        Self {
            context,
            sampler,
            state: SessionState::Created,
        }
    }

    pub fn context(&self) -> &RlweContext {
        &self.context
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// Starts a session as initiator and returns `p_i` for the responder
    ///
    /// Calling this again before `complete` abandons the earlier session and
    /// wipes its secret.
    ///
    /// # Returns
    /// * `Result<Polynomial>` - Public value `p_i`, or `ProtocolMisuse` if this
    ///   session already responded or completed
    pub fn initiate(&mut self) -> Result<Polynomial> {
        match self.state {
            SessionState::Created | SessionState::Initiated(_) => {}
            SessionState::Responded => {
                return Err(RlweError::ProtocolMisuse(
                    "initiate called on a responder session".to_string(),
                ))
            }
            SessionState::Completed => {
                return Err(RlweError::ProtocolMisuse(
                    "initiate called on a completed session".to_string(),
                ))
            }
        }

        let secret = Zeroizing::new(self.context.chi_alpha(&mut self.sampler)?);
        let error = Zeroizing::new(self.context.chi_alpha(&mut self.sampler)?);
        let public = self.context.public_value(&secret, &error)?;

        self.state = SessionState::Initiated(secret);
        Ok(public)
    }

    /// Answers an initiator's `p_i`
    ///
    /// # Arguments
    /// * `initiator_public` - The initiator's `p_i`
    ///
    /// # Returns
    /// * `Result<(ResponderMessage, SharedKey)>` - Message 2 for the initiator
    ///   and the responder's shared key, `InvalidMessage` if `p_i` is not a
    ///   reduced ring element, or `ProtocolMisuse` if this session was used
    ///   before
    pub fn respond(&mut self, initiator_public: &Polynomial) -> Result<(ResponderMessage, SharedKey)> {
        match self.state {
            SessionState::Created => {}
            SessionState::Initiated(_) => {
                return Err(RlweError::ProtocolMisuse(
                    "respond called on an initiator session".to_string(),
                ))
            }
            SessionState::Responded | SessionState::Completed => {
                return Err(RlweError::ProtocolMisuse(
                    "respond called on a finished session".to_string(),
                ))
            }
        }
        self.context.validate_public(initiator_public)?;

        let secret = Zeroizing::new(self.context.chi_alpha(&mut self.sampler)?);
        let error = Zeroizing::new(self.context.chi_alpha(&mut self.sampler)?);
        let shared_error = Zeroizing::new(self.context.chi_alpha(&mut self.sampler)?);

        let public = self.context.public_value(&secret, &error)?;

        let product = Zeroizing::new(initiator_public.times(&secret));
        let raw = Zeroizing::new(
            self.context
                .params
                .reduce(&product.plus(&shared_error.scalar_times(&BigInt::from(2))))?,
        );

        let signal_bits: Vec<u8> = raw
            .coefficients()
            .iter()
            .map(|z| self.context.signal(z))
            .collect();
        let key_bits = raw
            .coefficients()
            .iter()
            .zip(&signal_bits)
            .map(|(z, &w)| self.context.reconcile(z, w))
            .collect();

        self.state = SessionState::Responded;
        Ok((
            ResponderMessage {
                public,
                signal: ReconciliationSignal { bits: signal_bits },
            },
            SharedKey { bits: key_bits },
        ))
    }

    /// Finishes an initiated session with the responder's message
    ///
    /// The message is validated before the session is touched, so a malformed
    /// message leaves the session initiated.
    ///
    /// # Returns
    /// * `Result<SharedKey>` - The initiator's shared key
    pub fn complete(&mut self, response: &ResponderMessage) -> Result<SharedKey> {
        match self.state {
            SessionState::Initiated(_) => {}
            SessionState::Created => {
                return Err(RlweError::ProtocolMisuse(
                    "complete called before initiate".to_string(),
                ))
            }
            SessionState::Responded => {
                return Err(RlweError::ProtocolMisuse(
                    "complete called on a responder session".to_string(),
                ))
            }
            SessionState::Completed => {
                return Err(RlweError::ProtocolMisuse(
                    "complete called on a completed session".to_string(),
                ))
            }
        }
        self.context.validate_public(&response.public)?;
        self.context.validate_signal(&response.signal)?;

        let secret = match std::mem::replace(&mut self.state, SessionState::Completed) {
            SessionState::Initiated(secret) => secret,
            other => {
                self.state = other;
                return Err(RlweError::ProtocolMisuse(
                    "complete called outside an initiated session".to_string(),
                ));
            }
        };

        let raw = Zeroizing::new(
            self.context
                .params
                .reduce(&response.public.times(&secret))?,
        );
        let key_bits = raw
            .coefficients()
            .iter()
            .zip(response.signal.bits())
            .map(|(z, &w)| self.context.reconcile(z, w))
            .collect();

        Ok(SharedKey { bits: key_bits })
    }
}
