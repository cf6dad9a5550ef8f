pub mod encode;
pub mod error;
pub mod exchange;
pub mod params;
pub mod polynomial;
pub mod primality;
pub mod sampler;

#[cfg(test)]
mod integration_tests;

pub use encode::{decode_polynomial, encode_polynomial};
pub use error::{Result, RlweError};
pub use exchange::{
    ReconciliationSignal, ResponderMessage, RlweContext, RlweKeyExchange, SessionStatus,
    SharedKey,
};
pub use params::{
    ExchangeParams, DEFAULT_PRIMALITY_ROUNDS, SINGH_DEGREE, SINGH_MODULUS, SINGH_SIGMA,
};
pub use polynomial::Polynomial;
pub use primality::is_prime;
pub use sampler::{DistributionKind, Sampler};

/// Validate the parameters and draw a fresh public basis.
/// The modulus must pass `DEFAULT_PRIMALITY_ROUNDS` rounds of Miller-Rabin.
pub fn setup_exchange(params: ExchangeParams) -> Result<RlweContext> {
    let mut sampler = Sampler::from_entropy()?;
    params.validate_modulus(&mut sampler, DEFAULT_PRIMALITY_ROUNDS)?;
    RlweContext::generate(params, &mut sampler)
}

/// Start a session over `context` with its own freshly seeded sampler.
pub fn new_session(context: &RlweContext) -> Result<RlweKeyExchange> {
    RlweKeyExchange::with_entropy(context.clone())
}
