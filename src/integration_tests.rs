//! End-to-end runs of the key exchange across modules
//!
//! Covers both parties running the full protocol over the SINGH set and
//! small rings, messages passing through their byte encoding, and
//! independent sessions running in parallel.

use num_bigint::BigInt;
use num_traits::Signed;
use rayon::prelude::*;
use crate::encode::{decode_polynomial, encode_polynomial};
use crate::error::RlweError;
use crate::exchange::{ResponderMessage, RlweContext, RlweKeyExchange, SharedKey};
use crate::params::{ExchangeParams, DEFAULT_PRIMALITY_ROUNDS};
use crate::polynomial::Polynomial;
use crate::sampler::Sampler;

/// Runs one exchange between two seeded parties, returning both keys
fn run_exchange(context: &RlweContext, seed: u64) -> (SharedKey, SharedKey) {
    let mut initiator = RlweKeyExchange::new(context.clone(), Sampler::seeded(2 * seed));
    let mut responder = RlweKeyExchange::new(context.clone(), Sampler::seeded(2 * seed + 1));

    let p_i = initiator.initiate().unwrap();
    let (message, responder_key) = responder.respond(&p_i).unwrap();
    let initiator_key = initiator.complete(&message).unwrap();
    (initiator_key, responder_key)
}

#[test]
fn test_small_ring_agreement_rate() {
    let params = ExchangeParams::cyclotomic(8, 7681, 4).unwrap();
    params
        .validate_modulus(&mut Sampler::seeded(7681), DEFAULT_PRIMALITY_ROUNDS)
        .unwrap();
    let context = RlweContext::from_seed(params, [3u8; 32]).unwrap();

    let trials = 1000;
    let agreed = (0..trials)
        .filter(|&trial| {
            let (initiator_key, responder_key) = run_exchange(&context, trial);
            initiator_key == responder_key
        })
        .count();

    assert!(agreed >= 990, "only {} of {} exchanges agreed", agreed, trials);
}

#[test]
fn test_singh_exchange() {
    let mut sampler = Sampler::seeded(1024);
    let context = RlweContext::singh(&mut sampler).unwrap();
    assert_eq!(context.basis().coefficients().len(), 1024);

    let (initiator_key, responder_key) = run_exchange(&context, 99);
    assert_eq!(initiator_key.len(), 1024);
    assert_eq!(initiator_key.to_bytes().len(), 128);
    assert_eq!(initiator_key, responder_key);

    // A 1024-bit key that is all zeros or all ones would mean the
    // reconciliation collapsed
    let ones = initiator_key.bits().iter().filter(|&&b| b == 1).count();
    assert!((256..768).contains(&ones), "{} ones", ones);
}

#[test]
fn test_exchange_over_wire() {
    let params = ExchangeParams::cyclotomic(32, 12289, 4).unwrap();
    let q = params.modulus().clone();
    let seed = [11u8; 32];

    // Both sides rebuild the same context from the shared seed
    let initiator_context = RlweContext::from_seed(params.clone(), seed).unwrap();
    let responder_context = RlweContext::from_seed(params, seed).unwrap();
    assert_eq!(initiator_context, responder_context);

    let mut initiator = RlweKeyExchange::new(initiator_context, Sampler::seeded(5));
    let mut responder = RlweKeyExchange::new(responder_context, Sampler::seeded(6));

    let message_one = encode_polynomial(&initiator.initiate().unwrap(), &q).unwrap();
    // 8 byte header plus 32 two-byte coefficients
    assert_eq!(message_one.len(), 8 + 32 * 2);

    let p_i = decode_polynomial(&message_one, &q).unwrap();
    let (response, responder_key) = responder.respond(&p_i).unwrap();

    let message_two = response.to_bytes(&q).unwrap();
    assert_eq!(message_two.len(), 8 + 32 * 2 + 4 + 4);

    let decoded = ResponderMessage::from_bytes(&message_two, &q).unwrap();
    assert_eq!(decoded, response);

    let initiator_key = initiator.complete(&decoded).unwrap();
    assert_eq!(initiator_key, responder_key);
}

#[test]
fn test_mismatched_degree_message_rejected() {
    let small = ExchangeParams::cyclotomic(8, 7681, 4).unwrap();
    let large = ExchangeParams::cyclotomic(16, 7681, 4).unwrap();

    let mut initiator = RlweKeyExchange::new(
        RlweContext::from_seed(small, [1u8; 32]).unwrap(),
        Sampler::seeded(1),
    );
    let mut responder = RlweKeyExchange::new(
        RlweContext::from_seed(large, [1u8; 32]).unwrap(),
        Sampler::seeded(2),
    );

    let p_i = initiator.initiate().unwrap();
    assert!(matches!(
        responder.respond(&p_i),
        Err(RlweError::InvalidMessage(_))
    ));
}

#[test]
fn test_parallel_sessions() {
    let params = ExchangeParams::cyclotomic(64, 7681, 4).unwrap();
    let context = RlweContext::from_seed(params, [42u8; 32]).unwrap();

    let results: Vec<bool> = (0..16u64)
        .into_par_iter()
        .map(|seed| {
            let (initiator_key, responder_key) = run_exchange(&context, 1000 + seed);
            initiator_key == responder_key
        })
        .collect();

    assert!(results.into_iter().all(|agreed| agreed));
}

#[test]
fn test_entropy_sessions_are_independent() {
    let params = ExchangeParams::cyclotomic(64, 7681, 4).unwrap();
    let context = RlweContext::from_seed(params, [9u8; 32]).unwrap();

    let mut first = RlweKeyExchange::with_entropy(context.clone()).unwrap();
    let mut second = RlweKeyExchange::with_entropy(context).unwrap();
    assert_ne!(first.initiate().unwrap(), second.initiate().unwrap());
}

#[test]
fn test_ring_noise_after_exchange() {
    // k_i and k_r differ by a small even error; check that directly
    let params = ExchangeParams::cyclotomic(16, 7681, 4).unwrap();
    let context = RlweContext::from_seed(params.clone(), [4u8; 32]).unwrap();
    let mut sampler = Sampler::seeded(77);

    let s_i = context.chi_alpha(&mut sampler).unwrap();
    let e_i = context.chi_alpha(&mut sampler).unwrap();
    let s_r = context.chi_alpha(&mut sampler).unwrap();
    let e_r = context.chi_alpha(&mut sampler).unwrap();
    let e_shared = context.chi_alpha(&mut sampler).unwrap();
    let two = BigInt::from(2);

    let p_i = params
        .reduce(&(&(context.basis() * &s_i) + &e_i.scalar_times(&two)))
        .unwrap();
    let p_r = params
        .reduce(&(&(context.basis() * &s_r) + &e_r.scalar_times(&two)))
        .unwrap();
    let k_r = params
        .reduce(&(&(&p_i * &s_r) + &e_shared.scalar_times(&two)))
        .unwrap();
    let k_i = params.reduce(&(&p_r * &s_i)).unwrap();

    let difference = params.reduce(&(&k_r - &k_i)).unwrap();
    let q = params.modulus();
    let half = (q - BigInt::from(1)) / &two;
    for c in difference.coefficients() {
        let centered = if c > &half { c - q } else { c.clone() };
        assert_eq!(&centered % &two, BigInt::from(0), "odd error {}", centered);
        assert!(centered.abs() < q / BigInt::from(4), "{}", centered);
    }

    let signal: Vec<u8> = k_r.coefficients().iter().map(|z| context.signal(z)).collect();
    for ((a, b), &w) in k_i.coefficients().iter().zip(k_r.coefficients()).zip(&signal) {
        assert_eq!(context.reconcile(a, w), context.reconcile(b, w));
    }

    assert_ne!(k_i, Polynomial::zero(15));
}
