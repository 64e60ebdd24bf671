//! Precompiled contracts 0x01 through 0x05 (ecrecover, sha256, ripemd160,
//! identity, modexp) with Byzantium gas rules. They are reached through the
//! ordinary call path; a precompile that cannot pay its gas fails the
//! sub-call like any other out-of-gas frame.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use malachite::base::num::arithmetic::traits::ModPow;
use malachite::base::num::basic::traits::Zero;
use malachite::base::num::conversion::traits::PowerOf2Digits;
use malachite::base::num::logic::traits::SignificantBits;
use malachite::Natural;
use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SECP256K1};
use sha2::{Digest, Sha256};
use uevm_common::constants::SECP256K1_ORDER;
use uevm_common::utils::keccak;

use crate::errors::{ExceptionalHalt, VMError};

pub const ECRECOVER_COST: u64 = 3000;
pub const SHA256_BASE_COST: u64 = 60;
pub const SHA256_WORD_COST: u64 = 12;
pub const RIPEMD160_BASE_COST: u64 = 600;
pub const RIPEMD160_WORD_COST: u64 = 120;
pub const IDENTITY_BASE_COST: u64 = 15;
pub const IDENTITY_WORD_COST: u64 = 3;
/// EIP-198 gas divisor.
pub const MODEXP_QUAD_DIVISOR: u128 = 20;

pub fn is_precompile(address: &Address) -> bool {
    let bytes = address.as_bytes();
    bytes[..19].iter().all(|byte| *byte == 0) && matches!(bytes[19], 1..=5)
}

/// Runs the precompile at `address`, returning its output and the gas it
/// consumed. Exceeding `gas_limit` is an out-of-gas failure.
pub fn execute_precompile(
    address: Address,
    calldata: &Bytes,
    gas_limit: u64,
) -> Result<(Bytes, u64), VMError> {
    match address.as_bytes()[19] {
        1 => ecrecover(calldata, gas_limit),
        2 => sha256(calldata, gas_limit),
        3 => ripemd160(calldata, gas_limit),
        4 => identity(calldata, gas_limit),
        5 => modexp(calldata, gas_limit),
        _ => Err(ExceptionalHalt::InvalidOpcode.into()),
    }
}

fn charge(cost: u64, gas_limit: u64) -> Result<u64, VMError> {
    if cost > gas_limit {
        return Err(ExceptionalHalt::OutOfGas.into());
    }
    Ok(cost)
}

fn word_cost(base: u64, per_word: u64, len: usize) -> u64 {
    base.saturating_add(per_word.saturating_mul(len.div_ceil(32) as u64))
}

/// Zero-padded view of `calldata[offset..offset + len]`.
fn right_padded(calldata: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if offset < calldata.len() {
        let available = (calldata.len() - offset).min(len);
        out[..available].copy_from_slice(&calldata[offset..offset + available]);
    }
    out
}

fn ecrecover(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas = charge(ECRECOVER_COST, gas_limit)?;

    let input = right_padded(calldata, 0, 128);
    let hash: [u8; 32] = input[..32].try_into().unwrap_or_default();
    let v = U256::from_big_endian(&input[32..64]);
    let r = U256::from_big_endian(&input[64..96]);
    let s = U256::from_big_endian(&input[96..128]);

    // Invalid inputs yield empty output, not a failure.
    let order = U256::from_big_endian(&SECP256K1_ORDER);
    if (v != U256::from(27) && v != U256::from(28))
        || r.is_zero()
        || s.is_zero()
        || r >= order
        || s >= order
    {
        return Ok((Bytes::new(), gas));
    }

    let mut compact = [0u8; 64];
    compact[..64].copy_from_slice(&input[64..128]);
    let Ok(recovery_id) = RecoveryId::from_i32(v.low_u64() as i32 - 27) else {
        return Ok((Bytes::new(), gas));
    };
    let Ok(signature) = RecoverableSignature::from_compact(&compact, recovery_id) else {
        return Ok((Bytes::new(), gas));
    };
    let Ok(public_key) = SECP256K1.recover_ecdsa(&Message::from_digest(hash), &signature) else {
        return Ok((Bytes::new(), gas));
    };

    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&keccak(&public_key.serialize_uncompressed()[1..]).0[12..]);
    Ok((Bytes::copy_from_slice(&output), gas))
}

fn sha256(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas = charge(
        word_cost(SHA256_BASE_COST, SHA256_WORD_COST, calldata.len()),
        gas_limit,
    )?;
    let hash = Sha256::digest(calldata);
    Ok((Bytes::copy_from_slice(&hash), gas))
}

fn ripemd160(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas = charge(
        word_cost(RIPEMD160_BASE_COST, RIPEMD160_WORD_COST, calldata.len()),
        gas_limit,
    )?;
    let hash = Ripemd160::digest(calldata);
    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&hash);
    Ok((Bytes::copy_from_slice(&output), gas))
}

fn identity(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let gas = charge(
        word_cost(IDENTITY_BASE_COST, IDENTITY_WORD_COST, calldata.len()),
        gas_limit,
    )?;
    Ok((calldata.clone(), gas))
}

fn modexp(calldata: &Bytes, gas_limit: u64) -> Result<(Bytes, u64), VMError> {
    let base_len = read_length(calldata, 0)?;
    let exp_len = read_length(calldata, 32)?;
    let mod_len = read_length(calldata, 64)?;

    let gas = charge(modexp_gas(calldata, base_len, exp_len, mod_len), gas_limit)?;

    if mod_len == 0 {
        return Ok((Bytes::new(), gas));
    }

    let base = natural_from_be(&right_padded(calldata, 96, base_len));
    let exponent = natural_from_be(&right_padded(calldata, 96 + base_len, exp_len));
    let modulus = natural_from_be(&right_padded(calldata, 96 + base_len + exp_len, mod_len));

    let result = if modulus == Natural::ZERO {
        Natural::ZERO
    } else {
        base.mod_pow(exponent, modulus)
    };

    let digits: Vec<u8> = result.to_power_of_2_digits_desc(8);
    let mut output = vec![0u8; mod_len];
    let start = mod_len - digits.len();
    output[start..].copy_from_slice(&digits);
    Ok((Bytes::from(output), gas))
}

fn read_length(calldata: &Bytes, offset: usize) -> Result<usize, VMError> {
    let word = U256::from_big_endian(&right_padded(calldata, offset, 32));
    if word.bits() > 32 {
        // Lengths this large can never be paid for.
        return Err(ExceptionalHalt::OutOfGas.into());
    }
    Ok(word.low_u64() as usize)
}

fn natural_from_be(bytes: &[u8]) -> Natural {
    Natural::from_power_of_2_digits_desc(8, bytes.iter().copied().map(u64::from))
        .unwrap_or(Natural::ZERO)
}

/// EIP-198: floor(mult_complexity(max(base_len, mod_len)) ·
/// max(adjusted_exp_len, 1) / 20), saturating into u64.
fn modexp_gas(calldata: &Bytes, base_len: usize, exp_len: usize, mod_len: usize) -> u64 {
    let max_len = base_len.max(mod_len) as u128;
    let complexity = mult_complexity(max_len);

    let exp_head = natural_from_be(&right_padded(calldata, 96 + base_len, exp_len.min(32)));
    let head_bits = (exp_head.significant_bits() as u128).saturating_sub(1);
    let adjusted_exp_len = if exp_len <= 32 {
        head_bits
    } else {
        8 * (exp_len as u128 - 32) + head_bits
    };

    let gas = complexity
        .saturating_mul(adjusted_exp_len.max(1))
        / MODEXP_QUAD_DIVISOR;
    gas.min(u64::MAX as u128) as u64
}

fn mult_complexity(x: u128) -> u128 {
    if x <= 64 {
        x * x
    } else if x <= 1024 {
        x * x / 4 + 96 * x - 3072
    } else {
        let squared = x.saturating_mul(x);
        squared / 16 + 480 * x - 199_680
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use secp256k1::SecretKey;

    fn address(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from_slice(&bytes)
    }

    #[test]
    fn precompile_range_is_one_through_five() {
        assert!(is_precompile(&address(1)));
        assert!(is_precompile(&address(5)));
        assert!(!is_precompile(&address(0)));
        assert!(!is_precompile(&address(6)));
        assert!(!is_precompile(&Address::repeat_byte(1)));
    }

    #[test]
    fn identity_returns_its_input() {
        let data = Bytes::from_static(b"hello world");
        let (output, gas) = execute_precompile(address(4), &data, 100_000).unwrap();
        assert_eq!(output, data);
        assert_eq!(gas, 15 + 3);
    }

    #[test]
    fn insufficient_gas_is_out_of_gas() {
        let data = Bytes::from_static(b"x");
        assert!(execute_precompile(address(4), &data, 17).is_err());
    }

    #[test]
    fn sha256_known_vector() {
        let (output, _) =
            execute_precompile(address(2), &Bytes::from_static(b"abc"), 100_000).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn ripemd160_is_left_padded_to_a_word() {
        let (output, _) =
            execute_precompile(address(3), &Bytes::new(), 100_000).unwrap();
        assert_eq!(output.len(), 32);
        assert_eq!(&output[..12], &[0u8; 12]);
        assert_eq!(
            &output[12..],
            hex!("9c1185a5c5e9fc54612808977ee8f548b2258d31")
        );
    }

    #[test]
    fn ecrecover_roundtrip() {
        let secret_key = SecretKey::from_slice(&[0x42u8; 32]).unwrap();
        let public_key = secp256k1::PublicKey::from_secret_key(SECP256K1, &secret_key);
        let expected = &keccak(&public_key.serialize_uncompressed()[1..]).0[12..];

        let digest = keccak(b"message").0;
        let signature =
            SECP256K1.sign_ecdsa_recoverable(&Message::from_digest(digest), &secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut input = Vec::with_capacity(128);
        input.extend_from_slice(&digest);
        let mut v = [0u8; 32];
        v[31] = 27 + recovery_id.to_i32() as u8;
        input.extend_from_slice(&v);
        input.extend_from_slice(&compact);

        let (output, gas) =
            execute_precompile(address(1), &Bytes::from(input), 100_000).unwrap();
        assert_eq!(gas, 3000);
        assert_eq!(&output[12..], expected);
    }

    #[test]
    fn ecrecover_with_a_bad_v_is_empty() {
        let input = vec![0u8; 128];
        let (output, _) =
            execute_precompile(address(1), &Bytes::from(input), 100_000).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn modexp_small_vector() {
        // 3^2 mod 5 = 4, one byte each.
        let mut input = Vec::new();
        for len in [1u8, 1, 1] {
            let mut word = [0u8; 32];
            word[31] = len;
            input.extend_from_slice(&word);
        }
        input.extend_from_slice(&[3, 2, 5]);
        let (output, _) =
            execute_precompile(address(5), &Bytes::from(input), 100_000).unwrap();
        assert_eq!(output.as_ref(), &[4]);
    }

    #[test]
    fn modexp_with_zero_modulus_returns_zeros() {
        let mut input = Vec::new();
        for len in [0u8, 0, 2] {
            let mut word = [0u8; 32];
            word[31] = len;
            input.extend_from_slice(&word);
        }
        let (output, _) =
            execute_precompile(address(5), &Bytes::from(input), 100_000).unwrap();
        assert_eq!(output.as_ref(), &[0, 0]);
    }
}
