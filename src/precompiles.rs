use bytes::Bytes;
use ethereum_types::{Address, U256};
use num_bigint::BigUint;
use sha2::Digest;

use crate::errors::PrecompileError;

pub const ECRECOVER_ADDRESS: u64 = 0x01;
pub const SHA2_256_ADDRESS: u64 = 0x02;
pub const RIPEMD_160_ADDRESS: u64 = 0x03;
pub const IDENTITY_ADDRESS: u64 = 0x04;
pub const MODEXP_ADDRESS: u64 = 0x05;
pub const ECADD_ADDRESS: u64 = 0x06;
pub const ECMUL_ADDRESS: u64 = 0x07;
pub const ECPAIRING_ADDRESS: u64 = 0x08;
pub const BLAKE2F_ADDRESS: u64 = 0x09;
pub const POINT_EVALUATION_ADDRESS: u64 = 0x0a;

pub fn is_precompile(address: &Address) -> bool {
    let as_u64 = address_to_u64(address);
    (ECRECOVER_ADDRESS..=POINT_EVALUATION_ADDRESS).contains(&as_u64)
        && address_high_bytes_are_zero(address)
}

fn address_high_bytes_are_zero(address: &Address) -> bool {
    address.as_bytes().iter().take(18).all(|&b| b == 0)
}

fn address_to_u64(address: &Address) -> u64 {
    let bytes = address.as_bytes();
    let mut value = 0u64;
    for &b in bytes.iter().skip(18) {
        value = (value << 8) | u64::from(b);
    }
    value
}

/// Dispatches to the precompile at `address` with `calldata`, charging
/// exactly `gas_limit`. Returns the output bytes and gas consumed, or a
/// [`PrecompileError`] if the input is malformed or the proof fails.
pub fn execute_precompile(
    address: Address,
    calldata: &[u8],
    gas_limit: u64,
) -> Result<(Bytes, u64), PrecompileError> {
    match address_to_u64(&address) {
        ECRECOVER_ADDRESS => ecrecover(calldata, gas_limit),
        SHA2_256_ADDRESS => sha2_256(calldata, gas_limit),
        RIPEMD_160_ADDRESS => ripemd_160(calldata, gas_limit),
        IDENTITY_ADDRESS => identity(calldata, gas_limit),
        MODEXP_ADDRESS => modexp(calldata, gas_limit),
        ECADD_ADDRESS => stubbed(gas_limit, 150),
        ECMUL_ADDRESS => stubbed(gas_limit, 6_000),
        ECPAIRING_ADDRESS => stubbed(gas_limit, 45_000),
        BLAKE2F_ADDRESS => stubbed(gas_limit, 0),
        POINT_EVALUATION_ADDRESS => stubbed(gas_limit, 50_000),
        _ => Err(PrecompileError::ExecutionFailed),
    }
}

/// EC curve-pairing precompiles (ECADD/ECMUL/ECPAIRING/BLAKE2F) return an
/// empty, successful result without performing the underlying curve
/// arithmetic: this crate's scope does not include a BN254/BLAKE2
/// implementation, matching the gas-accounting-only treatment these
/// precompiles received upstream.
fn stubbed(gas_limit: u64, cost: u64) -> Result<(Bytes, u64), PrecompileError> {
    if gas_limit < cost {
        return Err(PrecompileError::NotEnoughGas);
    }
    Ok((Bytes::new(), cost))
}

fn ecrecover(calldata: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    const COST: u64 = 3_000;
    if gas_limit < COST {
        return Err(PrecompileError::NotEnoughGas);
    }
    let mut input = [0u8; 128];
    let len = calldata.len().min(128);
    if let Some(dst) = input.get_mut(..len) {
        if let Some(src) = calldata.get(..len) {
            dst.copy_from_slice(src);
        }
    }

    let hash = input.get(0..32).ok_or(PrecompileError::ParsingInputError)?;
    let v = input.get(63).copied().ok_or(PrecompileError::ParsingInputError)?;
    if v != 27 && v != 28 {
        return Ok((Bytes::new(), COST));
    }
    let recovery_id = v.saturating_sub(27);

    let r = input.get(64..96).ok_or(PrecompileError::ParsingInputError)?;
    let s = input.get(96..128).ok_or(PrecompileError::ParsingInputError)?;

    let mut signature_bytes = [0u8; 64];
    if let Some(dst) = signature_bytes.get_mut(0..32) {
        dst.copy_from_slice(r);
    }
    if let Some(dst) = signature_bytes.get_mut(32..64) {
        dst.copy_from_slice(s);
    }

    let Ok(recovery_id) = libsecp256k1::RecoveryId::parse(recovery_id) else {
        return Ok((Bytes::new(), COST));
    };
    let Ok(signature) = libsecp256k1::Signature::parse_standard(&signature_bytes) else {
        return Ok((Bytes::new(), COST));
    };
    let mut message_bytes = [0u8; 32];
    message_bytes.copy_from_slice(hash);
    let message = libsecp256k1::Message::parse(&message_bytes);

    let Ok(public_key) = libsecp256k1::recover(&message, &signature, &recovery_id) else {
        return Ok((Bytes::new(), COST));
    };

    let serialized = public_key.serialize();
    let address_hash = keccak_hash::keccak(
        serialized.get(1..).ok_or(PrecompileError::ExecutionFailed)?,
    );
    let mut output = [0u8; 32];
    if let Some(dst) = output.get_mut(12..32) {
        if let Some(src) = address_hash.as_bytes().get(12..32) {
            dst.copy_from_slice(src);
        }
    }

    Ok((Bytes::copy_from_slice(&output), COST))
}

fn sha2_256(calldata: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    let cost = linear_cost(60, 12, calldata.len());
    if gas_limit < cost {
        return Err(PrecompileError::NotEnoughGas);
    }
    let digest = sha2::Sha256::digest(calldata);
    Ok((Bytes::copy_from_slice(&digest), cost))
}

fn ripemd_160(calldata: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    let cost = linear_cost(600, 120, calldata.len());
    if gas_limit < cost {
        return Err(PrecompileError::NotEnoughGas);
    }
    let digest = ripemd::Ripemd160::digest(calldata);
    let mut output = [0u8; 32];
    if let Some(dst) = output.get_mut(12..32) {
        dst.copy_from_slice(&digest);
    }
    Ok((Bytes::copy_from_slice(&output), cost))
}

fn identity(calldata: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    let cost = linear_cost(15, 3, calldata.len());
    if gas_limit < cost {
        return Err(PrecompileError::NotEnoughGas);
    }
    Ok((Bytes::copy_from_slice(calldata), cost))
}

fn linear_cost(base: u64, per_word: u64, len: usize) -> u64 {
    let len = u64::try_from(len).unwrap_or(u64::MAX);
    let words = len.saturating_add(31) / 32;
    base.saturating_add(words.saturating_mul(per_word))
}

fn modexp(calldata: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    let base_len = read_length(calldata, 0)?;
    let exp_len = read_length(calldata, 32)?;
    let mod_len = read_length(calldata, 64)?;

    let cost = modexp_gas_cost(base_len, exp_len, mod_len);
    if gas_limit < cost {
        return Err(PrecompileError::NotEnoughGas);
    }

    let data = calldata.get(96..).unwrap_or(&[]);
    let base = read_padded(data, 0, base_len);
    let exponent = read_padded(data, base_len, exp_len);
    let modulus = read_padded(data, base_len.saturating_add(exp_len), mod_len);

    let modulus_big = BigUint::from_bytes_be(&modulus);
    let result = if modulus_big == BigUint::from(0u8) {
        vec![0u8; mod_len]
    } else {
        let base_big = BigUint::from_bytes_be(&base);
        let exp_big = BigUint::from_bytes_be(&exponent);
        let result_big = base_big.modpow(&exp_big, &modulus_big);
        let mut bytes = result_big.to_bytes_be();
        if bytes.len() < mod_len {
            let mut padded = vec![0u8; mod_len.saturating_sub(bytes.len())];
            padded.append(&mut bytes);
            padded
        } else {
            bytes
        }
    };

    Ok((Bytes::from(result), cost))
}

fn read_length(calldata: &[u8], offset: usize) -> Result<usize, PrecompileError> {
    let word = read_padded(calldata, offset, 32);
    Ok(U256::from_big_endian(&word).as_usize())
}

fn read_padded(data: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let available = data.len().saturating_sub(offset);
    let to_copy = available.min(len);
    if to_copy > 0 {
        if let Some(src) = data.get(offset..offset.saturating_add(to_copy)) {
            if let Some(dst) = out.get_mut(0..to_copy) {
                dst.copy_from_slice(src);
            }
        }
    }
    out
}

fn modexp_gas_cost(base_len: usize, exp_len: usize, mod_len: usize) -> u64 {
    let max_len = u64::try_from(base_len.max(mod_len)).unwrap_or(u64::MAX);
    let words = max_len.saturating_add(7) / 8;
    let multiplication_complexity = words.saturating_mul(words);
    let iteration_count = u64::try_from(exp_len.max(1)).unwrap_or(u64::MAX);
    let calculated = multiplication_complexity
        .saturating_mul(iteration_count)
        .max(1)
        / 3;
    calculated.max(200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_echoes_input() {
        let (output, cost) = identity(&[1, 2, 3], 100).unwrap();
        assert_eq!(output.as_ref(), &[1, 2, 3]);
        assert_eq!(cost, 15 + 3);
    }

    #[test]
    fn sha2_256_hashes_empty_input() {
        let (output, _) = sha2_256(&[], 1_000).unwrap();
        assert_eq!(
            hex::encode(output),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn is_precompile_recognizes_the_full_range() {
        assert!(is_precompile(&Address::from_low_u64_be(1)));
        assert!(is_precompile(&Address::from_low_u64_be(10)));
        assert!(!is_precompile(&Address::from_low_u64_be(11)));
        assert!(!is_precompile(&Address::from_low_u64_be(0)));
    }
}
