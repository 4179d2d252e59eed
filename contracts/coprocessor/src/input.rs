//! Input ciphertext wire format and proof binding.
//!
//! Clients seal a plaintext value into an input ciphertext together with a
//! proof binding it to the consuming contract and the submitting user.
//!
//! **Ciphertext layout (37 bytes):**
//! ```text
//! [0..1)    type_tag     : 0 = Bool, 1 = Uint8, 2 = Uint16
//! [1..33)   nonce        : 32 bytes chosen by the client
//! [33..37)  masked_value : value_be4 XOR keccak256("RPSK" || input_key || nonce)[0..4]
//! ```
//!
//! **Proof:**
//! ```text
//! proof = keccak256("RPSI" || ciphertext || contract_address || user_address)
//! ```
//!
//! A ciphertext replayed by a different user, or submitted to a different
//! contract, fails the proof check.

use soroban_sdk::{Address, Bytes, BytesN, Env};

use crate::{CoprocessorError, ValueType};

pub const CIPHERTEXT_LEN: u32 = 37;

const NONCE_OFFSET: u32 = 1;
const VALUE_OFFSET: u32 = 33;

/// Domain separator for input proofs: ASCII "RPSI" = 0x52505349
const INPUT_PROOF_TAG: [u8; 4] = [0x52, 0x50, 0x53, 0x49];

/// Domain separator for keystream derivation: ASCII "RPSK" = 0x5250534B
const KEYSTREAM_TAG: [u8; 4] = [0x52, 0x50, 0x53, 0x4B];

/// Seal `value` as an input ciphertext of type `value_type` for `user`
/// submitting through `contract`. Mirrors the client-side SDK.
pub fn seal_input(
    env: &Env,
    input_key: &BytesN<32>,
    contract: &Address,
    user: &Address,
    value_type: ValueType,
    value: u32,
    nonce: &BytesN<32>,
) -> (Bytes, BytesN<32>) {
    let nonce_arr = nonce.to_array();
    let stream = keystream(env, input_key, &nonce_arr);
    let plain = value.to_be_bytes();
    let mut masked = [0u8; 4];
    let mut i = 0usize;
    while i < 4 {
        masked[i] = plain[i] ^ stream[i];
        i += 1;
    }

    let mut ciphertext = Bytes::new(env);
    ciphertext.push_back(value_type.tag());
    ciphertext.append(&Bytes::from_array(env, &nonce_arr));
    ciphertext.append(&Bytes::from_array(env, &masked));

    let proof = input_proof(env, &ciphertext, contract, user);
    (ciphertext, proof)
}

/// Compute the proof binding `ciphertext` to `contract` and `user`.
pub fn input_proof(
    env: &Env,
    ciphertext: &Bytes,
    contract: &Address,
    user: &Address,
) -> BytesN<32> {
    let mut pre = Bytes::from_array(env, &INPUT_PROOF_TAG);
    pre.append(ciphertext);
    pre.append(&contract.to_string().to_bytes());
    pre.append(&user.to_string().to_bytes());
    env.crypto().keccak256(&pre).into()
}

/// Decode a proven input ciphertext into its type and raw value.
///
/// The value is returned unmasked to width; callers truncate it.
pub(crate) fn open_input(
    env: &Env,
    input_key: &BytesN<32>,
    ciphertext: &Bytes,
) -> Result<(ValueType, u32), CoprocessorError> {
    if ciphertext.len() != CIPHERTEXT_LEN {
        return Err(CoprocessorError::MalformedCiphertext);
    }

    let tag = ciphertext.get(0).ok_or(CoprocessorError::MalformedCiphertext)?;
    let value_type = match ValueType::from_tag(tag) {
        Some(ValueType::Identity) | None => return Err(CoprocessorError::UnsupportedType),
        Some(ty) => ty,
    };

    let mut nonce = [0u8; 32];
    let mut i = 0usize;
    while i < 32 {
        nonce[i] = ciphertext.get(NONCE_OFFSET + i as u32).unwrap_or(0);
        i += 1;
    }

    let stream = keystream(env, input_key, &nonce);
    let mut value: u32 = 0;
    i = 0;
    while i < 4 {
        let masked = ciphertext.get(VALUE_OFFSET + i as u32).unwrap_or(0);
        value = (value << 8) | (masked ^ stream[i]) as u32;
        i += 1;
    }

    Ok((value_type, value))
}

fn keystream(env: &Env, input_key: &BytesN<32>, nonce: &[u8; 32]) -> [u8; 4] {
    let mut pre = Bytes::from_array(env, &KEYSTREAM_TAG);
    pre.append(&Bytes::from_array(env, &input_key.to_array()));
    pre.append(&Bytes::from_array(env, nonce));
    let digest: BytesN<32> = env.crypto().keccak256(&pre).into();
    let d = digest.to_array();
    [d[0], d[1], d[2], d[3]]
}
