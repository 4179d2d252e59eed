#![no_std]

//! # Confidential Value Coprocessor (software model)
//!
//! Reference model of the coprocessor consumed by the Rock-Paper-Scissors
//! engine. It hands out opaque handles to typed values, keeps a per-handle
//! access-control list, and evaluates the homomorphic primitives the engine
//! is allowed to use.
//!
//! | Primitive       | Operands                  | Result type        |
//! |-----------------|---------------------------|--------------------|
//! | `bit_and/or`    | handle, handle or scalar  | type of `lhs`      |
//! | `bit_not`       | handle                    | type of operand    |
//! | `shl`           | integer handle, amount    | type of `lhs`      |
//! | `equal/not_eq.` | handle, handle or scalar  | `Bool`             |
//! | `select`        | `Bool` handle, two handles| type of branches   |
//!
//! ## Access control
//!
//! A grant is an edge `(handle, principal)`; edges are only ever added.
//! - Every produced handle is granted to its producer.
//! - Computing on a handle requires an `Account` grant for the caller.
//!   A `Public` grant never authorizes computation.
//! - Decrypting requires a grant for the reader or a `Public` grant.
//! - Only a current holder may extend a grant to another principal.
//!
//! Values live in contract storage. This model exists so the engine can be
//! exercised end to end; it provides no confidentiality against the host.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, Address, Bytes,
    BytesN, Env,
};

mod input;

pub use input::{input_proof, seal_input, CIPHERTEXT_LEN};

/// Opaque reference to a stored value.
pub type Handle = u32;

// ═══════════════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ValueType {
    Bool = 0,
    Uint8 = 1,
    Uint16 = 2,
    Identity = 3,
}

impl ValueType {
    pub fn tag(self) -> u8 {
        self as u32 as u8
    }

    pub fn from_tag(tag: u8) -> Option<ValueType> {
        match tag {
            0 => Some(ValueType::Bool),
            1 => Some(ValueType::Uint8),
            2 => Some(ValueType::Uint16),
            3 => Some(ValueType::Identity),
            _ => None,
        }
    }

    fn width_mask(self) -> u32 {
        match self {
            ValueType::Bool => 0x1,
            ValueType::Uint8 => 0xFF,
            ValueType::Uint16 => 0xFFFF,
            ValueType::Identity => 0,
        }
    }

    fn bit_width(self) -> u32 {
        match self {
            ValueType::Bool => 1,
            ValueType::Uint8 => 8,
            ValueType::Uint16 => 16,
            ValueType::Identity => 0,
        }
    }
}

/// Decrypted content of a handle.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Plaintext {
    Bool(bool),
    Uint8(u32),
    Uint16(u32),
    Identity(Address),
    ZeroIdentity,
}

impl Plaintext {
    pub fn value_type(&self) -> ValueType {
        match self {
            Plaintext::Bool(_) => ValueType::Bool,
            Plaintext::Uint8(_) => ValueType::Uint8,
            Plaintext::Uint16(_) => ValueType::Uint16,
            Plaintext::Identity(_) | Plaintext::ZeroIdentity => ValueType::Identity,
        }
    }

    /// Numeric view of the value; `None` for identities.
    fn bits(&self) -> Option<u32> {
        match self {
            Plaintext::Bool(b) => Some(*b as u32),
            Plaintext::Uint8(v) | Plaintext::Uint16(v) => Some(*v),
            Plaintext::Identity(_) | Plaintext::ZeroIdentity => None,
        }
    }

    fn from_bits(value_type: ValueType, bits: u32) -> Option<Plaintext> {
        let bits = bits & value_type.width_mask();
        match value_type {
            ValueType::Bool => Some(Plaintext::Bool(bits != 0)),
            ValueType::Uint8 => Some(Plaintext::Uint8(bits)),
            ValueType::Uint16 => Some(Plaintext::Uint16(bits)),
            ValueType::Identity => None,
        }
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Principal {
    Account(Address),
    /// Anyone may decrypt.
    Public,
}

/// Right-hand operand of a binary primitive.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    Cipher(u32),
    Scalar(u32),
}

#[derive(Copy, Clone)]
enum BitOp {
    And,
    Or,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Error codes
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum CoprocessorError {
    ProofInvalid = 1,
    PermissionDenied = 2,
    HandleNotFound = 3,
    TypeMismatch = 4,
    MalformedCiphertext = 5,
    UnsupportedType = 6,
    InputKeyNotSet = 7,
    AdminNotSet = 8,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvInputAccepted {
    pub handle: u32,
    pub value_type: ValueType,
}

/// Emitted once a handle becomes publicly decryptable.
#[contractevent]
pub struct EvMadePublic {
    pub handle: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Storage
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone)]
enum CoKey {
    Admin,
    InputKey,
    HandleCount,
    Value(u32),
    Grant(u32, Principal),
}

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// Handles and grants back games that are never deleted: 120 days, bumped on use
const HANDLE_TTL_SECONDS: u32 = 120 * 24 * 60 * 60;
const HANDLE_TTL_LEDGERS: u32 = HANDLE_TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct ConfidentialCoprocessor;

#[contractimpl]
impl ConfidentialCoprocessor {
    pub fn __constructor(env: Env, admin: Address, input_key: BytesN<32>) {
        env.storage().instance().set(&CoKey::Admin, &admin);
        env.storage().instance().set(&CoKey::InputKey, &input_key);
        env.storage().instance().set(&CoKey::HandleCount, &0u32);
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Handle production
    // ───────────────────────────────────────────────────────────────────────────

    /// Verify a client input ciphertext and import it as a new handle owned
    /// by `caller`. The proof must bind the ciphertext to `caller` (the
    /// consuming contract) and `user` (the submitter), and the ciphertext must
    /// carry `expected_type`.
    pub fn from_external(
        env: Env,
        caller: Address,
        user: Address,
        ciphertext: Bytes,
        proof: BytesN<32>,
        expected_type: ValueType,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();

        if input::input_proof(&env, &ciphertext, &caller, &user) != proof {
            log!(&env, "input proof rejected", user);
            return Err(CoprocessorError::ProofInvalid);
        }

        let input_key = Self::load_input_key(&env)?;
        let (value_type, raw) = input::open_input(&env, &input_key, &ciphertext)?;
        if value_type != expected_type {
            log!(&env, "input type mismatch", user);
            return Err(CoprocessorError::TypeMismatch);
        }
        let value =
            Plaintext::from_bits(value_type, raw).ok_or(CoprocessorError::UnsupportedType)?;

        let handle = Self::store_value(&env, &caller, &value);
        EvInputAccepted { handle, value_type }.publish(&env);
        Ok(handle)
    }

    /// Encrypt a constant, truncated to the width of `value_type`.
    /// The only `Identity` constant is 0, the zero identity.
    pub fn encrypt_constant(
        env: Env,
        caller: Address,
        value: u32,
        value_type: ValueType,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        let plaintext = match value_type {
            ValueType::Identity if value == 0 => Plaintext::ZeroIdentity,
            ValueType::Identity => return Err(CoprocessorError::UnsupportedType),
            _ => Plaintext::from_bits(value_type, value).ok_or(CoprocessorError::UnsupportedType)?,
        };
        Ok(Self::store_value(&env, &caller, &plaintext))
    }

    pub fn encrypt_identity(env: Env, caller: Address, identity: Address) -> u32 {
        caller.require_auth();
        Self::store_value(&env, &caller, &Plaintext::Identity(identity))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Access control
    // ───────────────────────────────────────────────────────────────────────────

    /// Grant `principal` access to `handle`. Idempotent. `granter` must
    /// itself hold an account grant on the handle.
    pub fn grant(
        env: Env,
        granter: Address,
        handle: u32,
        principal: Principal,
    ) -> Result<(), CoprocessorError> {
        granter.require_auth();
        Self::require_holder(&env, handle, &granter)?;
        Self::add_grant(&env, handle, &principal);
        Ok(())
    }

    /// Make `handle` decryptable by anyone. Irreversible.
    pub fn make_public(env: Env, granter: Address, handle: u32) -> Result<(), CoprocessorError> {
        granter.require_auth();
        Self::require_holder(&env, handle, &granter)?;
        if !Self::has_grant(&env, handle, &Principal::Public) {
            Self::add_grant(&env, handle, &Principal::Public);
            EvMadePublic { handle }.publish(&env);
        }
        Ok(())
    }

    pub fn is_granted(env: Env, handle: u32, principal: Principal) -> bool {
        Self::has_grant(&env, handle, &principal)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Homomorphic primitives
    // ───────────────────────────────────────────────────────────────────────────

    pub fn bit_and(
        env: Env,
        caller: Address,
        lhs: u32,
        rhs: Operand,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        Self::bitwise(&env, &caller, lhs, rhs, BitOp::And)
    }

    pub fn bit_or(
        env: Env,
        caller: Address,
        lhs: u32,
        rhs: Operand,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        Self::bitwise(&env, &caller, lhs, rhs, BitOp::Or)
    }

    pub fn bit_not(env: Env, caller: Address, operand: u32) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        let value = Self::read_for_compute(&env, &caller, operand)?;
        let value_type = value.value_type();
        let bits = value.bits().ok_or(CoprocessorError::TypeMismatch)?;
        let result =
            Plaintext::from_bits(value_type, !bits).ok_or(CoprocessorError::TypeMismatch)?;
        Ok(Self::store_value(&env, &caller, &result))
    }

    /// Shift an integer handle left. The amount is taken modulo the bit width
    /// of `lhs`; bits shifted past the width are dropped.
    pub fn shl(
        env: Env,
        caller: Address,
        lhs: u32,
        amount: Operand,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        let value = Self::read_for_compute(&env, &caller, lhs)?;
        let value_type = value.value_type();
        if value_type != ValueType::Uint8 && value_type != ValueType::Uint16 {
            return Err(CoprocessorError::TypeMismatch);
        }
        let bits = value.bits().ok_or(CoprocessorError::TypeMismatch)?;

        let amount = match amount {
            Operand::Cipher(handle) => Self::read_for_compute(&env, &caller, handle)?
                .bits()
                .ok_or(CoprocessorError::TypeMismatch)?,
            Operand::Scalar(v) => v,
        };
        let shifted = bits << (amount % value_type.bit_width());

        let result =
            Plaintext::from_bits(value_type, shifted).ok_or(CoprocessorError::TypeMismatch)?;
        Ok(Self::store_value(&env, &caller, &result))
    }

    pub fn equal(
        env: Env,
        caller: Address,
        lhs: u32,
        rhs: Operand,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        let same = Self::compare(&env, &caller, lhs, rhs)?;
        Ok(Self::store_value(&env, &caller, &Plaintext::Bool(same)))
    }

    pub fn not_equal(
        env: Env,
        caller: Address,
        lhs: u32,
        rhs: Operand,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        let same = Self::compare(&env, &caller, lhs, rhs)?;
        Ok(Self::store_value(&env, &caller, &Plaintext::Bool(!same)))
    }

    /// `condition ? if_true : if_false` over handles of the same type.
    pub fn select(
        env: Env,
        caller: Address,
        condition: u32,
        if_true: u32,
        if_false: u32,
    ) -> Result<u32, CoprocessorError> {
        caller.require_auth();
        let condition = match Self::read_for_compute(&env, &caller, condition)? {
            Plaintext::Bool(b) => b,
            _ => return Err(CoprocessorError::TypeMismatch),
        };
        let when_true = Self::read_for_compute(&env, &caller, if_true)?;
        let when_false = Self::read_for_compute(&env, &caller, if_false)?;
        if when_true.value_type() != when_false.value_type() {
            return Err(CoprocessorError::TypeMismatch);
        }

        let chosen = if condition { when_true } else { when_false };
        Ok(Self::store_value(&env, &caller, &chosen))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Decryption & metadata
    // ───────────────────────────────────────────────────────────────────────────

    /// Decrypt `handle` for `reader`, who must hold a grant unless the
    /// handle is public.
    pub fn decrypt_for(
        env: Env,
        handle: u32,
        reader: Address,
    ) -> Result<Plaintext, CoprocessorError> {
        reader.require_auth();
        let value = Self::read_value(&env, handle)?;
        if !Self::has_grant(&env, handle, &Principal::Account(reader.clone()))
            && !Self::has_grant(&env, handle, &Principal::Public)
        {
            log!(&env, "decrypt denied", handle, reader);
            return Err(CoprocessorError::PermissionDenied);
        }
        Ok(value)
    }

    pub fn public_decrypt(env: Env, handle: u32) -> Result<Plaintext, CoprocessorError> {
        let value = Self::read_value(&env, handle)?;
        if !Self::has_grant(&env, handle, &Principal::Public) {
            return Err(CoprocessorError::PermissionDenied);
        }
        Ok(value)
    }

    /// Value types are public metadata.
    pub fn value_type(env: Env, handle: u32) -> Result<ValueType, CoprocessorError> {
        Ok(Self::read_value(&env, handle)?.value_type())
    }

    pub fn handle_count(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&CoKey::HandleCount)
            .unwrap_or(0)
    }

    pub fn get_admin(env: Env) -> Result<Address, CoprocessorError> {
        Self::load_admin(&env)
    }

    pub fn upgrade(env: Env, new_wasm_hash: BytesN<32>) -> Result<(), CoprocessorError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.deployer().update_current_contract_wasm(new_wasm_hash);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Evaluation
    // ═══════════════════════════════════════════════════════════════════════════

    fn bitwise(
        env: &Env,
        caller: &Address,
        lhs: u32,
        rhs: Operand,
        op: BitOp,
    ) -> Result<u32, CoprocessorError> {
        let left = Self::read_for_compute(env, caller, lhs)?;
        let value_type = left.value_type();
        let left_bits = left.bits().ok_or(CoprocessorError::TypeMismatch)?;
        let right_bits = match rhs {
            Operand::Cipher(handle) => {
                let right = Self::read_for_compute(env, caller, handle)?;
                if right.value_type() != value_type {
                    return Err(CoprocessorError::TypeMismatch);
                }
                right.bits().ok_or(CoprocessorError::TypeMismatch)?
            }
            Operand::Scalar(v) => v,
        };

        let bits = match op {
            BitOp::And => left_bits & right_bits,
            BitOp::Or => left_bits | right_bits,
        };
        let result =
            Plaintext::from_bits(value_type, bits).ok_or(CoprocessorError::TypeMismatch)?;
        Ok(Self::store_value(env, caller, &result))
    }

    fn compare(
        env: &Env,
        caller: &Address,
        lhs: u32,
        rhs: Operand,
    ) -> Result<bool, CoprocessorError> {
        let left = Self::read_for_compute(env, caller, lhs)?;
        match rhs {
            Operand::Cipher(handle) => {
                let right = Self::read_for_compute(env, caller, handle)?;
                if right.value_type() != left.value_type() {
                    return Err(CoprocessorError::TypeMismatch);
                }
                Ok(left == right)
            }
            Operand::Scalar(v) => {
                let bits = left.bits().ok_or(CoprocessorError::TypeMismatch)?;
                Ok(bits == v & left.value_type().width_mask())
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage & ACL
    // ═══════════════════════════════════════════════════════════════════════════

    fn store_value(env: &Env, producer: &Address, value: &Plaintext) -> u32 {
        let handle: u32 = env
            .storage()
            .instance()
            .get(&CoKey::HandleCount)
            .unwrap_or(0);
        let key = CoKey::Value(handle);
        env.storage().persistent().set(&key, value);
        env.storage()
            .persistent()
            .extend_ttl(&key, HANDLE_TTL_LEDGERS, HANDLE_TTL_LEDGERS);
        env.storage()
            .instance()
            .set(&CoKey::HandleCount, &(handle + 1));
        env.storage()
            .instance()
            .extend_ttl(HANDLE_TTL_LEDGERS, HANDLE_TTL_LEDGERS);

        Self::add_grant(env, handle, &Principal::Account(producer.clone()));
        handle
    }

    fn read_value(env: &Env, handle: u32) -> Result<Plaintext, CoprocessorError> {
        env.storage()
            .persistent()
            .get(&CoKey::Value(handle))
            .ok_or(CoprocessorError::HandleNotFound)
    }

    fn read_for_compute(
        env: &Env,
        caller: &Address,
        handle: u32,
    ) -> Result<Plaintext, CoprocessorError> {
        let value = Self::read_value(env, handle)?;
        if !Self::has_grant(env, handle, &Principal::Account(caller.clone())) {
            log!(env, "compute denied", handle, caller.clone());
            return Err(CoprocessorError::PermissionDenied);
        }
        Ok(value)
    }

    fn require_holder(env: &Env, handle: u32, holder: &Address) -> Result<(), CoprocessorError> {
        Self::read_value(env, handle)?;
        if !Self::has_grant(env, handle, &Principal::Account(holder.clone())) {
            return Err(CoprocessorError::PermissionDenied);
        }
        Ok(())
    }

    fn has_grant(env: &Env, handle: u32, principal: &Principal) -> bool {
        env.storage()
            .persistent()
            .has(&CoKey::Grant(handle, principal.clone()))
    }

    fn add_grant(env: &Env, handle: u32, principal: &Principal) {
        let key = CoKey::Grant(handle, principal.clone());
        env.storage().persistent().set(&key, &true);
        env.storage()
            .persistent()
            .extend_ttl(&key, HANDLE_TTL_LEDGERS, HANDLE_TTL_LEDGERS);
    }

    fn load_admin(env: &Env) -> Result<Address, CoprocessorError> {
        env.storage()
            .instance()
            .get(&CoKey::Admin)
            .ok_or(CoprocessorError::AdminNotSet)
    }

    fn load_input_key(env: &Env) -> Result<BytesN<32>, CoprocessorError> {
        env.storage()
            .instance()
            .get(&CoKey::InputKey)
            .ok_or(CoprocessorError::InputKeyNotSet)
    }
}
