//! Engine-side view of the confidential value coprocessor.
//!
//! The interface types mirror the coprocessor contract's own definitions so
//! values round-trip through the host unchanged. [`Confidential`] wraps the
//! generated client, always acts as the engine's own address, and maps every
//! coprocessor failure onto [`RpsError`].

use soroban_sdk::{
    contractclient, contracttype, log, Address, Bytes, BytesN, Env, Error, InvokeError,
};

use crate::RpsError;

/// Opaque reference to a ciphertext held by the coprocessor.
pub type Handle = u32;

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ValueType {
    Bool = 0,
    Uint8 = 1,
    Uint16 = 2,
    Identity = 3,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Principal {
    Account(Address),
    Public,
}

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    Cipher(u32),
    Scalar(u32),
}

// Coprocessor error codes the engine distinguishes
const COPROCESSOR_PROOF_INVALID: u32 = 1;
const COPROCESSOR_PERMISSION_DENIED: u32 = 2;

#[contractclient(name = "CoprocessorClient")]
pub trait Coprocessor {
    fn from_external(
        env: Env,
        caller: Address,
        user: Address,
        ciphertext: Bytes,
        proof: BytesN<32>,
        expected_type: ValueType,
    ) -> Handle;

    fn encrypt_constant(env: Env, caller: Address, value: u32, value_type: ValueType) -> Handle;

    fn encrypt_identity(env: Env, caller: Address, identity: Address) -> Handle;

    fn grant(env: Env, granter: Address, handle: Handle, principal: Principal);

    fn make_public(env: Env, granter: Address, handle: Handle);

    fn is_granted(env: Env, handle: Handle, principal: Principal) -> bool;

    fn bit_and(env: Env, caller: Address, lhs: Handle, rhs: Operand) -> Handle;

    fn bit_or(env: Env, caller: Address, lhs: Handle, rhs: Operand) -> Handle;

    fn shl(env: Env, caller: Address, lhs: Handle, amount: Operand) -> Handle;

    fn equal(env: Env, caller: Address, lhs: Handle, rhs: Operand) -> Handle;

    fn not_equal(env: Env, caller: Address, lhs: Handle, rhs: Operand) -> Handle;

    fn select(
        env: Env,
        caller: Address,
        condition: Handle,
        if_true: Handle,
        if_false: Handle,
    ) -> Handle;
}

/// Coprocessor access on behalf of the engine contract.
pub struct Confidential<'a> {
    env: Env,
    client: CoprocessorClient<'a>,
    engine: Address,
}

impl<'a> Confidential<'a> {
    pub fn new(env: &Env, coprocessor: &Address) -> Self {
        Confidential {
            env: env.clone(),
            client: CoprocessorClient::new(env, coprocessor),
            engine: env.current_contract_address(),
        }
    }

    // ── Handle production ──────────────────────────────────────────────────

    /// Import an 8-bit client ciphertext submitted by `user`. Any rejection of
    /// the input itself surfaces as [`RpsError::ProofInvalid`].
    pub fn input(
        &self,
        user: &Address,
        ciphertext: &Bytes,
        proof: &BytesN<32>,
    ) -> Result<Handle, RpsError> {
        self.settle(self.client.try_from_external(
            &self.engine,
            user,
            ciphertext,
            proof,
            &ValueType::Uint8,
        ))
        .map_err(|err| match err {
            RpsError::CoprocessorFault => RpsError::ProofInvalid,
            other => other,
        })
    }

    pub fn constant(&self, value: u32, value_type: ValueType) -> Result<Handle, RpsError> {
        self.settle(
            self.client
                .try_encrypt_constant(&self.engine, &value, &value_type),
        )
    }

    pub fn identity(&self, who: &Address) -> Result<Handle, RpsError> {
        self.settle(self.client.try_encrypt_identity(&self.engine, who))
    }

    // ── ACL ────────────────────────────────────────────────────────────────

    /// Grant the engine itself access to `handle`.
    pub fn allow_this(&self, handle: Handle) -> Result<(), RpsError> {
        let principal = Principal::Account(self.engine.clone());
        self.settle(self.client.try_grant(&self.engine, &handle, &principal))
    }

    pub fn allow(&self, handle: Handle, who: &Address) -> Result<(), RpsError> {
        let principal = Principal::Account(who.clone());
        self.settle(self.client.try_grant(&self.engine, &handle, &principal))
    }

    pub fn make_public(&self, handle: Handle) -> Result<(), RpsError> {
        self.settle(self.client.try_make_public(&self.engine, &handle))
    }

    pub fn is_granted_to(&self, handle: Handle, who: &Address) -> bool {
        self.client
            .is_granted(&handle, &Principal::Account(who.clone()))
    }

    // ── Primitives ─────────────────────────────────────────────────────────

    pub fn and(&self, lhs: Handle, rhs: Operand) -> Result<Handle, RpsError> {
        self.settle(self.client.try_bit_and(&self.engine, &lhs, &rhs))
    }

    pub fn or(&self, lhs: Handle, rhs: Operand) -> Result<Handle, RpsError> {
        self.settle(self.client.try_bit_or(&self.engine, &lhs, &rhs))
    }

    pub fn shl(&self, lhs: Handle, amount: Operand) -> Result<Handle, RpsError> {
        self.settle(self.client.try_shl(&self.engine, &lhs, &amount))
    }

    pub fn eq(&self, lhs: Handle, rhs: Operand) -> Result<Handle, RpsError> {
        self.settle(self.client.try_equal(&self.engine, &lhs, &rhs))
    }

    pub fn ne(&self, lhs: Handle, rhs: Operand) -> Result<Handle, RpsError> {
        self.settle(self.client.try_not_equal(&self.engine, &lhs, &rhs))
    }

    pub fn select(
        &self,
        condition: Handle,
        if_true: Handle,
        if_false: Handle,
    ) -> Result<Handle, RpsError> {
        self.settle(
            self.client
                .try_select(&self.engine, &condition, &if_true, &if_false),
        )
    }

    // ── Error mapping ──────────────────────────────────────────────────────

    fn settle<T, C>(
        &self,
        outcome: Result<Result<T, C>, Result<Error, InvokeError>>,
    ) -> Result<T, RpsError> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                log!(&self.env, "coprocessor returned an unreadable value");
                Err(RpsError::CoprocessorFault)
            }
            Err(Ok(err)) => {
                if err == Error::from_contract_error(COPROCESSOR_PROOF_INVALID) {
                    Err(RpsError::ProofInvalid)
                } else if err == Error::from_contract_error(COPROCESSOR_PERMISSION_DENIED) {
                    Err(RpsError::PermissionDenied)
                } else {
                    log!(&self.env, "coprocessor error", err);
                    Err(RpsError::CoprocessorFault)
                }
            }
            Err(Err(_)) => {
                log!(&self.env, "coprocessor invocation aborted");
                Err(RpsError::CoprocessorFault)
            }
        }
    }
}
