#![no_std]

//! # Confidential Rock-Paper-Scissors
//!
//! A two-player Rock-Paper-Scissors game where both players' identities and
//! moves stay encrypted until only the outcome is made public.
//!
//! ## Game flow
//! 1. The host submits an encrypted move (1 = rock, 2 = paper, 3 = scissors)
//!    with an input proof. A new game id is allocated from a dense counter.
//! 2. A guest joins the game with their own encrypted move. The engine
//!    resolves the outcome homomorphically and makes only the result public.
//! 3. Anyone reads the result handle and decrypts it through the coprocessor:
//!    1 = host wins, 2 = guest wins, 3 = draw.
//!
//! ## Confidential state
//! Every field of a [`Game`] except `solved` is a handle into the confidential
//! value coprocessor. Reads return handles only to principals holding a grant
//! on them; the coprocessor enforces the same grants on decryption. The engine
//! grants itself every handle it stores before computing on it.
//!
//! ## Move encoding
//! Moves are masked with `AND(move, 3)` on entry, so out-of-range inputs are
//! silently truncated rather than rejected.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, Address, Bytes,
    BytesN, Env,
};

mod confidential;
mod resolution;
mod store;

pub use confidential::{Handle, Operand, Principal, ValueType};
pub use resolution::{
    HOST_WIN_MASK, MOVE_MASK, OUTCOME_DRAW, OUTCOME_GUEST_WINS, OUTCOME_HOST_WINS,
    OUTCOME_UNRESOLVED,
};
pub use store::Game;

use confidential::Confidential;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

/// Emitted when a new open game is stored.
#[contractevent]
pub struct EvGameCreated {
    pub game_id: u32,
}

/// Emitted when a guest joins and the encrypted outcome is published.
#[contractevent]
pub struct EvGameSolved {
    pub game_id: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum RpsError {
    GameNotFound = 1,
    GameAlreadySolved = 2,
    GameNotSolved = 3,
    UnauthorizedHostAddress = 4,
    UnauthorizedHostMove = 5,
    UnauthorizedGuestAddress = 6,
    UnauthorizedGuestMove = 7,
    ProofInvalid = 8,
    PermissionDenied = 9,
    CoprocessorFault = 10,
    AdminNotSet = 11,
    CoprocessorNotSet = 12,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone)]
enum StorageKey {
    Game(u32),
    GameCount,
    Admin,
    Coprocessor,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct RockPaperScissors;

#[contractimpl]
impl RockPaperScissors {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor & Lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    /// `coprocessor` is fixed for the lifetime of the contract: stored
    /// handles only mean something inside that coprocessor instance.
    pub fn __constructor(env: Env, admin: Address, coprocessor: Address) {
        env.storage()
            .instance()
            .set(&StorageKey::Admin, &admin);
        env.storage()
            .instance()
            .set(&StorageKey::Coprocessor, &coprocessor);
    }

    /// Open a new game with the host's encrypted move. Returns the game id.
    ///
    /// # Arguments
    /// * `move_ciphertext` - input ciphertext sealed for this contract and `host`
    /// * `proof` - input proof binding the ciphertext to this contract and `host`
    pub fn create_game(
        env: Env,
        host: Address,
        move_ciphertext: Bytes,
        proof: BytesN<32>,
    ) -> Result<u32, RpsError> {
        host.require_auth();
        let cp = Self::confidential(&env)?;

        let raw_move = cp.input(&host, &move_ciphertext, &proof)?;
        let host_move = cp.and(raw_move, Operand::Scalar(MOVE_MASK))?;
        let host_id = cp.identity(&host)?;

        // Placeholders rebound by join_game
        let guest = cp.constant(0, ValueType::Identity)?;
        let guest_move = cp.constant(0, ValueType::Uint8)?;
        let result = cp.constant(OUTCOME_UNRESOLVED, ValueType::Uint8)?;

        for handle in [host_id, host_move] {
            cp.allow_this(handle)?;
            cp.allow(handle, &host)?;
        }
        for handle in [guest, guest_move, result] {
            cp.allow_this(handle)?;
        }

        let game = Game {
            host: host_id,
            guest,
            host_move,
            guest_move,
            result,
            solved: false,
        };
        let game_id = store::create(&env, &game);

        EvGameCreated { game_id }.publish(&env);
        Ok(game_id)
    }

    /// Join an open game with the guest's encrypted move and resolve it.
    ///
    /// The outcome handle is made public; moves and identities stay private
    /// to their owners.
    pub fn join_game(
        env: Env,
        game_id: u32,
        guest: Address,
        move_ciphertext: Bytes,
        proof: BytesN<32>,
    ) -> Result<(), RpsError> {
        guest.require_auth();

        let mut game = store::read(&env, game_id)?;
        if game.solved {
            log!(&env, "game already solved", game_id);
            return Err(RpsError::GameAlreadySolved);
        }

        let cp = Self::confidential(&env)?;

        let raw_move = cp.input(&guest, &move_ciphertext, &proof)?;
        let guest_move = cp.and(raw_move, Operand::Scalar(MOVE_MASK))?;
        let guest_id = cp.identity(&guest)?;
        for handle in [guest_id, guest_move] {
            cp.allow_this(handle)?;
            cp.allow(handle, &guest)?;
        }

        let result = resolution::resolve(&cp, game.host_move, guest_move)?;
        cp.allow_this(result)?;
        cp.make_public(result)?;

        game.solved = true;
        game.guest = guest_id;
        game.guest_move = guest_move;
        game.result = result;
        store::write(&env, game_id, &game);

        EvGameSolved { game_id }.publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Guarded reads
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_host(env: Env, game_id: u32, caller: Address) -> Result<u32, RpsError> {
        Self::guarded_read(
            &env,
            game_id,
            &caller,
            |game| game.host,
            RpsError::UnauthorizedHostAddress,
        )
    }

    pub fn get_guest(env: Env, game_id: u32, caller: Address) -> Result<u32, RpsError> {
        Self::guarded_read(
            &env,
            game_id,
            &caller,
            |game| game.guest,
            RpsError::UnauthorizedGuestAddress,
        )
    }

    pub fn get_host_move(env: Env, game_id: u32, caller: Address) -> Result<u32, RpsError> {
        Self::guarded_read(
            &env,
            game_id,
            &caller,
            |game| game.host_move,
            RpsError::UnauthorizedHostMove,
        )
    }

    pub fn get_guest_move(env: Env, game_id: u32, caller: Address) -> Result<u32, RpsError> {
        Self::guarded_read(
            &env,
            game_id,
            &caller,
            |game| game.guest_move,
            RpsError::UnauthorizedGuestMove,
        )
    }

    /// Publicly decryptable outcome handle of a solved game.
    pub fn get_result(env: Env, game_id: u32) -> Result<u32, RpsError> {
        let game = store::read(&env, game_id)?;
        if !game.solved {
            return Err(RpsError::GameNotSolved);
        }
        Ok(game.result)
    }

    pub fn is_solved(env: Env, game_id: u32) -> Result<bool, RpsError> {
        Ok(store::read(&env, game_id)?.solved)
    }

    /// Number of games created so far; also the next game id.
    pub fn game_count(env: Env) -> u32 {
        store::count(&env)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Administration
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_admin(env: Env) -> Result<Address, RpsError> {
        Self::load_admin(&env)
    }

    pub fn set_admin(env: Env, new_admin: Address) -> Result<(), RpsError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage()
            .instance()
            .set(&StorageKey::Admin, &new_admin);
        Ok(())
    }

    pub fn get_coprocessor(env: Env) -> Result<Address, RpsError> {
        Self::load_coprocessor(&env)
    }

    pub fn upgrade(env: Env, new_wasm_hash: BytesN<32>) -> Result<(), RpsError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.deployer().update_current_contract_wasm(new_wasm_hash);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal
    // ═══════════════════════════════════════════════════════════════════════════

    /// Return the selected field's handle if `caller` holds a grant on it.
    /// Existence is checked first so "not found" and "not yours" stay distinct.
    fn guarded_read(
        env: &Env,
        game_id: u32,
        caller: &Address,
        field: fn(&Game) -> Handle,
        denied: RpsError,
    ) -> Result<u32, RpsError> {
        caller.require_auth();
        let game = store::read(env, game_id)?;
        let handle = field(&game);

        let cp = Self::confidential(env)?;
        if !cp.is_granted_to(handle, caller) {
            log!(env, "read denied", game_id, caller.clone());
            return Err(denied);
        }
        Ok(handle)
    }

    fn confidential(env: &Env) -> Result<Confidential<'static>, RpsError> {
        let coprocessor = Self::load_coprocessor(env)?;
        Ok(Confidential::new(env, &coprocessor))
    }

    fn load_admin(env: &Env) -> Result<Address, RpsError> {
        env.storage()
            .instance()
            .get(&StorageKey::Admin)
            .ok_or(RpsError::AdminNotSet)
    }

    fn load_coprocessor(env: &Env) -> Result<Address, RpsError> {
        env.storage()
            .instance()
            .get(&StorageKey::Coprocessor)
            .ok_or(RpsError::CoprocessorNotSet)
    }
}

#[cfg(test)]
mod test;
