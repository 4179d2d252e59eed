//! Game records and the game identifier allocator.

use soroban_sdk::{contracttype, Env};

use crate::{RpsError, StorageKey};

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// Games are never deleted; keep them alive 120 days past their last write
const GAME_TTL_SECONDS: u32 = 120 * 24 * 60 * 60; // 10,368,000 seconds

/// TTL for game storage in ledgers: 120 * 24 * 60 * 60 / 5 = 2,073,600 ledgers
const GAME_TTL_LEDGERS: u32 = GAME_TTL_SECONDS / LEDGER_RATE_SECS;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Game {
    /// Encrypted identity of the creator.
    pub host: u32,
    /// Encrypted zero identity until the game is joined.
    pub guest: u32,
    pub host_move: u32,
    pub guest_move: u32,
    /// Encrypted outcome code; encrypted zero until solved.
    pub result: u32,
    /// The only plaintext field: whether the game has been joined.
    pub solved: bool,
}

/// Store `game` under the next identifier and return it.
pub(crate) fn create(env: &Env, game: &Game) -> u32 {
    let game_id = count(env);
    write(env, game_id, game);
    env.storage()
        .instance()
        .set(&StorageKey::GameCount, &(game_id + 1));
    game_id
}

pub(crate) fn count(env: &Env) -> u32 {
    env.storage()
        .instance()
        .get(&StorageKey::GameCount)
        .unwrap_or(0)
}

pub(crate) fn read(env: &Env, game_id: u32) -> Result<Game, RpsError> {
    env.storage()
        .persistent()
        .get(&StorageKey::Game(game_id))
        .ok_or(RpsError::GameNotFound)
}

pub(crate) fn write(env: &Env, game_id: u32, game: &Game) {
    let key = StorageKey::Game(game_id);
    env.storage().persistent().set(&key, game);
    env.storage()
        .persistent()
        .extend_ttl(&key, GAME_TTL_LEDGERS, GAME_TTL_LEDGERS);
    // Keep instance storage (admin, coprocessor, counter) alive
    env.storage()
        .instance()
        .extend_ttl(GAME_TTL_LEDGERS, GAME_TTL_LEDGERS);
}
