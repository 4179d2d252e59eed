#![cfg(test)]

//! Unit tests for the Rock-Paper-Scissors engine.
//!
//! Runs against the real coprocessor model so that every move travels as a
//! sealed input and every outcome is checked by decrypting through the
//! coprocessor's ACL.

use crate::{
    EvGameCreated, EvGameSolved, RockPaperScissors, RockPaperScissorsClient, RpsError,
    OUTCOME_DRAW, OUTCOME_GUEST_WINS, OUTCOME_HOST_WINS,
};
use coprocessor::{
    seal_input, ConfidentialCoprocessor, ConfidentialCoprocessorClient, CoprocessorError,
    Plaintext, Principal as CpPrincipal, ValueType as CpValueType,
};
use soroban_sdk::testutils::{
    Address as _, Events as _, Ledger as _, MockAuth, MockAuthInvoke,
};
use soroban_sdk::{Address, Bytes, BytesN, Env, Event, IntoVal};

const INPUT_KEY: [u8; 32] = [0x5Au8; 32];

const ROCK: u32 = 1;
const PAPER: u32 = 2;
const SCISSORS: u32 = 3;

// ════════════════════════════════════════════════════════════════════════════
//  Test Helpers
// ════════════════════════════════════════════════════════════════════════════

struct Setup {
    env: Env,
    client: RockPaperScissorsClient<'static>,
    coprocessor: ConfidentialCoprocessorClient<'static>,
    admin: Address,
    host: Address,
    guest: Address,
}

fn setup_test() -> Setup {
    let env = Env::default();
    env.mock_all_auths();

    env.ledger().set(soroban_sdk::testutils::LedgerInfo {
        timestamp: 1_700_000_000,
        protocol_version: 25,
        sequence_number: 100,
        network_id: Default::default(),
        base_reserve: 10,
        min_temp_entry_ttl: u32::MAX / 2,
        min_persistent_entry_ttl: u32::MAX / 2,
        max_entry_ttl: u32::MAX / 2,
    });

    let admin = Address::generate(&env);
    let key = BytesN::<32>::from_array(&env, &INPUT_KEY);
    let coprocessor_addr = env.register(ConfidentialCoprocessor, (&admin, &key));
    let coprocessor = ConfidentialCoprocessorClient::new(&env, &coprocessor_addr);

    let contract_id = env.register(RockPaperScissors, (&admin, &coprocessor_addr));
    let client = RockPaperScissorsClient::new(&env, &contract_id);

    let host = Address::generate(&env);
    let guest = Address::generate(&env);

    Setup {
        env,
        client,
        coprocessor,
        admin,
        host,
        guest,
    }
}

/// Seal `value` as an 8-bit move for `player`, bound to the engine contract.
/// `unique` seeds the nonce so repeated moves give distinct ciphertexts.
fn sealed_move(s: &Setup, player: &Address, value: u32, unique: u8) -> (Bytes, BytesN<32>) {
    sealed_as(s, player, CpValueType::Uint8, value, unique)
}

fn sealed_as(
    s: &Setup,
    player: &Address,
    value_type: CpValueType,
    value: u32,
    unique: u8,
) -> (Bytes, BytesN<32>) {
    let key = BytesN::<32>::from_array(&s.env, &INPUT_KEY);
    let nonce = BytesN::<32>::from_array(&s.env, &[unique; 32]);
    seal_input(
        &s.env,
        &key,
        &s.client.address,
        player,
        value_type,
        value,
        &nonce,
    )
}

fn create_with(s: &Setup, host: &Address, value: u32, unique: u8) -> u32 {
    let (ct, proof) = sealed_move(s, host, value, unique);
    s.client.create_game(host, &ct, &proof)
}

fn join_with(s: &Setup, game_id: u32, guest: &Address, value: u32, unique: u8) {
    let (ct, proof) = sealed_move(s, guest, value, unique);
    s.client.join_game(&game_id, guest, &ct, &proof);
}

/// Play a full game and return the publicly decrypted outcome code.
fn play(s: &Setup, host_move: u32, guest_move: u32) -> u32 {
    let game_id = create_with(s, &s.host, host_move, 1);
    join_with(s, game_id, &s.guest, guest_move, 2);
    public_outcome(s, game_id)
}

fn public_outcome(s: &Setup, game_id: u32) -> u32 {
    let handle = s.client.get_result(&game_id);
    match s.coprocessor.public_decrypt(&handle) {
        Plaintext::Uint8(code) => code,
        other => panic!("outcome is not an 8-bit value: {:?}", other),
    }
}

fn assert_rps_error<T, E>(
    result: &Result<Result<T, E>, Result<RpsError, soroban_sdk::InvokeError>>,
    expected: RpsError,
) {
    match result {
        Err(Ok(actual)) => {
            assert_eq!(
                *actual, expected,
                "Expected error {:?} ({}), got {:?} ({})",
                expected, expected as u32, actual, *actual as u32
            );
        }
        Err(Err(invoke_err)) => {
            panic!(
                "Expected {:?} ({}), got invoke error: {:?}",
                expected, expected as u32, invoke_err
            );
        }
        Ok(_) => {
            panic!(
                "Expected error {:?} ({}), but operation succeeded",
                expected, expected as u32
            );
        }
    }
}

fn assert_decrypt_denied<T, E>(
    result: &Result<Result<T, E>, Result<CoprocessorError, soroban_sdk::InvokeError>>,
) {
    assert!(
        matches!(result, Err(Ok(CoprocessorError::PermissionDenied))),
        "decryption should have been denied"
    );
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Game creation
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_create_game_assigns_dense_ids() {
    let s = setup_test();
    assert_eq!(s.client.game_count(), 0);

    let first = create_with(&s, &s.host, ROCK, 1);
    let second = create_with(&s, &s.host, PAPER, 2);
    let other_host = Address::generate(&s.env);
    let third = create_with(&s, &other_host, SCISSORS, 3);

    assert_eq!((first, second, third), (0, 1, 2));
    assert_eq!(s.client.game_count(), 3);
}

#[test]
fn test_new_game_is_open() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, PAPER, 1);

    assert!(!s.client.is_solved(&game_id));
    assert_rps_error(&s.client.try_get_result(&game_id), RpsError::GameNotSolved);
}

#[test]
fn test_host_reads_own_identity_and_move() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, SCISSORS, 1);

    let host_handle = s.client.get_host(&game_id, &s.host);
    assert_eq!(
        s.coprocessor.decrypt_for(&host_handle, &s.host),
        Plaintext::Identity(s.host.clone())
    );

    let move_handle = s.client.get_host_move(&game_id, &s.host);
    assert_eq!(
        s.coprocessor.decrypt_for(&move_handle, &s.host),
        Plaintext::Uint8(SCISSORS)
    );
}

#[test]
fn test_open_game_hides_guest_slots() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, ROCK, 1);

    // Placeholders are granted to the engine only.
    assert_rps_error(
        &s.client.try_get_guest(&game_id, &s.host),
        RpsError::UnauthorizedGuestAddress,
    );
    assert_rps_error(
        &s.client.try_get_guest_move(&game_id, &s.host),
        RpsError::UnauthorizedGuestMove,
    );
}

#[test]
fn test_create_game_rejects_input_sealed_for_other_user() {
    let s = setup_test();
    let (ct, proof) = sealed_move(&s, &s.guest, ROCK, 1);

    let result = s.client.try_create_game(&s.host, &ct, &proof);
    assert_rps_error(&result, RpsError::ProofInvalid);
    assert_eq!(s.client.game_count(), 0);
}

#[test]
fn test_create_game_rejects_tampered_input() {
    let s = setup_test();
    let (mut ct, proof) = sealed_move(&s, &s.host, PAPER, 1);
    let last = ct.len() - 1;
    ct.set(last, ct.get(last).unwrap() ^ 0x02);

    let result = s.client.try_create_game(&s.host, &ct, &proof);
    assert_rps_error(&result, RpsError::ProofInvalid);
    assert_eq!(s.client.game_count(), 0);
}

#[test]
fn test_create_game_rejects_input_of_other_width() {
    let s = setup_test();
    let (ct, proof) = sealed_as(&s, &s.host, CpValueType::Uint16, ROCK, 1);

    let result = s.client.try_create_game(&s.host, &ct, &proof);
    assert_rps_error(&result, RpsError::ProofInvalid);
    assert_eq!(s.client.game_count(), 0);
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Joining & resolution
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_join_unknown_game() {
    let s = setup_test();
    let (ct, proof) = sealed_move(&s, &s.guest, ROCK, 1);

    let result = s.client.try_join_game(&999, &s.guest, &ct, &proof);
    assert_rps_error(&result, RpsError::GameNotFound);
}

#[test]
fn test_full_game_scissors_beat_paper() {
    let s = setup_test();

    let game_id = create_with(&s, &s.host, PAPER, 1);
    assert_eq!(game_id, 0);
    join_with(&s, game_id, &s.guest, SCISSORS, 2);

    assert!(s.client.is_solved(&game_id));
    assert_eq!(public_outcome(&s, game_id), OUTCOME_GUEST_WINS);

    let host_move = s.client.get_host_move(&game_id, &s.host);
    assert_eq!(
        s.coprocessor.decrypt_for(&host_move, &s.host),
        Plaintext::Uint8(PAPER)
    );
    assert_rps_error(
        &s.client.try_get_host_move(&game_id, &s.guest),
        RpsError::UnauthorizedHostMove,
    );

    let guest_handle = s.client.get_guest(&game_id, &s.guest);
    assert_eq!(
        s.coprocessor.decrypt_for(&guest_handle, &s.guest),
        Plaintext::Identity(s.guest.clone())
    );
    let guest_move = s.client.get_guest_move(&game_id, &s.guest);
    assert_eq!(
        s.coprocessor.decrypt_for(&guest_move, &s.guest),
        Plaintext::Uint8(SCISSORS)
    );
}

#[test]
fn test_outcome_table() {
    let cases = [
        (ROCK, ROCK, OUTCOME_DRAW),
        (ROCK, PAPER, OUTCOME_GUEST_WINS),
        (ROCK, SCISSORS, OUTCOME_HOST_WINS),
        (PAPER, ROCK, OUTCOME_HOST_WINS),
        (PAPER, PAPER, OUTCOME_DRAW),
        (PAPER, SCISSORS, OUTCOME_GUEST_WINS),
        (SCISSORS, ROCK, OUTCOME_GUEST_WINS),
        (SCISSORS, PAPER, OUTCOME_HOST_WINS),
        (SCISSORS, SCISSORS, OUTCOME_DRAW),
    ];

    for (host_move, guest_move, expected) in cases {
        let s = setup_test();
        assert_eq!(
            play(&s, host_move, guest_move),
            expected,
            "host {} vs guest {}",
            host_move,
            guest_move
        );
    }
}

#[test]
fn test_out_of_range_moves_are_masked() {
    let s = setup_test();

    // 4 -> 0, 5 -> 1, 7 -> 3, 255 -> 3
    for (raw, masked) in [(4u32, 0u32), (5, 1), (7, 3), (255, 3)] {
        let game_id = create_with(&s, &s.host, raw, raw as u8);
        let handle = s.client.get_host_move(&game_id, &s.host);
        assert_eq!(
            s.coprocessor.decrypt_for(&handle, &s.host),
            Plaintext::Uint8(masked)
        );
    }

    // Scissors (7) against paper: host wins after masking.
    assert_eq!(play(&s, 7, PAPER), OUTCOME_HOST_WINS);
}

#[test]
fn test_result_is_never_unresolved() {
    // Every 2-bit pairing, including the out-of-range code 0.
    for host_move in 0..4u32 {
        for guest_move in 0..4u32 {
            let s = setup_test();
            let outcome = play(&s, host_move, guest_move);
            let expected = if host_move == guest_move {
                OUTCOME_DRAW
            } else if matches!((host_move, guest_move), (1, 3) | (2, 1) | (3, 2)) {
                OUTCOME_HOST_WINS
            } else {
                OUTCOME_GUEST_WINS
            };
            assert_eq!(outcome, expected, "host {} vs guest {}", host_move, guest_move);
        }
    }
}

#[test]
fn test_second_join_rejected_and_state_unchanged() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, ROCK, 1);
    join_with(&s, game_id, &s.guest, SCISSORS, 2);

    let result_before = s.client.get_result(&game_id);
    let guest_before = s.client.get_guest(&game_id, &s.guest);
    let guest_move_before = s.client.get_guest_move(&game_id, &s.guest);

    let latecomer = Address::generate(&s.env);
    let (ct, proof) = sealed_move(&s, &latecomer, PAPER, 3);
    let result = s.client.try_join_game(&game_id, &latecomer, &ct, &proof);
    assert_rps_error(&result, RpsError::GameAlreadySolved);

    assert_eq!(s.client.get_result(&game_id), result_before);
    assert_eq!(s.client.get_guest(&game_id, &s.guest), guest_before);
    assert_eq!(
        s.client.get_guest_move(&game_id, &s.guest),
        guest_move_before
    );
    assert_rps_error(
        &s.client.try_get_guest(&game_id, &latecomer),
        RpsError::UnauthorizedGuestAddress,
    );
    assert_rps_error(
        &s.client.try_get_guest_move(&game_id, &latecomer),
        RpsError::UnauthorizedGuestMove,
    );
    assert_eq!(public_outcome(&s, game_id), OUTCOME_HOST_WINS);
}

#[test]
fn test_rejected_join_leaves_game_open() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, ROCK, 1);

    // Sealed for the host, submitted by the guest.
    let (ct, proof) = sealed_move(&s, &s.host, PAPER, 2);
    let result = s.client.try_join_game(&game_id, &s.guest, &ct, &proof);
    assert_rps_error(&result, RpsError::ProofInvalid);

    assert!(!s.client.is_solved(&game_id));
    join_with(&s, game_id, &s.guest, PAPER, 3);
    assert_eq!(public_outcome(&s, game_id), OUTCOME_GUEST_WINS);
}

#[test]
fn test_games_are_independent() {
    let s = setup_test();
    let first = create_with(&s, &s.host, ROCK, 1);
    let second = create_with(&s, &s.host, ROCK, 2);

    join_with(&s, second, &s.guest, ROCK, 3);

    assert!(!s.client.is_solved(&first));
    assert!(s.client.is_solved(&second));
    assert_eq!(public_outcome(&s, second), OUTCOME_DRAW);
}

#[test]
fn test_getters_are_idempotent() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, PAPER, 1);
    join_with(&s, game_id, &s.guest, PAPER, 2);

    assert_eq!(
        s.client.get_host(&game_id, &s.host),
        s.client.get_host(&game_id, &s.host)
    );
    assert_eq!(
        s.client.get_host_move(&game_id, &s.host),
        s.client.get_host_move(&game_id, &s.host)
    );
    assert_eq!(s.client.get_result(&game_id), s.client.get_result(&game_id));
    assert_eq!(s.client.game_count(), 1);
}

#[test]
fn test_lifecycle_events() {
    let s = setup_test();
    let engine = s.client.address.clone();

    create_with(&s, &s.host, ROCK, 1);
    let game_id = create_with(&s, &s.host, PAPER, 2);
    let created = s.env.events().all().filter_by_contract(&engine);
    assert_eq!(
        created,
        [EvGameCreated { game_id }.to_xdr(&s.env, &engine)]
    );

    join_with(&s, game_id, &s.guest, ROCK, 3);
    let solved = s.env.events().all().filter_by_contract(&engine);
    assert_eq!(solved, [EvGameSolved { game_id }.to_xdr(&s.env, &engine)]);

    // A rejected join publishes nothing.
    let latecomer = Address::generate(&s.env);
    let (ct, proof) = sealed_move(&s, &latecomer, SCISSORS, 4);
    let result = s.client.try_join_game(&game_id, &latecomer, &ct, &proof);
    assert_rps_error(&result, RpsError::GameAlreadySolved);
    let solved_again = EvGameSolved { game_id }.to_xdr(&s.env, &engine);
    assert!(!s.env.events().all().events().contains(&solved_again));
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Access control
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_players_cannot_read_each_others_fields() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, ROCK, 1);
    join_with(&s, game_id, &s.guest, PAPER, 2);

    assert_rps_error(
        &s.client.try_get_host(&game_id, &s.guest),
        RpsError::UnauthorizedHostAddress,
    );
    assert_rps_error(
        &s.client.try_get_host_move(&game_id, &s.guest),
        RpsError::UnauthorizedHostMove,
    );
    assert_rps_error(
        &s.client.try_get_guest(&game_id, &s.host),
        RpsError::UnauthorizedGuestAddress,
    );
    assert_rps_error(
        &s.client.try_get_guest_move(&game_id, &s.host),
        RpsError::UnauthorizedGuestMove,
    );

    let stranger = Address::generate(&s.env);
    assert_rps_error(
        &s.client.try_get_host(&game_id, &stranger),
        RpsError::UnauthorizedHostAddress,
    );
}

#[test]
fn test_moves_stay_private_after_resolution() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, SCISSORS, 1);
    join_with(&s, game_id, &s.guest, ROCK, 2);

    let host_move = s.client.get_host_move(&game_id, &s.host);
    let guest_move = s.client.get_guest_move(&game_id, &s.guest);

    assert_decrypt_denied(&s.coprocessor.try_decrypt_for(&host_move, &s.guest));
    assert_decrypt_denied(&s.coprocessor.try_decrypt_for(&guest_move, &s.host));
    assert_decrypt_denied(&s.coprocessor.try_public_decrypt(&host_move));
    assert_decrypt_denied(&s.coprocessor.try_public_decrypt(&guest_move));
}

#[test]
fn test_result_is_publicly_decryptable() {
    let s = setup_test();
    let game_id = create_with(&s, &s.host, ROCK, 1);
    join_with(&s, game_id, &s.guest, SCISSORS, 2);

    let result = s.client.get_result(&game_id);
    assert!(s.coprocessor.is_granted(&result, &CpPrincipal::Public));

    let stranger = Address::generate(&s.env);
    assert_eq!(
        s.coprocessor.decrypt_for(&result, &stranger),
        Plaintext::Uint8(OUTCOME_HOST_WINS)
    );
}

#[test]
fn test_engine_holds_grants_on_stored_handles() {
    let s = setup_test();
    let engine = CpPrincipal::Account(s.client.address.clone());

    let open_id = create_with(&s, &s.host, ROCK, 1);
    let solved_id = create_with(&s, &s.host, PAPER, 2);
    join_with(&s, solved_id, &s.guest, ROCK, 3);

    for game_id in [open_id, solved_id] {
        let handles = [
            s.client.get_host(&game_id, &s.host),
            s.client.get_host_move(&game_id, &s.host),
        ];
        for handle in handles {
            assert!(s.coprocessor.is_granted(&handle, &engine));
        }
    }

    let result = s.client.get_result(&solved_id);
    let guest = s.client.get_guest(&solved_id, &s.guest);
    let guest_move = s.client.get_guest_move(&solved_id, &s.guest);
    for handle in [result, guest, guest_move] {
        assert!(s.coprocessor.is_granted(&handle, &engine));
    }
}

#[test]
fn test_reads_of_unknown_game() {
    let s = setup_test();

    assert_rps_error(&s.client.try_is_solved(&7), RpsError::GameNotFound);
    assert_rps_error(&s.client.try_get_result(&7), RpsError::GameNotFound);
    assert_rps_error(&s.client.try_get_host(&7, &s.host), RpsError::GameNotFound);
    assert_rps_error(
        &s.client.try_get_guest_move(&7, &s.guest),
        RpsError::GameNotFound,
    );
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Administration
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_constructor_configuration() {
    let s = setup_test();
    assert_eq!(s.client.get_admin(), s.admin);
    assert_eq!(s.client.get_coprocessor(), s.coprocessor.address);
}

#[test]
fn test_set_admin() {
    let s = setup_test();
    let new_admin = Address::generate(&s.env);

    s.client.set_admin(&new_admin);
    assert_eq!(s.client.get_admin(), new_admin);
}

#[test]
fn test_admin_calls_require_admin_auth() {
    let s = setup_test();
    let intruder = Address::generate(&s.env);
    let new_admin = Address::generate(&s.env);

    s.env.mock_auths(&[MockAuth {
        address: &intruder,
        invoke: &MockAuthInvoke {
            contract: &s.client.address,
            fn_name: "set_admin",
            args: (&new_admin,).into_val(&s.env),
            sub_invokes: &[],
        },
    }]);
    assert!(s.client.try_set_admin(&new_admin).is_err());
    assert_eq!(s.client.get_admin(), s.admin);

    let wasm_hash = BytesN::<32>::from_array(&s.env, &[7u8; 32]);
    s.env.mock_auths(&[MockAuth {
        address: &intruder,
        invoke: &MockAuthInvoke {
            contract: &s.client.address,
            fn_name: "upgrade",
            args: (&wasm_hash,).into_val(&s.env),
            sub_invokes: &[],
        },
    }]);
    assert!(s.client.try_upgrade(&wasm_hash).is_err());

    s.env.mock_auths(&[MockAuth {
        address: &s.admin,
        invoke: &MockAuthInvoke {
            contract: &s.client.address,
            fn_name: "set_admin",
            args: (&new_admin,).into_val(&s.env),
            sub_invokes: &[],
        },
    }]);
    s.client.set_admin(&new_admin);
    assert_eq!(s.client.get_admin(), new_admin);
}
