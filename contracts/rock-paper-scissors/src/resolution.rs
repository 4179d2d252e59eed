//! Branchless winner determination over encrypted moves.
//!
//! Moves are 2-bit codes (1 = rock, 2 = paper, 3 = scissors). The host's and
//! guest's codes are packed into a 4-bit index, a one-hot bit is raised at that
//! index, and the bit is tested against a mask of the three host-winning
//! packings:
//!
//! ```text
//! packed = host << 2 | guest
//! host=1 guest=3 -> 7    (rock beats scissors)
//! host=2 guest=1 -> 9    (paper beats rock)
//! host=3 guest=2 -> 14   (scissors beat paper)
//! ```
//!
//! Every step is a coprocessor primitive, so no intermediate value is ever
//! decrypted and nothing branches on move data.

use crate::confidential::{Confidential, Handle, Operand, ValueType};
use crate::RpsError;

/// Keeps the two significant bits of a submitted move.
pub const MOVE_MASK: u32 = 0b11;

/// Packed positions at which the host's move beats the guest's.
pub const HOST_WIN_MASK: u32 = (1 << 7) | (1 << 9) | (1 << 14);

// Outcome codes
pub const OUTCOME_UNRESOLVED: u32 = 0;
pub const OUTCOME_HOST_WINS: u32 = 1;
pub const OUTCOME_GUEST_WINS: u32 = 2;
pub const OUTCOME_DRAW: u32 = 3;

const MOVE_BITS: u32 = 2;

/// Encrypted outcome of `host_move` against `guest_move`.
///
/// Both handles must already be masked with [`MOVE_MASK`] and granted to the
/// engine. The returned handle holds one of the `OUTCOME_*` codes other than
/// [`OUTCOME_UNRESOLVED`].
pub(crate) fn resolve(
    cp: &Confidential,
    host_move: Handle,
    guest_move: Handle,
) -> Result<Handle, RpsError> {
    let draw = cp.eq(host_move, Operand::Cipher(guest_move))?;

    let host_high = cp.shl(host_move, Operand::Scalar(MOVE_BITS))?;
    let packed = cp.or(host_high, Operand::Cipher(guest_move))?;

    let one = cp.constant(1, ValueType::Uint16)?;
    let bit = cp.shl(one, Operand::Cipher(packed))?;
    let masked = cp.and(bit, Operand::Scalar(HOST_WIN_MASK))?;
    let host_wins = cp.ne(masked, Operand::Scalar(0))?;

    let host = cp.constant(OUTCOME_HOST_WINS, ValueType::Uint8)?;
    let guest = cp.constant(OUTCOME_GUEST_WINS, ValueType::Uint8)?;
    let tie = cp.constant(OUTCOME_DRAW, ValueType::Uint8)?;

    let decided = cp.select(host_wins, host, guest)?;
    cp.select(draw, tie, decided)
}
