//! Match engine: board plus rules behind a single placement call.
//!
//! Black always opens. After that the colours alternate strictly, so a
//! colour is out of turn exactly when it placed the previous stone.

use super::board::{Board, CellState, ParticipantRole, Position, Verdict};
use super::error::MoveError;
use super::rules::RuleSet;

/// Board and legality rules for one match.
#[derive(Debug)]
pub struct Game {
    board: Board,
    rules: RuleSet,
}

impl Game {
    /// Create a game on an empty `board_size` board.
    pub fn new(board_size: usize, rules: RuleSet) -> Self {
        Self {
            board: Board::new(board_size),
            rules,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Colour whose stone is expected next.
    pub fn next_to_move(&self) -> ParticipantRole {
        self.board
            .last_mover()
            .and_then(ParticipantRole::opponent)
            .unwrap_or(ParticipantRole::Black)
    }

    /// Try to place a stone for `role` at `pos`.
    ///
    /// Checks run in a fixed order: turn, range, role, occupancy, rules.
    /// The turn check comes first so a duplicate request from the previous
    /// mover is refused before anything else is looked at.
    pub fn down(&mut self, role: ParticipantRole, pos: Position) -> Result<Verdict, MoveError> {
        if role.is_player() && role != self.next_to_move() {
            return Err(MoveError::WrongTurn);
        }
        if !self.board.contains(pos) {
            return Err(MoveError::OutOfRange);
        }
        if !role.is_player() {
            return Err(MoveError::InvalidRole);
        }
        if self.board.get(pos) != Some(CellState::Empty) {
            return Err(MoveError::Occupied);
        }
        self.rules.check(&self.board, pos, role)?;

        self.board.place(role, pos)
    }
}
