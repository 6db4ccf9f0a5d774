//! Board state and five-in-a-row detection.
//!
//! The board only knows about geometry: it rejects positions that are off
//! the grid or already taken. Turn order and role validity belong to the
//! engine in `game`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::MoveError;

/// Board dimensions used when a match is created without configuration.
pub const DEFAULT_BOARD_SIZE: usize = 15;

/// Stones in a row needed to win.
pub const WIN_LENGTH: usize = 5;

/// Contents of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Empty,
    Black,
    White,
}

/// A connection's standing within one match.
///
/// Shares colour names with [`CellState`] but is a different thing: an
/// observer is a role, never a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantRole {
    Black,
    White,
    Observer,
}

impl ParticipantRole {
    /// The cell this role paints, if it places stones at all.
    pub fn cell(self) -> Option<CellState> {
        match self {
            Self::Black => Some(CellState::Black),
            Self::White => Some(CellState::White),
            Self::Observer => None,
        }
    }

    /// The other colour. Observers have no opponent.
    pub fn opponent(self) -> Option<Self> {
        match self {
            Self::Black => Some(Self::White),
            Self::White => Some(Self::Black),
            Self::Observer => None,
        }
    }

    pub fn is_player(self) -> bool {
        !matches!(self, Self::Observer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Black => "Black",
            Self::White => "White",
            Self::Observer => "Observer",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board coordinate. Serialized as `[row, col]`.
///
/// Signed so that whatever a client sends can be represented and rejected
/// as out of range instead of failing to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    fn offset(self, (dr, dc): (i32, i32), steps: i32) -> Self {
        Self {
            row: self.row + dr * steps,
            col: self.col + dc * steps,
        }
    }
}

impl From<(i32, i32)> for Position {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

impl From<Position> for (i32, i32) {
    fn from(pos: Position) -> Self {
        (pos.row, pos.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The four lines through a cell along which a run can form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left to right
    Horizontal,
    /// Top to bottom
    Vertical,
    /// Top-left to bottom-right (↘)
    Diagonal,
    /// Top-right to bottom-left (↙)
    AntiDiagonal,
}

impl Axis {
    pub const ALL: [Axis; 4] = [
        Axis::Horizontal,
        Axis::Vertical,
        Axis::Diagonal,
        Axis::AntiDiagonal,
    ];

    /// Unit step (row, col) in the forward direction.
    fn step(self) -> (i32, i32) {
        match self {
            Self::Horizontal => (0, 1),
            Self::Vertical => (1, 0),
            Self::Diagonal => (1, 1),
            Self::AntiDiagonal => (1, -1),
        }
    }
}

/// Result of an accepted placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Winning,
}

impl Verdict {
    pub fn is_winning(self) -> bool {
        matches!(self, Self::Winning)
    }
}

/// Square grid of cells plus the role that placed the most recent stone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<CellState>,
    last_mover: Option<ParticipantRole>,
}

impl Board {
    /// Create an empty `size` x `size` board.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![CellState::Empty; size * size],
            last_mover: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Role that placed the most recent stone, if any stone was placed.
    pub fn last_mover(&self) -> Option<ParticipantRole> {
        self.last_mover
    }

    /// Check if position lies on the board.
    pub fn contains(&self, pos: Position) -> bool {
        self.index(pos).is_some()
    }

    /// Get cell at position, `None` when off the board.
    pub fn get(&self, pos: Position) -> Option<CellState> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Number of stones on the board.
    pub fn stone_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| **c != CellState::Empty)
            .count()
    }

    /// Row-major copy of the grid, for sending to clients.
    pub fn snapshot(&self) -> Vec<Vec<CellState>> {
        self.cells
            .chunks(self.size.max(1))
            .map(|row| row.to_vec())
            .collect()
    }

    /// Centre cell (rounded towards the origin on even sizes).
    pub fn center(&self) -> Position {
        let mid = (self.size / 2) as i32;
        Position::new(mid, mid)
    }

    /// Place a stone for `role` at `pos`.
    ///
    /// Rejects off-board and occupied positions. On success the cell is set,
    /// `last_mover` is updated and the win check runs from `pos`.
    pub fn place(&mut self, role: ParticipantRole, pos: Position) -> Result<Verdict, MoveError> {
        let idx = self.index(pos).ok_or(MoveError::OutOfRange)?;
        if self.cells[idx] != CellState::Empty {
            return Err(MoveError::Occupied);
        }
        let cell = role.cell().ok_or(MoveError::InvalidRole)?;

        self.cells[idx] = cell;
        self.last_mover = Some(role);

        if self.is_winning_at(pos) {
            Ok(Verdict::Winning)
        } else {
            Ok(Verdict::Accepted)
        }
    }

    /// Check whether the stone at `pos` completes a run of [`WIN_LENGTH`].
    ///
    /// All four axes are measured; any one reaching the threshold wins.
    pub fn is_winning_at(&self, pos: Position) -> bool {
        let cell = match self.get(pos) {
            Some(CellState::Empty) | None => return false,
            Some(cell) => cell,
        };
        let runs = Axis::ALL.map(|axis| self.run_length(pos, axis, cell));
        runs.iter().any(|&n| n >= WIN_LENGTH)
    }

    /// Length of the run of `cell` through `pos` along `axis`, looking at
    /// most `WIN_LENGTH - 1` cells each way.
    ///
    /// `pos` itself always counts, whatever it holds, so this also answers
    /// "what if a stone went here".
    pub fn run_length(&self, pos: Position, axis: Axis, cell: CellState) -> usize {
        self.run_length_within(pos, axis, cell, WIN_LENGTH - 1)
    }

    /// Same as [`run_length`](Self::run_length) with an explicit reach.
    pub fn run_length_within(
        &self,
        pos: Position,
        axis: Axis,
        cell: CellState,
        reach: usize,
    ) -> usize {
        let step = axis.step();
        let backward = (-step.0, -step.1);
        1 + self.walk(pos, step, cell, reach) + self.walk(pos, backward, cell, reach)
    }

    fn walk(&self, from: Position, step: (i32, i32), cell: CellState, reach: usize) -> usize {
        (1..=reach as i32)
            .map(|n| from.offset(step, n))
            .take_while(|p| self.get(*p) == Some(cell))
            .count()
    }

    fn index(&self, pos: Position) -> Option<usize> {
        let size = self.size as i32;
        if pos.row < 0 || pos.col < 0 || pos.row >= size || pos.col >= size {
            return None;
        }
        Some(pos.row as usize * self.size + pos.col as usize)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(DEFAULT_BOARD_SIZE)
    }
}
