//! Pluggable legality rules.
//!
//! A [`RuleSet`] is assembled once when a match is created and consulted
//! before every placement, after the engine's own checks. The first rule
//! that objects aborts the placement; the board is never touched.
//!
//! Adding a rule means adding a type that implements [`Rule`] and, if it
//! should be selectable from configuration, a [`RuleKind`] variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::board::{Axis, Board, ParticipantRole, Position, WIN_LENGTH};
use super::error::MoveError;

/// A rule refused a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleViolation {
    /// Always negative.
    pub code: i32,
    pub rule: &'static str,
}

impl From<RuleViolation> for MoveError {
    fn from(v: RuleViolation) -> Self {
        MoveError::RuleViolation {
            code: v.code,
            rule: v.rule,
        }
    }
}

/// A single legality predicate evaluated before placement.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Stable name, used in logs and error reasons.
    fn name(&self) -> &'static str;

    /// Negative code reported when the rule is violated.
    fn code(&self) -> i32;

    /// Decide whether `role` may place at `pos` on `board`.
    ///
    /// `pos` is on the board and empty when this is called.
    fn allows(&self, board: &Board, pos: Position, role: ParticipantRole) -> bool;

    fn evaluate(
        &self,
        board: &Board,
        pos: Position,
        role: ParticipantRole,
    ) -> Result<(), RuleViolation> {
        if self.allows(board, pos, role) {
            Ok(())
        } else {
            Err(RuleViolation {
                code: self.code(),
                rule: self.name(),
            })
        }
    }
}

/// The opening stone must go on the centre cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterOpening;

impl Rule for CenterOpening {
    fn name(&self) -> &'static str {
        "center-opening"
    }

    fn code(&self) -> i32 {
        -1
    }

    fn allows(&self, board: &Board, pos: Position, _role: ParticipantRole) -> bool {
        board.stone_count() > 0 || pos == board.center()
    }
}

/// `role` may not form a run longer than five.
#[derive(Debug, Clone, Copy)]
pub struct NoOverline {
    pub role: ParticipantRole,
}

impl Rule for NoOverline {
    fn name(&self) -> &'static str {
        "no-overline"
    }

    fn code(&self) -> i32 {
        -2
    }

    fn allows(&self, board: &Board, pos: Position, role: ParticipantRole) -> bool {
        if role != self.role {
            return true;
        }
        let Some(cell) = role.cell() else {
            return true;
        };
        Axis::ALL
            .iter()
            .all(|axis| board.run_length_within(pos, *axis, cell, WIN_LENGTH) <= WIN_LENGTH)
    }
}

/// Rule names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "rule")]
pub enum RuleKind {
    CenterOpening,
    NoOverline { role: ParticipantRole },
}

impl RuleKind {
    pub fn build(self) -> Box<dyn Rule> {
        match self {
            Self::CenterOpening => Box::new(CenterOpening),
            Self::NoOverline { role } => Box::new(NoOverline { role }),
        }
    }
}

/// Ordered list of rules. Empty by default.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration, preserving order.
    pub fn from_kinds(kinds: &[RuleKind]) -> Self {
        Self {
            rules: kinds.iter().map(|k| k.build()).collect(),
        }
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Evaluate every rule in order; the first violation wins.
    pub fn check(
        &self,
        board: &Board,
        pos: Position,
        role: ParticipantRole,
    ) -> Result<(), RuleViolation> {
        self.rules
            .iter()
            .try_for_each(|rule| rule.evaluate(board, pos, role))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name())
    }
}
