//! Dice rolling for attacks and chat.
//!
//! Supports the notation used on the table: a run of signed terms, each either
//! a constant (`3`) or a dice group (`2d6`, `d20`). Parsing is lenient:
//! characters that do not form a term are skipped, and an expression with no
//! terms rolls to a total of 0 with empty details.

use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Upper bound on the number of dice rolled for a single term.
pub const MAX_DICE_PER_TERM: u32 = 1000;

/// Source of die rolls.
///
/// Every roll in the crate is composed from `roll_die`, so tests can swap in
/// a scripted roller and get fully deterministic combat.
pub trait DieRoller {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`.
    /// A zero-sided die rolls 0.
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<T: DieRoller + ?Sized> DieRoller for &mut T {
    fn roll_die(&mut self, sides: u32) -> u32 {
        (**self).roll_die(sides)
    }
}

impl<T: DieRoller + ?Sized> DieRoller for Box<T> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        (**self).roll_die(sides)
    }
}

/// Uniform die roller backed by any `rand` RNG.
#[derive(Debug, Clone)]
pub struct RngRoller<R> {
    rng: R,
}

impl<R: Rng> RngRoller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngRoller<ThreadRng> {
    /// Roller using the thread-local RNG.
    pub fn thread() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl RngRoller<StdRng> {
    /// Reproducible roller seeded from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> DieRoller for RngRoller<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// Roll a single die with the thread-local RNG.
pub fn roll_die(sides: u32) -> u32 {
    RngRoller::thread().roll_die(sides)
}

/// What a term contributes before its sign is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermKind {
    /// `count` dice with `sides` faces each.
    Dice { count: u32, sides: u32 },
    /// A flat number.
    Constant(u32),
}

/// One signed term of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub negative: bool,
    pub kind: TermKind,
}

/// A parsed dice expression (e.g. `2d6+3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub terms: Vec<DiceTerm>,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string. Never fails; see [`DiceExpression::is_empty`].
    pub fn parse(notation: &str) -> Self {
        let original = notation.trim().to_string();
        let compact: Vec<u8> = original
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|b| b.to_ascii_lowercase())
            .collect();

        let mut terms = Vec::new();
        let mut pos = 0;
        while pos < compact.len() {
            match scan_term(&compact, pos) {
                Some((term, end)) => {
                    terms.push(term);
                    pos = end;
                }
                None => pos += 1,
            }
        }

        Self { terms, original }
    }

    /// True when no term could be read from the notation.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Roll the expression with the thread-local RNG.
    pub fn roll(&self) -> DiceRollResult {
        self.roll_with(&mut RngRoller::thread())
    }

    /// Roll the expression with a specific roller (useful for testing).
    pub fn roll_with<R: DieRoller + ?Sized>(&self, roller: &mut R) -> DiceRollResult {
        let mut terms = Vec::with_capacity(self.terms.len());
        let mut total: i32 = 0;

        for term in &self.terms {
            let (rolls, value) = match term.kind {
                TermKind::Dice { count, sides } => {
                    let rolls: Vec<u32> = (0..count.min(MAX_DICE_PER_TERM))
                        .map(|_| roller.roll_die(sides))
                        .collect();
                    let sum: u64 = rolls.iter().map(|&r| u64::from(r)).sum();
                    (rolls, clamp_to_i32(sum))
                }
                TermKind::Constant(n) => (Vec::new(), clamp_to_i32(u64::from(n))),
            };

            total = if term.negative {
                total.saturating_sub(value)
            } else {
                total.saturating_add(value)
            };

            terms.push(TermResult {
                negative: term.negative,
                kind: term.kind,
                rolls,
                value,
            });
        }

        let details = render_details(&terms);
        debug!(expression = %self.original, total, %details, "dice rolled");

        DiceRollResult {
            total,
            details,
            original: self.original.clone(),
            terms,
        }
    }
}

impl FromStr for DiceExpression {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DiceExpression::parse(s))
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Try to read one term at `start`. Mirrors `[+-]?(\d*d\d+|\d+)`.
fn scan_term(bytes: &[u8], start: usize) -> Option<(DiceTerm, usize)> {
    let mut pos = start;
    let negative = match bytes.get(pos) {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let count_end = digits_end(bytes, pos);
    let count_digits = &bytes[pos..count_end];

    if bytes.get(count_end) == Some(&b'd') {
        let sides_start = count_end + 1;
        let sides_end = digits_end(bytes, sides_start);
        if sides_end > sides_start {
            let count = if count_digits.is_empty() {
                1
            } else {
                parse_number(count_digits)
            };
            let sides = parse_number(&bytes[sides_start..sides_end]);
            let term = DiceTerm {
                negative,
                kind: TermKind::Dice { count, sides },
            };
            return Some((term, sides_end));
        }
    }

    if count_digits.is_empty() {
        return None;
    }

    let term = DiceTerm {
        negative,
        kind: TermKind::Constant(parse_number(count_digits)),
    };
    Some((term, count_end))
}

fn digits_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    end
}

/// Saturating decimal parse of an ASCII digit run.
fn parse_number(digits: &[u8]) -> u32 {
    digits.iter().fold(0u32, |acc, d| {
        acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
    })
}

fn clamp_to_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn render_details(terms: &[TermResult]) -> String {
    let mut out = String::new();
    for (i, term) in terms.iter().enumerate() {
        match (i, term.negative) {
            (0, true) => out.push('-'),
            (0, false) => {}
            (_, true) => out.push_str(" - "),
            (_, false) => out.push_str(" + "),
        }
        match term.kind {
            TermKind::Dice { count, sides } => {
                let rolls = term
                    .rolls
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!("{count}d{sides} [{rolls}]"));
            }
            TermKind::Constant(n) => out.push_str(&n.to_string()),
        }
    }
    out
}

/// Result of rolling a single term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermResult {
    pub negative: bool,
    pub kind: TermKind,
    /// Individual die values; empty for constants.
    pub rolls: Vec<u32>,
    /// Unsigned contribution of the term.
    pub value: i32,
}

/// Complete result of a dice roll. Produced fresh per roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRollResult {
    pub total: i32,
    /// Human-readable breakdown, e.g. `2d6 [3, 5] + 3`.
    pub details: String,
    pub original: String,
    pub terms: Vec<TermResult>,
}

impl DiceRollResult {
    /// All individual die values in the order they were rolled.
    pub fn dice_values(&self) -> impl Iterator<Item = u32> + '_ {
        self.terms.iter().flat_map(|t| t.rolls.iter().copied())
    }

    /// True when the expression contained no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for DiceRollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.details, self.total)
    }
}

/// Parse and roll `notation` with the given roller.
pub fn roll<R: DieRoller + ?Sized>(notation: &str, roller: &mut R) -> DiceRollResult {
    DiceExpression::parse(notation).roll_with(roller)
}

/// Parse and roll `notation` with the thread-local RNG.
pub fn roll_expression(notation: &str) -> DiceRollResult {
    DiceExpression::parse(notation).roll()
}
