//! Random pickers for meetups: a roulette over the members and a ladder game.

use rand::{Rng, seq::IndexedRandom};
use serde::Serialize;

use crate::model::Member;

/// Uniform pick among the non-admin members.
pub fn roulette<'a, R: Rng + ?Sized>(members: &'a [Member], rng: &mut R) -> Option<&'a Member> {
    let candidates: Vec<&Member> = members.iter().filter(|m| !m.is_admin).collect();
    candidates.choose(rng).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ladder {
    pub columns: usize,
    /// `rungs[row][i]` joins column `i` with column `i + 1`.
    pub rungs: Vec<Vec<bool>>,
}

impl Ladder {
    pub const MIN_ROWS: usize = 8;
    pub const MAX_ROWS: usize = 12;

    /// Rungs on one row never share a column.
    pub fn generate<R: Rng + ?Sized>(columns: usize, rng: &mut R) -> Self {
        let rows = rng.random_range(Self::MIN_ROWS..=Self::MAX_ROWS);
        let gaps = columns.saturating_sub(1);

        let rungs = (0..rows)
            .map(|_| {
                let mut previous = false;
                (0..gaps)
                    .map(|_| {
                        let rung = !previous && rng.random_bool(0.5);
                        previous = rung;
                        rung
                    })
                    .collect()
            })
            .collect();

        Self { columns, rungs }
    }

    /// Follows the ladder down from `start` and returns the column it ends in.
    pub fn trace(&self, start: usize) -> usize {
        let mut column = start;
        for row in &self.rungs {
            if row.get(column) == Some(&true) {
                column += 1;
            } else if column > 0 && row.get(column - 1) == Some(&true) {
                column -= 1;
            }
        }
        column
    }

    /// End column of every start column.
    pub fn assignments(&self) -> Vec<usize> {
        (0..self.columns).map(|start| self.trace(start)).collect()
    }
}
