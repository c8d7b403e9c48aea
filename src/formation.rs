//! Balanced group sizing.
//!
//! Given N participants and a maximum group size K, a [`GroupPlan`] uses
//! `ceil(N / K)` groups whose sizes are all `floor(N / groups)` or one more.
//! The larger groups come first, and participants are placed in input order,
//! filling each group before moving to the next. The first participant placed
//! in a group becomes its leader.

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPlan {
    population: usize,
    num_groups: usize,
    base: usize,
    remainder: usize,
}

impl GroupPlan {
    /// Plan groups for `population` participants with at most `max_group_size` each.
    ///
    /// An empty population yields an empty plan. Callers placing a non-empty
    /// population bound `max_group_size` with [`validate_group_size`].
    pub fn new(population: usize, max_group_size: i64) -> Result<Self> {
        if max_group_size < 1 {
            return Err(CoreError::InvalidParameter(format!(
                "group_size must be at least 1, got {}",
                max_group_size
            )));
        }

        if population == 0 {
            return Ok(Self {
                population: 0,
                num_groups: 0,
                base: 0,
                remainder: 0,
            });
        }

        let max = usize::try_from(max_group_size).unwrap_or(usize::MAX);
        let num_groups = population.div_ceil(max);
        Ok(Self {
            population,
            num_groups,
            base: population / num_groups,
            remainder: population % num_groups,
        })
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn population(&self) -> usize {
        self.population
    }

    /// Target size of each group, largest first.
    pub fn sizes(&self) -> Vec<usize> {
        (0..self.num_groups)
            .map(|i| {
                if i < self.remainder {
                    self.base + 1
                } else {
                    self.base
                }
            })
            .collect()
    }

    /// Split `participants` into groups following the plan.
    ///
    /// Returns an error if the slice length differs from the planned population.
    pub fn assign<T: Clone>(&self, participants: &[T]) -> Result<Vec<Vec<T>>> {
        if participants.len() != self.population {
            return Err(CoreError::Internal(format!(
                "planned {} participants but got {}",
                self.population,
                participants.len()
            )));
        }

        let mut groups = Vec::with_capacity(self.num_groups);
        let mut rest = participants;
        for size in self.sizes() {
            let (head, tail) = rest.split_at(size);
            groups.push(head.to_vec());
            rest = tail;
        }
        Ok(groups)
    }
}

/// Check a requested group size against the number of participants to place.
pub fn validate_group_size(max_group_size: i64, population: usize) -> Result<()> {
    if max_group_size < 1 {
        return Err(CoreError::InvalidParameter(format!(
            "group_size must be at least 1, got {}",
            max_group_size
        )));
    }
    if usize::try_from(max_group_size).map_or(true, |max| max > population) {
        return Err(CoreError::InvalidParameter(format!(
            "group_size {} exceeds the {} participants to place",
            max_group_size, population
        )));
    }
    Ok(())
}

/// Partition `participants` into balanced groups of at most `max_group_size`.
pub fn partition<T: Clone>(participants: &[T], max_group_size: i64) -> Result<Vec<Vec<T>>> {
    GroupPlan::new(participants.len(), max_group_size)?.assign(participants)
}
