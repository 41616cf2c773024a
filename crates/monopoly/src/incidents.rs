//! Random incidents drawn on event cells

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incident {
    /// Every other living player pays the actor this much.
    Birthday { amount: i64 },
    /// The actor pays the bank per build level across their holdings.
    Repairs { per_level: i64 },
    /// Teleport to the portal cell.
    Travel,
    /// Straight to prison.
    Arrest,
    /// The bank pays the actor.
    Windfall { amount: i64 },
    /// The actor pays the bank.
    Fine { amount: i64 },
}

/// Weighted incident table. Draws are proportional to each entry's weight.
#[derive(Debug, Clone)]
pub struct IncidentTable {
    entries: Vec<(u32, Incident)>,
    total_weight: u32,
}

impl IncidentTable {
    pub fn new(entries: Vec<(u32, Incident)>) -> Self {
        debug_assert!(!entries.is_empty());
        let total_weight = entries.iter().map(|(w, _)| *w).sum();
        debug_assert!(total_weight > 0);
        Self {
            entries,
            total_weight,
        }
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> Incident {
        let mut roll = rng.gen_range(0..self.total_weight);
        for (weight, incident) in &self.entries {
            if roll < *weight {
                return *incident;
            }
            roll -= weight;
        }
        // Weights sum to total_weight, so the loop always returns.
        self.entries[self.entries.len() - 1].1
    }
}

impl Default for IncidentTable {
    fn default() -> Self {
        Self::new(vec![
            (3, Incident::Birthday { amount: 20 }),
            (2, Incident::Repairs { per_level: 25 }),
            (2, Incident::Travel),
            (1, Incident::Arrest),
            (3, Incident::Windfall { amount: 100 }),
            (3, Incident::Fine { amount: 75 }),
        ])
    }
}
