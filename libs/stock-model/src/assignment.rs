//! Warehouse assignment for stock with no location data
//!
//! Flat stock sheets only carry a total per SKU. An [`AssignmentPolicy`]
//! maps that total to a list of candidate warehouses through quantity
//! tiers, and a [`WarehouseAssigner`] picks one candidate. With
//! [`Selection::First`] the result depends only on the quantity; with
//! [`Selection::Random`] it depends on the quantity and the seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::warehouse::WarehouseCode;

/// Candidates for quantities of at least `min_stock`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentTier {
    pub min_stock: u64,
    pub candidates: Vec<WarehouseCode>,
}

impl AssignmentTier {
    pub fn new(min_stock: u64, candidates: &[WarehouseCode]) -> Self {
        Self {
            min_stock,
            candidates: candidates.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPolicy {
    pub tiers: Vec<AssignmentTier>,
    /// Used when no tier applies
    pub fallback: Vec<WarehouseCode>,
}

impl AssignmentPolicy {
    /// Product table: large quantities stay in the main Cancún warehouse
    pub fn products() -> Self {
        use WarehouseCode::*;
        Self {
            tiers: vec![
                AssignmentTier::new(50, &[Ca]),
                AssignmentTier::new(20, &[Ca, Pu]),
                AssignmentTier::new(10, &[Ca, Pu, Si]),
                AssignmentTier::new(5, &[Ca1, Pu, Si, Reserved]),
            ],
            fallback: vec![Ca1, Ca2, Reserved, Cocz, Copz],
        }
    }

    /// Spare-part table
    pub fn spare_parts() -> Self {
        use WarehouseCode::*;
        Self {
            tiers: vec![
                AssignmentTier::new(100, &[Ca]),
                AssignmentTier::new(50, &[Ca, Pu, Mee]),
                AssignmentTier::new(20, &[Ca, Ca2, Pu, Si]),
                AssignmentTier::new(10, &[Ca1, Ca2, Ca3, Pu, Si]),
                AssignmentTier::new(5, &[Ca1, Ca2, Ca3, Ca4, Reserved]),
            ],
            fallback: WarehouseCode::ALL.to_vec(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback.is_empty() {
            return Err(ModelError::policy("fallback candidate list is empty"));
        }
        if self.fallback.iter().all(|code| code.is_reserved()) {
            return Err(ModelError::policy("fallback needs a warehouse other than 999"));
        }
        if let Some(tier) = self.tiers.iter().find(|t| t.candidates.is_empty()) {
            return Err(ModelError::policy(format!(
                "tier min_stock={} has no candidates",
                tier.min_stock
            )));
        }
        Ok(())
    }

    /// Candidates for a positive quantity: the highest tier it reaches
    pub fn candidates(&self, stock: u64) -> &[WarehouseCode] {
        self.tiers
            .iter()
            .filter(|tier| stock >= tier.min_stock)
            .max_by_key(|tier| tier.min_stock)
            .map(|tier| tier.candidates.as_slice())
            .unwrap_or(self.fallback.as_slice())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Always the first candidate
    #[default]
    First,
    /// Seeded random choice among candidates
    Random,
}

pub struct WarehouseAssigner {
    policy: AssignmentPolicy,
    selection: Selection,
    rng: StdRng,
}

impl WarehouseAssigner {
    pub fn new(policy: AssignmentPolicy, selection: Selection, seed: u64) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            selection,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn policy(&self) -> &AssignmentPolicy {
        &self.policy
    }

    /// Warehouse for `stock` units; zero stock has no warehouse
    pub fn assign(&mut self, stock: u64) -> Option<WarehouseCode> {
        if stock == 0 {
            return None;
        }
        let candidates = self.policy.candidates(stock);
        pick(self.selection, &mut self.rng, candidates)
    }

    /// Like [`assign`](Self::assign), but never the reserved warehouse
    ///
    /// Reserved candidates are dropped from the tier; a tier holding only
    /// `999` falls through to the fallback list.
    pub fn assign_available(&mut self, stock: u64) -> Option<WarehouseCode> {
        if stock == 0 {
            return None;
        }
        let open = |codes: &[WarehouseCode]| -> Vec<WarehouseCode> {
            codes.iter().copied().filter(|c| !c.is_reserved()).collect()
        };
        let mut candidates = open(self.policy.candidates(stock));
        if candidates.is_empty() {
            candidates = open(&self.policy.fallback);
        }
        pick(self.selection, &mut self.rng, &candidates)
    }
}

fn pick(selection: Selection, rng: &mut StdRng, candidates: &[WarehouseCode]) -> Option<WarehouseCode> {
    match selection {
        Selection::First => candidates.first().copied(),
        Selection::Random => candidates.choose(rng).copied(),
    }
}
