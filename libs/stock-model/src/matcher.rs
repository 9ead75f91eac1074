//! Deterministic SKU lookup over a section
//!
//! Lookup order for a sheet code:
//! 1. normalized `sku` equal
//! 2. normalized `model` equal
//! 3. containment against `sku` or `model`, closest length first
//!
//! Remaining ties go to the record that comes first in the document. Every
//! lookup with more than one viable record reports the others as
//! alternatives so the choice can be reviewed.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::record::ProductView;
use crate::sku::{skus_match, MatchKind, SkuNormalizer, DEFAULT_MIN_CONTAINMENT_LEN};

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub normalizer: SkuNormalizer,
    pub min_containment_len: usize,
    /// Also compare against the `model` field
    pub match_model: bool,
    /// Allow substring matches at all
    pub allow_containment: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            normalizer: SkuNormalizer::new(),
            min_containment_len: DEFAULT_MIN_CONTAINMENT_LEN,
            match_model: true,
            allow_containment: true,
        }
    }
}

impl MatchOptions {
    /// Exact normalized SKU only (price checks)
    pub fn exact_only() -> Self {
        Self {
            match_model: false,
            allow_containment: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub key: String,
    pub kind: MatchKind,
    /// Other records that would also have matched
    pub alternatives: Vec<String>,
}

impl MatchResult {
    pub fn is_ambiguous(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    key: String,
    sku: String,
    model: Option<String>,
}

pub struct SkuIndex {
    entries: Vec<IndexEntry>,
    by_sku: HashMap<String, Vec<usize>>,
    by_model: HashMap<String, Vec<usize>>,
    options: MatchOptions,
}

impl SkuIndex {
    pub fn build<'a, I>(records: I, options: MatchOptions) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Map<String, Value>)>,
    {
        let mut index = Self {
            entries: Vec::new(),
            by_sku: HashMap::new(),
            by_model: HashMap::new(),
            options,
        };
        for (key, record) in records {
            let view = ProductView::from_record(&Value::Object(record.clone()));
            let sku = index.options.normalizer.normalize(view.sku.as_deref().unwrap_or(""));
            let model = view
                .model
                .as_deref()
                .map(|m| index.options.normalizer.normalize(m))
                .filter(|m| !m.is_empty());
            index.push(key, sku, model);
        }
        index
    }

    fn push(&mut self, key: &str, sku: String, model: Option<String>) {
        let idx = self.entries.len();
        if !sku.is_empty() {
            self.by_sku.entry(sku.clone()).or_default().push(idx);
        }
        if let Some(model) = &model {
            self.by_model.entry(model.clone()).or_default().push(idx);
        }
        self.entries.push(IndexEntry {
            key: key.to_string(),
            sku,
            model,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn normalize(&self, raw: &str) -> String {
        self.options.normalizer.normalize(raw)
    }

    /// Normalized SKUs shared by more than one record, with their keys
    pub fn duplicate_skus(&self) -> Vec<(String, Vec<String>)> {
        let mut dups: Vec<_> = self
            .by_sku
            .iter()
            .filter(|(_, idxs)| idxs.len() > 1)
            .map(|(sku, idxs)| (idxs[0], sku.clone(), self.keys(idxs)))
            .collect();
        dups.sort_by_key(|(first, _, _)| *first);
        dups.into_iter().map(|(_, sku, keys)| (sku, keys)).collect()
    }

    fn keys(&self, idxs: &[usize]) -> Vec<String> {
        idxs.iter().map(|i| self.entries[*i].key.clone()).collect()
    }

    fn exact(&self, map: &HashMap<String, Vec<usize>>, needle: &str, kind: MatchKind) -> Option<MatchResult> {
        let idxs = map.get(needle)?;
        let (first, rest) = idxs.split_first()?;
        Some(MatchResult {
            key: self.entries[*first].key.clone(),
            kind,
            alternatives: self.keys(rest),
        })
    }

    pub fn find(&self, raw: &str) -> Option<MatchResult> {
        let needle = self.normalize(raw);
        if needle.is_empty() {
            return None;
        }

        if let Some(found) = self.exact(&self.by_sku, &needle, MatchKind::Exact) {
            return Some(found);
        }
        if self.options.match_model {
            if let Some(found) = self.exact(&self.by_model, &needle, MatchKind::Model) {
                return Some(found);
            }
        }
        if !self.options.allow_containment {
            return None;
        }

        // (length difference, entry index)
        let mut hits: Vec<(usize, usize)> = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            let mut best: Option<usize> = None;
            let mut fields = vec![entry.sku.as_str()];
            if self.options.match_model {
                if let Some(model) = &entry.model {
                    fields.push(model);
                }
            }
            for field in fields {
                if skus_match(&needle, field, self.options.min_containment_len).is_some() {
                    let diff = needle.len().abs_diff(field.len());
                    best = Some(best.map_or(diff, |b| b.min(diff)));
                }
            }
            if let Some(diff) = best {
                hits.push((diff, idx));
            }
        }
        hits.sort_unstable();
        let ((_, first), rest) = hits.split_first()?;
        Some(MatchResult {
            key: self.entries[*first].key.clone(),
            kind: MatchKind::Containment,
            alternatives: rest.iter().map(|(_, i)| self.entries[*i].key.clone()).collect(),
        })
    }
}
