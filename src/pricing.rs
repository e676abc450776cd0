use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{CourtId, MatchSize};

#[derive(Debug, thiserror::Error)]
#[error("pricing lookup failed: {0}")]
pub struct PricingError(pub String);

/// Read-only price source. `Ok(None)` means no entry; the engine applies its default.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn price(
        &self,
        court_id: CourtId,
        slot_label: &str,
        match_size: MatchSize,
    ) -> Result<Option<Decimal>, PricingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub court_id: CourtId,
    pub slot_label: String,
    pub match_size: MatchSize,
    pub price: Decimal,
}

/// In-process price table keyed by (court, slot label, match size).
#[derive(Debug, Default)]
pub struct PriceTable {
    entries: DashMap<(CourtId, String, MatchSize), Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, entry: PriceEntry) {
        self.entries
            .insert((entry.court_id, entry.slot_label, entry.match_size), entry.price);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seed from a JSON array of [`PriceEntry`].
    pub fn load_json(&self, path: &Path) -> std::io::Result<usize> {
        let raw = std::fs::read(path)?;
        let entries: Vec<PriceEntry> = serde_json::from_slice(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let n = entries.len();
        for entry in entries {
            self.set(entry);
        }
        Ok(n)
    }

    /// Write every entry as a JSON array of [`PriceEntry`], replacing `path`
    /// via temp file and rename. Returns the number of entries written.
    pub fn save_json(&self, path: &Path) -> std::io::Result<usize> {
        let mut entries: Vec<PriceEntry> = self
            .entries
            .iter()
            .map(|e| {
                let (court_id, slot_label, match_size) = e.key().clone();
                PriceEntry {
                    court_id,
                    slot_label,
                    match_size,
                    price: *e.value(),
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.court_id, &a.slot_label, a.match_size).cmp(&(b.court_id, &b.slot_label, b.match_size))
        });
        let body = serde_json::to_vec_pretty(&entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension(format!("{}.tmp", ulid::Ulid::new()));
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(entries.len())
    }
}

#[async_trait]
impl PriceLookup for PriceTable {
    async fn price(
        &self,
        court_id: CourtId,
        slot_label: &str,
        match_size: MatchSize,
    ) -> Result<Option<Decimal>, PricingError> {
        Ok(self
            .entries
            .get(&(court_id, slot_label.to_string(), match_size))
            .map(|e| *e.value()))
    }
}
