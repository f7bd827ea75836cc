use std::collections::BTreeMap;

use crate::normalize::normalize_wing;
use crate::types::Entry;

#[derive(Debug, Default)]
pub struct RosterFilter {
    pub wing: Option<String>,
    pub name: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl RosterFilter {
    pub fn apply(self, mut entries: Vec<Entry>) -> Vec<Entry> {
        if let Some(wing) = self.wing {
            let wing = normalize_wing(&wing.replace(' ', ""));
            entries.retain(|e| e.wing == wing);
        }
        if let Some(name) = self.name {
            let needle = name.to_uppercase();
            entries.retain(|e| e.name.to_uppercase().contains(&needle));
        }
        if let Some(off) = self.offset {
            entries = entries.into_iter().skip(off).collect();
        }
        if let Some(lim) = self.limit {
            entries.truncate(lim);
        }
        entries
    }

    pub fn validate(self) -> Result<Self, String> {
        if self.wing.as_deref().is_some_and(|w| w.trim().is_empty()) {
            return Err("Wing must not be empty".to_string());
        }
        if self.offset.is_some_and(|o| o == 0) {
            return Err("Offset must be greater than 0".to_string());
        }
        if self.limit.is_some_and(|l| l == 0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(self)
    }
}

#[derive(Debug)]
pub struct RosterStats {
    pub per_wing: BTreeMap<String, usize>,
    pub without_photo: usize,
    pub total: usize,
}

impl RosterStats {
    pub fn from_entries(entries: &[Entry]) -> RosterStats {
        let mut per_wing = BTreeMap::new();
        for entry in entries {
            *per_wing.entry(entry.wing.clone()).or_insert(0) += 1;
        }
        RosterStats {
            per_wing,
            without_photo: entries.iter().filter(|e| e.photo_url.is_empty()).count(),
            total: entries.len(),
        }
    }
}

impl std::fmt::Display for RosterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        let width = self.per_wing.keys().map(|w| w.chars().count()).max().unwrap_or(0);
        for (wing, count) in &self.per_wing {
            let pad = width - wing.chars().count();
            writeln!(f, "  {}{}  {}", wing, " ".repeat(pad), count)?;
        }
        writeln!(f, "  Without photo: {}", self.without_photo)?;
        writeln!(f, "  Total:         {}", self.total)
    }
}
