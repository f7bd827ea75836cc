use std::fmt::Display;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Format used for `captured_at` when shown to API clients.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One inmate row of the roster listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "Código")]
    pub code: String,
    #[serde(rename = "Ala")]
    pub wing: String,
    #[serde(rename = "Cela")]
    pub cell: String,
    #[serde(rename = "Foto")]
    pub photo_url: String,
    #[serde(rename = "Nome")]
    pub name: String,
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} — {} / {}",
            self.code, self.name, self.wing, self.cell
        )
    }
}

/// The complete result of one successful refresh cycle. Never mutated after
/// construction; replaced wholesale by the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    pub captured_at: NaiveDateTime,
}

impl Snapshot {
    /// Stamps `entries` with the current local time, truncated to seconds.
    pub fn new(entries: Vec<Entry>) -> Self {
        let now = Local::now().naive_local();
        Self::captured(entries, now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn captured(entries: Vec<Entry>, captured_at: NaiveDateTime) -> Self {
        Self {
            entries,
            captured_at,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn captured_at_display(&self) -> String {
        self.captured_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "┌─ Roster captured at {} ─ {} entr{}",
            self.captured_at_display(),
            self.entries.len(),
            if self.entries.len() == 1 { "y" } else { "ies" }
        )?;
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f, "│ {:>4}. {}", i + 1, entry)?;
        }
        write!(f, "└─")
    }
}
