use std::fmt::Display;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::normalize::normalize_wing;
use crate::types::Entry;

/// Length of the relative prefix (`../../fotos/presos/`) the portal puts in
/// front of every photo file name.
pub const PHOTO_SRC_PREFIX_LEN: usize = 19;

const CODE_PREFIX_LEN: usize = 2;
const WING_CELL_LABEL: &str = "ALA:";
const MIN_ENTRY_LINES: usize = 5;
const CODE_LINE: usize = 0;
const WING_CELL_LINE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Why a single container was left out of the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooFewLines { found: usize, text: String },
    MissingWingCellSeparator(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooFewLines { found, text } => write!(
                f,
                "expected at least {} lines, found {}: {:?}",
                MIN_ENTRY_LINES, found, text
            ),
            SkipReason::MissingWingCellSeparator(text) => {
                write!(f, "no '/' between wing and cell: {:?}", text)
            }
        }
    }
}

static ENTRY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".titulobkSingCAPS").expect("invalid selector: roster entry")
});

static NAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".titulobkSingCAPS .titulo12bk").expect("invalid selector: roster name")
});

static IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("invalid selector: image"));

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

/// Drops every space, trims the ends and splits what is left into lines.
/// Empty lines are kept: the wing/cell line is found by position.
pub fn split_entry_lines(text: &str) -> Vec<String> {
    text.replace(' ', "")
        .trim()
        .split('\n')
        .map(str::to_string)
        .collect()
}

pub fn strip_code_prefix(raw_code: &str) -> String {
    if raw_code.chars().count() > CODE_PREFIX_LEN {
        raw_code.chars().skip(CODE_PREFIX_LEN).collect()
    } else {
        raw_code.to_string()
    }
}

/// Splits `ALA:<wing>/<cell>` on the last `/`. Wing labels may contain `/`
/// themselves, cell labels never do.
pub fn split_wing_cell(raw: &str) -> Option<(String, String)> {
    let stripped = raw.replace(WING_CELL_LABEL, "");
    let (wing, cell) = stripped.rsplit_once('/')?;
    Some((wing.trim().to_string(), cell.trim().to_string()))
}

pub fn photo_url(base_url: &str, src: &str) -> String {
    let file: String = src.chars().skip(PHOTO_SRC_PREFIX_LEN).collect();
    format!("{}{}", base_url, file)
}

/// Parses the rendered roster page.
///
/// Containers, names and images are matched by index, so a container with no
/// name element means the three lists no longer line up and the whole page is
/// rejected. Malformed containers are skipped with a warning; a missing photo
/// leaves `photo_url` empty.
pub fn parse_roster(html: &str, photo_base_url: &str) -> Result<Vec<Entry>, ParseError> {
    let document = Html::parse_document(html);

    let containers: Vec<ElementRef> = document.select(&ENTRY_SELECTOR).collect();
    let names: Vec<ElementRef> = document.select(&NAME_SELECTOR).collect();
    let images: Vec<ElementRef> = document.select(&IMAGE_SELECTOR).collect();

    log::info!(
        "Found {} roster entries, {} names and {} photos",
        containers.len(),
        names.len(),
        images.len()
    );

    let mut entries = Vec::with_capacity(containers.len());

    for (i, container) in containers.iter().enumerate() {
        let text = elem_text(*container);
        let lines = split_entry_lines(&text);
        if lines.len() < MIN_ENTRY_LINES {
            log::warn!(
                "Skipping entry {}: {}",
                i,
                SkipReason::TooFewLines {
                    found: lines.len(),
                    text: lines.join("\n"),
                }
            );
            continue;
        }

        let raw_code = &lines[CODE_LINE];
        let raw_wing_cell = &lines[WING_CELL_LINE];

        let name = names
            .get(i)
            .map(|e| elem_text(*e).trim().to_string())
            .ok_or_else(|| ParseError::MissingField(format!("name for entry {}", i)))?;

        let photo = match images.get(i).and_then(|img| img.value().attr("src")) {
            Some(src) if !src.is_empty() => {
                let url = photo_url(photo_base_url, src);
                log::debug!("Photo URL for entry {}: {}", i, url);
                url
            }
            Some(_) => String::new(),
            None => {
                log::warn!("No photo source for entry {}", i);
                String::new()
            }
        };

        let Some((wing_raw, cell)) = split_wing_cell(raw_wing_cell) else {
            log::warn!(
                "Skipping entry {}: {}",
                i,
                SkipReason::MissingWingCellSeparator(raw_wing_cell.clone())
            );
            continue;
        };

        entries.push(Entry {
            code: strip_code_prefix(raw_code),
            wing: normalize_wing(&wing_raw),
            cell,
            photo_url: photo,
            name,
        });
    }

    Ok(entries)
}
