//! Canonical spelling for wing labels.
//!
//! The portal renders the remission wings with inconsistent accents and
//! encodings (`REMIÇÃO01`, `REMICAO01`, `REMI��O01`, ...). They all start with
//! `REMI` and end with the wing number, which is enough to fold them together.

const REMISSION_PREFIX: &str = "REMI";
const REMISSION_WING_01: &str = "REMIÇÃO01";
const REMISSION_WING_02: &str = "REMIÇÃO02";

pub fn normalize_wing(label: &str) -> String {
    if label.starts_with(REMISSION_PREFIX) {
        if label.ends_with("01") {
            log::debug!("Normalized wing {} -> {}", label, REMISSION_WING_01);
            return REMISSION_WING_01.to_string();
        }
        if label.ends_with("02") {
            log::debug!("Normalized wing {} -> {}", label, REMISSION_WING_02);
            return REMISSION_WING_02.to_string();
        }
    }
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_remission_variants() {
        assert_eq!(normalize_wing("REMIXY01"), "REMIÇÃO01");
        assert_eq!(normalize_wing("REMIZZ02"), "REMIÇÃO02");
        assert_eq!(normalize_wing("REMI\u{FFFD}\u{FFFD}O01"), "REMIÇÃO01");
        assert_eq!(normalize_wing("REMICAO02"), "REMIÇÃO02");
        assert_eq!(normalize_wing("REMI01"), "REMIÇÃO01");
    }

    #[test]
    fn test_normalize_leaves_other_labels() {
        assert_eq!(normalize_wing("ALA1"), "ALA1");
        assert_eq!(normalize_wing("REMI03"), "REMI03");
        assert_eq!(normalize_wing("XREMI01"), "XREMI01");
        assert_eq!(normalize_wing("REMI"), "REMI");
        assert_eq!(normalize_wing(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "REMIXY01",
            "REMIZZ02",
            "REMIÇÃO01",
            "REMIÇÃO02",
            "ALA1",
            "SEGURO",
            "REMI",
            "",
            "REMI01/A",
            "ÇÃO",
        ];
        for s in samples {
            let once = normalize_wing(s);
            assert_eq!(normalize_wing(&once), once, "not idempotent for {s:?}");
        }
    }
}
