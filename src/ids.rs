//! Prefixed identifier generation.
//!
//! IDs are `PREFIX + last 10 digits of unix millis + 5 random uppercase
//! alphanumerics`, capped at 20 chars for the prefixes in use (SCH, DT,
//! LOG, NS, NTF). Opaque to everything else in the engine.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a collision-resistant ID with the given prefix.
pub fn generate_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let start = millis.len().saturating_sub(10);
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("{prefix}{}{random}", &millis[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_carries_prefix() {
        let id = generate_id("SCHED");
        assert!(id.starts_with("SCHED"));
    }

    #[test]
    fn short_prefix_fits_varchar_20() {
        for prefix in ["LOG", "DOSE", "SCHED", "NOTSET"] {
            let id = generate_id(prefix);
            assert!(id.len() <= 20, "{id} exceeds 20 chars");
            assert_eq!(id.len(), prefix.len() + 15);
        }
    }

    #[test]
    fn ids_are_unique_in_practice() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_id("LOG")));
        }
    }

    #[test]
    fn random_part_is_uppercase_alphanumeric() {
        let id = generate_id("X");
        let tail = &id[id.len() - 5..];
        assert!(tail
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
