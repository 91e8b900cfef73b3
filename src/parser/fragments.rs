use std::sync::LazyLock;

use regex::Regex;

// A marker is a run of pictographs, each optionally joined by ZWJ / variation selector.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:[",
        r"\x{1F300}-\x{1F5FF}",
        r"\x{1F600}-\x{1F64F}",
        r"\x{1F680}-\x{1F6FF}",
        r"\x{1F700}-\x{1F8FF}",
        r"\x{1F900}-\x{1F9FF}",
        r"\x{1FA00}-\x{1FAFF}",
        r"\x{2600}-\x{26FF}",
        r"\x{2700}-\x{27BF}",
        r"][\x{FE0F}\x{200D}]*)+",
    ))
    .unwrap()
});

/// One deal announcement cut out of a deal block.
#[derive(Debug, Clone, PartialEq)]
pub struct DealFragment {
    pub marker: String,
    /// Marker followed by the announcement text.
    pub text: String,
}

/// Split a deal block into one fragment per leading marker.
///
/// Text ahead of the first marker is dropped. A block without markers yields
/// nothing: the heading match most likely landed on the wrong section.
pub fn split(block: &str) -> Vec<DealFragment> {
    let markers: Vec<_> = MARKER_RE.find_iter(block).collect();

    markers
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = markers.get(i + 1).map_or(block.len(), |next| next.start());
            let trailing = block[m.end()..end].trim();
            let text = if trailing.is_empty() {
                m.as_str().to_string()
            } else {
                format!("{} {}", m.as_str(), trailing)
            };
            DealFragment {
                marker: m.as_str().to_string(),
                text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_markers_no_fragments() {
        let block = "Acme raised $5m in Seed funding.\nBeta raised $2m.";
        assert!(split(block).is_empty());
        assert!(split("").is_empty());
    }

    #[test]
    fn one_fragment_per_marker() {
        let block = "🌱 Acme raised $5m in Seed funding from Foo.\n⚡ Volt raised $12m Series A.\n🏭 Forge raised $40m.";
        let frags = split(block);
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[0].marker, "🌱");
        assert_eq!(frags[0].text, "🌱 Acme raised $5m in Seed funding from Foo.");
        assert_eq!(frags[1].text, "⚡ Volt raised $12m Series A.");
        assert_eq!(frags[2].text, "🏭 Forge raised $40m.");
    }

    #[test]
    fn preamble_is_dropped() {
        let frags = split("Here are this week's deals:\n💧 Aqua raised $3m.");
        assert_eq!(frags.len(), 1);
        assert!(frags[0].text.starts_with("💧"));
        assert!(!frags[0].text.contains("this week"));
    }

    #[test]
    fn variation_selector_stays_with_marker() {
        let frags = split("✈️ AIR raised $23m in Series A funding from Entrée Capital.");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].marker, "✈\u{FE0F}");
        assert_eq!(
            frags[0].text,
            "✈\u{FE0F} AIR raised $23m in Series A funding from Entrée Capital."
        );
    }

    #[test]
    fn zwj_sequence_is_one_marker() {
        let frags = split("👩‍🔬 Lab raised $1m.");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].marker, "👩\u{200D}🔬");
    }

    #[test]
    fn adjacent_markers_are_one_run() {
        let frags = split("🔋🔋 Cell raised $9m.");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].marker, "🔋🔋");
    }

    #[test]
    fn count_matches_marker_runs() {
        let block = "🚗 A raised $1m 🚲 B raised $2m\n🚀";
        let frags = split(block);
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[2].text, "🚀");
    }
}
