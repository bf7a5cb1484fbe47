//! Rule-based item category detection.
//!
//! An item is `Rare` when its name carries any configured rarity marker
//! (knife and glove designations by default); everything else is `Common`.

use crate::config::ScoringConfig;
use crate::market::models::ItemCategory;

/// Case-insensitive substring classifier over a table of rarity markers.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    markers: Vec<String>,
}

impl CategoryClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(&config.rare_markers)
    }

    pub fn classify(&self, item_name: &str) -> ItemCategory {
        let name = item_name.to_lowercase();
        if self.markers.iter().any(|m| name.contains(m.as_str())) {
            ItemCategory::Rare
        } else {
            ItemCategory::Common
        }
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new(["★", "Knife", "Gloves", "Hand Wraps", "Karambit", "Bayonet"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knife_is_rare() {
        let classifier = CategoryClassifier::default();
        assert_eq!(
            classifier.classify("★ Butterfly Knife | Fade (Factory New)"),
            ItemCategory::Rare
        );
        assert_eq!(
            classifier.classify("★ Karambit | Doppler (Minimal Wear)"),
            ItemCategory::Rare
        );
    }

    #[test]
    fn test_gloves_are_rare() {
        let classifier = CategoryClassifier::default();
        assert_eq!(
            classifier.classify("★ Sport Gloves | Vice (Field-Tested)"),
            ItemCategory::Rare
        );
    }

    #[test]
    fn test_rifle_skin_is_common() {
        let classifier = CategoryClassifier::default();
        assert_eq!(
            classifier.classify("AK-47 | Redline (Field-Tested)"),
            ItemCategory::Common
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let classifier = CategoryClassifier::new(["knife"]);
        assert_eq!(classifier.classify("Shadow Daggers KNIFE"), ItemCategory::Rare);
    }

    #[test]
    fn test_custom_rule_table() {
        let classifier = CategoryClassifier::new(["Sticker", "  "]);
        assert_eq!(
            classifier.classify("Sticker | Titan (Holo) | Katowice 2014"),
            ItemCategory::Rare
        );
        assert_eq!(
            classifier.classify("★ Bayonet | Slaughter"),
            ItemCategory::Common
        );
    }

    #[test]
    fn test_empty_rule_table_is_all_common() {
        let classifier = CategoryClassifier::new(Vec::<String>::new());
        assert_eq!(classifier.classify("★ Bayonet"), ItemCategory::Common);
    }
}
