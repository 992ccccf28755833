use std::collections::BTreeMap;

use crate::types::Category;

/// Blendshape categories reported when no allow-list is configured.
pub const DEFAULT_REPORTED_KEYS: &[&str] = &["eyeBlinkLeft", "eyeBlinkRight", "mouthFunnel"];

/// Reduces the engine's full blendshape list to the reported categories.
///
/// Categories outside the allow-list are dropped. An allow-listed key the
/// engine did not report is left out of the result rather than zero-filled,
/// so a missing key means "not reported", never "score 0".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendshapeFilter {
    keys: Vec<String>,
}

impl BlendshapeFilter {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn extract(&self, categories: &[Category]) -> BTreeMap<String, f64> {
        categories
            .iter()
            .filter(|category| self.keys.iter().any(|key| *key == category.category_name))
            .map(|category| (category.category_name.clone(), round_score(category.score)))
            .collect()
    }
}

impl Default for BlendshapeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORTED_KEYS.iter().copied())
    }
}

/// Round to 3 decimal places.
fn round_score(score: f32) -> f64 {
    (score as f64 * 1000.0).round() / 1000.0
}
