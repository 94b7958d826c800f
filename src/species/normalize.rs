//! Species label normalization and reconciliation.
//!
//! The visual classifier emits labels such as `"Cyanocitta cristata (Blue Jay)"`
//! or `"671 Passer domesticus (House Sparrow)"`, while the audio recognizer
//! reports separate common and scientific names. Both sides are reduced to a
//! [`SpeciesName`] so they can be compared without caring which vocabulary
//! produced them.

use crate::constants::BACKGROUND_LABELS;
use serde::Serialize;

/// Species identity extracted from a detector label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpeciesName {
    /// Scientific (binomial) name, if one could be identified.
    pub scientific_name: Option<String>,
    /// Common name, if one could be identified.
    pub common_name: Option<String>,
    background: bool,
}

impl SpeciesName {
    /// Build a species name from already separated fields.
    ///
    /// Blank fields are treated as missing.
    pub fn from_parts(common_name: Option<&str>, scientific_name: Option<&str>) -> Self {
        let common_name = common_name.map(collapse_whitespace).filter(|s| !s.is_empty());
        let scientific_name = scientific_name
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty());
        let background = common_name.as_deref().is_some_and(is_background_label)
            || scientific_name.as_deref().is_some_and(is_background_label);

        Self {
            scientific_name,
            common_name,
            background,
        }
    }

    fn background() -> Self {
        Self {
            scientific_name: None,
            common_name: None,
            background: true,
        }
    }

    /// Whether the label denotes background noise rather than a bird.
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Whether neither name could be extracted.
    pub fn is_empty(&self) -> bool {
        !self.background && self.scientific_name.is_none() && self.common_name.is_none()
    }

    /// Preferred human-readable name: common name, else scientific name.
    pub fn display_name(&self) -> Option<&str> {
        self.common_name
            .as_deref()
            .or(self.scientific_name.as_deref())
    }

    /// Whether two names refer to the same taxon.
    ///
    /// Any name on one side equal to any name on the other side (ignoring
    /// case and whitespace) counts as a match. Background never matches.
    pub fn matches(&self, other: &Self) -> bool {
        if self.background || other.background {
            return false;
        }

        let theirs: Vec<String> = other.keys().collect();
        self.keys().any(|key| theirs.contains(&key))
    }

    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.scientific_name
            .iter()
            .chain(self.common_name.iter())
            .map(|name| comparison_key(name))
    }
}

/// Parse a free-text detector label into a [`SpeciesName`].
///
/// Rules, applied in order:
/// 1. Whitespace is trimmed and collapsed; an empty label yields no names.
/// 2. A leading numeric class index (`"671 ..."`) is dropped.
/// 3. Background labels (`background`, `non-bird`, ...) yield a background name.
/// 4. `"Scientific (Common)"` yields both names.
/// 5. `"Scientific_Common"` (`BirdNET` label format) yields both names.
/// 6. A bare binomial (`"Parus major"`) is a scientific name; anything else
///    is taken as a common name.
pub fn normalize(label: &str) -> SpeciesName {
    let collapsed = collapse_whitespace(label);
    let cleaned = strip_class_index(&collapsed);

    if cleaned.is_empty() {
        return SpeciesName::default();
    }
    if is_background_label(cleaned) {
        return SpeciesName::background();
    }

    if let Some((scientific, common)) = split_parenthesized(cleaned) {
        return SpeciesName::from_parts(common, scientific);
    }

    if let Some((scientific, common)) = cleaned.split_once('_') {
        return SpeciesName::from_parts(Some(common), Some(scientific));
    }

    if looks_binomial(cleaned) {
        SpeciesName::from_parts(None, Some(cleaned))
    } else {
        SpeciesName::from_parts(Some(cleaned), None)
    }
}

/// Whether a label is one of the known background/non-bird labels.
pub fn is_background_label(label: &str) -> bool {
    let key = comparison_key(label);
    BACKGROUND_LABELS.iter().any(|bg| key == *bg)
}

/// Lowercased, whitespace-collapsed form used for comparisons.
pub fn comparison_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_class_index(label: &str) -> &str {
    match label.split_once(' ') {
        Some((first, rest)) if first.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => label,
    }
}

/// Split `"Scientific (Common)"` into its parts.
///
/// Returns `None` when the label does not end with a parenthesized group.
fn split_parenthesized(label: &str) -> Option<(Option<&str>, Option<&str>)> {
    let inner_end = label.strip_suffix(')')?;
    let open = inner_end.rfind('(')?;
    let scientific = inner_end[..open].trim();
    let common = inner_end[open + 1..].trim();

    Some((
        (!scientific.is_empty()).then_some(scientific),
        (!common.is_empty()).then_some(common),
    ))
}

fn looks_binomial(label: &str) -> bool {
    let words: Vec<&str> = label.split(' ').collect();
    if !(2..=3).contains(&words.len()) {
        return false;
    }

    let mut first = words[0].chars();
    let genus_ok = first.next().is_some_and(|c| c.is_uppercase())
        && first.all(|c| c.is_alphabetic() && c.is_lowercase());

    genus_ok
        && words[1..]
            .iter()
            .all(|w| !w.is_empty() && w.chars().all(|c| c.is_lowercase() || c == '-'))
}
