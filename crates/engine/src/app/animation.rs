use std::collections::BTreeMap;

use serde::Deserialize;

pub const MOVE_MARKER_ANIMATION: &str = "move_marker";

/// Label to frame-index sequence. Sequences may repeat frames or run backward.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AnimationCatalog {
    sequences: BTreeMap<String, Vec<u32>>,
}

impl Default for AnimationCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(MOVE_MARKER_ANIMATION, vec![0, 1, 2, 3, 2, 1]);
        catalog
    }
}

impl AnimationCatalog {
    pub fn empty() -> Self {
        Self {
            sequences: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, label: impl Into<String>, frames: Vec<u32>) {
        self.sequences.insert(label.into(), frames);
    }

    /// Adds every sequence from `other`, replacing labels that already exist.
    pub fn merge(&mut self, other: AnimationCatalog) {
        self.sequences.extend(other.sequences);
    }

    pub fn get(&self, label: &str) -> Option<&[u32]> {
        self.sequences.get(label).map(Vec::as_slice)
    }

    /// Frame shown at `step` animation ticks into a looping sequence.
    pub fn frame_at(&self, label: &str, step: u64) -> Option<u32> {
        let frames = self.get(label)?;
        if frames.is_empty() {
            return None;
        }
        Some(frames[(step % frames.len() as u64) as usize])
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_loop_in_catalog_order() {
        let catalog = AnimationCatalog::default();
        let frames: Vec<u32> = (0..8)
            .filter_map(|step| catalog.frame_at(MOVE_MARKER_ANIMATION, step))
            .collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 2, 1, 0, 1]);
    }

    #[test]
    fn unknown_or_empty_labels_have_no_frame() {
        let mut catalog = AnimationCatalog::empty();
        catalog.insert("blank", Vec::new());
        assert_eq!(catalog.frame_at("blank", 3), None);
        assert_eq!(catalog.frame_at("missing", 0), None);
    }

    #[test]
    fn catalog_deserializes_from_plain_object() {
        let catalog: AnimationCatalog =
            serde_json::from_str(r#"{"spin": [3, 2, 1, 0], "blink": [0, 0, 1]}"#).expect("parse");
        assert_eq!(catalog.get("spin"), Some(&[3, 2, 1, 0][..]));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn merge_overrides_matching_labels_and_keeps_the_rest() {
        let mut catalog = AnimationCatalog::default();
        let loaded: AnimationCatalog =
            serde_json::from_str(r#"{"move_marker": [3, 3, 0], "spin": [1]}"#).expect("parse");
        catalog.merge(loaded);
        assert_eq!(catalog.get(MOVE_MARKER_ANIMATION), Some(&[3, 3, 0][..]));
        assert_eq!(catalog.frame_at("spin", 7), Some(1));
        assert_eq!(catalog.len(), 2);
    }
}
