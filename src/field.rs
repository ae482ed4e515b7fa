//! Title-block fields and the per-field areas drawn inside the crop.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{CropFrame, NormRect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    DrawingNumber,
    DrawingTitle,
    Revision,
    Other,
}

impl FieldKey {
    pub const ALL: [FieldKey; 4] = [
        FieldKey::DrawingNumber,
        FieldKey::DrawingTitle,
        FieldKey::Revision,
        FieldKey::Other,
    ];

    /// Wire name, as stored in fingerprints.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::DrawingNumber => "drawing_number",
            FieldKey::DrawingTitle => "drawing_title",
            FieldKey::Revision => "revision",
            FieldKey::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldKey::DrawingNumber => "Drawing number",
            FieldKey::DrawingTitle => "Title",
            FieldKey::Revision => "Revision",
            FieldKey::Other => "Other",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field key '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for FieldKey {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

// ── Field areas ─────────────────────────────────────────────────────────────

/// At most one crop-frame rectangle per field. Setting a field again replaces it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldAreas {
    areas: BTreeMap<FieldKey, NormRect<CropFrame>>,
}

impl FieldAreas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the area this replaced, if any.
    pub fn set(&mut self, field: FieldKey, rect: NormRect<CropFrame>) -> Option<NormRect<CropFrame>> {
        self.areas.insert(field, rect)
    }

    pub fn get(&self, field: FieldKey) -> Option<&NormRect<CropFrame>> {
        self.areas.get(&field)
    }

    pub fn clear(&mut self) {
        self.areas.clear();
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// In `FieldKey::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &NormRect<CropFrame>)> {
        self.areas.iter().map(|(k, r)| (*k, r))
    }
}

impl FromIterator<(FieldKey, NormRect<CropFrame>)> for FieldAreas {
    fn from_iter<I: IntoIterator<Item = (FieldKey, NormRect<CropFrame>)>>(iter: I) -> Self {
        let mut areas = FieldAreas::new();
        for (field, rect) in iter {
            areas.set(field, rect);
        }
        areas
    }
}
