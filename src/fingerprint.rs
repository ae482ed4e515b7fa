//! The persisted field layout of a title block ("fingerprint").
//!
//! Writes always produce version 2 (rectangles). Reads accept version 2 and the
//! legacy version 1 (anchor clicks), and normalize both into [`FieldAreas`].
//! Individual malformed entries are dropped; an unreadable fingerprint as a whole
//! reads as "nothing tagged yet".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::{FieldAreas, FieldKey};
use crate::geometry::{clamp01, CropFrame, NormRect};

pub const CURRENT_VERSION: u32 = 2;

/// Width and height, in crop-frame units, of the box a legacy click stands for.
pub const LEGACY_ANCHOR_SIZE: f64 = 0.15;

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub field: FieldKey,
    pub x_rel: f64,
    pub y_rel: f64,
    pub width_rel: f64,
    pub height_rel: f64,
}

impl AreaRecord {
    pub fn from_rect(field: FieldKey, rect: &NormRect<CropFrame>) -> Self {
        Self {
            field,
            x_rel: rect.left,
            y_rel: rect.top,
            width_rel: rect.width,
            height_rel: rect.height,
        }
    }

    pub fn rect(&self) -> Option<NormRect<CropFrame>> {
        NormRect::new(self.x_rel, self.y_rel, self.width_rel, self.height_rel)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub field: FieldKey,
    pub x_rel: f64,
    pub y_rel: f64,
}

impl ClickRecord {
    /// The approximate box a click stands for: centred on the click, with any
    /// side that would leave the crop clipped at the edge. The click itself
    /// always stays inside the box.
    pub fn expand(&self) -> Option<NormRect<CropFrame>> {
        if !(self.x_rel.is_finite() && self.y_rel.is_finite()) {
            return None;
        }
        let (cx, cy) = (clamp01(self.x_rel), clamp01(self.y_rel));
        let half = LEGACY_ANCHOR_SIZE / 2.0;
        let (left, right) = ((cx - half).max(0.0), (cx + half).min(1.0));
        let (top, bottom) = ((cy - half).max(0.0), (cy + half).min(1.0));
        NormRect::new(left, top, right - left, bottom - top)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintV2 {
    pub version: u32,
    pub areas: Vec<AreaRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintV1 {
    pub version: u32,
    pub clicks: Vec<ClickRecord>,
}

impl FingerprintV2 {
    pub fn from_areas(areas: &FieldAreas) -> Self {
        Self {
            version: CURRENT_VERSION,
            areas: areas
                .iter()
                .map(|(field, rect)| AreaRecord::from_rect(field, rect))
                .collect(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fingerprint {
    V1(FingerprintV1),
    V2(FingerprintV2),
}

impl Fingerprint {
    pub fn version(&self) -> u32 {
        match self {
            Fingerprint::V1(_) => 1,
            Fingerprint::V2(_) => 2,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Fingerprint::V1(_))
    }

    /// Everything as rectangles. Later entries for the same field win.
    pub fn field_areas(&self) -> FieldAreas {
        match self {
            Fingerprint::V2(fp) => fp
                .areas
                .iter()
                .filter_map(|a| a.rect().map(|r| (a.field, r)))
                .collect(),
            Fingerprint::V1(fp) => fp
                .clicks
                .iter()
                .filter_map(|c| c.expand().map(|r| (c.field, r)))
                .collect(),
        }
    }

    /// Lenient read. Accepts an object or a JSON-encoded string of one.
    pub fn parse(raw: &Value) -> Option<Fingerprint> {
        if let Value::String(text) = raw {
            let inner: Value = serde_json::from_str(text).ok()?;
            return Self::parse_object(&inner);
        }
        Self::parse_object(raw)
    }

    fn parse_object(raw: &Value) -> Option<Fingerprint> {
        let obj = raw.as_object()?;
        let version = match obj.get("version").and_then(Value::as_f64) {
            Some(v) if v.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&v) => v as u32,
            Some(v) => {
                tracing::warn!(version = v, "ignoring fingerprint with non-integer version");
                return None;
            }
            None if obj.contains_key("areas") => 2,
            None if obj.contains_key("clicks") => 1,
            None => return None,
        };
        match version {
            2 => Some(Fingerprint::V2(FingerprintV2 {
                version,
                areas: parse_entries(obj.get("areas"), |a: &AreaRecord| a.rect().is_some()),
            })),
            1 => Some(Fingerprint::V1(FingerprintV1 {
                version,
                clicks: parse_entries(obj.get("clicks"), |c: &ClickRecord| c.expand().is_some()),
            })),
            other => {
                tracing::warn!(version = other, "ignoring fingerprint with unknown version");
                None
            }
        }
    }
}

fn parse_entries<T, P>(list: Option<&Value>, valid: P) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
    P: Fn(&T) -> bool,
{
    let Some(Value::Array(items)) = list else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<T>(item.clone()).ok())
        .filter(|entry| valid(entry))
        .collect()
}

/// Missing or unreadable fingerprints come back as `None`.
pub fn parse_fingerprint(raw: Option<&Value>) -> Option<Fingerprint> {
    match raw {
        None | Some(Value::Null) => None,
        Some(v) => Fingerprint::parse(v),
    }
}
