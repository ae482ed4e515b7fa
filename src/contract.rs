//! Wire types of the save/clear endpoints and the validation both sides share.
//!
//! The editor runs [`SaveRequest::validate`] before sending anything; the server
//! runs it again and answers 400 on failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::field::{FieldAreas, FieldKey};
use crate::fingerprint::FingerprintV2;
use crate::geometry::{CropFrame, NormRect, PageFrame};

const MAX_PAGE_ID_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TitleblockPayload {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaPayload {
    pub field: String,
    pub x_rel: f64,
    pub y_rel: f64,
    pub width_rel: f64,
    pub height_rel: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub page_id: String,
    pub titleblock: TitleblockPayload,
    #[serde(default)]
    pub areas: Vec<AreaPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    pub page_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub ok: bool,
    pub fingerprint: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub ok: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

/// A save that passed validation, in typed form.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedSave {
    pub page_id: String,
    pub titleblock: NormRect<PageFrame>,
    pub areas: FieldAreas,
}

impl ValidatedSave {
    pub fn fingerprint(&self) -> FingerprintV2 {
        FingerprintV2::from_areas(&self.areas)
    }
}

pub fn validate_page_id(page_id: &str) -> Result<(), ValidationError> {
    if page_id.trim().is_empty() {
        return Err(ValidationError::MissingPageId);
    }
    let ok = page_id.len() <= MAX_PAGE_ID_LEN
        && page_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        return Err(ValidationError::InvalidPageId(page_id.to_string()));
    }
    Ok(())
}

fn unit(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

impl SaveRequest {
    pub fn new(page_id: &str, titleblock: &NormRect<PageFrame>, areas: &FieldAreas) -> Self {
        Self {
            page_id: page_id.to_string(),
            titleblock: TitleblockPayload {
                x: titleblock.left,
                y: titleblock.top,
                width: titleblock.width,
                height: titleblock.height,
            },
            areas: areas
                .iter()
                .map(|(field, r)| AreaPayload {
                    field: field.as_str().to_string(),
                    x_rel: r.left,
                    y_rel: r.top,
                    width_rel: r.width,
                    height_rel: r.height,
                })
                .collect(),
        }
    }

    /// Decode an untyped body. Shape errors (missing keys, non-numbers) become
    /// [`ValidationError::Malformed`].
    pub fn from_value(body: Value) -> Result<Self, ValidationError> {
        serde_json::from_value(body).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    pub fn validate(&self) -> Result<ValidatedSave, ValidationError> {
        validate_page_id(&self.page_id)?;

        let tb = &self.titleblock;
        for (field, v) in [("x", tb.x), ("y", tb.y), ("width", tb.width), ("height", tb.height)] {
            if !unit(v) {
                return Err(ValidationError::TitleblockOutOfRange { field });
            }
        }
        let titleblock = NormRect::<PageFrame>::new(tb.x, tb.y, tb.width, tb.height)
            .ok_or(ValidationError::TitleblockEmpty)?;

        let mut areas = FieldAreas::new();
        for (index, area) in self.areas.iter().enumerate() {
            let key: FieldKey = area.field.parse().map_err(|_| ValidationError::UnknownField {
                index,
                key: area.field.clone(),
            })?;
            for (field, v) in [
                ("x_rel", area.x_rel),
                ("y_rel", area.y_rel),
                ("width_rel", area.width_rel),
                ("height_rel", area.height_rel),
            ] {
                if !unit(v) {
                    return Err(ValidationError::AreaOutOfRange { index, field });
                }
            }
            let rect = NormRect::<CropFrame>::new(area.x_rel, area.y_rel, area.width_rel, area.height_rel)
                .ok_or(ValidationError::AreaEmpty { index })?;
            if areas.set(key, rect).is_some() {
                return Err(ValidationError::DuplicateField { index, key });
            }
        }

        Ok(ValidatedSave {
            page_id: self.page_id.clone(),
            titleblock,
            areas,
        })
    }
}

impl ClearRequest {
    pub fn from_value(body: Value) -> Result<Self, ValidationError> {
        serde_json::from_value(body).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_page_id(&self.page_id)
    }
}
