//! The page record as the store holds it, and how the editor reads it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::FieldAreas;
use crate::fingerprint::{parse_fingerprint, Fingerprint};
use crate::geometry::{NormRect, PageFrame};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    #[default]
    Pending,
    Rendered,
    Tagged,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub titleblock_x: Option<f64>,
    #[serde(default)]
    pub titleblock_y: Option<f64>,
    #[serde(default)]
    pub titleblock_width: Option<f64>,
    #[serde(default)]
    pub titleblock_height: Option<f64>,
    #[serde(default)]
    pub fingerprint: Option<Value>,
}

impl PageRecord {
    pub fn new(id: impl Into<String>, image_ref: Option<String>) -> Self {
        Self {
            id: id.into(),
            image_ref,
            ..Self::default()
        }
    }

    /// The stored title block, if it is a valid normalized rectangle.
    ///
    /// Some historical rows hold raw pixel values in these columns. Anything out of
    /// range reads as "no title block" rather than being reinterpreted.
    pub fn titleblock(&self) -> Option<NormRect<PageFrame>> {
        let (x, y, w, h) = (
            self.titleblock_x?,
            self.titleblock_y?,
            self.titleblock_width?,
            self.titleblock_height?,
        );
        let rect = NormRect::new(x, y, w, h);
        if rect.is_none() {
            tracing::warn!(page_id = %self.id, x, y, w, h, "ignoring out-of-range title block");
        }
        rect
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        parse_fingerprint(self.fingerprint.as_ref())
    }

    pub fn set_titleblock(&mut self, rect: Option<&NormRect<PageFrame>>) {
        self.titleblock_x = rect.map(|r| r.left);
        self.titleblock_y = rect.map(|r| r.top);
        self.titleblock_width = rect.map(|r| r.width);
        self.titleblock_height = rect.map(|r| r.height);
    }
}

/// What the editor needs to start a session on a page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSeed {
    pub page_id: String,
    pub region: Option<NormRect<PageFrame>>,
    pub areas: FieldAreas,
    pub legacy_fingerprint: bool,
}

impl From<&PageRecord> for PageSeed {
    fn from(record: &PageRecord) -> Self {
        let region = record.titleblock();
        let fingerprint = record.fingerprint();
        // Field areas only mean something relative to a title block.
        let areas = match (&region, &fingerprint) {
            (Some(_), Some(fp)) => fp.field_areas(),
            _ => FieldAreas::new(),
        };
        Self {
            page_id: record.id.clone(),
            region,
            legacy_fingerprint: region.is_some() && fingerprint.as_ref().is_some_and(Fingerprint::is_legacy),
            areas,
        }
    }
}
