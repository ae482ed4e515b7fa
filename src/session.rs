//! The editing session for one page: tool selection, draft vs. confirmed title
//! block, per-field areas, and the Save / Clear handshakes.
//!
//! Everything here is synchronous. Save and Clear are split into `begin_*`, which
//! checks preconditions and returns the request to send, and `finish_*`, which
//! applies the outcome once the page service answers. Between the two the session
//! is busy and ignores drawing input.

use serde_json::Value;

use crate::contract::{ClearRequest, SaveRequest};
use crate::error::{ServiceError, ValidationError};
use crate::field::{FieldAreas, FieldKey};
use crate::geometry::{compute_norm_rect, CropFrame, Frame, NormPoint, NormRect, PageFrame};
use crate::record::PageSeed;

/// Smallest confirmable title block, as a fraction of the page on each axis.
pub const MIN_REGION_EXTENT: f64 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    TitleBlock,
    Field(FieldKey),
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::TitleBlock,
        Tool::Field(FieldKey::DrawingNumber),
        Tool::Field(FieldKey::DrawingTitle),
        Tool::Field(FieldKey::Revision),
        Tool::Field(FieldKey::Other),
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tool::TitleBlock => "Title block",
            Tool::Field(key) => key.label(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Busy {
    Saving,
    Clearing,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

impl Status {
    pub fn text(&self) -> &str {
        match self {
            Status::Info(s) | Status::Error(s) => s,
        }
    }
}

/// Why a user action did nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("Drag a rectangle around the title block first.")]
    NoDraft,

    #[error("Title block is too small ({width:.3} x {height:.3} of the page); drag a larger area.")]
    RegionTooSmall { width: f64, height: f64 },

    #[error("Title block is already confirmed. Clear it to draw a new one.")]
    RegionAlreadyConfirmed,

    #[error("Confirm a title block before saving.")]
    NoRegion,

    #[error("No selection made; drag across the zoomed title block.")]
    EmptySelection,

    #[error("Nothing to clear.")]
    NothingToClear,

    #[error("Still working on the previous request.")]
    Busy,

    #[error("The {0} tool is not available right now.")]
    ToolUnavailable(&'static str),

    #[error("{0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Drag<F: Frame> {
    start: NormPoint<F>,
    current: NormPoint<F>,
    active: bool,
}

impl<F: Frame> Drag<F> {
    fn begin(p: NormPoint<F>) -> Self {
        Self {
            start: p,
            current: p,
            active: true,
        }
    }

    // always recomputed from the two endpoints, never accumulated
    fn rect(&self) -> Option<NormRect<F>> {
        compute_norm_rect(self.start, self.current)
    }
}

#[derive(Clone, Debug)]
pub struct Session {
    page_id: String,
    tool: Tool,
    region: Option<NormRect<PageFrame>>,
    region_drag: Option<Drag<PageFrame>>,
    areas: FieldAreas,
    area_drag: Option<(FieldKey, Drag<CropFrame>)>,
    legacy_fingerprint: bool,
    busy: Option<Busy>,
    status: Option<Status>,
}

impl Session {
    pub fn new(seed: PageSeed) -> Self {
        let tool = if seed.region.is_some() {
            Tool::Field(FieldKey::DrawingNumber)
        } else {
            Tool::TitleBlock
        };
        let status = seed.legacy_fingerprint.then(|| {
            Status::Info("Field boxes come from legacy anchor clicks and are approximate; saving rewrites them.".into())
        });
        Self {
            page_id: seed.page_id,
            tool,
            region: seed.region,
            region_drag: None,
            areas: seed.areas,
            area_drag: None,
            legacy_fingerprint: seed.legacy_fingerprint,
            busy: None,
            status,
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn region(&self) -> Option<&NormRect<PageFrame>> {
        self.region.as_ref()
    }

    pub fn areas(&self) -> &FieldAreas {
        &self.areas
    }

    pub fn busy(&self) -> Option<Busy> {
        self.busy
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy_fingerprint
    }

    fn reject(&mut self, rejection: Rejection) -> Rejection {
        self.status = Some(match rejection {
            Rejection::NothingToClear => Status::Info(rejection.to_string()),
            _ => Status::Error(rejection.to_string()),
        });
        rejection
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status::Info(text.into()));
    }

    // ── Tools ───────────────────────────────────────────────────────────────

    pub fn tool_enabled(&self, tool: Tool) -> bool {
        if self.busy.is_some() {
            return false;
        }
        match tool {
            Tool::TitleBlock => self.region.is_none(),
            Tool::Field(_) => self.region.is_some(),
        }
    }

    pub fn select_tool(&mut self, tool: Tool) -> Result<(), Rejection> {
        if !self.tool_enabled(tool) {
            return Err(self.reject(Rejection::ToolUnavailable(tool.label())));
        }
        if self.tool != tool {
            self.area_drag = None;
        }
        self.tool = tool;
        Ok(())
    }

    fn drawing_region(&self) -> bool {
        self.busy.is_none() && self.region.is_none() && self.tool == Tool::TitleBlock
    }

    fn drawing_field(&self) -> Option<FieldKey> {
        match self.tool {
            Tool::Field(key) if self.busy.is_none() && self.region.is_some() => Some(key),
            _ => None,
        }
    }

    // ── Page surface ────────────────────────────────────────────────────────

    pub fn page_pointer_down(&mut self, p: NormPoint<PageFrame>) {
        if self.drawing_region() {
            self.region_drag = Some(Drag::begin(p));
        }
    }

    pub fn page_pointer_move(&mut self, p: NormPoint<PageFrame>) {
        if let Some(drag) = self.region_drag.as_mut().filter(|d| d.active) {
            drag.current = p;
        }
    }

    /// Ends the drag. The draft stays until confirmed or replaced.
    pub fn page_pointer_up(&mut self, p: Option<NormPoint<PageFrame>>) {
        if let Some(drag) = self.region_drag.as_mut().filter(|d| d.active) {
            if let Some(p) = p {
                drag.current = p;
            }
            drag.active = false;
        }
    }

    pub fn page_pointer_leave(&mut self) {
        self.page_pointer_up(None);
    }

    pub fn region_draft(&self) -> Option<NormRect<PageFrame>> {
        self.region_drag.as_ref().and_then(Drag::rect)
    }

    pub fn is_dragging_region(&self) -> bool {
        self.region_drag.is_some_and(|d| d.active)
    }

    pub fn confirm_region(&mut self) -> Result<NormRect<PageFrame>, Rejection> {
        if self.busy.is_some() {
            return Err(self.reject(Rejection::Busy));
        }
        if self.region.is_some() {
            return Err(self.reject(Rejection::RegionAlreadyConfirmed));
        }
        let Some(rect) = self.region_draft() else {
            return Err(self.reject(Rejection::NoDraft));
        };
        if rect.width < MIN_REGION_EXTENT || rect.height < MIN_REGION_EXTENT {
            return Err(self.reject(Rejection::RegionTooSmall {
                width: rect.width,
                height: rect.height,
            }));
        }

        self.region = Some(rect);
        self.region_drag = None;
        self.tool = Tool::Field(FieldKey::DrawingNumber);
        tracing::info!(page_id = %self.page_id, ?rect, "title block confirmed");
        self.info("Title block confirmed. Drag across the zoomed view to mark each field.");
        Ok(rect)
    }

    // ── Zoomed crop surface ─────────────────────────────────────────────────

    pub fn crop_pointer_down(&mut self, p: NormPoint<CropFrame>) {
        if let Some(key) = self.drawing_field() {
            self.area_drag = Some((key, Drag::begin(p)));
        }
    }

    pub fn crop_pointer_move(&mut self, p: NormPoint<CropFrame>) {
        if let Some((_, drag)) = self.area_drag.as_mut().filter(|(_, d)| d.active) {
            drag.current = p;
        }
    }

    /// Commits the drag straight away. `Ok(None)` when no drag was in progress.
    pub fn crop_pointer_up(
        &mut self,
        p: Option<NormPoint<CropFrame>>,
    ) -> Result<Option<(FieldKey, NormRect<CropFrame>)>, Rejection> {
        let Some((key, mut drag)) = self.area_drag.take().filter(|(_, d)| d.active) else {
            return Ok(None);
        };
        if let Some(p) = p {
            drag.current = p;
        }
        let Some(rect) = drag.rect() else {
            return Err(self.reject(Rejection::EmptySelection));
        };

        let replaced = self.areas.set(key, rect).is_some();
        tracing::debug!(page_id = %self.page_id, field = %key, ?rect, replaced, "field area set");
        self.info(if replaced {
            format!("{} area replaced.", key.label())
        } else {
            format!("{} area set.", key.label())
        });
        Ok(Some((key, rect)))
    }

    pub fn crop_pointer_leave(&mut self) -> Result<Option<(FieldKey, NormRect<CropFrame>)>, Rejection> {
        self.crop_pointer_up(None)
    }

    pub fn area_draft(&self) -> Option<(FieldKey, NormRect<CropFrame>)> {
        let (key, drag) = self.area_drag.as_ref()?;
        drag.rect().map(|r| (*key, r))
    }

    // ── Save ────────────────────────────────────────────────────────────────

    pub fn begin_save(&mut self) -> Result<SaveRequest, Rejection> {
        if self.busy.is_some() {
            return Err(self.reject(Rejection::Busy));
        }
        let Some(region) = self.region else {
            return Err(self.reject(Rejection::NoRegion));
        };
        let request = SaveRequest::new(&self.page_id, &region, &self.areas);
        if let Err(e) = request.validate() {
            return Err(self.reject(e.into()));
        }
        self.area_drag = None;
        self.busy = Some(Busy::Saving);
        self.info("Saving…");
        Ok(request)
    }

    /// `fingerprint` is what the store now holds.
    pub fn finish_save(&mut self, outcome: Result<Value, ServiceError>) {
        if self.busy != Some(Busy::Saving) {
            return;
        }
        self.busy = None;
        match outcome {
            Ok(fingerprint) => {
                self.legacy_fingerprint = false;
                tracing::info!(page_id = %self.page_id, %fingerprint, "save acknowledged");
                self.info(format!("Saved title block with {} field area(s).", self.areas.len()));
            }
            Err(e) => {
                tracing::warn!(page_id = %self.page_id, error = %e, "save failed");
                self.status = Some(Status::Error(format!("Save failed: {e}")));
            }
        }
    }

    // ── Clear ───────────────────────────────────────────────────────────────

    /// `Ok` means there is something to clear and the user should be asked.
    pub fn request_clear(&mut self) -> Result<(), Rejection> {
        if self.busy.is_some() {
            return Err(self.reject(Rejection::Busy));
        }
        if self.region.is_none() && self.areas.is_empty() {
            return Err(self.reject(Rejection::NothingToClear));
        }
        Ok(())
    }

    /// Call only after the user agreed to clear.
    pub fn begin_clear(&mut self) -> Result<ClearRequest, Rejection> {
        self.request_clear()?;
        self.busy = Some(Busy::Clearing);
        self.info("Clearing…");
        Ok(ClearRequest {
            page_id: self.page_id.clone(),
        })
    }

    pub fn finish_clear(&mut self, outcome: Result<(), ServiceError>) {
        if self.busy != Some(Busy::Clearing) {
            return;
        }
        self.busy = None;
        match outcome {
            Ok(()) => {
                self.region = None;
                self.region_drag = None;
                self.areas.clear();
                self.area_drag = None;
                self.legacy_fingerprint = false;
                self.tool = Tool::TitleBlock;
                tracing::info!(page_id = %self.page_id, "tagging cleared");
                self.info("Cleared. Draw a new title block.");
            }
            Err(e) => {
                tracing::warn!(page_id = %self.page_id, error = %e, "clear failed");
                self.status = Some(Status::Error(format!("Clear failed: {e}")));
            }
        }
    }

    /// Cancel a pending operation whose result will never arrive.
    pub fn abandon_pending(&mut self, reason: &str) {
        if self.busy.take().is_some() {
            self.status = Some(Status::Error(reason.to_string()));
        }
    }
}
