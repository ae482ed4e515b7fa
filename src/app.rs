use std::sync::Arc;

use egui_extras::{Size, StripBuilder};
use image::{DynamicImage, RgbaImage};
use serde_json::Value;

use crate::client::PageService;
use crate::crop::render_crop;
use crate::error::ServiceError;
use crate::field::FieldKey;
use crate::geometry::{CropFrame, Frame, NormRect, PageFrame, PixelRect, SurfaceBox};
use crate::record::PageSeed;
use crate::session::{Busy, Rejection, Session, Status, Tool};
use crate::task::{Latest, Poll};

// ── Colours ─────────────────────────────────────────────────────────────────

const REGION_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 170, 90);
const DRAFT_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 140, 0);

fn field_color(key: FieldKey) -> egui::Color32 {
    match key {
        FieldKey::DrawingNumber => egui::Color32::from_rgb(220, 40, 60),
        FieldKey::DrawingTitle => egui::Color32::from_rgb(40, 110, 230),
        FieldKey::Revision => egui::Color32::from_rgb(160, 60, 200),
        FieldKey::Other => egui::Color32::from_rgb(90, 90, 90),
    }
}

fn to_egui(r: PixelRect) -> egui::Rect {
    egui::Rect::from_min_size(egui::pos2(r.x, r.y), egui::vec2(r.width, r.height))
}

fn surface_of<F: Frame>(rect: egui::Rect) -> SurfaceBox<F> {
    SurfaceBox::new(rect.min.x, rect.min.y, rect.width(), rect.height())
}

fn outline(painter: &egui::Painter, rect: egui::Rect, color: egui::Color32, label: Option<&str>) {
    painter.rect_filled(rect, 0.0, color.gamma_multiply(0.15));
    painter.rect_stroke(rect, 0.0, egui::Stroke::new(2.0, color), egui::StrokeKind::Middle);
    if let Some(label) = label {
        painter.text(
            rect.left_top() + egui::vec2(3.0, 2.0),
            egui::Align2::LEFT_TOP,
            label,
            egui::FontId::proportional(12.0),
            color,
        );
    }
}

/// Rejections already land in the session status line.
fn noted<T>(result: Result<T, Rejection>) {
    if let Err(rejection) = result {
        tracing::debug!(%rejection, "action rejected");
    }
}

fn confirm_clear(page_id: &str) -> bool {
    let answer = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title("Clear title block")
        .set_description(format!(
            "Remove the title block and all field areas saved for page {page_id}?"
        ))
        .set_buttons(rfd::MessageButtons::YesNo)
        .show();
    matches!(answer, rfd::MessageDialogResult::Yes)
}

// ── Loading ─────────────────────────────────────────────────────────────────

struct LoadedPage {
    seed: PageSeed,
    image: Option<DynamicImage>,
}

fn load_page(service: &dyn PageService, page_id: &str) -> Result<LoadedPage, ServiceError> {
    let record = service.load_page(page_id)?;
    let image = match record.image_ref.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => Some(service.load_image(r)?),
        _ => None,
    };
    Ok(LoadedPage {
        seed: PageSeed::from(&record),
        image,
    })
}

enum Screen {
    Loading,
    Failed(String),
    NotReady,
    Ready(Box<Editor>),
}

// ── Zoomed crop ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct CropView {
    job: Latest<(NormRect<PageFrame>, RgbaImage)>,
    requested: Option<NormRect<PageFrame>>,
    shown: Option<(egui::TextureHandle, egui::Vec2)>,
}

impl CropView {
    /// Re-render whenever the confirmed region changes. A newer request replaces
    /// an older one still in flight.
    fn sync(&mut self, ctx: &egui::Context, image: &Arc<DynamicImage>, region: Option<NormRect<PageFrame>>) {
        if region != self.requested {
            self.requested = region;
            self.shown = None;
            match region {
                Some(region) => {
                    let image = Arc::clone(image);
                    let max_side = ctx.input(|i| i.max_texture_side);
                    let waker = ctx.clone();
                    self.job.spawn(
                        move || (region, render_crop(&image, &region, max_side)),
                        move || waker.request_repaint(),
                    );
                }
                None => self.job = Latest::default(),
            }
        }

        if let Poll::Ready((region, pixels)) = self.job.poll() {
            if Some(region) == self.requested {
                let size = [pixels.width() as usize, pixels.height() as usize];
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_flat_samples().as_slice());
                let texture = ctx.load_texture("titleblock-crop", color_image, egui::TextureOptions::LINEAR);
                self.shown = Some((texture, egui::vec2(size[0] as f32, size[1] as f32)));
            }
        }
    }
}

// ── Editor ──────────────────────────────────────────────────────────────────

struct Editor {
    session: Session,
    image: Arc<DynamicImage>,
    texture: Option<egui::TextureHandle>,
    crop: CropView,
    save_job: Latest<Result<Value, ServiceError>>,
    clear_job: Latest<Result<(), ServiceError>>,
}

impl Editor {
    fn new(seed: PageSeed, image: DynamicImage) -> Self {
        Self {
            session: Session::new(seed),
            image: Arc::new(image),
            texture: None,
            crop: CropView::default(),
            save_job: Latest::default(),
            clear_job: Latest::default(),
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        let rgba = self.image.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let pixels = rgba.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        self.texture = Some(ctx.load_texture("page", color_image, egui::TextureOptions::LINEAR));
    }

    fn poll_jobs(&mut self) {
        match self.save_job.poll() {
            Poll::Ready(outcome) => self.session.finish_save(outcome),
            Poll::Lost => self.session.abandon_pending("Save stopped unexpectedly; try again."),
            Poll::Idle | Poll::Pending => {}
        }
        match self.clear_job.poll() {
            Poll::Ready(outcome) => self.session.finish_clear(outcome),
            Poll::Lost => self.session.abandon_pending("Clear stopped unexpectedly; try again."),
            Poll::Idle | Poll::Pending => {}
        }
    }

    fn save(&mut self, ctx: &egui::Context, service: &Arc<dyn PageService>) {
        let Ok(request) = self.session.begin_save() else {
            return;
        };
        let service = Arc::clone(service);
        let waker = ctx.clone();
        self.save_job
            .spawn(move || service.save(&request), move || waker.request_repaint());
    }

    fn clear(&mut self, ctx: &egui::Context, service: &Arc<dyn PageService>) {
        if self.session.request_clear().is_err() || !confirm_clear(self.session.page_id()) {
            return;
        }
        let Ok(request) = self.session.begin_clear() else {
            return;
        };
        let service = Arc::clone(service);
        let waker = ctx.clone();
        self.clear_job
            .spawn(move || service.clear(&request), move || waker.request_repaint());
    }

    fn toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, service: &Arc<dyn PageService>) {
        ui.horizontal(|ui| {
            for tool in Tool::ALL {
                let mut label = tool.label().to_string();
                if let Tool::Field(key) = tool {
                    if self.session.areas().get(key).is_some() {
                        label.push_str(" ✔");
                    }
                }
                let selectable = egui::SelectableLabel::new(self.session.tool() == tool, label);
                if ui.add_enabled(self.session.tool_enabled(tool), selectable).clicked() {
                    noted(self.session.select_tool(tool));
                }
            }
            ui.separator();

            let idle = self.session.busy().is_none();
            let can_confirm = idle && self.session.region().is_none();
            if ui
                .add_enabled(can_confirm, egui::Button::new("Confirm title block"))
                .clicked()
            {
                noted(self.session.confirm_region());
            }
            let can_save = idle && self.session.region().is_some();
            if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
                self.save(ctx, service);
            }
            if ui.add_enabled(idle, egui::Button::new("Clear")).clicked() {
                self.clear(ctx, service);
            }
            if let Some(busy) = self.session.busy() {
                ui.spinner();
                ui.label(match busy {
                    Busy::Saving => "Saving",
                    Busy::Clearing => "Clearing",
                });
            }
        });
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        match self.session.status() {
            Some(Status::Error(text)) => {
                ui.colored_label(ui.visuals().error_fg_color, text);
            }
            Some(Status::Info(text)) => {
                ui.label(text);
            }
            None => {
                ui.label(match self.session.tool() {
                    Tool::TitleBlock => "Drag a rectangle around the title block, then confirm it.",
                    Tool::Field(_) => "Drag across the zoomed title block to mark the selected field.",
                });
            }
        }
    }

    /// The full page, scaled to fit the cell.
    fn page_surface(&mut self, ui: &mut egui::Ui) {
        let Some(texture) = &self.texture else {
            return;
        };
        let natural = texture.size_vec2();
        let avail = ui.available_size();
        let scale = (avail.x / natural.x).min(avail.y / natural.y).min(1.0).max(0.05);
        let (response, painter) = ui.allocate_painter(natural * scale, egui::Sense::drag());
        let rect = response.rect;
        painter.image(
            texture.id(),
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        let surface = surface_of::<PageFrame>(rect);

        // input
        let pointer = ui.ctx().pointer_latest_pos();
        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(p) = response
                .interact_pointer_pos()
                .and_then(|pos| surface.to_normalized(pos.x, pos.y))
            {
                self.session.page_pointer_down(p);
            }
        } else if self.session.is_dragging_region() {
            match pointer {
                Some(pos) if rect.contains(pos) => {
                    if let Some(p) = surface.to_normalized(pos.x, pos.y) {
                        self.session.page_pointer_move(p);
                    }
                }
                _ => self.session.page_pointer_leave(),
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            let p = pointer
                .filter(|pos| rect.contains(*pos))
                .and_then(|pos| surface.to_normalized(pos.x, pos.y));
            self.session.page_pointer_up(p);
        }

        // overlays
        if let Some(region) = self.session.region() {
            outline(&painter, to_egui(surface.rect_to_screen(region)), REGION_COLOR, Some("Title block"));
            for (key, area) in self.session.areas().iter() {
                let on_page = area.to_page(region);
                outline(&painter, to_egui(surface.rect_to_screen(&on_page)), field_color(key), None);
            }
        }
        if let Some(draft) = self.session.region_draft() {
            outline(&painter, to_egui(surface.rect_to_screen(&draft)), DRAFT_COLOR, Some("Draft"));
        }
    }

    /// The magnified title block where fields are drawn.
    fn zoom_surface(&mut self, ui: &mut egui::Ui) {
        if self.session.region().is_none() {
            ui.weak("Confirm a title block to see it magnified here.");
            return;
        }
        let Some((texture, size)) = &self.crop.shown else {
            ui.spinner();
            return;
        };
        let (texture_id, size) = (texture.id(), *size);

        egui::ScrollArea::both().show(ui, |ui| {
            let (response, painter) = ui.allocate_painter(size, egui::Sense::drag());
            let rect = response.rect;
            painter.image(
                texture_id,
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
            // measured against this surface's own box, never the page's
            let surface = surface_of::<CropFrame>(rect);

            let pointer = ui.ctx().pointer_latest_pos();
            let dragging = self.session.area_draft().is_some();
            if response.drag_started_by(egui::PointerButton::Primary) {
                if let Some(p) = response
                    .interact_pointer_pos()
                    .and_then(|pos| surface.to_normalized(pos.x, pos.y))
                {
                    self.session.crop_pointer_down(p);
                }
            } else if response.drag_stopped_by(egui::PointerButton::Primary) {
                let p = pointer
                    .filter(|pos| rect.contains(*pos))
                    .and_then(|pos| surface.to_normalized(pos.x, pos.y));
                noted(self.session.crop_pointer_up(p));
            } else if response.dragged_by(egui::PointerButton::Primary) {
                match pointer {
                    Some(pos) if rect.contains(pos) => {
                        if let Some(p) = surface.to_normalized(pos.x, pos.y) {
                            self.session.crop_pointer_move(p);
                        }
                    }
                    _ if dragging => noted(self.session.crop_pointer_leave()),
                    _ => {}
                }
            }

            for (key, area) in self.session.areas().iter() {
                outline(&painter, to_egui(surface.rect_to_screen(area)), field_color(key), Some(key.label()));
            }
            if let Some((key, draft)) = self.session.area_draft() {
                outline(&painter, to_egui(surface.rect_to_screen(&draft)), DRAFT_COLOR, Some(key.label()));
            }
        });
    }

    fn show(&mut self, ctx: &egui::Context, service: &Arc<dyn PageService>) {
        self.poll_jobs();
        self.ensure_texture(ctx);
        self.crop.sync(ctx, &self.image, self.session.region().copied());

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui, ctx, service);
        });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.status_line(ui);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            StripBuilder::new(ui)
                .size(Size::relative(0.45))
                .size(Size::remainder())
                .horizontal(|mut strip| {
                    strip.cell(|ui| self.page_surface(ui));
                    strip.cell(|ui| self.zoom_surface(ui));
                });
        });
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct AnnotatorApp {
    page_id: String,
    service: Arc<dyn PageService>,
    load: Latest<Result<LoadedPage, ServiceError>>,
    screen: Screen,
}

impl AnnotatorApp {
    pub fn new(ctx: &egui::Context, page_id: String, service: Arc<dyn PageService>) -> Self {
        let mut app = Self {
            page_id,
            service,
            load: Latest::default(),
            screen: Screen::Loading,
        };
        app.start_load(ctx);
        app
    }

    fn start_load(&mut self, ctx: &egui::Context) {
        self.screen = Screen::Loading;
        let service = Arc::clone(&self.service);
        let page_id = self.page_id.clone();
        let waker = ctx.clone();
        self.load.spawn(
            move || load_page(service.as_ref(), &page_id),
            move || waker.request_repaint(),
        );
    }

    fn poll_load(&mut self) {
        let outcome = match self.load.poll() {
            Poll::Ready(outcome) => outcome,
            Poll::Lost => {
                self.screen = Screen::Failed("Loading stopped unexpectedly.".into());
                return;
            }
            Poll::Idle | Poll::Pending => return,
        };
        self.screen = match outcome {
            Ok(LoadedPage { seed, image: Some(image) }) => {
                tracing::info!(page_id = %seed.page_id, region = seed.region.is_some(), areas = seed.areas.len(), "page loaded");
                Screen::Ready(Box::new(Editor::new(seed, image)))
            }
            Ok(LoadedPage { image: None, .. }) => Screen::NotReady,
            Err(e) => {
                tracing::warn!(page_id = %self.page_id, error = %e, "page load failed");
                Screen::Failed(e.to_string())
            }
        };
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_load();

        let mut retry = false;
        match &mut self.screen {
            Screen::Ready(editor) => editor.show(ctx, &self.service),
            Screen::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(format!("Loading page {}…", self.page_id));
                    });
                });
            }
            Screen::NotReady => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Page image not ready");
                    ui.label("This page has not been rendered yet. Try again once the worker has processed it.");
                    retry = ui.button("Reload").clicked();
                });
            }
            Screen::Failed(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Could not load page");
                    ui.colored_label(ui.visuals().error_fg_color, message.as_str());
                    retry = ui.button("Retry").clicked();
                });
            }
        }
        if retry {
            self.start_load(ctx);
        }
    }
}
