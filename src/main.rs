use std::sync::Arc;

use clap::Parser;
use eframe::egui;

use titleblock_annotator::app::AnnotatorApp;
use titleblock_annotator::client::{HttpPageService, PageService};
use titleblock_annotator::config::{init_tracing, EditorConfig};

fn main() {
    dotenvy::dotenv().ok();
    init_tracing("titleblock_annotator=info");

    let config = EditorConfig::parse();
    let service: Arc<dyn PageService> =
        match HttpPageService::new(&config.api_url, config.image_root.clone(), config.timeout()) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                eprintln!("Could not set up page service client: {e}");
                std::process::exit(1);
            }
        };

    let title = config.window_title();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title(&title),
        ..Default::default()
    };

    tracing::info!(page_id = %config.page_id, api_url = %config.api_url, "starting annotator");
    let page_id = config.page_id;
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Ok(Box::new(AnnotatorApp::new(&cc.egui_ctx, page_id, service)))),
    )
    .expect("Failed to run eframe");
}
