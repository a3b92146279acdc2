use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ::image::{DynamicImage, RgbImage};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex,
};
use tracing::{debug, info};

use crate::charts::ChartSnapshot;
use crate::error::{CapitalIqError, Result};
use crate::models::ExpenditureAnalysis;

pub const PDF_FILE_NAME: &str = "savings_planner.pdf";

// A4 dimensions (mm)
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const LEFT: f32 = 10.0;
const TITLE_Y: f32 = 20.0;
const FIRST_LINE_Y: f32 = 30.0;
const LINE_STEP: f32 = 10.0;
const BOTTOM_MARGIN: f32 = 10.0;
const CHART_H: f32 = 80.0;
const CHART_GAP: f32 = 10.0;
const TITLE_SIZE: f32 = 16.0;
const FONT_SIZE: f32 = 12.0;
const IMAGE_DPI: f32 = 300.0;

/// Where a chart lands: page index (0-based) and top offset in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSlot {
    pub page: usize,
    pub y: f32,
}

/// Stack `count` charts below `start_y`, starting a new page whenever the
/// next chart would overflow the bottom margin.
pub fn layout_charts(start_y: f32, count: usize) -> Vec<ChartSlot> {
    let mut page = 0;
    let mut y = start_y;
    let mut slots = Vec::with_capacity(count);
    for _ in 0..count {
        if y + CHART_H > PAGE_H - BOTTOM_MARGIN {
            page += 1;
            y = TITLE_Y;
        }
        slots.push(ChartSlot { page, y });
        y += CHART_H + CHART_GAP;
    }
    slots
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
    pages: usize,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| CapitalIqError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| CapitalIqError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: TITLE_Y,
            pages: 1,
        })
    }

    fn layer(&self) -> PdfLayerReference {
        self.doc
            .get_page(self.current_page)
            .get_layer(self.current_layer)
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = TITLE_Y;
        self.pages += 1;
    }

    fn text(&self, s: &str, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer()
            .use_text(s, size, Mm(LEFT), Mm(PAGE_H - self.y), font);
    }

    /// Place a raster image full width at the cursor, `CHART_H` tall.
    fn image(&mut self, img: RgbImage) {
        let (px_w, px_h) = img.dimensions();
        let natural_w = px_w as f32 / IMAGE_DPI * 25.4;
        let natural_h = px_h as f32 / IMAGE_DPI * 25.4;
        let width = PAGE_W - LEFT * 2.0;
        let transform = ImageTransform {
            translate_x: Some(Mm(LEFT)),
            translate_y: Some(Mm(PAGE_H - self.y - CHART_H)),
            scale_x: Some(width / natural_w),
            scale_y: Some(CHART_H / natural_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        };
        Image::from_dynamic_image(&DynamicImage::ImageRgb8(img))
            .add_to_layer(self.layer(), transform);
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| CapitalIqError::Pdf(format!("{e:?}")))?;
        buf.into_inner()
            .map_err(|e| CapitalIqError::Pdf(e.to_string()))
    }
}

/// Render the savings planner: suggestions first, then whichever chart
/// snapshots are available. Charts that cannot be captured are skipped.
pub fn render_planner(
    analysis: &ExpenditureAnalysis,
    charts: &[&dyn ChartSnapshot],
) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Savings Planner")?;
    pdf.text("Savings Planner", TITLE_SIZE, true);

    pdf.y = FIRST_LINE_Y;
    for line in analysis.suggestion_lines() {
        if pdf.y > PAGE_H - BOTTOM_MARGIN {
            pdf.new_page();
        }
        pdf.text(&line, FONT_SIZE, false);
        pdf.y += LINE_STEP;
    }

    let snapshots: Vec<RgbImage> = charts
        .iter()
        .enumerate()
        .filter_map(|(i, chart)| {
            let snap = chart.snapshot();
            if snap.is_none() {
                debug!(chart = i, "chart not rendered, skipping");
            }
            snap
        })
        .collect();

    let first_page = pdf.pages - 1;
    let slots = layout_charts(pdf.y + CHART_GAP, snapshots.len());
    for (img, slot) in snapshots.into_iter().zip(slots) {
        while pdf.pages <= first_page + slot.page {
            pdf.new_page();
        }
        pdf.y = slot.y;
        pdf.image(img);
    }

    debug!(pages = pdf.pages, "savings planner laid out");
    pdf.to_bytes()
}

/// Write `savings_planner.pdf` into `dir`.
pub fn export_planner(
    analysis: &ExpenditureAnalysis,
    charts: &[&dyn ChartSnapshot],
    dir: &Path,
) -> Result<PathBuf> {
    let bytes = render_planner(analysis, charts)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(PDF_FILE_NAME);
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), "exported savings planner");
    Ok(path)
}
