//! Paginated PDF report: title block plus one styled grid

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::NaiveDateTime;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect,
    Rgb,
};
use tracing::info;

use super::layout::{
    BODY_SIZE, HEADER_SIZE, META_SIZE, MM_PER_PT, PageGeometry, ReportLayout, TITLE_SIZE,
    body_row_height, cell_padding, fit_text, header_row_height, line_height,
};
use super::{ExportReport, ensure_parent};
use crate::harvest::{FIELD_NAMES, Record};
use crate::utils::{HarvestError, HarvestResult};

pub const REPORT_HEADING: &str = "Google Maps Business Extraction Report";

/// Run details printed in the title block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub keyword: String,
    pub location: String,
    pub generated_at: NaiveDateTime,
}

impl ReportContext {
    /// The five title lines, top to bottom
    pub fn title_lines(&self, total: usize) -> [String; 5] {
        [
            REPORT_HEADING.to_string(),
            format!("Keyword: {}", self.keyword),
            format!("Location: {}", self.location),
            format!("Date: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S")),
            format!("Total Businesses: {}", total),
        ]
    }
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

struct Palette {
    header_fill: Color,
    header_text: Color,
    body_fill: Color,
    body_text: Color,
    grid: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            header_fill: rgb(0.5, 0.5, 0.5),
            header_text: rgb(0.96, 0.96, 0.96),
            body_fill: rgb(0.96, 0.96, 0.86),
            body_text: rgb(0.0, 0.0, 0.0),
            grid: rgb(0.0, 0.0, 0.0),
        }
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Characters outside Latin-1 that WinAnsiEncoding still maps
const WIN_ANSI_EXTRAS: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Builtin fonts write WinAnsiEncoding; anything it cannot encode becomes `?`
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' | '\u{a0}'..='\u{ff}' => c,
            c if WIN_ANSI_EXTRAS.contains(c) => c,
            _ => '?',
        })
        .collect()
}

/// Table cells as the report prints them, before clipping to column width
fn report_rows(records: &[Record]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|r| r.to_row().iter().map(|c| pdf_safe(c)).collect())
        .collect()
}

/// Write the report for `records` to `path`
///
/// Same emptiness guard and column order as [`super::write_table`]. The
/// grid header repeats at the top of every continuation page.
pub fn write_report(
    records: &[Record],
    path: &Path,
    context: &ReportContext,
) -> HarvestResult<ExportReport> {
    if records.is_empty() {
        return Err(HarvestError::EmptyResultSet);
    }

    let rows = report_rows(records);
    let layout = ReportLayout::plan(PageGeometry::default(), &FIELD_NAMES, &rows);
    let page = layout.page;

    let (doc, first_page, first_layer) =
        PdfDocument::new(REPORT_HEADING, Mm(page.width), Mm(page.height), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| HarvestError::Export(e.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| HarvestError::Export(e.to_string()))?,
    };
    let palette = Palette::default();

    for (index, range) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(Mm(page.width), Mm(page.height), "Layer 1");
            doc.get_page(p).get_layer(l)
        };

        let mut top = page.height - page.margin;
        if index == 0 {
            top = draw_title(&layer, &fonts, &page, context, records.len());
        }
        draw_grid(&layer, &fonts, &palette, &layout, top, &rows[range.clone()]);
    }

    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| HarvestError::io(path, e))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| HarvestError::io(path, e))?;

    info!("PDF saved to {}", path.display());
    Ok(ExportReport {
        path: path.to_path_buf(),
        rows: records.len(),
        message: format!("PDF saved successfully to {}", path.display()),
    })
}

/// Returns the y coordinate where the grid starts
fn draw_title(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    page: &PageGeometry,
    context: &ReportContext,
    total: usize,
) -> f32 {
    let mut y = page.height - page.margin;
    layer.set_fill_color(rgb(0.0, 0.0, 0.0));

    for (i, line) in context.title_lines(total).iter().enumerate() {
        let (size, font) = if i == 0 {
            (TITLE_SIZE, &fonts.bold)
        } else {
            (META_SIZE, &fonts.regular)
        };
        y -= line_height(size);
        layer.use_text(pdf_safe(line), size, Mm(page.margin), Mm(y), font);
    }

    y - 12.0 * MM_PER_PT
}

fn draw_grid(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    palette: &Palette,
    layout: &ReportLayout,
    top: f32,
    rows: &[Vec<String>],
) {
    let left = layout.page.margin;
    let right = left + layout.grid_width();
    let offsets = layout.column_offsets();
    let header_h = header_row_height();
    let row_h = body_row_height();
    let bottom = top - header_h - rows.len() as f32 * row_h;

    // Backgrounds first so text and rules sit on top
    layer.set_fill_color(palette.header_fill.clone());
    layer.add_rect(
        Rect::new(Mm(left), Mm(top - header_h), Mm(right), Mm(top)).with_mode(PaintMode::Fill),
    );
    if !rows.is_empty() {
        layer.set_fill_color(palette.body_fill.clone());
        layer.add_rect(
            Rect::new(Mm(left), Mm(bottom), Mm(right), Mm(top - header_h))
                .with_mode(PaintMode::Fill),
        );
    }

    layer.set_fill_color(palette.header_text.clone());
    for (col, name) in FIELD_NAMES.iter().enumerate() {
        let text = fit_text(name, layout.columns[col], HEADER_SIZE);
        let baseline = top - header_h + 3.0;
        let x = offsets[col] + cell_padding();
        layer.use_text(text, HEADER_SIZE, Mm(x), Mm(baseline), &fonts.bold);
    }

    layer.set_fill_color(palette.body_text.clone());
    for (i, row) in rows.iter().enumerate() {
        let baseline = top - header_h - (i as f32 + 1.0) * row_h + 1.5;
        for (col, cell) in row.iter().enumerate() {
            let text = fit_text(cell, layout.columns[col], BODY_SIZE);
            let x = offsets[col] + cell_padding();
            layer.use_text(text, BODY_SIZE, Mm(x), Mm(baseline), &fonts.regular);
        }
    }

    layer.set_outline_color(palette.grid.clone());
    layer.set_outline_thickness(1.0);
    let rule = |x1: f32, y1: f32, x2: f32, y2: f32| {
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), Mm(y1)), false),
                (Point::new(Mm(x2), Mm(y2)), false),
            ],
            is_closed: false,
        });
    };

    rule(left, top, right, top);
    rule(left, top - header_h, right, top - header_h);
    for i in 1..=rows.len() {
        let y = top - header_h - i as f32 * row_h;
        rule(left, y, right, y);
    }
    for x in offsets.iter().copied().chain(std::iter::once(right)) {
        rule(x, top, x, bottom);
    }
}
