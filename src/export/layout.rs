//! Page geometry for the PDF report
//!
//! Everything here is plain arithmetic in millimetres so pagination and
//! column fitting can be checked without rendering a document. Glyph
//! widths use a flat Helvetica average, which is close enough to keep
//! text inside its cell.

use std::ops::Range;

/// Millimetres per typographic point
pub const MM_PER_PT: f32 = 0.3528;

pub const TITLE_SIZE: f32 = 14.0;
pub const META_SIZE: f32 = 11.0;
pub const HEADER_SIZE: f32 = 10.0;
pub const BODY_SIZE: f32 = 8.0;

/// Average Helvetica advance as a fraction of the font size
const GLYPH_RATIO: f32 = 0.5;
const CELL_PADDING: f32 = 1.5;
const MIN_COLUMN: f32 = 8.0;

/// US letter, landscape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: 279.4,
            height: 215.9,
            margin: 12.7,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }
}

pub fn line_height(size: f32) -> f32 {
    size * MM_PER_PT * 1.4
}

pub fn glyph_width(size: f32) -> f32 {
    size * MM_PER_PT * GLYPH_RATIO
}

/// Header row is taller than body rows to leave room under the bold text
pub fn header_row_height() -> f32 {
    line_height(HEADER_SIZE) + 3.0
}

pub fn body_row_height() -> f32 {
    line_height(BODY_SIZE) + 1.5
}

/// Heading plus four metadata lines and a 12pt spacer
pub fn title_block_height() -> f32 {
    line_height(TITLE_SIZE) + 4.0 * line_height(META_SIZE) + 12.0 * MM_PER_PT
}

pub fn cell_padding() -> f32 {
    CELL_PADDING
}

/// Where every column and row goes
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub page: PageGeometry,
    /// Column widths in mm, summing to at most the content width
    pub columns: Vec<f32>,
    /// Body row indices drawn on each page; the header repeats on every page
    pub pages: Vec<Range<usize>>,
}

impl ReportLayout {
    pub fn plan<S: AsRef<str>>(page: PageGeometry, header: &[&str], rows: &[Vec<S>]) -> Self {
        let natural: Vec<f32> = (0..header.len())
            .map(|col| {
                let head = text_width(header[col], HEADER_SIZE);
                let body = rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| text_width(cell.as_ref(), BODY_SIZE))
                    .fold(0.0, f32::max);
                head.max(body) + 2.0 * CELL_PADDING
            })
            .collect();

        let columns = fit_columns(&natural, page.content_width());
        let pages = paginate(rows.len(), &page);

        Self {
            page,
            columns,
            pages,
        }
    }

    /// Left edge of each column, in mm from the page edge
    pub fn column_offsets(&self) -> Vec<f32> {
        self.columns
            .iter()
            .scan(self.page.margin, |x, w| {
                let left = *x;
                *x += w;
                Some(left)
            })
            .collect()
    }

    pub fn grid_width(&self) -> f32 {
        self.columns.iter().sum()
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * glyph_width(size)
}

/// Give every narrow column its natural width and split the rest evenly
///
/// Columns that fit within an even share of what is left keep their natural
/// width; the remaining ones divide the leftover space equally.
pub fn fit_columns(natural: &[f32], available: f32) -> Vec<f32> {
    let total: f32 = natural.iter().sum();
    if total <= available || natural.is_empty() {
        return natural.to_vec();
    }

    let mut widths = vec![None; natural.len()];
    let mut remaining = available;
    loop {
        let open: Vec<usize> = (0..natural.len()).filter(|&i| widths[i].is_none()).collect();
        if open.is_empty() {
            break;
        }
        let share = remaining / open.len() as f32;
        let settled: Vec<usize> = open
            .iter()
            .copied()
            .filter(|&i| natural[i] <= share)
            .collect();
        if settled.is_empty() {
            for i in open {
                widths[i] = Some(share.max(MIN_COLUMN));
            }
            break;
        }
        for i in settled {
            widths[i] = Some(natural[i]);
            remaining -= natural[i];
        }
    }

    widths.into_iter().map(|w| w.unwrap_or(MIN_COLUMN)).collect()
}

fn paginate(rows: usize, page: &PageGeometry) -> Vec<Range<usize>> {
    let per_page = |available: f32| {
        (((available - header_row_height()) / body_row_height()).floor() as usize).max(1)
    };
    let first = per_page(page.content_height() - title_block_height());
    let rest = per_page(page.content_height());

    let mut pages = Vec::new();
    let mut start = 0;
    let mut capacity = first;
    while start < rows {
        let end = (start + capacity).min(rows);
        pages.push(start..end);
        start = end;
        capacity = rest;
    }
    if pages.is_empty() {
        pages.push(0..0);
    }
    pages
}

/// Clip `text` to what fits in a cell of `width` mm at `size` pt
pub fn fit_text(text: &str, width: f32, size: f32) -> String {
    let max_chars = ((width - 2.0 * CELL_PADDING) / glyph_width(size)).floor().max(0.0) as usize;
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut clipped: String = text.chars().take(max_chars - 3).collect();
    clipped.push_str("...");
    clipped
}
