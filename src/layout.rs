//! Page model and cursor-driven layout primitives.
//!
//! A report is laid out into a [`ReportLayout`]: a list of pages, each holding
//! absolute draw operations in millimetres with the origin at the top-left
//! corner. Text coordinates are left-edge baselines; alignment is resolved
//! against the canvas [`TextMetrics`] when the text is placed. The layout is
//! plain data, so it can be inspected directly and is turned into PDF bytes by
//! [`crate::render`].

use crate::photos::EmbeddedImage;
use crate::text::{Align, Rgb, TextMetrics, TextStyle};

/// A4 width in millimetres.
pub const PAGE_WIDTH: f64 = 210.0;
/// A4 height in millimetres.
pub const PAGE_HEIGHT: f64 = 297.0;
/// Left and right margin.
pub const MARGIN_X: f64 = 15.0;
/// Cursor position after a page break.
pub const TOP_MARGIN: f64 = 20.0;
/// Usable width between the side margins.
pub const CONTENT_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN_X;
/// Lowest baseline a flowing paragraph line may use.
pub const TEXT_BOTTOM_LIMIT: f64 = PAGE_HEIGHT - 20.0;
/// Lowest edge a table row may reach.
pub const TABLE_BOTTOM_LIMIT: f64 = PAGE_HEIGHT - 14.0;

const CELL_PADDING: f64 = 1.76;
const STRIPE_FILL: Rgb = Rgb::grey(245);
const GRID_LINE: Rgb = Rgb::grey(200);
const BODY_TEXT: Rgb = Rgb(80, 80, 80);

/// A single absolute drawing instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// A single line of text; `x` is its left edge and `y` its baseline.
    Text {
        text: String,
        x: f64,
        y: f64,
        style: TextStyle,
    },
    /// A rectangle with an optional fill and an optional outline.
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    },
    /// An image stretched into the given box.
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image: usize,
    },
}

impl DrawOp {
    /// Returns the text of a text operation.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Operations drawn on one page, in painting order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    ops: Vec<DrawOp>,
}

impl Page {
    /// Returns the operations of the page.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Iterates over the text runs of the page.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(DrawOp::text)
    }

    /// Whether any text run equals `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|text| text == needle)
    }
}

/// Start of a named report section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionMark {
    /// Section heading.
    pub title: String,
    /// Zero-based page index where the section starts.
    pub page: usize,
}

/// How a photo cell was filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellContent {
    /// The photo was loaded and drawn.
    Photo,
    /// The photo failed to load; a bordered placeholder was drawn.
    Placeholder,
}

/// One slot of the photo grid.
#[derive(Clone, Debug, PartialEq)]
pub struct PhotoCell {
    /// Position of the photo in the input list.
    pub index: usize,
    /// Zero-based page index.
    pub page: usize,
    /// Left edge of the cell.
    pub x: f64,
    /// Top edge of the cell.
    pub y: f64,
    /// What was drawn.
    pub content: CellContent,
}

/// Horizontal and vertical write position plus the current page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cursor {
    /// Zero-based page index.
    pub page: usize,
    /// Horizontal offset, used by grid layouts.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            page: 0,
            x: MARGIN_X,
            y: TOP_MARGIN,
        }
    }
}

/// Visual theme of a [`Table`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableTheme {
    /// Every cell outlined.
    Grid,
    /// No outlines, alternating row shading.
    Striped,
}

/// A table with fixed column widths.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<f64>,
    head: Vec<String>,
    rows: Vec<Vec<String>>,
    theme: TableTheme,
    head_fill: Rgb,
    font_size: f64,
}

impl Table {
    /// Creates a table with the given column widths in millimetres.
    pub fn new(columns: impl Into<Vec<f64>>, theme: TableTheme) -> Self {
        Self {
            columns: columns.into(),
            head: Vec::new(),
            rows: Vec::new(),
            theme,
            head_fill: Rgb::BLACK,
            font_size: 9.0,
        }
    }

    /// Sets the head row and returns the updated table.
    pub fn with_head<I, S>(mut self, head: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.head = head.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the head background colour and returns the updated table.
    pub fn with_head_fill(mut self, fill: Rgb) -> Self {
        self.head_fill = fill;
        self
    }

    /// Sets the font size and returns the updated table.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Appends a body row and returns the updated table.
    pub fn with_row<I, S>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    /// Appends several body rows and returns the updated table.
    pub fn with_rows<R, I, S>(self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        rows.into_iter().fold(self, |table, row| table.with_row(row))
    }

    /// Returns the body rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn width(&self) -> f64 {
        self.columns.iter().sum()
    }
}

/// Result of laying out a report.
#[derive(Clone, Debug, Default)]
pub struct ReportLayout {
    pages: Vec<Page>,
    images: Vec<EmbeddedImage>,
    sections: Vec<SectionMark>,
    photo_cells: Vec<PhotoCell>,
}

impl ReportLayout {
    /// Returns the pages.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns the images referenced by [`DrawOp::Image`] operations.
    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    /// Returns the recorded section starts.
    pub fn sections(&self) -> &[SectionMark] {
        &self.sections
    }

    /// Returns the photo grid cells in input order.
    pub fn photo_cells(&self) -> &[PhotoCell] {
        &self.photo_cells
    }

    /// Returns the index of the first page containing a text run equal to `needle`.
    pub fn page_of_text(&self, needle: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.contains_text(needle))
    }
}

/// Mutable layout state used while a report is being emitted.
#[derive(Debug)]
pub struct Canvas {
    layout: ReportLayout,
    cursor: Cursor,
    metrics: TextMetrics,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Creates a canvas measuring text with the built-in Helvetica metrics.
    pub fn new() -> Self {
        Self::with_metrics(TextMetrics::Builtin)
    }

    /// Creates a canvas with one empty page and the cursor at the top margin.
    pub fn with_metrics(metrics: TextMetrics) -> Self {
        Self {
            layout: ReportLayout {
                pages: vec![Page::default()],
                ..ReportLayout::default()
            },
            cursor: Cursor::default(),
            metrics,
        }
    }

    /// Metrics used for alignment and wrapping.
    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    /// Current cursor.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Current vertical offset.
    pub fn y(&self) -> f64 {
        self.cursor.y
    }

    /// Moves the vertical cursor to `y`.
    pub fn set_y(&mut self, y: f64) {
        self.cursor.y = y;
    }

    /// Moves the vertical cursor down by `delta`.
    pub fn advance(&mut self, delta: f64) {
        self.cursor.y += delta;
    }

    /// Current horizontal offset.
    pub fn x(&self) -> f64 {
        self.cursor.x
    }

    /// Moves the horizontal cursor to `x`.
    pub fn set_x(&mut self, x: f64) {
        self.cursor.x = x;
    }

    /// Number of pages created so far.
    pub fn page_count(&self) -> usize {
        self.layout.pages.len()
    }

    /// Starts a new page and resets both cursors to the top-left margin.
    pub fn new_page(&mut self) {
        self.layout.pages.push(Page::default());
        self.cursor = Cursor {
            page: self.layout.pages.len() - 1,
            ..Cursor::default()
        };
    }

    /// Starts a new page when the vertical cursor is past `threshold`.
    ///
    /// Returns whether a page was added.
    pub fn break_if_below(&mut self, threshold: f64) -> bool {
        if self.cursor.y > threshold {
            self.new_page();
            true
        } else {
            false
        }
    }

    /// Records the start of a section on the current page.
    pub fn mark_section(&mut self, title: impl Into<String>) {
        self.layout.sections.push(SectionMark {
            title: title.into(),
            page: self.cursor.page,
        });
    }

    /// Records a photo grid cell.
    pub fn record_cell(&mut self, cell: PhotoCell) {
        self.layout.photo_cells.push(cell);
    }

    /// Registers an image and returns its index for [`DrawOp::Image`].
    pub fn add_image(&mut self, image: EmbeddedImage) -> usize {
        self.layout.images.push(image);
        self.layout.images.len() - 1
    }

    /// Pushes an operation onto the current page.
    pub fn push(&mut self, op: DrawOp) {
        let page = self.cursor.page;
        self.push_on(page, op);
    }

    /// Pushes an operation onto the given page.
    pub fn push_on(&mut self, page: usize, op: DrawOp) {
        if let Some(page) = self.layout.pages.get_mut(page) {
            page.ops.push(op);
        }
    }

    /// Draws one line of text with its baseline at `y`, anchored at `x` by `align`.
    pub fn text(&mut self, text: impl Into<String>, x: f64, y: f64, style: TextStyle, align: Align) {
        let text = text.into();
        let x = self.metrics.left_edge(&text, x, &style, align);
        self.push(DrawOp::Text { text, x, y, style });
    }

    /// Draws a rectangle.
    pub fn rect(
        &mut self,
        (x, y): (f64, f64),
        (width, height): (f64, f64),
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    ) {
        self.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        });
    }

    /// Draws a registered image into the given box.
    pub fn image(&mut self, image: usize, (x, y): (f64, f64), (width, height): (f64, f64)) {
        self.push(DrawOp::Image {
            x,
            y,
            width,
            height,
            image,
        });
    }

    /// Draws `text` wrapped to the content width starting at the cursor.
    ///
    /// Each line advances the cursor by `line_advance`; a line whose baseline
    /// would pass [`TEXT_BOTTOM_LIMIT`] continues at the top of a new page.
    /// The cursor ends one `line_advance` below the last line. Returns the
    /// number of lines drawn.
    pub fn paragraph(&mut self, text: &str, style: TextStyle, line_advance: f64) -> usize {
        let lines = self.metrics.wrap(text, CONTENT_WIDTH, &style);
        for line in &lines {
            if self.cursor.y > TEXT_BOTTOM_LIMIT {
                self.new_page();
            }
            let y = self.cursor.y;
            self.text(line.as_str(), MARGIN_X, y, style, Align::Left);
            self.cursor.y += line_advance;
        }
        lines.len()
    }

    /// Lays out `table` at the left margin starting at the cursor.
    ///
    /// Cell text is wrapped to its column. A row that would cross
    /// [`TABLE_BOTTOM_LIMIT`] moves to a new page and the head is repeated
    /// there. The cursor ends at the bottom edge of the last row.
    pub fn table(&mut self, table: &Table) {
        let body_style = TextStyle::new(table.font_size).colored(BODY_TEXT);
        let head_style = TextStyle::new(table.font_size)
            .bold()
            .colored(Rgb::WHITE);

        let head = (!table.head.is_empty()).then(|| self.wrap_row(table, &table.head, &head_style));
        if let Some(head) = &head {
            if self.cursor.y + head.height > TABLE_BOTTOM_LIMIT {
                self.new_page();
            }
            self.draw_row(table, head, &head_style, Some(table.head_fill));
        }

        for (index, row) in table.rows.iter().enumerate() {
            let wrapped = self.wrap_row(table, row, &body_style);
            if self.cursor.y + wrapped.height > TABLE_BOTTOM_LIMIT {
                self.new_page();
                if let Some(head) = &head {
                    self.draw_row(table, head, &head_style, Some(table.head_fill));
                }
            }
            let fill = match table.theme {
                TableTheme::Striped if index % 2 == 1 => Some(STRIPE_FILL),
                _ => None,
            };
            self.draw_row(table, &wrapped, &body_style, fill);
        }
    }

    fn wrap_row(&self, table: &Table, cells: &[String], style: &TextStyle) -> WrappedRow {
        let cells: Vec<Vec<String>> = table
            .columns
            .iter()
            .enumerate()
            .map(|(column, width)| {
                let content = cells.get(column).map(String::as_str).unwrap_or_default();
                self.metrics.wrap(content, width - 2.0 * CELL_PADDING, style)
            })
            .collect();
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
        WrappedRow {
            height: lines as f64 * style.line_height() + 2.0 * CELL_PADDING,
            cells,
        }
    }

    fn draw_row(&mut self, table: &Table, row: &WrappedRow, style: &TextStyle, fill: Option<Rgb>) {
        let top = self.cursor.y;
        if fill.is_some() {
            self.rect((MARGIN_X, top), (table.width(), row.height), fill, None);
        }

        let mut x = MARGIN_X;
        for (width, lines) in table.columns.iter().zip(&row.cells) {
            if table.theme == TableTheme::Grid {
                self.rect((x, top), (*width, row.height), None, Some(GRID_LINE));
            }
            for (line_index, line) in lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let baseline =
                    top + CELL_PADDING + style.ascent() + line_index as f64 * style.line_height();
                self.text(line.as_str(), x + CELL_PADDING, baseline, *style, Align::Left);
            }
            x += width;
        }

        self.cursor.y = top + row.height;
    }

    /// Draws `label(page, total)` centred at baseline `y` on every page.
    pub fn stamp_footers<F>(&mut self, y: f64, style: TextStyle, label: F)
    where
        F: Fn(usize, usize) -> String,
    {
        let total = self.layout.pages.len();
        for page in 0..total {
            let text = label(page + 1, total);
            let x = self
                .metrics
                .left_edge(&text, PAGE_WIDTH / 2.0, &style, Align::Center);
            self.push_on(page, DrawOp::Text { text, x, y, style });
        }
    }

    /// Finishes layout and returns the result.
    pub fn finish(self) -> ReportLayout {
        self.layout
    }
}

struct WrappedRow {
    cells: Vec<Vec<String>>,
    height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_break_resets_cursor() {
        let mut canvas = Canvas::new();
        canvas.set_y(251.0);
        canvas.set_x(100.0);
        assert!(canvas.break_if_below(250.0));
        assert_eq!(canvas.page_count(), 2);
        assert_eq!(
            canvas.cursor(),
            Cursor {
                page: 1,
                x: MARGIN_X,
                y: TOP_MARGIN
            }
        );
        assert!(!canvas.break_if_below(250.0));
    }

    #[test]
    fn paragraph_advances_per_line() {
        let mut canvas = Canvas::new();
        canvas.set_y(50.0);
        let lines = canvas.paragraph("a\nb\nc", TextStyle::default(), 5.0);
        assert_eq!(lines, 3);
        assert_eq!(canvas.y(), 65.0);
    }

    #[test]
    fn paragraph_continues_on_new_page() {
        let mut canvas = Canvas::new();
        canvas.set_y(270.0);
        canvas.paragraph("a\nb\nc", TextStyle::default(), 5.0);
        let layout = canvas.finish();
        assert_eq!(layout.page_count(), 2);
        assert_eq!(layout.page_of_text("a"), Some(0));
        assert_eq!(layout.page_of_text("b"), Some(0));
        assert_eq!(layout.page_of_text("c"), Some(1));
    }

    #[test]
    fn table_rows_keep_order_and_repeat_head() {
        let rows: Vec<[String; 2]> = (0..60)
            .map(|index| [format!("row {index}"), "ok".to_string()])
            .collect();
        let table = Table::new(vec![90.0, 90.0], TableTheme::Striped)
            .with_head(["Item", "Status"])
            .with_rows(rows);

        let mut canvas = Canvas::new();
        canvas.set_y(50.0);
        canvas.table(&table);
        let layout = canvas.finish();

        assert!(layout.page_count() > 1);
        let printed: Vec<&str> = layout
            .pages()
            .iter()
            .flat_map(Page::texts)
            .filter(|text| text.starts_with("row "))
            .collect();
        let expected: Vec<String> = (0..60).map(|index| format!("row {index}")).collect();
        assert_eq!(printed, expected);
        for page in layout.pages() {
            assert!(page.contains_text("Item"));
        }
    }

    #[test]
    fn aligned_text_is_placed_by_canvas_metrics() {
        let style = TextStyle::new(12.0).bold();
        let mut canvas = Canvas::new();
        canvas.text("OSTECNICO", PAGE_WIDTH - MARGIN_X, 20.0, style, Align::Right);
        let width = canvas.metrics().width("OSTECNICO", &style);
        let layout = canvas.finish();

        match &layout.pages()[0].ops()[0] {
            DrawOp::Text { x, .. } => assert!((x + width - (PAGE_WIDTH - MARGIN_X)).abs() < 1e-9),
            op => panic!("unexpected op {op:?}"),
        }
    }

    #[test]
    fn footers_are_stamped_on_every_page() {
        let mut canvas = Canvas::new();
        canvas.new_page();
        canvas.new_page();
        canvas.stamp_footers(287.0, TextStyle::new(8.0), |page, total| {
            format!("{page}/{total}")
        });
        let layout = canvas.finish();
        assert!(layout.pages()[0].contains_text("1/3"));
        assert!(layout.pages()[2].contains_text("3/3"));
    }
}
