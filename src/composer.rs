//! Service-order report composition.
//!
//! [`ReportComposer`] lays a [`ServiceOrderReport`] out page by page with a
//! moving cursor, then hands the finished [`ReportLayout`] to the renderer.
//! Layout itself cannot fail: a logo that does not load is skipped and a photo
//! that does not load becomes a bordered placeholder. Only serialising the PDF
//! and writing the file can return errors.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::ReportConfig;
use crate::fonts::{self, ReportFonts};
use crate::layout::{
    Canvas, CellContent, PhotoCell, ReportLayout, Table, TableTheme, CONTENT_WIDTH, MARGIN_X,
    PAGE_HEIGHT, PAGE_WIDTH, TOP_MARGIN,
};
use crate::model::{self, ChecklistItem, ServiceOrderReport};
use crate::photos::{self, EmbeddedImage, ImageLoader, SourceLoader};
use crate::render::{self, RenderError};
use crate::text::{Align, Rgb, TextMetrics, TextStyle};

/// Vertical offset past which the accessories block starts a new page.
pub const ACCESSORIES_BREAK_AT: f64 = 250.0;
/// Vertical offset past which a checklist table starts a new page.
pub const CHECKLIST_BREAK_AT: f64 = 240.0;
/// Vertical offset past which the technician observation starts a new page.
pub const OBSERVATION_BREAK_AT: f64 = 250.0;

/// Width of a photo cell.
pub const PHOTO_CELL_WIDTH: f64 = 80.0;
/// Height of a photo cell.
pub const PHOTO_CELL_HEIGHT: f64 = 60.0;
/// Gap between photo cells, horizontally and vertically.
pub const PHOTO_GAP: f64 = 10.0;
/// Lowest edge a photo cell may reach.
pub const PHOTO_BOTTOM_LIMIT: f64 = PAGE_HEIGHT - 20.0;

/// Caption drawn inside the placeholder of a photo that failed to load.
pub const PHOTO_ERROR_CAPTION: &str = "Erro ao carregar imagem";

const LOGO_POSITION: (f64, f64) = (15.0, 10.0);
const LOGO_SIZE: (f64, f64) = (50.0, 20.0);
const TITLE_BASELINE: f64 = 20.0;
const SUBTITLE_BASELINE: f64 = 28.0;
const META_BASELINE: f64 = 40.0;
const BLOCK_GAP: f64 = 10.0;
const HEADING_GAP: f64 = 5.0;
const LINE_ADVANCE: f64 = 5.0;
const PHOTO_HEADING_GAP: f64 = 15.0;
const FOOTER_BASELINE: f64 = PAGE_HEIGHT - 10.0;

const SUMMARY_COLUMNS: [f64; 2] = [60.0, CONTENT_WIDTH - 60.0];
const CHECKLIST_COLUMNS: [f64; 3] = [70.0, 25.0, CONTENT_WIDTH - 95.0];

const SUBTITLE_GREY: Rgb = Rgb::grey(100);
const MUTED_GREY: Rgb = Rgb::grey(150);
const PLACEHOLDER_BORDER: Rgb = Rgb::grey(200);

/// Errors raised while saving a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The PDF could not be produced.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The output directory could not be created or the file written.
    #[error("failed to write report to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rendered report together with the filename it should be saved under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReport {
    /// Suggested filename, see [`ServiceOrderReport::report_filename`].
    pub filename: String,
    /// The PDF bytes.
    pub bytes: Vec<u8>,
}

/// Lays out and renders service-order reports.
pub struct ReportComposer {
    config: ReportConfig,
    loader: Box<dyn ImageLoader>,
    fonts: Option<ReportFonts>,
}

impl Default for ReportComposer {
    fn default() -> Self {
        Self::new(ReportConfig::default())
    }
}

impl ReportComposer {
    /// Creates a composer that loads images with a [`SourceLoader`] using the
    /// configured timeout.
    pub fn new(config: ReportConfig) -> Self {
        let loader = SourceLoader::new(config.photo_timeout());
        Self {
            config,
            loader: Box::new(loader),
            fonts: None,
        }
    }

    /// Replaces the image loader.
    pub fn with_loader<L>(mut self, loader: L) -> Self
    where
        L: ImageLoader + 'static,
    {
        self.loader = Box::new(loader);
        self
    }

    /// Uses the given fonts instead of resolving them for every report.
    pub fn with_fonts(mut self, fonts: ReportFonts) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Lays the order out into pages, measuring text with the report fonts.
    pub fn compose(&self, order: &ServiceOrderReport) -> ReportLayout {
        self.compose_with(order, TextMetrics::for_fonts(&self.fonts()))
    }

    fn compose_with(&self, order: &ServiceOrderReport, metrics: TextMetrics) -> ReportLayout {
        let mut canvas = Canvas::with_metrics(metrics);

        self.header(&mut canvas, order);
        self.summary(&mut canvas, order);
        self.problem(&mut canvas, order);
        self.accessories(&mut canvas, order);
        for (title, items) in order.checklists() {
            self.checklist(&mut canvas, title, items);
        }
        self.observation(&mut canvas, order);
        self.photos(&mut canvas, order);

        canvas.stamp_footers(
            FOOTER_BASELINE,
            TextStyle::new(8.0).colored(MUTED_GREY),
            |page, total| format!("Página {page} de {total}"),
        );
        canvas.finish()
    }

    /// Lays the order out and renders it into PDF bytes.
    pub fn render(&self, order: &ServiceOrderReport) -> Result<RenderedReport, RenderError> {
        let fonts = self.fonts();
        let layout = self.compose_with(order, TextMetrics::for_fonts(&fonts));
        let bytes = render_layout(&layout, order, &fonts)?;
        Ok(RenderedReport {
            filename: order.report_filename(),
            bytes,
        })
    }

    /// Renders the order and adds an outline entry for every report section.
    #[cfg(feature = "bookmarks")]
    pub fn render_with_bookmarks(
        &self,
        order: &ServiceOrderReport,
    ) -> Result<RenderedReport, RenderError> {
        let fonts = self.fonts();
        let layout = self.compose_with(order, TextMetrics::for_fonts(&fonts));
        let bytes = render_layout(&layout, order, &fonts)?;
        let bytes = crate::bookmarks::apply_section_bookmarks(&bytes, layout.sections())?;
        Ok(RenderedReport {
            filename: order.report_filename(),
            bytes,
        })
    }

    /// Renders the order and writes it into `out_dir`, returning the file path.
    pub fn generate(
        &self,
        order: &ServiceOrderReport,
        out_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, ReportError> {
        let report = self.render(order)?;
        save_report(&report, out_dir)
    }

    fn fonts(&self) -> Cow<'_, ReportFonts> {
        match &self.fonts {
            Some(fonts) => Cow::Borrowed(fonts),
            None => Cow::Owned(fonts::report_fonts()),
        }
    }

    fn header(&self, canvas: &mut Canvas, order: &ServiceOrderReport) {
        if let Some(logo) = self.config.logo.as_deref() {
            match self.load_embedded(logo) {
                Ok(image) => {
                    let fit = photos::fit_within(image.width(), image.height(), LOGO_SIZE.0, LOGO_SIZE.1);
                    let index = canvas.add_image(image);
                    canvas.image(
                        index,
                        (LOGO_POSITION.0, LOGO_POSITION.1 + fit.y_offset),
                        (fit.width, fit.height),
                    );
                }
                Err(err) => debug!("Logo {logo} not available, skipping: {err}"),
            }
        }

        let right = PAGE_WIDTH - MARGIN_X;
        canvas.text(
            self.config.company_name.as_str(),
            right,
            TITLE_BASELINE,
            TextStyle::new(20.0).bold().colored(self.config.brand_color),
            Align::Right,
        );
        canvas.text(
            self.config.document_title.as_str(),
            right,
            SUBTITLE_BASELINE,
            TextStyle::new(12.0).colored(SUBTITLE_GREY),
            Align::Right,
        );

        let meta = TextStyle::new(10.0).bold();
        canvas.text(
            format!("OS Nº: {}", order.order_number_label()),
            MARGIN_X,
            META_BASELINE,
            meta,
            Align::Left,
        );
        canvas.text(
            format!("Data: {}", order.created_date_label()),
            right,
            META_BASELINE,
            meta,
            Align::Right,
        );
        canvas.set_y(META_BASELINE + BLOCK_GAP);
    }

    fn summary(&self, canvas: &mut Canvas, order: &ServiceOrderReport) {
        let customer = order.customer.as_ref();
        let technician = order.technician.as_ref();

        let rows = [
            ("Cliente", model::or_missing(order.customer_name()).into_owned()),
            (
                "CPF",
                model::or_missing(customer.and_then(|c| c.tax_id.as_deref())).into_owned(),
            ),
            (
                "Telefone",
                model::or_missing(customer.and_then(|c| c.phone.as_deref())).into_owned(),
            ),
            (
                "Técnico Responsável",
                model::or_missing(technician.and_then(|t| t.name.as_deref())).into_owned(),
            ),
            (
                "Equipamento",
                model::or_missing(order.equipment.as_deref()).into_owned(),
            ),
            (
                "Número de Série",
                model::or_missing(order.serial_number.as_deref()).into_owned(),
            ),
            ("Status", order.status_label().to_owned()),
        ];

        let title = "Informações Principais";
        canvas.mark_section(title);
        let table = Table::new(SUMMARY_COLUMNS, TableTheme::Grid)
            .with_head([title, ""])
            .with_head_fill(self.config.brand_color)
            .with_font_size(9.0)
            .with_rows(rows.iter().map(|(label, value)| [label.to_string(), value.clone()]));
        canvas.table(&table);
        canvas.advance(BLOCK_GAP);
    }

    fn problem(&self, canvas: &mut Canvas, order: &ServiceOrderReport) {
        let body = model::non_blank(order.problem_description.as_deref()).unwrap_or("Não informado");
        self.text_block(canvas, "Problema Relatado", body);
    }

    fn accessories(&self, canvas: &mut Canvas, order: &ServiceOrderReport) {
        canvas.break_if_below(ACCESSORIES_BREAK_AT);
        self.heading(canvas, "Acessórios Recebidos");
        let y = canvas.y();
        canvas.text(
            order.accessories_received.summary(),
            MARGIN_X,
            y,
            TextStyle::new(10.0),
            Align::Left,
        );
        canvas.advance(BLOCK_GAP);
    }

    fn checklist(&self, canvas: &mut Canvas, title: &str, items: &[ChecklistItem]) {
        canvas.break_if_below(CHECKLIST_BREAK_AT);
        if items.is_empty() {
            return;
        }

        canvas.mark_section(title);
        let table = Table::new(CHECKLIST_COLUMNS, TableTheme::Striped)
            .with_head([title, "Status", "Observação"])
            .with_head_fill(self.config.brand_color)
            .with_font_size(8.0)
            .with_rows(items.iter().map(|item| {
                [
                    item.label.clone(),
                    item.status.token().to_owned(),
                    item.observation_or_dash().to_owned(),
                ]
            }));
        canvas.table(&table);
        canvas.advance(BLOCK_GAP);
    }

    fn observation(&self, canvas: &mut Canvas, order: &ServiceOrderReport) {
        let Some(observation) = model::non_blank(order.technician_observation.as_deref()) else {
            return;
        };
        canvas.break_if_below(OBSERVATION_BREAK_AT);
        self.text_block(canvas, "Observação do Técnico", observation);
    }

    fn photos(&self, canvas: &mut Canvas, order: &ServiceOrderReport) {
        if order.photos.is_empty() {
            return;
        }

        canvas.new_page();
        let title = "Fotos do Equipamento";
        canvas.mark_section(title);
        canvas.text(
            format!("{title}:"),
            MARGIN_X,
            TOP_MARGIN,
            TextStyle::new(10.0).bold().colored(self.config.brand_color),
            Align::Left,
        );
        canvas.set_y(TOP_MARGIN + PHOTO_HEADING_GAP);
        canvas.set_x(MARGIN_X);

        for (index, reference) in order.photos.iter().enumerate() {
            if canvas.x() + PHOTO_CELL_WIDTH > PAGE_WIDTH - MARGIN_X {
                canvas.set_x(MARGIN_X);
                canvas.advance(PHOTO_CELL_HEIGHT + PHOTO_GAP);
            }
            if canvas.y() + PHOTO_CELL_HEIGHT > PHOTO_BOTTOM_LIMIT {
                canvas.new_page();
            }

            let (x, y) = (canvas.x(), canvas.y());
            let content = match self.load_embedded(reference) {
                Ok(image) => {
                    let fit = photos::fit_within(
                        image.width(),
                        image.height(),
                        PHOTO_CELL_WIDTH,
                        PHOTO_CELL_HEIGHT,
                    );
                    let image = canvas.add_image(image);
                    canvas.image(image, (x + fit.x_offset, y + fit.y_offset), (fit.width, fit.height));
                    CellContent::Photo
                }
                Err(err) => {
                    warn!("Photo {reference} could not be loaded: {err}");
                    canvas.rect(
                        (x, y),
                        (PHOTO_CELL_WIDTH, PHOTO_CELL_HEIGHT),
                        None,
                        Some(PLACEHOLDER_BORDER),
                    );
                    canvas.text(
                        PHOTO_ERROR_CAPTION,
                        x + 5.0,
                        y + PHOTO_CELL_HEIGHT / 2.0,
                        TextStyle::new(8.0).colored(MUTED_GREY),
                        Align::Left,
                    );
                    CellContent::Placeholder
                }
            };

            canvas.record_cell(PhotoCell {
                index,
                page: canvas.cursor().page,
                x,
                y,
                content,
            });
            canvas.set_x(x + PHOTO_CELL_WIDTH + PHOTO_GAP);
        }
    }

    fn heading(&self, canvas: &mut Canvas, title: &str) {
        canvas.mark_section(title);
        let y = canvas.y();
        canvas.text(
            format!("{title}:"),
            MARGIN_X,
            y,
            TextStyle::new(10.0).bold(),
            Align::Left,
        );
        canvas.advance(HEADING_GAP);
    }

    fn text_block(&self, canvas: &mut Canvas, title: &str, body: &str) {
        self.heading(canvas, title);
        canvas.paragraph(body, TextStyle::new(10.0), LINE_ADVANCE);
        canvas.advance(BLOCK_GAP);
    }

    fn load_embedded(&self, reference: &str) -> Result<EmbeddedImage, photos::LoadError> {
        let image = self.loader.load(reference)?;
        EmbeddedImage::from_dynamic(&image)
    }
}

fn render_layout(
    layout: &ReportLayout,
    order: &ServiceOrderReport,
    fonts: &ReportFonts,
) -> Result<Vec<u8>, RenderError> {
    let title = format!("OS {}", order.order_number_label());
    render::render_pdf(layout, &title, fonts)
}

/// Writes a rendered report into `out_dir`, creating the directory if needed.
pub fn save_report(report: &RenderedReport, out_dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir).map_err(|source| ReportError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let path = out_dir.join(&report.filename);
    fs::write(&path, &report.bytes).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;
    info!("Saved {} ({} bytes)", path.display(), report.bytes.len());
    Ok(path)
}
