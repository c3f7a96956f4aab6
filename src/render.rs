//! Serialises a [`ReportLayout`] into PDF bytes with `printpdf`.

use std::io::{self, BufWriter, Cursor};

use log::warn;
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageFilter, ImageXObject,
    IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point, Px,
};
use thiserror::Error;

use crate::fonts::ReportFonts;
use crate::layout::{DrawOp, ReportLayout, PAGE_HEIGHT, PAGE_WIDTH};
use crate::photos::EmbeddedImage;
use crate::text::{self, Rgb, TextStyle};

const LAYER_NAME: &str = "Conteúdo";
const IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const OUTLINE_THICKNESS_PT: f64 = 0.5;

/// Errors raised while producing the PDF bytes.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A font could not be registered with the document.
    #[error("failed to register font: {0}")]
    Font(String),
    /// The PDF backend failed to serialise the document.
    #[error("failed to serialise PDF: {0}")]
    Pdf(String),
    /// The output buffer could not be flushed.
    #[error("failed to flush PDF output")]
    Io(#[from] io::Error),
    /// The outline could not be added to the rendered document.
    #[cfg(feature = "bookmarks")]
    #[error("failed to add bookmarks")]
    Bookmarks(#[from] crate::bookmarks::BookmarkError),
}

struct FontFaces {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    ascii_only: bool,
}

impl FontFaces {
    fn install(document: &PdfDocumentReference, fonts: &ReportFonts) -> Result<Self, RenderError> {
        if let ReportFonts::Embedded { regular, bold } = fonts {
            let embedded = document.add_external_font(regular.as_slice()).and_then(|regular| {
                document
                    .add_external_font(bold.as_slice())
                    .map(|bold| (regular, bold))
            });
            match embedded {
                Ok((regular, bold)) => {
                    return Ok(Self {
                        regular,
                        bold,
                        ascii_only: false,
                    })
                }
                Err(err) => warn!("Bundled fonts rejected ({err}); using built-in Helvetica"),
            }
        }

        let builtin = |font| {
            document
                .add_builtin_font(font)
                .map_err(|err| RenderError::Font(err.to_string()))
        };
        Ok(Self {
            regular: builtin(BuiltinFont::Helvetica)?,
            bold: builtin(BuiltinFont::HelveticaBold)?,
            ascii_only: true,
        })
    }

    fn face(&self, style: &TextStyle) -> &IndirectFontRef {
        if style.is_bold() {
            &self.bold
        } else {
            &self.regular
        }
    }
}

fn pdf_color(color: Rgb) -> Color {
    let (r, g, b) = color.to_unit();
    Color::Rgb(printpdf::Rgb::new(r, g, b, None))
}

fn rectangle(x: f64, y: f64, width: f64, height: f64, fill: bool) -> Line {
    let top = PAGE_HEIGHT - y;
    let bottom = PAGE_HEIGHT - y - height;
    Line {
        points: vec![
            (Point::new(Mm(x), Mm(top)), false),
            (Point::new(Mm(x + width), Mm(top)), false),
            (Point::new(Mm(x + width), Mm(bottom)), false),
            (Point::new(Mm(x), Mm(bottom)), false),
        ],
        is_closed: true,
        has_fill: fill,
        has_stroke: !fill,
        is_clipping_path: false,
    }
}

fn draw_text(
    layer: &PdfLayerReference,
    faces: &FontFaces,
    content: &str,
    (x, y): (f64, f64),
    style: &TextStyle,
) {
    let content = if faces.ascii_only {
        text::fold_to_ascii(content)
    } else {
        content.to_owned()
    };
    layer.set_fill_color(pdf_color(style.color()));
    layer.use_text(
        content,
        style.size(),
        Mm(x),
        Mm(PAGE_HEIGHT - y),
        faces.face(style),
    );
}

fn draw_image(layer: &PdfLayerReference, image: &EmbeddedImage, (x, y): (f64, f64), (width, height): (f64, f64)) {
    let natural_width = f64::from(image.width()) * MM_PER_INCH / IMAGE_DPI;
    let natural_height = f64::from(image.height()) * MM_PER_INCH / IMAGE_DPI;
    if natural_width <= f64::EPSILON || natural_height <= f64::EPSILON {
        return;
    }

    let xobject = ImageXObject {
        width: Px(image.width() as usize),
        height: Px(image.height() as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: image.jpeg().to_vec(),
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
    };
    Image::from(xobject).add_to_layer(
        layer.clone(),
        Some(Mm(x)),
        Some(Mm(PAGE_HEIGHT - y - height)),
        None,
        Some(width / natural_width),
        Some(height / natural_height),
        Some(IMAGE_DPI),
    );
}

fn draw(layer: &PdfLayerReference, op: &DrawOp, images: &[EmbeddedImage], faces: &FontFaces) {
    match op {
        DrawOp::Text { text, x, y, style } => draw_text(layer, faces, text, (*x, *y), style),
        DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            if let Some(fill) = fill {
                layer.set_fill_color(pdf_color(*fill));
                layer.add_shape(rectangle(*x, *y, *width, *height, true));
            }
            if let Some(stroke) = stroke {
                layer.set_outline_color(pdf_color(*stroke));
                layer.set_outline_thickness(OUTLINE_THICKNESS_PT);
                layer.add_shape(rectangle(*x, *y, *width, *height, false));
            }
        }
        DrawOp::Image {
            x,
            y,
            width,
            height,
            image,
        } => match images.get(*image) {
            Some(embedded) => draw_image(layer, embedded, (*x, *y), (*width, *height)),
            None => warn!("Layout references missing image #{image}"),
        },
    }
}

/// Renders every page of `layout` and returns the PDF bytes.
pub fn render_pdf(
    layout: &ReportLayout,
    title: &str,
    fonts: &ReportFonts,
) -> Result<Vec<u8>, RenderError> {
    let (document, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
    let faces = FontFaces::install(&document, fonts)?;

    let mut layers = vec![document.get_page(first_page).get_layer(first_layer)];
    for _ in 1..layout.page_count() {
        let (page, layer) = document.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
        layers.push(document.get_page(page).get_layer(layer));
    }

    for (page, layer) in layout.pages().iter().zip(&layers) {
        for op in page.ops() {
            draw(layer, op, layout.images(), &faces);
        }
    }

    let mut writer = BufWriter::new(Cursor::new(Vec::new()));
    document
        .save(&mut writer)
        .map_err(|err| RenderError::Pdf(err.to_string()))?;
    let cursor = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Canvas;
    use crate::text::Align;

    #[test]
    fn renders_one_pdf_page_per_layout_page() {
        let mut canvas = Canvas::new();
        canvas.text("Página 1", 15.0, 20.0, TextStyle::default(), Align::Left);
        canvas.new_page();
        canvas.rect((15.0, 20.0), (80.0, 60.0), Some(Rgb::grey(245)), Some(Rgb::grey(200)));
        let layout = canvas.finish();

        let bytes = render_pdf(&layout, "teste", &ReportFonts::Builtin).expect("render");
        assert!(bytes.starts_with(b"%PDF"));

        let document = lopdf::Document::load_mem(&bytes).expect("parse rendered pdf");
        assert_eq!(document.get_pages().len(), 2);
    }
}
