//! Text styling, width measurement and word wrapping.
//!
//! Widths come from the font the report is rendered with. When the bundled
//! TrueType family is used, glyph advances and kerning are read through a
//! `genpdf` font cache; the built-in Helvetica faces are measured with their
//! AFM advance tables.

use std::fmt;

use genpdf::fonts::{Font, FontCache, FontData, FontFamily};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::fonts::ReportFonts;

/// Millimetres per PostScript point.
pub const MM_PER_PT: f64 = 25.4 / 72.0;

/// Line height factor relative to the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.15;

/// An RGB colour with 8-bit channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Black.
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    /// White.
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// A grey with all three channels set to `level`.
    pub const fn grey(level: u8) -> Self {
        Rgb(level, level, level)
    }

    /// Channels scaled to `0.0..=1.0`.
    pub fn to_unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.0) / 255.0,
            f64::from(self.1) / 255.0,
            f64::from(self.2) / 255.0,
        )
    }
}

/// Horizontal anchoring of a text run relative to its x coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    /// `x` is the left edge.
    #[default]
    Left,
    /// `x` is the centre.
    Center,
    /// `x` is the right edge.
    Right,
}

/// Font size, weight and colour of a text run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    size: f64,
    bold: bool,
    color: Rgb,
}

impl TextStyle {
    /// Creates a regular black style with the given size in points.
    pub fn new(size: f64) -> Self {
        Self {
            size,
            bold: false,
            color: Rgb::BLACK,
        }
    }

    /// Font size in points.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Whether the bold face is used.
    pub fn is_bold(&self) -> bool {
        self.bold
    }

    /// Text colour.
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Sets the bold flag and returns the updated style.
    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Convenience shorthand that marks the style as bold.
    pub fn bold(self) -> Self {
        self.with_bold(true)
    }

    /// Sets the colour and returns the updated style.
    pub fn colored(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Height of one line in millimetres.
    pub fn line_height(&self) -> f64 {
        self.size * LINE_HEIGHT_FACTOR * MM_PER_PT
    }

    /// Height of the capitals above the baseline in millimetres.
    pub fn ascent(&self) -> f64 {
        self.size * 0.75 * MM_PER_PT
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::new(10.0)
    }
}

// Advance widths for ASCII 32..=126 in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, //
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, //
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, //
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const FALLBACK_WIDTH: u16 = 556;

fn char_width(ch: char, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    let base = if ch.is_ascii() { ch } else { fold_char(ch) };
    match base as u32 {
        code @ 32..=126 => table[(code - 32) as usize],
        _ => FALLBACK_WIDTH,
    }
}

fn builtin_width(text: &str, style: &TextStyle) -> f64 {
    let units: u32 = text
        .chars()
        .map(|ch| u32::from(char_width(ch, style.bold)))
        .sum();
    f64::from(units) / 1000.0 * style.size * MM_PER_PT
}

/// Measures text in the faces a report is rendered with.
pub enum TextMetrics {
    /// AFM advances of Helvetica and Helvetica-Bold.
    Builtin,
    /// Advances and kerning of loaded TrueType faces.
    Loaded {
        cache: FontCache,
        family: FontFamily<Font>,
    },
}

impl TextMetrics {
    /// Metrics matching `fonts`.
    ///
    /// Embedded faces that cannot be parsed fall back to the built-in metrics,
    /// as the renderer falls back to the built-in faces.
    pub fn for_fonts(fonts: &ReportFonts) -> Self {
        match fonts {
            ReportFonts::Builtin => Self::Builtin,
            ReportFonts::Embedded { regular, bold } => match Self::load(regular, bold) {
                Ok(metrics) => metrics,
                Err(err) => {
                    warn!("Bundled fonts could not be measured ({err}); using Helvetica metrics");
                    Self::Builtin
                }
            },
        }
    }

    fn load(regular: &[u8], bold: &[u8]) -> Result<Self, genpdf::error::Error> {
        let regular = FontData::new(regular.to_vec(), None)?;
        let bold = FontData::new(bold.to_vec(), None)?;
        let data = FontFamily {
            regular: regular.clone(),
            bold: bold.clone(),
            italic: regular,
            bold_italic: bold,
        };
        let mut cache = FontCache::new(data.clone());
        let family = cache.add_font_family(data);
        Ok(Self::Loaded { cache, family })
    }

    /// Whether these are the built-in Helvetica metrics.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin)
    }

    /// Width of `text` in millimetres when set in `style`.
    pub fn width(&self, text: &str, style: &TextStyle) -> f64 {
        match self {
            Self::Builtin => builtin_width(text, style),
            Self::Loaded { cache, family } => {
                let font = if style.bold {
                    family.bold
                } else {
                    family.regular
                };
                // Advances scale linearly, so measure at 1 pt to keep fractional sizes.
                let per_point: printpdf::Mm = font.str_width(cache, text, 1).into();
                per_point.0 * style.size
            }
        }
    }

    /// Left edge of `text` anchored at `x` with `align`.
    pub fn left_edge(&self, text: &str, x: f64, style: &TextStyle, align: Align) -> f64 {
        match align {
            Align::Left => x,
            Align::Center => x - self.width(text, style) / 2.0,
            Align::Right => x - self.width(text, style),
        }
    }

    /// Splits `text` into lines no wider than `max_width` millimetres.
    ///
    /// Explicit line breaks are kept, words are never split unless a single word
    /// is wider than the line on its own. Always returns at least one line.
    pub fn wrap(&self, text: &str, max_width: f64, style: &TextStyle) -> Vec<String> {
        let space = self.width(" ", style);
        let mut lines = Vec::new();

        for paragraph in text.split('\n') {
            let paragraph = paragraph.trim_end_matches('\r');
            let mut current = String::new();
            let mut current_width = 0.0;

            for word in paragraph.split_whitespace() {
                let word_width = self.width(word, style);
                if !current.is_empty() && current_width + space + word_width <= max_width {
                    current.push(' ');
                    current.push_str(word);
                    current_width += space + word_width;
                    continue;
                }
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                if word_width <= max_width {
                    current.push_str(word);
                    current_width = word_width;
                } else {
                    let mut pieces = self.split_word(word, max_width, style);
                    let last = pieces.pop().unwrap_or_default();
                    lines.extend(pieces);
                    current_width = self.width(&last, style);
                    current = last;
                }
            }
            lines.push(current);
        }

        lines
    }

    fn split_word(&self, word: &str, max_width: f64, style: &TextStyle) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut piece = String::new();
        for ch in word.chars() {
            piece.push(ch);
            if piece.chars().count() > 1 && self.width(&piece, style) > max_width {
                piece.pop();
                pieces.push(std::mem::take(&mut piece));
                piece.push(ch);
            }
        }
        pieces.push(piece);
        pieces
    }
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self::Builtin
    }
}

impl fmt::Debug for TextMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("Builtin"),
            Self::Loaded { .. } => f.write_str("Loaded"),
        }
    }
}

/// Replaces accented Latin letters with their ASCII base letter.
///
/// Used when only the built-in PDF fonts are available, which cannot show
/// characters outside their base encoding.
pub fn fold_to_ascii(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

fn fold_char(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'ª' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'º' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        '–' | '—' => '-',
        '“' | '”' => '"',
        '‘' | '’' => '\'',
        ch if ch.is_ascii() => ch,
        _ => '?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> TextMetrics {
        TextMetrics::Builtin
    }

    #[test]
    fn width_scales_with_size() {
        let small = builtin().width("Hello", &TextStyle::new(10.0));
        let large = builtin().width("Hello", &TextStyle::new(20.0));
        assert!((large - 2.0 * small).abs() < 1e-9);
    }

    #[test]
    fn bold_is_wider() {
        let regular = builtin().width("Relatado", &TextStyle::new(10.0));
        let bold = builtin().width("Relatado", &TextStyle::new(10.0).bold());
        assert!(bold > regular);
    }

    #[test]
    fn alignment_anchors_the_matching_edge() {
        let metrics = builtin();
        let style = TextStyle::new(12.0).bold();
        let width = metrics.width("OSTECNICO", &style);
        assert_eq!(metrics.left_edge("OSTECNICO", 195.0, &style, Align::Left), 195.0);
        let right = metrics.left_edge("OSTECNICO", 195.0, &style, Align::Right);
        assert!((right + width - 195.0).abs() < 1e-9);
        let centre = metrics.left_edge("OSTECNICO", 105.0, &style, Align::Center);
        assert!((centre + width / 2.0 - 105.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_follow_the_report_fonts() {
        assert!(TextMetrics::for_fonts(&ReportFonts::Builtin).is_builtin());
        let unreadable = ReportFonts::Embedded {
            regular: b"not a font".to_vec(),
            bold: b"not a font".to_vec(),
        };
        assert!(TextMetrics::for_fonts(&unreadable).is_builtin());
    }

    #[test]
    fn wrap_keeps_explicit_breaks() {
        let lines = builtin().wrap("um\ndois\n\ntres", 180.0, &TextStyle::default());
        assert_eq!(lines, vec!["um", "dois", "", "tres"]);
    }

    #[test]
    fn wrap_respects_width() {
        let metrics = builtin();
        let style = TextStyle::default();
        let text = "palavra ".repeat(80);
        let lines = metrics.wrap(&text, 60.0, &style);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(metrics.width(line, &style) <= 60.0 + 1e-9, "line too wide: {line}");
        }
        let rejoined = lines.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), 80);
    }

    #[test]
    fn long_word_is_split() {
        let lines = builtin().wrap(&"x".repeat(200), 20.0, &TextStyle::default());
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 200);
    }

    #[test]
    fn empty_text_is_one_line() {
        assert_eq!(builtin().wrap("", 100.0, &TextStyle::default()), vec![String::new()]);
    }

    #[test]
    fn folding_strips_accents() {
        assert_eq!(fold_to_ascii("Ordem de Serviço Nº"), "Ordem de Servico No");
        assert_eq!(fold_to_ascii("Página 1 de 2"), "Pagina 1 de 2");
    }
}
