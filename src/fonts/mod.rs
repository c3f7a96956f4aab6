//! Font resolution for rendered reports.
//!
//! Reports prefer the bundled Roboto family because it covers the accented
//! characters used throughout the document. When the TTF files cannot be found
//! the renderer falls back to the PDF built-in Helvetica faces.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable that overrides the font search directory.
pub const FONTS_DIR_ENV: &str = "OSTECNICO_FONTS_DIR";

const REGULAR_FONT_FILE: &str = "Roboto-Regular.ttf";
const BOLD_FONT_FILE: &str = "Roboto-Bold.ttf";

/// Fonts used by the renderer.
#[derive(Clone, PartialEq, Eq)]
pub enum ReportFonts {
    /// TrueType data for the regular and bold faces.
    Embedded { regular: Vec<u8>, bold: Vec<u8> },
    /// The built-in Helvetica and Helvetica-Bold faces.
    Builtin,
}

impl ReportFonts {
    /// Whether text must be folded to ASCII before it is written.
    pub fn needs_ascii(&self) -> bool {
        matches!(self, Self::Builtin)
    }
}

impl std::fmt::Debug for ReportFonts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded { regular, bold } => f
                .debug_struct("Embedded")
                .field("regular_bytes", &regular.len())
                .field("bold_bytes", &bold.len())
                .finish(),
            Self::Builtin => f.write_str("Builtin"),
        }
    }
}

/// Returns the directory the bundled fonts are shipped in.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(path) = env::var(FONTS_DIR_ENV) {
        if !path.trim().is_empty() {
            candidates.push(PathBuf::from(path));
        }
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = bundled_fonts_source_dir();
    if !candidates.contains(&manifest_candidate) {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn has_required_files(directory: &Path) -> bool {
    [REGULAR_FONT_FILE, BOLD_FONT_FILE]
        .iter()
        .all(|name| directory.join(name).is_file())
}

fn resolve_font_directory() -> Result<PathBuf, io::Error> {
    let candidates = font_directory_candidates();
    if let Some(directory) = candidates.iter().find(|dir| has_required_files(dir)) {
        return Ok(directory.clone());
    }

    let checked = candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!(
            "{} fonts not found (checked: {}); set {} to override",
            DEFAULT_FONT_FAMILY_NAME, checked, FONTS_DIR_ENV
        ),
    ))
}

fn load_bundled_fonts() -> Result<ReportFonts, io::Error> {
    let directory = resolve_font_directory()?;
    let regular = fs::read(directory.join(REGULAR_FONT_FILE))?;
    let bold = fs::read(directory.join(BOLD_FONT_FILE))?;
    Ok(ReportFonts::Embedded { regular, bold })
}

/// Returns the bundled fonts when available, otherwise the built-in faces.
pub fn report_fonts() -> ReportFonts {
    match load_bundled_fonts() {
        Ok(fonts) => fonts,
        Err(err) => {
            warn!("{err}; falling back to built-in Helvetica");
            ReportFonts::Builtin
        }
    }
}

/// Indicates whether the bundled fonts can be found.
pub fn bundled_fonts_available() -> bool {
    resolve_font_directory().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_fonts_need_ascii() {
        assert!(ReportFonts::Builtin.needs_ascii());
        let embedded = ReportFonts::Embedded {
            regular: vec![0],
            bold: vec![0],
        };
        assert!(!embedded.needs_ascii());
    }

    #[test]
    fn manifest_directory_is_always_a_candidate() {
        assert!(font_directory_candidates().contains(&bundled_fonts_source_dir()));
    }
}
