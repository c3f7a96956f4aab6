//! Section outline built on top of `lopdf`.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

use crate::layout::SectionMark;

/// Errors that can occur while embedding bookmarks into a rendered report.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// The PDF bytes could not be parsed or written back by `lopdf`.
    #[error("failed to process PDF bytes: {0}")]
    Pdf(#[from] lopdf::Error),
    /// The trailer has no catalog reference.
    #[error("PDF catalog entry is missing")]
    MissingCatalog,
    /// The catalog object is not a dictionary.
    #[error("PDF catalog entry is not a dictionary")]
    InvalidCatalog,
    /// A section points at a page the document does not have.
    #[error("section {title:?} refers to missing page {page_number}")]
    MissingPage {
        /// Title of the offending section.
        title: String,
        /// The requested (1-indexed) page number.
        page_number: usize,
    },
}

/// Adds a flat `/Outlines` tree with one `/Dest [page /Fit]` entry per section.
///
/// Section pages are zero-based layout indices. When `sections` is empty the
/// input bytes are returned unchanged.
pub fn apply_section_bookmarks(
    pdf_bytes: &[u8],
    sections: &[SectionMark],
) -> Result<Vec<u8>, BookmarkError> {
    if sections.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();
    let entries = collect_outline_entries(&mut document, sections, &pages)?;

    let outlines_id = document.new_object_id();
    link_outline_entries(outlines_id, &mut document, &entries);
    insert_outlines_root(outlines_id, &mut document, &entries)?;

    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(|err| BookmarkError::Pdf(err.into()))?;
    Ok(buffer)
}

struct OutlineEntry {
    object_id: ObjectId,
    page_ref: ObjectId,
    title: String,
}

fn collect_outline_entries(
    document: &mut Document,
    sections: &[SectionMark],
    pages: &BTreeMap<u32, ObjectId>,
) -> Result<Vec<OutlineEntry>, BookmarkError> {
    sections
        .iter()
        .map(|section| {
            let page_number = section.page + 1;
            let page_ref = u32::try_from(page_number)
                .ok()
                .and_then(|number| pages.get(&number).copied())
                .ok_or_else(|| BookmarkError::MissingPage {
                    title: section.title.clone(),
                    page_number,
                })?;
            Ok(OutlineEntry {
                object_id: document.new_object_id(),
                page_ref,
                title: section.title.clone(),
            })
        })
        .collect()
}

fn link_outline_entries(outlines_id: ObjectId, document: &mut Document, entries: &[OutlineEntry]) {
    for index in 0..entries.len() {
        let entry = &entries[index];
        let mut dictionary = Dictionary::new();
        dictionary.set("Title", Object::string_literal(entry.title.as_str()));
        dictionary.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(entry.page_ref),
                Object::Name("Fit".into()),
            ]),
        );
        dictionary.set("Parent", Object::Reference(outlines_id));
        if index > 0 {
            dictionary.set("Prev", Object::Reference(entries[index - 1].object_id));
        }
        if let Some(next) = entries.get(index + 1) {
            dictionary.set("Next", Object::Reference(next.object_id));
        }

        document
            .objects
            .insert(entry.object_id, Object::Dictionary(dictionary));
    }
}

fn insert_outlines_root(
    outlines_id: ObjectId,
    document: &mut Document,
    entries: &[OutlineEntry],
) -> Result<(), BookmarkError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| BookmarkError::MissingCatalog)?;

    let mut dictionary = Dictionary::new();
    dictionary.set("Type", Object::Name("Outlines".into()));
    dictionary.set("Count", Object::Integer(entries.len() as i64));
    if let Some(first) = entries.first() {
        dictionary.set("First", Object::Reference(first.object_id));
    }
    if let Some(last) = entries.last() {
        dictionary.set("Last", Object::Reference(last.object_id));
    }
    document
        .objects
        .insert(outlines_id, Object::Dictionary(dictionary));

    let catalog = document
        .objects
        .get_mut(&catalog_id)
        .ok_or(BookmarkError::MissingCatalog)?
        .as_dict_mut()
        .map_err(|_| BookmarkError::InvalidCatalog)?;
    catalog.set("Outlines", Object::Reference(outlines_id));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::ReportFonts;
    use crate::layout::Canvas;
    use crate::render::render_pdf;
    use crate::text::{Align, TextStyle};

    fn two_page_pdf() -> Vec<u8> {
        let mut canvas = Canvas::new();
        canvas.mark_section("Informações Principais");
        canvas.text("um", 15.0, 20.0, TextStyle::default(), Align::Left);
        canvas.new_page();
        canvas.mark_section("Fotos do Equipamento");
        render_pdf(&canvas.finish(), "bookmarks", &ReportFonts::Builtin).expect("render")
    }

    fn outline_count(bytes: &[u8]) -> i64 {
        let document = Document::load_mem(bytes).expect("parse");
        let catalog = document.catalog().expect("catalog");
        let outlines = catalog
            .get(b"Outlines")
            .and_then(Object::as_reference)
            .expect("outlines reference");
        document
            .get_object(outlines)
            .and_then(Object::as_dict)
            .and_then(|dict| dict.get(b"Count"))
            .and_then(Object::as_i64)
            .expect("outline count")
    }

    #[test]
    fn adds_one_entry_per_section() {
        let sections = [
            SectionMark {
                title: "Informações Principais".into(),
                page: 0,
            },
            SectionMark {
                title: "Fotos do Equipamento".into(),
                page: 1,
            },
        ];
        let bytes = apply_section_bookmarks(&two_page_pdf(), &sections).expect("bookmarks");
        assert_eq!(outline_count(&bytes), 2);
    }

    #[test]
    fn rejects_sections_past_the_last_page() {
        let sections = [SectionMark {
            title: "Fotos do Equipamento".into(),
            page: 5,
        }];
        let err = apply_section_bookmarks(&two_page_pdf(), &sections).unwrap_err();
        assert!(matches!(err, BookmarkError::MissingPage { page_number: 6, .. }));
    }
}
