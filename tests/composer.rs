use std::io;

use image::{DynamicImage, ImageBuffer, Rgb};
use ostecnico_report::composer::{PHOTO_CELL_HEIGHT, PHOTO_CELL_WIDTH, PHOTO_ERROR_CAPTION};
use ostecnico_report::fonts::ReportFonts;
use ostecnico_report::layout::{CellContent, ReportLayout, MARGIN_X};
use ostecnico_report::model::{self, status_label};
use ostecnico_report::{
    Accessories, ChecklistItem, Customer, ItemStatus, LoadError, OrderStatus, ReportComposer,
    ReportConfig, ServiceOrderReport, Technician,
};
use pretty_assertions::assert_eq;

fn photo() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 48, Rgb([30, 144, 255])))
}

fn unavailable(reference: &str) -> LoadError {
    LoadError::Io {
        path: reference.into(),
        source: io::Error::new(io::ErrorKind::NotFound, "not found"),
    }
}

/// Loads every reference except those containing "quebrada".
fn loader(reference: &str) -> Result<DynamicImage, LoadError> {
    if reference.contains("quebrada") {
        Err(unavailable(reference))
    } else {
        Ok(photo())
    }
}

fn composer() -> ReportComposer {
    ReportComposer::new(ReportConfig::default())
        .with_loader(loader)
        .with_fonts(ReportFonts::Builtin)
}

fn order() -> ServiceOrderReport {
    ServiceOrderReport {
        order_number: Some(42),
        created_at: Some("2024-03-05T14:22:10Z".into()),
        customer: Some(Customer {
            name: Some("Ana Maria".into()),
            tax_id: Some("123.456.789-00".into()),
            phone: None,
        }),
        technician: Some(Technician {
            name: Some("Carlos Souza".into()),
        }),
        equipment: Some("Notebook".into()),
        problem_description: Some("Não liga".into()),
        physical_condition: vec![
            ChecklistItem::new("Tela", ItemStatus::Ok),
            ChecklistItem::new("Carcaça", ItemStatus::Defect).with_observation("Trinca"),
            ChecklistItem::new("Teclado", ItemStatus::NotVerified),
            ChecklistItem::new("Dobradiças", ItemStatus::Ok),
        ],
        status: Some(OrderStatus::InProgress),
        ..ServiceOrderReport::default()
    }
}

fn all_texts(layout: &ReportLayout) -> Vec<&str> {
    layout.pages().iter().flat_map(|page| page.texts()).collect()
}

#[test]
fn header_and_summary_are_on_the_first_page() {
    let layout = composer().compose(&order());
    let first = &layout.pages()[0];

    assert!(first.contains_text("OSTECNICO"));
    assert!(first.contains_text("Ordem de Serviço"));
    assert!(first.contains_text("OS Nº: 42"));
    assert!(first.contains_text("Data: 05/03/2024"));
    assert!(first.contains_text("Ana Maria"));
    assert!(first.contains_text("Em Atendimento"));
    assert!(first.contains_text("N/A"));
}

#[test]
fn summary_has_the_seven_order_rows() {
    let layout = composer().compose(&order());
    let labels = [
        "Cliente",
        "CPF",
        "Telefone",
        "Técnico Responsável",
        "Equipamento",
        "Número de Série",
        "Status",
    ];
    let printed: Vec<&str> = layout.pages()[0]
        .texts()
        .take_while(|text| *text != "Problema Relatado:")
        .filter(|text| labels.contains(text))
        .collect();
    assert_eq!(printed, labels);
    assert_eq!(layout.page_of_text("Assinatura do Cliente"), None);
}

#[test]
fn missing_status_prints_placeholder() {
    let mut order = order();
    order.status = None;
    order.serial_number = Some("SN-1".into());
    order.customer = Some(Customer {
        name: Some("Ana Maria".into()),
        tax_id: Some("123.456.789-00".into()),
        phone: Some("(11) 99999-0000".into()),
    });
    let layout = composer().compose(&order);

    let first = &layout.pages()[0];
    assert!(first.contains_text("N/A"));
    assert!(!first.contains_text("Pendente"));
}

#[test]
fn checklist_rows_follow_input_order() {
    let order = order();
    let layout = composer().compose(&order);

    let labels: Vec<&str> = order
        .physical_condition
        .iter()
        .map(|item| item.label.as_str())
        .collect();
    let printed: Vec<&str> = all_texts(&layout)
        .into_iter()
        .filter(|text| labels.contains(text))
        .collect();
    assert_eq!(printed, labels);

    let texts = all_texts(&layout);
    assert!(texts.contains(&"Defeito"));
    assert!(texts.contains(&"N/V"));
    assert!(texts.contains(&"Trinca"));
}

#[test]
fn empty_checklists_are_omitted() {
    let layout = composer().compose(&order());
    assert!(layout.page_of_text("Estado Físico").is_some());
    assert_eq!(layout.page_of_text("Condição de Funcionamento"), None);
    assert_eq!(layout.page_of_text("Testes Técnicos Iniciais"), None);
}

#[test]
fn no_accessories_prints_nenhum() {
    assert_eq!(Accessories::default().summary(), "Nenhum");

    let layout = composer().compose(&order());
    assert_eq!(layout.page_of_text("Nenhum"), Some(0));
}

#[test]
fn failing_photo_becomes_a_placeholder() {
    let mut order = order();
    order.photos = vec![
        "fotos/frente.jpg".into(),
        "fotos/lateral.jpg".into(),
        "fotos/quebrada.jpg".into(),
        "fotos/tampa.jpg".into(),
        "fotos/fundo.jpg".into(),
    ];
    let layout = composer().compose(&order);

    let cells = layout.photo_cells();
    assert_eq!(cells.len(), 5);
    let contents: Vec<CellContent> = cells.iter().map(|cell| cell.content).collect();
    assert_eq!(
        contents,
        vec![
            CellContent::Photo,
            CellContent::Photo,
            CellContent::Placeholder,
            CellContent::Photo,
            CellContent::Photo,
        ]
    );
    assert_eq!(layout.images().len(), 4);

    let placeholder = &cells[2];
    assert!(layout.pages()[placeholder.page].contains_text(PHOTO_ERROR_CAPTION));
}

#[test]
fn photo_grid_starts_on_a_new_page_and_wraps() {
    let mut order = order();
    order.photos = (0..3).map(|index| format!("fotos/{index}.jpg")).collect();
    let layout = composer().compose(&order);

    let heading_page = layout.page_of_text("Fotos do Equipamento:").expect("photo heading");
    assert!(heading_page > 0);

    let positions: Vec<(usize, f64, f64)> = layout
        .photo_cells()
        .iter()
        .map(|cell| (cell.page, cell.x, cell.y))
        .collect();
    assert_eq!(
        positions,
        vec![
            (heading_page, MARGIN_X, 35.0),
            (heading_page, MARGIN_X + PHOTO_CELL_WIDTH + 10.0, 35.0),
            (heading_page, MARGIN_X, 35.0 + PHOTO_CELL_HEIGHT + 10.0),
        ]
    );
}

#[test]
fn photo_grid_continues_on_another_page() {
    let mut order = order();
    order.photos = (0..10).map(|index| format!("fotos/{index}.jpg")).collect();
    let layout = composer().compose(&order);

    let cells = layout.photo_cells();
    assert_eq!(cells.len(), 10);
    let first_page = cells[0].page;
    assert!(cells.iter().take(6).all(|cell| cell.page == first_page));
    assert!(cells.iter().skip(6).all(|cell| cell.page == first_page + 1));
    assert_eq!(cells[6].y, 20.0);
}

#[test]
fn long_problem_pushes_accessories_to_a_new_page() {
    let short = composer().compose(&order());
    assert_eq!(short.page_of_text("Acessórios Recebidos:"), Some(0));

    let mut long_order = order();
    long_order.problem_description = Some(
        (1..=30)
            .map(|line| format!("Linha {line} do relato"))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let long = composer().compose(&long_order);

    assert_eq!(long.page_of_text("Acessórios Recebidos:"), Some(1));
    assert!(long.page_count() > short.page_count());
}

#[test]
fn every_page_has_a_numbered_footer() {
    let mut order = order();
    order.photos = vec!["fotos/frente.jpg".into()];
    let layout = composer().compose(&order);
    let total = layout.page_count();

    for (index, page) in layout.pages().iter().enumerate() {
        assert!(page.contains_text(&format!("Página {} de {}", index + 1, total)));
    }
}

#[test]
fn unknown_status_is_printed_verbatim() {
    assert_eq!(status_label("unknown_status"), "unknown_status");
    assert_eq!(status_label("concluido"), "Concluído");

    let mut order = order();
    order.status = Some(OrderStatus::from("aguardando_peca".to_owned()));
    let layout = composer().compose(&order);
    assert_eq!(layout.page_of_text("aguardando_peca"), Some(0));
}

#[test]
fn missing_logo_is_skipped() {
    let config = ReportConfig::default().with_logo("assets/quebrada-logo.png".to_owned());
    let layout = ReportComposer::new(config)
        .with_loader(loader)
        .compose(&order());
    assert!(layout.images().is_empty());
    assert!(layout.pages()[0].contains_text("OSTECNICO"));
}

#[test]
fn logo_is_embedded_when_available() {
    let config = ReportConfig::default().with_logo("assets/logo-full.jpg".to_owned());
    let layout = ReportComposer::new(config)
        .with_loader(loader)
        .compose(&order());
    assert_eq!(layout.images().len(), 1);
}

#[test]
fn sections_are_recorded_in_document_order() {
    let mut order = order();
    order.technician_observation = Some("Trocar fonte".into());
    order.photos = vec!["fotos/frente.jpg".into()];
    let layout = composer().compose(&order);

    let titles: Vec<&str> = layout
        .sections()
        .iter()
        .map(|section| section.title.as_str())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Informações Principais",
            "Problema Relatado",
            "Acessórios Recebidos",
            "Estado Físico",
            "Observação do Técnico",
            "Fotos do Equipamento",
        ]
    );
}

#[test]
fn filename_uses_number_and_customer() {
    assert_eq!(order().report_filename(), "OS_42_Ana_Maria.pdf");
    assert_eq!(model::report_filename(None, None), "OS_000_cliente.pdf");
}

#[test]
fn generate_writes_the_pdf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = dir.path().join("relatorios");
    let order = order();
    let composer = composer();

    let path = composer.generate(&order, &out_dir).expect("generate");
    assert_eq!(path, out_dir.join("OS_42_Ana_Maria.pdf"));

    let bytes = std::fs::read(&path).expect("read pdf");
    assert!(bytes.starts_with(b"%PDF"));
    let document = lopdf::Document::load_mem(&bytes).expect("parse pdf");
    assert_eq!(document.get_pages().len(), composer.compose(&order).page_count());
}
