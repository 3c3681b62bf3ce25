//! Integration tests for classification and aggregation over a real store.

use std::path::Path;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use policymail::aggregate::{self, CategoryCounts};
use policymail::archive::memory::{MemoryArchive, MemoryAttachment, MemoryFolder, MemoryMessage};
use policymail::classify::{
    AttachmentAnalysis, Category, CategoryDetails, ClassificationInput, Classifier, PatternConfig,
};
use policymail::error::PolicyMailError;
use policymail::extract::{ExtractOptions, Extractor};
use policymail::model::message::MessageId;
use policymail::store::{StoreLayout, StoreReader};

fn classifier() -> Classifier {
    Classifier::new(PatternConfig::standard().unwrap())
}

fn pdf(name: &str) -> MemoryAttachment {
    MemoryAttachment::new(name, b"%PDF-1.4".to_vec())
}

/// Extract `messages` into `output`, ids assigned in order from 1.
fn store_with(output: &Path, messages: Vec<MemoryMessage>) -> StoreReader {
    let folder = messages
        .into_iter()
        .fold(MemoryFolder::new("Inbox"), MemoryFolder::with_message);
    Extractor::new(output, ExtractOptions::default())
        .unwrap()
        .extract(&MemoryArchive::new(folder))
        .unwrap();
    StoreReader::open(output, 8).unwrap()
}

fn three_kinds() -> Vec<MemoryMessage> {
    vec![
        MemoryMessage::new("Renovación póliza 4455")
            .plain("Adjunto condiciones")
            .attachment(pdf("Renovacion 2024.pdf")),
        MemoryMessage::new("Endoso A póliza 789")
            .plain("Favor de aplicar")
            .attachment(pdf("Poliza 789.pdf")),
        MemoryMessage::new("Saludos").plain("Hola"),
    ]
}

// ─── Scenarios ──────────────────────────────────────────────────────

#[test]
fn test_quote_with_complete_slip() {
    let attachments = AttachmentAnalysis {
        has_slip: true,
        slip_complete: true,
        slip_files: vec!["SLIP flotilla.xlsx".into()],
        pdf_cotizacion: vec!["Cotizacion.pdf".into()],
        total_attachments: 2,
        ..Default::default()
    };
    let result = classifier().classify(&ClassificationInput {
        subject: "Cotización Agente 1234",
        body: "Solicito su apoyo cotizando la flotilla",
        attachments: &attachments,
    });

    let quote = &result.classifications.cotizacion;
    assert!(quote.is_cotizacion);
    assert_eq!(quote.confidence, 100);
    assert_eq!(quote.agente_code, "1234");
    assert_eq!(quote.status, "Cotización con información completa");
    assert_eq!(quote.details.slip_files, vec!["SLIP flotilla.xlsx"]);
    assert_eq!(result.primary.category, Category::Quote);
    assert_eq!(result.primary.confidence, 100);
    assert!(matches!(result.primary.details, CategoryDetails::Quote(_)));
    // Quote PDF without a renewal subject is a contra-indicator.
    assert_eq!(result.classifications.renovacion.confidence, 0);
}

/// Slip workbook bytes with `filled` non-empty cells and a whitespace cell.
fn slip_workbook(filled: u32) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for row in 0..filled {
        sheet.write_string(row, 0, format!("Unidad {row}")).unwrap();
    }
    sheet.write_string(0, 1, " ").unwrap();
    workbook.save_to_buffer().unwrap()
}

#[test]
fn test_quote_with_real_slip_workbook() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(
        temp.path(),
        vec![
            MemoryMessage::new("Cotización Agente 1234")
                .plain("Solicito su apoyo cotizando la flotilla")
                .attachment(MemoryAttachment::new("SLIP flotilla.xlsx", slip_workbook(6)))
                .attachment(pdf("Cotizacion.pdf")),
            MemoryMessage::new("Cotización Agente 1234")
                .plain("Solicito su apoyo cotizando la flotilla")
                .attachment(MemoryAttachment::new("SLIP flotilla.xlsx", slip_workbook(5))),
        ],
    );
    let classifier = classifier();

    let complete = classifier.classify_email(&mut store, MessageId(1)).unwrap();
    assert!(complete.attachment_analysis.slip_complete);
    let quote = &complete.classifications.cotizacion;
    assert_eq!(quote.confidence, 100);
    assert_eq!(quote.status, "Cotización con información completa");
    assert_eq!(complete.primary_classification.category, Category::Quote);

    let pending = classifier.classify_email(&mut store, MessageId(2)).unwrap();
    assert!(pending.attachment_analysis.has_slip);
    assert!(!pending.attachment_analysis.slip_complete);
    assert_eq!(pending.classifications.cotizacion.status, "Cotización pendiente");
}

#[test]
fn test_renewal_with_renewal_pdf() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());

    let email = classifier().classify_email(&mut store, MessageId(1)).unwrap();
    let renewal = &email.classifications.renovacion;
    assert!(renewal.is_renovacion);
    assert_eq!(renewal.confidence, 80);
    assert_eq!(renewal.poliza_number, "4455");
    assert_eq!(renewal.status, "Renovación con información completa");
    assert_eq!(renewal.details.pdf_renovacion, vec!["Renovacion 2024.pdf"]);
    assert_eq!(email.primary_classification.category, Category::Renewal);
    assert_eq!(email.attachment_analysis.total_attachments, 1);
    assert!(!email.classifications.endoso.is_endoso);
}

#[test]
fn test_endorsement_a_with_policy_pdf() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());

    let email = classifier().classify_email(&mut store, MessageId(2)).unwrap();
    let endorsement = &email.classifications.endoso;
    assert!(endorsement.is_endoso);
    assert_eq!(endorsement.confidence, 75);
    assert_eq!(endorsement.endoso_type, "A");
    assert_eq!(endorsement.poliza_number, "789");
    assert_eq!(endorsement.status, "Endoso completo");
    assert_eq!(email.primary_classification.category, Category::Endorsement);
    assert_eq!(email.primary_classification.status, "Endoso completo");
    assert_eq!(email.classifications.cotizacion.confidence, 0);
}

#[test]
fn test_threshold_floor_edge_case() {
    let result = classifier().classify(&ClassificationInput {
        subject: "RE: Favor cotizar",
        body: "",
        attachments: &AttachmentAnalysis::default(),
    });
    assert_eq!(result.classifications.cotizacion.confidence, 30);
    assert!(!result.classifications.cotizacion.is_cotizacion);
    assert_eq!(result.primary.category, Category::Unclassified);
}

#[test]
fn test_incomplete_slip_is_pending() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(
        temp.path(),
        vec![MemoryMessage::new("Cotización autos")
            .plain("Apoyo para cotizar")
            .attachment(MemoryAttachment::new("SLIP autos.xlsx", b"no es un libro".to_vec()))],
    );

    let email = classifier().classify_email(&mut store, MessageId(1)).unwrap();
    assert!(email.attachment_analysis.has_slip);
    assert!(!email.attachment_analysis.slip_complete);
    let quote = &email.classifications.cotizacion;
    assert_eq!(quote.confidence, 70);
    assert_eq!(quote.status, "Cotización pendiente");
    assert_eq!(email.primary_classification.category, Category::Quote);
}

// ─── Properties ─────────────────────────────────────────────────────

#[test]
fn test_contra_indicators_suppress_scores() {
    let policy = AttachmentAnalysis {
        pdf_poliza: vec!["Poliza.pdf".into()],
        total_attachments: 1,
        ..Default::default()
    };
    let quote = classifier().classify(&ClassificationInput {
        subject: "Cotización",
        body: "",
        attachments: &policy,
    });
    assert_eq!(quote.classifications.cotizacion.confidence, 15);

    let quote_pdf = AttachmentAnalysis {
        pdf_cotizacion: vec!["Cotizacion.pdf".into()],
        total_attachments: 1,
        ..Default::default()
    };
    let renewal = classifier().classify(&ClassificationInput {
        subject: "Renovar",
        body: "",
        attachments: &quote_pdf,
    });
    assert_eq!(renewal.classifications.renovacion.confidence, 15);
    assert!(!renewal.classifications.renovacion.is_renovacion);
}

#[test]
fn test_scores_stay_in_bounds() {
    let everything = AttachmentAnalysis {
        has_slip: true,
        slip_complete: true,
        slip_files: vec!["SLIP.xlsx".into()],
        pdf_cotizacion: vec!["cot.pdf".into()],
        pdf_poliza: vec!["poliza.pdf".into()],
        pdf_renovacion: vec!["renovacion.pdf".into()],
        pdf_endoso: vec!["endoso.pdf".into()],
        excel_files: vec!["datos.xlsx".into()],
        total_attachments: 6,
    };
    let subjects = [
        "",
        "Cotización Renovación Endoso A póliza 1 agente 2",
        "ENDOSO modificación INCISO 3 OT-4",
        "RV",
    ];
    let bodies = [
        "",
        "solicito renovación, corrección de dato, apoyo para cotizar, agente 5",
    ];
    let classifier = classifier();
    for attachments in [&AttachmentAnalysis::default(), &everything] {
        for subject in subjects {
            for body in bodies {
                let result = classifier.classify(&ClassificationInput {
                    subject,
                    body,
                    attachments,
                });
                let c = &result.classifications;
                for score in [
                    c.cotizacion.confidence,
                    c.renovacion.confidence,
                    c.endoso.confidence,
                    result.primary.confidence,
                ] {
                    assert!(score <= 100, "{subject:?} / {body:?} scored {score}");
                }
            }
        }
    }
}

#[test]
fn test_classification_is_deterministic() {
    let attachments = AttachmentAnalysis {
        pdf_endoso: vec!["Endoso.pdf".into()],
        total_attachments: 1,
        ..Default::default()
    };
    let input = ClassificationInput {
        subject: "Endoso B OT 55",
        body: "Incluir al beneficiario",
        attachments: &attachments,
    };
    let classifier = classifier();
    assert_eq!(classifier.classify(&input), classifier.classify(&input));
}

// ─── Aggregation ────────────────────────────────────────────────────

#[test]
fn test_classify_all_writes_results_and_report() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());

    let results = aggregate::classify_all(&classifier(), &mut store).unwrap();
    assert_eq!(
        results.counts,
        CategoryCounts {
            total_emails: 3,
            cotizacion: 0,
            renovacion: 1,
            endoso: 1,
            sin_clasificar: 1,
        }
    );
    assert_eq!(results.errors, 0);

    let results_file = temp.child("classification/classification_results.json");
    results_file.assert(predicate::str::contains("\"total_emails\": 3"));
    results_file.assert(predicate::str::contains("\"email_id\": \"email_000002\""));
    results_file.assert(predicate::str::contains("\"type\": \"endoso\""));

    aggregate::write_report(&store, &results).unwrap();
    let report = temp.child("classification/classification_report.txt");
    report.assert(predicate::str::contains("email_000001: Renovación póliza 4455"));
    report.assert(predicate::str::contains("email_000002: Endoso A póliza 789"));
    report.assert(predicate::str::contains("(33.3%)"));
}

#[test]
fn test_classify_all_is_reproducible() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());
    let path = StoreLayout::new(temp.path()).results_path();

    aggregate::classify_all(&classifier(), &mut store).unwrap();
    let first = std::fs::read(&path).unwrap();
    aggregate::classify_all(&classifier(), &mut store).unwrap();
    assert_eq!(first, std::fs::read(&path).unwrap());
}

#[test]
fn test_missing_metadata_is_skipped_and_counted() {
    let temp = TempDir::new().unwrap();
    store_with(temp.path(), three_kinds());
    std::fs::remove_file(StoreLayout::new(temp.path()).metadata_path(MessageId(3))).unwrap();

    let mut store = StoreReader::open(temp.path(), 8).unwrap();
    assert!(matches!(
        classifier().classify_email(&mut store, MessageId(3)),
        Err(PolicyMailError::MetadataNotFound(MessageId(3)))
    ));

    let results = aggregate::classify_all(&classifier(), &mut store).unwrap();
    assert_eq!(results.errors, 1);
    assert_eq!(results.counts.total_emails, 2);
    assert_eq!(results.counts.sin_clasificar, 0);
}

#[test]
fn test_reclassify_requires_previous_results() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());
    assert!(matches!(
        aggregate::reclassify(&classifier(), &mut store),
        Err(PolicyMailError::NoPreviousResults(_))
    ));
}

#[test]
fn test_reclassify_reports_changes() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());
    temp.child("classification/classification_results.json")
        .write_str(
            r#"{
              "total_emails": 2,
              "sin_clasificar": 2,
              "emails": [
                {"email_id": "email_000001", "primary_classification": {"type": "sin_clasificar", "confidence": 0}},
                {"email_id": "email_000003", "primary_classification": {"type": "sin_clasificar", "confidence": 0}}
              ]
            }"#,
        )
        .unwrap();

    let report = aggregate::reclassify(&classifier(), &mut store).unwrap();
    assert!(report.backup_path.is_file());
    assert!(report
        .backup_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("classification_results_backup_"));
    assert_eq!(report.before.total_emails, 2);
    assert_eq!(report.before.sin_clasificar, 2);
    assert_eq!(report.after.total_emails, 3);
    assert_eq!(report.improved, 1);

    let changed: Vec<(MessageId, Option<&str>, Category)> = report
        .changes
        .iter()
        .map(|c| (c.email_id, c.before.as_deref(), c.after))
        .collect();
    assert_eq!(
        changed,
        vec![
            (MessageId(1), Some("sin_clasificar"), Category::Renewal),
            (MessageId(2), None, Category::Endorsement),
        ]
    );
    temp.child("classification/classification_results.json")
        .assert(predicate::str::contains("\"total_emails\": 3"));
}

#[test]
fn test_stats_summarize_store() {
    let temp = TempDir::new().unwrap();
    let mut store = store_with(temp.path(), three_kinds());

    let before = aggregate::stats(&store);
    assert_eq!(before.messages, 3);
    assert_eq!(before.attachments, 2);
    assert_eq!(before.attachment_bytes, 16);
    assert_eq!(before.folders.len(), 1);
    assert!(before.classification.is_none());

    aggregate::classify_all(&classifier(), &mut store).unwrap();
    let after = aggregate::stats(&store);
    assert_eq!(after.classification.map(|c| c.renovacion), Some(1));
}
