use criterion::{black_box, criterion_group, criterion_main, Criterion};

use policymail::classify::{AttachmentAnalysis, ClassificationInput, Classifier, PatternConfig};

const BODY: &str = "Buen día,\n\nSolicito su apoyo cotizando la flotilla del cliente, agente 4521.\n\
Adjunto slip con la información de las unidades y la póliza anterior para referencia.\n\nSaludos";

fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::new(PatternConfig::standard().unwrap());
    let attachments = AttachmentAnalysis {
        has_slip: true,
        slip_complete: true,
        slip_files: vec!["SLIP flotilla.xlsx".into()],
        pdf_poliza: vec!["Poliza 2023.pdf".into()],
        total_attachments: 2,
        ..Default::default()
    };

    c.bench_function("classify_quote", |b| {
        b.iter(|| {
            classifier.classify(black_box(&ClassificationInput {
                subject: "RE: Cotización flotilla Agente 4521",
                body: BODY,
                attachments: &attachments,
            }))
        })
    });

    let empty = AttachmentAnalysis::default();
    c.bench_function("classify_unmatched", |b| {
        b.iter(|| {
            classifier.classify(black_box(&ClassificationInput {
                subject: "Invitación a comer",
                body: "Hola, ¿nos vemos el viernes?",
                attachments: &empty,
            }))
        })
    });
}

fn bench_compile_patterns(c: &mut Criterion) {
    c.bench_function("compile_patterns", |b| b.iter(|| PatternConfig::standard().unwrap()));
}

criterion_group!(benches, bench_classify, bench_compile_patterns);
criterion_main!(benches);
