//! The three weighted evaluators.
//!
//! Each evaluator walks a fixed checklist. A satisfied criterion adds its
//! weight and records a criterion label; contra-indicators subtract. The
//! final score is clamped to `0..=100` before the category decides whether
//! it is met.

use serde::Serialize;

use super::attachments::{fold_accents, AttachmentAnalysis};
use super::entities::Entities;
use super::patterns::{any_match, PatternConfig};

pub const STATUS_QUOTE_COMPLETE: &str = "Cotización con información completa";
pub const STATUS_QUOTE_PENDING: &str = "Cotización pendiente";
pub const STATUS_QUOTE_DETECTED: &str = "Cotización detectada";
pub const STATUS_RENEWAL_COMPLETE: &str = "Renovación con información completa";
pub const STATUS_RENEWAL_PENDING: &str = "Renovación pendiente";
pub const STATUS_ENDORSEMENT_COMPLETE: &str = "Endoso completo";
pub const STATUS_ENDORSEMENT_INCOMPLETE: &str = "Endoso incompleto";

/// Normalized inputs shared by all evaluators.
#[derive(Debug, Clone)]
pub struct Evidence<'a> {
    /// Upper-cased subject.
    pub subject: String,
    /// Upper-cased subject without accents, for plain substring checks.
    pub subject_folded: String,
    /// Upper-cased body text.
    pub body: String,
    pub attachments: &'a AttachmentAnalysis,
    pub entities: Entities,
}

impl<'a> Evidence<'a> {
    pub fn new(
        patterns: &PatternConfig,
        subject: &str,
        body: &str,
        attachments: &'a AttachmentAnalysis,
    ) -> Self {
        let subject = subject.to_uppercase();
        let body = body.to_uppercase();
        let entities = Entities::extract(patterns, &subject, &body);
        Self {
            subject_folded: fold_accents(&subject),
            subject,
            body,
            attachments,
            entities,
        }
    }

    fn subject_mentions(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.subject_folded.contains(w))
    }
}

#[derive(Debug, Default)]
struct Scorecard {
    score: i32,
    criteria: Vec<String>,
}

impl Scorecard {
    fn add(&mut self, weight: i32, criterion: &str) {
        self.score += weight;
        self.criteria.push(criterion.to_string());
    }

    fn confidence(&self) -> u8 {
        // Lossless after the clamp.
        self.score.clamp(0, 100) as u8
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteDetails {
    pub slip_files: Vec<String>,
    pub pdf_files: Vec<String>,
    pub total_attachments: usize,
}

/// Quote (`cotizacion`) sub-result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteResult {
    pub is_cotizacion: bool,
    pub confidence: u8,
    pub criteria_met: Vec<String>,
    /// Empty when no agent code was found.
    pub agente_code: String,
    pub client_name: String,
    pub status: String,
    pub details: QuoteDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalDetails {
    pub pdf_renovacion: Vec<String>,
    pub pdf_poliza: Vec<String>,
    pub total_attachments: usize,
}

/// Renewal (`renovacion`) sub-result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalResult {
    pub is_renovacion: bool,
    pub confidence: u8,
    pub criteria_met: Vec<String>,
    /// Empty when no policy number was found.
    pub poliza_number: String,
    pub client_name: String,
    pub status: String,
    pub details: RenewalDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndorsementDetails {
    pub pdf_endoso: Vec<String>,
    pub excel_files: Vec<String>,
    pub total_attachments: usize,
}

/// Endorsement (`endoso`) sub-result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndorsementResult {
    pub is_endoso: bool,
    pub confidence: u8,
    pub criteria_met: Vec<String>,
    pub poliza_number: String,
    /// `A`, `B`, `BP`, `ESPECIAL`, or empty.
    pub endoso_type: String,
    pub client_name: String,
    pub status: String,
    pub details: EndorsementDetails,
}

pub fn evaluate_quote(patterns: &PatternConfig, ev: &Evidence<'_>) -> QuoteResult {
    let w = &patterns.weights;
    let att = ev.attachments;
    let mut card = Scorecard::default();
    let mut status = String::new();

    if any_match(&patterns.quote_subject, &ev.subject) {
        card.add(w.quote_subject, "CA1: Palabra clave en asunto");
    }
    if ev.entities.agent_code.is_some() {
        card.add(w.quote_agent_code, "CA2: Código de agente detectado");
    }
    if any_match(&patterns.quote_body, &ev.body) {
        card.add(w.quote_body, "CA3: Palabra clave en cuerpo del email");
    }
    if att.has_slip {
        card.add(w.quote_slip, "CA4: Archivo SLIP detectado");
        if att.slip_complete {
            card.add(w.quote_slip_complete, "CA5: SLIP completo");
            status = STATUS_QUOTE_COMPLETE.to_string();
        } else {
            card.add(0, "CA5: SLIP vacío o incompleto");
            status = STATUS_QUOTE_PENDING.to_string();
        }
    }
    if att.has_quote_pdf() {
        card.add(w.quote_pdf, "CA6: PDF de cotización presente");
    }
    if att.has_policy_pdf() {
        card.add(
            w.quote_policy_pdf_penalty,
            "CA7/CA10: Contiene documentos de póliza vigente",
        );
    }

    let confidence = card.confidence();
    let met = confidence >= patterns.thresholds.quote_threshold;
    if met && status.is_empty() {
        status = STATUS_QUOTE_DETECTED.to_string();
    }

    QuoteResult {
        is_cotizacion: met,
        confidence,
        criteria_met: card.criteria,
        agente_code: ev.entities.agent_code.clone().unwrap_or_default(),
        client_name: String::new(),
        status,
        details: QuoteDetails {
            slip_files: att.slip_files.clone(),
            pdf_files: att.pdf_cotizacion.clone(),
            total_attachments: att.total_attachments,
        },
    }
}

pub fn evaluate_renewal(patterns: &PatternConfig, ev: &Evidence<'_>) -> RenewalResult {
    let w = &patterns.weights;
    let att = ev.attachments;
    let mut card = Scorecard::default();

    if any_match(&patterns.renewal_subject, &ev.subject) {
        card.add(w.renewal_subject, "CA1: Palabra clave de renovación en asunto");
    }
    if ev.entities.policy_number.is_some() {
        card.add(w.renewal_policy_number, "CA2: Número de póliza detectado");
    }
    if any_match(&patterns.renewal_body, &ev.body) {
        card.add(w.renewal_body, "CA4-6: Palabra clave de renovación en cuerpo");
    }
    if att.has_renewal_pdf() {
        card.add(w.renewal_pdf, "CA-Adj1: PDF de renovación presente");
    }
    if att.has_policy_pdf() && ev.subject_mentions(&["RENOVACION", "RENOVAR"]) {
        card.add(
            w.renewal_policy_pdf,
            "CA-Adj2: Documentos de póliza + renovación",
        );
    }
    if att.has_quote_pdf() && !ev.subject_mentions(&["RENOVACION"]) {
        card.add(
            w.renewal_quote_pdf_penalty,
            "CA-Adj5: Prevención falso positivo cotización",
        );
    }

    let confidence = card.confidence();
    let met = confidence >= patterns.thresholds.renewal_threshold;
    let status = match met {
        false => "",
        true if att.total_attachments > 0 && ev.entities.policy_number.is_some() => {
            STATUS_RENEWAL_COMPLETE
        }
        true => STATUS_RENEWAL_PENDING,
    };

    RenewalResult {
        is_renovacion: met,
        confidence,
        criteria_met: card.criteria,
        poliza_number: ev.entities.policy_number.clone().unwrap_or_default(),
        client_name: String::new(),
        status: status.to_string(),
        details: RenewalDetails {
            pdf_renovacion: att.pdf_renovacion.clone(),
            pdf_poliza: att.pdf_poliza.clone(),
            total_attachments: att.total_attachments,
        },
    }
}

pub fn evaluate_endorsement(patterns: &PatternConfig, ev: &Evidence<'_>) -> EndorsementResult {
    let w = &patterns.weights;
    let att = ev.attachments;
    let mut card = Scorecard::default();
    let mut endoso_type = "";

    if any_match(&patterns.endorsement_subject, &ev.subject) {
        card.add(w.endorsement_subject, "CA1-2: Palabra clave de endoso en asunto");
        endoso_type = endorsement_subtype(&ev.subject);
    }
    if any_match(&patterns.endorsement_body, &ev.body) {
        card.add(w.endorsement_body, "CA3-4: Palabra clave de endoso en cuerpo");
    }
    if ev.entities.policy_number.is_some() {
        card.add(w.endorsement_policy_number, "CA5: Referencia a póliza vigente");
    }
    if att.has_endorsement_pdf() {
        card.add(w.endorsement_pdf, "CA7: PDF de endoso presente");
    }
    if att.has_policy_pdf() && ev.subject_mentions(&["ENDOSO", "MODIFICACION", "CORRECCION"]) {
        card.add(
            w.endorsement_policy_pdf,
            "CA8: Documentos de respaldo de endoso",
        );
    }

    let confidence = card.confidence();
    let met = confidence >= patterns.thresholds.endorsement_threshold;
    // An attached policy is both the policy reference and the supporting
    // document; an endorsement PDF needs an explicit policy number.
    let complete = att.has_policy_pdf()
        || (att.has_endorsement_pdf() && ev.entities.policy_number.is_some());
    let status = match (met, complete) {
        (false, _) => "",
        (true, true) => STATUS_ENDORSEMENT_COMPLETE,
        (true, false) => STATUS_ENDORSEMENT_INCOMPLETE,
    };

    EndorsementResult {
        is_endoso: met,
        confidence,
        criteria_met: card.criteria,
        poliza_number: ev.entities.policy_number.clone().unwrap_or_default(),
        endoso_type: endoso_type.to_string(),
        client_name: String::new(),
        status: status.to_string(),
        details: EndorsementDetails {
            pdf_endoso: att.pdf_endoso.clone(),
            excel_files: att.excel_files.clone(),
            total_attachments: att.total_attachments,
        },
    }
}

/// Subtype from the first matching subject substring.
fn endorsement_subtype(subject: &str) -> &'static str {
    [
        ("ENDOSO A", "A"),
        ("ENDOSO B", "B"),
        ("ENDOSO DE BP", "BP"),
        ("ENDOSO ESPECIAL", "ESPECIAL"),
    ]
    .into_iter()
    .find(|(needle, _)| subject.contains(needle))
    .map_or("", |(_, subtype)| subtype)
}
