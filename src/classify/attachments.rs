//! Attachment categorization by filename, and slip completeness.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PolicyMailError, Result};

const SPREADSHEET_EXTENSIONS: &[&str] = &[".XLSX", ".XLS"];
const QUOTE_PDF_WORDS: &[&str] = &["COTIZACION", "COT", "PROPUESTA", "SEGURO MULTIPLE EMPRESARIAL"];
const POLICY_PDF_WORDS: &[&str] = &["POLIZA", "PBE", "RECIBO"];
const RENEWAL_PDF_WORDS: &[&str] = &[
    "RENOVACION",
    "RENOVAR",
    "CONDICIONES DE RENOVACION",
    "PRORROGA",
    "REHABILITACION",
];
const ENDORSEMENT_PDF_WORDS: &[&str] = &["ENDOSO", "BENEFICIOS", "INCISO", "CORRECCION", "MODIFICACION"];

/// Category of one attachment file. The first matching category wins, in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Slip,
    Spreadsheet,
    QuotePdf,
    PolicyPdf,
    RenewalPdf,
    EndorsementPdf,
}

impl AttachmentKind {
    /// Categorize a file by name; `None` for anything uncategorized.
    pub fn of(filename: &str) -> Option<Self> {
        let name = fold_accents(&filename.to_uppercase());
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

        if SPREADSHEET_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            return Some(if name.contains("SLIP") {
                Self::Slip
            } else {
                Self::Spreadsheet
            });
        }
        if !name.ends_with(".PDF") {
            return None;
        }
        if has(QUOTE_PDF_WORDS) {
            Some(Self::QuotePdf)
        } else if has(POLICY_PDF_WORDS) {
            Some(Self::PolicyPdf)
        } else if has(RENEWAL_PDF_WORDS) {
            Some(Self::RenewalPdf)
        } else if has(ENDORSEMENT_PDF_WORDS) {
            Some(Self::EndorsementPdf)
        } else {
            None
        }
    }
}

/// Attachment evidence of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentAnalysis {
    pub has_slip: bool,
    /// Whether at least one slip has enough filled cells.
    pub slip_complete: bool,
    pub slip_files: Vec<String>,
    pub pdf_cotizacion: Vec<String>,
    pub pdf_poliza: Vec<String>,
    pub pdf_renovacion: Vec<String>,
    pub pdf_endoso: Vec<String>,
    pub excel_files: Vec<String>,
    pub total_attachments: usize,
}

impl AttachmentAnalysis {
    /// Analyze stored attachment files. Slip workbooks are opened to check
    /// completeness; a workbook that cannot be read counts as incomplete.
    pub fn of_files(files: &[PathBuf], slip_min_filled_cells: usize) -> Self {
        let mut analysis = Self {
            total_attachments: files.len(),
            ..Default::default()
        };

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some(kind) = AttachmentKind::of(&name) else {
                continue;
            };
            match kind {
                AttachmentKind::Slip => {
                    analysis.has_slip = true;
                    match filled_cells(path) {
                        Ok(count) => {
                            debug!(path = %path.display(), count, "Slip cells counted");
                            analysis.slip_complete |= count > slip_min_filled_cells;
                        }
                        Err(e) => warn!(error = %e, "Slip unreadable, treating as incomplete"),
                    }
                    analysis.slip_files.push(name);
                }
                AttachmentKind::Spreadsheet => analysis.excel_files.push(name),
                AttachmentKind::QuotePdf => analysis.pdf_cotizacion.push(name),
                AttachmentKind::PolicyPdf => analysis.pdf_poliza.push(name),
                AttachmentKind::RenewalPdf => analysis.pdf_renovacion.push(name),
                AttachmentKind::EndorsementPdf => analysis.pdf_endoso.push(name),
            }
        }
        analysis
    }

    pub fn has_quote_pdf(&self) -> bool {
        !self.pdf_cotizacion.is_empty()
    }

    pub fn has_policy_pdf(&self) -> bool {
        !self.pdf_poliza.is_empty()
    }

    pub fn has_renewal_pdf(&self) -> bool {
        !self.pdf_renovacion.is_empty()
    }

    pub fn has_endorsement_pdf(&self) -> bool {
        !self.pdf_endoso.is_empty()
    }
}

/// Count non-empty cells of the first worksheet. The workbook is closed
/// when this returns.
pub fn filled_cells(path: &Path) -> Result<usize> {
    let spreadsheet_error = |reason: String| PolicyMailError::Spreadsheet {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_error("workbook has no sheets".into()))?
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    Ok(range
        .used_cells()
        .filter(|(_, _, cell)| match cell {
            Data::Empty => false,
            Data::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .count())
}

/// Replace accented vowels (and `Ñ`) of upper-case text with their base
/// letter.
pub fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'Ñ' => 'N',
            c => c,
        })
        .collect()
}
