//! Keyword patterns, weights and thresholds of the classifier.
//!
//! Everything here is compiled once into a [`PatternConfig`] and passed by
//! reference to the evaluators; nothing is mutated after construction.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

const QUOTE_SUBJECT: &[&str] = &[
    r"\bCOTIZACI[OÓ]N\b",
    r"\bCOTIZAR\b",
    r"\bCOT\.\b",
    r"\bCOT\b",
    r"\bCOT RESIDENCIAL\b",
    r"\bAPOYO COTIZACION\b",
    r"\bAGENTE\s+\d+",
    r"\bAG\s+\d+",
];

const QUOTE_BODY: &[&str] = &[
    r"solicito su apoyo cotizando",
    r"apoyo para cotizar",
    r"solicitud de cotizaci[óo]n",
    r"\bAGENTE\s+\d+",
];

const RENEWAL_SUBJECT: &[&str] = &[
    r"\bRENOVACI[OÓ]N\b",
    r"\bRENOVAR\b",
    r"\bRENOVACIONES\b",
    r"\bREHABILITACI[OÓ]N\b",
    r"\bPR[OÓ]RROGA\b",
    r"\bRV\b",
    r"\bRENOV\b",
    r"\bCOTI RENOVACI[OÓ]N\b",
];

const RENEWAL_BODY: &[&str] = &[
    r"vigencia pr[óo]xima a vencer",
    r"solicito renovaci[óo]n",
    r"renovar p[óo]liza",
    r"dar continuidad a la p[óo]liza",
    r"pr[óo]rroga de la vigencia",
    r"rehabilitaci[óo]n de p[óo]liza",
    r"continuidad de p[óo]liza",
];

const ENDORSEMENT_SUBJECT: &[&str] = &[
    r"\bENDOSO\b",
    r"\bENDOSOS\b",
    r"\bENDOSAR\b",
    r"\bENDORSEMENT\b",
    r"\bENDOSO [AB]\b",
    r"\bENDOSO DE BP\b",
    r"\bENDOSO ESPECIAL\b",
    r"\bENDOSO.*MODIFICACI[OÓ]N\b",
    r"\bMODIFICACI[OÓ]N.*ENDOSO\b",
    r"\bINCISO \d+\b",
    r"CORRECCI[OÓ]N DE DATO",
    r"CAMBIO DE COBERTURA",
    r"INCREMENTO DE SUMA ASEGURADA",
    r"\bOT-\d+",
    r"DOCUMENTO \d+",
    r"MODIFICACI[OÓ]N.*NO\s+OT",
    r"ENDOSO.*\(.*(MODIFICACI[OÓ]N|CAMBIO|CORRECCI[OÓ]N).*\)",
];

const ENDORSEMENT_BODY: &[&str] = &[
    r"correcci[óo]n de dato",
    r"modificar inciso",
    r"incluir.{0,20}beneficiario",
    r"excluir.{0,20}beneficiario",
    r"cambiar suma asegurada",
    r"actualizaci[óo]n de cobertura",
    r"actualizaci[óo]n de beneficios",
    r"incorporaci[óo]n de cl[áa]usulas",
];

/// Capture group 1 is the agent code.
const AGENT_CODE: &[&str] = &[r"\bAGENTE\s+(\d+)", r"\bAG\s+(\d+)"];

/// Capture group 1 is the policy number.
const POLICY_NUMBER: &[&str] = &[
    r"\bP[ÓO]LIZA\s+(\d+)",
    r"\bOT\s+(\d+)",
    r"\bN[ÚU]MERO\s+(\d+)",
];

/// Score added (or subtracted) by each criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub quote_subject: i32,
    pub quote_agent_code: i32,
    pub quote_body: i32,
    pub quote_slip: i32,
    pub quote_slip_complete: i32,
    pub quote_pdf: i32,
    pub quote_policy_pdf_penalty: i32,

    pub renewal_subject: i32,
    pub renewal_policy_number: i32,
    pub renewal_body: i32,
    pub renewal_pdf: i32,
    pub renewal_policy_pdf: i32,
    pub renewal_quote_pdf_penalty: i32,

    pub endorsement_subject: i32,
    pub endorsement_body: i32,
    pub endorsement_policy_number: i32,
    pub endorsement_pdf: i32,
    pub endorsement_policy_pdf: i32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            quote_subject: 30,
            quote_agent_code: 20,
            quote_body: 15,
            quote_slip: 25,
            quote_slip_complete: 15,
            quote_pdf: 20,
            quote_policy_pdf_penalty: -15,

            renewal_subject: 35,
            renewal_policy_number: 20,
            renewal_body: 15,
            renewal_pdf: 25,
            renewal_policy_pdf: 20,
            renewal_quote_pdf_penalty: -20,

            endorsement_subject: 35,
            endorsement_body: 15,
            endorsement_policy_number: 25,
            endorsement_pdf: 20,
            endorsement_policy_pdf: 15,
        }
    }
}

/// Decision thresholds. Loaded from the `[classification]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum quote score for the quote category to be met.
    pub quote_threshold: u8,
    pub renewal_threshold: u8,
    pub endorsement_threshold: u8,
    /// Minimum score of any primary classification.
    pub primary_floor: u8,
    /// A slip is complete when it has more filled cells than this.
    pub slip_min_filled_cells: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            quote_threshold: 40,
            renewal_threshold: 40,
            endorsement_threshold: 30,
            primary_floor: 30,
            slip_min_filled_cells: 5,
        }
    }
}

/// Compiled, immutable pattern configuration.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    pub quote_subject: Vec<Regex>,
    pub quote_body: Vec<Regex>,
    pub renewal_subject: Vec<Regex>,
    pub renewal_body: Vec<Regex>,
    pub endorsement_subject: Vec<Regex>,
    pub endorsement_body: Vec<Regex>,
    pub agent_code: Vec<Regex>,
    pub policy_number: Vec<Regex>,
    pub weights: Weights,
    pub thresholds: Thresholds,
}

impl PatternConfig {
    /// Compile the built-in patterns with the given thresholds.
    pub fn new(thresholds: Thresholds) -> Result<Self> {
        Ok(Self {
            quote_subject: compile(QUOTE_SUBJECT)?,
            quote_body: compile(QUOTE_BODY)?,
            renewal_subject: compile(RENEWAL_SUBJECT)?,
            renewal_body: compile(RENEWAL_BODY)?,
            endorsement_subject: compile(ENDORSEMENT_SUBJECT)?,
            endorsement_body: compile(ENDORSEMENT_BODY)?,
            agent_code: compile(AGENT_CODE)?,
            policy_number: compile(POLICY_NUMBER)?,
            weights: Weights::default(),
            thresholds,
        })
    }

    /// Built-in patterns with default thresholds.
    pub fn standard() -> Result<Self> {
        Self::new(Thresholds::default())
    }
}

/// Compile case-insensitive patterns, keeping their order.
fn compile(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).map_err(Into::into))
        .collect()
}

/// Whether any pattern matches `text`.
pub fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Group 1 of the first pattern that matches `text`.
pub fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        let config = PatternConfig::standard().unwrap();
        assert_eq!(config.quote_subject.len(), QUOTE_SUBJECT.len());
        assert_eq!(config.endorsement_subject.len(), ENDORSEMENT_SUBJECT.len());
    }

    #[test]
    fn test_patterns_ignore_case() {
        let config = PatternConfig::standard().unwrap();
        assert!(any_match(&config.quote_body, "SOLICITO SU APOYO COTIZANDO"));
        assert!(any_match(&config.renewal_body, "renovar póliza 12"));
        assert!(any_match(&config.renewal_body, "RENOVAR PÓLIZA 12"));
    }

    #[test]
    fn test_cot_is_a_whole_word() {
        let config = PatternConfig::standard().unwrap();
        assert!(any_match(&config.quote_subject, "RE: COT AUTOS"));
        assert!(!any_match(&config.quote_subject, "COTORRO"));
    }

    #[test]
    fn test_first_capture_respects_order() {
        let config = PatternConfig::standard().unwrap();
        assert_eq!(
            first_capture(&config.policy_number, "OT 55 PÓLIZA 77"),
            Some("77".to_string())
        );
        assert_eq!(
            first_capture(&config.agent_code, "AG 12 AGENTE 34"),
            Some("34".to_string())
        );
        assert_eq!(first_capture(&config.agent_code, "sin datos"), None);
    }
}
