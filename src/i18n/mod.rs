//! English and Spanish strings for CLI output and the classification
//! report.
//!
//! Stored JSON keys and status strings are business vocabulary and stay in
//! Spanish whatever the language.

use std::sync::OnceLock;

static CURRENT_LANG: OnceLock<Lang> = OnceLock::new();

/// Environment variables consulted for the language, in order.
const LANG_VARS: [&str; 3] = ["POLICYMAIL_LANG", "LC_MESSAGES", "LANG"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Es,
}

impl Lang {
    /// Accepts bare codes and locale names (`es`, `es_MX.UTF-8`, `en-US`).
    pub fn from_code(code: &str) -> Option<Self> {
        let language = code.split(['_', '-', '.']).next()?;
        if language.eq_ignore_ascii_case("es") {
            Some(Self::Es)
        } else if language.eq_ignore_ascii_case("en") {
            Some(Self::En)
        } else {
            None
        }
    }
}

/// First call wins; later calls are ignored.
pub fn set_lang(lang: Lang) {
    let _ = CURRENT_LANG.set(lang);
}

pub fn lang() -> Lang {
    CURRENT_LANG.get().copied().unwrap_or(Lang::En)
}

/// Language from the first recognised value in [`LANG_VARS`], else English.
pub fn detect_system_lang() -> Lang {
    LANG_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| Lang::from_code(&value))
        .unwrap_or(Lang::En)
}

/// Defines `$name()`, returning the string for the current language.
macro_rules! msg {
    ($name:ident, $en:expr, $es:expr) => {
        pub fn $name() -> &'static str {
            match lang() {
                Lang::En => $en,
                Lang::Es => $es,
            }
        }
    };
}

// ── General ──────────────────────────────────────────────────────

msg!(
    app_about,
    "policymail: extract insurance mail archives and classify quote, renewal and endorsement requests.",
    "policymail: extrae archivos de correo de seguros y clasifica solicitudes de cotizaci\u{f3}n, renovaci\u{f3}n y endoso."
);
msg!(
    app_long_about,
    "policymail: extract insurance mail archives and classify requests.\nExtraction is resumable: interrupt it at any time and run it again\nto continue where it stopped.",
    "policymail: extrae archivos de correo de seguros y clasifica solicitudes.\nLa extracci\u{f3}n se puede reanudar: interr\u{fa}mpela cuando quieras y\nvuelve a ejecutarla para continuar donde se detuvo."
);
msg!(
    app_after_help,
    "Examples:\n  policymail extract mailbox.mbox -o output\n  policymail classify -o output\n  policymail stats --json",
    "Ejemplos:\n  policymail extract buzon.mbox -o output\n  policymail classify -o output\n  policymail stats --json"
);

// ── CLI help strings ─────────────────────────────────────────────

msg!(
    help_cmd_extract,
    "Extract an archive into the store (resumable)",
    "Extraer un archivo al almac\u{e9}n (reanudable)"
);
msg!(
    help_cmd_classify,
    "Classify every extracted message and write the report",
    "Clasificar todos los mensajes extra\u{ed}dos y escribir el informe"
);
msg!(
    help_cmd_reclassify,
    "Classify again and compare with the previous results",
    "Clasificar de nuevo y comparar con los resultados anteriores"
);
msg!(
    help_cmd_stats,
    "Show statistics about the store",
    "Mostrar estad\u{ed}sticas del almac\u{e9}n"
);
msg!(
    help_cmd_completions,
    "Generate shell completions",
    "Generar completions para tu shell"
);
msg!(
    help_cmd_manpage,
    "Generate a man page",
    "Generar una p\u{e1}gina de manual"
);

// ── Progress ─────────────────────────────────────────────────────

msg!(msg_extracting, "Extracting", "Extrayendo");
msg!(msg_classifying, "Classifying", "Clasificando");
msg!(
    msg_interrupting,
    "Interrupt received, saving progress...",
    "Interrupci\u{f3}n recibida, guardando progreso..."
);
msg!(
    msg_resume_hint,
    "Run interrupted. Run the same command again to resume.",
    "Ejecuci\u{f3}n interrumpida. Vuelve a ejecutar el mismo comando para reanudar."
);

// ── Extraction summary ───────────────────────────────────────────

msg!(msg_archive, "Archive", "Archivo");
msg!(msg_store, "Store", "Almac\u{e9}n");
msg!(msg_folders, "Folders", "Carpetas");
msg!(msg_discovered, "Discovered", "Descubiertos");
msg!(msg_extracted, "Extracted", "Extra\u{ed}dos");
msg!(msg_already_processed, "Already processed", "Ya procesados");
msg!(msg_failed, "Failed", "Fallidos");
msg!(msg_attachments_written, "Attachments", "Adjuntos");
msg!(msg_attachments_skipped, "Attachments skipped", "Adjuntos omitidos");
msg!(msg_elapsed, "Elapsed", "Tiempo");

// ── Store statistics ─────────────────────────────────────────────

msg!(msg_message_count, "Messages", "Mensajes");
msg!(msg_attachment_size, "Attachment size", "Tama\u{f1}o adjuntos");
msg!(msg_unreadable, "Unreadable", "Ilegibles");
msg!(msg_classification, "Classification", "Clasificaci\u{f3}n");
msg!(
    msg_not_classified_yet,
    "not run yet",
    "a\u{fa}n no ejecutada"
);

// ── Reclassification ─────────────────────────────────────────────

msg!(msg_backup, "Backup", "Copia de seguridad");
msg!(msg_before, "Before", "Antes");
msg!(msg_after, "After", "Despu\u{e9}s");
msg!(msg_changes, "Changes", "Cambios");
msg!(msg_improved, "Newly classified", "Nuevos clasificados");
msg!(msg_new, "new", "nuevo");
msg!(msg_skipped_errors, "Skipped (errors)", "Omitidos (errores)");

// ── Report ───────────────────────────────────────────────────────

msg!(
    report_title,
    "EMAIL CLASSIFICATION REPORT",
    "REPORTE DE CLASIFICACI\u{d3}N DE CORREOS"
);
msg!(report_summary, "SUMMARY", "RESUMEN");
msg!(report_total, "Total emails", "Total de correos");
msg!(report_by_category, "BY CATEGORY", "POR CATEGOR\u{cd}A");
msg!(report_no_subject, "(no subject)", "(sin asunto)");
msg!(report_more, "more", "m\u{e1}s");
msg!(report_saved_to, "Results saved to", "Resultados guardados en");
msg!(category_quotes, "Quotes", "Cotizaciones");
msg!(category_renewals, "Renewals", "Renovaciones");
msg!(category_endorsements, "Endorsements", "Endosos");
msg!(category_unclassified, "Unclassified", "Sin clasificar");

// ── Errors ───────────────────────────────────────────────────────

msg!(
    err_run_classify_first,
    "Run 'policymail classify' first",
    "Ejecuta primero 'policymail classify'"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_names_resolve() {
        for code in ["es", "ES", "es_MX.UTF-8", "es-419"] {
            assert_eq!(Lang::from_code(code), Some(Lang::Es), "{code}");
        }
        for code in ["en", "en_US", "en-GB.utf8"] {
            assert_eq!(Lang::from_code(code), Some(Lang::En), "{code}");
        }
    }

    #[test]
    fn test_unknown_locales_rejected() {
        assert_eq!(Lang::from_code("fr_FR"), None);
        assert_eq!(Lang::from_code("C"), None);
        assert_eq!(Lang::from_code(""), None);
    }

    #[test]
    fn test_report_strings_defined() {
        for text in [
            report_title(),
            report_summary(),
            category_quotes(),
            category_unclassified(),
            err_run_classify_first(),
        ] {
            assert!(!text.is_empty());
        }
    }
}
