//! Batch classification of the whole store, re-classification diffs,
//! the text report and store statistics.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::{Category, Classifier, EmailClassification};
use crate::error::{PolicyMailError, Result};
use crate::i18n;
use crate::model::message::MessageId;
use crate::store::{json, StoreReader};

/// Subjects listed per category in the report.
const REPORT_SAMPLES: usize = 5;

/// Subject characters shown per report line.
const REPORT_SUBJECT_CHARS: usize = 60;

/// Per-category message counts, as stored at the top of the results file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryCounts {
    pub total_emails: usize,
    pub cotizacion: usize,
    pub renovacion: usize,
    pub endoso: usize,
    pub sin_clasificar: usize,
}

impl CategoryCounts {
    pub fn add(&mut self, category: Category) {
        self.total_emails += 1;
        *self.slot(category) += 1;
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Quote => self.cotizacion,
            Category::Renewal => self.renovacion,
            Category::Endorsement => self.endoso,
            Category::Unclassified => self.sin_clasificar,
        }
    }

    fn slot(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Quote => &mut self.cotizacion,
            Category::Renewal => &mut self.renovacion,
            Category::Endorsement => &mut self.endoso,
            Category::Unclassified => &mut self.sin_clasificar,
        }
    }

    /// Share of `category` in percent; 0 for an empty store.
    pub fn percent(&self, category: Category) -> f64 {
        if self.total_emails == 0 {
            0.0
        } else {
            self.get(category) as f64 / self.total_emails as f64 * 100.0
        }
    }
}

/// Contents of `classification/classification_results.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationResults {
    #[serde(flatten)]
    pub counts: CategoryCounts,
    pub emails: Vec<EmailClassification>,
    /// Committed messages that could not be classified.
    #[serde(skip)]
    pub errors: usize,
}

impl ClassificationResults {
    /// Results whose primary category is `category`, in id order.
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &EmailClassification> {
        self.emails
            .iter()
            .filter(move |e| e.primary_classification.category == category)
    }
}

/// Loose view of a stored results file. Unknown or missing fields are
/// tolerated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoredResults {
    #[serde(flatten)]
    pub counts: CategoryCounts,
    pub emails: Vec<StoredEmail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoredEmail {
    pub email_id: String,
    pub primary_classification: StoredPrimary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoredPrimary {
    #[serde(rename = "type")]
    pub category: String,
}

/// Classify every committed message and write the results file.
pub fn classify_all(classifier: &Classifier, store: &mut StoreReader) -> Result<ClassificationResults> {
    let mut results = ClassificationResults::default();

    for id in store.ids() {
        match classifier.classify_email(store, id) {
            Ok(email) => {
                results.counts.add(email.primary_classification.category);
                results.emails.push(email);
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping message");
                results.errors += 1;
            }
        }
    }

    let layout = store.layout();
    let dir = layout.classification_dir();
    std::fs::create_dir_all(&dir).map_err(|e| PolicyMailError::io(&dir, e))?;
    json::write_json_atomic(&layout.results_path(), &results)?;
    info!(
        total = results.counts.total_emails,
        errors = results.errors,
        "Classification results written"
    );
    Ok(results)
}

/// Change of primary category of one message between two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryChange {
    pub email_id: MessageId,
    pub subject: String,
    /// `None` when the message was absent from the previous results.
    pub before: Option<String>,
    pub after: Category,
}

/// Outcome of [`reclassify`].
#[derive(Debug, Clone, Serialize)]
pub struct ReclassifyReport {
    pub backup_path: PathBuf,
    pub before: CategoryCounts,
    pub after: CategoryCounts,
    pub changes: Vec<CategoryChange>,
    /// Previously unclassified messages that now have a category.
    pub improved: usize,
    #[serde(skip)]
    pub results: ClassificationResults,
}

/// Back up the previous results, classify again and compare.
pub fn reclassify(classifier: &Classifier, store: &mut StoreReader) -> Result<ReclassifyReport> {
    let layout = store.layout().clone();
    let results_path = layout.results_path();
    if !results_path.is_file() {
        return Err(PolicyMailError::NoPreviousResults(results_path));
    }

    let previous: StoredResults = json::read_json(&results_path)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = layout.results_backup_path(&stamp);
    std::fs::copy(&results_path, &backup_path).map_err(|e| PolicyMailError::io(&backup_path, e))?;
    info!(path = %backup_path.display(), "Previous results backed up");

    let before_by_id: BTreeMap<&str, &str> = previous
        .emails
        .iter()
        .map(|e| (e.email_id.as_str(), e.primary_classification.category.as_str()))
        .collect();

    let results = classify_all(classifier, store)?;

    let unclassified = Category::Unclassified.key();
    let mut changes = Vec::new();
    let mut improved = 0;
    for email in &results.emails {
        let after = email.primary_classification.category;
        let before = before_by_id.get(email.email_id.to_string().as_str()).copied();
        if before == Some(after.key()) {
            continue;
        }
        if before == Some(unclassified) && after != Category::Unclassified {
            improved += 1;
        }
        changes.push(CategoryChange {
            email_id: email.email_id,
            subject: email.metadata.subject().to_string(),
            before: before.map(String::from),
            after,
        });
    }

    Ok(ReclassifyReport {
        backup_path,
        before: previous.counts,
        after: results.counts,
        changes,
        improved,
        results,
    })
}

/// Render the human-readable report in the current language.
pub fn render_report(results: &ClassificationResults, results_path: &std::path::Path) -> String {
    let counts = &results.counts;
    let mut out = String::new();
    let title = i18n::report_title();

    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count()));
    out.push_str("\n\n");
    out.push_str(&format!("{}:\n", i18n::report_summary()));
    out.push_str(&format!("- {}: {}\n", i18n::report_total(), counts.total_emails));
    for category in Category::ALL {
        out.push_str(&format!(
            "- {}: {} ({:.1}%)\n",
            category_label(category),
            counts.get(category),
            counts.percent(category)
        ));
    }

    out.push_str(&format!("\n{}:\n", i18n::report_by_category()));
    for category in [Category::Quote, Category::Renewal, Category::Endorsement] {
        let count = counts.get(category);
        out.push_str(&format!(
            "\n{} ({count}):\n",
            category_label(category).to_uppercase()
        ));
        for email in results.in_category(category).take(REPORT_SAMPLES) {
            let subject = match email.metadata.subject() {
                "" => i18n::report_no_subject().to_string(),
                s => s.chars().take(REPORT_SUBJECT_CHARS).collect(),
            };
            out.push_str(&format!("  - {}: {subject}\n", email.email_id));
        }
        if count > REPORT_SAMPLES {
            out.push_str(&format!(
                "  ... {} {}\n",
                count - REPORT_SAMPLES,
                i18n::report_more()
            ));
        }
    }

    out.push_str(&format!(
        "\n{}: {}\n",
        i18n::report_saved_to(),
        results_path.display()
    ));
    out
}

/// Write the report next to the results file and return its text.
pub fn write_report(store: &StoreReader, results: &ClassificationResults) -> Result<String> {
    let layout = store.layout();
    let text = render_report(results, &layout.results_path());
    let path = layout.report_path();
    std::fs::write(&path, &text).map_err(|e| PolicyMailError::io(&path, e))?;
    Ok(text)
}

/// Localized name of a category.
pub fn category_label(category: Category) -> &'static str {
    match category {
        Category::Quote => i18n::category_quotes(),
        Category::Renewal => i18n::category_renewals(),
        Category::Endorsement => i18n::category_endorsements(),
        Category::Unclassified => i18n::category_unclassified(),
    }
}

/// Summary of a store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub messages: usize,
    pub attachments: usize,
    pub attachment_bytes: u64,
    pub folders: BTreeSet<String>,
    /// Committed messages whose metadata could not be read.
    pub unreadable: usize,
    /// Counts of the last classification run, when one exists.
    pub classification: Option<CategoryCounts>,
}

/// Gather statistics of the store.
pub fn stats(store: &StoreReader) -> StoreStats {
    let mut stats = StoreStats {
        messages: store.len(),
        ..Default::default()
    };

    for id in store.ids() {
        match store.metadata(id) {
            Ok(meta) => {
                stats.attachments += meta.attachments.len();
                stats.attachment_bytes += meta.attachments.iter().map(|a| a.size).sum::<u64>();
                stats.folders.insert(meta.folder);
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Unreadable metadata");
                stats.unreadable += 1;
            }
        }
    }

    let results_path = store.layout().results_path();
    if results_path.is_file() {
        match json::read_json::<StoredResults>(&results_path) {
            Ok(stored) => stats.classification = Some(stored.counts),
            Err(e) => warn!(error = %e, "Ignoring unreadable classification results"),
        }
    }
    stats
}
