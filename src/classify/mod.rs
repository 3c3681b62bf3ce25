//! Rule-based classification of stored messages into quote, renewal and
//! endorsement requests.
//!
//! [`Classifier::classify`] is a pure function of subject, body text,
//! attachment analysis and the [`PatternConfig`]. [`Classifier::classify_email`]
//! gathers those inputs from the store.

pub mod attachments;
pub mod entities;
pub mod patterns;
pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::message::{MessageId, MessageMetadata};
use crate::store::StoreReader;

pub use attachments::AttachmentAnalysis;
pub use patterns::{PatternConfig, Thresholds};
pub use rules::{EndorsementResult, Evidence, QuoteResult, RenewalResult};

/// Primary classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "cotizacion")]
    Quote,
    #[serde(rename = "renovacion")]
    Renewal,
    #[serde(rename = "endoso")]
    Endorsement,
    #[serde(rename = "sin_clasificar")]
    Unclassified,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Quote,
        Category::Renewal,
        Category::Endorsement,
        Category::Unclassified,
    ];

    /// Stable key used in stored results.
    pub fn key(self) -> &'static str {
        match self {
            Self::Quote => "cotizacion",
            Self::Renewal => "renovacion",
            Self::Endorsement => "endoso",
            Self::Unclassified => "sin_clasificar",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The three category sub-results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classifications {
    pub cotizacion: QuoteResult,
    pub renovacion: RenewalResult,
    pub endoso: EndorsementResult,
}

/// Full sub-result of the top-scoring category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CategoryDetails {
    Quote(QuoteResult),
    Renewal(RenewalResult),
    Endorsement(EndorsementResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryClassification {
    #[serde(rename = "type")]
    pub category: Category,
    pub confidence: u8,
    pub status: String,
    pub details: CategoryDetails,
}

/// Output of [`Classifier::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub classifications: Classifications,
    pub primary: PrimaryClassification,
}

/// Stored result record of one message.
#[derive(Debug, Clone, Serialize)]
pub struct EmailClassification {
    pub email_id: MessageId,
    pub metadata: MessageMetadata,
    pub attachment_analysis: AttachmentAnalysis,
    pub classifications: Classifications,
    pub primary_classification: PrimaryClassification,
}

/// Classification inputs of one message.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub attachments: &'a AttachmentAnalysis,
}

pub struct Classifier {
    patterns: PatternConfig,
}

impl Classifier {
    pub fn new(patterns: PatternConfig) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternConfig {
        &self.patterns
    }

    /// Score all three categories and pick the primary one.
    pub fn classify(&self, input: &ClassificationInput<'_>) -> Classification {
        let evidence = Evidence::new(&self.patterns, input.subject, input.body, input.attachments);
        let quote = rules::evaluate_quote(&self.patterns, &evidence);
        let renewal = rules::evaluate_renewal(&self.patterns, &evidence);
        let endorsement = rules::evaluate_endorsement(&self.patterns, &evidence);

        let thresholds = &self.patterns.thresholds;
        let candidates = [
            (Category::Quote, quote.confidence, quote.is_cotizacion, &quote.status),
            (Category::Renewal, renewal.confidence, renewal.is_renovacion, &renewal.status),
            (
                Category::Endorsement,
                endorsement.confidence,
                endorsement.is_endoso,
                &endorsement.status,
            ),
        ];
        // First of the highest scores: ties resolve in declaration order.
        let (top, confidence, met, status) = candidates
            .iter()
            .fold(candidates[0], |best, c| if c.1 > best.1 { *c } else { best });
        let status = status.clone();

        let category = if met && confidence >= thresholds.primary_floor {
            top
        } else {
            Category::Unclassified
        };

        let details = match top {
            Category::Renewal => CategoryDetails::Renewal(renewal.clone()),
            Category::Endorsement => CategoryDetails::Endorsement(endorsement.clone()),
            _ => CategoryDetails::Quote(quote.clone()),
        };

        Classification {
            classifications: Classifications {
                cotizacion: quote,
                renovacion: renewal,
                endoso: endorsement,
            },
            primary: PrimaryClassification {
                category,
                confidence,
                status,
                details,
            },
        }
    }

    /// Classify a committed message of the store.
    pub fn classify_email(
        &self,
        store: &mut StoreReader,
        id: MessageId,
    ) -> Result<EmailClassification> {
        let metadata = store.metadata(id)?;
        let files = store.attachment_files(id);
        let analysis =
            AttachmentAnalysis::of_files(&files, self.patterns.thresholds.slip_min_filled_cells);
        let body = store.body(id).text();

        let Classification {
            classifications,
            primary,
        } = self.classify(&ClassificationInput {
            subject: metadata.subject(),
            body: &body,
            attachments: &analysis,
        });
        debug!(id = %id, category = %primary.category, confidence = primary.confidence, "Classified");

        Ok(EmailClassification {
            email_id: id,
            metadata,
            attachment_analysis: analysis,
            classifications,
            primary_classification: primary,
        })
    }
}
