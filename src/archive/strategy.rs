//! Declared fallback order for archive accessors.

use std::fmt;

use tracing::{debug, warn};

use super::{ArchiveAttachment, Probe};

/// Ways of learning how many children (subfolders, messages, attachments)
/// an archive node has, tried in [`COUNT_STRATEGIES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStrategy {
    /// The primary count accessor method.
    Method,
    /// A property-style count accessor.
    Property,
    /// Retrieve children by index until the first miss.
    IndexedScan,
}

impl fmt::Display for CountStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Method => "method",
            Self::Property => "property",
            Self::IndexedScan => "indexed-scan",
        })
    }
}

/// Priority order of count strategies.
pub const COUNT_STRATEGIES: [CountStrategy; 3] = [
    CountStrategy::Method,
    CountStrategy::Property,
    CountStrategy::IndexedScan,
];

/// Result of resolving a child count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCount {
    pub count: usize,
    /// `None` when every strategy came up empty.
    pub strategy: Option<CountStrategy>,
}

/// Unwrap a probe: a raising accessor is logged at warn, an unavailable
/// one at debug.
pub fn probe<T>(accessor: &str, result: Probe<T>) -> Option<T> {
    match result {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            debug!(accessor, "Archive accessor unavailable");
            None
        }
        Err(e) => {
            warn!(accessor, error = %e, "Archive accessor raised, treating as unavailable");
            None
        }
    }
}

/// Like [`probe`], with empty or whitespace-only text treated as absent.
pub fn probe_text(accessor: &str, result: Probe<String>) -> Option<String> {
    probe(accessor, result).filter(|s| !s.trim().is_empty())
}

/// Resolve a child count by trying each strategy in [`COUNT_STRATEGIES`]
/// order.
///
/// `exists(i)` retrieves child `i` and reports whether it was there; the
/// indexed scan stops at the first miss or after `max_scan` children.
pub fn resolve_count(
    what: &str,
    method: impl FnOnce() -> Probe<usize>,
    property: impl FnOnce() -> Probe<usize>,
    mut exists: impl FnMut(usize) -> bool,
    max_scan: usize,
) -> ResolvedCount {
    let mut method = Some(method);
    let mut property = Some(property);

    for strategy in COUNT_STRATEGIES {
        let found = match strategy {
            CountStrategy::Method => method.take().and_then(|f| probe(what, f())),
            CountStrategy::Property => property.take().and_then(|f| probe(what, f())),
            CountStrategy::IndexedScan => {
                let count = (0..max_scan).take_while(|&i| exists(i)).count();
                (count > 0).then_some(count)
            }
        };
        if let Some(count) = found {
            debug!(what, count, %strategy, "Resolved child count");
            return ResolvedCount {
                count,
                strategy: Some(strategy),
            };
        }
    }

    ResolvedCount {
        count: 0,
        strategy: None,
    }
}

/// Filename of an attachment: `name`, then `long_filename`, then
/// `attachment_<index>`.
pub fn attachment_name(attachment: &dyn ArchiveAttachment, index: usize) -> String {
    probe_text("attachment.name", attachment.name())
        .or_else(|| probe_text("attachment.long_filename", attachment.long_filename()))
        .unwrap_or_else(|| format!("attachment_{index}"))
}
