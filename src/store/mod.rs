//! The on-disk store: canonical layout, the append-only writer used by
//! extraction, and the read-only reader used by classification.
//!
//! ```text
//! output/
//! ├── emails/<id>.eml
//! ├── attachments/<id>/<filename>
//! ├── metadata/<id>.json
//! ├── progress.json
//! └── classification/classification_results.json
//! ```
//!
//! A message exists for downstream consumers iff its id is listed in
//! `progress.json`. Files of any other id are partial leftovers of an
//! interrupted run and are ignored.

pub mod json;
pub mod layout;
pub mod reader;
pub mod writer;

pub use layout::StoreLayout;
pub use reader::StoreReader;
pub use writer::StoreWriter;
