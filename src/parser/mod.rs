//! Email parsing: streaming MBOX scanning and MIME handling.

pub mod mbox;
pub mod mime;
