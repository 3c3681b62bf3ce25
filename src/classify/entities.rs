//! Business entities mentioned in a message.

use regex::Regex;

use super::patterns::{first_capture, PatternConfig};

/// Agent code and policy number, the subject searched before the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub agent_code: Option<String>,
    pub policy_number: Option<String>,
}

impl Entities {
    pub fn extract(patterns: &PatternConfig, subject: &str, body: &str) -> Self {
        let search =
            |list: &[Regex]| first_capture(list, subject).or_else(|| first_capture(list, body));
        Self {
            agent_code: search(&patterns.agent_code),
            policy_number: search(&patterns.policy_number),
        }
    }
}
