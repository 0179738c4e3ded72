use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How strongly a field must be filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequirementLevel {
    Mandatory,
    Recommended,
    Optional,
}

impl RequirementLevel {
    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "M" => Some(RequirementLevel::Mandatory),
            "R" => Some(RequirementLevel::Recommended),
            "O" => Some(RequirementLevel::Optional),
            _ => None,
        }
    }

    /// Reads a trailing marker from legacy labels such as `Family name (M)`,
    /// `Occupation [R]`, `Middle name - O` or `Passport number M`.
    ///
    /// The label itself is never rewritten; callers keep displaying it as is.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim_end();
        for (open, close) in [('(', ')'), ('[', ']')] {
            if let Some(inner) = trimmed
                .strip_suffix(close)
                .and_then(|rest| rest.rsplit_once(open))
                .map(|(_, inner)| inner.trim())
            {
                return Self::from_marker(inner);
            }
        }

        let (head, last) = trimmed.rsplit_once(char::is_whitespace)?;
        if head.trim().is_empty() {
            return None;
        }
        let head = head.trim_end();
        let head = head.strip_suffix('-').unwrap_or(head);
        if head.trim().is_empty() {
            return None;
        }
        Self::from_marker(last)
    }
}
