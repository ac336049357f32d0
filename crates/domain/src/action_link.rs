//! ActionLink: a directed edge between two action instances of an area.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{ActionInstanceId, ActionLinkId, AreaId};
use crate::payload::{Payload, Value};
use crate::time::Timestamp;

/// How the target of a link relates to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    #[default]
    Chain,
    Conditional,
    Parallel,
    Sequential,
}

impl LinkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Conditional => "conditional",
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Chain, Self::Conditional, Self::Parallel, Self::Sequential]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownVariant {
                entity: "link kind",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLink {
    pub id: ActionLinkId,
    pub area_id: AreaId,
    pub source_id: ActionInstanceId,
    pub target_id: ActionInstanceId,
    pub kind: LinkKind,
    pub mapping: Payload,
    pub condition: Option<Value>,
    /// Tie-break for traversal; lower goes first.
    pub order: i64,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_link_kind_case_insensitively() {
        assert_eq!("CHAIN".parse::<LinkKind>().unwrap(), LinkKind::Chain);
        assert_eq!(
            "parallel".parse::<LinkKind>().unwrap(),
            LinkKind::Parallel
        );
        assert!("fork".parse::<LinkKind>().is_err());
    }

    #[test]
    fn should_serialize_link_kind_lowercase() {
        let json = serde_json::to_string(&LinkKind::Conditional).unwrap();
        assert_eq!(json, "\"conditional\"");
    }
}
