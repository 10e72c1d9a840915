use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::entity::EntityKind;
use crate::error::{ScrapeDashError, ScrapeDashResult};

/// Which records enter an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    All,
    Filtered,
    Selected,
}

impl std::str::FromStr for ExportScope {
    type Err = ScrapeDashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ExportScope::All),
            "filtered" => Ok(ExportScope::Filtered),
            "selected" => Ok(ExportScope::Selected),
            _ => Err(ScrapeDashError::invalid_option("export scope", s)),
        }
    }
}

impl std::fmt::Display for ExportScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportScope::All => write!(f, "all"),
            ExportScope::Filtered => write!(f, "filtered"),
            ExportScope::Selected => write!(f, "selected"),
        }
    }
}

/// Resolve the records an export covers.
///
/// `Selected` keeps the members of `all` whose primary id is in
/// `selected_ids`, in `all` order, and fails with `EmptySelection` when
/// nothing matches.
pub fn select_scope<'a>(
    kind: EntityKind,
    all: &'a [Value],
    filtered: &'a [Value],
    selected_ids: &HashSet<String>,
    scope: ExportScope,
) -> ScrapeDashResult<Vec<&'a Value>> {
    let resolved: Vec<&Value> = match scope {
        ExportScope::All => all.iter().collect(),
        ExportScope::Filtered => filtered.iter().collect(),
        ExportScope::Selected => {
            let picked: Vec<&Value> = all
                .iter()
                .filter(|entity| {
                    kind.primary_id(entity)
                        .map_or(false, |id| selected_ids.contains(&id))
                })
                .collect();

            if picked.is_empty() {
                return Err(ScrapeDashError::EmptySelection);
            }
            picked
        }
    };

    debug!("Scope {} resolved to {} of {} {} records", scope, resolved.len(), all.len(), kind);
    Ok(resolved)
}
