//! # Availability Verdicts
//!
//! Pure evaluation of requested items against the statuses read from the
//! store. The engine does the read; this module decides what to report.
//!
//! ```text
//! requested ids ──┐
//!                 ├──► evaluate() ──► AvailabilityReport
//! items read  ────┘                    ├── items[]   one verdict per id, request order
//!                                      ├── warnings[] one per blocked item
//!                                      └── all_available / has_warnings / allow_oversell
//! ```
//!
//! The report is advisory. It states the truth about every item whatever
//! the oversell policy says; the policy flag is only echoed back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{InventoryItem, InventoryStatus};

/// Verdict for one requested item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemVerdict {
    pub item_id: String,
    pub model: Option<String>,
    pub brand_name: Option<String>,
    /// `None` when the item does not exist.
    pub status: Option<InventoryStatus>,
    pub available: bool,
    pub warning: Option<String>,
    pub error: Option<String>,
}

/// A human-readable notice about one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWarning {
    pub item_id: String,
    pub message: String,
}

/// Aggregate result of an availability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub all_available: bool,
    pub has_warnings: bool,
    pub allow_oversell: bool,
    pub items: Vec<ItemVerdict>,
    pub warnings: Vec<AvailabilityWarning>,
}

/// The notice shown for an item that cannot be sold as-is.
pub fn unavailable_message(model: &str, status: InventoryStatus, allow_oversell: bool) -> String {
    if allow_oversell {
        format!("{model} is already {status}; oversell is allowed")
    } else {
        format!("{model} is {status} and cannot be sold")
    }
}

/// Builds the report for `requested` ids from the items the store returned.
///
/// Unknown ids get a per-item `error` and never abort the others.
pub fn evaluate(
    requested: &[String],
    found: &[InventoryItem],
    allow_oversell: bool,
) -> AvailabilityReport {
    let by_id: HashMap<&str, &InventoryItem> =
        found.iter().map(|item| (item.id.as_str(), item)).collect();

    let mut items = Vec::with_capacity(requested.len());
    let mut warnings = Vec::new();

    for id in requested {
        let Some(item) = by_id.get(id.as_str()) else {
            items.push(ItemVerdict {
                item_id: id.clone(),
                model: None,
                brand_name: None,
                status: None,
                available: false,
                warning: None,
                error: Some(format!("Item {id} not found")),
            });
            continue;
        };

        let available = item.status.is_available();
        let warning = (!available)
            .then(|| unavailable_message(&item.model, item.status, allow_oversell));

        if let Some(message) = &warning {
            warnings.push(AvailabilityWarning {
                item_id: id.clone(),
                message: message.clone(),
            });
        }

        items.push(ItemVerdict {
            item_id: id.clone(),
            model: Some(item.model.clone()),
            brand_name: item.brand_name.clone(),
            status: Some(item.status),
            available,
            warning,
            error: None,
        });
    }

    AvailabilityReport {
        all_available: items.iter().all(|v| v.available),
        has_warnings: !warnings.is_empty(),
        allow_oversell,
        items,
        warnings,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
