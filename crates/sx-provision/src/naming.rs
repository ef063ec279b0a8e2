//! Deterministic remote identifiers.
//!
//! Every identifier is a pure function of the project id, so independent runs
//! for the same project always target the same remote resources.

use std::collections::BTreeMap;

use sx_core::ProjectId;

/// Prefix of per-project dataset ids.
pub const DATASET_PREFIX: &str = "sx";
/// Prefix of per-project collector topic ids.
pub const COLLECTOR_TOPIC_PREFIX: &str = "collector";

/// Raw-events table id.
pub const RAW_EVENTS_TABLE_ID: &str = "raw_events";
/// Identified-events table id.
pub const IDENTIFIED_EVENTS_TABLE_ID: &str = "identified_events";
/// Excluded-referrers view id.
pub const EXCLUDED_REFERRERS_VIEW_ID: &str = "excluded_referrers";
/// Ad-costs table id.
pub const AD_COSTS_TABLE_ID: &str = "ad_costs";

/// Label key marking resources created by this system.
pub const MANAGED_BY_LABEL: &str = "managed_by";
/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY_VALUE: &str = "sx-provisioner";
/// Label key carrying the owning project id.
pub const PROJECT_ID_LABEL: &str = "sx_project_id";

/// `sx_<project_id>`
#[must_use]
pub fn dataset_id(project_id: ProjectId) -> String {
    format!("{DATASET_PREFIX}_{project_id}")
}

/// `collector_<project_id>`
#[must_use]
pub fn collector_topic_id(project_id: ProjectId) -> String {
    format!("{COLLECTOR_TOPIC_PREFIX}_{project_id}")
}

/// `collector_<project_id>_warehouse_sink`
#[must_use]
pub fn warehouse_sink_subscription_id(project_id: ProjectId) -> String {
    format!("{}_warehouse_sink", collector_topic_id(project_id))
}

/// `collector_<project_id>_processor`
#[must_use]
pub fn processor_subscription_id(project_id: ProjectId) -> String {
    format!("{}_processor", collector_topic_id(project_id))
}

/// Labels attached to every created resource.
#[must_use]
pub fn resource_labels(project_id: ProjectId) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (PROJECT_ID_LABEL.to_string(), project_id.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_for_project_42() {
        let project = ProjectId::new(42).unwrap();
        assert_eq!(dataset_id(project), "sx_42");
        assert_eq!(collector_topic_id(project), "collector_42");
        assert_eq!(
            warehouse_sink_subscription_id(project),
            "collector_42_warehouse_sink"
        );
        assert_eq!(processor_subscription_id(project), "collector_42_processor");
    }

    #[test]
    fn identifiers_are_stable() {
        let a = ProjectId::new(7).unwrap();
        let b: ProjectId = "7".parse().unwrap();
        assert_eq!(dataset_id(a), dataset_id(b));
        assert_eq!(collector_topic_id(a), collector_topic_id(b));
    }

    #[test]
    fn labels() {
        let labels = resource_labels(ProjectId::new(42).unwrap());
        assert_eq!(labels["managed_by"], "sx-provisioner");
        assert_eq!(labels["sx_project_id"], "42");
    }
}
