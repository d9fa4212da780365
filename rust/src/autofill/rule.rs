//! Default matching of resources against an auto-fill rule.

use rustc_hash::FxHashMap;

use crate::models::{AutoFillRule, Project, Resource, ResourceId};

/// Resources that `rule` selects, ordered by display name then id.
///
/// A resource matches when it lives on the device mapped to the rule's
/// layer and its display name contains the filter, ignoring case. An
/// unmapped layer matches nothing.
pub fn find_autofill_resources(
    project: &Project,
    rule: &AutoFillRule,
    resources: &FxHashMap<ResourceId, Resource>,
) -> Vec<Resource> {
    let device_id = match project.mappings.get(&rule.layer_id) {
        Some(mapping) => &mapping.device_id,
        None => return Vec::new(),
    };
    let filter = rule.filter.to_lowercase();

    let mut matching: Vec<Resource> = resources
        .values()
        .filter(|r| &r.device_id == device_id)
        .filter(|r| filter.is_empty() || r.display_name.to_lowercase().contains(&filter))
        .cloned()
        .collect();

    matching.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.id.cmp(&b.id))
    });
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LayerMapping;

    fn project() -> Project {
        let mut project = Project::default();
        project.mappings.insert(
            "layer-video".to_string(),
            LayerMapping {
                device_id: "caspar0".to_string(),
                layer_name: "Video".to_string(),
            },
        );
        project
    }

    fn catalog(entries: &[(&str, &str, &str)]) -> FxHashMap<ResourceId, Resource> {
        entries
            .iter()
            .map(|&(id, device, name)| (id.to_string(), Resource::new(id, device, name)))
            .collect()
    }

    fn rule(filter: &str) -> AutoFillRule {
        AutoFillRule {
            layer_id: "layer-video".to_string(),
            filter: filter.to_string(),
        }
    }

    #[test]
    fn test_matches_mapped_device_only() {
        let resources = catalog(&[
            ("r1", "caspar0", "AMB"),
            ("r2", "atem0", "Input 1"),
            ("r3", "caspar0", "Go1080p25"),
        ]);
        let found = find_autofill_resources(&project(), &rule(""), &resources);
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let resources = catalog(&[
            ("r1", "caspar0", "Intro_Clip"),
            ("r2", "caspar0", "outro"),
            ("r3", "caspar0", "CLIP_02"),
        ]);
        let found = find_autofill_resources(&project(), &rule("clip"), &resources);
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r1"]);
    }

    #[test]
    fn test_ties_ordered_by_id() {
        let resources = catalog(&[("b", "caspar0", "same"), ("a", "caspar0", "same")]);
        let found = find_autofill_resources(&project(), &rule(""), &resources);
        assert_eq!(found[0].id, "a");
        assert_eq!(found[1].id, "b");
    }

    #[test]
    fn test_unmapped_layer_matches_nothing() {
        let resources = catalog(&[("r1", "caspar0", "AMB")]);
        let unmapped = AutoFillRule {
            layer_id: "nowhere".to_string(),
            filter: String::new(),
        };
        assert!(find_autofill_resources(&project(), &unmapped, &resources).is_empty());
    }
}
