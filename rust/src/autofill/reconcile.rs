//! Two-cursor merge of a group's parts against its matching resources.
//!
//! The merge walks the existing part list and the target resource list in
//! step and produces a fresh part list plus an edit summary. Parts that are
//! kept are the same `Arc`s that came in, so identity-bound state (UI
//! selection, playing markers) survives repeated reconciliation.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::models::{AutoFillMode, Enable, Group, Part, PartId, Resource, ResourceId, TimelineObject};
use crate::{log_changes, log_checks};

use super::part_id::autofill_part_id;

/// Two distinct resources mapped to the same synthetic part id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationConflict {
    pub part_id: PartId,
    /// The later resource, which is represented by the part.
    pub kept_resource_id: ResourceId,
    /// The earlier resource, which is not represented.
    pub dropped_resource_id: ResourceId,
}

/// Result of one reconciliation pass.
#[derive(Clone, Debug, Default)]
pub struct ReconcileOutcome {
    pub parts: Vec<Arc<Part>>,
    pub added: usize,
    pub removed: usize,
    pub conflicts: Vec<ReconciliationConflict>,
}

impl ReconcileOutcome {
    /// Whether the caller has to re-resolve the group.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Slot the resource list asks for, in order.
struct Target<'a> {
    part_id: PartId,
    resource: &'a Resource,
}

#[derive(Clone, Debug)]
pub struct AutoFillReconciler {
    /// Duration of synthesized parts whose resource has no known length.
    pub default_part_duration_ms: i64,
    pub verbosity: u8,
}

impl Default for AutoFillReconciler {
    fn default() -> Self {
        Self {
            default_part_duration_ms: 5_000,
            verbosity: 0,
        }
    }
}

/// Reconcile with the default settings.
pub fn reconcile(group: &Group, matching: &[Resource]) -> ReconcileOutcome {
    AutoFillReconciler::default().reconcile(group, matching)
}

impl AutoFillReconciler {
    pub fn new(default_part_duration_ms: i64, verbosity: u8) -> Self {
        Self {
            default_part_duration_ms,
            verbosity,
        }
    }

    /// Compute the part list that mirrors `matching`.
    ///
    /// `matching` is already filtered by the group's rule; no filtering
    /// happens here. A group with auto-fill disabled is returned as is.
    pub fn reconcile(&self, group: &Group, matching: &[Resource]) -> ReconcileOutcome {
        if !group.auto_fill.enabled {
            return ReconcileOutcome {
                parts: group.parts.clone(),
                ..Default::default()
            };
        }

        let (targets, conflicts) = self.collect_targets(&group.id, matching, autofill_part_id);
        let mut outcome = match group.auto_fill.mode {
            AutoFillMode::Replace => self.merge_replace(group, &targets),
            AutoFillMode::Append => self.merge_append(group, &targets),
        };
        outcome.conflicts = conflicts;

        if outcome.changed() {
            log_changes!(
                self.verbosity,
                "Auto-fill of group {}: {} added, {} removed, {} parts",
                group.id,
                outcome.added,
                outcome.removed,
                outcome.parts.len()
            );
        }
        outcome
    }

    /// Map resources to part ids, dropping duplicates and collisions.
    fn collect_targets<'a, F>(
        &self,
        group_id: &str,
        matching: &'a [Resource],
        id_of: F,
    ) -> (Vec<Target<'a>>, Vec<ReconciliationConflict>)
    where
        F: Fn(&str, &str) -> PartId,
    {
        let mut targets: Vec<Target<'a>> = Vec::with_capacity(matching.len());
        let mut slot_of: FxHashMap<PartId, usize> = FxHashMap::default();
        let mut conflicts = Vec::new();

        for resource in matching {
            let part_id = id_of(group_id, &resource.id);
            match slot_of.get(&part_id) {
                Some(&slot) => {
                    let holder = &mut targets[slot];
                    if holder.resource.id == resource.id {
                        continue;
                    }
                    log::warn!(
                        "Auto-fill id collision in group {}: {} replaces {} as {}",
                        group_id,
                        resource.id,
                        holder.resource.id,
                        part_id
                    );
                    conflicts.push(ReconciliationConflict {
                        part_id: part_id.clone(),
                        kept_resource_id: resource.id.clone(),
                        dropped_resource_id: holder.resource.id.clone(),
                    });
                    holder.resource = resource;
                }
                None => {
                    slot_of.insert(part_id.clone(), targets.len());
                    targets.push(Target { part_id, resource });
                }
            }
        }

        (targets, conflicts)
    }

    fn merge_replace(&self, group: &Group, targets: &[Target<'_>]) -> ReconcileOutcome {
        let existing = &group.parts;
        // First index of each id, to tell whether a target is still ahead of the cursor
        let mut index_of: FxHashMap<&str, usize> = FxHashMap::default();
        for (idx, part) in existing.iter().enumerate() {
            index_of.entry(part.id.as_str()).or_insert(idx);
        }
        let wanted: FxHashSet<&str> = targets.iter().map(|t| t.part_id.as_str()).collect();

        let mut parts: Vec<Arc<Part>> = Vec::with_capacity(existing.len().max(targets.len()));
        let mut evicted: FxHashMap<&str, Arc<Part>> = FxHashMap::default();
        let mut added = 0;
        let mut removed = 0;
        let mut cursor = 0;

        for target in targets {
            let ahead = index_of
                .get(target.part_id.as_str())
                .map_or(false, |&idx| idx >= cursor);

            if ahead {
                while cursor < existing.len() {
                    let part = &existing[cursor];
                    cursor += 1;
                    if part.id == target.part_id {
                        parts.push(Arc::clone(part));
                        break;
                    }
                    if part.auto_filled {
                        log_checks!(self.verbosity, "Evicting stale auto-fill part {}", part.id);
                        evicted.insert(part.id.as_str(), Arc::clone(part));
                        removed += 1;
                    } else {
                        parts.push(Arc::clone(part));
                    }
                }
                continue;
            }

            // Insertion point moves past manual parts and stale auto-fill parts,
            // stopping at the next part that a later resource still wants
            while cursor < existing.len() {
                let part = &existing[cursor];
                if !part.auto_filled {
                    parts.push(Arc::clone(part));
                } else if wanted.contains(part.id.as_str()) {
                    break;
                } else {
                    log_checks!(self.verbosity, "Evicting stale auto-fill part {}", part.id);
                    evicted.insert(part.id.as_str(), Arc::clone(part));
                    removed += 1;
                }
                cursor += 1;
            }

            // Reuse a part evicted in this pass, else build one
            let part = match evicted.remove(target.part_id.as_str()) {
                Some(part) => {
                    log_checks!(self.verbosity, "Reusing evicted part {}", part.id);
                    part
                }
                None => Arc::new(self.build_part(group, target)),
            };
            parts.push(part);
            added += 1;
        }

        for part in &existing[cursor..] {
            if part.auto_filled {
                removed += 1;
            } else {
                parts.push(Arc::clone(part));
            }
        }

        ReconcileOutcome {
            parts,
            added,
            removed,
            conflicts: Vec::new(),
        }
    }

    fn merge_append(&self, group: &Group, targets: &[Target<'_>]) -> ReconcileOutcome {
        let present: FxHashSet<&str> = group.parts.iter().map(|p| p.id.as_str()).collect();
        let mut parts = group.parts.clone();
        let mut added = 0;

        for target in targets {
            if !present.contains(target.part_id.as_str()) {
                parts.push(Arc::new(self.build_part(group, target)));
                added += 1;
            }
        }

        ReconcileOutcome {
            parts,
            added,
            removed: 0,
            conflicts: Vec::new(),
        }
    }

    fn build_part(&self, group: &Group, target: &Target<'_>) -> Part {
        let resource = target.resource;
        let duration = resource
            .duration_ms
            .unwrap_or(self.default_part_duration_ms)
            .max(0);

        let mut part = Part::new(target.part_id.clone(), resource.display_name.clone());
        part.timeline.push(TimelineObject {
            resource_id: resource.id.clone(),
            content: resource.content.clone(),
            enable: Enable { start: 0, duration },
            layer: group.auto_fill.rule.layer_id.clone(),
        });
        part.resolved_duration = duration;
        part.auto_filled = true;
        part
    }
}
