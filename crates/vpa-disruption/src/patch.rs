//! Patch calculators: turn a recommendation into JSON-patch records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};

use vpa_types::{PatchRecord, PatchTarget, Pod, Policy, escape_pointer_segment};

use crate::error::PatchError;

/// Annotation set on every pod resized in place.
pub const IN_PLACE_UPDATED_ANNOTATION: &str = "vpaInPlaceUpdated";

pub trait PatchCalculator: Send + Sync {
    /// Which request the records are sent with.
    fn target(&self) -> PatchTarget;

    fn calculate(&self, pod: &Pod, policy: &Policy) -> Result<Vec<PatchRecord>, PatchError>;
}

/// Sets container resource requests to the policy's recommended targets.
///
/// Limits are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRequestsCalculator;

impl PatchCalculator for ResourceRequestsCalculator {
    fn target(&self) -> PatchTarget {
        PatchTarget::Resize
    }

    fn calculate(&self, pod: &Pod, policy: &Policy) -> Result<Vec<PatchRecord>, PatchError> {
        let mut patches = Vec::new();
        for (i, container) in pod.spec.containers.iter().enumerate() {
            let Some(rec) = policy.recommendation_for(&container.name) else {
                continue;
            };
            if rec.target.is_empty() {
                continue;
            }
            let base = format!("/spec/containers/{i}/resources/requests");
            let target: BTreeMap<&String, &String> = rec.target.iter().collect();

            if container.resources.requests.is_empty() {
                patches.push(PatchRecord::add(base, json!(target)));
                continue;
            }
            for (resource, quantity) in target {
                let path = format!("{base}/{}", escape_pointer_segment(resource));
                let value = Value::String(quantity.clone());
                if container.resources.requests.contains_key(resource) {
                    patches.push(PatchRecord::replace(path, value));
                } else {
                    patches.push(PatchRecord::add(path, value));
                }
            }
        }
        Ok(patches)
    }
}

/// Marks the pod as resized in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct InPlaceUpdatedAnnotationCalculator;

impl PatchCalculator for InPlaceUpdatedAnnotationCalculator {
    fn target(&self) -> PatchTarget {
        PatchTarget::Annotations
    }

    fn calculate(&self, _pod: &Pod, _policy: &Policy) -> Result<Vec<PatchRecord>, PatchError> {
        Ok(vec![PatchRecord::add(
            format!("/metadata/annotations/{IN_PLACE_UPDATED_ANNOTATION}"),
            Value::String("true".to_string()),
        )])
    }
}

/// Creates the annotations map so later annotation patches have a parent.
pub fn empty_annotations_patch() -> PatchRecord {
    PatchRecord::add("/metadata/annotations", json!({}))
}

pub fn default_calculators() -> Vec<Arc<dyn PatchCalculator>> {
    vec![
        Arc::new(ResourceRequestsCalculator),
        Arc::new(InPlaceUpdatedAnnotationCalculator),
    ]
}
