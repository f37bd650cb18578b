use std::collections::BTreeSet;

use crate::inference::Detection;

const NO_FINDINGS: &str = "No significant pathologies detected in the image.";

/// One-sentence summary of the distinct detection classes. A BTreeSet keeps
/// the label order deterministic across runs.
pub fn generate(detections: &[Detection]) -> String {
    let classes: BTreeSet<&str> = detections.iter().map(|d| d.label.as_str()).collect();
    if classes.is_empty() {
        NO_FINDINGS.to_string()
    } else {
        let joined = classes.into_iter().collect::<Vec<_>>().join(", ");
        format!(
            "The image shows possible signs of: {joined}. Recommend dental review for confirmation."
        )
    }
}
