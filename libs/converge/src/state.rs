//! Live-state projection.

use std::collections::BTreeMap;

/// One-directional renames from live attribute names to desired-state
/// names. Applied before comparison, never before issuing commands: the
/// console reports some attributes under a different name than the one it
/// accepts for modification.
pub const CURRENT_RENAMES: &[(&str, &str)] = &[
    ("name", "new_name"),
    ("curr_mem_mirroring_mode", "mem_mirroring_mode"),
    ("mem_region_size", "pend_mem_region_size"),
];

/// Apply the renaming projection to a live attribute mapping.
pub fn project_current(mut current: BTreeMap<String, String>) -> BTreeMap<String, String> {
    for (live, desired) in CURRENT_RENAMES {
        if let Some(value) = current.remove(*live) {
            current.insert((*desired).to_string(), value);
        }
    }
    current
}
