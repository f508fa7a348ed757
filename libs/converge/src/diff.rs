//! Idempotency guard.

use std::collections::BTreeMap;

/// True when every desired (key, value) pair is already present in the
/// live attributes with an exactly equal string value.
///
/// This is a subset-of-mapping test: extra live keys never force a
/// change, a desired key absent from the live state always does. Values
/// are compared as already-canonicalized strings; no numeric coercion.
pub fn is_noop(desired: &BTreeMap<String, String>, current: &BTreeMap<String, String>) -> bool {
    desired
        .iter()
        .all(|(key, value)| current.get(key) == Some(value))
}
