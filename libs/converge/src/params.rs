//! Caller parameters and the desired-state projection.

use std::collections::BTreeMap;

/// Control fields that select or address the operation rather than
/// describe desired state. Never part of the attribute diff.
pub const CONTROL_FIELDS: &[&str] = &["action", "state", "hmc_host", "hmc_auth", "system_name"];

/// A raw caller-supplied parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Empty strings and empty collections count as absent for
    /// mandatory-parameter checks.
    fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::Int(_) | Self::Bool(_) => false,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, String>> for ParamValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Map(value)
    }
}

/// Raw caller input: parameter name to optional value.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Insert only when the caller actually supplied a value.
    pub fn set_opt(&mut self, name: &str, value: Option<impl Into<ParamValue>>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// A parameter is present when it was supplied and is not empty.
    pub fn present(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(ParamValue::as_str)
    }

    pub fn int_value(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(ParamValue::as_int)
    }

    pub fn bool_value(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(ParamValue::as_bool)
    }

    pub fn list_value(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).and_then(ParamValue::as_list)
    }

    pub fn map_value(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.values.get(name).and_then(ParamValue::as_map)
    }

    /// Project the target attribute mapping for the idempotency diff.
    ///
    /// Control fields are dropped, scalars are stringified with canonical
    /// decimal formatting, and list/map values are left out: they never
    /// take part in attribute comparison, only in command construction.
    pub fn desired_attributes(&self) -> BTreeMap<String, String> {
        let mut desired = BTreeMap::new();
        for (name, value) in &self.values {
            if CONTROL_FIELDS.contains(&name.as_str()) {
                continue;
            }
            match value {
                ParamValue::Str(s) => {
                    desired.insert(name.clone(), s.clone());
                }
                ParamValue::Int(i) => {
                    desired.insert(name.clone(), i.to_string());
                }
                ParamValue::Bool(b) => {
                    desired.insert(name.clone(), b.to_string());
                }
                ParamValue::List(_) | ParamValue::Map(_) => {}
            }
        }
        desired
    }
}

/// Flatten a list parameter into the comma-joined form the command
/// interface expects. Only applied at command-build time.
pub fn join_list(items: &[String]) -> String {
    items.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desired_attributes_drop_control_fields_and_stringify() {
        let params = ParameterSet::new()
            .with("hmc_host", "hmc01")
            .with("system_name", "sys1")
            .with("new_name", "renamed")
            .with("power_off_policy", 1_i64);

        let desired = params.desired_attributes();
        assert_eq!(desired.len(), 2);
        assert_eq!(desired["new_name"], "renamed");
        assert_eq!(desired["power_off_policy"], "1");
    }

    #[test]
    fn desired_attributes_skip_composite_values() {
        let params = ParameterSet::new()
            .with("metrics", vec!["LTM".to_string(), "STM".to_string()])
            .with("pend_mem_region_size", "auto");

        let desired = params.desired_attributes();
        assert_eq!(desired.len(), 1);
        assert!(desired.contains_key("pend_mem_region_size"));
    }

    #[test]
    fn empty_values_are_not_present() {
        let params = ParameterSet::new()
            .with("name", "")
            .with("files", Vec::<String>::new())
            .with("timeout", 0_i64);

        assert!(!params.present("name"));
        assert!(!params.present("files"));
        assert!(!params.present("missing"));
        // An integer zero is still a supplied value.
        assert!(params.present("timeout"));
    }

    #[test]
    fn join_list_is_comma_flat() {
        let items = vec!["a.iso".to_string(), "b.bff".to_string()];
        assert_eq!(join_list(&items), "a.iso,b.bff");
    }
}
