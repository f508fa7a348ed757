//! Decoding of console command output.
//!
//! List commands print one record per line as comma-separated `key=value`
//! pairs. Values containing commas are wrapped in double quotes, so a
//! naive split corrupts records like `io_slots="21010002/none/0,21030003"`.

use std::collections::BTreeMap;

/// Split one record line into fields, honoring double-quote wrapping.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.clone());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse one `key=value,key=value` record line into a map.
///
/// Fields without `=` are skipped; the console pads some records with
/// positional placeholders that carry no attribute.
pub fn parse_record(line: &str) -> BTreeMap<String, String> {
    let mut record = BTreeMap::new();
    for field in split_fields(line.trim()) {
        if let Some((key, value)) = field.split_once('=') {
            record.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    record
}

/// Parse multi-record output, one record per non-empty line.
pub fn parse_records(output: &str) -> Vec<BTreeMap<String, String>> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_record() {
        let record = parse_record("name=sys1,state=Operating,power_off_policy=0");
        assert_eq!(record["name"], "sys1");
        assert_eq!(record["state"], "Operating");
        assert_eq!(record["power_off_policy"], "0");
    }

    #[test]
    fn quoted_values_keep_embedded_commas() {
        let record = parse_record(r#"name=vios1,io_slots="21010002/none/0,21030003/none/1",state=Running"#);
        assert_eq!(record["io_slots"], "21010002/none/0,21030003/none/1");
        assert_eq!(record["state"], "Running");
    }

    #[test]
    fn skips_fields_without_key() {
        let record = parse_record("name=sys1,Operating");
        assert_eq!(record.len(), 1);
        assert_eq!(record["name"], "sys1");
    }

    #[test]
    fn parses_multiple_records() {
        let out = "name=vios1,state=Running,lpar_id=1\nname=lpar2,state=Not Activated,lpar_id=2\n";
        let records = parse_records(out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["lpar_id"], "1");
        assert_eq!(records[1]["state"], "Not Activated");
    }
}
