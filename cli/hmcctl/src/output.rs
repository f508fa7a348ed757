//! Result-record output.

use hmc_converge::{ConvergeError, OperationResult};
use serde_json::json;

/// Print the success record: `{changed, info?, warning?}`.
pub fn print_result(result: &OperationResult) {
    match serde_json::to_string_pretty(result) {
        Ok(record) => println!("{record}"),
        Err(_) => println!("{}", json!({"changed": result.changed})),
    }
}

/// Print the failure record: `{changed: false, error}`.
pub fn print_error_record(err: &ConvergeError) {
    let record = json!({
        "changed": false,
        "error": err.to_string(),
    });
    println!("{record:#}");
}
