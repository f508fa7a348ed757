//! Error display and exit-status mapping for the CLI.

use colored::Colorize;

use hmc_converge::ConvergeError;

/// Exit status: 2 for validation failures, 1 for everything fatal.
pub fn exit_code(err: &ConvergeError) -> i32 {
    if err.is_validation() {
        2
    } else {
        1
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &ConvergeError) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    match err {
        ConvergeError::Constraint(_) => {
            eprintln!(
                "\n{}",
                "Hint: check the action's mandatory and unsupported parameters.".yellow()
            );
        }
        ConvergeError::ConvergenceTimeout { .. } => {
            eprintln!(
                "\n{}",
                "Hint: the command was issued; the resource may still converge on its own.".yellow()
            );
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_exit_with_two() {
        assert_eq!(exit_code(&ConvergeError::Constraint("x".into())), 2);
        assert_eq!(exit_code(&ConvergeError::TargetNotFound("x".into())), 1);
    }
}
