//! Terminal prompt used when the access point needs repair.

use indexscope_core::registration::prompt::{elevation_guidance, manual_instructions};
use indexscope_core::{
    RegistrationAttempt, RegistrationOutcome, RegistrationPrompt, RegistrationStatus, RepairChoice,
};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Asks on stdin and writes to stderr so stdout stays machine-readable.
pub struct ConsolePrompt;

impl RegistrationPrompt for ConsolePrompt {
    fn choose(&self, status: &RegistrationStatus) -> RepairChoice {
        eprintln!("The Windows Search manager is not usable on this machine.");
        if let Some(message) = &status.error_message {
            eprintln!("  Reason: {}", message);
        }
        if let Some(binary) = &status.binary_path {
            eprintln!("  Registered binary: {}", binary);
        }

        let stdin = io::stdin();
        let mut input = stdin.lock();
        loop {
            eprint!("Repair the registration now? [y]es / [n]o / [q]uit: ");
            let _ = io::stderr().flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                // EOF or a closed stdin counts as quitting
                Ok(0) | Err(_) => return RepairChoice::Quit,
                Ok(_) => {}
            }
            if let Some(choice) = parse_choice(&line) {
                return choice;
            }
        }
    }

    fn show_elevation_guidance(&self) {
        eprintln!("{}", elevation_guidance());
    }

    fn show_manual_instructions(&self, binary_path: &Path) {
        eprintln!("{}", manual_instructions(binary_path));
    }

    fn report(&self, attempt: &RegistrationAttempt) {
        eprintln!("{}", describe_attempt(attempt));
    }
}

fn parse_choice(line: &str) -> Option<RepairChoice> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(RepairChoice::Accept),
        "n" | "no" => Some(RepairChoice::Decline),
        "q" | "quit" => Some(RepairChoice::Quit),
        _ => None,
    }
}

/// One-line human summary of a repair attempt.
pub fn describe_attempt(attempt: &RegistrationAttempt) -> String {
    let headline = match attempt.outcome {
        RegistrationOutcome::Success => "Registration repaired",
        RegistrationOutcome::Failed => "Registration repair failed",
        RegistrationOutcome::Timeout => "Registration repair timed out",
        RegistrationOutcome::InsufficientPrivileges => {
            "Registration repair needs administrator rights"
        }
        RegistrationOutcome::BinaryNotFound => "Registration binary not found",
        RegistrationOutcome::Cancelled => "Registration repair cancelled",
        RegistrationOutcome::ValidationFailed => {
            "Repair tool succeeded but the access point is still unusable"
        }
    };
    match &attempt.error_message {
        Some(message) => format!("{} ({}): {}", headline, attempt.binary_path, message),
        None => format!("{} ({}) in {} ms", headline, attempt.binary_path, attempt.duration_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("y\n"), Some(RepairChoice::Accept));
        assert_eq!(parse_choice(" YES "), Some(RepairChoice::Accept));
        assert_eq!(parse_choice("n"), Some(RepairChoice::Decline));
        assert_eq!(parse_choice("q\r\n"), Some(RepairChoice::Quit));
        assert_eq!(parse_choice("maybe"), None);
        assert_eq!(parse_choice(""), None);
    }
}
