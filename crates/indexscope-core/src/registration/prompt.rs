//! User interaction while resolving a missing registration.

use crate::models::{RegistrationAttempt, RegistrationStatus};
use std::path::Path;

/// Answer to "the search manager is not usable, repair it now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairChoice {
    Accept,
    Decline,
    Quit,
}

/// Front-end hooks used by `RegistrationOrchestrator::handle_missing_registration`.
pub trait RegistrationPrompt {
    fn choose(&self, status: &RegistrationStatus) -> RepairChoice;

    fn show_elevation_guidance(&self);

    fn show_manual_instructions(&self, binary_path: &Path);

    fn report(&self, attempt: &RegistrationAttempt);
}

/// Prompt for unattended runs: never repairs, never prints.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompt;

impl RegistrationPrompt for NonInteractivePrompt {
    fn choose(&self, _status: &RegistrationStatus) -> RepairChoice {
        RepairChoice::Quit
    }

    fn show_elevation_guidance(&self) {}

    fn show_manual_instructions(&self, _binary_path: &Path) {}

    fn report(&self, _attempt: &RegistrationAttempt) {}
}

/// Guidance shown when a repair is accepted from an unprivileged session.
pub fn elevation_guidance() -> &'static str {
    "Repairing the Windows Search registration requires administrator rights.\n\
     Re-run this command from an elevated prompt (right-click the terminal and\n\
     choose \"Run as administrator\"), or pass --auto-register from an elevated\n\
     script."
}

/// Step-by-step instructions for repairing the registration by hand.
pub fn manual_instructions(binary_path: &Path) -> String {
    format!(
        "To repair the registration manually:\n\
         \x20 1. Open a command prompt as administrator.\n\
         \x20 2. Run: regsvr32 \"{}\"\n\
         \x20 3. Make sure the Windows Search (WSearch) service is running.\n\
         \x20 4. Re-run this command.",
        binary_path.display()
    )
}
