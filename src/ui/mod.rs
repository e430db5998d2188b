//! Plain terminal output for conversions, notices and listings.

mod card;

pub use card::render_currencies;

use crate::cache::RegistrationOutcome;
use crate::rates::Conversion;
use crate::reconcile::{ConversionView, Freshness};

/// Prints every conversion as a card on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalView;

impl ConversionView for TerminalView {
  fn show(&self, conversion: &Conversion, freshness: Freshness) {
    println!("{}\n", card::render(conversion, freshness));
  }

  fn remove(&self, id: &str) {
    println!("Removed {}", id);
  }
}

/// Shown once per run when any rate query failed to reach the provider
pub const OFFLINE_NOTICE: &str =
  "You appear to be offline. Rates could not be refreshed and may be out of date.";

/// User-facing line for a registration outcome, if it deserves one
pub fn registration_notice(outcome: &RegistrationOutcome) -> Option<String> {
  match outcome {
    RegistrationOutcome::AlreadyActive { .. } => None,
    RegistrationOutcome::FirstInstall { .. } => {
      Some("App ready: saved for offline use.".to_string())
    }
    RegistrationOutcome::UpdateReady { version, .. } => Some(format!(
      "Version {} is ready. Run `convter update` to switch to it.",
      version
    )),
    RegistrationOutcome::InstallFailed { serving: None, .. } => {
      Some("Could not save the app for offline use.".to_string())
    }
    RegistrationOutcome::InstallFailed { .. } => None,
  }
}
