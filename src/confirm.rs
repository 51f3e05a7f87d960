//! Yes/no confirmation as an injected capability
//!
//! Destructive operations (cascading removal, overwriting build output) ask
//! a `Confirm` implementation instead of reading stdin directly.

/// Answers a yes/no question
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive terminal prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Fixed answer, for `--yes` and tests
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(answer = self.0, "{}", prompt);
        self.0
    }
}
