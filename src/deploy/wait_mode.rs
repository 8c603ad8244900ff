// ABOUTME: Interactive vs. non-interactive observation of a service's startup.
// ABOUTME: Decides TTY allocation at create time and triggers rebuilds on mismatch.

use crate::config::Frontend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// TTY allocated, local stdin bridged into the container.
    Interactive,
    /// Logs followed, no stdin.
    NonInteractive,
}

impl WaitMode {
    /// Mode for a service that declares a readiness wait.
    ///
    /// `WHALER_WAIT_MODE` wins; otherwise an interactive front-end on a real
    /// terminal gets interactive mode.
    pub fn decide(frontend: &Frontend) -> Self {
        if let Some(mode) = &frontend.wait_mode {
            return if mode == "interactive" {
                WaitMode::Interactive
            } else {
                WaitMode::NonInteractive
            };
        }
        if frontend.interactive && frontend.stdout_tty {
            WaitMode::Interactive
        } else {
            WaitMode::NonInteractive
        }
    }

    /// Mode for an existing container, given whether it carries a wait label.
    pub fn for_container(has_wait: bool, frontend: &Frontend) -> Self {
        if has_wait {
            Self::decide(frontend)
        } else {
            WaitMode::NonInteractive
        }
    }

    pub fn is_interactive(self) -> bool {
        self == WaitMode::Interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_terminal_detection() {
        let frontend = Frontend {
            wait_mode: Some("noninteractive".into()),
            interactive: true,
            stdout_tty: true,
        };
        assert_eq!(WaitMode::decide(&frontend), WaitMode::NonInteractive);

        let frontend = Frontend {
            wait_mode: Some("interactive".into()),
            ..Frontend::default()
        };
        assert_eq!(WaitMode::decide(&frontend), WaitMode::Interactive);
    }

    #[test]
    fn interactive_needs_both_frontend_flag_and_terminal() {
        let mut frontend = Frontend {
            wait_mode: None,
            interactive: true,
            stdout_tty: false,
        };
        assert_eq!(WaitMode::decide(&frontend), WaitMode::NonInteractive);
        frontend.stdout_tty = true;
        assert_eq!(WaitMode::decide(&frontend), WaitMode::Interactive);
        assert_eq!(
            WaitMode::for_container(false, &frontend),
            WaitMode::NonInteractive
        );
    }
}
