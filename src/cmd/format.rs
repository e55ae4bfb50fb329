//! Terminal-aware coloring for diagnostic output.
//!
//! Error prefixes get the fixed bold-red pair unless stderr is not a
//! terminal or the NO_COLOR environment variable is present (any value,
//! including empty). See https://no-color.org/.

use std::io::IsTerminal;

const BOLD_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0;0m";

/// Style decision for the diagnostic stream, taken once per failure.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub use_color: bool,
}

impl Style {
    pub fn detect() -> Self {
        Self::from_signals(
            std::io::stderr().is_terminal(),
            std::env::var_os("NO_COLOR").is_some(),
        )
    }

    /// The two external signals, split out so each can be toggled in tests.
    pub fn from_signals(stderr_is_tty: bool, no_color: bool) -> Self {
        Style {
            use_color: stderr_is_tty && !no_color,
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::detect()
    }
}

/// Wrap `text` in the bold-red escape pair when color is enabled.
pub fn decorate(text: &str, style: &Style) -> String {
    if !style.use_color {
        return text.to_string();
    }
    format!("{BOLD_RED}{text}{RESET}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colored_on_tty_without_opt_out() {
        let style = Style::from_signals(true, false);
        assert_eq!(decorate("oops", &style), "\x1b[1;31moops\x1b[0;0m");
    }

    #[test]
    fn plain_when_not_a_tty() {
        let style = Style::from_signals(false, false);
        assert_eq!(decorate("oops", &style), "oops");
    }

    #[test]
    fn plain_when_no_color_set() {
        let style = Style::from_signals(true, true);
        assert_eq!(decorate("oops", &style), "oops");
    }

    #[test]
    fn plain_when_both_signals_disable() {
        let style = Style::from_signals(false, true);
        assert_eq!(decorate("oops", &style), "oops");
    }
}
