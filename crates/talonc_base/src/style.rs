//! Hand-rolled ANSI styling for diagnostic rendering.
//!
//! No external color crate is pulled in for this; escape codes are cheap
//! enough to inline and keeping them here avoids one more dependency for
//! something this small.

pub struct Style;

impl Style {
    const RESET: &'static str = "\x1b[0m";
    const BOLD: &'static str = "\x1b[1m";
    const RED: &'static str = "\x1b[31m";
    const YELLOW: &'static str = "\x1b[33m";
    const CYAN: &'static str = "\x1b[36m";

    pub fn red(text: &str) -> String {
        format!("{}{}{}", Self::RED, text, Self::RESET)
    }

    pub fn yellow(text: &str) -> String {
        format!("{}{}{}", Self::YELLOW, text, Self::RESET)
    }

    pub fn cyan(text: &str) -> String {
        format!("{}{}{}", Self::CYAN, text, Self::RESET)
    }

    pub fn bold(text: &str) -> String {
        format!("{}{}{}", Self::BOLD, text, Self::RESET)
    }

    pub fn bold_red(text: &str) -> String {
        format!("{}{}{}{}", Self::BOLD, Self::RED, text, Self::RESET)
    }

    pub fn bold_yellow(text: &str) -> String {
        format!("{}{}{}{}", Self::BOLD, Self::YELLOW, text, Self::RESET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_wraps_text_in_escape_codes() {
        let styled = Style::red("boom");
        assert!(styled.starts_with("\x1b[31m"));
        assert!(styled.ends_with("\x1b[0m"));
        assert!(styled.contains("boom"));
    }

    #[test]
    fn bold_red_combines_both_codes() {
        let styled = Style::bold_red("fatal");
        assert!(styled.starts_with("\x1b[1m\x1b[31m"));
    }
}
