//! Background fill options, instruction composition and the recent-prompt list.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// How many free-text instructions the recency list keeps.
pub const PROMPT_HISTORY_LIMIT: usize = 5;

/// Chips longer than this are shortened for display.
const CHIP_MAX_CHARS: usize = 40;

// ============================================================================
// COLORS
// ============================================================================

/// An opaque sRGB colour written as `#RRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexColor(pub [u8; 3]);

impl HexColor {
    pub const WHITE: HexColor = HexColor([0xFF, 0xFF, 0xFF]);

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Parse `#RRGGBB`, `RRGGBB` or the short `#RGB` form.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self([r, g, b]))
            }
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self(out))
            }
            _ => None,
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{}' is not a #RRGGBB colour", s))
    }
}

// ============================================================================
// BACKGROUND FILL
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillMode {
    #[default]
    Transparent,
    Solid,
    Gradient,
}

impl FillMode {
    pub fn label(self) -> &'static str {
        match self {
            FillMode::Transparent => "Transparent",
            FillMode::Solid => "Solid color",
            FillMode::Gradient => "Gradient",
        }
    }
}

impl FromStr for FillMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transparent" | "remove" => Ok(FillMode::Transparent),
            "solid" | "color" | "colour" => Ok(FillMode::Solid),
            "gradient" => Ok(FillMode::Gradient),
            other => Err(format!(
                "unknown background mode '{}' (expected transparent, solid or gradient)",
                other
            )),
        }
    }
}

/// The background-fill control as the user sees it: a mode plus every colour
/// picker's value. Switching modes keeps the colours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundOptions {
    pub mode: FillMode,
    pub solid: HexColor,
    pub gradient_top: HexColor,
    pub gradient_bottom: HexColor,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            mode: FillMode::Transparent,
            solid: HexColor::WHITE,
            gradient_top: HexColor([0x4A, 0x90, 0xE2]),
            gradient_bottom: HexColor([0x90, 0x13, 0xFE]),
        }
    }
}

impl BackgroundOptions {
    pub fn fill(&self) -> BackgroundFill {
        match self.mode {
            FillMode::Transparent => BackgroundFill::Transparent,
            FillMode::Solid => BackgroundFill::Solid(self.solid),
            FillMode::Gradient => BackgroundFill::Gradient {
                top: self.gradient_top,
                bottom: self.gradient_bottom,
            },
        }
    }
}

/// What the edit should do with the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundFill {
    Transparent,
    Solid(HexColor),
    Gradient { top: HexColor, bottom: HexColor },
}

impl BackgroundFill {
    /// Fixed directive for this fill mode.
    pub fn directive(&self) -> String {
        match self {
            BackgroundFill::Transparent => {
                "Remove only the background precisely, making it fully transparent.".to_string()
            }
            BackgroundFill::Solid(color) => {
                format!("Fill the background with the solid color {}.", color)
            }
            BackgroundFill::Gradient { top, bottom } => format!(
                "Fill the background with a vertical gradient from {} at the top to {} at the bottom.",
                top, bottom
            ),
        }
    }
}

/// Build the instruction sent to the edit model.
///
/// The fill directive comes first, the user's own text (if any) is appended
/// and scoped to the background, and the whole task is prefixed with the
/// subject-preservation requirement.
pub fn compose_instruction(fill: &BackgroundFill, user_prompt: &str) -> String {
    let mut task = fill.directive();
    let user_prompt = user_prompt.trim();
    if !user_prompt.is_empty() {
        task.push_str(&format!(
            " Also apply the following instruction to the background only: \"{}\"",
            user_prompt
        ));
    }
    format!(
        "Perform the following task while perfectly preserving the main subject's original \
         shape, size and proportions pixel for pixel: {}",
        task
    )
}

// ============================================================================
// PROMPT HISTORY
// ============================================================================

/// Most-recent-first list of free-text instructions, capped at
/// [`PROMPT_HISTORY_LIMIT`] and free of duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptHistory {
    entries: VecDeque<String>,
}

impl PromptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted instruction. Blank text and text already in the list
    /// are ignored; returns whether the list changed.
    pub fn record(&mut self, prompt: &str) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() || self.entries.iter().any(|p| p == prompt) {
            return false;
        }
        self.entries.push_front(prompt.to_string());
        self.entries.truncate(PROMPT_HISTORY_LIMIT);
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn most_recent(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Label for a recency chip.
pub fn chip_label(prompt: &str) -> String {
    if prompt.chars().count() > CHIP_MAX_CHARS {
        let head: String = prompt.chars().take(CHIP_MAX_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        prompt.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_and_format() {
        assert_eq!(HexColor::parse("#4a90e2"), Some(HexColor([0x4A, 0x90, 0xE2])));
        assert_eq!(HexColor::parse("FFFFFF"), Some(HexColor::WHITE));
        assert_eq!(HexColor::parse("#fff"), Some(HexColor::WHITE));
        assert_eq!(HexColor::parse("#12345"), None);
        assert_eq!(HexColor::parse("#zzzzzz"), None);
        assert_eq!(HexColor([0x90, 0x13, 0xFE]).to_string(), "#9013FE");
        assert!("nope".parse::<HexColor>().is_err());
    }

    #[test]
    fn fill_follows_selected_mode() {
        let mut opts = BackgroundOptions::default();
        assert_eq!(opts.fill(), BackgroundFill::Transparent);
        opts.mode = FillMode::Solid;
        assert_eq!(opts.fill(), BackgroundFill::Solid(HexColor::WHITE));
        opts.mode = FillMode::Gradient;
        assert_eq!(
            opts.fill(),
            BackgroundFill::Gradient {
                top: HexColor([0x4A, 0x90, 0xE2]),
                bottom: HexColor([0x90, 0x13, 0xFE]),
            }
        );
    }

    #[test]
    fn fill_mode_parses_cli_names() {
        assert_eq!("Solid".parse::<FillMode>(), Ok(FillMode::Solid));
        assert_eq!("gradient".parse::<FillMode>(), Ok(FillMode::Gradient));
        assert!("blur".parse::<FillMode>().is_err());
    }

    #[test]
    fn instruction_without_user_text() {
        let text = compose_instruction(&BackgroundFill::Transparent, "   ");
        assert!(text.starts_with("Perform the following task while perfectly preserving"));
        assert!(text.ends_with("making it fully transparent."));
        assert!(!text.contains("Also apply"));
    }

    #[test]
    fn instruction_scopes_user_text_to_background() {
        let fill = BackgroundFill::Gradient {
            top: HexColor([0, 0, 0]),
            bottom: HexColor::WHITE,
        };
        let text = compose_instruction(&fill, "add soft shadow");
        assert!(text.contains("from #000000 at the top to #FFFFFF at the bottom."));
        assert!(text.ends_with("to the background only: \"add soft shadow\""));
    }

    #[test]
    fn solid_directive_names_color() {
        let text = compose_instruction(&BackgroundFill::Solid(HexColor([1, 2, 3])), "");
        assert!(text.contains("solid color #010203"));
    }

    #[test]
    fn history_is_most_recent_first_and_capped() {
        let mut h = PromptHistory::new();
        for p in ["a", "b", "c", "d", "e", "f", "g"] {
            assert!(h.record(p));
        }
        assert_eq!(h.len(), PROMPT_HISTORY_LIMIT);
        let got: Vec<&str> = h.entries().collect();
        assert_eq!(got, vec!["g", "f", "e", "d", "c"]);
        assert_eq!(h.most_recent(), Some("g"));
    }

    #[test]
    fn history_ignores_duplicates_and_blanks() {
        let mut h = PromptHistory::new();
        h.record("sky");
        h.record("sea");
        assert!(!h.record("sky"));
        assert!(!h.record("sea"));
        assert!(!h.record("  "));
        assert_eq!(h.entries().collect::<Vec<_>>(), vec!["sea", "sky"]);
    }

    #[test]
    fn long_chip_labels_are_shortened() {
        let long = "x".repeat(41);
        let label = chip_label(&long);
        assert_eq!(label.chars().count(), 40);
        assert!(label.ends_with("..."));
        assert_eq!(chip_label(&"y".repeat(40)), "y".repeat(40));
    }
}
