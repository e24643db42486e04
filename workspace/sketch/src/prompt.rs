//! Prompt assembly for the forensic sketch style.
//!
//! Stable Diffusion 1.5 text encoders stop at 77 tokens. Word count is used
//! as a cheap proxy for token count, so the budgets below leave some headroom.

use tracing::{debug, warn};

/// Word budget for the free-text subject before it is wrapped in the style text.
pub const SUBJECT_WORD_BUDGET: usize = 55;

/// Word budget for the final prompt handed to the pipeline.
pub const PROMPT_WORD_BUDGET: usize = 75;

const STYLE_PREAMBLE: &str = "highly detailed police composite sketch";

const STYLE_SUFFIX: &str = "black and white pencil line drawing, front view, clean strong lines, \
sharp contours, forensic sketch, solid black outlines, no shading, white background";

/// Steers the model away from colour, shading and photographic output.
pub const NEGATIVE_PROMPT: &str = "photo, photorealistic, painting, colorful, color, shadow, \
shading, 3d, blur, cartoon, anime, watermark, logo, text, background";

/// Truncates `prompt` to at most `max_words` whitespace-separated words.
///
/// A prompt already within budget is returned unchanged, whitespace included.
pub fn truncate_prompt(prompt: &str, max_words: usize) -> String {
    let word_count = prompt.split_whitespace().count();
    if word_count <= max_words {
        return prompt.to_string();
    }

    warn!(
        "Prompt too long ({} words), truncating to {} words",
        word_count, max_words
    );
    prompt
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Phrases an officer's suspect description as a sketch subject.
pub fn suspect_subject(description: &str) -> String {
    format!(
        "Police sketch of a criminal with features: {}. \
Forensic sketch, black and white, front view, clean lines, high detail.",
        description.trim()
    )
}

/// Subject for a revised sketch: the original description plus the requested adjustment.
pub fn revision_subject(description: &str, adjustment: &str) -> String {
    format!(
        "{} Adjustments: {}.",
        suspect_subject(description),
        adjustment.trim()
    )
}

/// A prompt / negative prompt pair ready for the diffusion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchPrompt {
    pub prompt: String,
    pub negative_prompt: String,
}

impl SketchPrompt {
    /// Wraps `subject` in the fixed line-art style and enforces both word budgets.
    pub fn compose(subject: &str) -> Self {
        let subject = truncate_prompt(subject, SUBJECT_WORD_BUDGET);
        let full_prompt = format!("{}, {}, {}", STYLE_PREAMBLE, subject, STYLE_SUFFIX);
        let prompt = truncate_prompt(&full_prompt, PROMPT_WORD_BUDGET);
        debug!("Composed sketch prompt: {}", prompt);

        Self {
            prompt,
            negative_prompt: NEGATIVE_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_truncate_within_budget_is_unchanged() {
        let prompt = "tall   man with\ta beard";
        assert_eq!(truncate_prompt(prompt, 10), prompt);
        assert!(prompt.starts_with(&truncate_prompt(prompt, 5)));
    }

    #[test]
    fn test_truncate_never_exceeds_budget() {
        for budget in [0, 1, 7, 55, 75] {
            for len in [0, 1, budget, budget + 1, budget * 3 + 2] {
                let truncated = truncate_prompt(&words(len), budget);
                assert!(truncated.split_whitespace().count() <= budget);
            }
        }
    }

    #[test]
    fn test_truncate_keeps_leading_words() {
        let truncated = truncate_prompt(&words(100), 3);
        assert_eq!(truncated, "w0 w1 w2");
    }

    #[test]
    fn test_compose_wraps_subject_in_style() {
        let prompt = SketchPrompt::compose("round face, short hair");
        assert!(prompt.prompt.starts_with("highly detailed police composite sketch, round face"));
        assert!(prompt.prompt.ends_with("white background"));
        assert_eq!(prompt.negative_prompt, NEGATIVE_PROMPT);
    }

    #[test]
    fn test_compose_respects_prompt_budget() {
        let prompt = SketchPrompt::compose(&words(500));
        assert!(prompt.prompt.split_whitespace().count() <= PROMPT_WORD_BUDGET);
        // The subject alone is cut first, so its tail never reaches the model
        assert!(!prompt.prompt.contains(&format!("w{}", SUBJECT_WORD_BUDGET)));
    }

    #[test]
    fn test_subjects() {
        let subject = suspect_subject("  scar on left cheek ");
        assert_eq!(
            subject,
            "Police sketch of a criminal with features: scar on left cheek. \
Forensic sketch, black and white, front view, clean lines, high detail."
        );

        let revised = revision_subject("scar on left cheek", "thinner nose");
        assert!(revised.starts_with(&subject));
        assert!(revised.ends_with("Adjustments: thinner nose."));
    }
}
