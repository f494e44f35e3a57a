//! Final-answer clean-up.
//!
//! When a payment link was created during the cycle, the reply always ends
//! with that exact URL in a fixed template, whatever the oracle wrote.

use cartloop_core::step::ToolInvocationStep;
use cartloop_tools::PAYMENT_LINK_TOOLS;
use regex_lite::{Captures, Regex};
use std::sync::LazyLock;

pub const PURCHASE_TEMPLATE_PREFIX: &str = "Complete your purchase here: ";
const LINK_READY: &str = "Your payment link is ready.";

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("valid URL pattern"));
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\(\s*https?://[^)]*\)").expect("valid markdown link pattern")
});
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid space pattern"));

fn trim_url(url: &str) -> &str {
    url.trim_end_matches(['.', ',', '!', '?', ';', ':'])
}

/// The payment link produced by the latest successful payment-link step.
///
/// Reads the `"url"` field of a JSON observation, else the first URL in
/// the observation text.
pub fn extract_payment_link(steps: &[ToolInvocationStep]) -> Option<String> {
    steps
        .iter()
        .rev()
        .filter(|s| s.success && PAYMENT_LINK_TOOLS.contains(&s.tool_name.as_str()))
        .find_map(|s| {
            let from_json = serde_json::from_str::<serde_json::Value>(&s.observation)
                .ok()
                .and_then(|v| v.get("url").and_then(|u| u.as_str()).map(str::to_string));
            from_json.or_else(|| {
                URL.find(&s.observation)
                    .map(|m| trim_url(m.as_str()).to_string())
            })
        })
}

/// Remove every URL (bare or markdown) from the oracle's text.
fn strip_urls(text: &str) -> String {
    let text = MARKDOWN_LINK.replace_all(text, "$1");
    // Keep sentence punctuation that followed a bare URL.
    let text = URL.replace_all(&text, |caps: &Captures<'_>| {
        let url = &caps[0];
        url[trim_url(url).len()..].to_string()
    });
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = text
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().trim_end_matches(':').trim_end().to_string()
}

/// Shape the final reply.
pub fn finalize(oracle_text: &str, payment_link: Option<&str>) -> String {
    match payment_link {
        None => oracle_text.trim().to_string(),
        Some(url) => {
            let body = strip_urls(oracle_text);
            let body = if body.is_empty() { LINK_READY.to_string() } else { body };
            format!("{body}\n\n{PURCHASE_TEMPLATE_PREFIX}{url}")
        }
    }
}
