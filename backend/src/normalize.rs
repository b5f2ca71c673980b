//! Rich-text cleanup before serialization to the Blackboard Ultra format.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::logger;

lazy_static! {
    // An already-doubled $$...$$ run is matched first and left unchanged,
    // so only lone $...$ pairs are captured for doubling.
    static ref RE_DOLLAR: Regex = Regex::new(r"\$\$[^$]*\$\$|\$([^$]*?)\$").unwrap();
    static ref RE_PAREN: Regex = Regex::new(r"\\\((.*?)\\\)").unwrap();
    static ref RE_SQUARE: Regex = Regex::new(r"\\\[(.*?)\\\]").unwrap();
    static ref RE_P_WITH_ATTRS: Regex = Regex::new(r"<p .*?>").unwrap();
    static ref RE_WHOLE_DOLLAR: Regex = Regex::new(r"^\$(.*)\$$").unwrap();
}

/// The `format` attribute of a Moodle rich-text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextFormat {
    Html,
    MoodleAutoFormat,
    Other(String),
}

impl TextFormat {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "html" => TextFormat::Html,
            "moodle_auto_format" => TextFormat::MoodleAutoFormat,
            other => TextFormat::Other(other.to_string()),
        }
    }
}

/// Cleans a raw rich-text field into markup accepted by Blackboard Ultra.
///
/// Every branch returns a string: an absent field reads as empty, and an
/// unhandled format passes through unchanged with a warning.
pub fn normalize(raw: Option<&str>, format: &TextFormat) -> String {
    let Some(input) = raw else {
        return String::new();
    };

    match format {
        TextFormat::Html => {
            // Literal newlines are not allowed in Blackboard Ultra fields.
            let mut output: String = input.chars().filter(|c| *c != '\n' && *c != '\r').collect();

            // $...$, \(...\) and \[...\] all denote LaTeX; Ultra expects the
            // $$...$$ convention.
            output = RE_DOLLAR
                .replace_all(&output, |caps: &Captures| match caps.get(1) {
                    Some(inner) => format!("$${}$$", inner.as_str()),
                    None => caps[0].to_string(),
                })
                .into_owned();
            output = RE_PAREN
                .replace_all(&output, |caps: &Captures| format!("$${}$$", &caps[1]))
                .into_owned();
            output = RE_SQUARE
                .replace_all(&output, |caps: &Captures| format!("$${}$$", &caps[1]))
                .into_owned();

            // Drop paragraph formatting and empty paragraphs.
            output = RE_P_WITH_ATTRS.replace_all(&output, "<p>").into_owned();
            output.replace("<p></p>", "")
        }
        TextFormat::MoodleAutoFormat => {
            // Basically raw text, though the whole string can be a single
            // dollar-enclosed formula.
            RE_WHOLE_DOLLAR
                .replace(input, |caps: &Captures| format!("$${}$$", &caps[1]))
                .into_owned()
        }
        TextFormat::Other(tag) => {
            logger::warn(&format!(
                "format {} is not handled, passing text through unchanged: {}",
                tag, input
            ));
            input.to_string()
        }
    }
}
