//! # Format Annotations
//!
//! A format annotation has the form `<pluginId>:<payload>`. Only the first
//! colon separates the two parts; the payload may itself contain colons
//! (the sandbox plugin's `<module>:<function>` payload relies on this).

use std::fmt;

use crate::error::AnnotationSyntaxError;

/// A parsed `<pluginId>:<payload>` annotation borrowing from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatAnnotation<'a> {
    /// Identifier of the plugin the annotation is addressed to.
    pub plugin_id: &'a str,
    /// Plugin-specific payload (everything after the first colon).
    pub payload: &'a str,
}

impl<'a> FormatAnnotation<'a> {
    /// Split `raw` on its first colon.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationSyntaxError`] if `raw` contains no colon.
    pub fn parse(raw: &'a str) -> Result<Self, AnnotationSyntaxError> {
        match raw.split_once(':') {
            Some((plugin_id, payload)) => Ok(Self { plugin_id, payload }),
            None => Err(AnnotationSyntaxError {
                raw: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for FormatAnnotation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_id, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_colon_only() {
        let a = FormatAnnotation::parse("wasm:policy:check_replicas").unwrap();
        assert_eq!(a.plugin_id, "wasm");
        assert_eq!(a.payload, "policy:check_replicas");
    }

    #[test]
    fn payload_may_be_empty() {
        let a = FormatAnnotation::parse("rule:").unwrap();
        assert_eq!(a.plugin_id, "rule");
        assert_eq!(a.payload, "");
    }

    #[test]
    fn missing_colon_is_syntax_error() {
        let err = FormatAnnotation::parse("date-time").unwrap_err();
        assert_eq!(err.raw, "date-time");
    }

    #[test]
    fn display_reassembles_annotation() {
        let raw = "rule:self.size() > 0";
        assert_eq!(FormatAnnotation::parse(raw).unwrap().to_string(), raw);
    }
}
