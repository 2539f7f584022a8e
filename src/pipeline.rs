//! Line transform pipeline shared by the hostname and IP builders.
//!
//! Every fetched line goes through three stages:
//!
//! 1. pre-clean: drop everything from the first `#`, trim, then apply the
//!    source's own pre-clean step (which may narrow the line to a token);
//! 2. validity check: empty lines are dropped, otherwise the source's own
//!    predicate decides;
//! 3. post-clean: trim again, then apply the source's own post-clean step.
//!
//! The stages are pure; sources only differ by the [`LineRules`] they carry.

/// Rewrites a line.
pub type CleanFn = fn(&str) -> String;

/// Decides whether a line is kept.
pub type CheckFn = fn(&str) -> bool;

/// Per-source customization of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineRules {
    /// Lowercase the raw line before anything else (hostnames are case-insensitive).
    pub lowercase: bool,
    pub pre_clean: Option<CleanFn>,
    pub check: Option<CheckFn>,
    pub post_clean: Option<CleanFn>,
}

impl LineRules {
    /// Rules with no custom steps.
    pub const fn plain() -> Self {
        Self {
            lowercase: false,
            pre_clean: None,
            check: None,
            post_clean: None,
        }
    }

    /// Same rules, with lowercasing enabled.
    pub const fn lowercased(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Run one raw line through all three stages.
    ///
    /// Returns `None` when the line is discarded.
    pub fn apply(&self, line: &str) -> Option<String> {
        let line = if self.lowercase {
            pre_clean_line(&line.to_lowercase(), self.pre_clean)
        } else {
            pre_clean_line(line, self.pre_clean)
        };
        if !is_line_valid(&line, self.check) {
            return None;
        }
        Some(post_clean_line(&line, self.post_clean))
    }
}

/// Strip the comment, trim, then apply the custom pre-clean step.
pub fn pre_clean_line(line: &str, custom: Option<CleanFn>) -> String {
    let mut without_comment = String::with_capacity(line.len());
    for c in line.chars() {
        if c == '#' {
            break;
        }
        without_comment.push(c);
    }
    let trimmed = without_comment.trim();
    match custom {
        Some(clean) => clean(trimmed),
        None => trimmed.to_string(),
    }
}

/// An empty line is never valid; otherwise the custom predicate decides.
pub fn is_line_valid(line: &str, custom: Option<CheckFn>) -> bool {
    if line.is_empty() {
        return false;
    }
    custom.map_or(true, |check| check(line))
}

/// Trim, then apply the custom post-clean step.
pub fn post_clean_line(line: &str, custom: Option<CleanFn>) -> String {
    let trimmed = line.trim();
    match custom {
        Some(clean) => clean(trimmed),
        None => trimmed.to_string(),
    }
}

/// Split a fetched body on `\n` and run every line through `rules`.
pub fn process_body(body: &str, rules: &LineRules) -> Vec<String> {
    body.split('\n').filter_map(|line| rules.apply(line)).collect()
}

/// True when `s` starts with any of `prefixes`.
pub fn has_any_prefix(s: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| s.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_zero_prefix(line: &str) -> String {
        line.trim_start_matches("0.0.0.0 ").to_string()
    }

    fn reject_local(line: &str) -> bool {
        !line.starts_with("local")
    }

    fn strip_trailing_dot(line: &str) -> String {
        line.trim_end_matches('.').to_string()
    }

    #[test]
    fn test_pre_clean_empty() {
        assert_eq!(pre_clean_line("", None), "");
        assert_eq!(pre_clean_line("", Some(strip_zero_prefix)), "");
    }

    #[test]
    fn test_pre_clean_strips_comment() {
        assert_eq!(pre_clean_line("  example.com  # ads", None), "example.com");
        assert_eq!(pre_clean_line("# full comment", None), "");
        assert_eq!(pre_clean_line("a#b#c", None), "a");
    }

    #[test]
    fn test_pre_clean_custom_runs_after_trim() {
        assert_eq!(
            pre_clean_line("   0.0.0.0 ads.example.com  ", Some(strip_zero_prefix)),
            "ads.example.com"
        );
    }

    #[test]
    fn test_is_line_valid() {
        assert!(!is_line_valid("", None));
        assert!(!is_line_valid("", Some(reject_local)));
        assert!(is_line_valid("example.com", None));
        assert!(!is_line_valid("localhost", Some(reject_local)));
        assert!(is_line_valid("example.com", Some(reject_local)));
    }

    #[test]
    fn test_post_clean() {
        assert_eq!(post_clean_line(" example.com. ", None), "example.com.");
        assert_eq!(
            post_clean_line(" example.com. ", Some(strip_trailing_dot)),
            "example.com"
        );
    }

    #[test]
    fn test_rules_apply_lowercase() {
        let rules = LineRules::plain().lowercased();
        assert_eq!(rules.apply("ADS.Example.COM"), Some("ads.example.com".to_string()));
        assert_eq!(LineRules::plain().apply("ADS.com"), Some("ADS.com".to_string()));
    }

    #[test]
    fn test_rules_apply_discards() {
        let rules = LineRules {
            check: Some(reject_local),
            ..LineRules::plain()
        };
        assert_eq!(rules.apply("# only a comment"), None);
        assert_eq!(rules.apply("   "), None);
        assert_eq!(rules.apply("localhost"), None);
    }

    #[test]
    fn test_process_body() {
        let body = "# header\nexample.com\n\n  other.org # inline\r\nlocalhost\n";
        let rules = LineRules {
            check: Some(reject_local),
            ..LineRules::plain()
        };
        assert_eq!(process_body(body, &rules), vec!["example.com", "other.org"]);
    }

    #[test]
    fn test_has_any_prefix() {
        assert!(has_any_prefix("127.0.0.1 localhost", &["::1", "127.0.0.1 "]));
        assert!(!has_any_prefix("example.com", &["::1", "127.0.0.1 "]));
        assert!(!has_any_prefix("example.com", &[]));
    }
}
