//! Shell-style glob matching for `container_filter`/`ship_filter`, built on
//! `regex` rather than adding a dedicated glob crate since the HTTP probe
//! already pulls `regex` in for body matching.

use regex::Regex;

use crate::error::{MaestroError, Result};

/// A compiled glob pattern supporting `*` (any run of characters) and `?`
/// (any single character); everything else matches literally.
#[derive(Debug, Clone)]
pub struct Glob(Regex);

impl Glob {
    /// Compile a glob pattern.
    pub fn compile(pattern: &str) -> Result<Self> {
        let mut regex_src = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '*' => regex_src.push_str(".*"),
                '?' => regex_src.push('.'),
                c => regex_src.push_str(&regex::escape(&c.to_string())),
            }
        }
        regex_src.push('$');
        let regex = Regex::new(&regex_src)
            .map_err(|e| MaestroError::configuration(format!("invalid glob pattern `{pattern}`: {e}")))?;
        Ok(Self(regex))
    }

    /// Whether `candidate` matches this glob.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        let glob = Glob::compile("web-*").unwrap();
        assert!(glob.matches("web-1"));
        assert!(glob.matches("web-"));
        assert!(!glob.matches("db-1"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let glob = Glob::compile("web-?").unwrap();
        assert!(glob.matches("web-1"));
        assert!(!glob.matches("web-12"));
    }

    #[test]
    fn exact_pattern_with_no_wildcards() {
        let glob = Glob::compile("web-1").unwrap();
        assert!(glob.matches("web-1"));
        assert!(!glob.matches("web-10"));
    }
}
