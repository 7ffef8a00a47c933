//! XML Schema patterns on top of the `regex` crate.
//!
//! XSD patterns are implicitly anchored, know no `^`/`$` anchors (both are
//! literals) and let `.` match newlines. They are translated once per
//! distinct pattern string and cached.

use std::collections::HashMap;

use qti_core::Value;
use regex::{Regex, RegexBuilder};

use crate::error::{EvalError, PatternFailure};
use crate::operands::Operands;

/// Compiled patterns keyed by their XSD source.
#[derive(Debug)]
pub struct PatternCache {
    compiled: HashMap<String, Regex>,
    size_limit: usize,
    nest_limit: u32,
}

impl PatternCache {
    pub fn new(size_limit: usize, nest_limit: u32) -> Self {
        PatternCache {
            compiled: HashMap::new(),
            size_limit,
            nest_limit,
        }
    }

    /// The compiled form of an XSD pattern.
    pub fn get(&mut self, pattern: &str) -> Result<&Regex, EvalError> {
        if !self.compiled.contains_key(pattern) {
            let regex = self.compile(pattern)?;
            self.compiled.insert(pattern.to_string(), regex);
        }
        self.compiled
            .get(pattern)
            .ok_or_else(|| EvalError::PatternCompilation {
                pattern: pattern.to_string(),
                kind: PatternFailure::Internal,
                message: "pattern vanished from cache".to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    fn compile(&self, pattern: &str) -> Result<Regex, EvalError> {
        let failure = |kind, message: String| EvalError::PatternCompilation {
            pattern: pattern.to_string(),
            kind,
            message,
        };
        let translated =
            translate_xsd_pattern(pattern).map_err(|m| failure(PatternFailure::Malformed, m))?;
        RegexBuilder::new(&format!("(?s)^(?:{})$", translated))
            .size_limit(self.size_limit)
            .nest_limit(self.nest_limit)
            .build()
            .map_err(|e| match e {
                regex::Error::CompiledTooBig(limit) => failure(
                    PatternFailure::SizeLimitExceeded,
                    format!("compiled pattern exceeds {} bytes", limit),
                ),
                regex::Error::Syntax(msg) if msg.contains("nested") => {
                    failure(PatternFailure::NestLimitExceeded, msg)
                }
                regex::Error::Syntax(msg) => failure(PatternFailure::Malformed, msg),
                other => failure(PatternFailure::Internal, other.to_string()),
            })
    }
}

/// Rewrite an XSD pattern into `regex` syntax, minus the anchoring.
///
/// `^` and `$` become literals, except a `^` opening a negated character
/// class. The XML name escapes `\i` and `\c` expand to their Unicode
/// classes. Other letter escapes (`\d`, `\s`, `\p{..}`) are passed
/// through; any other escaped character stands for itself.
pub fn translate_xsd_pattern(pattern: &str) -> Result<String, String> {
    const NAME_START: &str = r"\p{L}_:";
    const NAME_CHAR: &str = r"\p{L}\p{N}._:\-";

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;
    let mut class_opened = false;

    while let Some(c) = chars.next() {
        let just_opened = std::mem::replace(&mut class_opened, false);
        match c {
            '\\' => {
                let Some(next) = chars.next() else {
                    return Err("pattern ends with a lone backslash".to_string());
                };
                match (next, class_depth > 0) {
                    ('i', false) => out.push_str(&format!("[{}]", NAME_START)),
                    ('c', false) => out.push_str(&format!("[{}]", NAME_CHAR)),
                    ('I', false) => out.push_str(&format!("[^{}]", NAME_START)),
                    ('C', false) => out.push_str(&format!("[^{}]", NAME_CHAR)),
                    ('i', true) => out.push_str(NAME_START),
                    ('c', true) => out.push_str(NAME_CHAR),
                    ('I' | 'C', true) => {
                        return Err(format!(
                            "negated name escape \\{} inside a character class",
                            next
                        ))
                    }
                    (other, _) if other.is_ascii_alphanumeric() => {
                        out.push('\\');
                        out.push(other);
                    }
                    // Escaped punctuation is a literal, whatever the character.
                    (other, _) => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
                }
            }
            '[' => {
                class_depth += 1;
                class_opened = true;
                out.push('[');
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(']');
            }
            '^' if just_opened => out.push('^'),
            '^' => out.push_str(r"\^"),
            '$' => out.push_str(r"\$"),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Null for a null operand; otherwise whether the whole string matches.
pub fn pattern_match(
    ops: Operands<'_>,
    pattern: &str,
    cache: &mut PatternCache,
) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        ops.exclusively_single(),
        "patternMatch",
        "a single cardinality operand",
    )?;
    Operands::require(ops.exclusively_string(), "patternMatch", "a string operand")?;
    let subject = ops[0].as_str().unwrap_or_default();
    let regex = cache.get(pattern)?;
    Ok(Value::boolean(regex.is_match(subject)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PatternCache {
        PatternCache::new(10 * (1 << 20), 250)
    }

    fn matches(pattern: &str, subject: &str) -> Value {
        let ops = [Value::string(subject)];
        pattern_match(Operands::new(&ops), pattern, &mut cache()).unwrap()
    }

    #[test]
    fn patterns_are_implicitly_anchored() {
        assert_eq!(matches("ab*", "a"), Value::boolean(true));
        assert_eq!(matches("ab*", "abbb"), Value::boolean(true));
        assert_eq!(matches("ab*", "ac"), Value::boolean(false));
        assert_eq!(matches("b", "abc"), Value::boolean(false));
    }

    #[test]
    fn null_subject_gives_null() {
        let ops = [Value::Null];
        assert_eq!(
            pattern_match(Operands::new(&ops), "ab*", &mut cache()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn escaped_punctuation_is_literal() {
        assert_eq!(translate_xsd_pattern(r"a\…\€").unwrap(), "a…€");
        assert_eq!(translate_xsd_pattern(r"[^\s\:\?]").unwrap(), r"[^\s:\?]");
        assert_eq!(matches(r"\d+\€", "12€"), Value::boolean(true));
        assert_eq!(matches(r"[\…\-]+", "…-…"), Value::boolean(true));
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        let ops = [Value::string("a")];
        let err = pattern_match(Operands::new(&ops), "[a-", &mut cache()).unwrap_err();
        assert!(matches!(
            err,
            EvalError::PatternCompilation {
                kind: PatternFailure::Malformed,
                ..
            }
        ));
    }

    #[test]
    fn anchors_are_literals_and_dot_matches_newlines() {
        assert_eq!(matches("^a$", "^a$"), Value::boolean(true));
        assert_eq!(matches("^a$", "a"), Value::boolean(false));
        assert_eq!(matches("[^x]+", "abc"), Value::boolean(true));
        assert_eq!(matches("a.b", "a\nb"), Value::boolean(true));
    }

    #[test]
    fn xml_name_escapes() {
        assert_eq!(matches(r"\i\c*", "_name-1"), Value::boolean(true));
        assert_eq!(matches(r"\i\c*", "1name"), Value::boolean(false));
        assert_eq!(translate_xsd_pattern(r"[\i]").unwrap(), r"[\p{L}_:]");
        assert!(translate_xsd_pattern(r"[\I]").is_err());
    }

    #[test]
    fn size_and_nest_limits_are_classified() {
        let mut tiny = PatternCache::new(16, 250);
        let err = tiny.get("a{1000}").unwrap_err();
        assert!(matches!(
            err,
            EvalError::PatternCompilation {
                kind: PatternFailure::SizeLimitExceeded,
                ..
            }
        ));

        let mut shallow = PatternCache::new(10 * (1 << 20), 3);
        let err = shallow.get("((((a))))").unwrap_err();
        assert!(matches!(
            err,
            EvalError::PatternCompilation {
                kind: PatternFailure::NestLimitExceeded,
                ..
            }
        ));
    }

    #[test]
    fn compiled_patterns_are_cached() {
        let mut cache = cache();
        cache.get("ab*").unwrap();
        cache.get("ab*").unwrap();
        cache.get("c").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn non_string_operands_are_rejected() {
        let ops = [Value::integer(1)];
        assert!(matches!(
            pattern_match(Operands::new(&ops), "1", &mut cache()),
            Err(EvalError::OperatorType { .. })
        ));
    }
}
