use regex::Regex;

use crate::{Error, Result};

/// A compiled name matcher for rule patterns.
///
/// Two deliberately distinct compilation variants exist, matching the two
/// call sites in the pipeline:
///
/// - [`Glob::structural`] compiles full POSIX-shell glob syntax (`*`, `?`,
///   character classes, `{a,b}` brace groups) and escapes everything else,
///   maximizing match breadth for structural patches.
/// - [`Glob::metadata`] is the narrower metadata-DSL variant: only `*` is
///   rewritten, to a non-greedy `.*?`, and the rest of the pattern reaches
///   the regex engine verbatim. The bare pattern `"*"` is special-cased to
///   match every child unconditionally — including nodes that have no name
///   attribute, which no other pattern can match.
///
/// Both variants match against the complete name, never a substring.
///
/// # Examples
///
/// ```rust
/// use girscope::metadata::Glob;
///
/// let glob = Glob::structural("get_*")?;
/// assert!(glob.matches(Some("get_value")));
/// assert!(!glob.matches(Some("set_value")));
///
/// let every = Glob::metadata("*")?;
/// assert!(every.matches(None));
/// # Ok::<(), girscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub enum Glob {
    /// Pattern compiled to a regular expression.
    Compiled(Regex),
    /// The metadata-DSL bare `*`: matches everything, even nameless nodes.
    MatchAll,
    /// Matches nothing. Substituted for patterns that failed to compile,
    /// after the failure has been reported.
    Never,
}

impl Glob {
    /// Compile a POSIX-shell-style glob pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGlob`] when the translated pattern is not a
    /// valid regular expression (for example an unterminated character
    /// class). Callers in the rule engine report this and substitute
    /// [`Glob::Never`].
    pub fn structural(pattern: &str) -> Result<Glob> {
        Self::compile(pattern, &convert_glob_to_regex(pattern))
    }

    /// Compile a metadata-DSL pattern.
    ///
    /// Only `*` is rewritten (to a non-greedy `.*?`); all other characters
    /// are passed to the regex engine as-is, intentionally keeping matches
    /// as narrow as the rule author wrote them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGlob`] when the pattern is not a valid
    /// regular expression after the rewrite.
    pub fn metadata(pattern: &str) -> Result<Glob> {
        if pattern == "*" {
            return Ok(Glob::MatchAll);
        }
        Self::compile(pattern, &pattern.replace('*', ".*?"))
    }

    /// A matcher that never matches.
    #[must_use]
    pub fn never() -> Glob {
        Glob::Never
    }

    fn compile(pattern: &str, regex: &str) -> Result<Glob> {
        match Regex::new(&format!("^(?:{regex})$")) {
            Ok(compiled) => Ok(Glob::Compiled(compiled)),
            Err(source) => Err(Error::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            }),
        }
    }

    /// Test a node name against this matcher.
    ///
    /// A node without a name never matches, except under [`Glob::MatchAll`].
    #[must_use]
    pub fn matches(&self, name: Option<&str>) -> bool {
        match self {
            Glob::Compiled(regex) => name.is_some_and(|n| regex.is_match(n)),
            Glob::MatchAll => true,
            Glob::Never => false,
        }
    }
}

/// Converts a standard POSIX Shell globbing pattern into a regular
/// expression pattern: `*` becomes `.*`, `?` becomes `.`, character classes
/// pass through (with `!` negation rewritten to `^`), brace groups become
/// alternations, and regex metacharacters outside classes and groups are
/// escaped.
fn convert_glob_to_regex(pattern: &str) -> String {
    let mut sb = String::with_capacity(pattern.len());
    let mut in_group = 0u32;
    let mut in_class = 0u32;
    let mut first_index_in_class = usize::MAX;
    let arr: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < arr.len() {
        let ch = arr[i];
        match ch {
            '\\' => {
                i += 1;
                if i >= arr.len() {
                    sb.push('\\');
                } else {
                    let next = arr[i];
                    match next {
                        // escape not needed
                        ',' => {}
                        // extra escape needed: \Q and \E have no meaning here
                        'Q' | 'E' => {
                            sb.push('\\');
                            sb.push('\\');
                        }
                        _ => sb.push('\\'),
                    }
                    sb.push(next);
                }
            }
            '*' => {
                if in_class == 0 {
                    sb.push_str(".*");
                } else {
                    sb.push('*');
                }
            }
            '?' => {
                if in_class == 0 {
                    sb.push('.');
                } else {
                    sb.push('?');
                }
            }
            '[' => {
                in_class += 1;
                first_index_in_class = i + 1;
                sb.push('[');
            }
            ']' => {
                in_class = in_class.saturating_sub(1);
                sb.push(']');
            }
            '.' | '(' | ')' | '+' | '|' | '^' | '$' | '@' | '%' => {
                if in_class == 0 || (first_index_in_class == i && ch == '^') {
                    sb.push('\\');
                }
                sb.push(ch);
            }
            '!' => {
                if first_index_in_class == i {
                    sb.push('^');
                } else {
                    sb.push('!');
                }
            }
            '{' => {
                in_group += 1;
                sb.push('(');
            }
            '}' => {
                in_group = in_group.saturating_sub(1);
                sb.push(')');
            }
            ',' => {
                if in_group > 0 {
                    sb.push('|');
                } else {
                    sb.push(',');
                }
            }
            _ => sb.push(ch),
        }
        i += 1;
    }
    sb
}
