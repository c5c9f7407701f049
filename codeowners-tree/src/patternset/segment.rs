use memchr::memmem;

use crate::error::PatternError;

/// Matches a single path segment (the text between two slashes) against one
/// segment of a glob, ignoring case. Most segments in real CODEOWNERS files
/// are literals or have a single leading or trailing star, so those get a
/// fast path and only the rest are compiled to a regex. Fast-path literals
/// are ASCII and stored lowercase.
#[derive(Debug, Clone)]
pub(crate) enum SegmentMatcher {
    Unconditional,
    Literal(String),
    Prefix(String),
    Suffix(String),
    Contains(memmem::Finder<'static>),
    Regex(regex::Regex),
}

impl SegmentMatcher {
    /// Compile a glob segment. `pattern` is the full pattern, only used for
    /// error messages.
    pub(crate) fn new(glob: &str, pattern: &str) -> Result<Self, PatternError> {
        let tokens = tokenize(glob, pattern)?;

        let leading_star = matches!(tokens.first(), Some(Token::Star));
        let trailing_star = tokens.len() > 1 && matches!(tokens.last(), Some(Token::Star));
        let inner = &tokens[leading_star as usize..tokens.len() - trailing_star as usize];

        if inner.is_empty() && leading_star {
            return Ok(Self::Unconditional);
        }

        // Case folding beyond ASCII is left to the regex engine
        let literal = inner
            .iter()
            .map(|t| match t {
                Token::Char(c) if c.is_ascii() => Some(c.to_ascii_lowercase()),
                _ => None,
            })
            .collect::<Option<String>>();

        Ok(match (leading_star, trailing_star, literal) {
            (false, false, Some(literal)) => Self::Literal(literal),
            (false, true, Some(literal)) => Self::Prefix(literal),
            (true, false, Some(literal)) => Self::Suffix(literal),
            (true, true, Some(literal)) => {
                Self::Contains(memmem::Finder::new(literal.as_bytes()).into_owned())
            }
            _ => Self::Regex(tokens_to_regex(&tokens, pattern)?),
        })
    }

    pub(crate) fn is_match(&self, candidate: &str) -> bool {
        match self {
            Self::Unconditional => true,
            Self::Literal(literal) => candidate.eq_ignore_ascii_case(literal),
            Self::Prefix(prefix) => candidate
                .as_bytes()
                .get(..prefix.len())
                .map_or(false, |head| head.eq_ignore_ascii_case(prefix.as_bytes())),
            Self::Suffix(suffix) => candidate
                .len()
                .checked_sub(suffix.len())
                .map_or(false, |start| {
                    candidate.as_bytes()[start..].eq_ignore_ascii_case(suffix.as_bytes())
                }),
            Self::Contains(finder) => {
                let candidate = candidate.to_ascii_lowercase();
                finder.find(candidate.as_bytes()).is_some()
            }
            Self::Regex(re) => re.is_match(candidate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Char(char),
    Star,
    Question,
    // Already translated to the body of a regex character class
    Class(String),
}

fn tokenize(glob: &str, pattern: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens = Vec::new();
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => tokens.push(Token::Char(escaped)),
                // A trailing backslash can't escape anything, gitignore drops it
                None => break,
            },
            // Runs of stars inside a segment behave like a single star
            '*' => {
                if tokens.last() != Some(&Token::Star) {
                    tokens.push(Token::Star);
                }
            }
            '?' => tokens.push(Token::Question),
            '[' => tokens.push(Token::Class(parse_class(&mut chars, pattern)?)),
            _ => tokens.push(Token::Char(c)),
        }
    }
    Ok(tokens)
}

// Consumes a bracket expression up to and including its closing `]`,
// returning it as a regex character class body.
fn parse_class(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    pattern: &str,
) -> Result<String, PatternError> {
    let mut class = String::new();
    if let Some('!' | '^') = chars.peek() {
        chars.next();
        class.push('^');
    }

    let mut first = true;
    loop {
        let c = chars
            .next()
            .ok_or_else(|| PatternError::UnclosedClass(pattern.to_owned()))?;
        match c {
            // A `]` right after the opening bracket is a literal
            ']' if !first => return Ok(class),
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| PatternError::UnclosedClass(pattern.to_owned()))?;
                push_escaped(&mut class, escaped);
            }
            '-' if !first && chars.peek().map_or(false, |&next| next != ']') => class.push('-'),
            _ => push_escaped(&mut class, c),
        }
        first = false;
    }
}

fn push_escaped(regex: &mut String, c: char) {
    if regex_syntax::is_meta_character(c) {
        regex.push('\\');
    }
    regex.push(c);
}

fn tokens_to_regex(tokens: &[Token], pattern: &str) -> Result<regex::Regex, PatternError> {
    let mut regex = String::with_capacity(tokens.len() * 2 + 4);
    regex.push_str(r#"\A"#);
    for token in tokens {
        match token {
            Token::Char(c) => push_escaped(&mut regex, *c),
            Token::Star => regex.push_str(r#"[^/]*"#),
            Token::Question => regex.push_str(r#"[^/]"#),
            Token::Class(class) => {
                regex.push('[');
                regex.push_str(class);
                regex.push(']');
            }
        }
    }
    regex.push_str(r#"\z"#);
    regex::RegexBuilder::new(&regex)
        .case_insensitive(true)
        .build()
        .map_err(|err| PatternError::Regex {
            pattern: pattern.to_owned(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(glob: &str) -> SegmentMatcher {
        SegmentMatcher::new(glob, glob).unwrap()
    }

    #[test]
    fn test_fast_paths() {
        assert!(matches!(matcher("*"), SegmentMatcher::Unconditional));
        assert!(matches!(matcher("***"), SegmentMatcher::Unconditional));
        assert!(matches!(matcher("foo"), SegmentMatcher::Literal(_)));
        assert!(matches!(matcher("foo*"), SegmentMatcher::Prefix(_)));
        assert!(matches!(matcher("*.rs"), SegmentMatcher::Suffix(_)));
        assert!(matches!(matcher("*test*"), SegmentMatcher::Contains(_)));
        assert!(matches!(matcher("f*o"), SegmentMatcher::Regex(_)));
        assert!(matches!(matcher("\\*"), SegmentMatcher::Literal(_)));
        assert!(matches!(matcher("Ä"), SegmentMatcher::Regex(_)));
    }

    #[test]
    fn test_segment_matching() {
        let examples = [
            ("foo", "foo", true),
            ("foo", "foobar", false),
            ("foo*", "foobar", true),
            ("foo*", "barfoo", false),
            ("*.rs", "mod.rs", true),
            ("*.rs", "mod.rsx", false),
            ("*test*", "a_test_b", true),
            ("*test*", "tst", false),
            ("f?o", "foo", true),
            ("f?o", "fo", false),
            ("f*o", "fo", true),
            ("f*o", "fxyzo", true),
            ("*.[ch]", "main.c", true),
            ("*.[ch]", "main.h", true),
            ("*.[ch]", "main.o", false),
            ("[a-c]x", "bx", true),
            ("[a-c]x", "dx", false),
            ("[!a-c]x", "dx", true),
            ("[^a-c]x", "ax", false),
            ("[]]", "]", true),
            ("[a-]", "-", true),
            ("[&&]", "&", true),
            ("f\\*o", "f*o", true),
            ("f\\*o", "foo", false),
            ("a*b\\??", "axb?!", true),
            ("a*b\\??", "axbc!", false),
            ("\\!foo", "!foo", true),
            ("a.b", "axb", false),
            ("*.MD", "README.md", true),
            ("Docs", "docs", true),
            ("src*", "SRC_main", true),
            ("*test*", "A_TEST_b", true),
            ("f?O", "Fxo", true),
            ("[A-C]x", "bX", true),
            ("straße", "STRASSE", false),
            ("Ä*ö", "äxÖ", true),
        ];

        for (glob, candidate, expected) in examples {
            assert_eq!(
                matcher(glob).is_match(candidate),
                expected,
                "expected {:?} matching {:?} to be {}",
                glob,
                candidate,
                expected
            );
        }
    }

    #[test]
    fn test_invalid_segments() {
        assert_eq!(
            SegmentMatcher::new("[abc", "/src/[abc").unwrap_err(),
            PatternError::UnclosedClass("/src/[abc".to_owned())
        );
        assert!(matches!(
            SegmentMatcher::new("[z-a]", "[z-a]").unwrap_err(),
            PatternError::Regex { .. }
        ));
    }
}
