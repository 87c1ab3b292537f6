//! Key Pattern Matching
//!
//! Glob patterns used by [`Engine::get_by_pattern`](super::Engine::get_by_pattern).
//!
//! - `*` matches any sequence of characters (including none)
//! - `?` matches exactly one character
//! - every other character matches itself
//!
//! Matching is anchored: the pattern must cover the whole key, so `user:*`
//! matches `user:1` but not `admin:user:1`.

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Any,
    One,
    Literal(char),
}

impl GlobPattern {
    /// Compiles a glob pattern. Consecutive `*` collapse into one.
    pub fn new(pattern: &str) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        for c in pattern.chars() {
            let token = match c {
                '*' => Token::Any,
                '?' => Token::One,
                c => Token::Literal(c),
            };
            if token == Token::Any && tokens.last() == Some(&Token::Any) {
                continue;
            }
            tokens.push(token);
        }
        Self { tokens }
    }

    /// Returns true if the whole of `text` matches the pattern.
    ///
    /// Greedy two-pointer match with backtracking to the last `*`, linear in
    /// practice and never recursive.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut p, mut t) = (0usize, 0usize);
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::One) => {
                    p += 1;
                    t += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                Some(Token::Any) => {
                    star = Some((p, t));
                    p += 1;
                }
                _ => match star {
                    Some((sp, st)) => {
                        // Let the last `*` swallow one more character
                        p = sp + 1;
                        t = st + 1;
                        star = Some((sp, st + 1));
                    }
                    None => return false,
                },
            }
        }

        self.tokens[p..].iter().all(|t| *t == Token::Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_pattern() {
        let pattern = GlobPattern::new("h*llo");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hallo"));
        assert!(pattern.matches("hllo"));
        assert!(pattern.matches("heeeello"));
        assert!(!pattern.matches("world"));

        let pattern = GlobPattern::new("h?llo");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hallo"));
        assert!(!pattern.matches("hllo"));
        assert!(!pattern.matches("heello"));

        let pattern = GlobPattern::new("*");
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything"));
    }

    #[test]
    fn test_anchored() {
        let pattern = GlobPattern::new("user:*");
        assert!(pattern.matches("user:1"));
        assert!(pattern.matches("user:"));
        assert!(!pattern.matches("admin:user:1"));
        assert!(!pattern.matches("post:1"));

        let pattern = GlobPattern::new("post:1");
        assert!(pattern.matches("post:1"));
        assert!(!pattern.matches("post:10"));
        assert!(!pattern.matches("xpost:1"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = GlobPattern::new("a.b[1]+");
        assert!(pattern.matches("a.b[1]+"));
        assert!(!pattern.matches("axb1"));
    }

    #[test]
    fn test_multibyte_characters() {
        let pattern = GlobPattern::new("caf?");
        assert!(pattern.matches("café"));
        assert!(!pattern.matches("cafés"));

        let pattern = GlobPattern::new("*é*");
        assert!(pattern.matches("résumé"));
    }

    #[test]
    fn test_backtracking() {
        let pattern = GlobPattern::new("*a*b*c");
        assert!(pattern.matches("xxaxxbxxc"));
        assert!(pattern.matches("abcabc"));
        assert!(!pattern.matches("abcab"));

        let pattern = GlobPattern::new("**?");
        assert!(pattern.matches("x"));
        assert!(!pattern.matches(""));
    }
}
