//! Regular-expression leaves and random string generation from them.

use rand::Rng;
use regex::{Regex, RegexBuilder};
use regex_syntax::hir::{Class, ClassBytes, ClassBytesRange, ClassUnicode, ClassUnicodeRange, Hir, HirKind};
use regex_syntax::ParserBuilder;
use std::fmt;
use thiserror::Error;

/// Upper bound on extra repetitions generated for `*`, `+` and `{n,}`.
pub const MAX_UNBOUNDED_REPEAT: u32 = 10;

/// Why a `/source/flags` literal could not become a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("invalid regex flags: {0:?}")]
    InvalidFlags(String),
    #[error("invalid regex: {0}")]
    Syntax(String),
}

/// A regular expression embedded in a template.
///
/// Holds the source text and flags as written, plus the parsed HIR used to
/// generate matching strings. Equality only considers source and flags.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    regex: Regex,
    hir: Hir,
}

impl Pattern {
    /// Compile a pattern from its body and JavaScript-style flags.
    ///
    /// Flags come from `g i m s u y`, each at most once. `i`, `m` and `s`
    /// change matching; the others are accepted and ignored.
    pub fn new(source: &str, flags: &str) -> Result<Self, PatternError> {
        let mut seen = String::new();
        for flag in flags.chars() {
            if !"gimsuy".contains(flag) || seen.contains(flag) {
                return Err(PatternError::InvalidFlags(flags.to_string()));
            }
            seen.push(flag);
        }

        let case_insensitive = flags.contains('i');
        let multi_line = flags.contains('m');
        let dot_all = flags.contains('s');

        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .multi_line(multi_line)
            .dot_matches_new_line(dot_all)
            .build()
            .map_err(|e| PatternError::Syntax(e.to_string()))?;

        let hir = ParserBuilder::new()
            .case_insensitive(case_insensitive)
            .multi_line(multi_line)
            .dot_matches_new_line(dot_all)
            .build()
            .parse(source)
            .map_err(|e| PatternError::Syntax(e.to_string()))?;

        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
            hir,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// The literal form, `/source/flags`.
    pub fn literal(&self) -> String {
        format!("/{}/{}", self.source, self.flags)
    }

    /// Test a string against the pattern (unanchored, like `RegExp.test`).
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The pattern with its source concatenated `count` times.
    ///
    /// Returns `None` when the concatenation is not a valid expression
    /// (e.g. a source ending in an unterminated construct).
    pub fn repeated(&self, count: usize) -> Option<Pattern> {
        Pattern::new(&self.source.repeat(count), &self.flags).ok()
    }

    /// Generate one string matching the pattern.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> String {
        let mut out = String::new();
        generate(&self.hir, rng, &mut out);
        out
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .finish()
    }
}

fn generate<R: Rng>(hir: &Hir, rng: &mut R, out: &mut String) {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {}
        HirKind::Literal(literal) => out.push_str(&String::from_utf8_lossy(&literal.0)),
        HirKind::Class(Class::Unicode(class)) => {
            if let Some(ch) = pick_char(class, rng) {
                out.push(ch);
            }
        }
        HirKind::Class(Class::Bytes(class)) => {
            if let Some(byte) = pick_byte(class, rng) {
                out.push(char::from(byte));
            }
        }
        HirKind::Repetition(rep) => {
            let max = rep
                .max
                .unwrap_or_else(|| rep.min.saturating_add(MAX_UNBOUNDED_REPEAT))
                .max(rep.min);
            let times = rng.gen_range(rep.min..=max);
            for _ in 0..times {
                generate(&rep.sub, rng, out);
            }
        }
        HirKind::Capture(capture) => generate(&capture.sub, rng, out),
        HirKind::Concat(parts) => {
            for part in parts {
                generate(part, rng, out);
            }
        }
        HirKind::Alternation(branches) => {
            if !branches.is_empty() {
                let idx = rng.gen_range(0..branches.len());
                generate(&branches[idx], rng, out);
            }
        }
    }
}

/// Pick a character from a class, preferring printable ASCII members so
/// that `.` or `\w` do not produce arbitrary Unicode.
fn pick_char<R: Rng>(class: &ClassUnicode, rng: &mut R) -> Option<char> {
    let mut printable = ClassUnicode::new([ClassUnicodeRange::new(' ', '~')]);
    printable.intersect(class);
    let pool = if printable.ranges().is_empty() {
        class
    } else {
        &printable
    };

    let total: u64 = pool
        .ranges()
        .iter()
        .map(|r| u64::from(r.end() as u32 - r.start() as u32) + 1)
        .sum();
    if total == 0 {
        return None;
    }

    let mut offset = rng.gen_range(0..total);
    for range in pool.ranges() {
        let size = u64::from(range.end() as u32 - range.start() as u32) + 1;
        if offset < size {
            let code = range.start() as u32 + offset as u32;
            return Some(char::from_u32(code).unwrap_or(range.start()));
        }
        offset -= size;
    }
    None
}

fn pick_byte<R: Rng>(class: &ClassBytes, rng: &mut R) -> Option<u8> {
    let mut printable = ClassBytes::new([ClassBytesRange::new(b' ', b'~')]);
    printable.intersect(class);
    let pool = if printable.ranges().is_empty() {
        class
    } else {
        &printable
    };

    let candidates: Vec<u8> = pool
        .ranges()
        .iter()
        .flat_map(|r| r.start()..=r.end())
        .filter(|b| b.is_ascii())
        .collect();
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_samples_match(pattern: &Pattern) {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let sample = pattern.sample(&mut rng);
            assert!(
                pattern.is_match(&sample),
                "{:?} produced non-matching sample {:?}",
                pattern,
                sample
            );
        }
    }

    #[test]
    fn test_sample_digits_anchored() {
        let pattern = Pattern::new(r"^\d{3}$", "").unwrap();
        let full = Regex::new(r"^[0-9]{3}$").unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert!(full.is_match(&pattern.sample(&mut rng)));
        }
    }

    #[test]
    fn test_sample_phone_number() {
        let pattern = Pattern::new(r"^1[3-9]\d{9}$", "").unwrap();
        assert_samples_match(&pattern);
        let mut rng = rand::thread_rng();
        assert_eq!(pattern.sample(&mut rng).len(), 11);
    }

    #[test]
    fn test_sample_alternation_and_groups() {
        assert_samples_match(&Pattern::new(r"^(cat|dog)-[a-f0-9]{4,8}$", "").unwrap());
        assert_samples_match(&Pattern::new(r"^\w+@\w+\.(com|org)$", "").unwrap());
    }

    #[test]
    fn test_unbounded_repetition_is_capped() {
        let pattern = Pattern::new("^a*b+$", "").unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let sample = pattern.sample(&mut rng);
            assert!(sample.len() <= (MAX_UNBOUNDED_REPEAT * 2 + 1) as usize);
            assert!(pattern.is_match(&sample));
        }
    }

    #[test]
    fn test_case_insensitive_flag() {
        let pattern = Pattern::new("^abc$", "i").unwrap();
        assert!(pattern.is_match("ABC"));
        assert_samples_match(&pattern);
    }

    #[test]
    fn test_flags_validation() {
        assert!(Pattern::new("a", "gimsuy").is_ok());
        assert!(matches!(
            Pattern::new("a", "gg"),
            Err(PatternError::InvalidFlags(_))
        ));
        assert!(matches!(
            Pattern::new("a", "x"),
            Err(PatternError::InvalidFlags(_))
        ));
    }

    #[test]
    fn test_invalid_source() {
        assert!(matches!(Pattern::new("[", ""), Err(PatternError::Syntax(_))));
        assert!(matches!(Pattern::new("(a", ""), Err(PatternError::Syntax(_))));
    }

    #[test]
    fn test_repeated() {
        let pattern = Pattern::new("[a-z]", "").unwrap();
        let tripled = pattern.repeated(3).unwrap();
        assert_eq!(tripled.source(), "[a-z][a-z][a-z]");

        let mut rng = rand::thread_rng();
        assert_eq!(tripled.sample(&mut rng).len(), 3);
    }

    #[test]
    fn test_literal_and_equality() {
        let a = Pattern::new(r"\d+", "g").unwrap();
        let b = Pattern::new(r"\d+", "g").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.literal(), r"/\d+/g");
        assert_ne!(a, Pattern::new(r"\d+", "").unwrap());
    }
}
