//! Natural (digit-aware) ordering of names: `sig2` sorts before `sig10`.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex_lite::Regex;

fn runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"\d+|\D+").expect("static pattern"))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Run<'a> {
    // Digits compare by magnitude: significant length first, then text.
    Number(usize, &'a str),
    Text(&'a str),
}

fn key(name: &str) -> Vec<Run<'_>> {
    runs()
        .find_iter(name)
        .map(|m| {
            let s = m.as_str();
            if s.as_bytes()[0].is_ascii_digit() {
                let trimmed = s.trim_start_matches('0');
                Run::Number(trimmed.len(), trimmed)
            } else {
                Run::Text(s)
            }
        })
        .collect()
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// Sort `names` naturally, in place.
pub fn sort_naturally<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_runs_numeric() {
        let mut keys = vec!["sig2", "sig10", "sig1"];
        sort_naturally(&mut keys);
        assert_eq!(keys, vec!["sig1", "sig2", "sig10"]);
    }

    #[test]
    fn test_leading_zeros_and_ties() {
        let mut keys = vec!["a010", "a9", "a10"];
        sort_naturally(&mut keys);
        assert_eq!(keys, vec!["a9", "a010", "a10"]);
    }

    #[test]
    fn test_numbers_before_text() {
        assert_eq!(natural_cmp("1x", "x1"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_huge_numbers() {
        assert_eq!(
            natural_cmp("n99999999999999999999999", "n100000000000000000000000"),
            Ordering::Less
        );
    }
}
