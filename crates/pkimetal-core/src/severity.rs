use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Total order used to sort and filter linting findings. Derived `Ord` relies on
/// declaration order matching `META < DEBUG < INFO < NOTICE < WARNING < ERROR < BUG < FATAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Severity {
    Meta,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Bug,
    Fatal,
}

impl Severity {
    /// Maps the single-letter stdio protocol token (`D`, `I`, `N`, `W`, `E`, `B`, `F`) used by
    /// subprocess engines. `META` is never produced by an engine over this channel; it is only
    /// synthesized by the dispatch core itself.
    pub fn from_token(token: char) -> Option<Self> {
        match token {
            'D' => Some(Severity::Debug),
            'I' => Some(Severity::Info),
            'N' => Some(Severity::Notice),
            'W' => Some(Severity::Warning),
            'E' => Some(Severity::Error),
            'B' => Some(Severity::Bug),
            'F' => Some(Severity::Fatal),
            _ => None,
        }
    }

    /// Maps the severity names used in the JSON engine protocol (`finding_descriptions[].severity`)
    /// and in the `severity` query parameter, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "meta" => Some(Severity::Meta),
            "debug" => Some(Severity::Debug),
            "info" => Some(Severity::Info),
            "notice" => Some(Severity::Notice),
            "warning" | "warn" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "bug" => Some(Severity::Bug),
            "fatal" => Some(Severity::Fatal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Meta => "META",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Bug => "BUG",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares two severities for the merge sort's descending severity key:
/// higher severity sorts first.
pub fn descending(a: Severity, b: Severity) -> Ordering {
    b.cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order_matches_spec() {
        let order = [
            Severity::Meta,
            Severity::Debug,
            Severity::Info,
            Severity::Notice,
            Severity::Warning,
            Severity::Error,
            Severity::Bug,
            Severity::Fatal,
        ];
        for w in order.windows(2) {
            assert!(w[0] < w[1], "{:?} should sort before {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn from_token_covers_all_stdio_letters() {
        assert_eq!(Severity::from_token('D'), Some(Severity::Debug));
        assert_eq!(Severity::from_token('I'), Some(Severity::Info));
        assert_eq!(Severity::from_token('N'), Some(Severity::Notice));
        assert_eq!(Severity::from_token('W'), Some(Severity::Warning));
        assert_eq!(Severity::from_token('E'), Some(Severity::Error));
        assert_eq!(Severity::from_token('B'), Some(Severity::Bug));
        assert_eq!(Severity::from_token('F'), Some(Severity::Fatal));
    }

    #[test]
    fn from_token_rejects_meta_and_unknown() {
        assert_eq!(Severity::from_token('M'), None);
        assert_eq!(Severity::from_token('x'), None);
    }

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(Severity::from_name("Warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_name("FATAL"), Some(Severity::Fatal));
        assert_eq!(Severity::from_name("bogus"), None);
    }

    #[test]
    fn descending_orders_fatal_before_meta() {
        assert_eq!(descending(Severity::Fatal, Severity::Meta), Ordering::Less);
        assert_eq!(descending(Severity::Meta, Severity::Fatal), Ordering::Greater);
    }
}
