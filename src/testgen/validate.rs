//! testgen/validate.rs
//!
//! Structural checks on generated test code before anything is compiled.
//! This is a cheap syntactic filter, the compiler stays the authority.

use std::fmt;

use regex::Regex;

use crate::config::TestRequirements;

/// Why a candidate was turned away. Rules are checked in declaration order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RejectReason {
    TooShort { len: usize, min: usize },
    MissingInclude(String),
    MissingTestMacro,
    IncompleteMacroBody,
    WrongTestCount { expected: usize, found: usize },
    MissingSymbol(Vec<String>),
    UnbalancedBraces { balance: i64 },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::TooShort { .. } => "too-short",
            RejectReason::MissingInclude(_) => "missing-include",
            RejectReason::MissingTestMacro => "missing-TEST-macro",
            RejectReason::IncompleteMacroBody => "incomplete-macro-body",
            RejectReason::WrongTestCount { .. } => "wrong-test-count",
            RejectReason::MissingSymbol(_) => "missing-symbol",
            RejectReason::UnbalancedBraces { .. } => "unbalanced-braces",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooShort { len, min } => {
                write!(f, "output too short ({len} bytes, need {min})")
            }
            RejectReason::MissingInclude(inc) => write!(f, "missing {inc}"),
            RejectReason::MissingTestMacro => write!(f, "missing TEST macro"),
            RejectReason::IncompleteMacroBody => write!(f, "incomplete TEST macro detected"),
            RejectReason::WrongTestCount { expected, found } => {
                write!(f, "expected exactly {expected} TEST cases, found {found}")
            }
            RejectReason::MissingSymbol(names) => {
                write!(f, "missing tests for methods: {}", names.join(", "))
            }
            RejectReason::UnbalancedBraces { balance } => {
                write!(f, "unbalanced braces (count: {balance})")
            }
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ValidationVerdict {
    Accepted(String),
    Rejected(RejectReason),
}

impl ValidationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationVerdict::Accepted(_))
    }
}

/// Compiled predicate set for one unit's requirements.
pub struct Validator {
    min_length: usize,
    includes: [String; 4],
    symbols: Vec<String>,
    test_count: usize,
    incomplete: Regex,
    suite_test: Regex,
}

impl Validator {
    pub fn new(req: &TestRequirements, header_name: &str) -> Self {
        // A TEST header whose body runs to end-of-text with no closing brace.
        let incomplete = Regex::new(r"TEST\([^)]+\)\s*\{[^}]*$").unwrap();
        let suite_test =
            Regex::new(&format!(r"TEST\({},", regex::escape(&req.suite_name))).unwrap();

        Self {
            min_length: req.min_length,
            includes: req.required_includes(header_name),
            symbols: req.symbols.clone(),
            test_count: req.test_count,
            incomplete,
            suite_test,
        }
    }

    pub fn validate(&self, text: &str) -> ValidationVerdict {
        match self.first_violation(text) {
            Some(reason) => ValidationVerdict::Rejected(reason),
            None => ValidationVerdict::Accepted(text.to_string()),
        }
    }

    fn first_violation(&self, text: &str) -> Option<RejectReason> {
        if text.len() < self.min_length {
            return Some(RejectReason::TooShort {
                len: text.len(),
                min: self.min_length,
            });
        }

        if let Some(inc) = self.includes.iter().find(|inc| !text.contains(inc.as_str())) {
            return Some(RejectReason::MissingInclude(inc.clone()));
        }

        if !text.contains("TEST") {
            return Some(RejectReason::MissingTestMacro);
        }

        if self.incomplete.is_match(text) {
            return Some(RejectReason::IncompleteMacroBody);
        }

        let found = self.suite_test.find_iter(text).count();
        if found != self.test_count {
            return Some(RejectReason::WrongTestCount {
                expected: self.test_count,
                found,
            });
        }

        let missing: Vec<String> = self
            .symbols
            .iter()
            .filter(|sym| !text.contains(&format!("{sym}(")))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Some(RejectReason::MissingSymbol(missing));
        }

        let balance = brace_balance(text);
        if balance != 0 {
            return Some(RejectReason::UnbalancedBraces { balance });
        }

        None
    }
}

fn brace_balance(text: &str) -> i64 {
    text.chars().fold(0i64, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"#include <gtest/gtest.h>
#include <cmath>
#include <stdexcept>
#include "calc.h"

TEST(CalculatorTest, Add_PositiveNumbers) {
    Calculator calc;
    EXPECT_EQ(calc.add(2, 3), 5);
}

TEST(CalculatorTest, Add_NegativeNumbers) {
    Calculator calc;
    EXPECT_EQ(calc.add(-2, -3), -5);
}

TEST(CalculatorTest, Subtract_PositiveNumbers) {
    Calculator calc;
    EXPECT_EQ(calc.subtract(5, 3), 2);
}

TEST(CalculatorTest, Subtract_NegativeNumbers) {
    Calculator calc;
    EXPECT_EQ(calc.subtract(-5, -3), -2);
}"#;

    fn validator() -> Validator {
        Validator::new(&TestRequirements::default(), "calc.h")
    }

    fn reason(text: &str) -> RejectReason {
        match validator().validate(text) {
            ValidationVerdict::Rejected(r) => r,
            ValidationVerdict::Accepted(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn accepts_reference_output() {
        assert_eq!(
            validator().validate(VALID),
            ValidationVerdict::Accepted(VALID.to_string())
        );
    }

    #[test]
    fn rejects_short_output() {
        assert_eq!(reason("TEST(CalculatorTest, X) {}").code(), "too-short");
    }

    #[test]
    fn each_missing_include_is_reported() {
        for inc in TestRequirements::default().required_includes("calc.h") {
            let mutated = VALID.replace(&inc, "");
            assert_eq!(reason(&mutated), RejectReason::MissingInclude(inc.clone()));
        }
    }

    #[test]
    fn header_include_follows_unit_name() {
        let v = Validator::new(&TestRequirements::default(), "other.h");
        assert_eq!(
            v.validate(VALID),
            ValidationVerdict::Rejected(RejectReason::MissingInclude(
                "#include \"other.h\"".to_string()
            ))
        );
    }

    #[test]
    fn rejects_without_test_macro() {
        let mutated = VALID.replace("TEST", "CASE");
        assert_eq!(reason(&mutated), RejectReason::MissingTestMacro);
    }

    #[test]
    fn truncated_body_is_incomplete() {
        let truncated = format!(
            "{VALID}\n\nTEST(CalculatorTest, Add_Zero) {{\n    Calculator calc;\n    EXPECT_EQ(calc.add(0, 0), 0);"
        );
        assert_eq!(reason(&truncated), RejectReason::IncompleteMacroBody);
    }

    #[test]
    fn test_count_must_be_exact() {
        let extra = format!(
            "{VALID}\n\nTEST(CalculatorTest, Add_Zero) {{\n    EXPECT_EQ(Calculator().add(0, 0), 0);\n}}"
        );
        assert_eq!(
            reason(&extra),
            RejectReason::WrongTestCount {
                expected: 4,
                found: 5
            }
        );

        let other_suite = VALID.replacen("TEST(CalculatorTest,", "TEST(MathTest,", 1);
        assert_eq!(
            reason(&other_suite),
            RejectReason::WrongTestCount {
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn symbols_must_be_invoked() {
        let mutated = VALID.replace("subtract(", "minus(");
        assert_eq!(
            reason(&mutated),
            RejectReason::MissingSymbol(vec!["subtract".to_string()])
        );
    }

    #[test]
    fn unbalanced_braces_rejected_last() {
        let mutated = format!("{VALID}\n}}");
        assert_eq!(reason(&mutated), RejectReason::UnbalancedBraces { balance: -1 });
    }

    #[test]
    fn reason_codes_are_distinct() {
        let codes = [
            RejectReason::TooShort { len: 0, min: 1 }.code(),
            RejectReason::MissingInclude(String::new()).code(),
            RejectReason::MissingTestMacro.code(),
            RejectReason::IncompleteMacroBody.code(),
            RejectReason::WrongTestCount { expected: 0, found: 0 }.code(),
            RejectReason::MissingSymbol(vec![]).code(),
            RejectReason::UnbalancedBraces { balance: 0 }.code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
