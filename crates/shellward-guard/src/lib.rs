//! Danger classifier for shell commands.
//!
//! Classification is a pure function over a fixed, ordered rule table:
//! the same command text always yields the same verdict, every matched
//! rule contributes its reason in rule-definition order, and evaluation
//! cost is independent of session history.
//!
//! Matching is lexical (regex on the command text), not a shell-grammar
//! analysis. Quoting and escaping tricks can evade it; that is a stated
//! limitation of this layer, not something deeper parsing here should fix.

pub mod classifier;
pub mod rules;

pub use classifier::RuleSet;
