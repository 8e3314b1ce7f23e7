//! Rule catalog and transform descriptors
//!
//! A descriptor string is a sequence of underscore-separated tokens of the
//! form `RULE@p1,p2,...`, applied left to right:
//!
//! ```text
//! LF@6_LF@4        level-flatten row 6, then row 4
//! _SH@3,3,5        a leading underscore is accepted
//! ```

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Closed catalog of rewrite rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    /// `X∘(A∘B)` to `(X∘A)∘B`: lower depth, higher fan-out
    LevelFlatten,
    /// `(X∘A)∘B` to `X∘(A∘B)` reusing an existing `A∘B`: lower fan-out, higher depth
    FanExpand,
    /// Split a node's fan-out with a buffer
    BufferInsert,
    /// Remove a buffer
    BufferRemove,
    /// Move a node to another column
    ColumnShift,
}

impl Rule {
    /// Every rule in the catalog
    pub const ALL: [Rule; 5] = [
        Rule::LevelFlatten,
        Rule::FanExpand,
        Rule::BufferInsert,
        Rule::BufferRemove,
        Rule::ColumnShift,
    ];

    /// Short token used in descriptor strings
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Rule::LevelFlatten => "LF",
            Rule::FanExpand => "FL",
            Rule::BufferInsert => "BI",
            Rule::BufferRemove => "BR",
            Rule::ColumnShift => "SH",
        }
    }

    /// Long name of this rule
    pub fn name(&self) -> &'static str {
        match self {
            Rule::LevelFlatten => "level-flatten",
            Rule::FanExpand => "fan-expand",
            Rule::BufferInsert => "buffer-insert",
            Rule::BufferRemove => "buffer-remove",
            Rule::ColumnShift => "column-shift",
        }
    }

    /// Accepted number of parameters
    pub fn arity(&self) -> RangeInclusive<usize> {
        match self {
            Rule::LevelFlatten | Rule::FanExpand => 1..=2,
            Rule::BufferInsert => 2..=3,
            Rule::BufferRemove => 2..=2,
            Rule::ColumnShift => 3..=3,
        }
    }

    /// The rule that undoes this one
    pub fn inverse(&self) -> Rule {
        match self {
            Rule::LevelFlatten => Rule::FanExpand,
            Rule::FanExpand => Rule::LevelFlatten,
            Rule::BufferInsert => Rule::BufferRemove,
            Rule::BufferRemove => Rule::BufferInsert,
            Rule::ColumnShift => Rule::ColumnShift,
        }
    }

    /// Look up a rule by mnemonic or long name
    pub fn lookup(name: &str) -> Option<Rule> {
        let name = name.trim();
        Rule::ALL.into_iter().find(|rule| {
            rule.mnemonic().eq_ignore_ascii_case(name) || rule.name().eq_ignore_ascii_case(name)
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One rewrite request: a rule and its integer parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformDescriptor {
    pub rule: Rule,
    pub params: Vec<i64>,
}

impl TransformDescriptor {
    /// Create a new descriptor
    pub fn new(rule: Rule, params: Vec<i64>) -> Self {
        Self { rule, params }
    }

    /// Parse a single `RULE@p1,p2` token
    ///
    /// `position` is only used to label errors.
    pub fn parse_token(token: &str, position: usize) -> Result<Self, ParseError> {
        let token = token.trim();
        let (name, params) = match token.split_once('@') {
            Some((name, params)) => (name, Some(params)),
            None => (token, None),
        };
        let rule = Rule::lookup(name).ok_or_else(|| ParseError::UnknownRule {
            position,
            name: name.to_string(),
        })?;
        let malformed = |reason: String| ParseError::Malformed {
            position,
            token: token.to_string(),
            reason,
        };
        let params = params.ok_or_else(|| malformed("missing '@' before parameters".into()))?;
        let params = params
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<i64>()
                    .map_err(|_| malformed(format!("parameter '{}' is not an integer", p)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rule, params })
    }

    /// Parse a whole descriptor string
    ///
    /// Every token is checked before anything is returned, so an unknown rule
    /// anywhere in the string fails the whole sequence.
    pub fn parse_sequence(s: &str) -> Result<Vec<Self>, ParseError> {
        s.split('_')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .enumerate()
            .map(|(position, token)| Self::parse_token(token, position))
            .collect()
    }
}

impl fmt::Display for TransformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}@{}", self.rule.mnemonic(), params.join(","))
    }
}

/// Render a sequence back into descriptor-string form
pub fn format_sequence(descriptors: &[TransformDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence() {
        let seq = TransformDescriptor::parse_sequence("LF@6_LF@4").unwrap();
        assert_eq!(
            seq,
            vec![
                TransformDescriptor::new(Rule::LevelFlatten, vec![6]),
                TransformDescriptor::new(Rule::LevelFlatten, vec![4]),
            ]
        );
        assert_eq!(format_sequence(&seq), "LF@6_LF@4");
    }

    #[test]
    fn test_leading_underscore_and_empty() {
        assert_eq!(TransformDescriptor::parse_sequence("").unwrap(), vec![]);
        let seq = TransformDescriptor::parse_sequence("_SH@3,3,5").unwrap();
        assert_eq!(seq[0].rule, Rule::ColumnShift);
        assert_eq!(seq[0].params, vec![3, 3, 5]);
    }

    #[test]
    fn test_long_names() {
        let seq = TransformDescriptor::parse_sequence("fan-expand@7,5").unwrap();
        assert_eq!(seq[0].rule, Rule::FanExpand);
    }

    #[test]
    fn test_unknown_rule_reports_position() {
        let err = TransformDescriptor::parse_sequence("LF@6_XX@4").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownRule {
                position: 1,
                name: "XX".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            TransformDescriptor::parse_sequence("LF"),
            Err(ParseError::Malformed { position: 0, .. })
        ));
        assert!(matches!(
            TransformDescriptor::parse_sequence("LF@6_BI@x,2"),
            Err(ParseError::Malformed { position: 1, .. })
        ));
    }

    #[test]
    fn test_inverse_pairs() {
        for rule in Rule::ALL {
            assert_eq!(rule.inverse().inverse(), rule);
        }
    }
}
