//! Matchmaking rules.
//!
//! A start-matchmaking request carries criteria of the form
//! `CRIT { RLST [ { NAME "ME3_gameMapMatchRule", VALU ["map2"] }, .. ] }`.
//! Each known rule name maps to one game attribute key; a rule whose value is
//! [`ABSTAIN`] accepts any attribute value, including a missing one.

use crate::core::label::Label;
use crate::core::tdf::{FieldLookup, TdfGroup, TdfList};
use crate::game::AttributeMap;

/// Wildcard rule value.
pub const ABSTAIN: &str = "abstain";

const RLST: Label = Label::from_static("RLST");
const NAME: Label = Label::from_static("NAME");
const VALU: Label = Label::from_static("VALU");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    Map,
    EnemyType,
    Difficulty,
}

impl RuleKind {
    pub const ALL: [RuleKind; 3] = [RuleKind::Map, RuleKind::EnemyType, RuleKind::Difficulty];

    /// Name the client sends in the criteria list.
    pub const fn rule_name(self) -> &'static str {
        match self {
            RuleKind::Map => "ME3_gameMapMatchRule",
            RuleKind::EnemyType => "ME3_gameEnemyTypeRule",
            RuleKind::Difficulty => "ME3_gameDifficultyRule",
        }
    }

    /// Game attribute the rule is checked against.
    pub const fn attribute(self) -> &'static str {
        match self {
            RuleKind::Map => "ME3map",
            RuleKind::EnemyType => "ME3gameEnemyType",
            RuleKind::Difficulty => "ME3gameDifficulty",
        }
    }

    pub fn from_rule_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.rule_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    pub value: String,
}

impl Rule {
    pub fn is_abstain(&self) -> bool {
        self.value.eq_ignore_ascii_case(ABSTAIN)
    }

    pub fn matches(&self, attributes: &AttributeMap) -> bool {
        self.is_abstain()
            || attributes
                .get(self.kind.attribute())
                .is_some_and(|v| *v == self.value)
    }
}

/// Immutable set of rules, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build from `(rule name, value)` pairs. Unknown names are skipped and a
    /// later pair for the same kind replaces an earlier one.
    pub fn new<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<String>,
    {
        let mut rules: Vec<Rule> = Vec::new();
        for (name, value) in pairs {
            let Some(kind) = RuleKind::from_rule_name(name.as_ref()) else {
                continue;
            };
            let rule = Rule {
                kind,
                value: value.into(),
            };
            match rules.iter_mut().find(|r| r.kind == kind) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
        }
        rules.sort_by_key(|r| r.kind);
        Self { rules }
    }

    /// Every known rule set to the wildcard.
    pub fn abstain_all() -> Self {
        Self::new(RuleKind::ALL.map(|kind| (kind.rule_name(), ABSTAIN)))
    }

    /// Read the `RLST` list out of a criteria group. Only the first value of
    /// each rule's `VALU` list is used.
    pub fn from_criteria(criteria: &TdfGroup) -> Self {
        let Some(TdfList::Group(entries)) = criteria.field(RLST).and_then(|t| t.as_list()) else {
            return Self::default();
        };
        Self::new(entries.iter().filter_map(|entry| {
            let name = entry.str_field(NAME)?;
            let value = match entry.field(VALU).and_then(|t| t.as_list()) {
                Some(TdfList::String(values)) => values.first()?.clone(),
                _ => return None,
            };
            Some((name.to_string(), value))
        }))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules satisfied by `attributes`. An empty set matches everything.
    pub fn matches(&self, attributes: &AttributeMap) -> bool {
        self.rules.iter().all(|rule| rule.matches(attributes))
    }
}
