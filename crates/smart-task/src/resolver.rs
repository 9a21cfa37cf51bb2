//! Fuzzy entity resolution for free-text references.
//!
//! Names (users, projects, statuses, priorities) are scored against an
//! ordered rule table; the first rule whose predicate holds fixes the
//! candidate's score. Task titles use a separate word-overlap scorer because
//! users paraphrase titles rather than abbreviate them.

use std::cmp::Ordering;

use db::models::{
    client::Client,
    priority::Priority,
    project::Project,
    status::Status,
    user::{Role, UserSummary},
};
use utils::text::{normalize, words};

/// Something a free-text name can refer to.
pub trait Named {
    /// First name for people, title for everything else.
    fn primary(&self) -> String;
    fn composite(&self) -> String {
        self.primary()
    }
    fn secondary(&self) -> Option<String> {
        None
    }
    fn is_admin(&self) -> bool {
        false
    }
}

impl Named for UserSummary {
    fn primary(&self) -> String {
        self.first_name.clone()
    }

    fn composite(&self) -> String {
        self.full_name()
    }

    fn secondary(&self) -> Option<String> {
        self.last_name.clone()
    }

    fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

impl Named for Client {
    fn primary(&self) -> String {
        self.first_name.clone()
    }

    fn composite(&self) -> String {
        self.full_name()
    }

    fn secondary(&self) -> Option<String> {
        self.last_name.clone()
    }
}

impl Named for Project {
    fn primary(&self) -> String {
        self.title.clone()
    }
}

impl Named for Status {
    fn primary(&self) -> String {
        self.title.clone()
    }

    fn secondary(&self) -> Option<String> {
        Some(self.slug.clone())
    }
}

impl Named for Priority {
    fn primary(&self) -> String {
        self.title.clone()
    }

    fn secondary(&self) -> Option<String> {
        Some(self.slug.clone())
    }
}

/// Normalised fields of one candidate, computed once per scoring pass.
#[derive(Debug, Clone)]
pub struct NameFields {
    pub query: String,
    pub primary: String,
    pub composite: String,
    pub secondary: Option<String>,
    pub is_admin: bool,
}

impl NameFields {
    fn new<T: Named>(query: &str, candidate: &T) -> Self {
        Self {
            query: normalize(query),
            primary: normalize(&candidate.primary()),
            composite: normalize(&candidate.composite()),
            secondary: candidate.secondary().map(|s| normalize(&s)),
            is_admin: candidate.is_admin(),
        }
    }
}

/// One row of the scoring table.
pub struct ScoreRule {
    pub name: &'static str,
    pub score: u32,
    pub predicate: fn(&NameFields) -> bool,
    pub adjustment: fn(&NameFields) -> u32,
}

fn no_adjustment(_: &NameFields) -> u32 {
    0
}

fn admin_bonus(fields: &NameFields) -> u32 {
    if fields.is_admin { ADMIN_BONUS } else { 0 }
}

pub const ADMIN_BONUS: u32 = 10;

/// Evaluated top-down; first match wins.
pub const NAME_RULES: &[ScoreRule] = &[
    ScoreRule {
        name: "primary_exact",
        score: 100,
        predicate: |f| f.primary == f.query,
        adjustment: admin_bonus,
    },
    ScoreRule {
        name: "composite_exact",
        score: 90,
        predicate: |f| f.composite == f.query,
        adjustment: no_adjustment,
    },
    ScoreRule {
        name: "primary_prefix",
        score: 80,
        predicate: |f| f.primary.starts_with(&f.query),
        adjustment: no_adjustment,
    },
    ScoreRule {
        name: "composite_prefix",
        score: 70,
        predicate: |f| f.composite.starts_with(&f.query),
        adjustment: no_adjustment,
    },
    ScoreRule {
        name: "primary_contains",
        score: 60,
        predicate: |f| f.primary.contains(&f.query),
        adjustment: no_adjustment,
    },
    ScoreRule {
        name: "composite_contains",
        score: 50,
        predicate: |f| f.composite.contains(&f.query),
        adjustment: no_adjustment,
    },
    ScoreRule {
        name: "secondary_contains",
        score: 40,
        predicate: |f| f.secondary.as_deref().is_some_and(|s| s.contains(&f.query)),
        adjustment: no_adjustment,
    },
];

#[derive(Debug, Clone)]
pub struct Scored<'a, T, S> {
    pub candidate: &'a T,
    pub score: S,
}

/// Score one candidate, or `None` when no rule matches.
pub fn score_name<T: Named>(query: &str, candidate: &T) -> Option<u32> {
    let fields = NameFields::new(query, candidate);
    if fields.query.is_empty() {
        return None;
    }
    NAME_RULES
        .iter()
        .find(|rule| (rule.predicate)(&fields))
        .map(|rule| rule.score + (rule.adjustment)(&fields))
}

/// All matching candidates, best first. Equal scores keep input order.
pub fn rank_by_name<'a, T: Named>(query: &str, candidates: &'a [T]) -> Vec<Scored<'a, T, u32>> {
    let mut ranked: Vec<_> = candidates
        .iter()
        .filter_map(|candidate| score_name(query, candidate).map(|score| Scored { candidate, score }))
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

pub fn best_by_name<'a, T: Named>(query: &str, candidates: &'a [T]) -> Option<&'a T> {
    rank_by_name(query, candidates).first().map(|s| s.candidate)
}

// ----- task titles -----------------------------------------------------------

pub const TITLE_THRESHOLD: f64 = 0.6;
pub const TITLE_CLOSENESS: f64 = 0.1;
const EXACT_WORD: f64 = 1.0;
const PARTIAL_WORD: f64 = 0.7;

pub const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "called", "for", "in", "is", "it", "me", "my", "named", "of", "on",
    "please", "task", "that", "the", "this", "titled", "to", "with",
];

fn query_words(query: &str) -> Vec<String> {
    let all = words(query);
    let filtered: Vec<String> = all
        .iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .cloned()
        .collect();
    if filtered.is_empty() { all } else { filtered }
}

/// Share of query words found in the title: 1.0 per exact word, 0.7 when
/// the query word only appears inside a longer title word.
pub fn title_score(query: &str, title: &str) -> f64 {
    let query = query_words(query);
    let title = words(title);
    if query.is_empty() || title.is_empty() {
        return 0.0;
    }

    let matched: f64 = query
        .iter()
        .map(|q| {
            if title.iter().any(|t| t == q) {
                EXACT_WORD
            } else if title.iter().any(|t| t.contains(q.as_str())) {
                PARTIAL_WORD
            } else {
                0.0
            }
        })
        .sum();
    matched / query.len() as f64
}

#[derive(Debug)]
pub enum TitleMatch<'a, T> {
    None,
    Unique(Scored<'a, T, f64>),
    /// Two or more candidates within [`TITLE_CLOSENESS`] of the best score.
    Ambiguous(Vec<Scored<'a, T, f64>>),
}

/// Resolve a task reference by title. An exact (normalised) title wins
/// outright; otherwise word overlap decides.
pub fn match_title<'a, T>(query: &str, candidates: &'a [T], title_of: impl Fn(&T) -> &str) -> TitleMatch<'a, T> {
    let needle = normalize(query);
    if needle.is_empty() {
        return TitleMatch::None;
    }
    if let Some(candidate) = candidates.iter().find(|c| normalize(title_of(c)) == needle) {
        return TitleMatch::Unique(Scored { candidate, score: 1.0 });
    }

    let mut ranked: Vec<Scored<'a, T, f64>> = candidates
        .iter()
        .map(|candidate| Scored {
            candidate,
            score: title_score(query, title_of(candidate)),
        })
        .filter(|s| s.score >= TITLE_THRESHOLD)
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let Some(top) = ranked.first().map(|s| s.score) else {
        return TitleMatch::None;
    };
    let close: Vec<_> = ranked
        .into_iter()
        .filter(|s| top - s.score <= TITLE_CLOSENESS + f64::EPSILON)
        .collect();

    if close.len() >= 2 {
        TitleMatch::Ambiguous(close)
    } else {
        close
            .into_iter()
            .next()
            .map(TitleMatch::Unique)
            .unwrap_or(TitleMatch::None)
    }
}
