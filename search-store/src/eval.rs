//! Query evaluation for the in-memory backend.

use crate::query::BoolQuery;
use crate::query::Operator;
use crate::query::Query;
use nucleo_matcher::Config;
use nucleo_matcher::Matcher;
use nucleo_matcher::Utf32Str;
use serde_json::Value;
use std::cmp::Ordering;

/// Shortest token the subsequence matcher is tried on.
const MIN_SUBSEQUENCE_LEN: usize = 3;

pub(crate) struct Evaluator {
    matcher: Matcher,
}

impl Evaluator {
    pub(crate) fn new() -> Self {
        Self {
            matcher: Matcher::new(Config::DEFAULT),
        }
    }

    /// Score of `doc` against `query`, or `None` when it does not match.
    pub(crate) fn score(&mut self, query: &Query, id: &str, doc: &Value) -> Option<f32> {
        match query {
            Query::MatchAll => Some(1.0),
            Query::Bool(query) => self.score_bool(query, id, doc),
            Query::Term { field, value } => values_at(doc, field)
                .into_iter()
                .any(|candidate| values_equal(candidate, value))
                .then_some(1.0),
            Query::Terms { field, values } => values_at(doc, field)
                .into_iter()
                .any(|candidate| values.iter().any(|value| values_equal(candidate, value)))
                .then_some(1.0),
            Query::Match {
                field,
                text,
                operator,
                boost,
            } => {
                let wanted = tokenize(text);
                if wanted.is_empty() {
                    return None;
                }
                let present = field_tokens(doc, field);
                let matched = wanted
                    .iter()
                    .filter(|token| present.contains(token))
                    .count();
                let enough = match operator {
                    Operator::And => matched == wanted.len(),
                    Operator::Or => matched > 0,
                };
                enough.then(|| boost * matched as f32 / wanted.len() as f32)
            }
            Query::Fuzzy { field, text, boost } => {
                let wanted = tokenize(text);
                if wanted.is_empty() {
                    return None;
                }
                let present = field_tokens(doc, field);
                let total: f32 = wanted
                    .iter()
                    .map(|token| self.best_token_similarity(token, &present))
                    .sum();
                (total > 0.0).then(|| boost * total / wanted.len() as f32)
            }
            Query::Prefix { field, prefix } => values_at(doc, field)
                .into_iter()
                .filter_map(Value::as_str)
                .any(|value| value.starts_with(prefix.as_str()))
                .then_some(1.0),
            Query::Range { field, gte, lte } => values_at(doc, field)
                .into_iter()
                .any(|value| {
                    let above = gte.as_ref().is_none_or(|bound| {
                        matches!(
                            compare_values(value, bound),
                            Some(Ordering::Greater | Ordering::Equal)
                        )
                    });
                    let below = lte.as_ref().is_none_or(|bound| {
                        matches!(
                            compare_values(value, bound),
                            Some(Ordering::Less | Ordering::Equal)
                        )
                    });
                    above && below
                })
                .then_some(1.0),
            Query::Exists { field } => (!values_at(doc, field).is_empty()).then_some(1.0),
            Query::Ids { ids } => ids.iter().any(|candidate| candidate == id).then_some(1.0),
            Query::Nested { path, query } => values_at(doc, path)
                .into_iter()
                .filter(|element| element.is_object())
                .filter_map(|element| self.score(query, id, element))
                .reduce(f32::max),
        }
    }

    fn score_bool(&mut self, query: &BoolQuery, id: &str, doc: &Value) -> Option<f32> {
        for clause in &query.filter {
            self.score(clause, id, doc)?;
        }
        for clause in &query.must_not {
            if self.score(clause, id, doc).is_some() {
                return None;
            }
        }
        let mut score = 0.0;
        for clause in &query.must {
            score += self.score(clause, id, doc)?;
        }
        let mut should_matched = 0;
        for clause in &query.should {
            if let Some(clause_score) = self.score(clause, id, doc) {
                should_matched += 1;
                score += clause_score;
            }
        }
        let required = query.minimum_should_match.unwrap_or(
            if query.must.is_empty() && query.filter.is_empty() && !query.should.is_empty() {
                1
            } else {
                0
            },
        );
        if should_matched < required {
            return None;
        }
        Some(score * query.boost)
    }

    /// 1.0 for an exact token, 0.8 within edit distance, 0.5 for a
    /// subsequence match, else 0.
    fn best_token_similarity(&mut self, wanted: &str, present: &[String]) -> f32 {
        let mut best: f32 = 0.0;
        let allowed = allowed_edits(wanted);
        for token in present {
            if token == wanted {
                return 1.0;
            }
            if allowed > 0 && edit_distance(wanted, token) <= allowed {
                best = best.max(0.8);
            } else if wanted.chars().count() >= MIN_SUBSEQUENCE_LEN
                && self.is_subsequence(wanted, token)
            {
                best = best.max(0.5);
            }
        }
        best
    }

    fn is_subsequence(&mut self, needle: &str, haystack: &str) -> bool {
        let mut haystack_buf = Vec::new();
        let mut needle_buf = Vec::new();
        let haystack = Utf32Str::new(haystack, &mut haystack_buf);
        let needle = Utf32Str::new(needle, &mut needle_buf);
        self.matcher.fuzzy_match(haystack, needle).is_some()
    }
}

/// All leaf values at a dot path. Arrays met along the way, and at the end,
/// are expanded element-wise; nulls are dropped.
pub(crate) fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_segment(value, segment, &mut next);
        }
        current = next;
    }
    let mut leaves = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => leaves.extend(items.iter().filter(|item| !item.is_null())),
            Value::Null => {}
            other => leaves.push(other),
        }
    }
    leaves
}

fn collect_segment<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                out.push(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_segment(item, segment, out);
            }
        }
        _ => {}
    }
}

pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn field_tokens(doc: &Value, field: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for value in values_at(doc, field) {
        match value {
            Value::String(text) => tokens.extend(tokenize(text)),
            Value::Number(number) => tokens.push(number.to_string()),
            Value::Bool(flag) => tokens.push(flag.to_string()),
            _ => {}
        }
    }
    tokens
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn allowed_edits(token: &str) -> usize {
    match token.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
