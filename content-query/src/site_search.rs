use chrono::DateTime;
use chrono::DurationRound;
use chrono::SecondsFormat;
use chrono::TimeDelta;
use chrono::Utc;
use corpus_search_store::BoolQuery;
use corpus_search_store::Operator;
use corpus_search_store::Query;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

const EVENT_TYPE: &str = "event";

/// Fields every document type is searched on, with their weights.
const TEXT_FIELDS: [(&str, f32); 4] = [
    ("title", 2.0),
    ("summary", 1.5),
    ("tags", 1.0),
    ("searchableContent", 1.0),
];

pub const ADDRESS_FIELDS: [&str; 3] = [
    "location.address.town",
    "location.address.postalCode",
    "location.address.addressLine1",
];

/// Past events are judged against the current time rounded down to this
/// many seconds, so one cached search serves at most this long.
pub const EVENT_CUTOFF_SECS: i64 = 60;

/// `now` rounded down to [`EVENT_CUTOFF_SECS`].
pub fn event_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(TimeDelta::seconds(EVENT_CUTOFF_SECS))
        .unwrap_or(now)
}

/// A free-text search across the site's main document types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSearchRequest {
    pub text: String,
    /// Document types to search; empty means every configured type.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub include_past_events: bool,
    #[serde(default)]
    pub from: usize,
    pub size: usize,
}

impl SiteSearchRequest {
    pub fn new(text: impl Into<String>, size: usize) -> Self {
        Self {
            text: text.into(),
            types: Vec::new(),
            include_past_events: false,
            from: 0,
            size,
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn including_past_events(mut self) -> Self {
        self.include_past_events = true;
        self
    }

    pub fn page(mut self, from: usize) -> Self {
        self.from = from;
        self
    }
}

/// Builds the site-wide query: one boosted branch per document type, at
/// least one of which must match.
///
/// Each branch requires the text to match one of the text fields and ranks
/// exact matches above fuzzy ones. Event branches also accept a match on the
/// address and, unless past events are requested, drop events that ended
/// before `now`.
pub fn site_search_query(
    request: &SiteSearchRequest,
    boosts: &BTreeMap<String, f32>,
    now: DateTime<Utc>,
) -> Query {
    let mut query = BoolQuery::new().minimum_should_match(1);
    for (type_tag, boost) in boosts {
        if !request.types.is_empty() && !request.types.iter().any(|t| t == type_tag) {
            continue;
        }
        query = query.should(type_branch(request, type_tag, *boost, now));
    }
    query.into()
}

fn type_branch(request: &SiteSearchRequest, type_tag: &str, boost: f32, now: DateTime<Utc>) -> Query {
    let is_event = type_tag == EVENT_TYPE;

    let mut required = BoolQuery::new().minimum_should_match(1);
    for (field, weight) in TEXT_FIELDS {
        required = required.should(Query::matching(field, &request.text, Operator::Or).with_boost(weight));
    }
    if is_event {
        for field in ADDRESS_FIELDS {
            required = required.should(Query::matching(field, &request.text, Operator::Or));
        }
    }

    let mut branch = BoolQuery::new()
        .filter(Query::term("type", type_tag))
        .must(required.into())
        .should(Query::fuzzy("title", &request.text, 1.0))
        .minimum_should_match(0)
        .boost(boost);
    if is_event && !request.include_past_events {
        branch = branch.filter(not_yet_finished(now));
    }
    branch.into()
}

/// Events whose end, or start when they have no end, is not before `now`.
fn not_yet_finished(now: DateTime<Utc>) -> Query {
    let now = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    BoolQuery::new()
        .should(Query::range("endDate", Some(now.clone().into()), None))
        .should(
            BoolQuery::new()
                .must_not(Query::exists("endDate"))
                .must(Query::range("date", Some(now.into()), None))
                .into(),
        )
        .minimum_should_match(1)
        .into()
}
