//! Whole-corpus checks run after every file has been loaded.

use crate::augment::is_external;
use crate::corpus::Corpus;
use corpus_model::ClozeQuestionFields;
use corpus_model::ContentKind;
use corpus_model::ContentNode;
use corpus_model::ContentVisitor;
use corpus_model::EventFields;
use corpus_model::NumericQuestionFields;
use corpus_model::ProblemMap;
use corpus_model::QuestionFields;
use corpus_model::Severity;
use std::collections::BTreeSet;
use tracing::info;

const DROP_ZONE_MARKER: &str = "[drop-zone]";

/// Runs referential and shape checks over a corpus. Every check runs on
/// every node; one failure never hides another.
pub struct Validator {
    max_media_bytes: u64,
}

impl Validator {
    pub fn new(max_media_bytes: u64) -> Self {
        Self { max_media_bytes }
    }

    /// Appends problems for `corpus` to `problems`, then guarantees the map
    /// is not empty.
    pub fn validate(&self, corpus: &Corpus, problems: &mut ProblemMap) {
        let before = problems.problem_count();
        for document in &corpus.documents {
            let mut checker = NodeChecker {
                path: &document.path,
                corpus,
                problems: &mut *problems,
                max_media_bytes: self.max_media_bytes,
                expandable_depth: 0,
                position: Vec::new(),
            };
            document.root.accept(&mut checker);
        }
        info!(
            "Validation of {} found {} new problems",
            corpus.version,
            problems.problem_count() - before
        );
        if problems.ensure_not_empty() {
            info!("No content errors in {}", corpus.version);
        }
    }
}

struct NodeChecker<'a> {
    path: &'a str,
    corpus: &'a Corpus,
    problems: &'a mut ProblemMap,
    max_media_bytes: u64,
    expandable_depth: usize,
    /// Position of the node being checked.
    position: Vec<usize>,
}

impl ContentVisitor for NodeChecker<'_> {
    fn enter(&mut self, node: &ContentNode, position: &[usize]) {
        self.position.clear();
        self.position.extend_from_slice(position);
        self.check_references(node);
        self.check_value_and_children(node);
        self.check_expandable(node);
        self.check_media(node);
        match &node.kind {
            ContentKind::NumericQuestion(fields) => self.check_numeric_question(node, fields),
            ContentKind::ChoiceQuestion(fields) => self.check_choice_question(node, fields),
            ContentKind::ClozeQuestion(fields) => self.check_cloze_question(node, fields),
            ContentKind::EmailTemplate(fields) => {
                if fields
                    .plain_text_content
                    .as_deref()
                    .is_none_or(|text| text.trim().is_empty())
                {
                    self.error(node, "Email template has no plain text content");
                }
            }
            ContentKind::Event(fields) => self.check_event(node, fields),
            _ => {}
        }
        if is_expandable(node) {
            self.expandable_depth += 1;
        }
    }

    fn leave(&mut self, node: &ContentNode, _position: &[usize]) {
        if is_expandable(node) {
            self.expandable_depth = self.expandable_depth.saturating_sub(1);
        }
    }
}

fn is_expandable(node: &ContentNode) -> bool {
    node.expandable == Some(true)
}

impl NodeChecker<'_> {
    fn error(&mut self, node: &ContentNode, message: impl Into<String>) {
        self.problems
            .record_at(self.path, &self.position, node, Severity::Error, message);
    }

    fn warning(&mut self, node: &ContentNode, message: impl Into<String>) {
        self.problems
            .record_at(self.path, &self.position, node, Severity::Warning, message);
    }

    fn check_references(&mut self, node: &ContentNode) {
        let mut missing = Vec::new();
        let mut unpublished = Vec::new();
        for id in node.related_content_ids() {
            match self.corpus.get(id) {
                None => missing.push(id),
                Some(target) if !target.published => unpublished.push(id),
                Some(_) => {}
            }
        }
        if !missing.is_empty() {
            self.error(
                node,
                format!("Related content not found: {}", missing.join(", ")),
            );
        }
        if node.published && !unpublished.is_empty() {
            self.warning(
                node,
                format!(
                    "Published content links to unpublished content: {}",
                    unpublished.join(", ")
                ),
            );
        }
    }

    fn check_value_and_children(&mut self, node: &ContentNode) {
        if node.has_value() && node.has_children() {
            self.error(node, "Content has both a value and children");
        }
    }

    fn check_expandable(&mut self, node: &ContentNode) {
        if !is_expandable(node) {
            return;
        }
        if !matches!(node.kind, ContentKind::Content | ContentKind::CodeSnippet(_)) {
            self.error(
                node,
                format!("{} content cannot be expandable", node.type_tag()),
            );
        }
        if self.expandable_depth > 0 {
            self.error(node, "Expandable content cannot be nested in expandable content");
        }
    }

    fn check_media(&mut self, node: &ContentNode) {
        match &node.kind {
            ContentKind::Figure(fields) | ContentKind::Image(fields) | ContentKind::Video(fields) => {
                match fields.src.as_deref() {
                    None => self.error(node, format!("{} has no src", node.type_tag())),
                    Some(src) if src.trim().is_empty() => {
                        self.error(node, format!("{} has no src", node.type_tag()));
                    }
                    Some(src) => self.check_media_file(node, src),
                }
                let needs_alt = !matches!(node.kind, ContentKind::Video(_));
                if needs_alt
                    && fields
                        .alt_text
                        .as_deref()
                        .is_none_or(|alt| alt.trim().is_empty())
                {
                    self.warning(node, format!("{} has no alt text", node.type_tag()));
                }
            }
            ContentKind::Card(fields) => {
                if let Some(image) = fields.image.as_deref() {
                    self.check_media_file(node, image);
                }
            }
            _ => {}
        }
    }

    fn check_media_file(&mut self, node: &ContentNode, media: &str) {
        if is_external(media) {
            return;
        }
        match self.corpus.media_size(media) {
            None => self.error(node, format!("Media file {media} not found")),
            Some(size) if size > self.max_media_bytes => self.warning(
                node,
                format!(
                    "Media file {media} is {size} bytes (limit {})",
                    self.max_media_bytes
                ),
            ),
            Some(_) => {}
        }
    }

    fn check_numeric_question(&mut self, node: &ContentNode, fields: &NumericQuestionFields) {
        let requires_units = fields.requires_units();
        if requires_units && fields.display_unit.is_some() {
            self.error(node, "Numeric question requires units but sets a display unit");
        }
        for choice in &fields.question.choices {
            let ContentKind::Quantity(quantity) = &choice.kind else {
                self.error(
                    node,
                    format!(
                        "Numeric question has a {} choice; only quantities are allowed",
                        choice.type_tag()
                    ),
                );
                continue;
            };
            let value = choice.value.as_deref().unwrap_or_default();
            if !is_number(value) {
                self.error(
                    node,
                    format!("Numeric question choice value {value:?} is not a number"),
                );
            }
            match quantity.units.as_deref() {
                Some(units) => {
                    if !units_well_formed(units) {
                        self.error(node, format!("Malformed units {units:?}"));
                    }
                    if !requires_units {
                        self.error(
                            node,
                            format!("Numeric question does not use units but a choice has {units:?}"),
                        );
                    }
                }
                None if requires_units => {
                    self.error(
                        node,
                        format!("Numeric question requires units but choice {value:?} has none"),
                    );
                }
                None => {}
            }
        }
    }

    fn check_choice_question(&mut self, node: &ContentNode, fields: &QuestionFields) {
        if fields.choices.is_empty() {
            self.error(node, "Choice question has no choices");
            return;
        }
        let has_correct = fields
            .choices
            .iter()
            .filter_map(|choice| choice.kind.choice())
            .any(|choice| choice.correct);
        if !has_correct {
            self.error(node, "Choice question has no correct answer");
        }
    }

    fn check_cloze_question(&mut self, node: &ContentNode, fields: &ClozeQuestionFields) {
        let item_ids: BTreeSet<&str> = fields
            .items
            .iter()
            .filter_map(|item| item.id.as_deref())
            .map(|id| id.rsplit('|').next().unwrap_or(id))
            .collect();
        let drop_zones = count_drop_zones(node);
        let mut expected = (drop_zones > 0).then_some(drop_zones);

        for choice in &fields.question.choices {
            let ContentKind::ItemChoice(item_choice) = &choice.kind else {
                continue;
            };
            let count = item_choice.items.len();
            match expected {
                None => expected = Some(count),
                Some(expected) if expected != count => {
                    self.error(
                        node,
                        format!("Cloze question choice lists {count} items, expected {expected}"),
                    );
                }
                Some(_) => {}
            }
            let unknown: Vec<&str> = item_choice
                .items
                .iter()
                .map(String::as_str)
                .filter(|id| !item_ids.contains(id))
                .collect();
            if !unknown.is_empty() {
                self.error(
                    node,
                    format!("Cloze question choice uses unknown items: {}", unknown.join(", ")),
                );
            }
        }
    }

    fn check_event(&mut self, node: &ContentNode, fields: &EventFields) {
        let Some(date) = fields.date else {
            self.error(node, "Event has no date");
            return;
        };
        match fields.end_date {
            None => self.warning(node, "Event has no end date"),
            Some(end) if end < date => self.error(node, "Event ends before it starts"),
            Some(_) => {}
        }
    }
}

/// Drop zones declared in the question's own text and children.
fn count_drop_zones(question: &ContentNode) -> usize {
    let mut count = question
        .value
        .as_deref()
        .map_or(0, |value| value.matches(DROP_ZONE_MARKER).count());
    for child in &question.children {
        child.for_each_node(&mut |node| {
            if let Some(value) = node.value.as_deref() {
                count += value.matches(DROP_ZONE_MARKER).count();
            }
        });
    }
    count
}

fn is_number(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    !compact.is_empty() && compact.parse::<f64>().is_ok_and(f64::is_finite)
}

fn units_well_formed(units: &str) -> bool {
    if units.trim().is_empty() {
        return false;
    }
    let mut depth: usize = 0;
    for ch in units.chars() {
        match ch {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::SourceDocument;
    use corpus_model::NO_CONTENT_ERRORS_TITLE;
    use corpus_model::Problem;
    use corpus_model::VersionId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn corpus_of(files: Vec<(&str, serde_json::Value)>) -> Corpus {
        let mut corpus = Corpus::new(VersionId::from("v1"));
        corpus.media.insert("content/f.png".to_string(), 10);
        corpus
            .media
            .insert("content/huge.png".to_string(), 3 * 1024 * 1024);
        for (path, value) in files {
            let root: ContentNode = serde_json::from_value(value).unwrap();
            root.for_each_node(&mut |node| {
                if let Some(id) = node.id.clone() {
                    corpus.nodes.entry(id).or_insert_with(|| node.clone());
                }
            });
            corpus.documents.push(SourceDocument {
                path: path.to_string(),
                root,
            });
        }
        corpus
    }

    fn validate(corpus: &Corpus) -> ProblemMap {
        let mut problems = ProblemMap::new();
        Validator::new(2 * 1024 * 1024).validate(corpus, &mut problems);
        problems
    }

    fn messages(problems: &ProblemMap, path: &str, id: Option<&str>) -> Vec<Problem> {
        problems
            .get(path, id)
            .map(|record| record.problems().to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn missing_references_are_reported_on_the_referencing_node() {
        let corpus = corpus_of(vec![(
            "a.json",
            json!({"type": "page", "id": "a", "relatedContent": ["ghost"], "supersededBy": "gone"}),
        )]);
        let problems = validate(&corpus);
        let found = messages(&problems, "a.json", Some("a"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Error);
        assert_eq!(found[0].message, "Related content not found: ghost, gone");
        assert!(problems.get("a.json", Some("ghost")).is_none());
    }

    #[test]
    fn published_to_unpublished_is_one_warning_per_node() {
        let corpus = corpus_of(vec![
            (
                "a.json",
                json!({"type": "page", "id": "a", "published": true, "relatedContent": ["b", "c"]}),
            ),
            ("b.json", json!({"type": "page", "id": "b"})),
            ("c.json", json!({"type": "page", "id": "c"})),
        ]);
        let problems = validate(&corpus);
        let found = messages(&problems, "a.json", Some("a"));
        assert_eq!(
            found,
            vec![Problem {
                severity: Severity::Warning,
                message: "Published content links to unpublished content: b, c".to_string()
            }]
        );
    }

    #[test]
    fn shape_checks_do_not_short_circuit() {
        let corpus = corpus_of(vec![(
            "q.json",
            json!({
                "type": "numericQuestion",
                "id": "q",
                "value": "How fast?",
                "children": [{"type": "content", "value": "stem"}],
                "displayUnit": "m",
                "choices": [
                    {"type": "quantity", "value": "fast"},
                    {"type": "choice", "value": "1"},
                    {"type": "quantity", "value": "1 000", "units": "m s^{-1"}
                ]
            }),
        )]);
        let problems = validate(&corpus);
        let found: Vec<String> = messages(&problems, "q.json", Some("q"))
            .into_iter()
            .map(|problem| problem.message)
            .collect();
        assert_eq!(
            found,
            vec![
                "Content has both a value and children".to_string(),
                "Numeric question requires units but sets a display unit".to_string(),
                "Numeric question choice value \"fast\" is not a number".to_string(),
                "Numeric question requires units but choice \"fast\" has none".to_string(),
                "Numeric question has a choice choice; only quantities are allowed".to_string(),
                "Malformed units \"m s^{-1\"".to_string(),
            ]
        );
    }

    #[test]
    fn numeric_questions_without_units_reject_units() {
        let corpus = corpus_of(vec![(
            "q.json",
            json!({
                "type": "numericQuestion",
                "id": "q",
                "requireUnits": false,
                "choices": [
                    {"type": "quantity", "value": "2.5e3"},
                    {"type": "quantity", "value": "3", "units": "kg"}
                ]
            }),
        )]);
        let found = messages(&validate(&corpus), "q.json", Some("q"));
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("does not use units"));
    }

    #[test]
    fn media_checks() {
        let corpus = corpus_of(vec![(
            "content/m.json",
            json!({"type": "content", "id": "m", "children": [
                {"type": "figure", "id": "ok", "src": "content/f.png", "altText": "fine"},
                {"type": "image", "id": "big", "src": "content/huge.png", "altText": "big"},
                {"type": "figure", "id": "lost", "src": "content/lost.png"},
                {"type": "video", "id": "nosrc"},
                {"type": "image", "id": "remote", "src": "https://example.com/x.png", "altText": "x"},
                {"type": "card", "id": "card", "image": "content/nope.png"}
            ]}),
        )]);
        let problems = validate(&corpus);
        assert!(messages(&problems, "content/m.json", Some("ok")).is_empty());
        assert!(messages(&problems, "content/m.json", Some("remote")).is_empty());
        assert_eq!(
            messages(&problems, "content/m.json", Some("big"))[0].severity,
            Severity::Warning
        );
        let lost = messages(&problems, "content/m.json", Some("lost"));
        assert_eq!(lost.len(), 2);
        assert_eq!(lost[0].message, "Media file content/lost.png not found");
        assert_eq!(lost[1].message, "figure has no alt text");
        assert_eq!(
            messages(&problems, "content/m.json", Some("nosrc"))[0].message,
            "video has no src"
        );
        assert_eq!(
            messages(&problems, "content/m.json", Some("card"))[0].severity,
            Severity::Error
        );
    }

    #[test]
    fn id_less_nodes_get_their_own_records() {
        let corpus = corpus_of(vec![(
            "content/p.json",
            json!({"type": "page", "id": "p", "children": [
                {"type": "content", "title": "First", "value": "text",
                 "children": [{"type": "content", "value": "inner"}]},
                {"type": "figure", "title": "Second", "src": "content/missing.png", "altText": "x"}
            ]}),
        )]);
        let problems = validate(&corpus);

        let first = problems.get_at("content/p.json", &[0]).unwrap();
        assert_eq!(first.node().title.as_deref(), Some("First"));
        assert_eq!(
            first.problems().iter().map(|p| p.message.as_str()).collect::<Vec<_>>(),
            vec!["Content has both a value and children"]
        );
        let second = problems.get_at("content/p.json", &[1]).unwrap();
        assert_eq!(second.node().title.as_deref(), Some("Second"));
        assert_eq!(second.node().type_tag(), "figure");
        assert_eq!(
            second.problems().iter().map(|p| p.message.as_str()).collect::<Vec<_>>(),
            vec!["Media file content/missing.png not found"]
        );
        assert!(problems.get("content/p.json", None).is_none());
        assert!(messages(&problems, "content/p.json", Some("p")).is_empty());
    }

    #[test]
    fn expandable_rules() {
        let corpus = corpus_of(vec![(
            "e.json",
            json!({"type": "content", "id": "outer", "expandable": true, "children": [
                {"type": "codeSnippet", "id": "inner", "expandable": true},
                {"type": "page", "id": "page", "expandable": true}
            ]}),
        )]);
        let problems = validate(&corpus);
        assert!(messages(&problems, "e.json", Some("outer")).is_empty());
        assert_eq!(messages(&problems, "e.json", Some("inner")).len(), 1);
        assert_eq!(messages(&problems, "e.json", Some("page")).len(), 2);
    }

    #[test]
    fn question_rules() {
        let corpus = corpus_of(vec![
            (
                "choice.json",
                json!({"type": "choiceQuestion", "id": "c", "choices": [
                    {"type": "choice", "value": "a"}
                ]}),
            ),
            (
                "cloze.json",
                json!({"type": "clozeQuestion", "id": "z",
                    "value": "[drop-zone] then [drop-zone]",
                    "items": [{"type": "item", "id": "i1"}, {"type": "item", "id": "i2"}],
                    "choices": [
                        {"type": "itemChoice", "correct": true, "items": ["i1", "i2"]},
                        {"type": "itemChoice", "items": ["i2"]},
                        {"type": "itemChoice", "items": ["i1", "i9"]}
                    ]}),
            ),
        ]);
        let problems = validate(&corpus);
        assert_eq!(
            messages(&problems, "choice.json", Some("c"))[0].message,
            "Choice question has no correct answer"
        );
        let cloze: Vec<String> = messages(&problems, "cloze.json", Some("z"))
            .into_iter()
            .map(|problem| problem.message)
            .collect();
        assert_eq!(
            cloze,
            vec![
                "Cloze question choice lists 1 items, expected 2".to_string(),
                "Cloze question choice uses unknown items: i9".to_string(),
            ]
        );
    }

    #[test]
    fn email_and_event_rules() {
        let corpus = corpus_of(vec![
            (
                "mail.json",
                json!({"type": "emailTemplate", "id": "mail", "plainTextContent": "  "}),
            ),
            (
                "events.json",
                json!({"type": "content", "id": "events", "children": [
                    {"type": "event", "id": "undated"},
                    {"type": "event", "id": "open", "date": "2026-03-01T10:00:00Z"},
                    {"type": "event", "id": "backwards", "date": "2026-03-01T10:00:00Z",
                     "endDate": "2026-02-01T10:00:00Z"}
                ]}),
            ),
        ]);
        let problems = validate(&corpus);
        assert_eq!(messages(&problems, "mail.json", Some("mail")).len(), 1);
        assert_eq!(
            messages(&problems, "events.json", Some("undated"))[0].message,
            "Event has no date"
        );
        assert_eq!(
            messages(&problems, "events.json", Some("open"))[0].severity,
            Severity::Warning
        );
        assert_eq!(
            messages(&problems, "events.json", Some("backwards"))[0].message,
            "Event ends before it starts"
        );
    }

    #[test]
    fn clean_corpus_gets_the_placeholder() {
        let corpus = corpus_of(vec![(
            "a.json",
            json!({"type": "page", "id": "a", "published": true, "value": "hello"}),
        )]);
        let problems = validate(&corpus);
        assert_eq!(problems.len(), 1);
        let docs = problems.documents();
        assert_eq!(docs[0].title.as_deref(), Some(NO_CONTENT_ERRORS_TITLE));
        assert_eq!(docs[0].path, "");
    }

    #[test]
    fn numbers_and_units() {
        assert!(is_number(" 1 000.5 "));
        assert!(is_number("6.02e23"));
        assert!(!is_number("NaN"));
        assert!(!is_number(""));
        assert!(units_well_formed("kg m^{2} s^{-2}"));
        assert!(!units_well_formed("}{"));
        assert!(!units_well_formed(" "));
    }
}
