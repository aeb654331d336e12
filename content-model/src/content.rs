use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;

/// One typed unit of content, possibly containing nested nodes.
///
/// Containment is strictly a tree: `children` plus the nested nodes owned by
/// the type-specific fields (see [`ContentKind::nested`]). Cross references
/// (`related_content`, `superseded_by`) are plain id lists and are never
/// followed while walking the tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub kind: ContentKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub published: bool,

    /// Path of the file this node was loaded from, relative to the snapshot root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_source_file: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_content: Vec<String>,

    /// Depth-first concatenation of titles and values, set on top-level nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expandable: Option<bool>,

    /// Filled at query time from `related_content`; never indexed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_summaries: Vec<ContentSummary>,
}

/// Type tag plus the fields that only exist for that tag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentKind {
    #[default]
    Content,
    Page(PageFields),
    ConceptPage(PageFields),
    QuestionPage(PageFields),
    Event(EventFields),
    EmailTemplate(EmailTemplateFields),
    Figure(MediaFields),
    Image(MediaFields),
    Video(MediaFields),
    CodeSnippet(CodeSnippetFields),
    Question(QuestionFields),
    ChoiceQuestion(QuestionFields),
    NumericQuestion(NumericQuestionFields),
    ClozeQuestion(ClozeQuestionFields),
    Choice(ChoiceFields),
    Quantity(QuantityFields),
    ItemChoice(ItemChoiceFields),
    Item,
    CardDeck(CardDeckFields),
    Card(CardFields),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub town: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplateFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_email: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnippetFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Box<ContentNode>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<ContentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_feedback: Option<Box<ContentNode>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ContentNode>,
}

impl QuestionFields {
    fn nodes(&self) -> Vec<&ContentNode> {
        let mut out = Vec::new();
        out.extend(self.answer.as_deref());
        out.extend(self.hints.iter());
        out.extend(self.default_feedback.as_deref());
        out.extend(self.choices.iter());
        out
    }

    fn nodes_mut(&mut self) -> Vec<&mut ContentNode> {
        let mut out = Vec::new();
        out.extend(self.answer.as_deref_mut());
        out.extend(self.hints.iter_mut());
        out.extend(self.default_feedback.as_deref_mut());
        out.extend(self.choices.iter_mut());
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericQuestionFields {
    #[serde(flatten)]
    pub question: QuestionFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_units: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_unit: Option<String>,
}

impl NumericQuestionFields {
    pub fn requires_units(&self) -> bool {
        self.require_units.unwrap_or(true)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClozeQuestionFields {
    #[serde(flatten)]
    pub question: QuestionFields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ContentNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceFields {
    #[serde(default)]
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Box<ContentNode>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityFields {
    #[serde(flatten)]
    pub choice: ChoiceFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemChoiceFields {
    #[serde(flatten)]
    pub choice: ChoiceFields,
    /// Item ids in drop-zone order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDeckFields {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<ContentNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_url: Option<String>,
}

/// Lightweight view of a node used to describe related content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub published: bool,
}

impl ContentKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ContentKind::Content => "content",
            ContentKind::Page(_) => "page",
            ContentKind::ConceptPage(_) => "conceptPage",
            ContentKind::QuestionPage(_) => "questionPage",
            ContentKind::Event(_) => "event",
            ContentKind::EmailTemplate(_) => "emailTemplate",
            ContentKind::Figure(_) => "figure",
            ContentKind::Image(_) => "image",
            ContentKind::Video(_) => "video",
            ContentKind::CodeSnippet(_) => "codeSnippet",
            ContentKind::Question(_) => "question",
            ContentKind::ChoiceQuestion(_) => "choiceQuestion",
            ContentKind::NumericQuestion(_) => "numericQuestion",
            ContentKind::ClozeQuestion(_) => "clozeQuestion",
            ContentKind::Choice(_) => "choice",
            ContentKind::Quantity(_) => "quantity",
            ContentKind::ItemChoice(_) => "itemChoice",
            ContentKind::Item => "item",
            ContentKind::CardDeck(_) => "cardDeck",
            ContentKind::Card(_) => "card",
        }
    }

    pub fn question(&self) -> Option<&QuestionFields> {
        match self {
            ContentKind::Question(fields) | ContentKind::ChoiceQuestion(fields) => Some(fields),
            ContentKind::NumericQuestion(fields) => Some(&fields.question),
            ContentKind::ClozeQuestion(fields) => Some(&fields.question),
            _ => None,
        }
    }

    pub fn choice(&self) -> Option<&ChoiceFields> {
        match self {
            ContentKind::Choice(fields) => Some(fields),
            ContentKind::Quantity(fields) => Some(&fields.choice),
            ContentKind::ItemChoice(fields) => Some(&fields.choice),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            ContentKind::Page(fields)
            | ContentKind::ConceptPage(fields)
            | ContentKind::QuestionPage(fields) => fields.summary.as_deref(),
            ContentKind::Event(fields) => fields.summary.as_deref(),
            _ => None,
        }
    }

    pub fn superseded_by(&self) -> Option<&str> {
        match self {
            ContentKind::Page(fields)
            | ContentKind::ConceptPage(fields)
            | ContentKind::QuestionPage(fields) => fields.superseded_by.as_deref(),
            _ => None,
        }
    }

    /// Nodes owned by the type-specific fields, in declared order.
    pub fn nested(&self) -> Vec<&ContentNode> {
        match self {
            ContentKind::Question(fields) | ContentKind::ChoiceQuestion(fields) => fields.nodes(),
            ContentKind::NumericQuestion(fields) => fields.question.nodes(),
            ContentKind::ClozeQuestion(fields) => {
                let mut out = fields.question.nodes();
                out.extend(fields.items.iter());
                out
            }
            ContentKind::Choice(_) | ContentKind::Quantity(_) | ContentKind::ItemChoice(_) => self
                .choice()
                .and_then(|choice| choice.explanation.as_deref())
                .into_iter()
                .collect(),
            ContentKind::CardDeck(fields) => fields.cards.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn nested_mut(&mut self) -> Vec<&mut ContentNode> {
        match self {
            ContentKind::Question(fields) | ContentKind::ChoiceQuestion(fields) => {
                fields.nodes_mut()
            }
            ContentKind::NumericQuestion(fields) => fields.question.nodes_mut(),
            ContentKind::ClozeQuestion(fields) => {
                let mut out = fields.question.nodes_mut();
                out.extend(fields.items.iter_mut());
                out
            }
            ContentKind::Choice(fields) => fields.explanation.as_deref_mut().into_iter().collect(),
            ContentKind::Quantity(fields) => fields
                .choice
                .explanation
                .as_deref_mut()
                .into_iter()
                .collect(),
            ContentKind::ItemChoice(fields) => fields
                .choice
                .explanation
                .as_deref_mut()
                .into_iter()
                .collect(),
            ContentKind::CardDeck(fields) => fields.cards.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// Paths of media files this node points at.
    pub fn media_paths(&self) -> Vec<&str> {
        match self {
            ContentKind::Figure(fields) | ContentKind::Image(fields) | ContentKind::Video(fields) => {
                fields.src.as_deref().into_iter().collect()
            }
            ContentKind::Card(fields) => fields.image.as_deref().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every media path field in place.
    pub fn rewrite_media_paths(&mut self, rewrite: impl Fn(&str) -> String) {
        match self {
            ContentKind::Figure(fields) | ContentKind::Image(fields) | ContentKind::Video(fields) => {
                if let Some(src) = fields.src.as_mut() {
                    *src = rewrite(src);
                }
            }
            ContentKind::Card(fields) => {
                if let Some(image) = fields.image.as_mut() {
                    *image = rewrite(image);
                }
            }
            _ => {}
        }
    }
}

/// Receives every node of a tree in depth-first order.
///
/// `position` holds the index of each node on the way down from the root,
/// counted over [`ContentNode::sub_nodes`]; the root's position is empty.
pub trait ContentVisitor {
    fn enter(&mut self, node: &ContentNode, position: &[usize]);

    fn leave(&mut self, _node: &ContentNode, _position: &[usize]) {}
}

impl ContentNode {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<ContentNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_related(mut self, related: &[&str]) -> Self {
        self.related_content = related.iter().map(|id| (*id).to_string()).collect();
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.tag()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn has_value(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    pub fn summary(&self) -> Option<&str> {
        self.kind.summary()
    }

    /// Ids this node points at without containing them.
    pub fn related_content_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.related_content.iter().map(String::as_str).collect();
        ids.extend(self.kind.superseded_by());
        ids
    }

    /// Contained nodes: children first, then type-specific nested nodes.
    pub fn sub_nodes(&self) -> Vec<&ContentNode> {
        let mut out: Vec<&ContentNode> = self.children.iter().collect();
        out.extend(self.kind.nested());
        out
    }

    pub fn sub_nodes_mut(&mut self) -> Vec<&mut ContentNode> {
        let mut out: Vec<&mut ContentNode> = self.children.iter_mut().collect();
        out.extend(self.kind.nested_mut());
        out
    }

    pub fn accept(&self, visitor: &mut dyn ContentVisitor) {
        self.accept_at(visitor, &mut Vec::new());
    }

    fn accept_at(&self, visitor: &mut dyn ContentVisitor, position: &mut Vec<usize>) {
        visitor.enter(self, position);
        for (index, node) in self.sub_nodes().into_iter().enumerate() {
            position.push(index);
            node.accept_at(visitor, position);
            position.pop();
        }
        visitor.leave(self, position);
    }

    /// Pre-order traversal over this node and everything it contains.
    pub fn for_each_node<'a>(&'a self, f: &mut impl FnMut(&'a ContentNode)) {
        f(self);
        for node in self.sub_nodes() {
            node.for_each_node(f);
        }
    }

    /// Copy without contained nodes, for attaching to diagnostics.
    pub fn shallow_copy(&self) -> ContentNode {
        ContentNode {
            id: self.id.clone(),
            kind: ContentKind::from_tag(self.type_tag()).unwrap_or_default(),
            title: self.title.clone(),
            tags: self.tags.clone(),
            published: self.published,
            canonical_source_file: self.canonical_source_file.clone(),
            ..Default::default()
        }
    }

    pub fn to_summary(&self) -> Option<ContentSummary> {
        let id = self.id.clone()?;
        Some(ContentSummary {
            id,
            type_tag: self.type_tag().to_string(),
            title: self.title.clone(),
            summary: self.summary().map(str::to_string),
            tags: self.tags.clone(),
            published: self.published,
        })
    }

    /// Same content, ignoring which file this node or anything it contains
    /// was loaded from.
    pub fn same_content_as(&self, other: &ContentNode) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        left.clear_source_files();
        right.clear_source_files();
        left == right
    }

    fn clear_source_files(&mut self) {
        self.canonical_source_file = None;
        for node in self.sub_nodes_mut() {
            node.clear_source_files();
        }
    }
}

impl ContentKind {
    /// Empty kind for a tag, used for placeholders and shallow copies.
    pub fn from_tag(tag: &str) -> Option<ContentKind> {
        let kind = match tag {
            "content" => ContentKind::Content,
            "page" => ContentKind::Page(PageFields::default()),
            "conceptPage" => ContentKind::ConceptPage(PageFields::default()),
            "questionPage" => ContentKind::QuestionPage(PageFields::default()),
            "event" => ContentKind::Event(EventFields::default()),
            "emailTemplate" => ContentKind::EmailTemplate(EmailTemplateFields::default()),
            "figure" => ContentKind::Figure(MediaFields::default()),
            "image" => ContentKind::Image(MediaFields::default()),
            "video" => ContentKind::Video(MediaFields::default()),
            "codeSnippet" => ContentKind::CodeSnippet(CodeSnippetFields::default()),
            "question" => ContentKind::Question(QuestionFields::default()),
            "choiceQuestion" => ContentKind::ChoiceQuestion(QuestionFields::default()),
            "numericQuestion" => ContentKind::NumericQuestion(NumericQuestionFields::default()),
            "clozeQuestion" => ContentKind::ClozeQuestion(ClozeQuestionFields::default()),
            "choice" => ContentKind::Choice(ChoiceFields::default()),
            "quantity" => ContentKind::Quantity(QuantityFields::default()),
            "itemChoice" => ContentKind::ItemChoice(ItemChoiceFields::default()),
            "item" => ContentKind::Item,
            "cardDeck" => ContentKind::CardDeck(CardDeckFields::default()),
            "card" => ContentKind::Card(CardFields::default()),
            _ => return None,
        };
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ContentNode {
        serde_json::from_value(value).expect("valid content")
    }

    #[test]
    fn deserializes_by_type_tag() {
        let node = parse(json!({
            "id": "forces",
            "type": "conceptPage",
            "title": "Forces",
            "summary": "Pushes and pulls",
            "tags": ["physics", "mechanics"],
            "published": true,
            "children": [
                {"type": "content", "value": "A force is..."},
                {"type": "figure", "id": "fig1", "src": "figures/f1.svg", "altText": "arrows"}
            ]
        }));

        assert_eq!(node.type_tag(), "conceptPage");
        assert_eq!(node.summary(), Some("Pushes and pulls"));
        assert!(node.published);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].kind.media_paths(), vec!["figures/f1.svg"]);
    }

    #[test]
    fn same_content_ignores_source_files_throughout_the_tree() {
        let from = |path: &str| {
            let mut node = parse(json!({
                "type": "page", "id": "shared", "title": "Shared",
                "children": [{"type": "content", "id": "para", "value": "hello"}]
            }));
            node.canonical_source_file = Some(path.to_string());
            node.children[0].canonical_source_file = Some(path.to_string());
            node
        };
        let first = from("content/a.json");
        let mut second = from("content/b.json");
        assert!(first.same_content_as(&second));

        second.children[0].value = Some("goodbye".to_string());
        assert!(!first.same_content_as(&second));
    }

    #[test]
    fn visitor_sees_positions_in_sub_node_order() {
        struct Positions(Vec<(Option<String>, Vec<usize>)>);
        impl ContentVisitor for Positions {
            fn enter(&mut self, node: &ContentNode, position: &[usize]) {
                self.0.push((node.title.clone(), position.to_vec()));
            }
        }

        let root = parse(json!({
            "type": "choiceQuestion", "title": "q",
            "children": [{"type": "content", "title": "a"}],
            "choices": [{"type": "choice", "title": "b",
                         "explanation": {"type": "content", "title": "c"}}]
        }));
        let mut seen = Positions(Vec::new());
        root.accept(&mut seen);

        let titled = |title: &str, position: &[usize]| (Some(title.to_string()), position.to_vec());
        assert_eq!(
            seen.0,
            vec![
                titled("q", &[]),
                titled("a", &[0]),
                titled("b", &[1]),
                titled("c", &[1, 0]),
            ]
        );
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let result: Result<ContentNode, _> =
            serde_json::from_value(json!({"type": "hologram", "id": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn numeric_question_round_trips_nested_fields() {
        let source = json!({
            "id": "q1",
            "type": "numericQuestion",
            "requireUnits": false,
            "hints": [{"type": "content", "value": "think"}],
            "choices": [
                {"type": "quantity", "value": "9.81", "correct": true,
                 "explanation": {"type": "content", "value": "gravity"}}
            ]
        });
        let node = parse(source);
        let ContentKind::NumericQuestion(fields) = &node.kind else {
            panic!("expected numeric question, got {}", node.type_tag());
        };
        assert!(!fields.requires_units());
        assert_eq!(fields.question.choices.len(), 1);

        let reparsed = parse(serde_json::to_value(&node).expect("serializes"));
        assert_eq!(reparsed, node);
    }

    #[test]
    fn sub_nodes_cover_children_and_nested_fields_in_order() {
        let node = ContentNode::new(ContentKind::ChoiceQuestion(QuestionFields {
            answer: Some(Box::new(ContentNode::default().with_value("answer"))),
            hints: vec![ContentNode::default().with_value("hint")],
            default_feedback: None,
            choices: vec![ContentNode::new(ContentKind::Choice(ChoiceFields {
                correct: true,
                explanation: Some(Box::new(ContentNode::default().with_value("why"))),
            }))],
        }))
        .with_children(vec![ContentNode::default().with_value("stem")]);

        let mut values = Vec::new();
        node.for_each_node(&mut |n| {
            if let Some(value) = n.value.as_deref() {
                values.push(value);
            }
        });
        assert_eq!(values, vec!["stem", "answer", "hint", "why"]);
    }

    #[test]
    fn related_ids_include_superseded_by() {
        let node = parse(json!({
            "type": "questionPage",
            "id": "old",
            "supersededBy": "new",
            "relatedContent": ["a", "b"]
        }));
        assert_eq!(node.related_content_ids(), vec!["a", "b", "new"]);
    }

    #[test]
    fn same_content_ignores_source_file() {
        let mut a = ContentNode::default().with_id("x").with_value("v");
        let mut b = a.clone();
        a.canonical_source_file = Some("one.json".to_string());
        b.canonical_source_file = Some("two.json".to_string());
        assert!(a.same_content_as(&b));

        b.value = Some("w".to_string());
        assert!(!a.same_content_as(&b));
    }

    #[test]
    fn has_value_ignores_blank_strings() {
        assert!(!ContentNode::default().with_value("  ").has_value());
        assert!(ContentNode::default().with_value("x").has_value());
    }
}
