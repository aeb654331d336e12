//! Data model shared by the indexer and the query layer: content nodes,
//! hierarchical ids, problem records, unit lexicons and version ids.

mod content;
mod id;
mod page;
mod problem;
mod units;
mod version;

pub use content::Address;
pub use content::CardDeckFields;
pub use content::CardFields;
pub use content::ChoiceFields;
pub use content::ClozeQuestionFields;
pub use content::CodeSnippetFields;
pub use content::ContentKind;
pub use content::ContentNode;
pub use content::ContentSummary;
pub use content::ContentVisitor;
pub use content::EmailTemplateFields;
pub use content::EventFields;
pub use content::ItemChoiceFields;
pub use content::Location;
pub use content::MediaFields;
pub use content::NumericQuestionFields;
pub use content::PageFields;
pub use content::QuantityFields;
pub use content::QuestionFields;
pub use id::DEFAULT_MAX_ID_LENGTH;
pub use id::ID_SEPARATOR;
pub use id::IdError;
pub use id::IdScheme;
pub use page::ResultsPage;
pub use problem::NO_CONTENT_ERRORS_TITLE;
pub use problem::Problem;
pub use problem::ProblemDocument;
pub use problem::ProblemKey;
pub use problem::ProblemMap;
pub use problem::ProblemRecord;
pub use problem::Severity;
pub use problem::format_position;
pub use problem::placeholder_for_path;
pub use units::UnitDocument;
pub use units::UnitLexicon;
pub use units::normalize_units;
pub use version::IndexMetadata;
pub use version::TAGS_DOCUMENT_ID;
pub use version::VersionId;
