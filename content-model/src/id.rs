use thiserror::Error;

pub const ID_SEPARATOR: char = '|';
pub const DEFAULT_MAX_ID_LENGTH: usize = 512;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("id is empty")]
    Empty,

    #[error("id `{segment}` contains the reserved separator `{separator}`")]
    ContainsSeparator { segment: String, separator: char },

    #[error("id `{id}` is {length} characters long (maximum {max})")]
    TooLong { id: String, length: usize, max: usize },
}

/// Rules for composing hierarchical ids.
///
/// A nested node's effective id is its nearest id-bearing ancestor's
/// effective id, the separator, then the node's own declared segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdScheme {
    separator: char,
    max_length: usize,
}

impl Default for IdScheme {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ID_LENGTH)
    }
}

impl IdScheme {
    pub fn new(max_length: usize) -> Self {
        Self {
            separator: ID_SEPARATOR,
            max_length,
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Checks a declared id segment.
    pub fn check_segment(&self, segment: &str) -> Result<(), IdError> {
        if segment.is_empty() {
            return Err(IdError::Empty);
        }
        if segment.contains(self.separator) {
            return Err(IdError::ContainsSeparator {
                segment: segment.to_string(),
                separator: self.separator,
            });
        }
        self.check_length(segment)
    }

    /// Checks a full effective id: length bound and no empty segments.
    pub fn check_effective(&self, id: &str) -> Result<(), IdError> {
        if id.split(self.separator).any(str::is_empty) {
            return Err(IdError::Empty);
        }
        self.check_length(id)
    }

    pub fn compose(&self, parent: Option<&str>, segment: &str) -> Result<String, IdError> {
        self.check_segment(segment)?;
        let id = match parent {
            Some(parent) => format!("{parent}{}{segment}", self.separator),
            None => segment.to_string(),
        };
        self.check_length(&id)?;
        Ok(id)
    }

    pub fn parent_of<'a>(&self, id: &'a str) -> Option<&'a str> {
        id.rsplit_once(self.separator).map(|(parent, _)| parent)
    }

    /// The id of the top-level node an effective id lives under.
    pub fn root_of<'a>(&self, id: &'a str) -> &'a str {
        id.split(self.separator).next().unwrap_or(id)
    }

    fn check_length(&self, id: &str) -> Result<(), IdError> {
        let length = id.chars().count();
        if length > self.max_length {
            return Err(IdError::TooLong {
                id: id.to_string(),
                length,
                max: self.max_length,
            });
        }
        Ok(())
    }
}
