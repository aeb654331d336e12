use corpus_model::ContentNode;

/// Deserializes one content file by its declared type tags.
pub fn parse_content(path: &str, bytes: &[u8]) -> Result<ContentNode, String> {
    serde_json::from_slice::<ContentNode>(bytes)
        .map_err(|err| format!("Unable to deserialise {path}: {err}"))
}
