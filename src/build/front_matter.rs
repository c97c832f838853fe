use std::collections::BTreeMap;

/// Front matter fields, keyed by name. Sorted so serialized output is stable.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Result of splitting a source file into front matter and body.
#[derive(Debug, Default)]
pub struct ParsedContent {
    /// The parsed front matter (empty if none found)
    pub fields: Fields,
    /// The markdown body without the front matter block
    pub body: String,
}

/// Split YAML front matter from markdown content.
///
/// Front matter is a YAML block delimited by `---` at the start of the file:
///
/// ```markdown
/// ---
/// title: My Page
/// order: 2
/// ---
///
/// # Content starts here
/// ```
///
/// Front matter that fails to parse is logged and treated as empty.
pub fn parse_front_matter(content: &str) -> ParsedContent {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(after_opening) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .or_else(|| (content.trim_end() == "---").then_some(""))
    else {
        return ParsedContent {
            fields: Fields::new(),
            body: content.to_string(),
        };
    };

    // An empty block closes on the very next line.
    let (yaml, rest) = if let Some(rest) = after_opening.strip_prefix("---") {
        ("", rest)
    } else if let Some(pos) = after_opening.find("\n---") {
        (&after_opening[..pos], &after_opening[pos + 4..])
    } else {
        return ParsedContent {
            fields: Fields::new(),
            body: content.to_string(),
        };
    };

    // Drop the rest of the closing line and the blank line that follows it.
    let body = rest
        .split_once('\n')
        .map(|(_, body)| body)
        .unwrap_or("")
        .trim_start_matches(['\r', '\n']);

    let fields = if yaml.trim().is_empty() {
        Fields::new()
    } else {
        match serde_yaml::from_str::<Option<Fields>>(yaml) {
            Ok(fields) => fields.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse front matter");
                Fields::new()
            }
        }
    };

    ParsedContent {
        fields,
        body: body.to_string(),
    }
}
