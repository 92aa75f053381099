//! Mapping between user-visible column names and the identifiers the
//! runtime sees.
use std::collections::HashMap;

use serde_json::{Map, Value};

const ENCODED_PREFIX: &str = "WorkerColumn_";
const ENCODED_SUFFIX: &str = "_Encoded";

#[derive(Debug, Clone, Default)]
pub struct ColumnEncoder {
    to_encoded: HashMap<String, String>,
    to_decoded: HashMap<String, String>,
    /// Names sorted longest first so overlapping names match greedily.
    names_by_length: Vec<String>,
    encoded_by_length: Vec<String>,
}

impl ColumnEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the table from the current dataset's column names.
    pub fn set_column_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to_encoded.clear();
        self.to_decoded.clear();
        for (index, name) in names.into_iter().enumerate() {
            let name = name.into();
            if name.is_empty() || self.to_encoded.contains_key(&name) {
                continue;
            }
            let encoded = format!("{ENCODED_PREFIX}{index}{ENCODED_SUFFIX}");
            self.to_decoded.insert(encoded.clone(), name.clone());
            self.to_encoded.insert(name, encoded);
        }

        self.names_by_length = self.to_encoded.keys().cloned().collect();
        self.names_by_length
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self.encoded_by_length = self.to_decoded.keys().cloned().collect();
        self.encoded_by_length
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    }

    pub fn len(&self) -> usize {
        self.to_encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_encoded.is_empty()
    }

    pub fn encode(&self, name: &str) -> Option<&str> {
        self.to_encoded.get(name).map(String::as_str)
    }

    pub fn decode(&self, encoded: &str) -> Option<&str> {
        self.to_decoded.get(encoded).map(String::as_str)
    }

    /// Replaces every standalone occurrence of a column name in `text`.
    pub fn encode_all(&self, text: &str) -> String {
        replace_tokens(text, &self.names_by_length, &self.to_encoded)
    }

    /// Replaces every encoded identifier in `text` by its column name.
    pub fn decode_all(&self, text: &str) -> String {
        replace_tokens(text, &self.encoded_by_length, &self.to_decoded)
    }

    /// Encodes every string in `value` that names a column.
    pub fn encode_json(&self, value: &mut Value) {
        match value {
            Value::String(text) => *text = self.encode_all(text),
            Value::Array(items) => items.iter_mut().for_each(|item| self.encode_json(item)),
            Value::Object(map) => map.values_mut().for_each(|item| self.encode_json(item)),
            _ => {}
        }
    }

    /// Decodes identifiers in every string and object key of `value`.
    pub fn decode_json(&self, value: &mut Value) {
        if self.is_empty() {
            return;
        }
        match value {
            Value::String(text) => *text = self.decode_all(text),
            Value::Array(items) => items.iter_mut().for_each(|item| self.decode_json(item)),
            Value::Object(map) => {
                let entries = std::mem::take(map);
                *map = entries
                    .into_iter()
                    .map(|(key, mut item)| {
                        self.decode_json(&mut item);
                        (self.decode_all(&key), item)
                    })
                    .collect::<Map<String, Value>>();
            }
            _ => {}
        }
    }

    /// Encodes the members of analysis options tagged by their `.meta`
    /// description with `containsColumn: true`. Everything else is left alone.
    pub fn encode_options(&self, options: &mut Value) {
        let meta = options.get(".meta").cloned().unwrap_or(Value::Null);
        self.encode_by_meta(options, &meta);
    }

    fn encode_by_meta(&self, options: &mut Value, meta: &Value) {
        if meta.is_null() {
            return;
        }
        let contains_column = meta
            .get("containsColumn")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match options {
            Value::Array(items) => {
                if contains_column {
                    items.iter_mut().for_each(|item| self.encode_json(item));
                } else if let Some(metas) = meta.as_array() {
                    for (item, item_meta) in items.iter_mut().zip(metas) {
                        self.encode_by_meta(item, item_meta);
                    }
                }
            }
            Value::Object(map) => {
                for (key, item) in map.iter_mut() {
                    if key == ".meta" {
                        continue;
                    }
                    match meta.get(key.as_str()) {
                        Some(item_meta) => self.encode_by_meta(item, item_meta),
                        None if contains_column => self.encode_json(item),
                        None => {}
                    }
                }
            }
            Value::String(text) if contains_column => *text = self.encode_all(text),
            _ => {}
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Greedy, longest-first replacement of `tokens` that are not glued to
/// identifier characters on either side.
fn replace_tokens(text: &str, tokens: &[String], table: &HashMap<String, String>) -> String {
    if tokens.is_empty() {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied_up_to = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if !text.is_char_boundary(pos) {
            pos += 1;
            continue;
        }
        let boundary_before = !text[..pos].chars().next_back().is_some_and(is_identifier_char);
        let matched = boundary_before
            .then(|| {
                tokens.iter().find(|token| {
                    text[pos..].starts_with(token.as_str())
                        && !text[pos + token.len()..]
                            .chars()
                            .next()
                            .is_some_and(is_identifier_char)
                })
            })
            .flatten();

        match matched.and_then(|token| table.get(token).map(|with| (token, with))) {
            Some((token, replacement)) => {
                out.push_str(&text[copied_up_to..pos]);
                out.push_str(replacement);
                pos += token.len();
                copied_up_to = pos;
            }
            None => pos += 1,
        }
    }
    out.push_str(&text[copied_up_to..]);
    out
}
