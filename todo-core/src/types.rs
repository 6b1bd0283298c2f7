use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Full store snapshot, keyed by list id.
pub type ListMap = BTreeMap<String, TodoList>;

/// Per-list write counters, keyed by list id.
pub type Versions = BTreeMap<String, u64>;

/// A list record exactly as it travels over the wire.
///
/// Items are kept as the JSON values clients sent: the store neither
/// validates nor normalizes them, so a replace followed by a read returns
/// the same sequence. Use [`item_text`] and [`item_completed`] to read the
/// conventional `{ text, completed }` shape out of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub todos: Vec<Value>,
}

impl TodoList {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            todos: Vec::new(),
        }
    }

    /// A list counts as completed when it has items and all of them are done.
    pub fn is_completed(&self) -> bool {
        !self.todos.is_empty() && self.todos.iter().all(item_completed)
    }
}

/// The conventional item shape. Only used to build items; stored items stay raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    pub completed: bool,
}

impl TodoItem {
    pub fn new(text: impl Into<String>, completed: bool) -> Self {
        Self {
            text: text.into(),
            completed,
        }
    }

    /// The item a client appends: empty text, not completed.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "text": self.text, "completed": self.completed })
    }
}

impl From<TodoItem> for Value {
    fn from(item: TodoItem) -> Self {
        item.to_value()
    }
}

/// `text` of an item, or "" when the item has none.
pub fn item_text(item: &Value) -> &str {
    item.get("text").and_then(Value::as_str).unwrap_or("")
}

/// Whether an item's `completed` field is set, with JSON truthiness.
pub fn item_completed(item: &Value) -> bool {
    match item.get("completed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Set one field of an item. A non-object item is replaced by an object
/// holding just that field.
fn set_item_field(item: &mut Value, key: &str, value: Value) {
    match item {
        Value::Object(fields) => {
            fields.insert(key.to_string(), value);
        }
        other => {
            let mut fields = Map::new();
            fields.insert(key.to_string(), value);
            *other = Value::Object(fields);
        }
    }
}

/// Set `text`, keeping every other field of the item.
pub fn set_item_text(item: &mut Value, text: impl Into<String>) {
    set_item_field(item, "text", Value::String(text.into()));
}

/// Set `completed`, keeping every other field of the item.
pub fn set_item_completed(item: &mut Value, completed: bool) {
    set_item_field(item, "completed", Value::Bool(completed));
}

pub fn format_etag(version: u64) -> String {
    format!("\"{}\"", version)
}

/// Parse an `ETag`/`If-Match` value of the form `"<version>"` (quotes optional).
pub fn parse_etag(value: &str) -> Option<u64> {
    value.trim().trim_matches('"').parse().ok()
}
