//! Slash-path lookup into a data model
//!
//! Widgets bind their fields to paths such as `/workout/title`. Resolution is
//! lenient: any miss yields `None`, never an error.

use serde_json::Value;

use crate::surface::DataModel;

/// Resolve `path` against `data`
///
/// The path must start with `/`. Each segment descends one object key;
/// numeric segments also index into arrays. Returns `None` as soon as a key
/// is missing or a scalar is reached before the path is exhausted.
///
/// ```
/// use a2ui_core::protocol::resolve_pointer;
/// use serde_json::json;
///
/// let data = json!({"workout": {"title": "Push"}});
/// let data = data.as_object().unwrap();
/// assert_eq!(resolve_pointer(data, "/workout/title"), Some(&json!("Push")));
/// assert_eq!(resolve_pointer(data, "workout/title"), None);
/// ```
#[must_use]
pub fn resolve_pointer<'a>(data: &'a DataModel, path: &str) -> Option<&'a Value> {
    let rest = path.strip_prefix('/')?;
    let mut segments = rest.split('/');

    // The root is a map rather than a Value, so take the first step by hand
    let first = segments.next()?;
    let mut current = data.get(first)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
