//! Recursive merge of JSON objects, later layers winning.

use serde_json::{Map, Value};

/// Merges `src` into `dst`.
///
/// Objects present on both sides are merged key by key; any other value in
/// `src` replaces the one in `dst`.
pub fn merge_value(dst: &mut Value, src: &Value) {
	match (dst, src) {
		(Value::Object(dst), Value::Object(src)) => merge_map(dst, src),
		(dst, src) => *dst = src.clone(),
	}
}

/// Merges every key of `src` into `dst` with [`merge_value`] semantics.
pub fn merge_map(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
	for (key, value) in src {
		match dst.get_mut(key) {
			Some(existing) => merge_value(existing, value),
			None => {
				dst.insert(key.clone(), value.clone());
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn obj(v: Value) -> Map<String, Value> {
		match v {
			Value::Object(m) => m,
			_ => panic!("fixture must be an object"),
		}
	}

	#[test]
	fn nested_objects_merge_field_by_field() {
		let base = obj(json!({ "query": { "page": 1, "size": 20 }, "path": "/a" }));
		let over = obj(json!({ "query": { "size": 50 } }));

		let mut merged = base.clone();
		merge_map(&mut merged, &over);
		assert_eq!(Value::Object(merged), json!({ "query": { "page": 1, "size": 50 }, "path": "/a" }));
	}

	#[test]
	fn scalars_and_arrays_are_replaced() {
		let mut dst = json!({ "tags": [1, 2], "path": "/a" });
		merge_value(&mut dst, &json!({ "tags": [3], "path": null }));
		assert_eq!(dst, json!({ "tags": [3], "path": null }));
	}

	#[test]
	fn object_replaces_scalar() {
		let mut dst = json!({ "query": "raw" });
		merge_value(&mut dst, &json!({ "query": { "q": 1 } }));
		assert_eq!(dst, json!({ "query": { "q": 1 } }));
	}

	#[test]
	fn source_layer_is_left_untouched() {
		let mut dst = obj(json!({ "query": { "page": 1 } }));
		let src = obj(json!({ "query": { "page": 2, "size": 5 } }));
		merge_map(&mut dst, &src);
		assert_eq!(dst["query"], json!({ "page": 2, "size": 5 }));
		assert_eq!(Value::Object(src), json!({ "query": { "page": 2, "size": 5 } }));
	}
}
