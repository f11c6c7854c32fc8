use serde_json::{Map, Value};

/// Transport-navigation block attached by the gateway; not business data.
const LINKS_KEY: &str = "_links";

/// Flatten a nested gateway response into a single-level map suitable for
/// storage as transaction metadata.
///
/// The `_links` key is dropped. Every nested object is flattened into
/// top-level `parent_child` keys; scalar values (and arrays) pass through
/// unchanged. Pure function, no failure modes.
pub fn normalize(response: &Map<String, Value>) -> Map<String, Value> {
    let mut output = Map::new();

    for (key, value) in response {
        if key == LINKS_KEY {
            continue;
        }

        match value {
            Value::Object(nested) => {
                for (child_key, child_value) in nested {
                    output.insert(format!("{key}_{child_key}"), child_value.clone());
                }
            }
            other => {
                output.insert(key.clone(), other.clone());
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[test]
    fn flattens_nested_objects_and_drops_links() {
        let response = as_map(json!({
            "id": "tx1",
            "_links": { "self": "x" },
            "source": { "type": "card", "id": "src1" }
        }));

        let flat = normalize(&response);

        assert_eq!(
            Value::Object(flat),
            json!({ "id": "tx1", "source_type": "card", "source_id": "src1" })
        );
    }

    #[test]
    fn scalars_pass_through_unchanged() {
        let response = as_map(json!({
            "id": "tx2",
            "approved": true,
            "amount": 1050
        }));

        let flat = normalize(&response);

        assert_eq!(flat.get("id"), Some(&json!("tx2")));
        assert_eq!(flat.get("approved"), Some(&json!(true)));
        assert_eq!(flat.get("amount"), Some(&json!(1050)));
    }

    #[test]
    fn arrays_are_not_flattened() {
        let response = as_map(json!({
            "id": "tx3",
            "actions": ["auth", "capture"]
        }));

        let flat = normalize(&response);
        assert_eq!(flat.get("actions"), Some(&json!(["auth", "capture"])));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(normalize(&Map::new()).is_empty());
    }

    #[test]
    fn links_only_payload_normalizes_to_empty() {
        let response = as_map(json!({ "_links": { "self": "https://gw/tx1" } }));
        assert!(normalize(&response).is_empty());
    }

    fn scalar_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9]{0,12}".prop_map(Value::from),
        ]
    }

    proptest! {
        // Every scalar leaf at depth <= 2 survives normalization, reachable
        // under either its own key or a parent_child key, and _links never
        // appears in the output.
        #[test]
        fn scalar_leaves_are_preserved(
            scalars in prop::collection::btree_map("[a-z]{1,8}", scalar_value(), 0..5),
            nested in prop::collection::btree_map(
                "[a-z]{1,8}",
                prop::collection::btree_map("[a-z]{1,8}", scalar_value(), 0..4),
                0..3,
            ),
        ) {
            let mut response = Map::new();
            for (k, v) in &scalars {
                response.insert(k.clone(), v.clone());
            }
            // Nested keys carry an underscore prefix so they can never
            // collide with the underscore-free scalar keys.
            for (k, children) in &nested {
                let obj: Map<String, Value> =
                    children.iter().map(|(ck, cv)| (ck.clone(), cv.clone())).collect();
                response.insert(format!("n_{k}"), Value::Object(obj));
            }
            response.insert("_links".to_string(), serde_json::json!({ "self": "x" }));

            let flat = normalize(&response);

            prop_assert!(!flat.contains_key("_links"));
            for (k, v) in &scalars {
                prop_assert_eq!(flat.get(k), Some(v));
            }
            for (k, children) in &nested {
                for (ck, cv) in children {
                    prop_assert_eq!(flat.get(&format!("n_{k}_{ck}")), Some(cv));
                }
            }
        }
    }
}
