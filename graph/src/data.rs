use hashbrown::HashMap;

pub type PortName = String;

pub type Value = serde_json::Value;

/// Plain key/value object handed to and returned from node logic.
pub type InputValues = serde_json::Map<String, Value>;
pub type OutputValues = serde_json::Map<String, Value>;

/// Map form of a node's outputs as stored in the cache.
pub type PortValues = HashMap<PortName, Value>;

/// Reserved key marking a failed result.
pub const ERROR_KEY: &str = "$error";

pub fn error_values(message: impl Into<String>) -> OutputValues {
    let mut values = OutputValues::new();
    values.insert(ERROR_KEY.to_string(), Value::String(message.into()));
    values
}

pub fn error_message(values: &OutputValues) -> Option<String> {
    values.get(ERROR_KEY).map(|value| match value {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    })
}

pub fn is_error(values: &OutputValues) -> bool {
    values.contains_key(ERROR_KEY)
}

pub fn to_port_values(values: &OutputValues) -> PortValues {
    values
        .iter()
        .map(|(port, value)| (port.clone(), value.clone()))
        .collect()
}

pub fn to_output_values(values: &PortValues) -> OutputValues {
    let mut ports: Vec<(&PortName, &Value)> = values.iter().collect();
    ports.sort_by(|a, b| a.0.cmp(b.0));

    ports
        .into_iter()
        .map(|(port, value)| (port.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_sentinel_shape() {
        let values = error_values("Node failed");

        assert!(is_error(&values));
        assert_eq!(Value::Object(values.clone()), json!({"$error": "Node failed"}));
        assert_eq!(error_message(&values).as_deref(), Some("Node failed"));
    }

    #[test]
    fn non_string_error_is_rendered_as_json() {
        let mut values = OutputValues::new();
        values.insert(ERROR_KEY.to_string(), json!({"kind": "quota"}));

        assert_eq!(error_message(&values).as_deref(), Some(r#"{"kind":"quota"}"#));
    }

    #[test]
    fn port_values_conversion_keeps_entries() {
        let Value::Object(outputs) = json!({"text": "hello", "count": 2}) else {
            unreachable!()
        };

        let ports = to_port_values(&outputs);
        assert_eq!(ports.len(), 2);
        assert_eq!(ports["count"], json!(2));

        assert_eq!(to_output_values(&ports), outputs);
    }
}
