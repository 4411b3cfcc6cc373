use chrono::Weekday;
use serde_json::Value;

use crate::employees::TaskConfiguration;
use crate::error::AdcrewError;

/// Turns one user's `{employee name -> configuration block}` mapping into
/// task configurations, preserving input order.
///
/// Only the outer shape is validated: the input must be an object whose
/// values are objects. Missing fields inside a block are never an error.
pub fn parse_task_configuration(
    data: &Value,
    today: Weekday,
) -> Result<Vec<TaskConfiguration>, AdcrewError> {
    let Value::Object(employees) = data else {
        return Err(AdcrewError::MalformedInput(format!(
            "task configuration must be an object of employee blocks, got {}",
            kind(data)
        )));
    };

    employees
        .iter()
        .map(|(name, block)| match block {
            Value::Object(raw) => Ok(TaskConfiguration::new(name.as_str(), raw.clone(), today)),
            other => Err(AdcrewError::MalformedInput(format!(
                "configuration for '{name}' must be an object, got {}",
                kind(other)
            ))),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employees::EmployeeRole;
    use serde_json::json;

    #[test]
    fn parses_each_employee_in_input_order() {
        let data = json!({
            "valentina": {"spell": true},
            "marcus": {"adsPerDay": "20", "days": ["Mon", "Wed", "Fri"]},
            "zed": {}
        });
        let tasks = parse_task_configuration(&data, Weekday::Mon).unwrap();
        let names: Vec<_> = tasks.iter().map(TaskConfiguration::employee_name).collect();
        assert_eq!(names, vec!["valentina", "marcus", "zed"]);
        assert_eq!(tasks[2].role(), EmployeeRole::Unknown);
        assert!(tasks[1].is_runnable());
    }

    #[test]
    fn empty_mapping_yields_no_tasks() {
        let tasks = parse_task_configuration(&json!({}), Weekday::Mon).unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn empty_blocks_are_accepted() {
        let tasks = parse_task_configuration(&json!({"marcus": {}}), Weekday::Mon).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].is_runnable());
    }

    #[test]
    fn rejects_non_object_input() {
        for bad in [json!(null), json!([1, 2]), json!("marcus"), json!(3)] {
            let err = parse_task_configuration(&bad, Weekday::Mon).unwrap_err();
            assert!(matches!(err, AdcrewError::MalformedInput(_)), "{bad}");
        }
    }

    #[test]
    fn rejects_non_object_block() {
        let err = parse_task_configuration(&json!({"marcus": null}), Weekday::Mon).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed task input: configuration for 'marcus' must be an object, got null"
        );
    }
}
