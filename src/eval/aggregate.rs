//! Averaging of scored results, per result name and per runner.
//!
//! Each group is seeded with a copy of its first member's data. Numeric
//! fields of the other members are summed into it, and every numeric field
//! is then divided by the group size and rounded to two decimals. Non-numeric
//! fields only survive from the first member.

use serde_json::Value;

use super::types::{as_number, number_value, DataMap, EvaluatorResult};

/// Average results sharing a name. Groups keep first-seen order.
pub fn average_across_cases(results: &[EvaluatorResult]) -> Vec<EvaluatorResult> {
    group_by(results, |r| r.name.clone())
        .into_iter()
        .map(|(_, members)| average_group(&members))
        .collect()
}

/// Average per name first, then average those records per runner. Each
/// output record is named after its runner.
pub fn average_across_runners(results: &[EvaluatorResult]) -> Vec<EvaluatorResult> {
    let by_case = average_across_cases(results);
    group_by(&by_case, |r| r.metadata.runner.clone().unwrap_or_default())
        .into_iter()
        .map(|(runner, members)| {
            let mut averaged = average_group(&members);
            averaged.name = runner;
            averaged
        })
        .collect()
}

fn group_by<'a, F>(results: &'a [EvaluatorResult], key: F) -> Vec<(String, Vec<&'a EvaluatorResult>)>
where
    F: Fn(&EvaluatorResult) -> String,
{
    let mut groups: Vec<(String, Vec<&EvaluatorResult>)> = Vec::new();
    for result in results {
        let k = key(result);
        match groups.iter_mut().find(|(name, _)| *name == k) {
            Some((_, members)) => members.push(result),
            None => groups.push((k, vec![result])),
        }
    }
    groups
}

fn average_group(members: &[&EvaluatorResult]) -> EvaluatorResult {
    let seed = members[0];
    let mut data: DataMap = seed.data.clone();

    for other in &members[1..] {
        for (key, value) in &other.data {
            let Some(x) = as_number(value) else {
                continue;
            };
            let base = data.get(key).and_then(as_number).unwrap_or(0.0);
            data.insert(key.clone(), number_value(base + x));
        }
    }

    let count = members.len() as f64;
    for value in data.values_mut() {
        if let Some(x) = as_number(value) {
            *value = number_value(round2(x / count));
        }
    }

    EvaluatorResult {
        name: seed.name.clone(),
        metadata: seed.metadata.clone(),
        data,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Numeric keys present in any of `results`, in first-seen order.
pub fn numeric_keys(results: &[EvaluatorResult]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for result in results {
        for (key, value) in &result.data {
            if matches!(value, Value::Number(_)) && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::types::ResultMetadata;
    use serde_json::json;

    fn result(name: &str, runner: &str, data: Value) -> EvaluatorResult {
        EvaluatorResult {
            name: name.to_string(),
            metadata: ResultMetadata {
                runner: Some(runner.to_string()),
                ..Default::default()
            },
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(average_across_cases(&[]).is_empty());
        assert!(average_across_runners(&[]).is_empty());
    }

    #[test]
    fn test_single_result_is_rounded_and_idempotent() {
        let input = vec![result("r - c - s", "r", json!({"score": 0.3333333, "label": "x"}))];

        let once = average_across_cases(&input);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0].data, json!({"score": 0.33, "label": "x"}).as_object().cloned().unwrap());

        let twice = average_across_cases(&once);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_groups_by_name_in_first_seen_order() {
        let input = vec![
            result("b", "r", json!({"x": 1})),
            result("a", "r", json!({"x": 10})),
            result("b", "r", json!({"x": 2})),
            result("b", "r", json!({"x": 4})),
        ];
        let averaged = average_across_cases(&input);

        let names: Vec<&str> = averaged.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(averaged[0].number("x"), Some(2.33));
        assert_eq!(averaged[1].number("x"), Some(10.0));
    }

    #[test]
    fn test_only_seed_non_numeric_fields_survive() {
        let input = vec![
            result("n", "r", json!({"x": 2, "seed_only": "keep"})),
            result("n", "r", json!({"x": 4, "late": "dropped", "late_num": 6})),
        ];
        let averaged = &average_across_cases(&input)[0];

        assert_eq!(averaged.data["seed_only"], json!("keep"));
        assert!(!averaged.data.contains_key("late"));
        assert_eq!(averaged.number("x"), Some(3.0));
        // Missing from the seed counts as 0, but still divides by the group size.
        assert_eq!(averaged.number("late_num"), Some(3.0));
    }

    #[test]
    fn test_average_across_runners() {
        let input = vec![
            result("alpha - c1 - s", "alpha", json!({"x": 1})),
            result("alpha - c1 - s", "alpha", json!({"x": 3})),
            result("alpha - c2 - s", "alpha", json!({"x": 6})),
            result("beta - c1 - s", "beta", json!({"x": 5})),
        ];
        let averaged = average_across_runners(&input);

        assert_eq!(averaged.len(), 2);
        assert_eq!(averaged[0].name, "alpha");
        assert_eq!(averaged[0].number("x"), Some(4.0));
        assert_eq!(averaged[1].name, "beta");
        assert_eq!(averaged[1].number("x"), Some(5.0));
    }

    #[test]
    fn test_numeric_keys() {
        let input = vec![
            result("a", "r", json!({"x": 1, "s": "t"})),
            result("b", "r", json!({"y": 2.5, "x": 0})),
        ];
        let mut keys = numeric_keys(&input);
        keys.sort();
        assert_eq!(keys, vec!["x", "y"]);
    }
}
