//! Warm-up rule files: JSON rule objects, plus the CSV layout exported by
//! spreadsheet-driven workflows.
//!
//! CSV shape: a header row of
//! `schema,table,colNameId,colWarmUpType,priority,ttl,predicates`, then one
//! row per rule. Predicate cells are `key:value` pair lists and a row may
//! carry several of them (each double-quoted), all of which belong to the
//! one rule.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

const CSV_COLUMNS: [&str; 7] = [
    "schema",
    "table",
    "colNameId",
    "colWarmUpType",
    "priority",
    "ttl",
    "predicates",
];

/// Parse a JSON rule file: a single rule object or an array of them.
pub fn parse_json_rules(content: &str) -> Result<Vec<Value>> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| Error::Config(format!("bad rule JSON: {e}")))?;
    match value {
        Value::Array(rules) => Ok(rules),
        Value::Object(_) => Ok(vec![value]),
        other => Err(Error::Config(format!(
            "rule file must hold an object or array, got {other}"
        ))),
    }
}

/// Parse a CSV rule file into the same JSON objects the REST API accepts.
pub fn parse_csv_rules(content: &str) -> Result<Vec<Value>> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| Error::Config("rule CSV is empty".into()))?;

    let columns = split_csv_line(header);
    if columns.len() < CSV_COLUMNS.len()
        || columns
            .iter()
            .zip(CSV_COLUMNS.iter())
            .any(|(got, want)| got.trim() != *want)
    {
        return Err(Error::Config(format!(
            "rule CSV header must be '{}'",
            CSV_COLUMNS.join(",")
        )));
    }

    let mut rules = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields = split_csv_line(line);
        if fields.len() < CSV_COLUMNS.len() - 1 {
            return Err(Error::Config(format!(
                "rule CSV row {} has {} fields, expected at least {}",
                line_no + 2,
                fields.len(),
                CSV_COLUMNS.len() - 1
            )));
        }

        let priority: i64 = fields[4].trim().parse().map_err(|_| {
            Error::Config(format!(
                "rule CSV row {}: priority '{}' is not a number",
                line_no + 2,
                fields[4]
            ))
        })?;

        // Everything from the predicates column onward is one predicate
        // cell each; an empty trailing cell means no predicates.
        let predicates: Vec<Value> = fields[6..]
            .iter()
            .filter(|cell| !cell.trim().is_empty())
            .map(|cell| parse_predicate(cell))
            .collect::<Result<_>>()?;

        rules.push(json!({
            "schema": fields[0].trim(),
            "table": fields[1].trim(),
            "colNameId": fields[2].trim(),
            "colWarmUpType": fields[3].trim(),
            "priority": priority,
            "ttl": fields[5].trim(),
            "predicates": predicates,
        }));
    }
    Ok(rules)
}

/// Parse one `key:value,key:value,...` predicate cell. The sliding-window
/// day offsets are numeric in the API schema.
fn parse_predicate(cell: &str) -> Result<Value> {
    let mut predicate = Map::new();
    for pair in cell.split(',') {
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("bad predicate pair '{pair}' in '{cell}'")))?;
        let key = key.trim();
        let value = value.trim();
        let parsed = if matches!(key, "startRangeDaysBefore" | "endRangeDaysBefore") {
            value.parse::<i64>().map(Value::from).map_err(|_| {
                Error::Config(format!("predicate field {key} must be numeric, got '{value}'"))
            })?
        } else {
            Value::from(value)
        };
        predicate.insert(key.to_string(), parsed);
    }
    Ok(Value::Object(predicate))
}

/// Minimal CSV field splitter: comma-separated, double quotes enclose
/// fields that contain commas.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Narrow a rule list by table and column name.
pub fn filter_rules(rules: Vec<Value>, table: Option<&str>, column: Option<&str>) -> Vec<Value> {
    rules
        .into_iter()
        .filter(|rule| {
            table.is_none_or(|t| rule.get("table").and_then(Value::as_str) == Some(t))
                && column.is_none_or(|c| rule.get("colNameId").and_then(Value::as_str) == Some(c))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "schema,table,colNameId,colWarmUpType,priority,ttl,predicates";

    #[test]
    fn json_object_becomes_single_rule() {
        let rules = parse_json_rules(r#"{"schema": "s", "table": "t"}"#).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["table"], "t");
    }

    #[test]
    fn json_array_passes_through() {
        let rules = parse_json_rules(r#"[{"table": "a"}, {"table": "b"}]"#).unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn csv_row_without_predicates() {
        let content = format!("{HEADER}\ndefault,trips,tripid,COL_WARM_UP_TYPE_BASIC,8,PT720H,");
        let rules = parse_csv_rules(&content).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["priority"], 8);
        assert_eq!(rules[0]["predicates"], json!([]));
    }

    #[test]
    fn csv_partition_value_predicates() {
        let content = format!(
            "{HEADER}\ndefault,trips,tripid,COL_WARM_UP_TYPE_BASIC,8,PT720H,\
             \"type:PartitionValue,columnId:d_date,value:2018-01-02\",\
             \"type:PartitionValue,columnId:d_date,value:2018-01-03\""
        );
        let rules = parse_csv_rules(&content).unwrap();
        let predicates = rules[0]["predicates"].as_array().unwrap();
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[0]["columnId"], "d_date");
        assert_eq!(predicates[1]["value"], "2018-01-03");
    }

    #[test]
    fn csv_sliding_window_offsets_are_numeric() {
        let content = format!(
            "{HEADER}\ndefault,trips,char_10,COL_WARM_UP_TYPE_DATA,7,PT50M,\
             \"type:DateRangeSlidingWindow,columnId:date_date,windowDateFormat:yyyy-MM-dd,\
             startRangeDaysBefore:450,endRangeDaysBefore:448\""
        );
        let rules = parse_csv_rules(&content).unwrap();
        let predicate = &rules[0]["predicates"][0];
        assert_eq!(predicate["startRangeDaysBefore"], 450);
        assert_eq!(predicate["endRangeDaysBefore"], 448);
    }

    #[test]
    fn csv_bad_header_is_rejected() {
        let result = parse_csv_rules("a,b,c\n1,2,3");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn csv_bad_priority_is_rejected() {
        let content = format!("{HEADER}\ndefault,trips,tripid,COL_WARM_UP_TYPE_BASIC,high,PT1H,");
        assert!(matches!(parse_csv_rules(&content), Err(Error::Config(_))));
    }

    #[test]
    fn filters_by_table_and_column() {
        let rules = vec![
            json!({"table": "a", "colNameId": "x"}),
            json!({"table": "a", "colNameId": "y"}),
            json!({"table": "b", "colNameId": "x"}),
        ];
        assert_eq!(filter_rules(rules.clone(), Some("a"), None).len(), 2);
        assert_eq!(filter_rules(rules.clone(), Some("a"), Some("y")).len(), 1);
        assert_eq!(filter_rules(rules, None, None).len(), 3);
    }
}
