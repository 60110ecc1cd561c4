use colored::*;
use serde_json::Value;
use std::collections::BTreeSet;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::domain::row::RowMap;

/// Render one snapshot as a table, one printed block per refresh.
pub fn print_snapshot(title: &str, rows: &[RowMap]) {
    println!();
    println!("{}", title.bold().cyan());

    if rows.is_empty() {
        println!("{}", "No rows.".italic());
        return;
    }

    // Union of all column names; rows are schemaless so they may disagree.
    let columns: Vec<&String> = rows
        .iter()
        .flat_map(|r| r.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| c.bold().to_string()));
    for row in rows {
        builder.push_record(
            columns
                .iter()
                .map(|c| row.get(*c).map(render_value).unwrap_or_default()),
        );
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");
    println!("{} row(s)", rows.len().to_string().bright_yellow());
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value_strips_quotes_from_strings() {
        assert_eq!(render_value(&json!("shipped")), "shipped");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&Value::Null), "");
    }
}
