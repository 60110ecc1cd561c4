use crate::domain::query::QuerySpec;
use crate::domain::value_objects::{OrderDirection, Schema, TableName};

// ─────────────────────────────────────────────────────────────────────────────
// Query builders
// ─────────────────────────────────────────────────────────────────────────────

/// Quote a Postgres identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Build the snapshot query:
/// `SELECT * FROM <schema>.<table> [WHERE <field> = $1] ORDER BY <col> ASC|DESC`.
///
/// The filter value is bound as `$1` by the caller, never inlined.
pub fn build_select_query(query: &QuerySpec) -> String {
    let mut sql = format!(
        "SELECT * FROM {}.{}",
        quote_ident(&query.schema.0),
        quote_ident(&query.table.0)
    );
    if let Some(filter) = &query.filter {
        sql.push_str(&format!(" WHERE {} = $1", quote_ident(&filter.field.0)));
    }
    let dir = match query.order.direction {
        OrderDirection::Ascending => "ASC",
        OrderDirection::Descending => "DESC",
    };
    sql.push_str(&format!(
        " ORDER BY {} {}",
        quote_ident(&query.order.column.0),
        dir
    ));
    sql
}

/// Build `INSERT INTO <schema>.<table> (cols…) VALUES ($1…$n)` for the given
/// column list, in order.
pub fn build_insert_query(schema: &Schema, table: &TableName, columns: &[&str]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {}.{} ({}) VALUES ({})",
        quote_ident(&schema.0),
        quote_ident(&table.0),
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// Name of the pg_notify channel carrying changes for `table`.
pub fn notify_channel(table: &TableName) -> String {
    format!("livesync:{}", table.0)
}

/// DDL installing the notify trigger the change feed relies on: an AFTER
/// INSERT/UPDATE/DELETE row trigger that publishes
/// `{"op", "schema", "table", "row"}` JSON on the table's notify channel.
///
/// Run once per watched table (e.g. from a migration).
pub fn notify_trigger_sql(schema: &Schema, table: &TableName) -> String {
    let fn_name = quote_ident(&format!("livesync_notify_{}", table.0));
    let trigger_name = quote_ident(&format!("livesync_{}", table.0));
    let qualified = format!("{}.{}", quote_ident(&schema.0), quote_ident(&table.0));
    let channel = notify_channel(table);
    format!(
        r#"CREATE OR REPLACE FUNCTION {fn_name}() RETURNS trigger AS $$
DECLARE
  rec RECORD;
BEGIN
  rec := COALESCE(NEW, OLD);
  PERFORM pg_notify(
    '{channel}',
    json_build_object(
      'op', TG_OP,
      'schema', TG_TABLE_SCHEMA,
      'table', TG_TABLE_NAME,
      'row', row_to_json(rec)
    )::text
  );
  RETURN rec;
END;
$$ LANGUAGE plpgsql;
DROP TRIGGER IF EXISTS {trigger_name} ON {qualified};
CREATE TRIGGER {trigger_name}
AFTER INSERT OR UPDATE OR DELETE ON {qualified}
FOR EACH ROW EXECUTE FUNCTION {fn_name}();"#
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{EqFilter, OrderBy};
    use serde_json::json;

    fn query(filter: Option<EqFilter>) -> QuerySpec {
        QuerySpec {
            schema: Schema("public".into()),
            table: TableName("order_updates".into()),
            order: OrderBy::descending("time"),
            filter,
        }
    }

    #[test]
    fn test_select_without_filter() {
        let q = build_select_query(&query(None));
        assert_eq!(
            q,
            r#"SELECT * FROM "public"."order_updates" ORDER BY "time" DESC"#
        );
    }

    #[test]
    fn test_select_with_filter_uses_bind_placeholder() {
        let q = build_select_query(&query(Some(EqFilter::new("order_id", json!(42)))));
        assert_eq!(
            q,
            r#"SELECT * FROM "public"."order_updates" WHERE "order_id" = $1 ORDER BY "time" DESC"#
        );
        assert!(!q.contains("42"), "filter values are bound, not inlined");
    }

    #[test]
    fn test_select_ascending_direction() {
        let mut spec = query(None);
        spec.order = OrderBy::ascending("created_at");
        let q = build_select_query(&spec);
        assert!(q.ends_with(r#"ORDER BY "created_at" ASC"#));
    }

    #[test]
    fn test_quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn test_insert_query_numbering() {
        let q = build_insert_query(
            &Schema("public".into()),
            &TableName("contacts".into()),
            &["email", "name"],
        );
        assert_eq!(
            q,
            r#"INSERT INTO "public"."contacts" ("email", "name") VALUES ($1, $2)"#
        );
    }

    #[test]
    fn test_notify_trigger_ddl_shape() {
        let ddl = notify_trigger_sql(&Schema("public".into()), &TableName("orders".into()));
        assert!(ddl.contains("pg_notify"));
        assert!(ddl.contains("'livesync:orders'"));
        assert!(ddl.contains("AFTER INSERT OR UPDATE OR DELETE"));
        assert!(ddl.contains(r#""public"."orders""#));
        assert!(ddl.contains("row_to_json"));
    }

    #[test]
    fn test_notify_channel_name() {
        assert_eq!(notify_channel(&TableName("orders".into())), "livesync:orders");
    }
}
