//! SQL text for every statement the engine issues.
//!
//! Identifiers are quoted, values never appear in the text: every value goes
//! through a positional `?` parameter.

use crate::database::schema::ColumnSpec;
use crate::database::schema::SqlType;

/// Quotes an identifier so spaces and reserved words survive.
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn create_table(table: &str, columns: &[ColumnSpec]) -> String {
    let columns = columns
        .iter()
        .map(|column| format!("{} {}", quote(&column.name), column.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote(table))
}

pub(crate) fn add_column(table: &str, column: &str, sql_type: SqlType) -> String {
    format!("ALTER TABLE {} ADD COLUMN {} {sql_type}", quote(table), quote(column))
}

pub(crate) fn drop_column(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", quote(table), quote(column))
}

pub(crate) fn rename_column(table: &str, from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME COLUMN {} TO {}", quote(table), quote(from), quote(to))
}

pub(crate) fn copy_column(table: &str, from: &str, to: &str) -> String {
    format!("UPDATE {} SET {} = {}", quote(table), quote(to), quote(from))
}

/// Counts table rows equal to one parameter per key column.
pub(crate) fn count_matching(table: &str, keys: &[&str]) -> String {
    let conditions = keys
        .iter()
        .map(|key| format!("{} = ?", quote(key)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!("SELECT COUNT(*) FROM {} WHERE {conditions}", quote(table))
}

/// Finds the smallest probe row index whose keys exist in the table.
///
/// Row indexes are rendered as integer literals, key values are bound
/// row by row, `keys.len()` parameters per row.
pub(crate) fn first_matching_row(table: &str, keys: &[&str], row_indexes: &[usize]) -> String {
    let rows = row_indexes
        .iter()
        .map(|index| format!("({index}, {})", placeholders(keys.len())))
        .collect::<Vec<_>>()
        .join(", ");
    let aliases = (0..keys.len())
        .map(|index| format!("key_{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let conditions = keys
        .iter()
        .enumerate()
        .map(|(index, key)| format!("target.{} = probe.key_{index}", quote(key)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "SELECT MIN(probe.row_index) FROM (VALUES {rows}) AS probe(row_index, {aliases}) \
         JOIN {} AS target ON {conditions}",
        quote(table)
    )
}

pub(crate) fn insert(table: &str, columns: &[&str]) -> String {
    let names = columns.iter().map(|column| quote(column)).collect::<Vec<_>>().join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({})",
        quote(table),
        placeholders(columns.len())
    )
}

pub(crate) fn table_columns() -> &'static str {
    "SELECT column_name, data_type FROM information_schema.columns \
     WHERE table_name = ? ORDER BY ordinal_position"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_doubles_embedded_quotes() {
        assert_eq!(quote("unit price"), "\"unit price\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn ddl_statements() {
        let columns = vec![
            ColumnSpec::new("date", SqlType::Text),
            ColumnSpec::new("amount", SqlType::Double),
        ];
        assert_eq!(
            create_table("Sales", &columns),
            "CREATE TABLE \"Sales\" (\"date\" TEXT, \"amount\" DOUBLE)"
        );
        assert_eq!(
            add_column("Sales", "note", SqlType::Text),
            "ALTER TABLE \"Sales\" ADD COLUMN \"note\" TEXT"
        );
        assert_eq!(
            rename_column("Sales", "amount_temp", "amount"),
            "ALTER TABLE \"Sales\" RENAME COLUMN \"amount_temp\" TO \"amount\""
        );
        assert_eq!(
            copy_column("Sales", "amount", "amount_temp"),
            "UPDATE \"Sales\" SET \"amount_temp\" = \"amount\""
        );
    }

    #[test]
    fn predicates_are_parameterized() {
        assert_eq!(
            count_matching("Sales", &["date", "market"]),
            "SELECT COUNT(*) FROM \"Sales\" WHERE \"date\" = ? AND \"market\" = ?"
        );
        assert_eq!(
            insert("Sales", &["date", "market", "amount"]),
            "INSERT INTO \"Sales\" (\"date\", \"market\", \"amount\") VALUES (?, ?, ?)"
        );
        assert_eq!(
            first_matching_row("Sales", &["date", "market"], &[0, 1]),
            "SELECT MIN(probe.row_index) FROM (VALUES (0, ?, ?), (1, ?, ?)) \
             AS probe(row_index, key_0, key_1) JOIN \"Sales\" AS target \
             ON target.\"date\" = probe.key_0 AND target.\"market\" = probe.key_1"
        );
    }
}
