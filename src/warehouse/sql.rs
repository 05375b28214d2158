//! Statement builders and load-error classification.
//!
//! All statement text lives here so the catalog queries, the DDL shapes, and
//! the COPY template are testable without a connection.

use regex::Regex;
use std::sync::LazyLock;

/// Ordered column names for one table, by warehouse column ordinal.
pub const FETCH_COLUMNS: &str = "SELECT column_name FROM information_schema.columns \
     WHERE table_name = $1 AND table_schema = $2 ORDER BY ordinal_position";

/// Table existence by name match.
pub const TABLE_EXISTS: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_name = $1";

/// Schema existence by name match.
pub const SCHEMA_EXISTS: &str = "SELECT nspname FROM pg_namespace WHERE nspname = $1";

/// Load errors attributable to the staged source data rather than the
/// infrastructure: the table-load failure Redshift reports for malformed
/// rows. The severity prefix is optional so protocol messages and
/// psql-rendered messages classify identically.
static IGNORABLE_LOAD_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ERROR:\s+)?Load into table '[^']+' failed\.")
        .expect("invalid load-error pattern")
});

/// Whether a load failure message means "bad source data, discard the chunk".
pub fn is_ignorable_load_error(message: &str) -> bool {
    IGNORABLE_LOAD_ERROR.is_match(message)
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_schema_statement(schema: &str) -> String {
    format!("CREATE SCHEMA {}", quote_ident(schema))
}

/// DDL for an auto-created destination table: one fixed-width varchar column
/// per observed field, in the given order. Tables in the default schema are
/// left unqualified.
pub fn create_table_statement(
    schema: &str,
    table: &str,
    columns: &[String],
    varchar_length: u32,
) -> String {
    let target = if schema == "public" {
        quote_ident(table)
    } else {
        format!("{}.{}", quote_ident(schema), quote_ident(table))
    };

    let columns = columns
        .iter()
        .map(|column| format!("{} varchar({})", quote_ident(column), varchar_length))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {target} ({columns})")
}

/// The COPY bulk-load statement referencing an uploaded object.
#[allow(clippy::too_many_arguments)]
pub fn copy_statement(
    schema: &str,
    table: &str,
    object_uri: &str,
    aws_key_id: &str,
    aws_sec_key: &str,
    delimiter: char,
    base_options: &str,
) -> String {
    format!(
        "COPY {schema}.{table} FROM '{object_uri}' \
         CREDENTIALS 'aws_access_key_id={aws_key_id};aws_secret_access_key={aws_sec_key}' \
         DELIMITER '{delimiter}' GZIP TRUNCATECOLUMNS ESCAPE {base_options};"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignorable_load_error_signature() {
        assert!(is_ignorable_load_error(
            "ERROR:  Load into table 'access_logs' failed.  Check 'stl_load_errors' system table for details."
        ));
        assert!(is_ignorable_load_error("Load into table 'x' failed."));

        assert!(!is_ignorable_load_error(
            "ERROR:  syntax error at or near \"COPY\""
        ));
        assert!(!is_ignorable_load_error(
            "connection to server was lost"
        ));
        assert!(!is_ignorable_load_error(
            "ERROR:  permission denied for relation access_logs"
        ));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("events"), "\"events\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_create_table_statement_default_schema() {
        let columns = vec!["user".to_string(), "action".to_string()];
        assert_eq!(
            create_table_statement("public", "web", &columns, 255),
            "CREATE TABLE \"web\" (\"user\" varchar(255), \"action\" varchar(255))"
        );
    }

    #[test]
    fn test_create_table_statement_custom_schema() {
        let columns = vec!["msg".to_string()];
        assert_eq!(
            create_table_statement("logs", "web", &columns, 64),
            "CREATE TABLE \"logs\".\"web\" (\"msg\" varchar(64))"
        );
    }

    #[test]
    fn test_copy_statement_shape() {
        let statement = copy_statement(
            "public",
            "web",
            "s3://bucket/logs/x_00.gz",
            "AKIATEST",
            "secret",
            '\t',
            "FILLRECORD ACCEPTANYDATE TRUNCATECOLUMNS",
        );
        assert_eq!(
            statement,
            "COPY public.web FROM 's3://bucket/logs/x_00.gz' \
             CREDENTIALS 'aws_access_key_id=AKIATEST;aws_secret_access_key=secret' \
             DELIMITER '\t' GZIP TRUNCATECOLUMNS ESCAPE FILLRECORD ACCEPTANYDATE TRUNCATECOLUMNS;"
        );
    }
}
