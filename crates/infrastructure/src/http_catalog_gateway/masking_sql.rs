//! SQL rendering for column mask functions.
//!
//! Each masked column gets a dedicated scalar function named
//! `<catalog>.<domain>.tabula_mask_<table>_<column>` that the platform
//! evaluates per row. Exempt identity groups see the raw value; everyone
//! else sees the strategy output. Strategies that transform text fall back
//! to nullification on non-string columns.

use tabula_domain::MaskingStrategy;

const STRING_TYPES: [&str; 4] = ["string", "varchar", "char", "text"];

/// Returns the fully qualified masking function name for a column.
pub(crate) fn function_name(catalog: &str, domain: &str, table: &str, column_name: &str) -> String {
    format!(
        "{catalog}.{domain}.tabula_mask_{}_{}",
        table.to_lowercase(),
        column_name.to_lowercase()
    )
}

/// Renders the `CREATE OR REPLACE FUNCTION` statement for a masked column.
pub(crate) fn create_function_statement(
    function_name: &str,
    column_type: &str,
    strategy: MaskingStrategy,
    exempt_groups: &[String],
) -> String {
    let masked = masked_expression(strategy, column_type);
    let body = conditional_mask(&masked, exempt_groups);
    format!(
        "CREATE OR REPLACE FUNCTION {function_name}(val {column_type})\n\
         RETURNS {column_type}\n\
         RETURN {body}"
    )
}

/// Renders the statement binding a masking function to a column.
pub(crate) fn set_mask_statement(
    qualified_table: &str,
    column_name: &str,
    function_name: &str,
) -> String {
    format!(
        "ALTER TABLE {qualified_table}\n\
         ALTER COLUMN {column_name}\n\
         SET MASK {function_name}"
    )
}

/// Renders the statement detaching a mask from a column.
pub(crate) fn drop_mask_statement(qualified_table: &str, column_name: &str) -> String {
    format!(
        "ALTER TABLE {qualified_table}\n\
         ALTER COLUMN {column_name}\n\
         DROP MASK"
    )
}

/// Renders the statement removing a masking function.
pub(crate) fn drop_function_statement(function_name: &str) -> String {
    format!("DROP FUNCTION IF EXISTS {function_name}")
}

/// Wraps a masked expression in group exemptions.
///
/// Members of any exempt group read the raw value. Without exemptions the
/// masked expression stands alone.
fn conditional_mask(masked: &str, exempt_groups: &[String]) -> String {
    if exempt_groups.is_empty() {
        return masked.to_owned();
    }

    let mut sorted: Vec<&String> = exempt_groups.iter().collect();
    sorted.sort();
    sorted.dedup();

    let branches: Vec<String> = sorted
        .iter()
        .map(|group| {
            format!(
                "WHEN is_account_group_member('{}') THEN val",
                group.replace('\'', "''")
            )
        })
        .collect();

    format!("CASE {} ELSE {masked} END", branches.join(" "))
}

/// Renders the strategy expression over a column value named `val`.
fn masked_expression(strategy: MaskingStrategy, column_type: &str) -> String {
    if strategy == MaskingStrategy::None {
        return "val".to_owned();
    }
    if !is_string_type(column_type) {
        return "NULL".to_owned();
    }

    match strategy {
        MaskingStrategy::None => "val".to_owned(),
        MaskingStrategy::Hash => "sha2(val, 256)".to_owned(),
        MaskingStrategy::Redact => {
            "CASE WHEN val IS NOT NULL THEN 'REDACTED' ELSE NULL END".to_owned()
        }
        MaskingStrategy::Partial => {
            "CASE WHEN val IS NOT NULL THEN \
             CONCAT(REPEAT('*', GREATEST(0, LENGTH(val) - 4)), SUBSTRING(val, -4)) \
             ELSE NULL END"
                .to_owned()
        }
        MaskingStrategy::Nullify => "NULL".to_owned(),
        MaskingStrategy::MaskEmail => {
            "CASE WHEN val IS NOT NULL AND INSTR(val, '@') > 0 THEN \
             CONCAT(SUBSTRING(val, 1, 2), '***@', SUBSTRING(val, INSTR(val, '@') + 1)) \
             ELSE NULL END"
                .to_owned()
        }
        MaskingStrategy::MaskPostcode => {
            "CASE WHEN val IS NOT NULL THEN \
             CONCAT(TRIM(REGEXP_EXTRACT(val, '^([A-Z]{1,2}[0-9]{1,2}[A-Z]?)', 1)), ' ***') \
             ELSE NULL END"
                .to_owned()
        }
    }
}

/// Reports whether text transformations apply to a column type.
///
/// Parameterized types such as `varchar(64)` match on their base name.
fn is_string_type(column_type: &str) -> bool {
    let base = column_type
        .split('(')
        .next()
        .unwrap_or(column_type)
        .trim()
        .to_lowercase();
    STRING_TYPES.contains(&base.as_str())
}

#[cfg(test)]
mod tests {
    use tabula_domain::MaskingStrategy;

    use super::{
        create_function_statement, drop_function_statement, drop_mask_statement, function_name,
        is_string_type, masked_expression, set_mask_statement,
    };

    #[test]
    fn function_names_lowercase_table_and_column() {
        assert_eq!(
            function_name("main", "sales", "Orders", "Customer_Email"),
            "main.sales.tabula_mask_orders_customer_email"
        );
    }

    #[test]
    fn hash_strategy_renders_a_digest_expression() {
        assert_eq!(
            masked_expression(MaskingStrategy::Hash, "string"),
            "sha2(val, 256)"
        );
    }

    #[test]
    fn redact_strategy_replaces_present_values() {
        assert_eq!(
            masked_expression(MaskingStrategy::Redact, "varchar(64)"),
            "CASE WHEN val IS NOT NULL THEN 'REDACTED' ELSE NULL END"
        );
    }

    #[test]
    fn partial_strategy_keeps_the_last_four_characters() {
        let expression = masked_expression(MaskingStrategy::Partial, "string");
        assert!(expression.contains("REPEAT('*', GREATEST(0, LENGTH(val) - 4))"));
        assert!(expression.contains("SUBSTRING(val, -4)"));
    }

    #[test]
    fn email_strategy_preserves_the_domain() {
        let expression = masked_expression(MaskingStrategy::MaskEmail, "string");
        assert!(expression.contains("SUBSTRING(val, 1, 2)"));
        assert!(expression.contains("'***@'"));
        assert!(expression.contains("INSTR(val, '@') + 1"));
    }

    #[test]
    fn postcode_strategy_keeps_the_outward_code() {
        let expression = masked_expression(MaskingStrategy::MaskPostcode, "string");
        assert!(expression.contains("REGEXP_EXTRACT(val, '^([A-Z]{1,2}[0-9]{1,2}[A-Z]?)', 1)"));
        assert!(expression.contains("' ***'"));
    }

    #[test]
    fn text_strategies_nullify_non_string_columns() {
        assert_eq!(masked_expression(MaskingStrategy::Hash, "bigint"), "NULL");
        assert_eq!(
            masked_expression(MaskingStrategy::MaskEmail, "decimal(10,2)"),
            "NULL"
        );
        assert_eq!(masked_expression(MaskingStrategy::None, "bigint"), "val");
    }

    #[test]
    fn parameterized_string_types_count_as_strings() {
        assert!(is_string_type("varchar(64)"));
        assert!(is_string_type("CHAR(2)"));
        assert!(is_string_type("string"));
        assert!(!is_string_type("timestamp"));
        assert!(!is_string_type("decimal(10,2)"));
    }

    #[test]
    fn exempt_groups_are_sorted_into_case_branches() {
        let statement = create_function_statement(
            "main.sales.tabula_mask_orders_email",
            "string",
            MaskingStrategy::Hash,
            &["grp-zeta".to_owned(), "grp-alpha".to_owned()],
        );

        assert_eq!(
            statement,
            "CREATE OR REPLACE FUNCTION main.sales.tabula_mask_orders_email(val string)\n\
             RETURNS string\n\
             RETURN CASE WHEN is_account_group_member('grp-alpha') THEN val \
             WHEN is_account_group_member('grp-zeta') THEN val \
             ELSE sha2(val, 256) END"
        );
    }

    #[test]
    fn quotes_in_group_names_are_doubled() {
        let statement = create_function_statement(
            "main.sales.tabula_mask_orders_email",
            "string",
            MaskingStrategy::Nullify,
            &["grp-o'brien".to_owned()],
        );
        assert!(statement.contains("is_account_group_member('grp-o''brien')"));
    }

    #[test]
    fn no_exemptions_renders_the_bare_expression() {
        let statement = create_function_statement(
            "main.sales.tabula_mask_orders_ssn",
            "string",
            MaskingStrategy::Redact,
            &[],
        );
        assert_eq!(
            statement,
            "CREATE OR REPLACE FUNCTION main.sales.tabula_mask_orders_ssn(val string)\n\
             RETURNS string\n\
             RETURN CASE WHEN val IS NOT NULL THEN 'REDACTED' ELSE NULL END"
        );
    }

    #[test]
    fn mask_binding_statements_target_the_column() {
        assert_eq!(
            set_mask_statement(
                "main.sales.orders",
                "email",
                "main.sales.tabula_mask_orders_email"
            ),
            "ALTER TABLE main.sales.orders\n\
             ALTER COLUMN email\n\
             SET MASK main.sales.tabula_mask_orders_email"
        );
        assert_eq!(
            drop_mask_statement("main.sales.orders", "email"),
            "ALTER TABLE main.sales.orders\n\
             ALTER COLUMN email\n\
             DROP MASK"
        );
        assert_eq!(
            drop_function_statement("main.sales.tabula_mask_orders_email"),
            "DROP FUNCTION IF EXISTS main.sales.tabula_mask_orders_email"
        );
    }
}
