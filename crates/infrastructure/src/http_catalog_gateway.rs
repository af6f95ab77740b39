use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tabula_application::{ApplyColumnMaskRequest, CatalogPlatform, ColumnMaskRow, GrantRow};
use tabula_core::{AppError, AppResult};
use tabula_domain::Privilege;
use tracing::debug;

mod masking_sql;

/// Connection settings for [`HttpCatalogGateway`].
#[derive(Debug, Clone)]
pub struct HttpCatalogGatewayConfig {
    /// Base URL of the platform workspace, without a trailing slash.
    pub base_url: String,
    /// Bearer token submitted with every statement.
    pub api_token: String,
    /// Warehouse the statements execute on.
    pub warehouse_id: String,
    /// Catalog holding the governed domains as schemas.
    pub catalog: String,
    /// Maximum statement submission attempts, minimum one.
    pub max_attempts: u8,
    /// Base retry backoff in milliseconds, minimum 50.
    pub retry_backoff_ms: u64,
}

/// Catalog platform adapter submitting SQL over the statement endpoint.
///
/// Tables are addressed as `<catalog>.<domain>.<table>`. Transient failures
/// (HTTP 5xx, 429, transport errors, statements still queued after the wait
/// timeout) are retried with a growing backoff; definitive statement
/// failures surface immediately as platform errors.
pub struct HttpCatalogGateway {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
    warehouse_id: String,
    catalog: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    wait_timeout: &'a str,
    on_wait_timeout: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    status: StatementStatus,
    #[serde(default)]
    result: Option<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<StatementError>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
}

impl HttpCatalogGateway {
    /// Creates a gateway over an existing HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: HttpCatalogGatewayConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token,
            warehouse_id: config.warehouse_id,
            catalog: config.catalog,
            max_attempts: config.max_attempts.max(1),
            retry_backoff_ms: config.retry_backoff_ms.max(50),
        }
    }

    fn qualified_table(&self, domain: &str, table: &str) -> String {
        format!("{}.{domain}.{table}", self.catalog)
    }

    async fn execute_statement(&self, statement: &str) -> AppResult<Vec<Vec<Option<String>>>> {
        let url = format!("{}/api/2.0/sql/statements", self.base_url);
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(&StatementRequest {
                    statement,
                    warehouse_id: &self.warehouse_id,
                    wait_timeout: "30s",
                    on_wait_timeout: "CANCEL",
                })
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let body: StatementResponse = response.json().await.map_err(|error| {
                        AppError::Platform(format!(
                            "failed to decode statement response: {error}"
                        ))
                    })?;

                    match body.status.state.as_str() {
                        "SUCCEEDED" => {
                            return Ok(body
                                .result
                                .map(|result| result.data_array)
                                .unwrap_or_default());
                        }
                        "PENDING" | "RUNNING" => {
                            last_error = Some(format!(
                                "statement still {} after the wait timeout",
                                body.status.state
                            ));
                        }
                        state => {
                            let message = body
                                .status
                                .error
                                .map(|error| error.message)
                                .filter(|message| !message.is_empty())
                                .unwrap_or_else(|| {
                                    format!("statement finished in state {state}")
                                });
                            return Err(AppError::Platform(message));
                        }
                    }
                }
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} from the statement endpoint",
                        response.status()
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Platform(format!(
                        "statement submission failed with status {status}: {body}"
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("statement transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                debug!(attempt, delay_ms = delay, "retrying statement submission");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Platform(last_error.unwrap_or_else(|| {
            "statement submission exhausted retries".to_owned()
        })))
    }
}

fn escape_group(identity_group: &str) -> String {
    identity_group.replace('`', "``")
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn grant_statement(qualified_table: &str, identity_group: &str, privilege: Privilege) -> String {
    format!(
        "GRANT {} ON TABLE {qualified_table} TO `{}`",
        privilege.as_str(),
        escape_group(identity_group)
    )
}

fn revoke_statement(qualified_table: &str, identity_group: &str, privilege: Privilege) -> String {
    format!(
        "REVOKE {} ON TABLE {qualified_table} FROM `{}`",
        privilege.as_str(),
        escape_group(identity_group)
    )
}

fn cell(row: &[Option<String>], index: usize) -> Option<&str> {
    row.get(index).and_then(|value| value.as_deref())
}

fn grant_rows(rows: Vec<Vec<Option<String>>>) -> Vec<GrantRow> {
    rows.iter()
        .filter_map(|row| {
            Some(GrantRow {
                principal: cell(row, 0)?.to_owned(),
                principal_kind: cell(row, 1)?.to_owned(),
                privilege: cell(row, 2)?.to_owned(),
            })
        })
        .collect()
}

fn mask_rows(rows: Vec<Vec<Option<String>>>) -> Vec<ColumnMaskRow> {
    rows.iter()
        .filter_map(|row| {
            Some(ColumnMaskRow {
                column_name: cell(row, 0)?.to_owned(),
                expression: cell(row, 1).map(str::to_owned),
            })
        })
        .collect()
}

#[async_trait]
impl CatalogPlatform for HttpCatalogGateway {
    async fn list_tables(&self, domain: &str) -> AppResult<Vec<String>> {
        let statement = format!("SHOW TABLES IN {}.{domain}", self.catalog);
        let rows = self.execute_statement(&statement).await?;

        Ok(rows
            .iter()
            .filter_map(|row| cell(row, 1).map(str::to_owned))
            .collect())
    }

    async fn granted_privileges(&self, domain: &str, table: &str) -> AppResult<Vec<GrantRow>> {
        let statement = format!(
            "SHOW GRANTS ON TABLE {}",
            self.qualified_table(domain, table)
        );
        let rows = self.execute_statement(&statement).await?;
        Ok(grant_rows(rows))
    }

    async fn column_masks(&self, domain: &str, table: &str) -> AppResult<Vec<ColumnMaskRow>> {
        let statement = format!(
            "SELECT column_name, mask_expression \
             FROM system.information_schema.column_masks \
             WHERE table_catalog = '{}' AND table_schema = '{}' AND table_name = '{}'",
            escape_literal(&self.catalog),
            escape_literal(domain),
            escape_literal(table)
        );
        let rows = self.execute_statement(&statement).await?;
        Ok(mask_rows(rows))
    }

    async fn grant_privilege(
        &self,
        domain: &str,
        table: &str,
        identity_group: &str,
        privilege: Privilege,
    ) -> AppResult<()> {
        let statement = grant_statement(
            &self.qualified_table(domain, table),
            identity_group,
            privilege,
        );
        self.execute_statement(&statement).await?;
        Ok(())
    }

    async fn revoke_privilege(
        &self,
        domain: &str,
        table: &str,
        identity_group: &str,
        privilege: Privilege,
    ) -> AppResult<()> {
        let statement = revoke_statement(
            &self.qualified_table(domain, table),
            identity_group,
            privilege,
        );
        self.execute_statement(&statement).await?;
        Ok(())
    }

    async fn apply_column_mask(&self, request: ApplyColumnMaskRequest) -> AppResult<()> {
        let qualified_table = self.qualified_table(&request.domain, &request.table);
        let function_name = masking_sql::function_name(
            &self.catalog,
            &request.domain,
            &request.table,
            &request.column_name,
        );

        let create_function = masking_sql::create_function_statement(
            &function_name,
            &request.column_type,
            request.strategy,
            &request.exempt_groups,
        );
        self.execute_statement(&create_function).await?;

        let set_mask = masking_sql::set_mask_statement(
            &qualified_table,
            &request.column_name,
            &function_name,
        );
        self.execute_statement(&set_mask).await?;
        Ok(())
    }

    async fn drop_column_mask(
        &self,
        domain: &str,
        table: &str,
        column_name: &str,
    ) -> AppResult<()> {
        let qualified_table = self.qualified_table(domain, table);
        let drop_mask = masking_sql::drop_mask_statement(&qualified_table, column_name);
        self.execute_statement(&drop_mask).await?;

        let function_name = masking_sql::function_name(&self.catalog, domain, table, column_name);
        let drop_function = masking_sql::drop_function_statement(&function_name);
        self.execute_statement(&drop_function).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tabula_domain::Privilege;

    use super::{StatementResponse, grant_rows, grant_statement, mask_rows, revoke_statement};

    #[test]
    fn grant_and_revoke_statements_match_the_platform_dialect() {
        assert_eq!(
            grant_statement("main.sales.orders", "grp-analysts", Privilege::Select),
            "GRANT SELECT ON TABLE main.sales.orders TO `grp-analysts`"
        );
        assert_eq!(
            revoke_statement("main.sales.orders", "grp-legacy", Privilege::AllPrivileges),
            "REVOKE ALL PRIVILEGES ON TABLE main.sales.orders FROM `grp-legacy`"
        );
    }

    #[test]
    fn backticks_in_group_names_are_escaped() {
        let statement = grant_statement("main.sales.orders", "grp`odd", Privilege::Modify);
        assert_eq!(
            statement,
            "GRANT MODIFY ON TABLE main.sales.orders TO `grp``odd`"
        );
    }

    #[test]
    fn grant_rows_skip_incomplete_records() {
        let rows = vec![
            vec![
                Some("grp-analysts".to_owned()),
                Some("GROUP".to_owned()),
                Some("SELECT".to_owned()),
                Some("TABLE".to_owned()),
            ],
            vec![Some("orphan".to_owned()), None, Some("SELECT".to_owned())],
            vec![Some("short".to_owned())],
        ];

        let parsed = grant_rows(rows);
        assert_eq!(parsed.len(), 1);
        assert!(
            parsed
                .first()
                .is_some_and(|row| row.principal == "grp-analysts" && row.privilege == "SELECT")
        );
    }

    #[test]
    fn mask_rows_keep_null_expressions_as_none() {
        let rows = vec![
            vec![Some("email".to_owned()), Some("mask_fn(email)".to_owned())],
            vec![Some("plain".to_owned()), None],
        ];

        let parsed = mask_rows(rows);
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().any(|row| {
            row.column_name == "plain" && row.expression.is_none()
        }));
    }

    #[test]
    fn statement_responses_decode_states_and_rows() {
        let body = r#"{
            "status": {"state": "SUCCEEDED"},
            "result": {"data_array": [["grp-analysts", "GROUP", "SELECT", "TABLE", "main.sales.orders"]]}
        }"#;

        let decoded: Result<StatementResponse, _> = serde_json::from_str(body);
        assert!(decoded.as_ref().is_ok_and(|response| {
            response.status.state == "SUCCEEDED"
                && response
                    .result
                    .as_ref()
                    .is_some_and(|result| result.data_array.len() == 1)
        }));

        let failed = r#"{
            "status": {"state": "FAILED", "error": {"message": "TABLE_OR_VIEW_NOT_FOUND"}}
        }"#;
        let decoded: Result<StatementResponse, _> = serde_json::from_str(failed);
        assert!(decoded.is_ok_and(|response| {
            response
                .status
                .error
                .is_some_and(|error| error.message == "TABLE_OR_VIEW_NOT_FOUND")
        }));
    }
}
