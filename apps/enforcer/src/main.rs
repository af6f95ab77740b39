//! Tabula enforcement CLI.

#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tabula_application::{
    AccessAuditReport, CatalogPlatform, DEFAULT_MAX_CONCURRENCY, IntentResolver, PrivacyPreview,
    ReconciliationService, RegistryStore, StateInspector, TableSecurityOutcome,
};
use tabula_core::{AppError, AppResult, EnvironmentName};
use tabula_domain::{AccessControlResult, PrivacyEnforcementResult};
use tabula_infrastructure::{
    HttpCatalogGateway, HttpCatalogGatewayConfig, TracingResultSink, YamlRegistryStore,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Reconciles declared table privileges and column masks against the platform.
#[derive(Debug, Parser)]
#[command(
    name = "tabula-enforcer",
    version,
    about = "Enforce declarative access control and data masking on governed tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile privileges and masks for one table
    ApplyTable(ApplyTableArgs),
    /// Reconcile every table of a domain
    ApplyDomain(ApplyDomainArgs),
    /// Audit one table's privileges without changing anything; exits
    /// non-zero when drift is found
    Audit(InspectArgs),
    /// Preview the masking changes one table would receive
    Plan(InspectArgs),
}

#[derive(Debug, Args)]
struct ApplyTableArgs {
    #[command(flatten)]
    target: TableTarget,
    #[command(flatten)]
    registry: RegistryArgs,
    /// Compute and report deltas without mutating the platform
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ApplyDomainArgs {
    /// Domain to reconcile
    #[arg(long)]
    domain: String,
    #[command(flatten)]
    registry: RegistryArgs,
    /// Compute and report deltas without mutating the platform
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    #[command(flatten)]
    target: TableTarget,
    #[command(flatten)]
    registry: RegistryArgs,
}

#[derive(Debug, Args)]
struct TableTarget {
    /// Domain the table belongs to
    #[arg(long)]
    domain: String,
    /// Table to target
    #[arg(long)]
    table: String,
}

#[derive(Debug, Args)]
struct RegistryArgs {
    /// Deployment environment the role mappings are read for
    #[arg(long, env = "TABULA_ENVIRONMENT", default_value = "dev")]
    environment: String,
    /// Root directory of the declarative registry
    #[arg(long, env = "TABULA_REGISTRY_ROOT", default_value = "registry")]
    registry_root: PathBuf,
}

#[derive(Debug, Clone)]
struct PlatformConfig {
    base_url: String,
    api_token: String,
    warehouse_id: String,
    catalog: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
    max_concurrency: usize,
}

#[derive(Debug, Serialize)]
struct AccessSection {
    table: String,
    dry_run: bool,
    intended_count: usize,
    actual_count: usize,
    no_change_count: usize,
    grants_attempted: usize,
    grants_succeeded: usize,
    grants_failed: usize,
    revokes_attempted: usize,
    revokes_succeeded: usize,
    revokes_failed: usize,
    elapsed_ms: u64,
    errors: Vec<String>,
    summary: String,
}

#[derive(Debug, Serialize)]
struct PrivacySection {
    table: String,
    dry_run: bool,
    intended_count: usize,
    observed_count: usize,
    creates_attempted: usize,
    creates_succeeded: usize,
    creates_failed: usize,
    drops_attempted: usize,
    drops_succeeded: usize,
    drops_failed: usize,
    elapsed_ms: u64,
    errors: Vec<String>,
    summary: String,
}

#[derive(Debug, Serialize)]
struct TableEntry {
    table: String,
    access: AccessSection,
    privacy: PrivacySection,
    is_successful: bool,
}

#[derive(Debug, Serialize)]
struct TableReport {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    domain: String,
    environment: String,
    #[serde(flatten)]
    entry: TableEntry,
}

#[derive(Debug, Serialize)]
struct DomainReport {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    domain: String,
    environment: String,
    tables_total: usize,
    tables: Vec<TableEntry>,
    is_successful: bool,
}

#[derive(Debug, Serialize)]
struct AuditEnvelope {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    domain: String,
    environment: String,
    report: AccessAuditReport,
}

#[derive(Debug, Serialize)]
struct PlanEnvelope {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    domain: String,
    environment: String,
    report: PrivacyPreview,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(app_error) => {
            error!(error = %app_error, "tabula-enforcer aborted");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> AppResult<bool> {
    match cli.command {
        Command::ApplyTable(args) => {
            let service = build_service(&args.registry, args.dry_run)?;
            let outcome = service
                .reconcile_table(args.target.domain.as_str(), args.target.table.as_str())
                .await?;
            let report = TableReport {
                run_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                domain: args.target.domain,
                environment: args.registry.environment,
                entry: table_entry(args.target.table, &outcome),
            };
            print_report(&report)?;
            Ok(report.entry.is_successful)
        }
        Command::ApplyDomain(args) => {
            let service = build_service(&args.registry, args.dry_run)?;
            let outcomes = service.reconcile_domain(args.domain.as_str()).await?;

            let tables: Vec<TableEntry> = outcomes
                .iter()
                .map(|(table, outcome)| table_entry(table.clone(), outcome))
                .collect();
            let report = DomainReport {
                run_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                domain: args.domain,
                environment: args.registry.environment,
                tables_total: tables.len(),
                is_successful: tables.iter().all(|entry| entry.is_successful),
                tables,
            };
            print_report(&report)?;
            Ok(report.is_successful)
        }
        Command::Audit(args) => {
            let service = build_service(&args.registry, true)?;
            let report = service
                .audit_table(args.target.domain.as_str(), args.target.table.as_str())
                .await?;
            let is_compliant = report.is_compliant();
            let envelope = AuditEnvelope {
                run_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                domain: args.target.domain,
                environment: args.registry.environment,
                report,
            };
            print_report(&envelope)?;
            Ok(is_compliant)
        }
        Command::Plan(args) => {
            let service = build_service(&args.registry, true)?;
            let report = service
                .preview_privacy(args.target.domain.as_str(), args.target.table.as_str())
                .await?;
            let envelope = PlanEnvelope {
                run_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                domain: args.target.domain,
                environment: args.registry.environment,
                report,
            };
            print_report(&envelope)?;
            Ok(true)
        }
    }
}

fn build_service(registry_args: &RegistryArgs, dry_run: bool) -> AppResult<ReconciliationService> {
    let config = PlatformConfig::load()?;
    let environment = EnvironmentName::new(registry_args.environment.as_str())?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|build_error| {
            AppError::Internal(format!("failed to build HTTP client: {build_error}"))
        })?;

    let platform: Arc<dyn CatalogPlatform> = Arc::new(HttpCatalogGateway::new(
        http_client,
        HttpCatalogGatewayConfig {
            base_url: config.base_url,
            api_token: config.api_token,
            warehouse_id: config.warehouse_id,
            catalog: config.catalog,
            max_attempts: config.max_attempts,
            retry_backoff_ms: config.retry_backoff_ms,
        },
    ));
    let registry: Arc<dyn RegistryStore> =
        Arc::new(YamlRegistryStore::new(registry_args.registry_root.clone()));

    let intent_resolver = Arc::new(IntentResolver::new(registry, environment));
    let state_inspector = Arc::new(StateInspector::new(platform.clone()));
    let service = ReconciliationService::new(
        intent_resolver,
        state_inspector,
        platform,
        Arc::new(TracingResultSink::new()),
    )
    .with_dry_run(dry_run)
    .with_max_concurrency(config.max_concurrency);

    info!(
        environment = %registry_args.environment,
        registry_root = %registry_args.registry_root.display(),
        dry_run,
        "tabula-enforcer started"
    );

    Ok(service)
}

fn table_entry(table: String, outcome: &TableSecurityOutcome) -> TableEntry {
    TableEntry {
        table,
        access: access_section(outcome.access()),
        privacy: privacy_section(outcome.privacy()),
        is_successful: outcome.is_successful(),
    }
}

fn access_section(result: &AccessControlResult) -> AccessSection {
    AccessSection {
        table: result.table().to_owned(),
        dry_run: result.dry_run(),
        intended_count: result.intended_count(),
        actual_count: result.actual_count(),
        no_change_count: result.no_change_count(),
        grants_attempted: result.grants_attempted(),
        grants_succeeded: result.grants_succeeded(),
        grants_failed: result.grants_failed(),
        revokes_attempted: result.revokes_attempted(),
        revokes_succeeded: result.revokes_succeeded(),
        revokes_failed: result.revokes_failed(),
        elapsed_ms: result.elapsed().as_millis() as u64,
        errors: result.errors().to_vec(),
        summary: result.summary(),
    }
}

fn privacy_section(result: &PrivacyEnforcementResult) -> PrivacySection {
    PrivacySection {
        table: result.table().to_owned(),
        dry_run: result.dry_run(),
        intended_count: result.intended_count(),
        observed_count: result.observed_count(),
        creates_attempted: result.creates_attempted(),
        creates_succeeded: result.creates_succeeded(),
        creates_failed: result.creates_failed(),
        drops_attempted: result.drops_attempted(),
        drops_succeeded: result.drops_succeeded(),
        drops_failed: result.drops_failed(),
        elapsed_ms: result.elapsed().as_millis() as u64,
        errors: result.errors().to_vec(),
        summary: result.summary(),
    }
}

fn print_report<T: Serialize>(report: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(report)
        .map_err(|render_error| {
            AppError::Internal(format!("failed to render report: {render_error}"))
        })?;
    println!("{rendered}");
    Ok(())
}

impl PlatformConfig {
    fn load() -> AppResult<Self> {
        let base_url = required_env("TABULA_PLATFORM_URL")?
            .trim_end_matches('/')
            .to_owned();
        let api_token = required_env("TABULA_PLATFORM_TOKEN")?;
        let warehouse_id = required_env("TABULA_WAREHOUSE_ID")?;
        let catalog = required_env("TABULA_CATALOG")?;
        let max_attempts = parse_env_u8("TABULA_STATEMENT_MAX_ATTEMPTS", 3)?;
        let retry_backoff_ms = parse_env_u64("TABULA_STATEMENT_RETRY_BACKOFF_MS", 250)?;
        let max_concurrency = parse_env_usize("TABULA_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;

        if max_attempts == 0 {
            return Err(AppError::Validation(
                "TABULA_STATEMENT_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        if max_concurrency == 0 {
            return Err(AppError::Validation(
                "TABULA_MAX_CONCURRENCY must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            base_url,
            api_token,
            warehouse_id,
            catalog,
            max_attempts,
            retry_backoff_ms,
            max_concurrency,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u8(name: &str, default: u8) -> AppResult<u8> {
    match env::var(name) {
        Ok(value) => value.parse::<u8>().map_err(|parse_error| {
            AppError::Validation(format!("invalid {name} value '{value}': {parse_error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|parse_error| {
            AppError::Validation(format!("invalid {name} value '{value}': {parse_error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|parse_error| {
            AppError::Validation(format!("invalid {name} value '{value}': {parse_error}"))
        }),
        Err(_) => Ok(default),
    }
}
