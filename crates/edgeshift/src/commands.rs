//! Subcommand implementations.

use crate::config::Settings;
use anyhow::{bail, Context, Result};
use edgeshift_analyzer::{
    ingest_upload_with_limits, oracle_from_config, Analyzer, ArchiveLimits, MappingTable,
    TextOracle,
};
use edgeshift_migration::{
    InstantSteps, MemoryStore, MigrationService, OracleConverter, RecordStore, SimulatedSteps,
    StepExecutor,
};
use edgeshift_schema::{
    validate_analysis, validate_execution, Analysis, Credentials, ExecutionStatus,
    MigrationExecution, ProxyFile, ValidationResult,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Read an upload from disk, refusing files over the configured limit.
fn read_upload(path: &Path, limit: u64) -> Result<ProxyFile> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat {}", path.display()))?
        .len();
    if size > limit {
        bail!(
            "{} is {} bytes, above the upload limit of {} bytes",
            path.display(),
            size,
            limit
        );
    }

    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let limits = ArchiveLimits::from_upload_limit(limit);
    let proxy = ingest_upload_with_limits(&filename, &bytes, &limits)
        .with_context(|| format!("Cannot parse {}", path.display()))?;
    info!(
        "Loaded {} ({}, {} bytes, sha256 {})",
        proxy.filename, proxy.file_format, proxy.size_bytes, proxy.checksum
    );
    Ok(proxy)
}

fn build_oracle(settings: &Settings) -> Result<Arc<dyn TextOracle>> {
    oracle_from_config(&settings.oracle).context("Failed to set up the oracle client")
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, json).with_context(|| format!("Cannot write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn log_analysis(analysis: &Analysis) {
    let a = &analysis.assessment;
    info!(
        "{}: score {:.1} ({}), {} policies, {} custom, effort {}",
        a.proxy_name,
        a.complexity_score,
        a.complexity_level,
        a.policy_count,
        a.custom_policies.len(),
        a.migration_effort
    );
    for mapping in &a.policy_mappings {
        info!(
            "  {} -> {} [{}]",
            mapping.source_policy, mapping.target_equivalent, mapping.complexity_tier
        );
    }
    if !a.dependencies.is_empty() {
        info!("Target servers: {}", a.dependencies.join(", "));
    }
    info!("Recommendations: {}", a.recommendations);
}

pub async fn analyze(settings: &Settings, file: &Path, out: &Path) -> Result<()> {
    let proxy = read_upload(file, settings.max_upload_bytes())?;
    let analyzer = Analyzer::new(build_oracle(settings)?)?;

    let analysis = analyzer.analyze_proxy(&proxy).await;
    log_analysis(&analysis);
    write_json(out, "analysis.json", &analysis)
}

fn read_credentials(path: &Path) -> Result<Credentials> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read credentials {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let credentials: Credentials = if is_json {
        serde_json::from_str(&text)?
    } else {
        serde_yaml::from_str(&text)?
    };
    info!("Using credentials {:?}", credentials);
    Ok(credentials)
}

pub async fn migrate(
    settings: &Settings,
    file: &Path,
    credentials: &Path,
    out: &Path,
    instant: bool,
) -> Result<()> {
    let proxy = read_upload(file, settings.max_upload_bytes())?;
    let credentials = read_credentials(credentials)?;
    let oracle = build_oracle(settings)?;

    let analysis = Analyzer::new(oracle.clone())?.analyze_proxy(&proxy).await;
    log_analysis(&analysis);
    write_json(out, "analysis.json", &analysis)?;

    let store = Arc::new(MemoryStore::new());
    store.put_proxy(proxy).await?;
    store.put_analysis(analysis.clone()).await?;
    store.put_credentials(credentials.clone()).await?;

    let steps: Arc<dyn StepExecutor> = if instant {
        Arc::new(InstantSteps)
    } else {
        Arc::new(SimulatedSteps::new(settings.steps.clone()))
    };
    let service = MigrationService::new(
        store.clone(),
        store,
        steps,
        Arc::new(OracleConverter::new(oracle)?),
        settings.pipeline.clone(),
    );

    let handle = service.start_migration(&analysis, &credentials).await?;
    let id = handle.id().to_string();
    let execution = poll_until_terminal(&service, &id).await?;
    handle.wait().await?;

    write_json(out, "execution.json", &execution)?;
    match execution.status {
        ExecutionStatus::Completed => {
            info!(
                "Deployed to {}",
                execution.deployment_reference.as_deref().unwrap_or_default()
            );
            Ok(())
        }
        _ => bail!(
            "Migration {} failed: {}",
            id,
            execution.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

async fn poll_until_terminal(service: &MigrationService, id: &str) -> Result<MigrationExecution> {
    let mut last: Option<(ExecutionStatus, String)> = None;
    loop {
        let execution = service.get_execution(id).await?;
        let seen = (execution.status, execution.current_step.clone());
        if last.as_ref() != Some(&seen) {
            info!(
                "[{:>3}%] {} - {}",
                execution.progress, execution.status, execution.current_step
            );
            last = Some(seen);
        }
        if execution.is_terminal() {
            return Ok(execution);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub fn mappings() {
    let table = MappingTable::default();
    println!("{:<22} {:<22} {:<9} NOTES", "SOURCE", "TARGET", "TIER");
    for entry in table.entries() {
        println!(
            "{:<22} {:<22} {:<9} {}",
            entry.source,
            entry.target,
            entry.tier.to_string(),
            entry.notes
        );
    }
    println!("{} known policies", table.len());
}

pub fn validate_record(analysis: Option<&Path>, execution: Option<&Path>) -> Result<()> {
    let (path, result) = match (analysis, execution) {
        (Some(path), _) => (path, validate_analysis(&read_json(path)?)?),
        (None, Some(path)) => (path, validate_execution(&read_json(path)?)?),
        (None, None) => bail!("Pass --analysis or --execution"),
    };
    report(path, &result)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn report(path: &Path, result: &ValidationResult) -> Result<()> {
    for warning in &result.warnings {
        warn!("{}: {}", path.display(), warning);
    }
    if !result.valid {
        for error in &result.errors {
            warn!("{}: {}", path.display(), error);
        }
        bail!(
            "{} failed validation with {} error(s)",
            path.display(),
            result.errors.len()
        );
    }
    info!("{} is valid", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY_XML: &str = r#"<APIProxy name="orders">
        <Policies><Policy>Quota</Policy><Policy>MysteryPolicy</Policy></Policies>
    </APIProxy>"#;

    #[test]
    fn test_read_upload_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.xml");
        std::fs::write(&path, PROXY_XML).unwrap();

        let proxy = read_upload(&path, 1024 * 1024).unwrap();
        assert_eq!(proxy.filename, "orders.xml");
        assert_eq!(proxy.size_bytes, PROXY_XML.len() as u64);

        assert!(read_upload(&path, 10).is_err());
    }

    #[test]
    fn test_read_credentials_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("creds.yaml");
        std::fs::write(
            &yaml,
            "name: demo\nedge_org: acme\nedge_env: prod\nedge_username: ops\nedge_password: pw\napigee_x_project: p\napigee_x_env: eval\napigee_x_service_account: '{}'\n",
        )
        .unwrap();
        assert_eq!(read_credentials(&yaml).unwrap().edge_org, "acme");

        let json = dir.path().join("creds.json");
        std::fs::write(
            &json,
            r#"{"id": "c1", "name": "demo", "edge_org": "acme", "edge_env": "prod", "edge_username": "ops", "edge_password": "pw", "apigee_x_project": "p", "apigee_x_env": "eval", "apigee_x_service_account": "{}"}"#,
        )
        .unwrap();
        assert_eq!(read_credentials(&json).unwrap().id, "c1");
    }

    #[tokio::test]
    async fn test_analyze_then_validate_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("orders.xml");
        std::fs::write(&file, PROXY_XML).unwrap();
        let out = dir.path().join("out");

        analyze(&Settings::default(), &file, &out).await.unwrap();

        let record = out.join("analysis.json");
        assert!(record.exists());
        validate_record(Some(&record), None).unwrap();
        assert!(validate_record(None, Some(&record)).is_err());
    }

    #[tokio::test]
    async fn test_instant_migration_writes_execution() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("orders.xml");
        std::fs::write(&file, PROXY_XML).unwrap();
        let creds = dir.path().join("creds.yaml");
        std::fs::write(
            &creds,
            "name: demo\nedge_org: acme\nedge_env: prod\nedge_username: ops\nedge_password: pw\napigee_x_project: p\napigee_x_env: eval\napigee_x_service_account: '{}'\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        migrate(&Settings::default(), &file, &creds, &out, true)
            .await
            .unwrap();

        let execution: MigrationExecution =
            serde_json::from_str(&std::fs::read_to_string(out.join("execution.json")).unwrap())
                .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.proxy_name, "orders");
        validate_record(None, Some(&out.join("execution.json"))).unwrap();
    }
}
