use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use lake_relay::config::IntegrationConfiguration;
use lake_relay::core::registry::LakeRegistry;
use lake_relay::core::strategy::{plan_read, plan_write};
use lake_relay::domain::ports::Transferable;
use lake_relay::utils::{logger, validation::Validate};
use lake_relay::{
    run_archives, run_integrations, CliArgs, EtlError, FailurePolicy, LocalEngine, PostgresConnector,
    RunMode, TransferReport,
};
use std::sync::Arc;

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code().max(1))
}

fn show_plan(
    registry: &LakeRegistry,
    now: DateTime<Utc>,
    kind: &str,
    source: &str,
    destination: &str,
    item: &dyn Transferable,
) -> lake_relay::Result<()> {
    let source_lake = registry.get(source)?;
    let destination_lake = registry.get(destination)?;
    println!("{} {} -> {}", kind, source, destination);
    println!("    read:  {:?}", plan_read(source_lake, item.source_identifier()));
    println!("    write: {:?}", plan_write(destination_lake, item.destination_identifier(), now));
    Ok(())
}

/// 只列出解析後的 lake 與每個搬移的讀寫計畫，不連線任何儲存
fn print_plans(config: &IntegrationConfiguration, registry: &LakeRegistry, mode: RunMode) -> lake_relay::Result<()> {
    println!("📋 {} data lakes:", registry.len());
    for lake in registry.lakes() {
        println!("  {}", lake);
    }

    let now = Utc::now();
    if mode != RunMode::Archives {
        for (source, destinations) in &config.integrations {
            for (destination, integrations) in destinations {
                for integration in integrations {
                    // 動態整合要等到 run 開始時才會展開
                    let kind = if integration.dynamic_expansion { "🔁" } else { "➡️" };
                    show_plan(registry, now, kind, source, destination, integration)?;
                }
            }
        }
    }
    if mode != RunMode::Integrations {
        for (source, destinations) in &config.archives {
            for (destination, archives) in destinations {
                for archive in archives {
                    show_plan(registry, now, "🗄️", source, destination, archive)?;
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    logger::init_logger(args.verbose, args.json_logs);

    tracing::info!("Starting lake-relay");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match IntegrationConfiguration::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    if args.dry_run {
        let registry = match LakeRegistry::resolve(&config) {
            Ok(registry) => registry,
            Err(e) => fail(&e),
        };
        if let Err(e) = print_plans(&config, &registry, args.mode) {
            fail(&e);
        }
        return Ok(());
    }

    let policy = if args.continue_on_error {
        FailurePolicy::ContinueOnError
    } else {
        FailurePolicy::AbortRun
    };
    let connector = Arc::new(PostgresConnector::new());
    let engine = Arc::new(LocalEngine::new(connector.clone()));

    let mut report = TransferReport::default();
    if matches!(args.mode, RunMode::Integrations | RunMode::All) {
        match run_integrations(&config, engine.clone(), connector.clone(), policy).await {
            Ok(integrations) => report.merge(integrations),
            Err(e) => fail(&e),
        }
    }
    if matches!(args.mode, RunMode::Archives | RunMode::All) {
        match run_archives(&config, engine.clone(), connector.clone(), policy).await {
            Ok(archives) => report.merge(archives),
            Err(e) => fail(&e),
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize transfer report")?
    );

    if !report.is_success() {
        tracing::error!("❌ {} transfers failed", report.failures.len());
        std::process::exit(1);
    }
    tracing::info!("✅ {} transfers completed successfully!", report.total_transferred());
    Ok(())
}
