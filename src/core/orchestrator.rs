use crate::config::datalake::DataLake;
use crate::config::integration::Integration;
use crate::config::IntegrationConfiguration;
use crate::core::audit::{AuditLogger, AuditPolicy};
use crate::core::expander::Expandable;
use crate::core::registry::LakeRegistry;
use crate::core::strategy::{plan_read, plan_write};
use crate::domain::model::RunContext;
use crate::domain::ports::{DatasetEngine, RelationalConnector, Transferable};
use crate::utils::error::{EtlError, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// 單一搬移的生命週期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Started,
    Reading,
    Writing,
    Succeeded,
    Failed,
}

impl TransferState {
    pub fn can_advance_to(self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Pending, Started)
                | (Started, Reading)
                | (Reading, Writing)
                | (Reading, Failed)
                | (Writing, Succeeded)
                | (Writing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Succeeded | TransferState::Failed)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct TransferAttempt<'a> {
    source: &'a str,
    destination: &'a str,
    state: TransferState,
}

impl<'a> TransferAttempt<'a> {
    fn new(item: &'a dyn Transferable) -> Self {
        Self {
            source: item.source_identifier(),
            destination: item.destination_identifier(),
            state: TransferState::Pending,
        }
    }

    fn advance(&mut self, next: TransferState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(EtlError::StateTransitionError {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("{} -> {}: {} -> {}", self.source, self.destination, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// 搬移失敗時 run 的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 第一個失敗就結束整個 run，之後的搬移都不執行
    #[default]
    AbortRun,
    /// 記錄失敗後繼續下一個搬移
    ContinueOnError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTransfer {
    pub source_lake: String,
    pub destination_lake: String,
    pub source: String,
    pub destination: String,
    pub error: String,
}

/// 來源 lake -> 目的地 lake -> 已寫入的目的地識別
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub destinations: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    pub failures: Vec<FailedTransfer>,
}

impl TransferReport {
    fn open_group(&mut self, source_lake: &str, destination_lake: &str) {
        self.destinations
            .entry(source_lake.to_string())
            .or_default()
            .entry(destination_lake.to_string())
            .or_default();
    }

    fn record(&mut self, source_lake: &str, destination_lake: &str, identifier: String) {
        self.destinations
            .entry(source_lake.to_string())
            .or_default()
            .entry(destination_lake.to_string())
            .or_default()
            .push(identifier);
    }

    pub fn transferred(&self, source_lake: &str, destination_lake: &str) -> &[String] {
        self.destinations
            .get(source_lake)
            .and_then(|d| d.get(destination_lake))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total_transferred(&self) -> usize {
        self.destinations
            .values()
            .flat_map(|d| d.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// 合併另一個 run 的結果（同時執行整合與封存時使用）
    pub fn merge(&mut self, other: TransferReport) {
        for (source, destinations) in other.destinations {
            for (destination, identifiers) in destinations {
                self.open_group(&source, &destination);
                for identifier in identifiers {
                    self.record(&source, &destination, identifier);
                }
            }
        }
        self.failures.extend(other.failures);
    }
}

fn as_read_error(error: EtlError, lake: &DataLake, identifier: &str) -> EtlError {
    match error {
        EtlError::ReadError { .. } => error,
        other => EtlError::ReadError {
            lake: lake.name.clone(),
            identifier: identifier.to_string(),
            message: other.to_string(),
        },
    }
}

fn as_write_error(error: EtlError, lake: &DataLake, identifier: &str) -> EtlError {
    match error {
        EtlError::WriteError { .. } => error,
        other => EtlError::WriteError {
            lake: lake.name.clone(),
            identifier: identifier.to_string(),
            message: other.to_string(),
        },
    }
}

/// 一組 (來源, 目的地) 之下依序執行的項目
pub(crate) struct TransferGroup<'a, T> {
    pub source: &'a DataLake,
    pub destination: &'a DataLake,
    pub items: Vec<T>,
}

pub struct TransferOrchestrator {
    engine: Arc<dyn DatasetEngine>,
    connector: Arc<dyn RelationalConnector>,
    audit: AuditLogger,
    policy: FailurePolicy,
}

impl TransferOrchestrator {
    pub fn new(
        engine: Arc<dyn DatasetEngine>,
        connector: Arc<dyn RelationalConnector>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            engine,
            connector,
            audit,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// 解析 lake、建立必要的稽核記錄器並執行所有整合
    pub async fn establish(
        engine: Arc<dyn DatasetEngine>,
        connector: Arc<dyn RelationalConnector>,
        registry: &LakeRegistry,
    ) -> Result<Self> {
        let audit = AuditLogger::establish(AuditPolicy::Required, connector.clone(), registry).await?;
        Ok(Self::new(engine, connector, audit))
    }

    /// 單一搬移：讀取、寫入並記錄稽核事件。成功時回傳目的地識別。
    pub async fn transfer(
        &self,
        ctx: &RunContext,
        source: &DataLake,
        destination: &DataLake,
        item: &dyn Transferable,
    ) -> Result<String> {
        let mut attempt = TransferAttempt::new(item);
        let started_at = Utc::now();

        attempt.advance(TransferState::Started)?;
        self.audit
            .log_started(&ctx.run_name, destination, item, started_at)
            .await;

        attempt.advance(TransferState::Reading)?;
        tracing::info!(
            "Transferring {} with query {}",
            source.name,
            item.source_identifier()
        );
        let timer = Instant::now();
        let read_plan = plan_read(source, item.source_identifier());
        let dataset = match self.engine.read(source, &read_plan, ctx).await {
            Ok(dataset) => dataset,
            Err(e) => {
                attempt.advance(TransferState::Failed)?;
                self.audit
                    .log_failed(&ctx.run_name, destination, item, started_at)
                    .await;
                tracing::error!(
                    "❌ Integration {} failed going from {} to {}: {}",
                    ctx.run_name,
                    item.source_identifier(),
                    item.destination_identifier(),
                    e
                );
                return Err(as_read_error(e, source, item.source_identifier()));
            }
        };
        tracing::info!("📥 Read {} rows from source: {}", dataset.len(), source);

        attempt.advance(TransferState::Writing)?;
        let write_plan = plan_write(destination, item.destination_identifier(), Utc::now());
        tracing::info!("Created writer for destination: {}", destination);

        if let Err(e) = self
            .engine
            .write(dataset, destination, &write_plan, ctx)
            .await
        {
            attempt.advance(TransferState::Failed)?;
            self.audit
                .log_failed(&ctx.run_name, destination, item, started_at)
                .await;
            tracing::error!(
                "❌ Integration {} failed going from {} to {}: {}",
                ctx.run_name,
                item.source_identifier(),
                item.destination_identifier(),
                e
            );
            return Err(as_write_error(e, destination, item.destination_identifier()));
        }

        // 只有資料庫目的地會記錄成功事件
        if write_plan.is_relational_target() {
            self.audit
                .log_successful(&ctx.run_name, destination, item, started_at)
                .await;
        }
        attempt.advance(TransferState::Succeeded)?;

        let secs = timer.elapsed().as_secs_f64();
        let mins = secs / 60.0;
        tracing::info!(
            "💾 Finished writing to name: {} in {:.3} seconds ({:.3} minutes)",
            destination.name,
            secs,
            mins
        );
        Ok(write_plan.destination_identifier().to_string())
    }

    fn handle_failure(
        &self,
        report: &mut TransferReport,
        source: &DataLake,
        destination: &DataLake,
        item: &dyn Transferable,
        error: EtlError,
    ) -> Result<()> {
        match self.policy {
            FailurePolicy::AbortRun => Err(error),
            FailurePolicy::ContinueOnError => {
                tracing::warn!("Continuing after failed transfer: {}", error);
                report.failures.push(FailedTransfer {
                    source_lake: source.name.clone(),
                    destination_lake: destination.name.clone(),
                    source: item.source_identifier().to_string(),
                    destination: item.destination_identifier().to_string(),
                    error: error.to_string(),
                });
                Ok(())
            }
        }
    }

    pub(crate) async fn run_groups<T: Transferable>(
        &self,
        ctx: &RunContext,
        groups: Vec<TransferGroup<'_, T>>,
        mut report: TransferReport,
    ) -> Result<TransferReport> {
        for group in groups {
            report.open_group(&group.source.name, &group.destination.name);
            for item in &group.items {
                match self.transfer(ctx, group.source, group.destination, item).await {
                    Ok(identifier) => report.record(&group.source.name, &group.destination.name, identifier),
                    Err(e) => self.handle_failure(&mut report, group.source, group.destination, item, e)?,
                }
            }
        }
        Ok(report)
    }

    /// 展開所有動態整合。只在 run 開始時執行一次。
    ///
    /// 每組 (來源, 目的地) 先放靜態整合，動態整合的展開結果依宣告順序接在後面。
    async fn expand_integrations<'a>(
        &self,
        config: &IntegrationConfiguration,
        registry: &'a LakeRegistry,
        report: &mut TransferReport,
    ) -> Result<Vec<TransferGroup<'a, Integration>>> {
        let mut groups = Vec::new();
        for (source_name, destinations) in &config.integrations {
            let source = registry.get(source_name)?;
            for (destination_name, integrations) in destinations {
                let destination = registry.get(destination_name)?;
                let mut items: Vec<Integration> = integrations
                    .iter()
                    .filter(|i| !i.dynamic_expansion)
                    .cloned()
                    .collect();
                for template in integrations.iter().filter(|i| i.dynamic_expansion) {
                    match template.expand(destination, self.connector.as_ref()).await {
                        Ok(expanded) => items.extend(expanded),
                        Err(e) => self.handle_failure(report, source, destination, template, e)?,
                    }
                }
                groups.push(TransferGroup {
                    source,
                    destination,
                    items,
                });
            }
        }
        Ok(groups)
    }

    pub async fn run_integrations(
        &self,
        config: &IntegrationConfiguration,
        registry: &LakeRegistry,
    ) -> Result<TransferReport> {
        let ctx = RunContext::new(config.name.clone(), config.aws.clone());
        tracing::info!(
            "🚀 Running {} configured integrations for {} (parallelism hint: {})",
            config.integration_count(),
            ctx.run_name,
            ctx.parallelism
        );

        let mut report = TransferReport::default();
        let groups = self.expand_integrations(config, registry, &mut report).await?;
        let report = self.run_groups(&ctx, groups, report).await?;

        tracing::info!(
            "✅ Run {} finished: {} transferred, {} failed",
            ctx.run_name,
            report.total_transferred(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// 整合 run 的進入點：稽核記錄器必須能建立
pub async fn run_integrations(
    config: &IntegrationConfiguration,
    engine: Arc<dyn DatasetEngine>,
    connector: Arc<dyn RelationalConnector>,
    policy: FailurePolicy,
) -> Result<TransferReport> {
    let registry = LakeRegistry::resolve(config)?;
    TransferOrchestrator::establish(engine, connector, &registry)
        .await?
        .with_failure_policy(policy)
        .run_integrations(config, &registry)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_is_linear() {
        use TransferState::*;
        assert!(Pending.can_advance_to(Started));
        assert!(Started.can_advance_to(Reading));
        assert!(Reading.can_advance_to(Writing));
        assert!(Writing.can_advance_to(Succeeded));
        assert!(Reading.can_advance_to(Failed));
        assert!(Writing.can_advance_to(Failed));

        assert!(!Pending.can_advance_to(Reading));
        assert!(!Succeeded.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Started));
        assert!(Succeeded.is_terminal());
        assert!(!Writing.is_terminal());
    }

    #[test]
    fn test_attempt_rejects_skipped_states() {
        let integration = Integration::new("orders", "orders.csv", "orders");
        let mut attempt = TransferAttempt::new(&integration);
        assert!(attempt.advance(TransferState::Writing).is_err());
        assert!(attempt.advance(TransferState::Started).is_ok());
        assert_eq!(attempt.state, TransferState::Started);
    }

    #[test]
    fn test_report_merge_keeps_groups() {
        let mut report = TransferReport::default();
        report.record("a", "b", "one".to_string());

        let mut other = TransferReport::default();
        other.open_group("a", "c");
        other.record("a", "b", "two".to_string());
        report.merge(other);

        assert_eq!(report.transferred("a", "b"), ["one".to_string(), "two".to_string()]);
        assert!(report.transferred("a", "c").is_empty());
        assert_eq!(report.total_transferred(), 2);
    }
}
