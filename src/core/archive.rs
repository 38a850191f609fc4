use crate::config::integration::Archive;
use crate::config::IntegrationConfiguration;
use crate::core::audit::{AuditLogger, AuditPolicy};
use crate::core::orchestrator::{FailurePolicy, TransferGroup, TransferOrchestrator, TransferReport};
use crate::core::registry::LakeRegistry;
use crate::domain::model::RunContext;
use crate::domain::ports::{DatasetEngine, RelationalConnector};
use crate::utils::error::Result;
use std::sync::Arc;

/// 封存：與整合共用搬移流程，但稽核記錄器是可有可無的
pub struct ArchiveOrchestrator {
    transfers: TransferOrchestrator,
}

impl ArchiveOrchestrator {
    pub fn new(transfers: TransferOrchestrator) -> Self {
        Self { transfers }
    }

    /// 稽核記錄器建立失敗時仍然繼續封存 (記錄器改為停用)
    pub async fn establish(
        engine: Arc<dyn DatasetEngine>,
        connector: Arc<dyn RelationalConnector>,
        registry: &LakeRegistry,
    ) -> Result<Self> {
        let audit = AuditLogger::establish(AuditPolicy::Optional, connector.clone(), registry).await?;
        Ok(Self::new(TransferOrchestrator::new(engine, connector, audit)))
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.transfers = self.transfers.with_failure_policy(policy);
        self
    }

    pub fn audit(&self) -> &AuditLogger {
        self.transfers.audit()
    }

    pub async fn run_archives(
        &self,
        config: &IntegrationConfiguration,
        registry: &LakeRegistry,
    ) -> Result<TransferReport> {
        let ctx = RunContext::new(config.name.clone(), config.aws.clone());
        tracing::info!("🗄️ Running {} configured archives for {}", config.archive_count(), ctx.run_name);

        let mut groups: Vec<TransferGroup<'_, Archive>> = Vec::new();
        for (source_name, destinations) in &config.archives {
            let source = registry.get(source_name)?;
            for (destination_name, archives) in destinations {
                groups.push(TransferGroup {
                    source,
                    destination: registry.get(destination_name)?,
                    items: archives.clone(),
                });
            }
        }

        let report = self
            .transfers
            .run_groups(&ctx, groups, TransferReport::default())
            .await?;
        tracing::info!(
            "✅ Archive run {} finished: {} archived, {} failed",
            ctx.run_name,
            report.total_transferred(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// 封存 run 的進入點
pub async fn run_archives(
    config: &IntegrationConfiguration,
    engine: Arc<dyn DatasetEngine>,
    connector: Arc<dyn RelationalConnector>,
    policy: FailurePolicy,
) -> Result<TransferReport> {
    let registry = LakeRegistry::resolve(config)?;
    ArchiveOrchestrator::establish(engine, connector, &registry)
        .await?
        .with_failure_policy(policy)
        .run_archives(config, &registry)
        .await
}

