use crate::config::datalake::DataLake;
use crate::core::registry::LakeRegistry;
use crate::domain::ports::{RelationalConnector, Transferable};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::{Arc, Mutex, OnceLock};
use uuid::Uuid;

pub const AUDIT_TABLE: &str = "integration_activity";

pub const CREATE_AUDIT_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS integration_activity (\
    integration_name TEXT NOT NULL, \
    host_name TEXT NOT NULL, \
    table_name TEXT NOT NULL, \
    start TIMESTAMPTZ NOT NULL, \
    outcome TEXT, \
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now())";

pub const INSERT_AUDIT_ROW_SQL: &str = "INSERT INTO integration_activity \
    (integration_name, host_name, table_name, start, outcome) \
    VALUES ($1, $2, $3, $4::text::timestamptz, $5)";

/// 生命週期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    Started,
    Succeeded,
    Failed,
}

impl AuditEvent {
    /// 開始事件沒有結果
    pub fn outcome(&self) -> Option<&'static str> {
        match self {
            AuditEvent::Started => None,
            AuditEvent::Succeeded => Some("SUCCEEDED"),
            AuditEvent::Failed => Some("FAILED"),
        }
    }
}

/// 稽核記錄器建立失敗時的處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPolicy {
    /// 建立失敗就不開始 run
    Required,
    /// 建立失敗只記錄錯誤，run 在沒有稽核的情況下繼續
    Optional,
}

/// 本機的主機識別，每個行程只解析一次
pub fn host_identifier() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        let name = hostname::get().ok().map(|name| name.to_string_lossy().into_owned());
        resolve_host(name, local_address).unwrap_or_else(|| {
            let id = Uuid::new_v4().to_string();
            tracing::warn!("Unable to get host for this machine. Using random id: {}", id);
            id
        })
    })
}

/// 主機名稱空白時改用本機位址；查不到主機名稱時回傳 None
fn resolve_host(name: Option<String>, address: impl FnOnce() -> Option<String>) -> Option<String> {
    match name {
        Some(name) if !name.trim().is_empty() => Some(name),
        Some(_) => address(),
        None => None,
    }
}

/// UDP connect 只決定路由，不會送出封包
fn local_address() -> Option<String> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

pub struct AuditLogger {
    connector: Option<Arc<dyn RelationalConnector>>,
    host: String,
    ensured: Mutex<HashSet<String>>,
}

impl AuditLogger {
    pub fn new(connector: Arc<dyn RelationalConnector>) -> Self {
        Self {
            connector: Some(connector),
            host: host_identifier().to_string(),
            ensured: Mutex::new(HashSet::new()),
        }
    }

    /// 所有事件都只寫本機日誌
    pub fn disabled() -> Self {
        Self {
            connector: None,
            host: host_identifier().to_string(),
            ensured: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_enabled(&self) -> bool {
        self.connector.is_some()
    }

    /// 依政策建立記錄器，並預先在所有開啟稽核的 lake 建立稽核表
    pub async fn establish(
        policy: AuditPolicy,
        connector: Arc<dyn RelationalConnector>,
        registry: &LakeRegistry,
    ) -> Result<Self> {
        let logger = Self::new(connector);
        match logger.prepare(registry).await {
            Ok(()) => Ok(logger),
            Err(e) => match policy {
                AuditPolicy::Required => Err(e),
                AuditPolicy::Optional => {
                    tracing::error!(
                        "Unable to create audit logger: {}. The likeliest possibilities are the connection \
                         timed out due to a firewall rule or there is an error in the config for the audit-enabled lake. \
                         Continuing without audit logging",
                        e
                    );
                    Ok(Self::disabled().with_host(logger.host))
                }
            },
        }
    }

    async fn prepare(&self, registry: &LakeRegistry) -> Result<()> {
        for lake in registry.audit_enabled() {
            self.ensure_table(lake).await.map_err(|e| EtlError::AuditSetupError {
                lake: lake.name.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn should_audit(&self, destination: &DataLake) -> bool {
        self.connector.is_some() && destination.audit_enabled
    }

    fn is_ensured(&self, lake: &str) -> bool {
        self.ensured
            .lock()
            .map(|set| set.contains(lake))
            .unwrap_or(false)
    }

    async fn ensure_table(&self, lake: &DataLake) -> Result<()> {
        let Some(connector) = &self.connector else {
            return Ok(());
        };
        if self.is_ensured(&lake.name) {
            return Ok(());
        }

        connector.execute(lake, CREATE_AUDIT_TABLE_SQL, &[]).await?;
        if let Ok(mut set) = self.ensured.lock() {
            set.insert(lake.name.clone());
        }
        Ok(())
    }

    async fn record(
        &self,
        event: AuditEvent,
        run_name: &str,
        destination: &DataLake,
        transferable: &dyn Transferable,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let Some(connector) = &self.connector else {
            return Ok(());
        };

        let params = vec![
            Some(run_name.to_string()),
            Some(self.host.clone()),
            Some(transferable.destination_identifier().to_string()),
            Some(started_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            event.outcome().map(str::to_string),
        ];

        let outcome = async {
            self.ensure_table(destination).await?;
            connector.execute(destination, INSERT_AUDIT_ROW_SQL, &params).await
        }
        .await;

        outcome.map(|_| ()).map_err(|e| EtlError::AuditLoggingError {
            message: format!("{:?} event for {} on {}: {}", event, run_name, destination.name, e),
        })
    }

    pub async fn log_started(
        &self,
        run_name: &str,
        destination: &DataLake,
        transferable: &dyn Transferable,
        started_at: DateTime<Utc>,
    ) {
        if !self.should_audit(destination) {
            tracing::info!("Starting integration {} to {}", run_name, destination.name);
            return;
        }
        if let Err(e) = self
            .record(AuditEvent::Started, run_name, destination, transferable, started_at)
            .await
        {
            tracing::warn!("Unable to create activity entry in the database. Continuing data transfer... {}", e);
        }
    }

    pub async fn log_successful(
        &self,
        run_name: &str,
        destination: &DataLake,
        transferable: &dyn Transferable,
        started_at: DateTime<Utc>,
    ) {
        if !self.should_audit(destination) {
            tracing::info!("Integration {} succeeded", run_name);
            return;
        }
        if let Err(e) = self
            .record(AuditEvent::Succeeded, run_name, destination, transferable, started_at)
            .await
        {
            tracing::warn!("Unable to log success to database. Continuing data transfer... {}", e);
        }
    }

    pub async fn log_failed(
        &self,
        run_name: &str,
        destination: &DataLake,
        transferable: &dyn Transferable,
        started_at: DateTime<Utc>,
    ) {
        if !self.should_audit(destination) {
            tracing::info!("Integration {} failed", run_name);
            return;
        }
        if let Err(e) = self
            .record(AuditEvent::Failed, run_name, destination, transferable, started_at)
            .await
        {
            tracing::warn!("Unable to log failure to database. Terminating... {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::integration::Integration;
    use crate::domain::model::{Dataset, SqlParam, Statement};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct MockConnector {
        executed: AsyncMutex<Vec<(String, Vec<SqlParam>)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl RelationalConnector for MockConnector {
        async fn execute(&self, lake: &DataLake, sql: &str, params: &[SqlParam]) -> Result<u64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(EtlError::processing(format!("{} unreachable", lake.name)));
            }
            self.executed.lock().await.push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        async fn execute_all(&self, _lake: &DataLake, statements: &[Statement]) -> Result<u64> {
            Ok(statements.len() as u64)
        }

        async fn query(&self, _lake: &DataLake, _sql: &str, _fetch_size: Option<usize>) -> Result<Dataset> {
            Ok(Dataset::default())
        }
    }

    fn audited_lake() -> DataLake {
        DataLake::new("orders_db", "postgresql://localhost/warehouse").with_audit(true)
    }

    #[tokio::test]
    async fn test_disabled_destination_never_touches_connector() {
        let connector = Arc::new(MockConnector::default());
        let logger = AuditLogger::new(connector.clone()).with_host("test-host");
        let lake = audited_lake().with_audit(false);
        let integration = Integration::new("orders", "orders.csv", "orders");

        logger.log_started("run", &lake, &integration, Utc::now()).await;
        logger.log_successful("run", &lake, &integration, Utc::now()).await;
        logger.log_failed("run", &lake, &integration, Utc::now()).await;

        assert!(connector.executed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_table_is_created_once_before_first_row() {
        let connector = Arc::new(MockConnector::default());
        let logger = AuditLogger::new(connector.clone()).with_host("test-host");
        let lake = audited_lake();
        let integration = Integration::new("orders", "orders.csv", "orders");
        let start = Utc::now();

        logger.log_started("nightly", &lake, &integration, start).await;
        logger.log_successful("nightly", &lake, &integration, start).await;

        let executed = connector.executed.lock().await;
        assert_eq!(executed.len(), 3);
        assert_eq!(executed[0].0, CREATE_AUDIT_TABLE_SQL);
        assert_eq!(executed[1].0, INSERT_AUDIT_ROW_SQL);
        assert_eq!(executed[1].1[0].as_deref(), Some("nightly"));
        assert_eq!(executed[1].1[1].as_deref(), Some("test-host"));
        assert_eq!(executed[1].1[2].as_deref(), Some("orders"));
        assert_eq!(executed[1].1[4], None);
        assert_eq!(executed[2].1[4].as_deref(), Some("SUCCEEDED"));
    }

    #[tokio::test]
    async fn test_connector_failures_are_swallowed() {
        let connector = Arc::new(MockConnector::default());
        connector.fail.store(true, Ordering::SeqCst);
        let logger = AuditLogger::new(connector.clone());
        let integration = Integration::new("orders", "orders.csv", "orders");

        // 不會 panic 也不會回傳錯誤
        logger.log_started("run", &audited_lake(), &integration, Utc::now()).await;
        logger.log_failed("run", &audited_lake(), &integration, Utc::now()).await;
    }

    #[tokio::test]
    async fn test_required_policy_fails_when_setup_fails() {
        let connector = Arc::new(MockConnector::default());
        connector.fail.store(true, Ordering::SeqCst);
        let registry = LakeRegistry::from_lakes(vec![audited_lake()]).unwrap();

        let result = AuditLogger::establish(AuditPolicy::Required, connector, &registry).await;
        assert!(matches!(result, Err(EtlError::AuditSetupError { .. })));
    }

    #[tokio::test]
    async fn test_optional_policy_degrades_to_disabled_logger() {
        let connector = Arc::new(MockConnector::default());
        connector.fail.store(true, Ordering::SeqCst);
        let registry = LakeRegistry::from_lakes(vec![audited_lake()]).unwrap();

        let logger = AuditLogger::establish(AuditPolicy::Optional, connector, &registry)
            .await
            .unwrap();
        assert!(!logger.is_enabled());
    }

    #[test]
    fn test_host_identifier_is_stable() {
        assert_eq!(host_identifier(), host_identifier());
        assert!(!host_identifier().is_empty());
    }

    #[test]
    fn test_blank_hostname_falls_back_to_address() {
        let address = || Some("10.1.2.3".to_string());

        assert_eq!(resolve_host(Some("etl-01".to_string()), address), Some("etl-01".to_string()));
        assert_eq!(resolve_host(Some("  ".to_string()), address), Some("10.1.2.3".to_string()));
        assert_eq!(resolve_host(Some(String::new()), || None), None);
    }

    #[test]
    fn test_failed_hostname_lookup_skips_address() {
        let result = resolve_host(None, || panic!("address lookup after a failed hostname lookup"));
        assert_eq!(result, None);
    }
}
