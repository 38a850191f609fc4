#![allow(dead_code)]

use async_trait::async_trait;
use lake_relay::config::datalake::DataLake;
use lake_relay::core::audit::INSERT_AUDIT_ROW_SQL;
use lake_relay::domain::model::{Dataset, RunContext, SqlParam, Statement};
use lake_relay::domain::plan::{ReadPlan, WritePlan};
use lake_relay::domain::ports::{DatasetEngine, RelationalConnector};
use lake_relay::{EtlError, Result};
use std::collections::HashSet;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Read { lake: String, plan: ReadPlan },
    Write { lake: String, plan: WritePlan, rows: usize },
}

/// 記錄每次讀寫的引擎，可指定要失敗的識別
#[derive(Default)]
pub struct RecordingEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub dataset: Dataset,
    pub fail_reads: HashSet<String>,
    /// 目的地識別以此開頭時寫入失敗
    pub fail_writes: HashSet<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            dataset: sample_dataset(),
            ..Default::default()
        }
    }

    pub fn failing_reads(mut self, identifier: &str) -> Self {
        self.fail_reads.insert(identifier.to_string());
        self
    }

    pub fn failing_writes(mut self, identifier: &str) -> Self {
        self.fail_writes.insert(identifier.to_string());
        self
    }

    pub async fn reads(&self) -> Vec<ReadPlan> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                EngineCall::Read { plan, .. } => Some(plan.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn writes(&self) -> Vec<WritePlan> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                EngineCall::Write { plan, .. } => Some(plan.clone()),
                _ => None,
            })
            .collect()
    }
}

fn read_identifier(plan: &ReadPlan) -> &str {
    match plan {
        ReadPlan::Delimited(read) => read.location.rsplit('/').next().unwrap_or(&read.location),
        ReadPlan::Columnar(read) => read.location.rsplit('/').next().unwrap_or(&read.location),
        ReadPlan::Relational(read) => &read.table,
    }
}

#[async_trait]
impl DatasetEngine for RecordingEngine {
    async fn read(&self, lake: &DataLake, plan: &ReadPlan, _ctx: &RunContext) -> Result<Dataset> {
        self.calls.lock().await.push(EngineCall::Read {
            lake: lake.name.clone(),
            plan: plan.clone(),
        });
        if self.fail_reads.contains(read_identifier(plan)) {
            return Err(EtlError::processing("source is unreachable"));
        }
        Ok(self.dataset.clone())
    }

    async fn write(&self, dataset: Dataset, lake: &DataLake, plan: &WritePlan, _ctx: &RunContext) -> Result<()> {
        self.calls.lock().await.push(EngineCall::Write {
            lake: lake.name.clone(),
            plan: plan.clone(),
            rows: dataset.len(),
        });
        let identifier = plan.destination_identifier();
        if self.fail_writes.iter().any(|f| identifier.starts_with(f.as_str())) {
            return Err(EtlError::processing("destination rejected the write"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub lake: String,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// 記錄所有 SQL 的連線器。查詢一律回傳 `query_result`。
#[derive(Default)]
pub struct RecordingConnector {
    pub executed: Mutex<Vec<Executed>>,
    pub queries: Mutex<Vec<(String, String)>>,
    pub query_result: Dataset,
    pub fail_execute: bool,
    pub fail_query: bool,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            fail_execute: true,
            fail_query: true,
            ..Default::default()
        }
    }

    pub fn with_query_result(mut self, rows: Dataset) -> Self {
        self.query_result = rows;
        self
    }

    /// 已寫入的稽核列：(資料表, 結果)
    pub async fn audit_rows(&self) -> Vec<(String, Option<String>)> {
        self.executed
            .lock()
            .await
            .iter()
            .filter(|e| e.sql == INSERT_AUDIT_ROW_SQL)
            .map(|e| {
                let table = e.params.get(2).cloned().flatten().unwrap_or_default();
                let outcome = e.params.get(4).cloned().flatten();
                (table, outcome)
            })
            .collect()
    }

    pub async fn execute_count(&self) -> usize {
        self.executed.lock().await.len()
    }
}

#[async_trait]
impl RelationalConnector for RecordingConnector {
    async fn execute(&self, lake: &DataLake, sql: &str, params: &[SqlParam]) -> Result<u64> {
        if self.fail_execute {
            return Err(EtlError::processing("connection refused"));
        }
        self.executed.lock().await.push(Executed {
            lake: lake.name.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(1)
    }

    async fn execute_all(&self, lake: &DataLake, statements: &[Statement]) -> Result<u64> {
        let mut affected = 0;
        for statement in statements {
            affected += self.execute(lake, &statement.sql, &statement.params).await?;
        }
        Ok(affected)
    }

    async fn query(&self, lake: &DataLake, sql: &str, _fetch_size: Option<usize>) -> Result<Dataset> {
        if self.fail_query {
            return Err(EtlError::processing("connection refused"));
        }
        self.queries.lock().await.push((lake.name.clone(), sql.to_string()));
        Ok(self.query_result.clone())
    }
}

pub fn sample_dataset() -> Dataset {
    Dataset::new(vec!["id".to_string(), "total".to_string()]).with_rows(vec![
        vec![Some("1".to_string()), Some("9.50".to_string())],
        vec![Some("2".to_string()), None],
    ])
}

pub fn control_rows(rows: &[(&str, &str, &str)]) -> Dataset {
    Dataset::new(vec![
        "description".to_string(),
        "query".to_string(),
        "destination".to_string(),
    ])
    .with_rows(
        rows.iter()
            .map(|(d, q, t)| vec![Some(d.to_string()), Some(q.to_string()), Some(t.to_string())])
            .collect(),
    )
}

/// 一個 CSV 來源與一個開啟稽核的資料庫目的地
pub const ORDERS_CONFIG: &str = r#"
name = "nightly-orders"

[[datalakes]]
name = "orders_csv"
data_format = "csv"
url = "/data/in"
driver = "filesystem"
header = true

[[datalakes]]
name = "orders_db"
url = "postgresql://localhost/warehouse"
driver = "postgresql"
audit_enabled = true
batch_size = 500

[[integrations.orders_csv.orders_db]]
description = "orders"
source = "orders.csv"
destination = "orders"
"#;
