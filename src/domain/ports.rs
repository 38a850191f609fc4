use crate::config::datalake::DataLake;
use crate::domain::model::{Dataset, RunContext, SqlParam, Statement};
use crate::domain::plan::{ReadPlan, WritePlan};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 可被搬移的單位：整合設定與封存項目都實作這個介面
pub trait Transferable: Send + Sync {
    fn source_identifier(&self) -> &str;
    fn destination_identifier(&self) -> &str;
}

/// 實際執行讀寫的資料引擎
#[async_trait]
pub trait DatasetEngine: Send + Sync {
    async fn read(&self, lake: &DataLake, plan: &ReadPlan, ctx: &RunContext) -> Result<Dataset>;
    async fn write(
        &self,
        dataset: Dataset,
        lake: &DataLake,
        plan: &WritePlan,
        ctx: &RunContext,
    ) -> Result<()>;
}

/// 關聯式連線器。每次呼叫自行取得連線並在結束時釋放。
#[async_trait]
pub trait RelationalConnector: Send + Sync {
    async fn execute(&self, lake: &DataLake, sql: &str, params: &[SqlParam]) -> Result<u64>;

    /// 在同一條連線、同一個交易內依序執行
    async fn execute_all(&self, lake: &DataLake, statements: &[Statement]) -> Result<u64>;

    async fn query(&self, lake: &DataLake, sql: &str, fetch_size: Option<usize>) -> Result<Dataset>;
}
