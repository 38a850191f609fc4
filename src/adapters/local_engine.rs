use crate::adapters::formats::{decode_csv, decode_parquet, encode_csv, encode_parquet};
use crate::adapters::postgres::{quote_identifier, quote_literal, quote_qualified};
use crate::adapters::storage::StorageLocation;
use crate::config::datalake::{DataLake, WriteMode};
use crate::domain::model::{Dataset, RunContext, Statement};
use crate::domain::plan::{ReadPlan, RelationalWrite, WriteFormat, WritePlan, WriteTarget};
use crate::domain::ports::{DatasetEngine, RelationalConnector};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// PostgreSQL 單一 statement 的參數上限，也拿來限制一次 INSERT 的值數量
const MAX_VALUES_PER_INSERT: usize = 65_535;

/// 在本機行程中執行讀寫的資料集引擎。
///
/// 檔案型 lake 透過 object store 存取，關聯式 lake 透過 [`RelationalConnector`]。
pub struct LocalEngine {
    connector: Arc<dyn RelationalConnector>,
}

impl LocalEngine {
    pub fn new(connector: Arc<dyn RelationalConnector>) -> Self {
        Self { connector }
    }

    async fn write_table(
        &self,
        dataset: Dataset,
        lake: &DataLake,
        table: &str,
        write: &RelationalWrite,
    ) -> Result<()> {
        let qualified = quote_qualified(table);
        let create = create_table_sql(&qualified, &dataset);

        let mut statements = Vec::new();
        match write.write_mode {
            WriteMode::Append => statements.push(Statement::new(create)),
            WriteMode::Overwrite => {
                statements.push(Statement::new(format!("DROP TABLE IF EXISTS {}", qualified)));
                statements.push(Statement::new(create));
            }
            WriteMode::Ignore => {
                if self.table_exists(lake, &qualified).await? {
                    tracing::info!("Table {} already exists on {}, skipping write", table, lake.name);
                    return Ok(());
                }
                statements.push(Statement::new(create));
            }
            WriteMode::ErrorIfExists => {
                if self.table_exists(lake, &qualified).await? {
                    return Err(EtlError::WriteError {
                        lake: lake.name.clone(),
                        identifier: table.to_string(),
                        message: "table already exists".to_string(),
                    });
                }
                statements.push(Statement::new(create));
            }
        }
        statements.extend(insert_statements(&qualified, &dataset, write.batch_size));

        let inserted = self.connector.execute_all(lake, &statements).await?;
        tracing::debug!("Inserted {} rows into {} ({} mode)", inserted, table, write.write_mode);
        Ok(())
    }

    async fn table_exists(&self, lake: &DataLake, qualified: &str) -> Result<bool> {
        let sql = format!(
            "SELECT to_regclass({}) IS NOT NULL AS present",
            quote_literal(Some(qualified))
        );
        let result = self.connector.query(lake, &sql, None).await?;
        Ok(matches!(result.value(0, "present"), Some("t") | Some("true")))
    }
}

/// 關聯式來源可以是資料表名稱，也可以是完整查詢
fn source_query(table: &str) -> String {
    let trimmed = table.trim_start();
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("select ") || lowered.starts_with("with ") {
        trimmed.to_string()
    } else {
        format!("SELECT * FROM {}", table)
    }
}

fn create_table_sql(qualified: &str, dataset: &Dataset) -> String {
    let columns = dataset
        .columns
        .iter()
        .map(|c| format!("{} TEXT", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", qualified, columns)
}

/// 依批次大小切成多個 INSERT。值以字面常數寫入，讓既有資料表的欄位型別自行轉換。
fn insert_statements(qualified: &str, dataset: &Dataset, batch_size: usize) -> Vec<Statement> {
    if dataset.is_empty() || dataset.columns.is_empty() {
        return Vec::new();
    }

    let width = dataset.columns.len();
    let chunk = batch_size.clamp(1, (MAX_VALUES_PER_INSERT / width).max(1));
    let columns = dataset
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    dataset
        .rows
        .chunks(chunk)
        .map(|rows| {
            let values = rows
                .iter()
                .map(|row| {
                    let literals = (0..width)
                        .map(|i| quote_literal(row.get(i).and_then(|v| v.as_deref())))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("({})", literals)
                })
                .collect::<Vec<_>>()
                .join(", ");
            Statement::new(format!("INSERT INTO {} ({}) VALUES {}", qualified, columns, values))
        })
        .collect()
}

#[async_trait]
impl DatasetEngine for LocalEngine {
    async fn read(&self, lake: &DataLake, plan: &ReadPlan, ctx: &RunContext) -> Result<Dataset> {
        match plan {
            ReadPlan::Delimited(read) => {
                let location = StorageLocation::resolve(&read.location, ctx.aws.as_ref())?;
                decode_csv(&location.get().await?, read.header)
            }
            ReadPlan::Columnar(read) => {
                let location = StorageLocation::resolve(&read.location, ctx.aws.as_ref())?;
                decode_parquet(location.get().await?)
            }
            ReadPlan::Relational(read) => {
                self.connector
                    .query(lake, &source_query(&read.table), Some(read.fetch_size))
                    .await
            }
        }
    }

    async fn write(
        &self,
        dataset: Dataset,
        lake: &DataLake,
        plan: &WritePlan,
        ctx: &RunContext,
    ) -> Result<()> {
        let path = match &plan.target {
            WriteTarget::Relational { table } => {
                let write = match &plan.format {
                    WriteFormat::Relational(write) => write.clone(),
                    other => {
                        tracing::warn!("Format {:?} ignored for relational target {}", other, table);
                        RelationalWrite {
                            batch_size: lake.batch_size,
                            driver: lake.driver.name().to_string(),
                            write_mode: lake.write_mode,
                        }
                    }
                };
                return self.write_table(dataset, lake, table, &write).await;
            }
            WriteTarget::Filesystem { path, .. } | WriteTarget::ObjectStore { path, .. } => path,
        };

        let data = match &plan.format {
            WriteFormat::Delimited { header } => encode_csv(&dataset, *header)?,
            WriteFormat::Columnar => encode_parquet(&dataset)?,
            WriteFormat::Relational(_) => {
                return Err(EtlError::WriteError {
                    lake: lake.name.clone(),
                    identifier: plan.destination_identifier().to_string(),
                    message: format!("relational format cannot be written to file path {}", path),
                });
            }
        };

        StorageLocation::resolve(path, ctx.aws.as_ref())?.put(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: usize) -> Dataset {
        Dataset::new(vec!["id".to_string(), "name".to_string()]).with_rows(
            (0..rows)
                .map(|i| vec![Some(i.to_string()), (i % 2 == 0).then(|| "x'y".to_string())])
                .collect(),
        )
    }

    #[test]
    fn test_table_names_and_queries_are_both_sources() {
        assert_eq!(source_query("public.orders"), "SELECT * FROM public.orders");
        assert_eq!(source_query("  select id from t"), "select id from t");
        assert_eq!(source_query("WITH a AS (select 1) select * from a"), "WITH a AS (select 1) select * from a");
    }

    #[test]
    fn test_inserts_are_chunked_by_batch_size() {
        let statements = insert_statements("\"orders\"", &dataset(5), 2);

        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0].sql,
            "INSERT INTO \"orders\" (\"id\", \"name\") VALUES ('0', 'x''y'), ('1', NULL)"
        );
        assert!(statements.iter().all(|s| s.params.is_empty()));
    }

    #[test]
    fn test_empty_dataset_has_no_inserts() {
        assert!(insert_statements("\"orders\"", &dataset(0), 100).is_empty());
        assert_eq!(
            create_table_sql("\"orders\"", &dataset(0)),
            "CREATE TABLE IF NOT EXISTS \"orders\" (\"id\" TEXT, \"name\" TEXT)"
        );
    }
}
