//! PostgreSQL implementation of [`RelationalConnector`].
//!
//! Every call opens its own connection and drops it before returning, so a
//! failed statement never leaves a connection behind.

use crate::config::datalake::DataLake;
use crate::domain::model::{Dataset, SqlParam, Statement};
use crate::domain::ports::RelationalConnector;
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};

const FETCH_CURSOR: &str = "lake_relay_fetch";

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }
}

/// 接受 `postgresql://` URL、libpq 連線字串或 JDBC URL
fn connection_config(lake: &DataLake) -> Result<PgConfig> {
    let url = lake.url.strip_prefix("jdbc:").unwrap_or(&lake.url);
    let mut config: PgConfig = url.parse()?;

    let user = lake.username.as_ref().or_else(|| lake.properties.get("user"));
    if let Some(user) = user {
        config.user(user);
    }
    let password = lake.password.as_ref().or_else(|| lake.properties.get("password"));
    if let Some(password) = password {
        config.password(password);
    }
    if let Some(name) = lake.properties.get("application_name") {
        config.application_name(name);
    }
    Ok(config)
}

async fn connect(lake: &DataLake) -> Result<Client> {
    let (client, connection) = connection_config(lake)?.connect(NoTls).await?;

    let lake_name = lake.name.clone();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!("PostgreSQL connection to {} closed with error: {}", lake_name, e);
        }
    });

    Ok(client)
}

fn sql_params(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// 把 simple query 的結果附加到資料集，回傳新增的列數
fn append_rows(dataset: &mut Dataset, messages: Vec<SimpleQueryMessage>) -> usize {
    let mut appended = 0;
    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            if dataset.columns.is_empty() {
                dataset.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            dataset
                .rows
                .push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            appended += 1;
        }
    }
    appended
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `schema.table` 的每一段分別加引號
pub(crate) fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

pub(crate) fn quote_literal(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("'{}'", value.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

#[async_trait]
impl RelationalConnector for PostgresConnector {
    async fn execute(&self, lake: &DataLake, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let client = connect(lake).await?;
        let affected = client.execute(sql, &sql_params(params)).await?;
        Ok(affected)
    }

    async fn execute_all(&self, lake: &DataLake, statements: &[Statement]) -> Result<u64> {
        let mut client = connect(lake).await?;
        let transaction = client.transaction().await?;

        let mut affected = 0;
        for statement in statements {
            affected += transaction
                .execute(statement.sql.as_str(), &sql_params(&statement.params))
                .await?;
        }
        transaction.commit().await?;

        tracing::debug!("Executed {} statements on {} ({} rows)", statements.len(), lake.name, affected);
        Ok(affected)
    }

    async fn query(&self, lake: &DataLake, sql: &str, fetch_size: Option<usize>) -> Result<Dataset> {
        let mut client = connect(lake).await?;
        let mut dataset = Dataset::default();

        match fetch_size {
            None => {
                append_rows(&mut dataset, client.simple_query(sql).await?);
            }
            Some(fetch_size) => {
                // 以伺服器端 cursor 分批取回
                let fetch_size = fetch_size.max(1);
                let transaction = client.transaction().await?;
                let query = sql.trim().trim_end_matches(';');
                transaction
                    .batch_execute(&format!("DECLARE {} NO SCROLL CURSOR FOR {}", FETCH_CURSOR, query))
                    .await?;
                loop {
                    let messages = transaction
                        .simple_query(&format!("FETCH {} FROM {}", fetch_size, FETCH_CURSOR))
                        .await?;
                    if append_rows(&mut dataset, messages) < fetch_size {
                        break;
                    }
                }
                transaction.commit().await?;
            }
        }

        tracing::debug!("Query on {} returned {} rows", lake.name, dataset.len());
        Ok(dataset)
    }
}
