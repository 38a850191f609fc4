use crate::config::datalake::DataLake;
use crate::config::integration::Integration;
use crate::domain::model::Dataset;
use crate::domain::ports::RelationalConnector;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;

const DESCRIPTION_COLUMN: &str = "description";
const QUERY_COLUMN: &str = "query";
const DESTINATION_COLUMN: &str = "destination";

/// 可以在 run 開始時展開成具體整合清單的設定
#[async_trait]
pub trait Expandable {
    async fn expand(
        &self,
        destination: &DataLake,
        connector: &dyn RelationalConnector,
    ) -> Result<Vec<Integration>>;
}

#[async_trait]
impl Expandable for Integration {
    async fn expand(
        &self,
        destination: &DataLake,
        connector: &dyn RelationalConnector,
    ) -> Result<Vec<Integration>> {
        if !self.dynamic_expansion {
            return Ok(vec![self.clone()]);
        }

        tracing::info!("Expanding dynamic integration '{}' on {}", self.description, destination.name);
        let rows = connector
            .query(destination, &self.source, None)
            .await
            .map_err(|e| self.expansion_error(destination, e.to_string()))?;

        let expanded = integrations_from_rows(&rows)
            .map_err(|message| self.expansion_error(destination, message))?;
        tracing::info!(
            "Dynamic integration '{}' expanded into {} integrations",
            self.description,
            expanded.len()
        );
        Ok(expanded)
    }
}

impl Integration {
    fn expansion_error(&self, destination: &DataLake, message: String) -> EtlError {
        EtlError::ExpansionQueryError {
            lake: destination.name.clone(),
            query: self.source.clone(),
            message,
        }
    }
}

fn integrations_from_rows(rows: &Dataset) -> std::result::Result<Vec<Integration>, String> {
    // 查詢沒有結果時欄位可能不存在，不算錯誤
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    for column in [DESCRIPTION_COLUMN, QUERY_COLUMN, DESTINATION_COLUMN] {
        if rows.column_index(column).is_none() {
            return Err(format!("expansion query result is missing column '{}'", column));
        }
    }

    (0..rows.len())
        .map(|i| {
            let query = rows
                .value(i, QUERY_COLUMN)
                .ok_or_else(|| format!("row {} has no query", i))?;
            let destination = rows
                .value(i, DESTINATION_COLUMN)
                .ok_or_else(|| format!("row {} has no destination", i))?;
            let description = rows
                .value(i, DESCRIPTION_COLUMN)
                .unwrap_or("Unnamed Integration");
            Ok(Integration::new(description, query, destination))
        })
        .collect()
}
