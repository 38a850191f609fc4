use crate::config::AwsConfig;
use serde::{Deserialize, Serialize};

/// 以文字儲存的表格資料。所有格式在引擎之間都以這個形狀傳遞。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Option<String>>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// 取得某列某欄的值，欄位名稱不分大小寫
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

/// 參數化 SQL 的參數，`None` 代表 NULL
pub type SqlParam = Option<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<SqlParam>) -> Self {
        self.params = params;
        self
    }
}

/// 每次 run 只建立一次，原封不動地傳給引擎
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_name: String,
    pub aws: Option<AwsConfig>,
    pub parallelism: usize,
}

impl RunContext {
    pub fn new(run_name: impl Into<String>, aws: Option<AwsConfig>) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            run_name: run_name.into(),
            aws,
            parallelism,
        }
    }
}
