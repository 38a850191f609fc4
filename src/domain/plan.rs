use crate::config::datalake::WriteMode;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedRead {
    pub location: String,
    pub header: bool,
    pub infer_schema: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnarRead {
    pub location: String,
    pub infer_schema: bool,
}

#[derive(Clone, PartialEq, Eq)]
pub struct RelationalRead {
    pub url: String,
    /// 資料表名稱或查詢
    pub table: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub driver: String,
    pub fetch_size: usize,
}

impl fmt::Debug for RelationalRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalRead")
            .field("url", &self.url)
            .field("table", &self.table)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("driver", &self.driver)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

/// 讀取策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadPlan {
    Delimited(DelimitedRead),
    Columnar(ColumnarRead),
    Relational(RelationalRead),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalWrite {
    pub batch_size: usize,
    pub driver: String,
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFormat {
    Delimited { header: bool },
    Columnar,
    Relational(RelationalWrite),
}

/// 寫入目標。檔案型目標每次 run 都產生新的名稱。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    Filesystem { path: String, name: String },
    ObjectStore { path: String, name: String },
    Relational { table: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    pub format: WriteFormat,
    pub target: WriteTarget,
}

impl WritePlan {
    /// 成功後回報給呼叫端的目的地識別
    pub fn destination_identifier(&self) -> &str {
        match &self.target {
            WriteTarget::Filesystem { name, .. } | WriteTarget::ObjectStore { name, .. } => name,
            WriteTarget::Relational { table } => table,
        }
    }

    pub fn is_relational_target(&self) -> bool {
        matches!(self.target, WriteTarget::Relational { .. })
    }
}
