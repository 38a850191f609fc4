use crate::domain::ports::Transferable;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_description() -> String {
    "Unnamed Integration".to_string()
}

/// 單一搬移設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    #[serde(default = "default_description", alias = "name")]
    pub description: String,
    /// 檔名、資料表或 SQL 查詢
    pub source: String,
    /// 動態整合不需要目的地
    #[serde(default)]
    pub destination: String,
    /// 為 true 時，`source` 是在目的地執行的查詢，每一列展開成一個整合
    #[serde(default, alias = "gluttony")]
    pub dynamic_expansion: bool,
}

impl Integration {
    pub fn new(
        description: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            source: source.into(),
            destination: destination.into(),
            dynamic_expansion: false,
        }
    }

    pub fn dynamic(description: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            source: query.into(),
            destination: String::new(),
            dynamic_expansion: true,
        }
    }
}

impl Transferable for Integration {
    fn source_identifier(&self) -> &str {
        &self.source
    }

    fn destination_identifier(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.description, self.source, self.destination)
    }
}

/// 封存項目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    #[serde(default)]
    pub description: Option<String>,
    pub source: String,
    pub destination: String,
}

impl Archive {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            description: None,
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl Transferable for Archive {
    fn source_identifier(&self) -> &str {
        &self.source
    }

    fn destination_identifier(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({} -> {})", description, self.source, self.destination),
            None => write!(f, "{} -> {}", self.source, self.destination),
        }
    }
}
