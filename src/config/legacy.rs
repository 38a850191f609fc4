//! 舊版設定：來源與目的地分開宣告。只在沒有 `datalakes` 時使用。

use crate::config::datalake::{DataFormat, DataLake, LakeDriver, WriteMode, CSV_FORMAT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDatasource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default, alias = "dataFormat")]
    pub data_format: Option<String>,
    #[serde(default, alias = "username")]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "fetchSize")]
    pub fetch_size: Option<usize>,
    #[serde(default)]
    pub header: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDestination {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default, alias = "dataFormat")]
    pub data_format: Option<String>,
    #[serde(default, alias = "username")]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "batchSize")]
    pub batch_size: Option<usize>,
    #[serde(default, alias = "writeMode")]
    pub write_mode: Option<WriteMode>,
    #[serde(default, alias = "latticeLogger", alias = "lattice_logger")]
    pub audit_enabled: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// 沒有指定格式時，檔案型驅動預設 csv，其餘視為資料庫
fn legacy_format(data_format: &Option<String>, driver: &LakeDriver) -> DataFormat {
    match data_format {
        Some(format) => DataFormat::from(format.clone()),
        None if driver.is_file_based() => DataFormat::from(CSV_FORMAT.to_string()),
        None => DataFormat::default(),
    }
}

fn legacy_driver(driver: &Option<String>) -> LakeDriver {
    driver.clone().map(LakeDriver::from).unwrap_or_default()
}

impl LegacyDatasource {
    pub fn as_data_lake(&self) -> DataLake {
        let driver = legacy_driver(&self.driver);
        let defaults = DataLake::default();
        DataLake {
            name: self.name.clone(),
            data_format: legacy_format(&self.data_format, &driver),
            url: self.url.clone(),
            driver,
            username: self.user.clone(),
            password: self.password.clone(),
            fetch_size: self.fetch_size.unwrap_or(defaults.fetch_size),
            header: self.header,
            ..defaults
        }
    }
}

impl LegacyDestination {
    pub fn as_data_lake(&self) -> DataLake {
        let driver = legacy_driver(&self.driver);
        let defaults = DataLake::default();
        DataLake {
            name: self.name.clone(),
            data_format: legacy_format(&self.data_format, &driver),
            url: self.url.clone(),
            driver,
            username: self.user.clone(),
            password: self.password.clone(),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            write_mode: self.write_mode.unwrap_or_default(),
            audit_enabled: self.audit_enabled,
            properties: self.properties.clone(),
            ..defaults
        }
    }
}
