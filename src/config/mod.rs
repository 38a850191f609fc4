#[cfg(feature = "cli")]
pub mod cli;
pub mod datalake;
pub mod integration;
pub mod legacy;

use crate::config::datalake::{DataLake, LakeDriver};
use crate::config::integration::{Archive, Integration};
use crate::config::legacy::{LegacyDatasource, LegacyDestination};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 來源 lake 名稱 -> 目的地 lake 名稱 -> 依序執行的項目
pub type TransferMap<T> = BTreeMap<String, BTreeMap<String, Vec<T>>>;

/// 物件儲存的雲端參數，憑證本身由環境提供
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(alias = "regionName")]
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// 一次 run 的完整描述，執行期間不會被修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfiguration {
    pub name: String,
    #[serde(default)]
    pub datalakes: Option<Vec<DataLake>>,
    #[serde(default)]
    pub datasources: Option<Vec<LegacyDatasource>>,
    #[serde(default)]
    pub destinations: Option<Vec<LegacyDestination>>,
    #[serde(default)]
    pub integrations: TransferMap<Integration>,
    #[serde(default)]
    pub archives: TransferMap<Archive>,
    #[serde(default, alias = "awsConfig")]
    pub aws: Option<AwsConfig>,
}

impl IntegrationConfiguration {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| EtlError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${DB_PASSWORD})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| EtlError::config(format!("Invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 所有整合的數量（動態整合以一筆計）
    pub fn integration_count(&self) -> usize {
        count_entries(&self.integrations)
    }

    pub fn archive_count(&self) -> usize {
        count_entries(&self.archives)
    }
}

fn count_entries<T>(map: &TransferMap<T>) -> usize {
    map.values()
        .flat_map(|destinations| destinations.values())
        .map(Vec::len)
        .sum()
}

fn validate_lake(lake: &DataLake) -> Result<()> {
    validation::validate_non_empty_string("datalakes.name", &lake.name)?;
    if lake.data_format.is_unsupported_columnar() {
        return Err(EtlError::InvalidConfigValueError {
            field: format!("datalakes.{}.data_format", lake.name),
            value: lake.data_format.to_string(),
            reason: "ORC files are not supported, use parquet for columnar lakes".to_string(),
        });
    }
    match lake.driver {
        LakeDriver::ObjectStore => {
            validation::validate_object_store_url(&format!("datalakes.{}.url", lake.name), &lake.url)?
        }
        _ => validation::validate_path(&format!("datalakes.{}.url", lake.name), &lake.url)?,
    }
    validation::validate_positive_number(&format!("datalakes.{}.batch_size", lake.name), lake.batch_size, 1)?;
    validation::validate_positive_number(&format!("datalakes.{}.fetch_size", lake.name), lake.fetch_size, 1)?;
    Ok(())
}

impl Validate for IntegrationConfiguration {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("name", &self.name)?;

        if let Some(lakes) = &self.datalakes {
            for lake in lakes {
                validate_lake(lake)?;
            }
        }
        let legacy = self
            .datasources
            .iter()
            .flatten()
            .map(|s| s.as_data_lake())
            .chain(self.destinations.iter().flatten().map(|d| d.as_data_lake()));
        for lake in legacy {
            validate_lake(&lake)?;
        }

        for (source, destinations) in &self.integrations {
            for (destination, integrations) in destinations {
                let field = format!("integrations.{}.{}", source, destination);
                for integration in integrations {
                    validation::validate_non_empty_string(&format!("{}.source", field), &integration.source)?;
                    // 動態整合的目的地由查詢結果決定
                    if !integration.dynamic_expansion {
                        validation::validate_non_empty_string(
                            &format!("{}.destination", field),
                            &integration.destination,
                        )?;
                    }
                }
            }
        }

        for (source, destinations) in &self.archives {
            for (destination, archives) in destinations {
                let field = format!("archives.{}.{}", source, destination);
                for archive in archives {
                    validation::validate_non_empty_string(&format!("{}.source", field), &archive.source)?;
                    validation::validate_non_empty_string(
                        &format!("{}.destination", field),
                        &archive.destination,
                    )?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::datalake::{DataFormat, WriteMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC_CONFIG: &str = r#"
name = "nightly"

[[datalakes]]
name = "orders_csv"
url = "/data/landing"
driver = "filesystem"
data_format = "csv"
header = true

[[datalakes]]
name = "orders_db"
url = "postgresql://localhost:5432/warehouse"
username = "etl"
password = "secret"
write_mode = "append"
audit_enabled = true

[[integrations.orders_csv.orders_db]]
description = "orders"
source = "orders.csv"
destination = "orders"

[[integrations.orders_csv.orders_db]]
description = "control table"
source = "select description, query, destination from transfers"
gluttony = true
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = IntegrationConfiguration::from_toml_str(BASIC_CONFIG).unwrap();

        assert_eq!(config.name, "nightly");
        let lakes = config.datalakes.as_ref().unwrap();
        assert_eq!(lakes.len(), 2);
        assert_eq!(lakes[0].data_format, DataFormat::Csv);
        assert_eq!(lakes[1].write_mode, WriteMode::Append);

        let integrations = &config.integrations["orders_csv"]["orders_db"];
        assert_eq!(integrations.len(), 2);
        assert!(!integrations[0].dynamic_expansion);
        assert!(integrations[1].dynamic_expansion);
        assert_eq!(config.integration_count(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LAKE_RELAY_TEST_PASSWORD", "from-env");

        let content = r#"
name = "env"

[[datalakes]]
name = "db"
url = "postgresql://localhost/db"
password = "${LAKE_RELAY_TEST_PASSWORD}"
username = "${LAKE_RELAY_TEST_UNSET_USER}"
"#;

        let config = IntegrationConfiguration::from_toml_str(content).unwrap();
        let lake = &config.datalakes.unwrap()[0];
        assert_eq!(lake.password.as_deref(), Some("from-env"));
        assert_eq!(lake.username.as_deref(), Some("${LAKE_RELAY_TEST_UNSET_USER}"));

        std::env::remove_var("LAKE_RELAY_TEST_PASSWORD");
    }

    #[test]
    fn test_validation_rejects_blank_destination() {
        let content = r#"
name = "bad"

[[datalakes]]
name = "a"
url = "/tmp/a"
driver = "filesystem"

[[integrations.a.a]]
source = "in.csv"
destination = " "
"#;

        let config = IntegrationConfiguration::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_object_store_url() {
        let content = r#"
name = "bad"

[[datalakes]]
name = "bucket"
url = "/not/a/bucket"
driver = "s3"
"#;

        let config = IntegrationConfiguration::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_orc_lakes() {
        let content = r#"
name = "cold"

[[datalakes]]
name = "cold"
dataFormat = "orc"
url = "s3://bucket/cold"
driver = "s3"
"#;

        let config = IntegrationConfiguration::from_toml_str(content).unwrap();
        match config.validate() {
            Err(EtlError::InvalidConfigValueError { field, reason, .. }) => {
                assert_eq!(field, "datalakes.cold.data_format");
                assert!(reason.contains("ORC"));
            }
            other => panic!("unexpected validation result: {:?}", other),
        }
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC_CONFIG.as_bytes()).unwrap();

        let config = IntegrationConfiguration::from_file(temp_file.path()).unwrap();
        assert_eq!(config.name, "nightly");
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = IntegrationConfiguration::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));
    }
}
