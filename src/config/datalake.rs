use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const CSV_FORMAT: &str = "csv";
pub const LEGACY_CSV_FORMAT: &str = "legacy-csv";
pub const COLUMNAR_FORMAT: &str = "columnar";
pub const ORC_FORMAT: &str = "orc";
pub const FILESYSTEM_DRIVER: &str = "filesystem";
pub const OBJECT_STORE_DRIVER: &str = "object-store";
pub const DEFAULT_RELATIONAL_DRIVER: &str = "postgresql";

const DEFAULT_BATCH_SIZE: usize = 1_000;
const DEFAULT_FETCH_SIZE: usize = 10_000;

/// 資料格式。未知的字串一律視為關聯式資料庫。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataFormat {
    Csv,
    LegacyCsv,
    Columnar,
    Relational(String),
}

impl DataFormat {
    pub fn is_delimited(&self) -> bool {
        matches!(self, DataFormat::Csv | DataFormat::LegacyCsv)
    }

    /// ORC 是欄式格式，但沒有對應的編解碼器
    pub fn is_unsupported_columnar(&self) -> bool {
        matches!(self, DataFormat::Relational(name) if name.eq_ignore_ascii_case(ORC_FORMAT))
    }
}

impl Default for DataFormat {
    fn default() -> Self {
        DataFormat::Relational("jdbc".to_string())
    }
}

impl From<String> for DataFormat {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            CSV_FORMAT => DataFormat::Csv,
            LEGACY_CSV_FORMAT => DataFormat::LegacyCsv,
            COLUMNAR_FORMAT | "parquet" => DataFormat::Columnar,
            _ => DataFormat::Relational(value),
        }
    }
}

impl From<DataFormat> for String {
    fn from(value: DataFormat) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => f.write_str(CSV_FORMAT),
            DataFormat::LegacyCsv => f.write_str(LEGACY_CSV_FORMAT),
            DataFormat::Columnar => f.write_str(COLUMNAR_FORMAT),
            DataFormat::Relational(name) => f.write_str(name),
        }
    }
}

/// 存取驅動。`filesystem` 與 `object-store` 以外都是關聯式連線器名稱。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LakeDriver {
    Filesystem,
    ObjectStore,
    Relational(String),
}

impl LakeDriver {
    pub fn is_file_based(&self) -> bool {
        matches!(self, LakeDriver::Filesystem | LakeDriver::ObjectStore)
    }

    pub fn name(&self) -> &str {
        match self {
            LakeDriver::Filesystem => FILESYSTEM_DRIVER,
            LakeDriver::ObjectStore => OBJECT_STORE_DRIVER,
            LakeDriver::Relational(name) => name,
        }
    }
}

impl Default for LakeDriver {
    fn default() -> Self {
        LakeDriver::Relational(DEFAULT_RELATIONAL_DRIVER.to_string())
    }
}

impl From<String> for LakeDriver {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            FILESYSTEM_DRIVER => LakeDriver::Filesystem,
            OBJECT_STORE_DRIVER | "s3" => LakeDriver::ObjectStore,
            _ => LakeDriver::Relational(value),
        }
    }
}

impl From<LakeDriver> for String {
    fn from(value: LakeDriver) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for LakeDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 關聯式目的地的寫入模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    #[default]
    Append,
    Overwrite,
    Ignore,
    #[serde(alias = "error", alias = "errorifexists")]
    ErrorIfExists,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteMode::Append => "append",
            WriteMode::Overwrite => "overwrite",
            WriteMode::Ignore => "ignore",
            WriteMode::ErrorIfExists => "error-if-exists",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLake {
    pub name: String,
    #[serde(default, alias = "dataFormat")]
    pub data_format: DataFormat,
    pub url: String,
    #[serde(default)]
    pub driver: LakeDriver,
    #[serde(default, alias = "user")]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_batch_size", alias = "batchSize")]
    pub batch_size: usize,
    #[serde(default, alias = "writeMode")]
    pub write_mode: WriteMode,
    #[serde(default = "default_fetch_size", alias = "fetchSize")]
    pub fetch_size: usize,
    #[serde(default)]
    pub header: bool,
    #[serde(default, alias = "lattice_logger", alias = "latticeLogger")]
    pub audit_enabled: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_fetch_size() -> usize {
    DEFAULT_FETCH_SIZE
}

impl DataLake {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    pub fn with_driver(mut self, driver: LakeDriver) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_audit(mut self, audit_enabled: bool) -> Self {
        self.audit_enabled = audit_enabled;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl Default for DataLake {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_format: DataFormat::default(),
            url: String::new(),
            driver: LakeDriver::default(),
            username: None,
            password: None,
            batch_size: DEFAULT_BATCH_SIZE,
            write_mode: WriteMode::default(),
            fetch_size: DEFAULT_FETCH_SIZE,
            header: false,
            audit_enabled: false,
            properties: BTreeMap::new(),
        }
    }
}

// 密碼不可出現在日誌中
impl fmt::Debug for DataLake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLake")
            .field("name", &self.name)
            .field("data_format", &self.data_format)
            .field("url", &self.url)
            .field("driver", &self.driver)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("batch_size", &self.batch_size)
            .field("write_mode", &self.write_mode)
            .field("fetch_size", &self.fetch_size)
            .field("header", &self.header)
            .field("audit_enabled", &self.audit_enabled)
            .finish()
    }
}

impl fmt::Display for DataLake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {} via {})", self.name, self.url, self.data_format, self.driver)
    }
}
