use crate::config::datalake::DataLake;
use crate::config::{IntegrationConfiguration, TransferMap};
use crate::utils::error::{EtlError, Result};
use std::collections::BTreeMap;

/// 以名稱索引的 data lake 目錄，解析後唯讀
#[derive(Debug, Clone, Default)]
pub struct LakeRegistry {
    lakes: BTreeMap<String, DataLake>,
}

impl LakeRegistry {
    /// 解析設定中的 data lake。沒有 `datalakes` 時改用舊版的來源/目的地清單。
    pub fn resolve(config: &IntegrationConfiguration) -> Result<Self> {
        let declared: Vec<DataLake> = match &config.datalakes {
            Some(lakes) if !lakes.is_empty() => lakes.clone(),
            _ => {
                let destinations = config.destinations.iter().flatten().map(|d| d.as_data_lake());
                let sources = config.datasources.iter().flatten().map(|s| s.as_data_lake());
                let converted: Vec<DataLake> = destinations.chain(sources).collect();
                if !converted.is_empty() {
                    tracing::info!("Converted {} legacy source/destination entries to data lakes", converted.len());
                }
                converted
            }
        };

        let registry = Self::from_lakes(declared)?;
        registry.ensure_referenced(&config.integrations, "integration")?;
        registry.ensure_referenced(&config.archives, "archive")?;

        tracing::debug!("Resolved {} data lakes", registry.len());
        Ok(registry)
    }

    /// 重複的名稱視為設定錯誤
    pub fn from_lakes(lakes: impl IntoIterator<Item = DataLake>) -> Result<Self> {
        let mut catalog = BTreeMap::new();
        for lake in lakes {
            if catalog.contains_key(&lake.name) {
                return Err(EtlError::DuplicateLake { name: lake.name });
            }
            catalog.insert(lake.name.clone(), lake);
        }
        Ok(Self { lakes: catalog })
    }

    fn ensure_referenced<T>(&self, map: &TransferMap<T>, kind: &str) -> Result<()> {
        for (source, destinations) in map {
            self.lookup(source, &format!("{} source", kind))?;
            for destination in destinations.keys() {
                self.lookup(destination, &format!("{} destination", kind))?;
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str, role: &str) -> Result<&DataLake> {
        self.lakes.get(name).ok_or_else(|| EtlError::UnknownLake {
            name: name.to_string(),
            role: role.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Result<&DataLake> {
        self.lookup(name, "lookup")
    }

    pub fn lakes(&self) -> impl Iterator<Item = &DataLake> {
        self.lakes.values()
    }

    pub fn audit_enabled(&self) -> impl Iterator<Item = &DataLake> {
        self.lakes.values().filter(|lake| lake.audit_enabled)
    }

    pub fn len(&self) -> usize {
        self.lakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lakes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::integration::Integration;
    use crate::config::legacy::{LegacyDatasource, LegacyDestination};

    fn config_with(lakes: Option<Vec<DataLake>>) -> IntegrationConfiguration {
        IntegrationConfiguration {
            name: "test".to_string(),
            datalakes: lakes,
            datasources: None,
            destinations: None,
            integrations: BTreeMap::new(),
            archives: BTreeMap::new(),
            aws: None,
        }
    }

    #[test]
    fn test_declared_lakes_are_used_verbatim() {
        let a = DataLake::new("a", "/tmp/a");
        let b = DataLake::new("b", "postgresql://localhost/b");
        let registry = LakeRegistry::resolve(&config_with(Some(vec![a.clone(), b.clone()]))).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap(), &a);
        assert_eq!(registry.get("b").unwrap(), &b);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let lakes = vec![DataLake::new("a", "/tmp/a"), DataLake::new("a", "/tmp/other")];
        let err = LakeRegistry::resolve(&config_with(Some(lakes))).unwrap_err();
        assert!(matches!(err, EtlError::DuplicateLake { name } if name == "a"));
    }

    #[test]
    fn test_legacy_lists_are_converted() {
        let mut config = config_with(None);
        config.datasources = Some(vec![LegacyDatasource {
            name: "src".to_string(),
            url: "/data".to_string(),
            driver: Some("filesystem".to_string()),
            data_format: None,
            user: None,
            password: None,
            fetch_size: None,
            header: true,
        }]);
        config.destinations = Some(vec![LegacyDestination {
            name: "dst".to_string(),
            url: "postgresql://localhost/dst".to_string(),
            driver: None,
            data_format: None,
            user: None,
            password: None,
            batch_size: None,
            write_mode: None,
            audit_enabled: true,
            properties: BTreeMap::new(),
        }]);

        let registry = LakeRegistry::resolve(&config).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("src").unwrap().header);
        assert_eq!(registry.audit_enabled().count(), 1);
    }

    #[test]
    fn test_unknown_integration_lake_fails_before_any_transfer() {
        let mut config = config_with(Some(vec![DataLake::new("a", "/tmp/a")]));
        config
            .integrations
            .entry("a".to_string())
            .or_default()
            .insert("missing".to_string(), vec![Integration::new("x", "in.csv", "out")]);

        let err = LakeRegistry::resolve(&config).unwrap_err();
        assert!(matches!(err, EtlError::UnknownLake { name, .. } if name == "missing"));
    }
}
