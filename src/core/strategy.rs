//! 依 data lake 的格式與驅動決定讀寫方式。兩個函式都是純函式，且對任何
//! lake 都有結果：不認得的格式或驅動一律走關聯式分支。

use crate::config::datalake::{DataFormat, DataLake, LakeDriver};
use crate::domain::plan::{
    ColumnarRead, DelimitedRead, ReadPlan, RelationalRead, RelationalWrite, WriteFormat, WritePlan,
    WriteTarget,
};
use chrono::{DateTime, SecondsFormat, Utc};

fn join_location(url: &str, identifier: &str) -> String {
    format!("{}/{}", url.trim_end_matches('/'), identifier)
}

pub fn plan_read(lake: &DataLake, identifier: &str) -> ReadPlan {
    match &lake.data_format {
        DataFormat::Csv | DataFormat::LegacyCsv => ReadPlan::Delimited(DelimitedRead {
            location: join_location(&lake.url, identifier),
            header: lake.header,
            infer_schema: !lake.header,
        }),
        DataFormat::Columnar => ReadPlan::Columnar(ColumnarRead {
            location: join_location(&lake.url, identifier),
            infer_schema: true,
        }),
        DataFormat::Relational(_) => ReadPlan::Relational(RelationalRead {
            url: lake.url.clone(),
            table: identifier.to_string(),
            username: lake.username.clone(),
            password: lake.password.clone(),
            driver: lake.driver.name().to_string(),
            fetch_size: lake.fetch_size,
        }),
    }
}

/// 檔案型目的地的名稱：`<identifier>-<寫入開始的 UTC 時間>`
pub fn timestamped_name(identifier: &str, started_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        identifier,
        started_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    )
}

pub fn plan_write(lake: &DataLake, identifier: &str, started_at: DateTime<Utc>) -> WritePlan {
    let format = match &lake.data_format {
        DataFormat::Csv | DataFormat::LegacyCsv => WriteFormat::Delimited { header: true },
        DataFormat::Columnar => WriteFormat::Columnar,
        DataFormat::Relational(_) => WriteFormat::Relational(RelationalWrite {
            batch_size: lake.batch_size,
            driver: lake.driver.name().to_string(),
            write_mode: lake.write_mode,
        }),
    };

    let target = match &lake.driver {
        LakeDriver::Filesystem => {
            let name = timestamped_name(identifier, started_at);
            WriteTarget::Filesystem {
                path: join_location(&lake.url, &name),
                name,
            }
        }
        LakeDriver::ObjectStore => {
            let name = timestamped_name(identifier, started_at);
            WriteTarget::ObjectStore {
                path: join_location(&lake.url, &name),
                name,
            }
        }
        LakeDriver::Relational(_) => WriteTarget::Relational {
            table: identifier.to_string(),
        },
    };

    WritePlan { format, target }
}
