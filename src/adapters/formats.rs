//! CSV 與 Parquet 和 [`Dataset`] 之間的轉換。
//!
//! 空字串欄位視為 NULL；Parquet 欄位一律讀成文字。

use crate::domain::model::Dataset;
use crate::utils::error::{EtlError, Result};
use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::sync::Arc;

pub fn decode_csv(data: &[u8], header: bool) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(header)
        .flexible(true)
        .from_reader(data);

    let mut columns: Vec<String> = if header {
        reader.headers()?.iter().map(String::from).collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|v| (!v.is_empty()).then(|| v.to_string()))
                .collect::<Vec<_>>(),
        );
    }

    if !header {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        columns = (0..width).map(|i| format!("_c{}", i)).collect();
    }
    for row in &mut rows {
        row.resize(columns.len(), None);
    }

    Ok(Dataset::new(columns).with_rows(rows))
}

pub fn encode_csv(dataset: &Dataset, header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if header && !dataset.columns.is_empty() {
        writer.write_record(&dataset.columns)?;
    }
    for row in &dataset.rows {
        writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

pub fn decode_parquet(data: Bytes) -> Result<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let mut rows = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        let text = batch
            .columns()
            .iter()
            .map(|c| cast(c, &DataType::Utf8))
            .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;

        for row in 0..batch.num_rows() {
            rows.push(
                text.iter()
                    .map(|array| {
                        let values = array.as_string::<i32>();
                        (!values.is_null(row)).then(|| values.value(row).to_string())
                    })
                    .collect(),
            );
        }
    }

    Ok(Dataset::new(columns).with_rows(rows))
}

/// 所有欄位以可為 NULL 的 UTF-8 寫出
pub fn encode_parquet(dataset: &Dataset) -> Result<Vec<u8>> {
    let schema = Arc::new(Schema::new(
        dataset
            .columns
            .iter()
            .map(|c| Field::new(c, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema.clone(), None)?;
    if !dataset.columns.is_empty() {
        let arrays: Vec<ArrayRef> = (0..dataset.columns.len())
            .map(|i| {
                let values: StringArray = dataset
                    .rows
                    .iter()
                    .map(|row| row.get(i).and_then(|v| v.as_deref()))
                    .collect();
                Arc::new(values) as ArrayRef
            })
            .collect();
        writer.write(&RecordBatch::try_new(schema, arrays)?)?;
    }
    writer.close()?;
    Ok(buffer)
}
