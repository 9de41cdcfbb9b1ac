//! Silver-tier Parquet encoding of CNAE rows

use crate::error::{Result, StageError};
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use bytes::Bytes;
use cnae_common::CnaeRecord;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

pub const CODE_COLUMN: &str = "codigo_cnae";
pub const DESCRIPTION_COLUMN: &str = "descricao_cnae";

/// Declared silver schema: both columns are text, codes are never null
pub fn cnae_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(CODE_COLUMN, DataType::Utf8, false),
        Field::new(DESCRIPTION_COLUMN, DataType::Utf8, true),
    ]))
}

/// Encode rows as a single-row-group, Snappy-compressed Parquet file
pub fn encode(records: &[CnaeRecord]) -> Result<Vec<u8>> {
    let schema = cnae_schema();

    let codes: StringArray = records.iter().map(|r| Some(r.codigo_cnae.as_str())).collect();
    let descriptions: StringArray = records
        .iter()
        .map(|r| r.descricao_cnae.as_deref())
        .collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(codes) as ArrayRef, Arc::new(descriptions) as ArrayRef],
    )?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), schema, Some(props))?;
    writer.write(&batch)?;
    Ok(writer.into_inner()?)
}

/// Decode a silver Parquet file back into rows
pub fn decode(data: Vec<u8>) -> Result<Vec<CnaeRecord>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let codes = string_column(&batch, CODE_COLUMN)?;
        let descriptions = string_column(&batch, DESCRIPTION_COLUMN)?;

        records.reserve(batch.num_rows());
        for row in 0..batch.num_rows() {
            if codes.is_null(row) {
                return Err(StageError::Columnar(format!(
                    "{} is null at row {}",
                    CODE_COLUMN, row
                )));
            }
            records.push(CnaeRecord {
                codigo_cnae: codes.value(row).to_string(),
                descricao_cnae: (!descriptions.is_null(row))
                    .then(|| descriptions.value(row).to_string()),
            });
        }
    }

    Ok(records)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| StageError::Columnar(format!("missing column '{}'", name)))?;

    column
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            StageError::Columnar(format!(
                "column '{}' has type {}, expected Utf8",
                name,
                column.data_type()
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parquet::file::reader::{FileReader, SerializedFileReader};

    fn sample() -> Vec<CnaeRecord> {
        vec![
            CnaeRecord::new("0111301", "Cultivo de arroz"),
            CnaeRecord {
                codigo_cnae: "0111302".to_string(),
                descricao_cnae: None,
            },
        ]
    }

    #[test]
    fn test_decode_preserves_text_codes_and_nulls() {
        let bytes = encode(&sample()).unwrap();
        let decoded = decode(bytes).unwrap();

        assert_eq!(decoded, sample());
        assert_eq!(decoded[0].codigo_cnae, "0111301");
    }

    #[test]
    fn test_file_is_snappy_compressed_with_declared_schema() {
        let bytes = encode(&sample()).unwrap();
        let reader = SerializedFileReader::new(Bytes::from(bytes)).unwrap();
        let metadata = reader.metadata();

        assert_eq!(metadata.file_metadata().num_rows(), 2);
        let row_group = metadata.row_group(0);
        for column in row_group.columns() {
            assert_eq!(column.compression(), Compression::SNAPPY);
        }

        let fields: Vec<String> = metadata
            .file_metadata()
            .schema_descr()
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(fields, vec![CODE_COLUMN, DESCRIPTION_COLUMN]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(encode(&sample()).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn test_empty_input_encodes() {
        let bytes = encode(&[]).unwrap();
        assert!(decode(bytes).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"not parquet".to_vec()),
            Err(StageError::Columnar(_))
        ));
    }
}
