//! Tabular surface (Arrow/Parquet)
//!
//! The comparison pipeline works on typed [`ExperimentRow`]s; callers hand in
//! Arrow record batches. This module maps between the two:
//!
//! - [`Dataset`]: input batches (`experiments`, `view_user_cnt`,
//!   `click_user_cnt`, `order_user_cnt`, optional `dy`) → rows
//! - [`records_to_batch`]: [`ComparisonRecord`]s → result table
//! - [`save_parquet`]: result table → Parquet file
//!
//! Presence of the `dy` column switches between the daily and snapshot paths.

use crate::experiment::{ComparisonRecord, ExperimentRow, TimeBucket};
use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array, RecordBatch,
    StringArray,
};
use arrow::compute;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Field, Float64Type, Int64Type, Schema,
};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Column names of the input and result tables
pub mod columns {
    /// Arm label
    pub const EXPERIMENTS: &str = "experiments";
    /// Users who saw the experience
    pub const VIEWS: &str = "view_user_cnt";
    /// Users who clicked
    pub const CLICKS: &str = "click_user_cnt";
    /// Users who ordered
    pub const ORDERS: &str = "order_user_cnt";
    /// Optional time bucket
    pub const TIME_BUCKET: &str = "dy";
    /// Click-through rate
    pub const CTR: &str = "ctr";
    /// Conversion rate
    pub const CR: &str = "cr";
    /// Conversion rate p-value
    pub const P_VALUE_CR: &str = "p-value-cr";
    /// Click-through rate p-value
    pub const P_VALUE_CTR: &str = "p-value-ctr";
    /// Conversion rate significance flag
    pub const SIGNIFICANT_CR: &str = "significant_cr";
    /// Click-through rate significance flag
    pub const SIGNIFICANT_CTR: &str = "significant_ctr";
}

/// In-memory experiment dataset
#[derive(Debug)]
pub struct Dataset {
    batches: Vec<RecordBatch>,
}

impl Dataset {
    /// Create a dataset from existing batches
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Build a dataset from typed rows.
    ///
    /// The `dy` column is written only when the rows carry time buckets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataShape`] if only some rows carry a time bucket,
    /// buckets mix kinds, or a count exceeds `i64::MAX`.
    pub fn from_rows(rows: &[ExperimentRow]) -> Result<Self> {
        let mut fields = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();

        let buckets: Vec<&TimeBucket> = rows
            .iter()
            .filter_map(ExperimentRow::time_bucket)
            .collect();
        if !buckets.is_empty() {
            if buckets.len() != rows.len() {
                return Err(Error::DataShape(
                    "Time bucket 'dy' must be on all rows or none".to_string(),
                ));
            }
            let (field, array) = bucket_column(&buckets)?;
            fields.push(field);
            arrays.push(array);
        }

        fields.push(Field::new(columns::EXPERIMENTS, DataType::Utf8, false));
        arrays.push(Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.arm().label()),
        )));

        for (name, count) in [
            (columns::VIEWS, ExperimentRow::view_count as fn(&ExperimentRow) -> u64),
            (columns::CLICKS, ExperimentRow::click_count),
            (columns::ORDERS, ExperimentRow::order_count),
        ] {
            let values = rows
                .iter()
                .map(|r| to_i64(count(r), name))
                .collect::<Result<Vec<_>>>()?;
            fields.push(Field::new(name, DataType::Int64, false));
            arrays.push(Arc::new(Int64Array::from(values)));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self::new(vec![batch]))
    }

    /// Load a dataset from a Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let file = File::open(path.as_ref()).map_err(|e| {
            Error::StorageError(format!("Failed to open Parquet file: {e}"))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::StorageError(format!("Failed to parse Parquet file: {e}"))
        })?;

        let reader = builder.build().map_err(|e| {
            Error::StorageError(format!("Failed to create Parquet reader: {e}"))
        })?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::StorageError(format!("Failed to read record batch: {e}"))
            })?;
            batches.push(batch);
        }

        debug!(
            path = %path.as_ref().display(),
            batches = batches.len(),
            "Loaded experiment dataset"
        );
        Ok(Self { batches })
    }

    /// Get all record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// True when the dataset has a `dy` column (daily path)
    #[must_use]
    pub fn has_time_bucket(&self) -> bool {
        self.batches
            .first()
            .is_some_and(|b| b.schema().column_with_name(columns::TIME_BUCKET).is_some())
    }

    /// Append a batch (e.g. another upload of the same experiment)
    ///
    /// # Errors
    ///
    /// Returns error if batch schema doesn't match existing batches
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(first) = self.batches.first() {
            let existing_schema = first.schema();
            if batch.schema() != existing_schema {
                return Err(Error::StorageError(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing_schema,
                    batch.schema()
                )));
            }
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Decode every batch into typed rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataShape`] if a required column is missing, has an
    /// unsupported type, or holds nulls or negative counts.
    pub fn rows(&self) -> Result<Vec<ExperimentRow>> {
        let mut rows = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            rows.extend(rows_from_batch(batch)?);
        }
        Ok(rows)
    }
}

/// Decode one record batch into typed rows.
///
/// # Errors
///
/// See [`Dataset::rows`].
pub fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<ExperimentRow>> {
    let arms = arm_labels(required_column(batch, columns::EXPERIMENTS)?)?;
    let views = counts(required_column(batch, columns::VIEWS)?, columns::VIEWS)?;
    let clicks = counts(required_column(batch, columns::CLICKS)?, columns::CLICKS)?;
    let orders = counts(required_column(batch, columns::ORDERS)?, columns::ORDERS)?;

    let buckets = batch
        .column_by_name(columns::TIME_BUCKET)
        .map(time_buckets)
        .transpose()?;

    Ok((0..batch.num_rows())
        .map(|i| {
            let row = ExperimentRow::new(arms[i].as_str(), views[i], clicks[i], orders[i]);
            match &buckets {
                Some(buckets) => row.with_time_bucket(buckets[i].clone()),
                None => row,
            }
        })
        .collect())
}

fn required_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch.column_by_name(name).ok_or_else(|| {
        let present: Vec<_> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        Error::DataShape(format!(
            "Column not found: {name} (columns present: {})\n\
             Expected columns experiments, view_user_cnt, click_user_cnt, order_user_cnt \
             (dy optional)",
            present.join(", ")
        ))
    })
}

fn reject_nulls(column: &ArrayRef, name: &str) -> Result<()> {
    if column.null_count() > 0 {
        return Err(Error::DataShape(format!(
            "Column {name} has {} null values",
            column.null_count()
        )));
    }
    Ok(())
}

/// Text values of a Utf8/LargeUtf8 column, `None` for any other type.
fn text_values(column: &ArrayRef) -> Option<Vec<String>> {
    let owned = |v: Option<&str>| v.unwrap_or_default().to_string();
    match column.data_type() {
        DataType::Utf8 => Some(column.as_string::<i32>().iter().map(owned).collect()),
        DataType::LargeUtf8 => Some(column.as_string::<i64>().iter().map(owned).collect()),
        _ => None,
    }
}

fn arm_labels(column: &ArrayRef) -> Result<Vec<String>> {
    reject_nulls(column, columns::EXPERIMENTS)?;
    text_values(column).ok_or_else(|| {
        Error::DataShape(format!(
            "Column {} must be text, got {:?}",
            columns::EXPERIMENTS,
            column.data_type()
        ))
    })
}

#[allow(clippy::float_cmp)]
fn counts(column: &ArrayRef, name: &str) -> Result<Vec<u64>> {
    reject_nulls(column, name)?;
    if !column.data_type().is_numeric() {
        return Err(Error::DataShape(format!(
            "Column {name} must be numeric, got {:?}",
            column.data_type()
        )));
    }

    if column.data_type().is_floating() {
        let floats = compute::cast(column, &DataType::Float64)?;
        let fractional = floats
            .as_primitive::<Float64Type>()
            .values()
            .iter()
            .position(|v| !v.is_finite() || v.fract() != 0.0);
        if let Some(row) = fractional {
            return Err(Error::DataShape(format!(
                "Column {name} has non-integral count {} at row {row}",
                floats.as_primitive::<Float64Type>().value(row)
            )));
        }
    }

    let cast = compute::cast(column, &DataType::Int64)?;
    reject_nulls(&cast, name)?;
    cast.as_primitive::<Int64Type>()
        .values()
        .iter()
        .map(|&v| {
            u64::try_from(v)
                .map_err(|_| Error::DataShape(format!("Column {name} has negative count {v}")))
        })
        .collect()
}

fn time_buckets(column: &ArrayRef) -> Result<Vec<TimeBucket>> {
    reject_nulls(column, columns::TIME_BUCKET)?;
    let invalid_date = |i: usize| {
        Error::DataShape(format!(
            "Column {} has an out-of-range date at row {i}",
            columns::TIME_BUCKET
        ))
    };

    match column.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => Ok(text_values(column)
            .unwrap_or_default()
            .into_iter()
            .map(TimeBucket::Label)
            .collect()),
        DataType::Date32 => {
            let dates = column.as_primitive::<Date32Type>();
            (0..dates.len())
                .map(|i| {
                    dates
                        .value_as_date(i)
                        .map(TimeBucket::Date)
                        .ok_or_else(|| invalid_date(i))
                })
                .collect()
        }
        DataType::Date64 => {
            let dates = column.as_primitive::<Date64Type>();
            (0..dates.len())
                .map(|i| {
                    dates
                        .value_as_date(i)
                        .map(TimeBucket::Date)
                        .ok_or_else(|| invalid_date(i))
                })
                .collect()
        }
        dt if dt.is_integer() => {
            let cast = compute::cast(column, &DataType::Int64)?;
            Ok(cast
                .as_primitive::<Int64Type>()
                .values()
                .iter()
                .map(|&day| TimeBucket::Day(day))
                .collect())
        }
        dt => Err(Error::DataShape(format!(
            "Column {} must be an integer, date or text, got {dt:?}",
            columns::TIME_BUCKET
        ))),
    }
}

fn to_i64(value: u64, name: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| Error::DataShape(format!("Column {name} value {value} exceeds i64::MAX")))
}

/// Encode time buckets as a `dy` column typed after their kind.
fn bucket_column(buckets: &[&TimeBucket]) -> Result<(Field, ArrayRef)> {
    let mixed = || Error::DataShape("Time buckets mix integer, date and text values".to_string());

    match buckets.first() {
        Some(TimeBucket::Day(_)) => {
            let days = buckets
                .iter()
                .map(|b| match b {
                    TimeBucket::Day(day) => Ok(*day),
                    _ => Err(mixed()),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((
                Field::new(columns::TIME_BUCKET, DataType::Int64, false),
                Arc::new(Int64Array::from(days)),
            ))
        }
        Some(TimeBucket::Date(_)) => {
            let epoch = NaiveDate::default();
            let days = buckets
                .iter()
                .map(|b| match b {
                    TimeBucket::Date(date) => {
                        i32::try_from(date.signed_duration_since(epoch).num_days()).map_err(|_| {
                            Error::DataShape(format!("Date {date} out of Date32 range"))
                        })
                    }
                    _ => Err(mixed()),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((
                Field::new(columns::TIME_BUCKET, DataType::Date32, false),
                Arc::new(Date32Array::from(days)),
            ))
        }
        Some(TimeBucket::Label(_)) => {
            let labels = buckets
                .iter()
                .map(|b| match b {
                    TimeBucket::Label(label) => Ok(label.as_str()),
                    _ => Err(mixed()),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((
                Field::new(columns::TIME_BUCKET, DataType::Utf8, false),
                Arc::new(StringArray::from(labels)),
            ))
        }
        None => Err(Error::DataShape("No time buckets to encode".to_string())),
    }
}

/// Render comparison records as the result table.
///
/// Columns: `[dy]?, view_user_cnt, ctr, cr, p-value-cr, p-value-ctr,
/// experiments, significant_cr, significant_ctr`. Row order is preserved.
///
/// # Errors
///
/// Returns [`Error::DataShape`] if only some records carry a time bucket or
/// buckets mix kinds.
pub fn records_to_batch(records: &[ComparisonRecord]) -> Result<RecordBatch> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    let buckets: Vec<&TimeBucket> = records
        .iter()
        .filter_map(ComparisonRecord::time_bucket)
        .collect();
    if !buckets.is_empty() {
        if buckets.len() != records.len() {
            return Err(Error::DataShape(
                "Time bucket 'dy' must be on all records or none".to_string(),
            ));
        }
        let (field, array) = bucket_column(&buckets)?;
        fields.push(field);
        arrays.push(array);
    }

    let views = records
        .iter()
        .map(|r| to_i64(r.view_count(), columns::VIEWS))
        .collect::<Result<Vec<_>>>()?;
    fields.push(Field::new(columns::VIEWS, DataType::Int64, false));
    arrays.push(Arc::new(Int64Array::from(views)));

    for (name, value) in [
        (columns::CTR, ComparisonRecord::ctr as fn(&ComparisonRecord) -> f64),
        (columns::CR, ComparisonRecord::cr),
        (columns::P_VALUE_CR, ComparisonRecord::p_value_cr),
        (columns::P_VALUE_CTR, ComparisonRecord::p_value_ctr),
    ] {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from_iter_values(
            records.iter().map(value),
        )));
    }

    fields.push(Field::new(columns::EXPERIMENTS, DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from_iter_values(
        records.iter().map(|r| r.arm().label()),
    )));

    for (name, flag) in [
        (
            columns::SIGNIFICANT_CR,
            ComparisonRecord::significant_cr as fn(&ComparisonRecord) -> bool,
        ),
        (columns::SIGNIFICANT_CTR, ComparisonRecord::significant_ctr),
    ] {
        fields.push(Field::new(name, DataType::Boolean, false));
        arrays.push(Arc::new(BooleanArray::from(
            records.iter().map(flag).collect::<Vec<_>>(),
        )));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Write a result table to a Parquet file
///
/// # Errors
/// Returns error if the file cannot be created or written
pub fn save_parquet<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    use parquet::arrow::ArrowWriter;
    use std::fs::File;

    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet writer: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| Error::StorageError(format!("Failed to write record batch: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::StorageError(format!("Failed to finish Parquet file: {e}")))?;

    debug!(
        path = %path.as_ref().display(),
        rows = batch.num_rows(),
        "Saved result table"
    );
    Ok(())
}
