//! Local CSV materializer for the export bulk action.

use async_trait::async_trait;
use csv::Writer;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::{ExportFormat, TransactionRecord};
use crate::error::{EngineError, TransportError};
use crate::ports::{ExportLocation, Exporter};
use crate::validation::ValidationError;

/// Writes selected records as CSV into a directory and hands back a
/// `file://` location. PDF/Excel stay with the backend exporter.
pub struct CsvExporter {
    out_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

/// CSV row representation; decimals and dates rendered as strings.
#[derive(Serialize)]
struct TransactionCsvRow {
    id: String,
    kind: String,
    status: String,
    amount: String,
    currency: String,
    user: String,
    from_account: String,
    to_account: String,
    occurred_at: String,
    created_at: String,
    updated_at: String,
    processed_at: String,
    reject_reason: String,
    admin_note: String,
}

impl From<&TransactionRecord> for TransactionCsvRow {
    fn from(record: &TransactionRecord) -> Self {
        TransactionCsvRow {
            id: record.id.clone(),
            kind: record.kind.to_string(),
            status: record.status.to_string(),
            amount: record.amount.to_string(),
            currency: record.currency.clone(),
            user: record.user.name.clone(),
            from_account: record
                .from_account
                .as_ref()
                .map(|a| a.display_name.clone())
                .unwrap_or_default(),
            to_account: record
                .to_account
                .as_ref()
                .map(|a| a.display_name.clone())
                .unwrap_or_default(),
            occurred_at: record.occurred_at.to_rfc3339(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
            processed_at: record
                .processed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            reject_reason: record
                .reject_reason
                .map(|r| r.to_string())
                .unwrap_or_default(),
            admin_note: record.admin_note.clone().unwrap_or_default(),
        }
    }
}

fn csv_error(err: csv::Error) -> EngineError {
    TransportError::Io(io::Error::new(io::ErrorKind::Other, err)).into()
}

#[async_trait]
impl Exporter for CsvExporter {
    async fn export(
        &self,
        records: &[TransactionRecord],
        format: ExportFormat,
    ) -> Result<ExportLocation, EngineError> {
        if format != ExportFormat::Csv {
            return Err(ValidationError::new(
                "format",
                format!("local exporter only writes csv, got {}", format.as_str()),
            )
            .into());
        }

        std::fs::create_dir_all(&self.out_dir).map_err(TransportError::Io)?;
        let path = self
            .out_dir
            .join(format!("transactions-{}.csv", Uuid::new_v4()));

        let mut writer = Writer::from_path(&path).map_err(csv_error)?;
        for record in records {
            writer
                .serialize(TransactionCsvRow::from(record))
                .map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|err| EngineError::Transport(TransportError::Io(err)))?;

        Ok(ExportLocation {
            url: format!("file://{}", path.display()),
        })
    }
}
