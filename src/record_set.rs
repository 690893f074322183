use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::{DashboardError, Result};
use crate::payloads::ViewPayload;
use crate::quality::DataQualityWarning;

/// One provider payload, held as delivered, plus the advisory warnings found
/// in it.
#[derive(Debug, Clone)]
pub struct RecordSet<P> {
    payload: P,
    fetched_at: DateTime<Utc>,
    warnings: Vec<DataQualityWarning>,
}

impl<P: ViewPayload> RecordSet<P> {
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(DashboardError::malformed(
                P::VIEW.slug(),
                "expected a JSON object at the top level",
            ));
        }

        let payload: P = serde_json::from_value(value)
            .map_err(|err| DashboardError::malformed(P::VIEW.slug(), err))?;
        Ok(Self::new(payload))
    }

    pub fn new(payload: P) -> Self {
        let warnings = payload.quality_warnings();
        for warning in &warnings {
            warn!(view = %P::VIEW, "data quality: {warning}");
        }

        Self {
            payload,
            fetched_at: Utc::now(),
            warnings,
        }
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn warnings(&self) -> &[DataQualityWarning] {
        &self.warnings
    }
}
