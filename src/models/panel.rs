use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::CatalogError;

/// Electrical/thermal datasheet values for one panel model.
///
/// Serialized with the field names of the scraped catalog file
/// (`model_no`, `maximum_power_pmax`, ...), so a catalog written by the
/// ingestion job round-trips through this type unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PanelRecord", into = "PanelRecord")]
pub struct PanelSpec {
    model_id: String,
    rated_power_watts: f64,
    temp_coeff_per_deg_c: f64,
    noct_temp_c: f64,
}

impl PanelSpec {
    pub fn new(
        model_id: impl Into<String>,
        rated_power_watts: f64,
        temp_coeff_per_deg_c: f64,
        noct_temp_c: f64,
    ) -> Result<Self, CatalogError> {
        let model_id = model_id.into();
        let invalid = |reason: &str| CatalogError::InvalidSpec {
            id: model_id.clone(),
            reason: reason.to_string(),
        };

        if model_id.trim().is_empty() {
            return Err(invalid("empty model id"));
        }
        if !rated_power_watts.is_finite() || rated_power_watts <= 0.0 {
            return Err(invalid("rated power must be a positive number"));
        }
        if !temp_coeff_per_deg_c.is_finite() {
            return Err(invalid("temperature coefficient must be finite"));
        }
        if !noct_temp_c.is_finite() {
            return Err(invalid("NOCT must be finite"));
        }

        Ok(Self {
            model_id,
            rated_power_watts,
            temp_coeff_per_deg_c,
            noct_temp_c,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Maximum power at STC (W)
    pub fn rated_power_watts(&self) -> f64 {
        self.rated_power_watts
    }

    /// Pmax temperature coefficient as a fraction per °C (e.g. -0.0035)
    pub fn temp_coeff_per_deg_c(&self) -> f64 {
        self.temp_coeff_per_deg_c
    }

    pub fn noct_temp_c(&self) -> f64 {
        self.noct_temp_c
    }
}

/// On-disk / on-wire shape of a panel entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PanelRecord {
    #[serde(default)]
    pub model_no: String,
    pub maximum_power_pmax: f64,
    pub temperature_coefficient_pmax: f64,
    pub noct_temp: f64,
}

impl TryFrom<PanelRecord> for PanelSpec {
    type Error = CatalogError;

    fn try_from(r: PanelRecord) -> Result<Self, Self::Error> {
        PanelSpec::new(
            r.model_no,
            r.maximum_power_pmax,
            r.temperature_coefficient_pmax,
            r.noct_temp,
        )
    }
}

impl From<PanelSpec> for PanelRecord {
    fn from(p: PanelSpec) -> Self {
        Self {
            model_no: p.model_id,
            maximum_power_pmax: p.rated_power_watts,
            temperature_coefficient_pmax: p.temp_coeff_per_deg_c,
            noct_temp: p.noct_temp_c,
        }
    }
}
