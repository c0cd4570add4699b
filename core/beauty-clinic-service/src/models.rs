// core/beauty-clinic-service/src/models.rs
// Clinic entities, read views and request payloads

use chrono::NaiveDate;
use domain_cache_common::validation::{
    validate_duration, validate_price, validate_text, validate_time, ValidationError,
};
use serde::{Deserialize, Serialize};

const MAX_NAME_LENGTH: usize = 80;
const MAX_DESCRIPTION_LENGTH: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatment {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
}

/// Catalog row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreatmentSummary {
    pub id: u64,
    pub name: String,
    pub price_cents: i64,
}

impl From<&Treatment> for TreatmentSummary {
    fn from(t: &Treatment) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            price_cents: t.price_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Open,
    Booked,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: u64,
    pub date: NaiveDate,
    pub time: String,
    pub treatment_id: u64,
    pub esthetician_id: u64,
    pub esthetician_name: String,
    pub status: AppointmentStatus,
    pub client_id: Option<String>,
}

/// An open slot as listed by the availability endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlot {
    pub id: u64,
    pub date: NaiveDate,
    pub time: String,
    pub treatment_id: u64,
    pub treatment: String,
    pub esthetician_id: u64,
    pub esthetician: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub appointment_id: u64,
    pub date: NaiveDate,
    pub time: String,
    pub treatment_id: u64,
    pub treatment: String,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicSettings {
    pub opening_time: String,
    pub closing_time: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: u64,
    pub title: String,
    pub discount_percent: u8,
    pub treatment_id: Option<u64>,
    pub valid_until: NaiveDate,
}

// ============================================================================
// REQUEST PAYLOADS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub esthetician_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTreatment {
    pub name: String,
    pub description: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
}

impl NewTreatment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text("name", &self.name, MAX_NAME_LENGTH)?;
        validate_text("description", &self.description, MAX_DESCRIPTION_LENGTH)?;
        validate_duration(self.duration_minutes)?;
        validate_price(self.price_cents)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub price_cents: Option<i64>,
}

impl TreatmentUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_text("name", name, MAX_NAME_LENGTH)?;
        }
        if let Some(description) = &self.description {
            validate_text("description", description, MAX_DESCRIPTION_LENGTH)?;
        }
        if let Some(minutes) = self.duration_minutes {
            validate_duration(minutes)?;
        }
        if let Some(cents) = self.price_cents {
            validate_price(cents)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time: String,
    pub treatment_id: u64,
    pub esthetician_id: u64,
    pub esthetician_name: String,
}

impl NewAppointment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_time(&self.time)?;
        validate_text("esthetician_name", &self.esthetician_name, MAX_NAME_LENGTH)
    }
}

impl ClinicSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let opens = validate_time(&self.opening_time)?;
        let closes = validate_time(&self.closing_time)?;
        if closes <= opens {
            return Err(ValidationError::InvalidTime(
                "closing_time must be after opening_time".to_string(),
            ));
        }
        validate_text("phone", &self.phone, 32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPromotion {
    pub title: String,
    pub discount_percent: u8,
    pub treatment_id: Option<u64>,
    pub valid_until: NaiveDate,
}

impl NewPromotion {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text("title", &self.title, MAX_NAME_LENGTH)?;
        if !(1..=90).contains(&self.discount_percent) {
            return Err(ValidationError::InvalidPrice(
                "discount_percent must be between 1 and 90".to_string(),
            ));
        }
        Ok(())
    }
}
