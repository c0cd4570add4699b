// core/beauty-clinic-service/src/repository.rs
// In-process clinic data store (source of truth behind the cache)

use crate::models::{
    Appointment, AppointmentStatus, AvailableSlot, ClinicSettings, HistoryEntry, NewAppointment,
    NewPromotion, NewTreatment, Promotion, Treatment, TreatmentSummary, TreatmentUpdate,
};
use chrono::NaiveDate;
use domain_cache_common::ServiceError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct ClinicData {
    treatments: BTreeMap<u64, Treatment>,
    appointments: BTreeMap<u64, Appointment>,
    promotions: BTreeMap<u64, Promotion>,
    settings: ClinicSettings,
    next_id: u64,
}

impl ClinicData {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn treatment_name(&self, id: u64) -> String {
        self.treatments
            .get(&id)
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }
}

/// Shared handle; clones see the same data.
#[derive(Clone)]
pub struct ClinicRepository {
    data: Arc<RwLock<ClinicData>>,
}

impl ClinicRepository {
    fn with_data(data: ClinicData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Starter catalog and two open slots, enough to serve every read path.
    pub fn seeded() -> Self {
        let mut treatments = BTreeMap::new();
        for (id, name, description, minutes, cents) in [
            (10, "Deep Facial Cleansing", "Exfoliation, steam, extraction and hydration", 90, 8_550),
            (20, "Hot Stone Massage", "Relaxing massage with volcanic stones", 75, 9_500),
            (30, "Laser Hair Removal", "Diode laser session, one zone", 60, 12_000),
        ] {
            treatments.insert(
                id,
                Treatment {
                    id,
                    name: name.to_string(),
                    description: description.to_string(),
                    duration_minutes: minutes,
                    price_cents: cents,
                },
            );
        }

        let mut appointments = BTreeMap::new();
        if let Some(date) = NaiveDate::from_ymd_opt(2025, 10, 1) {
            for (id, time, treatment_id, esthetician_id, esthetician) in
                [(1, "10:00", 10, 1, "Sofia"), (2, "11:30", 20, 2, "Laura")]
            {
                appointments.insert(
                    id,
                    Appointment {
                        id,
                        date,
                        time: time.to_string(),
                        treatment_id,
                        esthetician_id,
                        esthetician_name: esthetician.to_string(),
                        status: AppointmentStatus::Open,
                        client_id: None,
                    },
                );
            }
        }

        Self::with_data(ClinicData {
            treatments,
            appointments,
            promotions: BTreeMap::new(),
            settings: ClinicSettings {
                opening_time: "09:00".to_string(),
                closing_time: "20:00".to_string(),
                phone: "+573101234567".to_string(),
            },
            // Ids below this are reserved for the seed rows
            next_id: 100,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn available_slots(
        &self,
        date: Option<NaiveDate>,
        esthetician_id: Option<u64>,
    ) -> Vec<AvailableSlot> {
        let data = self.data.read().await;
        data.appointments
            .values()
            .filter(|a| a.status == AppointmentStatus::Open)
            .filter(|a| date.map_or(true, |d| a.date == d))
            .filter(|a| esthetician_id.map_or(true, |e| a.esthetician_id == e))
            .map(|a| AvailableSlot {
                id: a.id,
                date: a.date,
                time: a.time.clone(),
                treatment_id: a.treatment_id,
                treatment: data.treatment_name(a.treatment_id),
                esthetician_id: a.esthetician_id,
                esthetician: a.esthetician_name.clone(),
            })
            .collect()
    }

    pub async fn treatment(&self, id: u64) -> Result<Treatment, ServiceError> {
        self.data
            .read()
            .await
            .treatments
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Treatment {} not found", id)))
    }

    pub async fn catalog(&self) -> Vec<TreatmentSummary> {
        self.data
            .read()
            .await
            .treatments
            .values()
            .map(TreatmentSummary::from)
            .collect()
    }

    pub async fn settings(&self) -> ClinicSettings {
        self.data.read().await.settings.clone()
    }

    pub async fn active_promotions(&self, today: NaiveDate) -> Vec<Promotion> {
        self.data
            .read()
            .await
            .promotions
            .values()
            .filter(|p| p.valid_until >= today)
            .cloned()
            .collect()
    }

    pub async fn client_history(&self, client_id: &str) -> Vec<HistoryEntry> {
        let data = self.data.read().await;
        let mut entries: Vec<HistoryEntry> = data
            .appointments
            .values()
            .filter(|a| a.client_id.as_deref() == Some(client_id))
            .map(|a| HistoryEntry {
                appointment_id: a.id,
                date: a.date,
                time: a.time.clone(),
                treatment_id: a.treatment_id,
                treatment: data.treatment_name(a.treatment_id),
                status: a.status,
            })
            .collect();
        entries.sort_by(|a, b| (b.date, &b.time).cmp(&(a.date, &a.time)));
        entries
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub async fn create_treatment(&self, new: NewTreatment) -> Treatment {
        let mut data = self.data.write().await;
        let id = data.allocate_id();
        let treatment = Treatment {
            id,
            name: new.name,
            description: new.description,
            duration_minutes: new.duration_minutes,
            price_cents: new.price_cents,
        };
        data.treatments.insert(id, treatment.clone());
        treatment
    }

    pub async fn update_treatment(
        &self,
        id: u64,
        update: TreatmentUpdate,
    ) -> Result<Treatment, ServiceError> {
        let mut data = self.data.write().await;
        let treatment = data
            .treatments
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Treatment {} not found", id)))?;

        if let Some(name) = update.name {
            treatment.name = name;
        }
        if let Some(description) = update.description {
            treatment.description = description;
        }
        if let Some(minutes) = update.duration_minutes {
            treatment.duration_minutes = minutes;
        }
        if let Some(cents) = update.price_cents {
            treatment.price_cents = cents;
        }
        Ok(treatment.clone())
    }

    /// Refused while an open or booked appointment still uses the treatment.
    pub async fn delete_treatment(&self, id: u64) -> Result<Treatment, ServiceError> {
        let mut data = self.data.write().await;
        if !data.treatments.contains_key(&id) {
            return Err(ServiceError::NotFound(format!("Treatment {} not found", id)));
        }
        let in_use = data
            .appointments
            .values()
            .any(|a| a.treatment_id == id && a.status != AppointmentStatus::Cancelled);
        if in_use {
            return Err(ServiceError::Conflict(format!(
                "Treatment {} has scheduled appointments",
                id
            )));
        }
        data.treatments
            .remove(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Treatment {} not found", id)))
    }

    pub async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, ServiceError> {
        let mut data = self.data.write().await;
        if !data.treatments.contains_key(&new.treatment_id) {
            return Err(ServiceError::ValidationError(format!(
                "Treatment {} does not exist",
                new.treatment_id
            )));
        }
        let clash = data.appointments.values().any(|a| {
            a.esthetician_id == new.esthetician_id
                && a.date == new.date
                && a.time == new.time
                && a.status != AppointmentStatus::Cancelled
        });
        if clash {
            return Err(ServiceError::Conflict(
                "Esthetician already has a slot at that time".to_string(),
            ));
        }

        let id = data.allocate_id();
        let appointment = Appointment {
            id,
            date: new.date,
            time: new.time,
            treatment_id: new.treatment_id,
            esthetician_id: new.esthetician_id,
            esthetician_name: new.esthetician_name,
            status: AppointmentStatus::Open,
            client_id: None,
        };
        data.appointments.insert(id, appointment.clone());
        Ok(appointment)
    }

    pub async fn book(&self, id: u64, client_id: &str) -> Result<Appointment, ServiceError> {
        let mut data = self.data.write().await;
        let appointment = data
            .appointments
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Appointment {} not found", id)))?;

        if appointment.status != AppointmentStatus::Open {
            return Err(ServiceError::Conflict(format!(
                "Appointment {} is not available",
                id
            )));
        }
        appointment.status = AppointmentStatus::Booked;
        appointment.client_id = Some(client_id.to_string());
        Ok(appointment.clone())
    }

    /// Cancel a booked appointment. Only the booking client or an admin may.
    pub async fn cancel(
        &self,
        id: u64,
        caller_id: &str,
        is_admin: bool,
    ) -> Result<Appointment, ServiceError> {
        let mut data = self.data.write().await;
        let appointment = data
            .appointments
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Appointment {} not found", id)))?;

        if appointment.status != AppointmentStatus::Booked {
            return Err(ServiceError::Conflict(format!(
                "Appointment {} is not booked",
                id
            )));
        }
        if !is_admin && appointment.client_id.as_deref() != Some(caller_id) {
            return Err(ServiceError::Forbidden);
        }
        appointment.status = AppointmentStatus::Cancelled;
        Ok(appointment.clone())
    }

    pub async fn update_settings(&self, settings: ClinicSettings) -> ClinicSettings {
        let mut data = self.data.write().await;
        data.settings = settings;
        data.settings.clone()
    }

    pub async fn create_promotion(&self, new: NewPromotion) -> Result<Promotion, ServiceError> {
        let mut data = self.data.write().await;
        if let Some(treatment_id) = new.treatment_id {
            if !data.treatments.contains_key(&treatment_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Treatment {} does not exist",
                    treatment_id
                )));
            }
        }
        let id = data.allocate_id();
        let promotion = Promotion {
            id,
            title: new.title,
            discount_percent: new.discount_percent,
            treatment_id: new.treatment_id,
            valid_until: new.valid_until,
        };
        data.promotions.insert(id, promotion.clone());
        Ok(promotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    #[tokio::test]
    async fn test_seeded_reads() {
        let repo = ClinicRepository::seeded();

        assert_eq!(repo.catalog().await.len(), 3);
        assert_eq!(repo.treatment(10).await.unwrap().duration_minutes, 90);
        assert!(matches!(repo.treatment(99).await, Err(ServiceError::NotFound(_))));

        let slots = repo.available_slots(Some(day()), None).await;
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].treatment, "Deep Facial Cleansing");

        let laura = repo.available_slots(None, Some(2)).await;
        assert_eq!(laura.len(), 1);
        assert_eq!(laura[0].esthetician, "Laura");
    }

    #[tokio::test]
    async fn test_book_then_cancel() {
        let repo = ClinicRepository::seeded();

        let booked = repo.book(1, "client-a").await.unwrap();
        assert_eq!(booked.status, AppointmentStatus::Booked);
        assert_eq!(repo.available_slots(None, None).await.len(), 1);
        assert!(matches!(repo.book(1, "client-b").await, Err(ServiceError::Conflict(_))));

        assert!(matches!(
            repo.cancel(1, "client-b", false).await,
            Err(ServiceError::Forbidden)
        ));
        let cancelled = repo.cancel(1, "client-a", false).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let history = repo.client_history("client-a").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_treatment_lifecycle() {
        let repo = ClinicRepository::seeded();

        let created = repo
            .create_treatment(NewTreatment {
                name: "Gel Manicure".to_string(),
                description: "Long-lasting gel polish".to_string(),
                duration_minutes: 45,
                price_cents: 3_500,
            })
            .await;
        assert!(created.id > 30);

        let updated = repo
            .update_treatment(
                created.id,
                TreatmentUpdate {
                    price_cents: Some(4_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 4_000);
        assert_eq!(updated.name, "Gel Manicure");

        repo.delete_treatment(created.id).await.unwrap();
        assert!(repo.treatment(created.id).await.is_err());

        // Seeded treatment 10 backs an open slot
        assert!(matches!(
            repo.delete_treatment(10).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_appointment_rejects_clash() {
        let repo = ClinicRepository::seeded();
        let slot = NewAppointment {
            date: day(),
            time: "10:00".to_string(),
            treatment_id: 30,
            esthetician_id: 1,
            esthetician_name: "Sofia".to_string(),
        };
        assert!(matches!(
            repo.create_appointment(slot.clone()).await,
            Err(ServiceError::Conflict(_))
        ));

        let later = NewAppointment {
            time: "15:00".to_string(),
            ..slot
        };
        let created = repo.create_appointment(later).await.unwrap();
        assert_eq!(created.status, AppointmentStatus::Open);
    }

    #[tokio::test]
    async fn test_active_promotions_filter_by_date() {
        let repo = ClinicRepository::seeded();
        repo.create_promotion(NewPromotion {
            title: "Autumn glow".to_string(),
            discount_percent: 15,
            treatment_id: Some(10),
            valid_until: day(),
        })
        .await
        .unwrap();

        assert_eq!(repo.active_promotions(day()).await.len(), 1);
        assert!(repo
            .active_promotions(day().succ_opt().unwrap())
            .await
            .is_empty());
    }
}
