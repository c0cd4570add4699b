// core/beauty-clinic-service/src/handlers/clinic.rs
// Public clinic reads (cached) and client booking endpoints

use crate::cache_invalidation::tags;
use crate::middleware::auth::Caller;
use crate::models::{
    AvailabilityQuery, AvailableSlot, ClinicSettings, HistoryEntry, Promotion, Treatment,
    TreatmentSummary,
};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use domain_cache_common::{validation::validate_date, MetricsTimer, Role, ServiceError};

/// GET /beauty/appointments/available?date=YYYY-MM-DD&esthetician_id=N
pub async fn available_appointments(
    state: web::Data<AppState>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ServiceError> {
    let date = query.date.as_deref().map(validate_date).transpose()?;
    let esthetician_id = query.esthetician_id;

    let slots: Vec<AvailableSlot> = state
        .caches
        .availability
        .op("get_available_appointments")
        .named("date", date)
        .named("esthetician_id", esthetician_id)
        .tag(tags::AVAILABLE_APPOINTMENTS)
        .run(|| async {
            Ok::<_, ServiceError>(state.repo.available_slots(date, esthetician_id).await)
        })
        .await?;

    Ok(HttpResponse::Ok().json(slots))
}

/// GET /beauty/treatments/{id}. A missing treatment is a 404 and is not cached.
pub async fn treatment_detail(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();

    let treatment: Treatment = state
        .caches
        .treatment
        .op("get_treatment")
        .arg(id)
        .tag(tags::treatment(id))
        .run(|| state.repo.treatment(id))
        .await?;

    Ok(HttpResponse::Ok().json(treatment))
}

/// GET /beauty/catalog/treatments
pub async fn service_catalog(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let catalog: Vec<TreatmentSummary> = state
        .caches
        .catalog
        .op("get_catalog")
        .tag(tags::CATALOG)
        .run(|| async { Ok::<_, ServiceError>(state.repo.catalog().await) })
        .await?;

    Ok(HttpResponse::Ok().json(catalog))
}

/// GET /beauty/config/clinic
pub async fn clinic_config(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let settings: ClinicSettings = state
        .caches
        .clinic_config
        .op("get_clinic_config")
        .tag(tags::CLINIC_CONFIG)
        .run(|| async { Ok::<_, ServiceError>(state.repo.settings().await) })
        .await?;

    Ok(HttpResponse::Ok().json(settings))
}

/// GET /beauty/promotions
pub async fn active_promotions(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    // Keyed by day so expired promotions fall out at midnight
    let today = Utc::now().date_naive();

    let promotions: Vec<Promotion> = state
        .caches
        .promotions
        .op("get_active_promotions")
        .named("today", today)
        .tag(tags::PROMOTIONS)
        .run(|| async { Ok::<_, ServiceError>(state.repo.active_promotions(today).await) })
        .await?;

    Ok(HttpResponse::Ok().json(promotions))
}

/// GET /beauty/clients/{id}/history, for the client themself or an admin.
pub async fn client_history(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let client_id = path.into_inner();
    let account = caller.account(&state).await?;
    if account.id != client_id && account.role != Role::Admin {
        return Err(ServiceError::Forbidden);
    }

    let history: Vec<HistoryEntry> = state
        .caches
        .history
        .op("get_client_history")
        .arg(&client_id)
        .tag(tags::client_history(&client_id))
        .tags_from(|entries: &Vec<HistoryEntry>| {
            entries
                .iter()
                .flat_map(|e| [tags::treatment(e.treatment_id), tags::appointment(e.appointment_id)])
                .collect()
        })
        .run(|| async { Ok::<_, ServiceError>(state.repo.client_history(&client_id).await) })
        .await?;

    Ok(HttpResponse::Ok().json(history))
}

/// POST /beauty/appointments/{id}/book
pub async fn book_appointment(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    let account = caller.account(&state).await?;
    let timer = MetricsTimer::new();

    let appointment = match state.repo.book(id, &account.id).await {
        Ok(appointment) => appointment,
        Err(e) => {
            state
                .metrics
                .record_business_operation("appointment_booked", "failure", timer.elapsed_seconds());
            return Err(e);
        }
    };

    state
        .invalidation
        .on_appointment_change(id, Some(&account.id))
        .await;
    state
        .metrics
        .record_business_operation("appointment_booked", "success", timer.elapsed_seconds());

    tracing::info!(appointment_id = id, username = %account.username, "Appointment booked");
    Ok(HttpResponse::Ok().json(appointment))
}

/// POST /beauty/appointments/{id}/cancel. The booking client or an admin.
pub async fn cancel_appointment(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    let account = caller.account(&state).await?;
    let timer = MetricsTimer::new();

    let appointment = state
        .repo
        .cancel(id, &account.id, account.role == Role::Admin)
        .await?;

    state
        .invalidation
        .on_appointment_change(id, appointment.client_id.as_deref())
        .await;
    state
        .metrics
        .record_business_operation("appointment_cancelled", "success", timer.elapsed_seconds());

    tracing::info!(appointment_id = id, username = %account.username, "Appointment cancelled");
    Ok(HttpResponse::Ok().json(appointment))
}

#[cfg(test)]
mod tests {
    use crate::state::testing::{
        admin_and_client, bearer_for, clinic_app, send, state_with_store, test_state,
        UnreachableStore,
    };
    use actix_web::{http::StatusCode, test};
    use serde_json::json;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_available_appointments_lists_open_slots() {
        let state = test_state();
        let app = test::init_service(clinic_app(state.clone())).await;

        let req = test::TestRequest::get()
            .uri("/beauty/appointments/available?date=2025-10-01")
            .to_request();
        let (status, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::OK);
        let slots = body.as_array().unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().any(|s| s["treatment"] == "Deep Facial Cleansing"));
    }

    #[actix_web::test]
    async fn test_available_appointments_rejects_bad_date() {
        let app = test::init_service(clinic_app(test_state())).await;

        let req = test::TestRequest::get()
            .uri("/beauty/appointments/available?date=01-10-2025")
            .to_request();
        let (status, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation_error");
    }

    #[actix_web::test]
    async fn test_repeated_read_is_served_from_cache() {
        let state = test_state();
        let app = test::init_service(clinic_app(state.clone())).await;

        let uri = "/beauty/treatments/20";
        let (_, first) = send(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let (_, second) = send(&app, test::TestRequest::get().uri(uri).to_request()).await;

        assert_eq!(first, second);
        assert_eq!(first["name"], "Hot Stone Massage");
        let metrics = state.cache.metrics().unwrap();
        assert_eq!(metrics.misses_total.get(), 1);
        assert_eq!(metrics.hits_total.get(), 1);
    }

    #[actix_web::test]
    async fn test_missing_treatment_is_not_cached() {
        let state = test_state();
        let app = test::init_service(clinic_app(state.clone())).await;

        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/beauty/treatments/999").to_request();
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["message"], "Treatment 999 not found");
        }
        let metrics = state.cache.metrics().unwrap();
        assert_eq!(metrics.writes_total.with_label_values(&["ok"]).get(), 0);
    }

    #[actix_web::test]
    async fn test_catalog_config_and_promotions() {
        let app = test::init_service(clinic_app(test_state())).await;

        let req = test::TestRequest::get().uri("/beauty/catalog/treatments").to_request();
        let (status, catalog) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(catalog.as_array().unwrap().len(), 3);

        let req = test::TestRequest::get().uri("/beauty/config/clinic").to_request();
        let (status, config) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(config["opening_time"].is_string());

        let req = test::TestRequest::get().uri("/beauty/promotions").to_request();
        let (status, promotions) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(promotions.is_array());
    }

    #[actix_web::test]
    async fn test_booking_evicts_availability_and_history() {
        let state = test_state();
        let (_, client, client_id) = admin_and_client(&state).await;
        let app = test::init_service(clinic_app(state.clone())).await;

        let available = "/beauty/appointments/available?date=2025-10-01";
        let history = format!("/beauty/clients/{}/history", client_id);

        let (_, before) = send(&app, test::TestRequest::get().uri(available).to_request()).await;
        assert_eq!(before.as_array().unwrap().len(), 2);
        let req = test::TestRequest::get()
            .uri(&history)
            .insert_header(("Authorization", client.clone()))
            .to_request();
        let (_, empty) = send(&app, req).await;
        assert_eq!(empty, json!([]));

        let req = test::TestRequest::post()
            .uri("/beauty/appointments/1/book")
            .insert_header(("Authorization", client.clone()))
            .to_request();
        let (status, booked) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booked["status"], "booked");

        let (_, after) = send(&app, test::TestRequest::get().uri(available).to_request()).await;
        assert_eq!(after.as_array().unwrap().len(), 1);
        let req = test::TestRequest::get()
            .uri(&history)
            .insert_header(("Authorization", client))
            .to_request();
        let (_, entries) = send(&app, req).await;
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["appointment_id"], 1);
    }

    #[actix_web::test]
    async fn test_booking_requires_token_and_open_slot() {
        let state = test_state();
        let (_, client, _) = admin_and_client(&state).await;
        let app = test::init_service(clinic_app(state.clone())).await;

        let req = test::TestRequest::post().uri("/beauty/appointments/1/book").to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        for expected in [StatusCode::OK, StatusCode::CONFLICT] {
            let req = test::TestRequest::post()
                .uri("/beauty/appointments/1/book")
                .insert_header(("Authorization", client.clone()))
                .to_request();
            let (status, _) = send(&app, req).await;
            assert_eq!(status, expected);
        }
    }

    #[actix_web::test]
    async fn test_cancel_by_other_client_is_forbidden() {
        let state = test_state();
        let (admin, client, _) = admin_and_client(&state).await;
        let (other, _) = bearer_for(&state, "bea").await;
        let app = test::init_service(clinic_app(state.clone())).await;

        let book = test::TestRequest::post()
            .uri("/beauty/appointments/2/book")
            .insert_header(("Authorization", client))
            .to_request();
        assert_eq!(send(&app, book).await.0, StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/beauty/appointments/2/cancel")
            .insert_header(("Authorization", other))
            .to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/beauty/appointments/2/cancel")
            .insert_header(("Authorization", admin))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");
    }

    #[actix_web::test]
    async fn test_history_of_another_client_is_forbidden() {
        let state = test_state();
        let (admin, _, client_id) = admin_and_client(&state).await;
        let (other, _) = bearer_for(&state, "bea").await;
        let app = test::init_service(clinic_app(state.clone())).await;

        let uri = format!("/beauty/clients/{}/history", client_id);
        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header(("Authorization", other))
            .to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header(("Authorization", admin))
            .to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_reads_and_writes_survive_unreachable_store() {
        let state = state_with_store(Arc::new(UnreachableStore));
        let (_, client, _) = admin_and_client(&state).await;
        let app = test::init_service(clinic_app(state.clone())).await;

        let req = test::TestRequest::get().uri("/beauty/treatments/10").to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Deep Facial Cleansing");

        let req = test::TestRequest::post()
            .uri("/beauty/appointments/1/book")
            .insert_header(("Authorization", client))
            .to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);

        let metrics = state.cache.metrics().unwrap();
        assert!(metrics.errors_total.with_label_values(&["get"]).get() >= 1);
    }
}
