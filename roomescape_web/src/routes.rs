use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use roomescape::{
    application::{ReservationRequest, ReservationService, ReservationTimeService},
    domain::{
        reservation::{Reservation, ReservationRepository},
        time::{ReservationTime, ReservationTimeRepository},
        Clock, Entity,
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ApiError;

/// 同じロックの下で動く予約サービスと予約時間サービス
///
/// 予約の登録と予約時間の削除は互いの確認結果に依存するため、別々にロックしない。
pub struct Services<R, T, C> {
    reservations: ReservationService<R, T, C>,
    times: ReservationTimeService<T, R>,
}

pub struct AppState<R, T, C> {
    services: Arc<Mutex<Services<R, T, C>>>,
}

impl<R, T, C> AppState<R, T, C> {
    pub fn new(
        reservations: ReservationService<R, T, C>,
        times: ReservationTimeService<T, R>,
    ) -> Self {
        Self {
            services: Arc::new(Mutex::new(Services {
                reservations,
                times,
            })),
        }
    }
}

impl<R, T, C> Clone for AppState<R, T, C> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRequest {
    start_at: NaiveTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeResponse {
    id: Option<u64>,
    start_at: NaiveTime,
}

impl From<&ReservationTime> for TimeResponse {
    fn from(value: &ReservationTime) -> Self {
        Self {
            id: value.id().map(|id| *id),
            start_at: value.start_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    id: Option<u64>,
    name: String,
    date: NaiveDate,
    time: TimeResponse,
}

impl From<&Reservation> for ReservationResponse {
    fn from(value: &Reservation) -> Self {
        Self {
            id: value.id().map(|id| *id),
            name: value.name().to_string(),
            date: value.date(),
            time: value.time().into(),
        }
    }
}

pub fn router<R, T, C>(state: AppState<R, T, C>) -> Router
where
    R: ReservationRepository + 'static,
    T: ReservationTimeRepository + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route(
            "/reservations",
            get(find_reservations::<R, T, C>).post(create_reservation::<R, T, C>),
        )
        .route(
            "/reservations/:id",
            get(find_reservation::<R, T, C>).delete(delete_reservation::<R, T, C>),
        )
        .route(
            "/times",
            get(find_times::<R, T, C>).post(create_time::<R, T, C>),
        )
        .route("/times/:id", delete(delete_time::<R, T, C>))
        .with_state(state)
}

async fn create_reservation<R, T, C>(
    State(state): State<AppState<R, T, C>>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    let saved = state.services.lock().await.reservations.save(request).await?;
    Ok((StatusCode::CREATED, Json((&saved).into())))
}

async fn find_reservations<R, T, C>(
    State(state): State<AppState<R, T, C>>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    let reservations = state.services.lock().await.reservations.find_all().await?;
    Ok(Json(reservations.iter().map(Into::into).collect()))
}

async fn find_reservation<R, T, C>(
    State(state): State<AppState<R, T, C>>,
    Path(id): Path<u64>,
) -> Result<Json<ReservationResponse>, ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    let found = state
        .services
        .lock()
        .await
        .reservations
        .find_by_id(id.into())
        .await?;
    Ok(Json((&found).into()))
}

async fn delete_reservation<R, T, C>(
    State(state): State<AppState<R, T, C>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    state
        .services
        .lock()
        .await
        .reservations
        .delete(id.into())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_time<R, T, C>(
    State(state): State<AppState<R, T, C>>,
    Json(request): Json<TimeRequest>,
) -> Result<(StatusCode, Json<TimeResponse>), ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    let saved = state
        .services
        .lock()
        .await
        .times
        .create(request.start_at)
        .await?;
    Ok((StatusCode::CREATED, Json((&saved).into())))
}

async fn find_times<R, T, C>(
    State(state): State<AppState<R, T, C>>,
) -> Result<Json<Vec<TimeResponse>>, ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    let times = state.services.lock().await.times.find_all().await?;
    Ok(Json(times.iter().map(Into::into).collect()))
}

async fn delete_time<R, T, C>(
    State(state): State<AppState<R, T, C>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    state.services.lock().await.times.delete(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use roomescape::{
        domain::{time::ReservationTimeId, DataAccessError, FixedClock},
        infrastructure::memory::{
            InMemoryReservationRepository, InMemoryReservationTimeRepository,
        },
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    /// 読み出した後に他のタスクへ実行を譲る予約時間リポジトリ
    #[derive(Clone, Default)]
    struct YieldingTimes(InMemoryReservationTimeRepository);

    #[async_trait]
    impl ReservationTimeRepository for YieldingTimes {
        async fn find_by_id(
            &self,
            id: ReservationTimeId,
        ) -> Result<Option<ReservationTime>, DataAccessError> {
            let found = self.0.find_by_id(id).await;
            tokio::task::yield_now().await;
            found
        }

        async fn find_all(&self) -> Result<Vec<ReservationTime>, DataAccessError> {
            let found = self.0.find_all().await;
            tokio::task::yield_now().await;
            found
        }

        async fn save(&mut self, start_at: NaiveTime) -> Result<ReservationTime, DataAccessError> {
            self.0.save(start_at).await
        }

        async fn delete(&mut self, id: ReservationTimeId) -> Result<bool, DataAccessError> {
            self.0.delete(id).await
        }
    }

    fn app() -> Router {
        let reservations = InMemoryReservationRepository::new();
        let times = YieldingTimes::default();
        let today = "2026-10-16".parse().unwrap();
        router(AppState::new(
            ReservationService::new(reservations.clone(), times.clone(), FixedClock::new(today)),
            ReservationTimeService::new(times, reservations),
        ))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        if bytes.is_empty() {
            (status, Value::Null)
        } else {
            (status, serde_json::from_slice(&bytes).unwrap())
        }
    }

    #[tokio::test]
    async fn test_time_routes() {
        let app = app();

        let time = json!({ "startAt": "10:00:00" });
        let created = send(&app, Method::POST, "/times", Some(time)).await;
        assert_eq!(
            created,
            (StatusCode::CREATED, json!({ "id": 1, "startAt": "10:00:00" }))
        );

        let listed = send(&app, Method::GET, "/times", None).await;
        assert_eq!(
            listed,
            (StatusCode::OK, json!([{ "id": 1, "startAt": "10:00:00" }]))
        );

        let deleted = send(&app, Method::DELETE, "/times/1", None).await;
        assert_eq!(deleted, (StatusCode::NO_CONTENT, Value::Null));

        let (status, body) = send(&app, Method::DELETE, "/times/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TIME_SLOT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reservation_routes() {
        let app = app();
        send(&app, Method::POST, "/times", Some(json!({ "startAt": "10:00:00" }))).await;
        let request = json!({ "name": "hogi", "date": "2026-10-20", "timeId": 1 });

        let created = send(&app, Method::POST, "/reservations", Some(request.clone())).await;
        let expected = json!({
            "id": 1,
            "name": "hogi",
            "date": "2026-10-20",
            "time": { "id": 1, "startAt": "10:00:00" },
        });
        assert_eq!(created, (StatusCode::CREATED, expected.clone()));

        let found = send(&app, Method::GET, "/reservations/1", None).await;
        assert_eq!(found, (StatusCode::OK, expected.clone()));
        let listed = send(&app, Method::GET, "/reservations", None).await;
        assert_eq!(listed, (StatusCode::OK, json!([expected])));

        let (status, body) = send(&app, Method::POST, "/reservations", Some(request)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "DUPLICATE_RESERVATION");

        let (status, body) = send(&app, Method::DELETE, "/times/1", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "TIME_SLOT_IN_USE");

        let deleted = send(&app, Method::DELETE, "/reservations/1", None).await;
        assert_eq!(deleted, (StatusCode::NO_CONTENT, Value::Null));
        let (status, body) = send(&app, Method::GET, "/reservations/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "RESERVATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reservation_validation() {
        let app = app();
        send(&app, Method::POST, "/times", Some(json!({ "startAt": "10:00:00" }))).await;

        let unknown_time = json!({ "name": "hogi", "date": "2026-10-20", "timeId": 9 });
        let (status, body) = send(&app, Method::POST, "/reservations", Some(unknown_time)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "TIME_SLOT_NOT_FOUND");

        let past = json!({ "name": "hogi", "date": "1998-03-14", "timeId": 1 });
        let (status, body) = send(&app, Method::POST, "/reservations", Some(past)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PAST_DATE_RESERVATION");
    }

    #[tokio::test]
    async fn test_reservation_and_time_delete_are_serialized() {
        let app = app();
        send(&app, Method::POST, "/times", Some(json!({ "startAt": "10:00:00" }))).await;
        let request = json!({ "name": "hogi", "date": "2026-10-20", "timeId": 1 });

        // 削除が予約時間を読んだ後に、予約の登録が割り込める順序で走らせる
        let (deleted, reserved) = tokio::join!(
            send(&app, Method::DELETE, "/times/1", None),
            send(&app, Method::POST, "/reservations", Some(request)),
        );

        assert!(!(reserved.0.is_success() && deleted.0.is_success()));
        let (_, reservations) = send(&app, Method::GET, "/reservations", None).await;
        let (_, times) = send(&app, Method::GET, "/times", None).await;
        for reservation in reservations.as_array().unwrap() {
            assert!(times.as_array().unwrap().contains(&reservation["time"]));
        }
    }
}
