use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roomescape::application::{ReservationServiceError, ReservationTimeServiceError};
use serde_json::json;
use tracing::error;

/// HTTPレスポンスに変換されるエラー
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ReservationServiceError> for ApiError {
    fn from(value: ReservationServiceError) -> Self {
        let status = match &value {
            ReservationServiceError::ReservationNotFound { .. } => StatusCode::NOT_FOUND,
            ReservationServiceError::DuplicateReservation { .. } => StatusCode::CONFLICT,
            ReservationServiceError::TimeSlotNotFound { .. }
            | ReservationServiceError::PastDateReservation { .. }
            | ReservationServiceError::InvalidName(_) => StatusCode::BAD_REQUEST,
            ReservationServiceError::DataAccess(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: value.code(),
            message: value.to_string(),
        }
    }
}

impl From<ReservationTimeServiceError> for ApiError {
    fn from(value: ReservationTimeServiceError) -> Self {
        let status = match &value {
            ReservationTimeServiceError::TimeSlotNotFound { .. } => StatusCode::NOT_FOUND,
            ReservationTimeServiceError::DuplicateTime { .. }
            | ReservationTimeServiceError::TimeSlotInUse { .. } => StatusCode::CONFLICT,
            ReservationTimeServiceError::DataAccess(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: value.code(),
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("リクエスト処理エラー: {}", self.message);
        }
        (
            self.status,
            Json(json!({ "code": self.code, "message": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use roomescape::domain::DataAccessError;

    use super::*;

    #[test]
    fn test_reservation_error_status() {
        let date = NaiveDate::from_ymd_opt(1998, 3, 14).unwrap();
        let cases = [
            (
                ReservationServiceError::TimeSlotNotFound { time_id: 1.into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                ReservationServiceError::PastDateReservation { date, today: date },
                StatusCode::BAD_REQUEST,
            ),
            (
                ReservationServiceError::DuplicateReservation {
                    date,
                    time_id: 1.into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ReservationServiceError::ReservationNotFound { id: 1.into() },
                StatusCode::NOT_FOUND,
            ),
            (
                ReservationServiceError::DataAccess(DataAccessError::ConnectionError(
                    "closed".into(),
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn test_time_error_status() {
        let error = ApiError::from(ReservationTimeServiceError::TimeSlotInUse { id: 3.into() });
        assert_eq!(error.status(), StatusCode::CONFLICT);
        assert_eq!(error.code(), "TIME_SLOT_IN_USE");
    }
}
