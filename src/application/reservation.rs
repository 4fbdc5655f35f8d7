use chrono::NaiveDate;
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{
    reservation::{Name, NameError, Reservation, ReservationId, ReservationRepository},
    time::{ReservationTimeId, ReservationTimeRepository},
    Clock, DataAccessError,
};

/// 予約リクエスト
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub name: String,
    pub date: NaiveDate,
    pub time_id: ReservationTimeId,
}

impl ReservationRequest {
    pub fn new(name: impl Into<String>, date: NaiveDate, time_id: ReservationTimeId) -> Self {
        Self {
            name: name.into(),
            date,
            time_id,
        }
    }
}

/// 予約サービス
pub struct ReservationService<R, T, C> {
    reservation_repository: R,
    time_repository: T,
    clock: C,
}

impl<R, T, C> ReservationService<R, T, C>
where
    R: ReservationRepository,
    T: ReservationTimeRepository,
    C: Clock,
{
    pub fn new(reservation_repository: R, time_repository: T, clock: C) -> Self {
        Self {
            reservation_repository,
            time_repository,
            clock,
        }
    }

    /// 予約を検証して保存する
    ///
    /// 検証は「時間の存在」「過去日付」「重複」の順に行い、
    /// いずれかに失敗した場合は何も書き込まない。
    pub async fn save(
        &mut self,
        request: ReservationRequest,
    ) -> Result<Reservation, ReservationServiceError> {
        let time = match self.time_repository.find_by_id(request.time_id).await? {
            Some(time) => time,
            None => {
                warn!("存在しない予約時間への予約: time_id={}", request.time_id);
                return Err(ReservationServiceError::TimeSlotNotFound {
                    time_id: request.time_id,
                });
            }
        };
        let candidate = Reservation::new(Name::new(request.name)?, request.date, time);

        let today = self.clock.today();
        if candidate.is_before(today) {
            warn!("過去日付への予約: date={}, today={}", request.date, today);
            return Err(ReservationServiceError::PastDateReservation {
                date: request.date,
                today,
            });
        }

        if self
            .reservation_repository
            .exist_reservation(&candidate)
            .await?
        {
            warn!(
                "重複した予約: date={}, time_id={}",
                request.date, request.time_id
            );
            return Err(ReservationServiceError::DuplicateReservation {
                date: request.date,
                time_id: request.time_id,
            });
        }

        let saved = match self.reservation_repository.save(candidate).await {
            Ok(saved) => saved,
            // 確認から保存までの間に同じ枠が埋まった
            Err(DataAccessError::ConflictError(e)) => {
                warn!(
                    "保存時に予約が競合: date={}, time_id={}, {}",
                    request.date, request.time_id, e
                );
                return Err(ReservationServiceError::DuplicateReservation {
                    date: request.date,
                    time_id: request.time_id,
                });
            }
            Err(e) => return Err(e.into()),
        };
        info!("予約を登録: {:?}", saved);
        Ok(saved)
    }

    /// IDで予約を取得する
    pub async fn find_by_id(
        &self,
        id: ReservationId,
    ) -> Result<Reservation, ReservationServiceError> {
        debug!("予約を検索: id={}", id);
        self.reservation_repository
            .find_by_id(id)
            .await?
            .ok_or(ReservationServiceError::ReservationNotFound { id })
    }

    pub async fn find_all(&self) -> Result<Vec<Reservation>, ReservationServiceError> {
        Ok(self.reservation_repository.find_all().await?)
    }

    /// 予約を取り消す
    pub async fn delete(&mut self, id: ReservationId) -> Result<(), ReservationServiceError> {
        if self.reservation_repository.find_by_id(id).await?.is_none() {
            return Err(ReservationServiceError::ReservationNotFound { id });
        }
        self.reservation_repository.delete(id).await?;
        info!("予約を削除: id={}", id);
        Ok(())
    }
}

/// 予約サービスエラー
#[derive(Error, Display, Debug, From)]
pub enum ReservationServiceError {
    /// 予約時間が存在しません
    #[display(fmt = "Reservation time not found: {}", time_id)]
    TimeSlotNotFound { time_id: ReservationTimeId },
    /// 過去の日付には予約できません
    #[display(fmt = "Reservation date {} is before today ({})", date, today)]
    PastDateReservation { date: NaiveDate, today: NaiveDate },
    /// 同じ日付・時間の予約が既にあります
    #[display(fmt = "Reservation already exists on {} at time {}", date, time_id)]
    DuplicateReservation {
        date: NaiveDate,
        time_id: ReservationTimeId,
    },
    /// 予約が存在しません
    #[display(fmt = "Reservation not found: {}", id)]
    ReservationNotFound { id: ReservationId },
    /// 予約者名が不正です
    #[display(fmt = "Invalid name: {}", _0)]
    #[from]
    InvalidName(#[error(source)] NameError),
    /// データアクセスエラー
    #[display(fmt = "Data access error: {}", _0)]
    #[from]
    DataAccess(#[error(source)] DataAccessError),
}

impl ReservationServiceError {
    /// クライアント向けのエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            Self::TimeSlotNotFound { .. } => "TIME_SLOT_NOT_FOUND",
            Self::PastDateReservation { .. } => "PAST_DATE_RESERVATION",
            Self::DuplicateReservation { .. } => "DUPLICATE_RESERVATION",
            Self::ReservationNotFound { .. } => "RESERVATION_NOT_FOUND",
            Self::InvalidName(_) => "INVALID_NAME",
            Self::DataAccess(_) => "DATA_ACCESS",
        }
    }

    /// 入力の誤りによるエラーか
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::DataAccess(_))
    }
}
