use chrono::NaiveTime;
use derive_more::{Display, Error, From};
use tracing::{info, warn};

use crate::domain::{
    reservation::ReservationRepository,
    time::{ReservationTime, ReservationTimeId, ReservationTimeRepository},
    DataAccessError,
};

/// 予約時間サービス
pub struct ReservationTimeService<T, R> {
    time_repository: T,
    reservation_repository: R,
}

impl<T, R> ReservationTimeService<T, R>
where
    T: ReservationTimeRepository,
    R: ReservationRepository,
{
    pub fn new(time_repository: T, reservation_repository: R) -> Self {
        Self {
            time_repository,
            reservation_repository,
        }
    }

    pub async fn create(
        &mut self,
        start_at: NaiveTime,
    ) -> Result<ReservationTime, ReservationTimeServiceError> {
        let start_at = ReservationTime::new(ReservationTimeId::default(), start_at).start_at();
        if self
            .time_repository
            .find_all()
            .await?
            .iter()
            .any(|time| time.start_at() == start_at)
        {
            warn!("重複した予約時間: start_at={}", start_at);
            return Err(ReservationTimeServiceError::DuplicateTime { start_at });
        }
        let saved = self.time_repository.save(start_at).await?;
        info!("予約時間を登録: {:?}", saved);
        Ok(saved)
    }

    /// 開始時刻順にすべての予約時間を返す
    pub async fn find_all(&self) -> Result<Vec<ReservationTime>, ReservationTimeServiceError> {
        let mut times = self.time_repository.find_all().await?;
        times.sort_by_key(|time| time.start_at());
        Ok(times)
    }

    /// 予約から参照されている時間は削除できない
    pub async fn delete(
        &mut self,
        id: ReservationTimeId,
    ) -> Result<(), ReservationTimeServiceError> {
        if self.time_repository.find_by_id(id).await?.is_none() {
            return Err(ReservationTimeServiceError::TimeSlotNotFound { id });
        }
        if self.reservation_repository.exist_by_time_id(id).await? {
            warn!("予約が存在する予約時間の削除: id={}", id);
            return Err(ReservationTimeServiceError::TimeSlotInUse { id });
        }
        self.time_repository.delete(id).await?;
        info!("予約時間を削除: id={}", id);
        Ok(())
    }
}

/// 予約時間サービスエラー
#[derive(Error, Display, Debug, From)]
pub enum ReservationTimeServiceError {
    #[display(fmt = "Reservation time already exists: {}", start_at)]
    DuplicateTime { start_at: NaiveTime },
    #[display(fmt = "Reservation time not found: {}", id)]
    TimeSlotNotFound { id: ReservationTimeId },
    #[display(fmt = "Reservation time {} is referenced by reservations", id)]
    TimeSlotInUse { id: ReservationTimeId },
    #[display(fmt = "Data access error: {}", _0)]
    #[from]
    DataAccess(#[error(source)] DataAccessError),
}

impl ReservationTimeServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateTime { .. } => "DUPLICATE_TIME",
            Self::TimeSlotNotFound { .. } => "TIME_SLOT_NOT_FOUND",
            Self::TimeSlotInUse { .. } => "TIME_SLOT_IN_USE",
            Self::DataAccess(_) => "DATA_ACCESS",
        }
    }

    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::DataAccess(_))
    }
}
