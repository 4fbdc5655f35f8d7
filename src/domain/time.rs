use async_trait::async_trait;
use chrono::{NaiveTime, Timelike};
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, Id};

/// 予約時間リポジトリ
#[async_trait]
pub trait ReservationTimeRepository: Send + Sync {
    /// IDで予約時間を検索する
    async fn find_by_id(
        &self,
        id: ReservationTimeId,
    ) -> Result<Option<ReservationTime>, DataAccessError>;
    /// 予約時間をすべて取得する
    async fn find_all(&self) -> Result<Vec<ReservationTime>, DataAccessError>;
    /// 予約時間を保存し、IDを採番して返す
    async fn save(&mut self, start_at: NaiveTime) -> Result<ReservationTime, DataAccessError>;
    /// 予約時間を削除する
    async fn delete(&mut self, id: ReservationTimeId) -> Result<bool, DataAccessError>;
}

/// 予約時間ID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    From, Deref, Default,
)]
pub struct ReservationTimeId(u64);

impl Id for ReservationTimeId {
    type Inner = u64;
}

/// 予約時間イベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationTimeEvent {
    /// 予約時間が作成された
    ReservationTimeCreated {
        id: ReservationTimeId,
        start_at: NaiveTime,
    },
    /// 予約時間が削除された
    ReservationTimeDeleted { id: ReservationTimeId },
}

impl Event for ReservationTimeEvent {
    type Id = ReservationTimeId;
}

/// 予約時間エンティティ
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationTime {
    id: ReservationTimeId,
    start_at: NaiveTime,
}

impl ReservationTime {
    /// 秒未満は切り捨てる
    pub fn new(id: ReservationTimeId, start_at: NaiveTime) -> Self {
        Self {
            id,
            start_at: start_at.with_nanosecond(0).unwrap_or(start_at),
        }
    }

    pub fn start_at(&self) -> NaiveTime {
        self.start_at
    }
}

impl Entity for ReservationTime {
    type Id = ReservationTimeId;

    const ENTITY_NAME: &'static str = "reservation_time";

    fn id(&self) -> Option<Self::Id> {
        Some(self.id)
    }
}

impl Aggregation for ReservationTime {
    type Event = ReservationTimeEvent;

    fn apply(state: Option<Self>, event: Self::Event) -> Option<Self> {
        match event {
            ReservationTimeEvent::ReservationTimeCreated { id, start_at } => {
                Some(Self::new(id, start_at))
            }
            ReservationTimeEvent::ReservationTimeDeleted { id } => {
                state.filter(|time| time.id != id)
            }
        }
    }
}
