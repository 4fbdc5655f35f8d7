use async_trait::async_trait;
use chrono::NaiveDate;
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, Id};

use super::time::{ReservationTime, ReservationTimeId};

/// 予約リポジトリ
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// 同じ日付・時間の予約が既に存在するか
    async fn exist_reservation(&self, candidate: &Reservation) -> Result<bool, DataAccessError>;
    /// 指定した予約時間を参照する予約が存在するか
    async fn exist_by_time_id(&self, time_id: ReservationTimeId) -> Result<bool, DataAccessError>;
    /// IDで予約を検索する
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError>;
    /// 予約をすべて取得する
    async fn find_all(&self) -> Result<Vec<Reservation>, DataAccessError>;
    /// 予約を保存し、IDを採番して返す
    async fn save(&mut self, candidate: Reservation) -> Result<Reservation, DataAccessError>;
    /// 予約を削除する
    async fn delete(&mut self, id: ReservationId) -> Result<bool, DataAccessError>;
}

/// 予約ID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    From, Deref, Default,
)]
pub struct ReservationId(u64);

impl Id for ReservationId {
    type Inner = u64;
}

/// 予約者名
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(NameError::NameIsBlank);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        value.0
    }
}

/// 予約者名エラー
#[derive(Error, Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    /// 名前が空欄です
    #[display(fmt = "Name cannot be blank")]
    NameIsBlank,
}

/// 予約イベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    /// 予約が作成された
    ReservationCreated {
        id: ReservationId,
        name: Name,
        date: NaiveDate,
        time: ReservationTime,
    },
    /// 予約が削除された
    ReservationDeleted { id: ReservationId },
}

impl Event for ReservationEvent {
    type Id = ReservationId;
}

/// 予約エンティティ
///
/// 等価性は名前・日付・時間で判定し、IDは比較しない。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reservation {
    id: Option<ReservationId>,
    name: Name,
    date: NaiveDate,
    time: ReservationTime,
}

impl Reservation {
    /// 未保存の予約を作る
    pub fn new(name: Name, date: NaiveDate, time: ReservationTime) -> Self {
        Self {
            id: None,
            name,
            date,
            time,
        }
    }

    /// 保存済みの予約を復元する
    pub fn restore(id: ReservationId, name: Name, date: NaiveDate, time: ReservationTime) -> Self {
        Self {
            id: Some(id),
            name,
            date,
            time,
        }
    }

    /// IDを付与した予約を返す
    pub fn with_id(self, id: ReservationId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> &ReservationTime {
        &self.time
    }

    /// 日付と時間が同じ枠を指しているか
    pub fn is_same_slot(&self, other: &Reservation) -> bool {
        self.date == other.date && self.time == other.time
    }

    pub fn is_before(&self, today: NaiveDate) -> bool {
        self.date < today
    }
}

impl Entity for Reservation {
    type Id = ReservationId;

    const ENTITY_NAME: &'static str = "reservation";

    fn id(&self) -> Option<Self::Id> {
        self.id
    }
}

impl Aggregation for Reservation {
    type Event = ReservationEvent;

    fn apply(state: Option<Self>, event: Self::Event) -> Option<Self> {
        match event {
            ReservationEvent::ReservationCreated {
                id,
                name,
                date,
                time,
            } => Some(Self::restore(id, name, date, time)),
            ReservationEvent::ReservationDeleted { id } => {
                state.filter(|reservation| reservation.id != Some(id))
            }
        }
    }
}

impl PartialEq for Reservation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.date == other.date && self.time == other.time
    }
}

impl Eq for Reservation {}
