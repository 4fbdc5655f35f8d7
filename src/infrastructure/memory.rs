//! メモリ上で完結するリポジトリ
//!
//! クローンは同じ状態を共有する。IDは1から順に払い出す。

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveTime;
use tokio::sync::RwLock;

use crate::domain::{
    reservation::{Reservation, ReservationId, ReservationRepository},
    time::{ReservationTime, ReservationTimeId, ReservationTimeRepository},
    DataAccessError, Entity,
};

struct Table<T> {
    sequence: u64,
    rows: BTreeMap<u64, T>,
}

impl<T> Table<T> {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            sequence: 0,
            rows: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryReservationRepository {
    table: Arc<RwLock<Table<Reservation>>>,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn exist_reservation(&self, candidate: &Reservation) -> Result<bool, DataAccessError> {
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .any(|reservation| reservation.is_same_slot(candidate)))
    }

    async fn exist_by_time_id(&self, time_id: ReservationTimeId) -> Result<bool, DataAccessError> {
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .any(|reservation| reservation.time().id() == Some(time_id)))
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError> {
        Ok(self.table.read().await.rows.get(&*id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Reservation>, DataAccessError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn save(&mut self, candidate: Reservation) -> Result<Reservation, DataAccessError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|r| r.is_same_slot(&candidate)) {
            return Err(DataAccessError::ConflictError(
                "reservation slot is already taken".into(),
            ));
        }
        let id = table.next_id();
        let saved = candidate.with_id(id.into());
        table.rows.insert(id, saved.clone());
        Ok(saved)
    }

    async fn delete(&mut self, id: ReservationId) -> Result<bool, DataAccessError> {
        Ok(self.table.write().await.rows.remove(&*id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryReservationTimeRepository {
    table: Arc<RwLock<Table<ReservationTime>>>,
}

impl InMemoryReservationTimeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationTimeRepository for InMemoryReservationTimeRepository {
    async fn find_by_id(
        &self,
        id: ReservationTimeId,
    ) -> Result<Option<ReservationTime>, DataAccessError> {
        Ok(self.table.read().await.rows.get(&*id).copied())
    }

    async fn find_all(&self) -> Result<Vec<ReservationTime>, DataAccessError> {
        Ok(self.table.read().await.rows.values().copied().collect())
    }

    async fn save(&mut self, start_at: NaiveTime) -> Result<ReservationTime, DataAccessError> {
        let mut table = self.table.write().await;
        let id = table.next_id();
        let time = ReservationTime::new(id.into(), start_at);
        table.rows.insert(id, time);
        Ok(time)
    }

    async fn delete(&mut self, id: ReservationTimeId) -> Result<bool, DataAccessError> {
        Ok(self.table.write().await.rows.remove(&*id).is_some())
    }
}
