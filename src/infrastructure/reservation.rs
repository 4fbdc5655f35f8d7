use async_trait::async_trait;
use eventstore::{
    AppendToStreamOptions, Client, ExpectedRevision, ReadStreamOptions, ResolvedEvent,
    StreamPosition,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::reservation::{
    Reservation, ReservationEvent, ReservationId, ReservationRepository,
};
use crate::domain::time::ReservationTimeId;
use crate::domain::{generate_id, DataAccessError, Entity, Event};
use crate::infrastructure::{
    from_event, read_aggregate, read_category_ids, stream_name, EventConvertError,
};

/// EventStoreDBに予約を保存するリポジトリ
///
/// 予約本体は`reservation-<id>`に、日付と時間の組の所有者は
/// `reservation_slot-<yyyymmdd>_<time id>`に記録する。枠の所有は期待リビジョン付きの
/// 追記でのみ移るため、同じ枠への同時予約は一方だけが成功する。
/// 枠を所有していない予約本体や、所有者の予約が消えた枠は存在しないものとして扱う。
#[derive(Clone)]
pub struct EventStoreReservationRepository {
    client: Client,
}

/// 枠ストリームのイベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum SlotEvent {
    SlotClaimed { reservation_id: ReservationId },
    SlotReleased { reservation_id: ReservationId },
}

impl Event for SlotEvent {
    type Id = ReservationId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    revision: u64,
    owner: Option<ReservationId>,
}

impl EventStoreReservationRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn slot(&self, reservation: &Reservation) -> Result<Option<Slot>, DataAccessError> {
        let options = ReadStreamOptions::default()
            .position(StreamPosition::End)
            .backwards()
            .max_count(1);
        let mut stream = match self
            .client
            .read_stream(slot_stream_name(reservation), &options)
            .await
        {
            Ok(stream) => stream,
            Err(eventstore::Error::ResourceNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match stream.next().await {
            Ok(Some(e)) => {
                let owner = match slot_event(&e)? {
                    SlotEvent::SlotClaimed { reservation_id } => Some(reservation_id),
                    SlotEvent::SlotReleased { .. } => None,
                };
                Ok(Some(Slot {
                    revision: e.get_original_event().revision,
                    owner,
                }))
            }
            Ok(_) => Ok(None),
            Err(eventstore::Error::ResourceNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 枠と、その所有者の予約が残っているか
    async fn slot_with_owner(
        &self,
        reservation: &Reservation,
    ) -> Result<(Option<Slot>, bool), DataAccessError> {
        let slot = self.slot(reservation).await?;
        let alive = match slot.and_then(|slot| slot.owner) {
            Some(owner) => read_aggregate::<Reservation>(&self.client, owner)
                .await?
                .is_some(),
            None => false,
        };
        Ok((slot, alive))
    }

    async fn claim(
        &self,
        reservation: &Reservation,
        id: ReservationId,
    ) -> Result<(), DataAccessError> {
        let (slot, alive) = self.slot_with_owner(reservation).await?;
        match claim_revision(slot, alive) {
            Some(revision) => {
                let event = SlotEvent::SlotClaimed { reservation_id: id };
                self.append_slot(reservation, revision, event).await
            }
            None => Err(DataAccessError::ConflictError(
                format!("{} is already taken", slot_stream_name(reservation)).into(),
            )),
        }
    }

    async fn append_slot(
        &self,
        reservation: &Reservation,
        revision: ExpectedRevision,
        event: SlotEvent,
    ) -> Result<(), DataAccessError> {
        self.client
            .append_to_stream(
                slot_stream_name(reservation),
                &AppendToStreamOptions::default().expected_revision(revision),
                from_event(event)?,
            )
            .await?;
        Ok(())
    }

    /// 予約本体のストリームを閉じる
    async fn discard(&self, id: ReservationId) -> Result<(), DataAccessError> {
        let stream_name = stream_name::<Reservation>(id);
        self.client
            .append_to_stream(
                &stream_name,
                &AppendToStreamOptions::default().expected_revision(ExpectedRevision::StreamExists),
                from_event(ReservationEvent::ReservationDeleted { id })?,
            )
            .await?;
        self.client
            .delete_stream(&stream_name, &Default::default())
            .await?;
        Ok(())
    }
}

fn slot_stream_name(reservation: &Reservation) -> String {
    format!(
        "reservation_slot-{}_{}",
        reservation.date().format("%Y%m%d"),
        reservation
            .time()
            .id()
            .map(|id| id.to_string())
            .unwrap_or_default()
    )
}

fn slot_event(value: &ResolvedEvent) -> Result<SlotEvent, EventConvertError> {
    let event = value.get_original_event();
    let data: Value = serde_json::from_slice(event.data.as_ref())?;
    Ok(serde_json::from_value(json!({ &event.event_type: data }))?)
}

/// 枠を確保する追記の期待リビジョン。残っている予約が所有していれば`None`
fn claim_revision(slot: Option<Slot>, owner_alive: bool) -> Option<ExpectedRevision> {
    match slot {
        None => Some(ExpectedRevision::NoStream),
        Some(Slot { owner: Some(_), .. }) if owner_alive => None,
        Some(Slot { revision, .. }) => Some(ExpectedRevision::Exact(revision)),
    }
}

fn created_event(reservation: &Reservation, id: ReservationId) -> ReservationEvent {
    ReservationEvent::ReservationCreated {
        id,
        name: reservation.name().clone(),
        date: reservation.date(),
        time: *reservation.time(),
    }
}

#[async_trait]
impl ReservationRepository for EventStoreReservationRepository {
    async fn exist_reservation(&self, candidate: &Reservation) -> Result<bool, DataAccessError> {
        let (slot, alive) = self.slot_with_owner(candidate).await?;
        Ok(claim_revision(slot, alive).is_none())
    }

    async fn exist_by_time_id(&self, time_id: ReservationTimeId) -> Result<bool, DataAccessError> {
        Ok(self
            .find_all()
            .await?
            .iter()
            .any(|reservation| reservation.time().id() == Some(time_id)))
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError> {
        let reservation = match read_aggregate::<Reservation>(&self.client, id).await? {
            Some(reservation) => reservation,
            None => return Ok(None),
        };
        match self.slot(&reservation).await? {
            Some(Slot {
                owner: Some(owner), ..
            }) if owner == id => Ok(Some(reservation)),
            _ => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<Reservation>, DataAccessError> {
        let mut reservations = Vec::new();
        for id in read_category_ids::<Reservation>(&self.client).await? {
            if let Some(reservation) = self.find_by_id(id).await? {
                reservations.push(reservation);
            }
        }
        Ok(reservations)
    }

    async fn save(&mut self, candidate: Reservation) -> Result<Reservation, DataAccessError> {
        let id: ReservationId = generate_id().await;
        self.client
            .append_to_stream(
                stream_name::<Reservation>(id),
                &AppendToStreamOptions::default().expected_revision(ExpectedRevision::NoStream),
                from_event(created_event(&candidate, id))?,
            )
            .await?;
        if let Err(e) = self.claim(&candidate, id).await {
            // 枠を持たない予約本体は読み出されないため、取り消しの失敗は記録だけ残す
            if let Err(undo) = self.discard(id).await {
                warn!("枠を確保できなかった予約の取り消しに失敗: id={}, {}", id, undo);
            }
            return Err(e);
        }
        Ok(candidate.with_id(id))
    }

    async fn delete(&mut self, id: ReservationId) -> Result<bool, DataAccessError> {
        let reservation = match self.find_by_id(id).await? {
            Some(reservation) => reservation,
            None => return Ok(false),
        };
        self.discard(id).await?;
        // 所有者の予約が消えた枠は空きとして扱われるため、解放の失敗は記録だけ残す
        if let Err(e) = self
            .append_slot(
                &reservation,
                ExpectedRevision::StreamExists,
                SlotEvent::SlotReleased { reservation_id: id },
            )
            .await
        {
            warn!("予約枠の解放に失敗: id={}, {}", id, e);
        }
        Ok(true)
    }
}
