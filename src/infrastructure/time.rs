use async_trait::async_trait;
use chrono::NaiveTime;
use eventstore::{AppendToStreamOptions, Client, EventData, ExpectedRevision};

use crate::domain::time::{
    ReservationTime, ReservationTimeEvent, ReservationTimeId, ReservationTimeRepository,
};
use crate::domain::{generate_id, DataAccessError};
use crate::infrastructure::{
    from_event, read_aggregate, read_category_ids, stream_name, EventConvertError,
};

#[derive(Clone)]
pub struct EventStoreReservationTimeRepository {
    client: Client,
}

impl EventStoreReservationTimeRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReservationTimeRepository for EventStoreReservationTimeRepository {
    async fn find_by_id(
        &self,
        id: ReservationTimeId,
    ) -> Result<Option<ReservationTime>, DataAccessError> {
        read_aggregate::<ReservationTime>(&self.client, id).await
    }

    async fn find_all(&self) -> Result<Vec<ReservationTime>, DataAccessError> {
        let mut times = Vec::new();
        for id in read_category_ids::<ReservationTime>(&self.client).await? {
            if let Some(time) = self.find_by_id(id).await? {
                times.push(time);
            }
        }
        Ok(times)
    }

    async fn save(&mut self, start_at: NaiveTime) -> Result<ReservationTime, DataAccessError> {
        let id: ReservationTimeId = generate_id().await;
        let time = ReservationTime::new(id, start_at);
        self.client
            .append_to_stream(
                stream_name::<ReservationTime>(id),
                &AppendToStreamOptions::default().expected_revision(ExpectedRevision::NoStream),
                EventData::try_from(ReservationTimeEvent::ReservationTimeCreated {
                    id,
                    start_at: time.start_at(),
                })?,
            )
            .await?;
        Ok(time)
    }

    async fn delete(&mut self, id: ReservationTimeId) -> Result<bool, DataAccessError> {
        let stream_name = stream_name::<ReservationTime>(id);
        match self
            .client
            .append_to_stream(
                &stream_name,
                &AppendToStreamOptions::default().expected_revision(ExpectedRevision::StreamExists),
                EventData::try_from(ReservationTimeEvent::ReservationTimeDeleted { id })?,
            )
            .await
        {
            Ok(_) => {}
            Err(eventstore::Error::WrongExpectedVersion { .. })
            | Err(eventstore::Error::ResourceNotFound) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        self.client
            .delete_stream(&stream_name, &Default::default())
            .await?;
        Ok(true)
    }
}

impl TryFrom<ReservationTimeEvent> for EventData {
    type Error = EventConvertError;

    fn try_from(value: ReservationTimeEvent) -> Result<Self, Self::Error> {
        from_event(value)
    }
}
