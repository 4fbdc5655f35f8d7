pub mod memory;
mod reservation;
mod time;

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use eventstore::{Client, EventData, ReadStreamOptions, ResolvedEvent};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, Id};

pub use self::reservation::*;
pub use self::time::*;

impl From<eventstore::Error> for DataAccessError {
    fn from(value: eventstore::Error) -> Self {
        match value {
            eventstore::Error::ConnectionClosed
            | eventstore::Error::Grpc { .. }
            | eventstore::Error::GrpcConnectionError(_)
            | eventstore::Error::DeadlineExceeded => Self::ConnectionError(Box::new(value)),
            eventstore::Error::ResourceNotFound | eventstore::Error::ResourceDeleted => {
                Self::ReadError(Box::new(value))
            }
            eventstore::Error::WrongExpectedVersion { .. } => {
                Self::ConflictError(Box::new(value))
            }
            eventstore::Error::ResourceAlreadyExists => Self::WriteError(Box::new(value)),
            eventstore::Error::IllegalStateError(_) => Self::ClientSideError(Box::new(value)),
            _ => Self::QueryError(Box::new(value)),
        }
    }
}

impl From<EventConvertError> for DataAccessError {
    fn from(value: EventConvertError) -> Self {
        DataAccessError::ClientSideError(Box::new(value))
    }
}

#[derive(Debug)]
pub struct EventConvertError;

impl std::error::Error for EventConvertError {}

impl Display for EventConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to convert event")
    }
}

impl From<serde_json::Error> for EventConvertError {
    fn from(_value: serde_json::Error) -> Self {
        EventConvertError
    }
}

fn entity_id<I, T>(stream_id: &str) -> Option<I>
where
    I: Id<Inner = T>,
    T: FromStr,
{
    stream_id
        .split('-')
        .filter_map(|s| s.parse::<T>().ok())
        .map(I::from)
        .last()
}

fn stream_name<E: Entity>(id: E::Id) -> String {
    E::ENTITY_NAME.to_owned() + "-" + &id.to_string()
}

/// `$by_category`プロジェクションが作るカテゴリストリーム名
fn category_stream_name<E: Entity>() -> String {
    "$ce-".to_owned() + E::ENTITY_NAME
}

/// イベント種別と、IDを除いたJSON本体に分解する
fn event_payload<E: Event>(event: E) -> Result<(String, Value), EventConvertError> {
    let (event_type, mut data) = match serde_json::to_value(event)? {
        Value::Object(root) => root.into_iter().next().ok_or(EventConvertError)?,
        _ => return Err(EventConvertError),
    };
    if let Some(data) = data.as_object_mut() {
        data.remove("id");
    }
    Ok((event_type, data))
}

fn from_event<E: Event>(event: E) -> Result<EventData, EventConvertError> {
    let (event_type, data) = event_payload(event)?;
    Ok(EventData::json(event_type, data)?)
}

fn try_from_resolved_event<E, I>(value: &ResolvedEvent) -> Result<E, EventConvertError>
where
    E: DeserializeOwned + Event<Id = I>,
    I: Id,
{
    let event = value.get_original_event();
    let id = entity_id::<I, I::Inner>(&event.stream_id).ok_or(EventConvertError)?;
    let mut data: Value = serde_json::from_slice(event.data.as_ref())?;
    data.as_object_mut()
        .ok_or(EventConvertError)?
        .insert("id".to_owned(), json!(id));
    let json = json!({ &event.event_type: data });
    Ok(serde_json::from_value(json)?)
}

/// エンティティのストリームを読み出してイベントを再生する
async fn read_aggregate<A>(client: &Client, id: A::Id) -> Result<Option<A>, DataAccessError>
where
    A: Aggregation,
    A::Event: DeserializeOwned,
{
    let mut stream = match client
        .read_stream(stream_name::<A>(id), &Default::default())
        .await
    {
        Ok(stream) => stream,
        Err(eventstore::Error::ResourceDeleted) | Err(eventstore::Error::ResourceNotFound) => {
            return Ok(None)
        }
        Err(e) => return Err(e.into()),
    };
    let mut events = Vec::new();
    loop {
        match stream.next().await {
            Ok(Some(e)) => events.push(try_from_resolved_event::<A::Event, A::Id>(&e)?),
            Ok(_) => break,
            Err(eventstore::Error::ResourceDeleted) => return Ok(None),
            Err(eventstore::Error::ResourceNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(A::replay(events))
}

/// カテゴリストリームからエンティティのIDを重複なく集める
async fn read_category_ids<E: Entity>(client: &Client) -> Result<Vec<E::Id>, DataAccessError>
where
    E::Id: Ord,
{
    let options = ReadStreamOptions::default().resolve_link_tos();
    let mut stream = match client
        .read_stream(category_stream_name::<E>(), &options)
        .await
    {
        Ok(stream) => stream,
        Err(eventstore::Error::ResourceNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut ids = BTreeSet::new();
    loop {
        match stream.next().await {
            Ok(Some(resolved)) => {
                // リンク先が削除済みの場合は`event`が空になる
                if let Some(event) = resolved.event.as_ref() {
                    if let Some(id) =
                        entity_id::<E::Id, <E::Id as Id>::Inner>(&event.stream_id)
                    {
                        ids.insert(id);
                    }
                }
            }
            Ok(_) => break,
            Err(eventstore::Error::ResourceNotFound) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(ids.into_iter().collect())
}
