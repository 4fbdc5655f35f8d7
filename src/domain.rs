pub mod reservation;
pub mod time;

use chrono::{Local, NaiveDate};
use once_cell::sync;
use serde::{Deserialize, Serialize};
use snowflake::SnowflakeIdGenerator;
use std::{
    error::Error,
    fmt::{Debug, Display},
    ops::Deref,
    str::FromStr,
};
use thiserror::Error;
use tokio::sync::Mutex;

pub trait Id:
    Copy
    + Eq
    + Deref<Target = Self::Inner>
    + From<Self::Inner>
    + Display
    + Debug
    + Serialize
    + for<'de> Deserialize<'de>
{
    type Inner: FromStr;
}

pub trait Event: Clone + Eq + Debug + Serialize + for<'a> Deserialize<'a> {
    type Id;
}

pub trait Entity {
    type Id: Id;

    const ENTITY_NAME: &'static str;

    /// 永続化前は`None`
    fn id(&self) -> Option<Self::Id>;
}

/// イベントの再生で状態を復元できるエンティティ
pub trait Aggregation: Entity + Sized {
    type Event: Event<Id = Self::Id>;

    fn apply(state: Option<Self>, event: Self::Event) -> Option<Self>;

    fn replay<I>(events: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self::Event>,
    {
        events.into_iter().fold(None, Self::apply)
    }
}

#[derive(Error, Debug)]
pub enum DataAccessError {
    #[error("Database connection error: {0}")]
    ConnectionError(Box<dyn Error + Send + Sync>),
    #[error("Database query error: {0}")]
    QueryError(Box<dyn Error + Send + Sync>),
    #[error("Data read error: {0}")]
    ReadError(Box<dyn Error + Send + Sync>),
    #[error("Data write error: {0}")]
    WriteError(Box<dyn Error + Send + Sync>),
    /// 期待した版と異なるため書き込みが拒否された
    #[error("Data write conflict: {0}")]
    ConflictError(Box<dyn Error + Send + Sync>),
    #[error("Client side error: {0}")]
    ClientSideError(Box<dyn Error + Send + Sync>),
}

/// 「今日」を提供する時計
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// システム時刻(ローカルタイムゾーン)の時計
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// 常に同じ日付を返す時計
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(NaiveDate);

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self(today)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub struct IdGenerator(SnowflakeIdGenerator);

impl IdGenerator {
    pub fn new(gen: SnowflakeIdGenerator) -> Self {
        Self(gen)
    }

    pub fn generate(&mut self) -> u64 {
        self.0.generate() as u64
    }
}

impl From<SnowflakeIdGenerator> for IdGenerator {
    fn from(value: SnowflakeIdGenerator) -> Self {
        Self::new(value)
    }
}

pub static ID_GENERATOR: sync::Lazy<Mutex<IdGenerator>> =
    sync::Lazy::new(|| Mutex::new(SnowflakeIdGenerator::new(1, 1).into()));

/// プロセス共通のスノーフレークIDを払い出す
pub async fn generate_id<T>() -> T
where
    T: From<u64>,
{
    T::from(ID_GENERATOR.lock().await.generate())
}
