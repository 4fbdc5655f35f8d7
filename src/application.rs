//! ユースケース層
//!
//! リポジトリと時計をコンストラクタで受け取り、ドメインモデルの検証と永続化を調停する。

mod reservation;
mod time;

pub use self::reservation::*;
pub use self::time::*;
