// 外部系統的具體實作：PostgreSQL、物件儲存與檔案格式

pub mod formats;
pub mod local_engine;
pub mod postgres;
pub mod storage;

pub use local_engine::LocalEngine;
pub use postgres::PostgresConnector;
