mod client;

pub use client::SqliteRecordStore;
