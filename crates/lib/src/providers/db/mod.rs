pub mod postgrest;
pub mod storage;
