pub mod keys;
pub mod mirror;
pub mod storage_service;
