pub mod storage_mode;
pub mod video;
