pub mod config;
pub mod logging;

pub mod cancel;
pub mod checksum;
pub mod continuation;
pub mod engine;
pub mod naming;
pub mod probe;
pub mod request;
pub mod resume_state;
pub mod segmenter;
pub mod session;
pub mod splitter;
pub mod storage;
