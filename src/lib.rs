// Library for tests to access modules

pub mod config;
pub mod emitter;
pub mod error;
pub mod poller;
pub mod record;
pub mod sampler;
pub mod scraper;
pub mod sink;
pub mod storage;
