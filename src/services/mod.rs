pub mod record_service;
pub use record_service::{ModelError, RecordService};

pub mod record_service_impl;
pub use record_service_impl::CachedRecordService;
