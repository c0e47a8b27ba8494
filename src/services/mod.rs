pub mod erp;
pub mod configuration_service;
pub mod conversion_service;
pub mod quotation_service;
pub mod sync_service;

pub use configuration_service::ConfigurationService;
pub use conversion_service::ConversionService;
pub use quotation_service::QuotationService;
pub use sync_service::SyncService;
