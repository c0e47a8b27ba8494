pub mod company_repo;
pub mod client_repo;
pub mod product_repo;
pub mod quotation_repo;
pub mod order_repo;
pub mod sync_log_repo;

pub use company_repo::*;
pub use client_repo::*;
pub use product_repo::*;
pub use quotation_repo::*;
pub use order_repo::*;
pub use sync_log_repo::*;
