//! Generic CRUD service adapter over SeaORM.
//!
//! One [`SeaOrmAdapter`] per entity exposes the six-operation service
//! convention (find/get/create/patch/update/remove), translating the
//! `$sort`/`$limit`/`$skip`/`$select` + operator filter into SeaORM query
//! options and normalizing results and errors back into the convention.

pub mod adapter;
pub mod errors;
pub mod params;
pub mod query;
pub mod service;

pub use adapter::{Pagination, SeaOrmAdapter};
pub use errors::AdapterError;
pub use params::Params;
pub use service::{CrudService, FindResult, Page, Records};
