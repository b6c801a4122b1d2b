//! # Repositories
//!
//! Database access layers encapsulating SeaORM operations per entity.

pub mod account;
pub mod dispatch_job;
pub mod scheduled_post;

pub use account::AccountRepository;
pub use dispatch_job::DispatchJobRepository;
pub use scheduled_post::{NewScheduledPost, ScheduledPostRepository};
