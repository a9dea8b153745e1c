//! Entity authorization and query core.
//!
//! One generic [`EntityQueryModel`] serves every entity; what differs between
//! users, schedules and schedule details lives in their [`EntityDescriptor`].

pub mod authorization;
pub mod descriptor;
pub mod model;
pub mod result_builder;
pub mod validation;

pub use authorization::AuthorizationResolver;
pub use descriptor::{EntityDescriptor, FieldKind, FieldRule, ParentLink, SCHEDULE, SCHEDULE_DETAIL, USER};
pub use model::{EntityQueryModel, ModelError};
pub use result_builder::ErrorItem;
