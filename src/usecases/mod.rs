//! Application use cases. Orchestrate domain logic via ports.

pub mod access_control;
pub mod auth_service;
pub mod dispatcher;
pub mod group_service;
pub mod replies;
pub mod request_parser;

#[cfg(test)]
pub mod test_support;

pub use access_control::AccessControl;
pub use auth_service::AuthService;
pub use dispatcher::Dispatcher;
pub use group_service::GroupService;
