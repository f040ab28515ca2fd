pub mod delivery;
pub mod health_service;
pub mod rate_limit_service;
pub mod submission_service;
pub mod validator;
