pub mod attachment;
pub mod location;
pub mod message;
pub mod submission;
