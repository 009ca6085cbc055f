pub mod friend;
pub mod identity;
pub mod meeting;
pub mod status;
