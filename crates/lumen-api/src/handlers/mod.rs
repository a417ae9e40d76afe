pub mod health;
pub mod issue_access;
pub mod media_delete;
pub mod media_get;
pub mod media_upload;
