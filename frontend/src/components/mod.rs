pub mod auth_forms;
pub mod chat;
pub mod dashboard;
pub mod generating;
pub mod home;
pub mod navbar;
pub mod note_view;
