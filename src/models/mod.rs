pub mod member;
pub mod organization;
pub mod plugin_role;
pub mod resource;
pub mod shift;
pub mod user;
