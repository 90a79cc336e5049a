pub mod items;
pub mod pages;
pub mod roles;
pub mod users;
