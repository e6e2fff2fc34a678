mod binding;
pub mod db;
pub mod models;
mod owners;
mod tables;

pub use binding::{BindingTable, OwnerTable};
pub use db::{Database, DatabaseError};
pub use tables::*;
