//! Wire and data types shared by the forge crates.

pub mod api;
pub mod build;
mod file_tree;
pub mod models;

pub use file_tree::FileTree;
pub use file_tree::file_name_of;
