pub mod autoindex;
pub mod path_utils;
pub mod static_files;
