pub mod model;
pub mod parser;
pub mod validator;

pub use model::{group_listeners, ListenerGroup, Location, VirtualServer};
pub use parser::ConfigParser;
pub use validator::ConfigValidator;

use std::path::Path;

use crate::error::ConfigError;

/// Validate then parse a config file, the two-pass pipeline `spec.md` §4.1/
/// §4.2 describe ("re-reads the file" only after validation succeeds).
pub fn load(path: &Path) -> Result<Vec<ListenerGroup>, ConfigError> {
    ConfigValidator::new().validate(path)?;
    let servers = ConfigParser::new().parse(path)?;
    Ok(group_listeners(servers))
}
