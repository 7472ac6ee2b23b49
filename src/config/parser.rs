use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Location, VirtualServer};
use crate::error::ConfigError;
use crate::http::Method;

/// Re-reads an already-validated config file and builds the `VirtualServer`
/// list (`spec.md` §4.2). Trusts the grammar `ConfigValidator` enforced;
/// any directive it would have rejected is assumed absent here.
pub struct ConfigParser;

impl ConfigParser {
    pub fn new() -> Self {
        ConfigParser
    }

    pub fn parse(&self, path: &Path) -> Result<Vec<VirtualServer>, ConfigError> {
        let content = fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    pub fn parse_str(&self, content: &str) -> Result<Vec<VirtualServer>, ConfigError> {
        let mut servers = Vec::new();
        let mut lines = content.lines().peekable();

        while let Some(raw) = lines.next() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "server {" || line.starts_with("server") && line.ends_with('{') {
                servers.push(self.parse_server(&mut lines)?);
            }
        }

        Ok(servers)
    }

    fn parse_server<'a, I: Iterator<Item = &'a str>>(&self, lines: &mut std::iter::Peekable<I>) -> Result<VirtualServer, ConfigError> {
        let mut bind_address = String::new();
        let mut port = 0u16;
        let mut server_name = String::new();
        let mut root = PathBuf::new();
        let mut index = String::new();
        let mut client_max_body_size = 1_000_000usize;
        let mut error_pages = HashMap::new();
        let mut locations = Vec::new();

        while let Some(raw) = lines.next() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "}" {
                break;
            }
            if line.starts_with("location") && line.ends_with('{') {
                locations.push(self.parse_location(line, lines)?);
                continue;
            }

            let mut parts = line.split_whitespace();
            let directive = parts.next().unwrap_or("");
            let rest: Vec<&str> = parts.collect();

            match directive {
                "listen" => port = rest[0].parse().unwrap_or(0),
                "server_name" => server_name = rest[0].to_string(),
                "host" => bind_address = rest[0].to_string(),
                "root" => root = PathBuf::from(rest[0]),
                "index" => index = rest[0].to_string(),
                "client_max_body_size" => client_max_body_size = rest[0].parse().unwrap_or(client_max_body_size),
                "error_page" => {
                    if rest.len() == 2 {
                        if let Ok(code) = rest[0].parse::<u16>() {
                            error_pages.insert(code, PathBuf::from(rest[1]));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(VirtualServer { bind_address, port, server_name, root, index, client_max_body_size, error_pages, locations })
    }

    fn parse_location<'a, I: Iterator<Item = &'a str>>(&self, header: &str, lines: &mut I) -> Result<Location, ConfigError> {
        let pattern = header
            .trim_start_matches("location")
            .trim()
            .trim_end_matches('{')
            .trim()
            .to_string();
        let is_extension = pattern.starts_with('.');

        let mut allowed_methods = Vec::new();
        let mut index = None;
        let mut autoindex = false;
        let mut cgi_path = None;
        let mut cgi_ext = Vec::new();
        let mut upload_path = None;
        let mut return_url = None;

        for raw in lines.by_ref() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "}" {
                break;
            }

            let mut parts = line.split_whitespace();
            let directive = parts.next().unwrap_or("");
            let rest: Vec<&str> = parts.collect();

            match directive {
                "allow_methods" => {
                    allowed_methods = rest.iter().filter_map(|m| Method::from_config_token(m)).collect();
                }
                "index" => index = rest.first().map(|s| s.to_string()),
                "autoindex" => autoindex = rest.first() == Some(&"on"),
                "cgi_path" => cgi_path = rest.first().map(PathBuf::from),
                "cgi_ext" => cgi_ext = rest.iter().map(|s| s.to_string()).collect(),
                "upload_to" => upload_path = rest.first().map(PathBuf::from),
                "return" => return_url = rest.first().map(|s| s.to_string()),
                _ => {}
            }
        }

        Ok(Location { pattern, is_extension, allowed_methods, index, autoindex, cgi_path, cgi_ext, upload_path, return_url })
    }
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG: &str = "\
server {
    listen 8080
    server_name localhost
    host 127.0.0.1
    root www
    index index.html
    client_max_body_size 1000000

    location / {
        allow_methods GET POST
        index index.html
        autoindex off
    }

    location .py {
        allow_methods GET POST
        cgi_path www/cgi-bin
        cgi_ext .py
    }
}
";

    #[test]
    fn parses_server_and_locations() {
        let servers = ConfigParser::new().parse_str(CFG).unwrap();
        assert_eq!(servers.len(), 1);
        let s = &servers[0];
        assert_eq!(s.port, 8080);
        assert_eq!(s.server_name, "localhost");
        assert_eq!(s.locations.len(), 2);
        assert!(s.locations[1].is_cgi());
        assert!(!s.locations[0].is_extension);
    }
}
