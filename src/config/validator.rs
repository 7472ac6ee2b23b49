use std::collections::{HashSet, BTreeSet};
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;

/// Ports nginx-adjacent convention avoids handing to a toy server: the
/// single well-known clashes from `spec.md` §4.1 plus the X11 display range.
fn reserved_ports() -> &'static [u16] {
    const RESERVED: &[u16] = &[1025, 1080, 1098, 1099, 1433, 1521, 1723, 3306, 3389, 5432, 5900];
    RESERVED
}

const METHODS: &[&str] = &["GET", "POST", "DELETE", "HEAD", "PUT", "PATCH", "OPTIONS", "CONNECT", "TRACE"];
const CGI_EXTENSIONS: &[&str] = &[".py", ".php"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationKind {
    Directory,
    Cgi,
}

/// A table-driven directive rule: a regex the whole line must match, plus an
/// optional value check run on a match. Mirrors the `(name, regex,
/// valueChecker)` table the original validator builds in its constructor.
struct DirectiveRule {
    name: &'static str,
    pattern: Regex,
    check: Option<fn(&str) -> bool>,
}

fn server_rules() -> Vec<DirectiveRule> {
    vec![
        DirectiveRule { name: "listen", pattern: Regex::new(r"^listen\s+\d+$").unwrap(), check: Some(check_port) },
        DirectiveRule { name: "server_name", pattern: Regex::new(r"^server_name\s+\S+$").unwrap(), check: None },
        DirectiveRule { name: "host", pattern: Regex::new(r"^host\s+\d+\.\d+\.\d+\.\d+$").unwrap(), check: Some(check_ip) },
        DirectiveRule { name: "root", pattern: Regex::new(r"^root\s+\S+$").unwrap(), check: None },
        DirectiveRule { name: "index", pattern: Regex::new(r"^index\s+\S+$").unwrap(), check: Some(check_index) },
        DirectiveRule { name: "client_max_body_size", pattern: Regex::new(r"^client_max_body_size\s+\d+$").unwrap(), check: Some(check_max_body_size) },
        DirectiveRule { name: "error_page", pattern: Regex::new(r"^error_page\s+\d+\s+\S+$").unwrap(), check: Some(check_error_page) },
    ]
}

fn location_rules() -> Vec<DirectiveRule> {
    vec![
        DirectiveRule { name: "allow_methods", pattern: Regex::new(r"^allow_methods(\s+\S+){1,9}$").unwrap(), check: Some(check_methods) },
        DirectiveRule { name: "index", pattern: Regex::new(r"^index\s+\S+$").unwrap(), check: Some(check_index) },
        DirectiveRule { name: "autoindex", pattern: Regex::new(r"^autoindex\s+\S+$").unwrap(), check: Some(check_autoindex) },
        DirectiveRule { name: "cgi_path", pattern: Regex::new(r"^cgi_path\s+\S+$").unwrap(), check: None },
        DirectiveRule { name: "cgi_ext", pattern: Regex::new(r"^cgi_ext(\s+\S+)+$").unwrap(), check: Some(check_cgi_ext) },
        DirectiveRule { name: "upload_to", pattern: Regex::new(r"^upload_to\s+\S+$").unwrap(), check: None },
        DirectiveRule { name: "return", pattern: Regex::new(r"^return\s+\S+$").unwrap(), check: None },
    ]
}

fn check_port(line: &str) -> bool {
    let Some(n) = line.rsplit(' ').next().and_then(|s| s.parse::<i64>().ok()) else { return false };
    if !(1024..=49151).contains(&n) {
        return false;
    }
    let n = n as u16;
    !reserved_ports().contains(&n) && !(6000..6064).contains(&n)
}

fn check_ip(line: &str) -> bool {
    let Some(ip) = line.rsplit(' ').next() else { return false };
    ip.splitn(4, '.').all(|part| part.parse::<u8>().is_ok()) && ip.split('.').count() == 4
}

fn check_index(line: &str) -> bool {
    line.ends_with(".html")
}

fn check_max_body_size(line: &str) -> bool {
    line.rsplit(' ').next().and_then(|s| s.parse::<i64>().ok()).map(|n| (0..=10_000_000).contains(&n)).unwrap_or(false)
}

fn check_error_page(line: &str) -> bool {
    let re = Regex::new(r"^error_page\s+(\d+)\s+(\S+)$").unwrap();
    let Some(caps) = re.captures(line) else { return false };
    let code = &caps[1];
    let filename = &caps[2];
    if !filename.ends_with(".html") {
        return false;
    }
    filename.split('/').next_back().map(|f| f.starts_with(code)).unwrap_or(false)
}

fn check_methods(line: &str) -> bool {
    line.split_whitespace().skip(1).all(|tok| METHODS.contains(&tok))
}

fn check_cgi_ext(line: &str) -> bool {
    line.split_whitespace().skip(1).all(|tok| CGI_EXTENSIONS.contains(&tok))
}

fn check_autoindex(line: &str) -> bool {
    matches!(line.split_whitespace().nth(1), Some("on") | Some("off"))
}

#[derive(Debug, Default)]
struct BlockFrame {
    kind: &'static str,
    location_kind: Option<LocationKind>,
    seen: HashSet<&'static str>,
}

/// Lexes and grammar-checks the config file line by line (`spec.md` §4.1).
/// Stateless beyond a single `validate` call.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        ConfigValidator
    }

    pub fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path)?;
        self.validate_str(&content)
    }

    pub fn validate_str(&self, content: &str) -> Result<(), ConfigError> {
        let open_block = Regex::new(r"\{$").unwrap();
        let server_open = Regex::new(r"^server\s*\{$").unwrap();
        let location_open = Regex::new(r"^location\s+(\S+)\s*\{$").unwrap();

        let mut stack: Vec<BlockFrame> = Vec::new();
        let mut locations_seen: BTreeSet<String> = BTreeSet::new();
        let mut directory_location_seen = false;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if open_block.is_match(line) {
                if server_open.is_match(line) {
                    if !stack.is_empty() {
                        return Err(ConfigError::directive("'server' block must be top-level only", raw_line));
                    }
                    locations_seen.clear();
                    directory_location_seen = false;
                    stack.push(BlockFrame { kind: "server", location_kind: None, seen: HashSet::new() });
                } else if let Some(caps) = location_open.captures(line) {
                    if stack.last().map(|f| f.kind) != Some("server") {
                        return Err(ConfigError::directive("Nested 'location' block is not allowed", raw_line));
                    }
                    let pattern = &caps[1];
                    if !locations_seen.insert(pattern.to_string()) {
                        return Err(ConfigError::directive("Duplicate location", raw_line));
                    }
                    let kind = match pattern.chars().next() {
                        Some('/') => LocationKind::Directory,
                        Some('.') => LocationKind::Cgi,
                        _ => return Err(ConfigError::directive("Invalid value for directive: location", raw_line)),
                    };
                    if kind == LocationKind::Directory {
                        directory_location_seen = true;
                    }
                    stack.push(BlockFrame { kind: "location", location_kind: Some(kind), seen: HashSet::new() });
                } else {
                    return Err(ConfigError::directive("Invalid block type", raw_line));
                }
                continue;
            }

            if line == "}" {
                let frame = stack.pop().ok_or_else(|| ConfigError::directive("Unbalanced }", raw_line))?;
                self.verify_mandatory(&frame, raw_line)?;
                if frame.kind == "server" && !directory_location_seen {
                    return Err(ConfigError::structural("Missing directory type of location".to_string()));
                }
                continue;
            }

            let Some(frame) = stack.last_mut() else {
                return Err(ConfigError::directive("Keyword outside of any block", raw_line));
            };
            let rules = if frame.kind == "server" { server_rules() } else { location_rules() };
            let directive_name = line.split_whitespace().next().unwrap_or("");

            let Some(rule) = rules.iter().find(|r| r.pattern.is_match(line) || r.name == directive_name) else {
                return Err(ConfigError::directive("Malformed directive", raw_line));
            };

            if !rule.pattern.is_match(line) {
                return Err(ConfigError::directive(format!("Invalid value for directive: {}", rule.name), raw_line));
            }
            if frame.seen.contains(rule.name) {
                return Err(ConfigError::directive("Repeated directive", raw_line));
            }
            if let Some(check) = rule.check {
                if !check(line) {
                    return Err(ConfigError::directive(format!("Invalid value for directive: {}", rule.name), raw_line));
                }
            }
            frame.seen.insert(rule.name);
        }

        if !stack.is_empty() {
            return Err(ConfigError::structural("Missing closing curly brace (syntax error)".to_string()));
        }

        Ok(())
    }

    fn verify_mandatory(&self, frame: &BlockFrame, raw_line: &str) -> Result<(), ConfigError> {
        let mandatory: &[&str] = match frame.kind {
            "server" => &["listen", "server_name", "host", "root"],
            "location" => match frame.location_kind {
                Some(LocationKind::Directory) => &["allow_methods", "index"],
                Some(LocationKind::Cgi) => &["allow_methods", "cgi_path", "cgi_ext"],
                None => &[],
            },
            _ => &[],
        };
        for name in mandatory {
            if !frame.seen.contains(name) {
                return Err(ConfigError::directive(
                    format!("Missing mandatory {} directive: {}", frame.kind, name),
                    raw_line,
                ));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
server {
    listen 8080
    server_name localhost
    host 127.0.0.1
    root www

    location / {
        allow_methods GET
        index index.html
    }
}
";

    #[test]
    fn minimal_config_validates() {
        assert!(ConfigValidator::new().validate_str(MINIMAL).is_ok());
    }

    #[test]
    fn rejects_duplicate_directive() {
        let cfg = MINIMAL.replace("root www", "root www\n    root www2");
        assert!(ConfigValidator::new().validate_str(&cfg).is_err());
    }

    #[test]
    fn rejects_nested_location() {
        let cfg = "\
server {
    listen 8080
    server_name localhost
    host 127.0.0.1
    root www
    location / {
        allow_methods GET
        index index.html
        location /nested {
            allow_methods GET
            index index.html
        }
    }
}
";
        assert!(ConfigValidator::new().validate_str(cfg).is_err());
    }

    #[test]
    fn rejects_missing_directory_location() {
        let cfg = "\
server {
    listen 8080
    server_name localhost
    host 127.0.0.1
    root www
    location .py {
        allow_methods GET
        cgi_path cgi-bin
        cgi_ext .py
    }
}
";
        assert!(ConfigValidator::new().validate_str(cfg).is_err());
    }

    #[test]
    fn rejects_reserved_port() {
        let cfg = MINIMAL.replace("listen 8080", "listen 3306");
        assert!(ConfigValidator::new().validate_str(&cfg).is_err());
    }

    #[test]
    fn rejects_unbalanced_braces() {
        let cfg = "server {\n    listen 8080\n";
        assert!(ConfigValidator::new().validate_str(cfg).is_err());
    }
}
