use std::collections::HashMap;
use std::path::PathBuf;

use crate::http::Method;

/// One `server { ... }` block once fully parsed (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct VirtualServer {
    pub bind_address: String,
    pub port: u16,
    pub server_name: String,
    pub root: PathBuf,
    pub index: String,
    pub client_max_body_size: usize,
    pub error_pages: HashMap<u16, PathBuf>,
    pub locations: Vec<Location>,
}

impl VirtualServer {
    /// Locate the best-matching location for a request path, following the
    /// exact-match > extension-match > longest-prefix-match rule of
    /// `spec.md` §4.6.
    pub fn resolve_location(&self, path: &str) -> Option<&Location> {
        if let Some(exact) = self.locations.iter().find(|l| !l.is_extension && l.pattern == path) {
            return Some(exact);
        }

        if let Some(ext_match) = self
            .locations
            .iter()
            .filter(|l| l.is_extension && path.ends_with(l.pattern.as_str()))
            .max_by_key(|l| l.pattern.len())
        {
            return Some(ext_match);
        }

        self.locations
            .iter()
            .filter(|l| !l.is_extension && is_prefix_match(path, &l.pattern))
            .max_by_key(|l| l.pattern.len())
    }
}

/// `/api` matches `/api/x` and `/api` itself, but not `/apix`
/// (`spec.md` §4.6 prefix-match rule).
fn is_prefix_match(path: &str, pattern: &str) -> bool {
    path.starts_with(pattern) && matches!(path.as_bytes().get(pattern.len()), None | Some(b'/'))
}

/// One `location { ... }` block. `is_extension` distinguishes a CGI
/// location (`pattern` begins `.`) from a directory location (`pattern`
/// begins `/`).
#[derive(Debug, Clone)]
pub struct Location {
    pub pattern: String,
    pub is_extension: bool,
    pub allowed_methods: Vec<Method>,
    pub index: Option<String>,
    pub autoindex: bool,
    pub cgi_path: Option<PathBuf>,
    pub cgi_ext: Vec<String>,
    pub upload_path: Option<PathBuf>,
    pub return_url: Option<String>,
}

impl Location {
    pub fn is_cgi(&self) -> bool {
        self.cgi_path.is_some() && !self.cgi_ext.is_empty()
    }

    pub fn is_redirect(&self) -> bool {
        self.return_url.is_some()
    }

    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods.contains(&method)
    }

    pub fn allow_header_value(&self) -> String {
        self.allowed_methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }
}

/// Servers that share a `(bind_address, port)` pair bind one socket and pick
/// among themselves by `Host` header (`spec.md` §4.3/§4.6). The first server
/// encountered in the config file is the group's default.
#[derive(Debug, Clone)]
pub struct ListenerGroup {
    pub bind_address: String,
    pub port: u16,
    pub servers: Vec<VirtualServer>,
}

impl ListenerGroup {
    pub fn select_server(&self, host: Option<&str>) -> &VirtualServer {
        if let Some(host) = host {
            if let Some(found) = self.servers.iter().find(|s| s.server_name == host) {
                return found;
            }
        }
        &self.servers[0]
    }
}

/// Group parsed `VirtualServer`s by `(bind_address, port)`, preserving
/// declaration order within each group (`spec.md` §3: "the first encountered
/// is the group's default").
pub fn group_listeners(servers: Vec<VirtualServer>) -> Vec<ListenerGroup> {
    let mut groups: Vec<ListenerGroup> = Vec::new();
    for server in servers {
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.bind_address == server.bind_address && g.port == server.port)
        {
            group.servers.push(server);
        } else {
            groups.push(ListenerGroup {
                bind_address: server.bind_address.clone(),
                port: server.port,
                servers: vec![server],
            });
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(pattern: &str, is_extension: bool) -> Location {
        Location {
            pattern: pattern.to_string(),
            is_extension,
            allowed_methods: vec![Method::Get],
            index: None,
            autoindex: false,
            cgi_path: None,
            cgi_ext: Vec::new(),
            upload_path: None,
            return_url: None,
        }
    }

    fn server(locations: Vec<Location>) -> VirtualServer {
        VirtualServer {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            server_name: "localhost".to_string(),
            root: PathBuf::from("www"),
            index: "index.html".to_string(),
            client_max_body_size: 1_000_000,
            error_pages: HashMap::new(),
            locations,
        }
    }

    #[test]
    fn exact_match_wins_over_prefix() {
        let s = server(vec![loc("/", false), loc("/static", false)]);
        assert_eq!(s.resolve_location("/static").unwrap().pattern, "/static");
    }

    #[test]
    fn longest_prefix_wins() {
        let s = server(vec![loc("/", false), loc("/static", false)]);
        assert_eq!(s.resolve_location("/static/a.css").unwrap().pattern, "/static");
    }

    #[test]
    fn extension_beats_prefix() {
        let s = server(vec![loc("/", false), loc(".py", true)]);
        assert_eq!(s.resolve_location("/cgi-bin/hello.py").unwrap().pattern, ".py");
    }

    #[test]
    fn group_listeners_preserves_first_as_default() {
        let a = server(vec![loc("/", false)]);
        let mut b = server(vec![loc("/", false)]);
        b.server_name = "other.example".to_string();
        let groups = group_listeners(vec![a, b]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].servers[0].server_name, "localhost");
        assert_eq!(groups[0].select_server(Some("unknown")).server_name, "localhost");
        assert_eq!(groups[0].select_server(Some("other.example")).server_name, "other.example");
    }
}
