use std::collections::HashMap;
use std::path::Path;

use crate::http::Request;

/// RFC 3875 CGI/1.1 environment variables for one invocation, built per
/// `spec.md` §4.8's exact list.
#[derive(Debug, Clone, Default)]
pub struct CgiEnvironment {
    variables: HashMap<String, String>,
}

impl CgiEnvironment {
    pub fn new() -> Self {
        CgiEnvironment::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(|s| s.as_str())
    }

    pub fn to_env_strings(&self) -> Vec<String> {
        self.variables.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build(
        request: &Request,
        script_path: &Path,
        script_name: &str,
        path_info: Option<&str>,
        server_name: &str,
        server_port: u16,
    ) -> Self {
        let mut env = CgiEnvironment::new();

        env.set("GATEWAY_INTERFACE", "CGI/1.1");
        env.set("SERVER_PROTOCOL", "HTTP/1.1");
        env.set("REQUEST_METHOD", request.method.as_str());
        env.set("SCRIPT_NAME", script_name);
        let script_filename = std::fs::canonicalize(script_path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| script_path.to_string_lossy().into_owned());
        env.set("SCRIPT_FILENAME", &script_filename);

        if let Some(path_info) = path_info.filter(|p| !p.is_empty()) {
            env.set("PATH_INFO", path_info);
            let translated = format!("{}{}", script_path.to_string_lossy(), path_info);
            env.set("PATH_TRANSLATED", &translated);
        }

        env.set("QUERY_STRING", request.query_string.as_deref().unwrap_or(""));

        if let Some(content_type) = request.headers.get("content-type") {
            env.set("CONTENT_TYPE", content_type);
        }
        let content_length = request.content_length().unwrap_or(request.body.len());
        env.set("CONTENT_LENGTH", &content_length.to_string());

        env.set("SERVER_SOFTWARE", "webserv/1.0");
        env.set("SERVER_NAME", server_name);
        env.set("SERVER_PORT", &server_port.to_string());
        env.set("REMOTE_ADDR", "127.0.0.1");
        env.set("REMOTE_HOST", "localhost");
        env.set("PATH", "/usr/bin:/bin:/usr/local/bin");

        env
    }
}
