use std::fs;
use std::io;
use std::path::Path;

use crate::http::Response;

/// Conventional location of the autoindex template (`spec.md` §6).
const TEMPLATE_PATH: &str = "www/autoindex_template.html";

const FALLBACK_TEMPLATE: &str = "\
<!DOCTYPE html>
<html><head><title>Index of {{PATH}}</title></head>
<body><h1>Index of {{PATH}}</h1>{{PARENT_LINK}}<ul>{{ITEMS}}</ul></body></html>
";

/// Render an HTML directory listing for `dir_path` as it would be seen at
/// `request_path`, substituting `{{PATH}}`, `{{PARENT_LINK}}`, and
/// `{{ITEMS}}` into the template named above (falling back to a minimal
/// built-in template if it's absent from the document tree).
pub fn render(dir_path: &Path, request_path: &str) -> io::Result<Response> {
    let mut entries: Vec<(String, bool)> = fs::read_dir(dir_path)?
        .filter_map(|e| e.ok())
        .map(|e| {
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (e.file_name().to_string_lossy().into_owned(), is_dir)
        })
        .collect();
    entries.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

    let items: String = entries
        .iter()
        .map(|(name, is_dir)| {
            let href = if *is_dir { format!("{name}/") } else { name.clone() };
            let label = if *is_dir { format!("{name}/") } else { name.clone() };
            format!("<li><a href=\"{href}\">{label}</a></li>")
        })
        .collect();

    let parent_link = if request_path != "/" {
        let parent = parent_of(request_path);
        format!("<a href=\"{parent}\">.. (parent directory)</a>")
    } else {
        String::new()
    };

    let template = fs::read_to_string(TEMPLATE_PATH).unwrap_or_else(|_| FALLBACK_TEMPLATE.to_string());
    let html = template
        .replace("{{PATH}}", request_path)
        .replace("{{PARENT_LINK}}", &parent_link)
        .replace("{{ITEMS}}", &items);

    let mut response = Response::ok();
    response.set_header("Content-Type", "text/html");
    response.set_body_string(html);
    Ok(response)
}

fn parent_of(request_path: &str) -> String {
    let trimmed = request_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => format!("{}/", &trimmed[..i]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_entries_sorted_with_trailing_slash_on_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();

        let response = render(dir.path(), "/files/").unwrap();
        let html = String::from_utf8_lossy(&response.body);
        assert!(html.contains("a_dir/"));
        assert!(html.contains("b.txt"));
        assert!(html.find("a_dir").unwrap() < html.find("b.txt").unwrap());
    }

    #[test]
    fn root_listing_has_no_parent_link() {
        let dir = TempDir::new().unwrap();
        let response = render(dir.path(), "/").unwrap();
        let html = String::from_utf8_lossy(&response.body);
        assert!(!html.contains("parent directory"));
    }
}
