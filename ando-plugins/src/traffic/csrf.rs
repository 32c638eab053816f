use ando_core::config::ProjectConfig;
use http::{HeaderMap, Method};

/// CSRF gate (spec §4.6 step 2). Only applies to projects with
/// `csrfRequired` set, and only to the methods that carry a body capable of
/// mutating state. `X-XSRF-TOKEN` is checked for presence and non-blankness
/// only — the double-submit comparison against the session itself is left
/// to the upstream, same as the source behavior this was distilled from.
pub fn passes(method: &Method, headers: &HeaderMap, project: &ProjectConfig) -> bool {
    if !project.csrf_required {
        return true;
    }
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE) {
        return true;
    }
    headers
        .get("X-XSRF-TOKEN")
        .and_then(|v| v.to_str().ok())
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(csrf_required: bool) -> ProjectConfig {
        let yaml = format!(
            r#"
prefix: /shop
target_url: http://localhost:9000
auth_type: TOKEN
csrf_required: {csrf_required}
"#
        );
        let mut cfg: ProjectConfig = serde_yaml::from_str(&yaml).unwrap();
        cfg.finalize().unwrap();
        cfg
    }

    fn headers_with_token(value: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(v) = value {
            h.insert("X-XSRF-TOKEN", v.parse().unwrap());
        }
        h
    }

    #[test]
    fn disabled_project_always_passes() {
        let project = project(false);
        assert!(passes(&Method::POST, &HeaderMap::new(), &project));
    }

    #[test]
    fn get_requests_are_exempt() {
        let project = project(true);
        assert!(passes(&Method::GET, &HeaderMap::new(), &project));
    }

    #[test]
    fn post_without_header_fails() {
        let project = project(true);
        assert!(!passes(&Method::POST, &HeaderMap::new(), &project));
    }

    #[test]
    fn post_with_blank_header_fails() {
        let project = project(true);
        assert!(!passes(&Method::POST, &headers_with_token(Some("   ")), &project));
    }

    #[test]
    fn post_with_token_passes() {
        let project = project(true);
        assert!(passes(&Method::POST, &headers_with_token(Some("tok")), &project));
    }

    #[test]
    fn put_patch_delete_are_also_checked() {
        let project = project(true);
        for method in [Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(!passes(&method, &HeaderMap::new(), &project));
        }
    }
}
