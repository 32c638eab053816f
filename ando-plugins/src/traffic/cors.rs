use ando_core::config::CorsConfig;
use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds the front-of-pipeline CORS filter (C9) from the operator's
/// `CorsConfig`. Runs ahead of the orchestrator and answers preflight
/// `OPTIONS` requests itself — `tower_http::cors::CorsLayer` does this for
/// us rather than hand-rolling another preflight responder.
pub fn layer(cfg: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods(parse_methods(&cfg.allowed_methods))
        .allow_headers(parse_header_names(&cfg.allowed_headers))
        .expose_headers(parse_header_names(&cfg.exposed_headers))
        .max_age(std::time::Duration::from_secs(cfg.max_age_secs));

    layer = if cfg.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        layer.allow_origin(origins)
    };

    if cfg.allow_credentials && !cfg.allowed_origins.iter().any(|o| o == "*") {
        layer = layer.allow_credentials(true);
    }

    layer
}

fn parse_methods(methods: &[String]) -> Vec<Method> {
    methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect()
}

fn parse_header_names(headers: &[String]) -> Vec<HeaderName> {
    headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_cors() -> CorsConfig {
        let yaml = "{}";
        serde_yaml::from_str::<Wrapper>(&format!("cors: {yaml}"))
            .unwrap()
            .cors
    }

    #[derive(serde::Deserialize)]
    struct Wrapper {
        cors: CorsConfig,
    }

    #[test]
    fn default_config_builds_a_layer_without_panicking() {
        let cfg = default_cors();
        let _layer = layer(&cfg);
    }

    #[test]
    fn wildcard_origin_maps_to_allow_any() {
        let cfg = default_cors();
        assert!(cfg.allowed_origins.iter().any(|o| o == "*"));
        let _layer = layer(&cfg);
    }

    #[test]
    fn explicit_origin_list_builds_without_panicking() {
        let mut cfg = default_cors();
        cfg.allowed_origins = vec!["https://example.com".to_string()];
        let _layer = layer(&cfg);
    }
}
