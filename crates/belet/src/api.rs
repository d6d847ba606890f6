//! Static endpoint table of the remote REST API.
//!
//! Every logical endpoint maps to a functional area (whose base URL comes
//! from [`ApiConfig`]), a path template and an API version.

use std::fmt::Display;

use crate::config::ApiConfig;

/// Functional area of the API, each served from its own host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Auth,
    Homepage,
    Film,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    SignIn,
    LogOut,
    CheckCode,
    Refresh,
    HomePage,
    Movie,
    Files,
    Episodes,
    WatchProgress,
    Search,
    SearchFilters,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    area: Area,
    /// `{version}` and `{id}` are substituted on lookup.
    path: &'static str,
    version: u8,
}

const fn route(area: Area, path: &'static str, version: u8) -> Route {
    Route {
        area,
        path,
        version,
    }
}

impl Endpoint {
    const fn route(self) -> Route {
        match self {
            Self::SignIn => route(Area::Auth, "/api/v{version}/auth/sign-in", 1),
            Self::LogOut => route(Area::Auth, "/api/v{version}/auth/log-out", 1),
            Self::CheckCode => route(Area::Auth, "/api/v{version}/auth/check-code", 1),
            Self::Refresh => route(Area::Auth, "/api/v{version}/auth/refresh", 1),
            Self::HomePage => route(Area::Homepage, "/api/v{version}/home_page", 1),
            Self::Movie => route(Area::Film, "/api/v{version}/movie/{id}", 2),
            Self::Files => route(Area::Film, "/api/v{version}/files/{id}", 2),
            Self::Episodes => route(Area::Film, "/api/v{version}/episodes", 2),
            Self::WatchProgress => route(Area::Film, "/api/v{version}/watch-time", 2),
            Self::Search => route(Area::Search, "/api/v{version}/search", 1),
            Self::SearchFilters => route(Area::Search, "/api/v{version}/filters", 1),
        }
    }

    pub const fn area(self) -> Area {
        self.route().area
    }

    /// Whether the path template needs an id argument.
    pub fn takes_id(self) -> bool {
        self.route().path.contains("{id}")
    }
}

/// Resolves [`Endpoint`]s into absolute URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    config: ApiConfig,
}

impl Endpoints {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    pub fn base(&self, area: Area) -> &str {
        match area {
            Area::Auth => &self.config.auth,
            Area::Homepage => &self.config.homepage,
            Area::Film => &self.config.film,
            Area::Search => &self.config.search,
        }
    }

    /// URL of an endpoint without an id segment.
    pub fn url(&self, endpoint: Endpoint) -> String {
        debug_assert!(!endpoint.takes_id(), "{endpoint:?} requires an id");
        self.render(endpoint, None)
    }

    /// URL of an endpoint whose template carries an `{id}` segment.
    pub fn url_for(&self, endpoint: Endpoint, id: impl Display) -> String {
        self.render(endpoint, Some(id.to_string()))
    }

    /// Host part of the auth area, used to scope the fingerprint cookie.
    pub fn auth_host(&self) -> Option<String> {
        url::Url::parse(&join_base(&self.config.auth, ""))
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    fn render(&self, endpoint: Endpoint, id: Option<String>) -> String {
        let route = endpoint.route();
        let mut path = route.path.replace("{version}", &route.version.to_string());
        if let Some(id) = id {
            path = path.replace("{id}", &id);
        }
        join_base(self.base(route.area), &path)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

fn join_base(base: &str, path: &str) -> String {
    let base = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("https://{base}")
    };
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_hosts() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.url(Endpoint::SignIn),
            "https://api.belet.tm/api/v1/auth/sign-in"
        );
        assert_eq!(
            endpoints.url(Endpoint::HomePage),
            "https://homepage.belet.me/api/v1/home_page"
        );
        assert_eq!(
            endpoints.url_for(Endpoint::Movie, 555),
            "https://film.beletapis.com/api/v2/movie/555"
        );
        assert_eq!(
            endpoints.url(Endpoint::Episodes),
            "https://film.beletapis.com/api/v2/episodes"
        );
    }

    #[test]
    fn normalizes_slashes_and_scheme() {
        let endpoints = Endpoints::new(ApiConfig {
            auth: "api.example.com/".into(),
            ..ApiConfig::single_host("http://127.0.0.1:8080/")
        });
        assert_eq!(
            endpoints.url(Endpoint::Refresh),
            "https://api.example.com/api/v1/auth/refresh"
        );
        assert_eq!(
            endpoints.url_for(Endpoint::Files, 7),
            "http://127.0.0.1:8080/api/v2/files/7"
        );
        assert_eq!(endpoints.auth_host().as_deref(), Some("api.example.com"));
    }

    #[test]
    fn auth_host_is_extracted() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.auth_host().as_deref(), Some("api.belet.tm"));
        assert_eq!(Endpoint::LogOut.area(), Area::Auth);
        assert!(Endpoint::Movie.takes_id());
        assert!(!Endpoint::Search.takes_id());
    }
}
