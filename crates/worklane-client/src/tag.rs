//! Request tagging
//!
//! Before a request leaves the client it is tagged with two facts the rest
//! of the pipeline keys off: whether it targets an authentication endpoint
//! (those never carry a bearer token and never trigger a refresh), and
//! whether it is critical (session, password, or any mutating call), which
//! drives log level and metrics labels.

use reqwest::Method;

/// Path prefix of the platform's authentication endpoints.
pub const AUTH_PREFIX: &str = "/auth/";

/// Path fragments that mark a request critical even outside `/auth/`.
const CRITICAL_MARKERS: &[&str] = &["/session", "/password"];

/// Whether a path targets the login, registration, refresh, or another
/// authentication endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Auth,
    Ordinary,
}

/// How carefully a failure on this request should be surfaced in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Critical,
    Routine,
}

/// Tag computed once per request, before credentials are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    pub endpoint: EndpointKind,
    pub criticality: Criticality,
}

impl RequestTag {
    pub fn is_auth(&self) -> bool {
        self.endpoint == EndpointKind::Auth
    }

    /// Label used on metrics and in structured logs.
    pub fn criticality_label(&self) -> &'static str {
        match self.criticality {
            Criticality::Critical => "critical",
            Criticality::Routine => "routine",
        }
    }
}

/// Tag a request from its method and path. Pure: looks only at the two
/// arguments, never at headers or the token cache.
pub fn tag_request(method: &Method, path: &str) -> RequestTag {
    let endpoint = if is_auth_endpoint(path) {
        EndpointKind::Auth
    } else {
        EndpointKind::Ordinary
    };
    let criticality = if endpoint == EndpointKind::Auth
        || CRITICAL_MARKERS.iter().any(|m| path.contains(m))
        || is_mutating(method)
    {
        Criticality::Critical
    } else {
        Criticality::Routine
    };
    RequestTag { endpoint, criticality }
}

/// True for `/auth` and everything under `/auth/` (login, register,
/// refresh, logout, password reset).
pub fn is_auth_endpoint(path: &str) -> bool {
    path == "/auth" || path.starts_with(AUTH_PREFIX)
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_is_auth_and_critical() {
        let tag = tag_request(&Method::POST, "/auth/login");
        assert_eq!(tag.endpoint, EndpointKind::Auth);
        assert_eq!(tag.criticality, Criticality::Critical);
        assert!(tag.is_auth());
    }

    #[test]
    fn refresh_and_register_are_auth() {
        assert!(is_auth_endpoint("/auth/refresh"));
        assert!(is_auth_endpoint("/auth/register"));
        assert!(is_auth_endpoint("/auth/logout"));
        assert!(is_auth_endpoint("/auth"));
    }

    #[test]
    fn similar_prefixes_are_not_auth() {
        // "/authors" shares the first five bytes with "/auth/" but is an
        // ordinary resource.
        assert!(!is_auth_endpoint("/authors"));
        assert!(!is_auth_endpoint("/authorization-models"));
        let tag = tag_request(&Method::GET, "/authors");
        assert_eq!(tag.endpoint, EndpointKind::Ordinary);
    }

    #[test]
    fn reads_are_routine() {
        let tag = tag_request(&Method::GET, "/projects/42/tasks");
        assert_eq!(tag.endpoint, EndpointKind::Ordinary);
        assert_eq!(tag.criticality, Criticality::Routine);
        assert_eq!(tag.criticality_label(), "routine");
    }

    #[test]
    fn mutations_are_critical() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let tag = tag_request(&method, "/projects/42/tasks");
            assert_eq!(tag.criticality, Criticality::Critical, "{method}");
        }
    }

    #[test]
    fn session_and_password_paths_are_critical_even_on_get() {
        let sessions = tag_request(&Method::GET, "/users/7/sessions");
        assert_eq!(sessions.endpoint, EndpointKind::Ordinary);
        assert_eq!(sessions.criticality, Criticality::Critical);

        let password = tag_request(&Method::GET, "/account/password-policy");
        assert_eq!(password.criticality, Criticality::Critical);
    }

    #[test]
    fn head_and_options_are_routine() {
        assert_eq!(
            tag_request(&Method::HEAD, "/projects").criticality,
            Criticality::Routine
        );
        assert_eq!(
            tag_request(&Method::OPTIONS, "/projects").criticality,
            Criticality::Routine
        );
    }
}
