//! Route guard: a pure predicate over auth state.

use crate::auth::AuthState;

/// Navigable routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Patients,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
            Route::Patients => "/patients",
        }
    }

    /// Parse a path; unknown paths land on the dashboard.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/patients" => Route::Patients,
            _ => Route::Dashboard,
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Show the requested route
    Render(Route),
    /// Go elsewhere instead
    Redirect(Route),
    /// Auth state not settled yet
    Pending,
}

/// Decide what a navigation to `route` shows.
///
/// `resolved` is false until the initial session check has run.
pub fn guard(route: Route, state: AuthState, resolved: bool) -> Navigation {
    if !resolved || state == AuthState::Authenticating {
        return Navigation::Pending;
    }

    let authenticated = state == AuthState::Authenticated;
    match (route.is_protected(), authenticated) {
        (true, true) => Navigation::Render(route),
        (true, false) => Navigation::Redirect(Route::Login),
        (false, true) => Navigation::Redirect(Route::Dashboard),
        (false, false) => Navigation::Render(route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_routes() {
        assert_eq!(
            guard(Route::Patients, AuthState::Authenticated, true),
            Navigation::Render(Route::Patients)
        );
        assert_eq!(
            guard(Route::Patients, AuthState::Unauthenticated, true),
            Navigation::Redirect(Route::Login)
        );
        assert_eq!(
            guard(Route::Dashboard, AuthState::Unauthenticated, true),
            Navigation::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_login_route() {
        assert_eq!(
            guard(Route::Login, AuthState::Unauthenticated, true),
            Navigation::Render(Route::Login)
        );
        assert_eq!(
            guard(Route::Login, AuthState::Authenticated, true),
            Navigation::Redirect(Route::Dashboard)
        );
    }

    #[test]
    fn test_pending() {
        assert_eq!(
            guard(Route::Patients, AuthState::Unauthenticated, false),
            Navigation::Pending
        );
        assert_eq!(
            guard(Route::Login, AuthState::Authenticating, true),
            Navigation::Pending
        );
    }

    #[test]
    fn test_paths() {
        for route in [Route::Login, Route::Dashboard, Route::Patients] {
            assert_eq!(Route::from_path(route.path()), route);
        }
        assert_eq!(Route::from_path("/patients/?page=2"), Route::Patients);
        assert_eq!(Route::from_path("/nowhere"), Route::Dashboard);
    }
}
