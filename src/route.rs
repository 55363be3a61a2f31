//! Radix-tree route table.
//!
//! One tree for the whole gateway — routing is by path only; the backend
//! decides what to do with the method. Patterns use `matchit` syntax, so a
//! service prefix is typically registered as `/catalog-service/{*rest}`.
//! A `{*rest}` capture requires a non-empty remainder, so the bare prefix
//! (`/catalog-service`) is registered alongside every trailing catch-all
//! and routes to the same entry. The table is immutable once built; build
//! it at startup and hand it to the gateway.

use matchit::Router as PathRouter;

use crate::error::Error;

/// One routing entry: a path pattern, the backend it forwards to, and the
/// apology served when that backend is unavailable.
#[derive(Clone, Debug)]
pub struct Route {
    /// Stable identifier; also the breaker registry key.
    pub id: String,
    /// `matchit` pattern matched against the request path.
    pub pattern: String,
    /// Backend base, scheme and authority: `http://127.0.0.1:8081`.
    pub backend: String,
    /// Body of the fallback response for this route.
    pub fallback_message: String,
}

/// The immutable path → route mapping.
pub struct RouteTable {
    tree: PathRouter<usize>,
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Result<Self, Error> {
        let mut tree = PathRouter::new();
        for (index, route) in routes.iter().enumerate() {
            tree.insert(&route.pattern, index).map_err(|source| Error::Route {
                pattern: route.pattern.clone(),
                source,
            })?;
            // `{*rest}` never matches an empty remainder; the bare prefix
            // must route too (`/svc` as well as `/svc/anything`).
            if let Some(prefix) = bare_prefix(&route.pattern) {
                tree.insert(&prefix, index).map_err(|source| Error::Route {
                    pattern: route.pattern.clone(),
                    source,
                })?;
            }
        }
        Ok(Self { tree, routes })
    }

    /// Finds the route whose pattern matches `path`.
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        let matched = self.tree.at(path).ok()?;
        self.routes.get(*matched.value)
    }
}

/// For a pattern ending in a catch-all segment, like `/svc/{*rest}`, the
/// path prefix before the capture. `None` for every other pattern shape.
fn bare_prefix(pattern: &str) -> Option<String> {
    let start = pattern.find("/{*")?;
    let capture = &pattern[start + 1..];
    if !capture.ends_with('}') || capture[..capture.len() - 1].contains('/') {
        return None;
    }
    let prefix = &pattern[..start];
    Some(if prefix.is_empty() { "/".to_owned() } else { prefix.to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, pattern: &str) -> Route {
        Route {
            id: id.to_owned(),
            pattern: pattern.to_owned(),
            backend: "http://127.0.0.1:9000".to_owned(),
            fallback_message: format!("{id} unavailable"),
        }
    }

    #[test]
    fn matches_catch_all_patterns() {
        let table = RouteTable::new(vec![
            route("user", "/user-service/{*rest}"),
            route("catalog", "/catalog-service/{*rest}"),
        ])
        .unwrap();

        assert_eq!(table.lookup("/catalog-service/items/42").unwrap().id, "catalog");
        assert_eq!(table.lookup("/user-service/me").unwrap().id, "user");
        assert!(table.lookup("/order-service/1").is_none());
    }

    #[test]
    fn bare_prefix_matches_catch_all_route() {
        let table =
            RouteTable::new(vec![route("catalog", "/catalog-service/{*rest}")]).unwrap();

        assert_eq!(table.lookup("/catalog-service").unwrap().id, "catalog");
        assert_eq!(table.lookup("/catalog-service/items").unwrap().id, "catalog");
    }

    #[test]
    fn rejects_conflicting_patterns() {
        let result = RouteTable::new(vec![
            route("a", "/svc/{*rest}"),
            route("b", "/svc/{*rest}"),
        ]);
        assert!(matches!(result, Err(Error::Route { .. })));
    }
}
