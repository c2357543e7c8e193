use http::Method;
use std::collections::HashMap;

#[derive(Debug, PartialEq)]
enum PathSegment {
    Static(String),
    Param(String),
}

#[derive(Debug)]
struct PathPattern {
    segments: Vec<PathSegment>,
}

impl PathPattern {
    /// Parses a path pattern such as `/ci/status/{user}/{repo}/{branch}/`.
    /// Leading and trailing slashes are not significant.
    fn parse(path_str: &str) -> Self {
        let normalized_path = path_str.trim().trim_matches('/');

        let segments = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path
                .split('/')
                .map(|s| {
                    if let Some(stripped) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        PathSegment::Param(stripped.to_string())
                    } else {
                        PathSegment::Static(s.to_string())
                    }
                })
                .collect()
        };

        PathPattern { segments }
    }

    /// Returns the captured parameters if `request_path` matches this pattern.
    /// Parameters never match an empty segment.
    fn matches<'a>(&self, request_path: &'a str) -> Option<HashMap<String, &'a str>> {
        let normalized_path = request_path.trim_matches('/');

        let request_segments: Vec<&'a str> = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path.split('/').collect()
        };

        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (seg, req_segment) in self.segments.iter().zip(request_segments) {
            match seg {
                PathSegment::Static(s) if s == req_segment => {}
                PathSegment::Param(name) if !req_segment.is_empty() => {
                    params.insert(name.clone(), req_segment);
                }
                _ => return None,
            }
        }

        Some(params)
    }
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, A> {
    pub params: HashMap<String, &'a str>,
    pub action: &'a A,
}

impl<A> RouteMatch<'_, A> {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).copied()
    }
}

/// Outcome of resolving a request against a [`RouteTable`].
#[derive(Debug, PartialEq)]
pub enum Resolution<'a, A> {
    Matched(RouteMatch<'a, A>),
    /// The path is known but not for this method.
    MethodNotAllowed,
    NotFound,
}

#[derive(Debug)]
pub struct Route<A> {
    method: Method,
    path: PathPattern,
    action: A,
}

impl<A> Route<A> {
    pub fn new(method: Method, path: &str, action: A) -> Self {
        Self {
            method,
            path: PathPattern::parse(path),
            action,
        }
    }
}

/// Ordered list of routes. The first route whose method and path match wins.
#[derive(Debug)]
pub struct RouteTable<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteTable<A> {
    pub fn new(routes: Vec<Route<A>>) -> Self {
        Self { routes }
    }

    pub fn resolve<'a>(&'a self, method: &Method, path: &'a str) -> Resolution<'a, A> {
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = route.path.matches(path) else {
                continue;
            };

            // HEAD is served by GET routes; hyper strips the body.
            if route.method == method || (route.method == Method::GET && method == Method::HEAD) {
                return Resolution::Matched(RouteMatch {
                    params,
                    action: &route.action,
                });
            }
            path_matched = true;
        }

        if path_matched {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }
}
