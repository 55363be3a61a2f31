//! Authorization stage.
//!
//! Rejects a request at the edge, before any backend dispatch, when it
//! carries no credential or an unverifiable one. The client only ever sees a
//! bare `401`; the reason is logged server-side.

use http::StatusCode;
use http::header::AUTHORIZATION;
use tracing::error;

use crate::filter::{BoxFuture, Filter, FilterContext, Next};
use crate::token::TokenValidator;

/// Side-channel key under which the verified subject is stored for later
/// stages and the terminal dispatch.
pub const SUBJECT_KEY: &str = "subject";

/// Chain stage enforcing a valid bearer credential.
pub struct AuthorizationFilter {
    validator: TokenValidator,
}

impl AuthorizationFilter {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }

    fn reject(&self, ctx: &FilterContext, reason: &str) -> crate::Response {
        // Reason stays server-side; the response body discloses nothing.
        error!(request_id = %ctx.request().id(), "{reason}");
        crate::Response::status(StatusCode::UNAUTHORIZED)
    }
}

impl Filter for AuthorizationFilter {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn handle<'a>(&'a self, ctx: &'a mut FilterContext, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let claims = {
                let Some(raw) = ctx.request().header(AUTHORIZATION.as_str()) else {
                    return self.reject(ctx, "No Authorization Header!");
                };
                match self.validator.validate(raw) {
                    Ok(claims) => claims,
                    Err(_) => return self.reject(ctx, "Token is not Valid!"),
                }
            };

            ctx.set(SUBJECT_KEY, claims.sub);
            next.run(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterChain, Terminal};
    use crate::request::Request;
    use crate::response::Response;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Method};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &[u8] = b"torii-test-signing-secret-0123456789";

    struct CountingTerminal(AtomicUsize);

    impl Terminal for CountingTerminal {
        fn dispatch<'c>(&'c self, _ctx: &'c mut FilterContext) -> BoxFuture<'c> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                Response::text("backend")
            })
        }
    }

    fn chain() -> FilterChain {
        let validator = TokenValidator::new(&BASE64.encode(SECRET)).unwrap();
        FilterChain::new().stage(AuthorizationFilter::new(validator))
    }

    fn request(authorization: Option<&str>) -> Request {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        Request::new(Method::GET, "/catalog-service/items", None, headers, Bytes::new())
    }

    fn token(sub: &str) -> String {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        let claims = crate::token::Claims { sub: sub.to_owned(), exp: Some(exp) };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn stage_name_is_stable() {
        let validator = TokenValidator::new(&BASE64.encode(SECRET)).unwrap();
        assert_eq!(AuthorizationFilter::new(validator).name(), "authorization");
    }

    #[tokio::test]
    async fn missing_header_short_circuits_with_401() {
        let terminal = CountingTerminal(AtomicUsize::new(0));
        let mut ctx = FilterContext::new(request(None));

        let res = chain().run(&mut ctx, &terminal).await;

        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert!(res.body().is_empty());
        assert_eq!(terminal.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_token_short_circuits_with_401() {
        let terminal = CountingTerminal(AtomicUsize::new(0));
        let mut ctx = FilterContext::new(request(Some("Bearer not.a.token")));

        let res = chain().run(&mut ctx, &terminal).await;

        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(terminal.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_token_stores_subject_and_continues() {
        let terminal = CountingTerminal(AtomicUsize::new(0));
        let header = format!("Bearer {}", token("u1"));
        let mut ctx = FilterContext::new(request(Some(&header)));

        let res = chain().run(&mut ctx, &terminal).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(ctx.get(SUBJECT_KEY), Some("u1"));
        assert_eq!(terminal.0.load(Ordering::SeqCst), 1);
    }
}
