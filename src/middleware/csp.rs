use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

/// Policy: self plus Twitch profile images. The overlay is embedded by
/// broadcast software, so framing is not restricted to self.
const CSP: &str = "default-src 'self'; img-src 'self' https://static-cdn.jtvnw.net; connect-src 'self'; object-src 'none'; base-uri 'self'; form-action 'self' https://id.twitch.tv";

/// Adds Content-Security-Policy, Referrer-Policy and X-Content-Type-Options
/// to every response that does not already carry them.
pub async fn csp_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    let headers = [
        ("content-security-policy", CSP),
        ("referrer-policy", "no-referrer"),
        ("x-content-type-options", "nosniff"),
    ];

    for (name, value) in headers {
        if res.headers().get(name).is_none() {
            res.headers_mut().insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }

    res
}
