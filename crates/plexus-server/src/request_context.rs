use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use plexus_core::{ANONYMOUS_CALLER, CallerIdentity, RequestContext};
use secrecy::SecretString;

/// Header naming the logical caller ("agent") issuing the request
const CALLER_HEADER: &str = "x-plexus-caller";

/// Header carrying the caller's privacy tag, matched by routing rules
const PRIVACY_HEADER: &str = "x-plexus-privacy";

/// Middleware that builds a `RequestContext` from the incoming request
///
/// Caller identity and privacy tag come from gateway headers; a bearer
/// token, when present, is carried as an upstream key override. The
/// context is read-only for the rest of the request.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let headers = request.headers();

    let name = header_str(headers, CALLER_HEADER).unwrap_or(ANONYMOUS_CALLER).to_owned();
    let privacy = header_str(headers, PRIVACY_HEADER).map(ToOwned::to_owned);
    let api_key = header_str(headers, http::header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| SecretString::from(token.to_owned()));

    let context = RequestContext {
        caller: CallerIdentity { name, privacy },
        api_key,
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
