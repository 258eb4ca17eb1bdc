//! The `http` module: blocking requests over `ureq`. Failures are `E14xxx`.
//!
//! Responses are maps: `{"status": int, "body": string, "headers": map}`.
//! Non-2xx statuses are still responses, not errors; only transport-level
//! failures produce `E14001`.

use crate::builtins::support::{as_str, expect_args, try_arg};
use crate::value::{MapKey, Value};
use ez_macros::builtin;
use indexmap::IndexMap;

fn response_value(response: ureq::Response) -> Value {
    let status = response.status();
    let mut headers = IndexMap::new();
    for name in response.headers_names() {
        if let Some(value) = response.header(&name) {
            headers.insert(MapKey::Str(name.clone()), Value::Str(value.to_string()));
        }
    }
    let body = response.into_string().unwrap_or_default();

    let mut entries = IndexMap::new();
    entries.insert(MapKey::Str("status".into()), Value::int(status as i64));
    entries.insert(MapKey::Str("body".into()), Value::Str(body));
    entries.insert(MapKey::Str("headers".into()), Value::map(headers));
    Value::map(entries)
}

fn request_error(err: ureq::Error) -> Value {
    match err {
        // Status errors still carry a response worth returning
        ureq::Error::Status(_, response) => response_value(response),
        ureq::Error::Transport(t) => Value::error("E14001", format!("request failed: {}", t)),
    }
}

fn check_url(name: &str, url: &str) -> Result<(), Value> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Value::error(
            "E14002",
            format!("{}: `{}` is not an http(s) URL", name, url),
        ))
    }
}

#[builtin(name = "http.get")]
/// Perform a blocking GET.
pub fn http_get(args: &[Value]) -> Value {
    expect_args!("http.get", args, 1);
    let url = try_arg!(as_str("http.get", args, 0));
    try_arg!(check_url("http.get", url));
    match ureq::get(url).call() {
        Ok(response) => response_value(response),
        Err(e) => request_error(e),
    }
}

#[builtin(name = "http.post")]
/// Perform a blocking POST with a string body; an optional third argument
/// sets the content type (default `application/json`).
pub fn http_post(args: &[Value]) -> Value {
    expect_args!("http.post", args, 2, 3);
    let url = try_arg!(as_str("http.post", args, 0));
    try_arg!(check_url("http.post", url));
    let body = try_arg!(as_str("http.post", args, 1));
    let content_type = if args.len() == 3 {
        try_arg!(as_str("http.post", args, 2))
    } else {
        "application/json"
    };
    match ureq::post(url)
        .set("Content-Type", content_type)
        .send_string(body)
    {
        Ok(response) => response_value(response),
        Err(e) => request_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_http_url_rejected() {
        let Value::Error(e) = http_get(&[Value::Str("ftp://example.com".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E14002");
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        // Reserved TLD guarantees resolution failure without network access
        let Value::Error(e) = http_get(&[Value::Str("http://nothing.invalid/".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E14001");
    }
}
