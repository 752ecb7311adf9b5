//! URL path joining.

/// Join a target base path with an incoming request path.
///
/// Returns `(decoded, escaped)`. An empty escaped path counts as `/`;
/// when the base ends with `/` and the request path begins with `/` the
/// seam collapses to a single `/`, otherwise the two are concatenated.
/// The decoded form is the percent-decoded join; if decoding fails, both
/// returns equal the escaped form.
pub fn join_url_path(base_path: &str, request_path: &str) -> (String, String) {
    let mut joined = if base_path.is_empty() {
        "/".to_string()
    } else {
        base_path.to_string()
    };
    let request_path = if request_path.is_empty() {
        "/"
    } else {
        request_path
    };

    if joined.ends_with('/') && request_path.starts_with('/') {
        joined.push_str(&request_path[1..]);
    } else {
        joined.push_str(request_path);
    }

    match urlencoding::decode(&joined) {
        Ok(decoded) => (decoded.into_owned(), joined),
        Err(_) => (joined.clone(), joined),
    }
}
