//! Header parsing shared by the curl-multi segment handler.

/// Parses the HTTP status code from a response status line (e.g. "HTTP/1.1 206 Partial Content").
/// `headers` holds only the final response's header lines (redirects are cleared by the caller
/// each time a new status line arrives).
pub(super) fn parse_http_status(headers: &[String]) -> Option<u32> {
    let status_line = headers.iter().find(|l| l.starts_with("HTTP/"))?;
    status_line.split_whitespace().nth(1)?.parse().ok()
}

/// Parses a `Content-Range: bytes start-end/total` header, returning `(start, end)` (inclusive).
pub(super) fn parse_content_range(headers: &[String]) -> Option<(u64, u64)> {
    let line = headers
        .iter()
        .find(|l| l.to_ascii_lowercase().starts_with("content-range:"))?;
    let value = line.splitn(2, ':').nth(1)?.trim();
    let range = value.strip_prefix("bytes ")?;
    let (range, _total) = range.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_from_final_response() {
        let headers = vec![
            "HTTP/1.1 206 Partial Content".to_string(),
            "Content-Range: bytes 0-99/1000".to_string(),
        ];
        assert_eq!(parse_http_status(&headers), Some(206));
    }

    #[test]
    fn parses_content_range_case_insensitive() {
        let headers = vec!["content-range: bytes 100-199/1000".to_string()];
        assert_eq!(parse_content_range(&headers), Some((100, 199)));
    }

    #[test]
    fn missing_content_range_returns_none() {
        let headers = vec!["HTTP/1.1 200 OK".to_string()];
        assert_eq!(parse_content_range(&headers), None);
    }
}
