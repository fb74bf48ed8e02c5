use std::collections::HashMap;

/// Parses the X-Sentry-Auth header value into its key/value pairs.
///
/// Format: `Sentry sentry_key=xxx, sentry_version=7, sentry_client=...`.
/// Anything without the `Sentry ` scheme yields an empty map.
pub fn parse_sentry_auth_header(header_value: &str) -> HashMap<String, String> {
    let Some(pairs) = header_value.trim_start().strip_prefix("Sentry ") else {
        return HashMap::new();
    };

    pairs
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
