use crate::error::DecodeError;

/// Host and port split out of a captured `host[:port]` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPort {
    pub host: Option<String>,
    pub port: Option<i64>,
}

/// Splits `raw` into host and port. A value without a colon is all host; a
/// colon that cannot be split (a bare IPv6 literal, say) yields nothing.
pub fn host_port(raw: &str) -> HostPort {
    if !raw.contains(':') {
        return HostPort {
            host: non_empty(raw),
            port: None,
        };
    }

    match split_host_port(raw) {
        Some((host, port)) => HostPort {
            host: non_empty(host),
            port: port.parse().ok(),
        },
        None => HostPort::default(),
    }
}

fn split_host_port(raw: &str) -> Option<(&str, &str)> {
    let colon = raw.rfind(':')?;
    let (host, port) = (&raw[..colon], &raw[colon + 1..]);

    if let Some(bracketed) = host.strip_prefix('[') {
        let inner = bracketed.strip_suffix(']')?;
        if inner.contains('[') || inner.contains(']') {
            return None;
        }
        return Some((inner, port));
    }

    if host.contains([':', '[', ']']) || port.contains([']', '[']) {
        return None;
    }
    Some((host, port))
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Version half of a `NAME/VERSION` protocol string, e.g. "1.1" for
/// "HTTP/1.1".
pub fn protocol_version(proto: &str) -> Option<String> {
    let mut parts = proto.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(version), None) if !version.is_empty() => Some(version.to_string()),
        _ => None,
    }
}

/// Extracts the path from a mux pattern of the form `[METHOD] [HOST]/[PATH]`.
pub fn parse_pattern(pattern: &str) -> Result<String, DecodeError> {
    if pattern.is_empty() {
        return Err(DecodeError::EmptyPattern);
    }

    let rest = match pattern.find([' ', '\t']) {
        Some(i) => pattern[i + 1..].trim_start_matches([' ', '\t']),
        None => pattern,
    };

    rest.find('/')
        .map(|i| rest[i..].to_string())
        .ok_or(DecodeError::MissingPathOrHost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            host_port("google.com:8080"),
            HostPort {
                host: Some("google.com".to_string()),
                port: Some(8080),
            }
        );
        assert_eq!(
            host_port("[::1]:443"),
            HostPort {
                host: Some("::1".to_string()),
                port: Some(443),
            }
        );
    }

    #[test]
    fn host_without_port() {
        assert_eq!(
            host_port("google.com"),
            HostPort {
                host: Some("google.com".to_string()),
                port: None,
            }
        );
        assert_eq!(host_port(""), HostPort::default());
    }

    #[test]
    fn non_numeric_port_keeps_host() {
        assert_eq!(
            host_port("localhost:http"),
            HostPort {
                host: Some("localhost".to_string()),
                port: None,
            }
        );
    }

    #[test]
    fn unsplittable_colon_yields_nothing() {
        assert_eq!(host_port("fe80::1"), HostPort::default());
    }

    #[test]
    fn protocol_versions() {
        assert_eq!(protocol_version("HTTP/1.1").as_deref(), Some("1.1"));
        assert_eq!(protocol_version("HTTP/2.0").as_deref(), Some("2.0"));
        assert_eq!(protocol_version("HTTP"), None);
        assert_eq!(protocol_version("HTTP/"), None);
        assert_eq!(protocol_version("a/b/c"), None);
    }

    #[test]
    fn pattern_paths() {
        assert_eq!(parse_pattern("/").unwrap(), "/");
        assert_eq!(parse_pattern("/users/{id}").unwrap(), "/users/{id}");
        assert_eq!(parse_pattern("GET /users/{id}").unwrap(), "/users/{id}");
        assert_eq!(parse_pattern("POST \t example.com/items").unwrap(), "/items");
        assert_eq!(parse_pattern("example.com/").unwrap(), "/");
    }

    #[test]
    fn pattern_errors() {
        assert_eq!(parse_pattern(""), Err(DecodeError::EmptyPattern));
        assert_eq!(parse_pattern("GET"), Err(DecodeError::MissingPathOrHost));
        assert_eq!(
            parse_pattern("GET example.com"),
            Err(DecodeError::MissingPathOrHost)
        );
    }
}
