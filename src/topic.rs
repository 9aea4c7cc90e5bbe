//! MQTT topic name/filter validation and broker-string endpoint parsing.

use thiserror::Error;

const LEVEL_SEPARATOR: char = '/';
const MULTI_LEVEL_WILDCARD: char = '#';
const SINGLE_LEVEL_WILDCARD: char = '+';
const SHARE_PREFIX: &str = "$share/";

/// Error validating a topic name or topic filter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic must be at least one character long")]
    Empty,
    #[error("wildcard characters are not allowed in a topic name: {0}")]
    WildcardInTopicName(String),
    #[error("a wildcard must occupy an entire level of the topic filter: {0}")]
    WildcardNotAlone(String),
    #[error("a multi-level wildcard must be the last level of the topic filter: {0}")]
    WildcardNotLast(String),
    #[error("invalid MQTT UTF-8 in topic: {0}")]
    InvalidUtf8(String),
    #[error("shared subscription filter must have a non-empty share name with no wildcards: {0}")]
    InvalidShareName(String),
    #[error("shared subscription filter must contain at least three levels: {0}")]
    SharedSubscriptionTooShort(String),
}

/// Validate an MQTT topic name (used for PUBLISH): non-empty, no `+`/`#`
/// anywhere, valid MQTT UTF-8.
pub fn validate_topic_name(name: &str) -> Result<(), TopicError> {
    if name.is_empty() {
        return Err(TopicError::Empty);
    }
    crate::codec::strtypes::validate_mqtt_utf8(name)
        .map_err(|_| TopicError::InvalidUtf8(name.to_string()))?;
    if name.contains(MULTI_LEVEL_WILDCARD) || name.contains(SINGLE_LEVEL_WILDCARD) {
        return Err(TopicError::WildcardInTopicName(name.to_string()));
    }
    Ok(())
}

/// Validate an MQTT topic filter (used for SUBSCRIBE/UNSUBSCRIBE):
/// non-empty, `+` only as a whole level, `#` only as the final level
/// preceded by `/` or standing alone, shared-subscription shape checked
/// separately by the caller (needs CONNACK capability, §4.7.2).
pub fn validate_topic_filter(filter: &str) -> Result<(), TopicError> {
    if filter.is_empty() {
        return Err(TopicError::Empty);
    }
    crate::codec::strtypes::validate_mqtt_utf8(filter)
        .map_err(|_| TopicError::InvalidUtf8(filter.to_string()))?;

    let filter_body = filter.strip_prefix(SHARE_PREFIX).map_or(filter, |rest| {
        // Validated fully by `is_shared_subscription` below; here we only
        // need the share-name-stripped remainder for wildcard-placement checks.
        match rest.split_once(LEVEL_SEPARATOR) {
            Some((_, topic_filter)) => topic_filter,
            None => rest,
        }
    });

    for level in filter_body.split(LEVEL_SEPARATOR) {
        if level.contains(MULTI_LEVEL_WILDCARD) && level != "#" {
            return Err(TopicError::WildcardNotAlone(filter.to_string()));
        }
        if level.contains(SINGLE_LEVEL_WILDCARD) && level != "+" {
            return Err(TopicError::WildcardNotAlone(filter.to_string()));
        }
    }
    if let Some(pos) = filter_body.find(MULTI_LEVEL_WILDCARD) {
        if pos != filter_body.len() - 1 {
            return Err(TopicError::WildcardNotLast(filter.to_string()));
        }
    }

    if filter.starts_with(SHARE_PREFIX) {
        validate_shared_subscription(filter)?;
    }
    Ok(())
}

/// True if `filter` is a shared subscription (`$share/<group>/<filter>`).
#[must_use]
pub fn is_shared_subscription(filter: &str) -> bool {
    filter.starts_with(SHARE_PREFIX)
}

fn validate_shared_subscription(filter: &str) -> Result<(), TopicError> {
    let levels: Vec<&str> = filter.split(LEVEL_SEPARATOR).collect();
    if levels.len() < 3 {
        return Err(TopicError::SharedSubscriptionTooShort(filter.to_string()));
    }
    let share_name = levels[1];
    if share_name.is_empty()
        || share_name.contains(MULTI_LEVEL_WILDCARD)
        || share_name.contains(SINGLE_LEVEL_WILDCARD)
    {
        return Err(TopicError::InvalidShareName(filter.to_string()));
    }
    Ok(())
}

/// True if `filter` contains a wildcard (`+` or `#`) anywhere.
#[must_use]
pub fn has_wildcard(filter: &str) -> bool {
    filter.contains(MULTI_LEVEL_WILDCARD) || filter.contains(SINGLE_LEVEL_WILDCARD)
}

/// A resolved `(host, port, path)` entry parsed from a broker string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Parse a comma-separated broker string into an ordered list of endpoints.
/// Parsing stops (and returns what has been
/// parsed so far) at the first empty or unparseable entry.
#[must_use]
pub fn parse_broker_string(spec: &str, default_port: u16) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for raw_entry in spec.split(',') {
        let entry = raw_entry.trim();
        match parse_entry(entry, default_port) {
            Some(ep) => endpoints.push(ep),
            None => break,
        }
    }
    endpoints
}

fn parse_entry(entry: &str, default_port: u16) -> Option<Endpoint> {
    if entry.is_empty() {
        return None;
    }
    let mut chars = entry.char_indices().peekable();

    let host_start = 0;
    let mut host_end = entry.len();
    while let Some(&(idx, c)) = chars.peek() {
        if is_unreserved(c) {
            chars.next();
        } else {
            host_end = idx;
            break;
        }
    }
    if host_end == host_start {
        return None;
    }
    let host = &entry[host_start..host_end];
    let mut rest = &entry[host_end..];

    let mut port = default_port;
    if let Some(stripped) = rest.strip_prefix(':') {
        let digit_end = stripped
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(stripped.len());
        if digit_end == 0 {
            return None;
        }
        port = stripped[..digit_end].parse().ok()?;
        rest = &stripped[digit_end..];
    }

    let path = if let Some(stripped) = rest.strip_prefix('/') {
        let path_end = stripped
            .find(|c: char| !is_unreserved(c))
            .unwrap_or(stripped.len());
        if path_end != stripped.len() {
            return None;
        }
        Some(stripped.to_string())
    } else if rest.is_empty() {
        None
    } else {
        return None;
    };

    Some(Endpoint {
        host: host.to_string(),
        port,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_name_rejects_wildcards() {
        assert!(validate_topic_name("a/+/b").is_err());
        assert!(validate_topic_name("a/#").is_err());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name("a/b/c").is_ok());
    }

    #[test]
    fn filter_allows_wildcards_only_as_whole_levels() {
        assert!(validate_topic_filter("sport/+/player").is_ok());
        assert!(validate_topic_filter("sport/#").is_ok());
        assert!(validate_topic_filter("sport/tennis#").is_err());
        assert!(validate_topic_filter("sport/#/score").is_err());
        assert!(validate_topic_filter("sp+rt/tennis").is_err());
    }

    #[test]
    fn shared_subscription_rules() {
        assert!(validate_topic_filter("$share/group/topic").is_ok());
        assert!(validate_topic_filter("$share/group/topic/#").is_ok());
        assert!(validate_topic_filter("$share//topic").is_err());
        assert!(validate_topic_filter("$share/g").is_err());
        assert!(validate_topic_filter("$share/+/topic").is_err());
        assert!(is_shared_subscription("$share/group/topic"));
        assert!(!is_shared_subscription("normal/topic"));
    }

    #[test]
    fn broker_string_parses_entries_with_defaults() {
        let endpoints = parse_broker_string("host1.example.com, host2.example.com:1884/ws", 8883);
        assert_eq!(
            endpoints,
            vec![
                Endpoint {
                    host: "host1.example.com".into(),
                    port: 8883,
                    path: None,
                },
                Endpoint {
                    host: "host2.example.com".into(),
                    port: 1884,
                    path: Some("ws".into()),
                },
            ]
        );
    }

    #[test]
    fn broker_string_stops_at_first_bad_entry() {
        let endpoints = parse_broker_string("good.host, , bad entry", 1883);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].host, "good.host");
    }
}
