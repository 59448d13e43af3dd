//! Small helpers shared across the crate: timestamps and topic parsing.

/// RFC3339 UTC timestamp with millisecond precision, as VDA5050 headers require.
pub fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parsed `{manufacturer}/{serialNumber}/{kind}` suffix of a `/uagv/v2/...` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkTopic {
    pub manufacturer: String,
    pub serial_number: String,
    pub kind: String,
}

/// Parses a topic of the form `/uagv/v2/{manufacturer}/{serialNumber}/{kind}`.
/// Returns `None` for anything not matching that shape.
pub fn parse_downlink_topic(topic: &str) -> Option<DownlinkTopic> {
    let rest = topic.strip_prefix("/uagv/v2/")?;
    let mut parts = rest.splitn(3, '/');
    let manufacturer = parts.next()?.to_string();
    let serial_number = parts.next()?.to_string();
    let kind = parts.next()?.to_string();
    if manufacturer.is_empty() || serial_number.is_empty() || kind.is_empty() {
        return None;
    }
    Some(DownlinkTopic {
        manufacturer,
        serial_number,
        kind,
    })
}

pub fn uplink_topic(manufacturer: &str, serial_number: &str, kind: &str) -> String {
    format!("/uagv/v2/{manufacturer}/{serial_number}/{kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_topic() {
        let t = parse_downlink_topic("/uagv/v2/acme/agv-1/order").unwrap();
        assert_eq!(t.manufacturer, "acme");
        assert_eq!(t.serial_number, "agv-1");
        assert_eq!(t.kind, "order");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(parse_downlink_topic("uagv/v2/acme/agv-1/order").is_none());
    }

    #[test]
    fn builds_uplink_topic() {
        assert_eq!(
            uplink_topic("acme", "agv-1", "state"),
            "/uagv/v2/acme/agv-1/state"
        );
    }
}
