#[cfg(test)]
mod tests {
    use crate::codec::*;

    #[test]
    fn test_parse_status_headers_and_body() {
        let raw = b"HTTP/1.1 200 OK\r\nST: roku:ecp\r\nUSN: uuid:abc\r\nLOCATION: http://10.0.0.5:8060/\r\n\r\n<xml/>";
        let message = Message::parse(raw);

        assert_eq!(message.status(), "HTTP/1.1 200 OK");
        assert_eq!(message.search_target(), Some("roku:ecp"));
        assert_eq!(message.usn(), Some("uuid:abc"));
        assert_eq!(message.header("LOCATION"), Some("http://10.0.0.5:8060/"));
        assert_eq!(message.body(), Some("<xml/>"));
        assert_eq!(message.headers().len(), 3);
    }

    #[test]
    fn test_parse_accepts_bare_newlines() {
        let message = Message::parse(b"NOTIFY * HTTP/1.1\nNT: a:b\nNTS: ssdp:alive\n\n");
        assert_eq!(message.notification_type(), Some("a:b"));
        assert_eq!(message.notification_kind(), Some(NotificationKind::Alive));
        assert_eq!(message.body(), None);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let raw = b"M-SEARCH * HTTP/1.1\r\nnot a header\r\n: no key\r\nEmpty:\r\nST: x\r\n\r\n";
        let message = Message::parse(raw);

        assert_eq!(message.headers().len(), 1);
        assert_eq!(message.search_target(), Some("x"));
        assert!(!message.headers().contains_key("Empty"));
    }

    #[test]
    fn test_parse_keeps_whitespace_only_value() {
        let raw = b"NOTIFY * HTTP/1.1\r\nBlank:   \r\nTab:\t\r\nNT: a\r\n\r\n";
        let message = Message::parse(raw);

        assert_eq!(message.header("Blank"), Some(" "));
        assert_eq!(message.header("Tab"), Some("\t"));
        assert_eq!(message.notification_type(), Some("a"));
        assert_eq!(message.headers().len(), 3);
    }

    #[test]
    fn test_parse_unquotes_values() {
        let raw = b"M-SEARCH * HTTP/1.1\r\nMan: \"ssdp:discover\"\r\nHalf: \"open\r\nLone: \"\r\n\r\n";
        let message = Message::parse(raw);

        assert_eq!(message.header("Man"), Some("ssdp:discover"));
        assert_eq!(message.header("Half"), Some("\"open"));
        assert_eq!(message.header("Lone"), Some(""));
    }

    #[test]
    fn test_parse_value_keeps_later_colons() {
        let message = Message::parse(b"HTTP/1.1 200 OK\r\nLOCATION: http://host:80/x\r\n\r\n");
        assert_eq!(message.header("LOCATION"), Some("http://host:80/x"));
    }

    #[test]
    fn test_duplicate_header_last_write_wins() {
        let raw = b"HTTP/1.1 200 OK\r\nA: 1\r\nB: 2\r\nA: 3\r\n\r\n";
        let message = Message::parse(raw);

        assert_eq!(message.header("A"), Some("3"));
        let keys: Vec<&str> = message.headers().keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_headers_are_case_sensitive() {
        let message = Message::parse(b"HTTP/1.1 200 OK\r\nst: lower\r\n\r\n");
        assert_eq!(message.search_target(), None);
        assert_eq!(message.header("st"), Some("lower"));
    }

    #[test]
    fn test_parse_empty_datagram() {
        let message = Message::parse(b"");
        assert_eq!(message.status(), "");
        assert!(message.headers().is_empty());
        assert!(!message.is_search_request());
    }

    #[test]
    fn test_compose_search_layout() {
        let extra = Headers::from([("MX", "2")]);
        let bytes = compose_search(Some("roku:ecp"), "239.255.255.250", 1900, &extra);
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(
            text,
            "M-SEARCH * HTTP/1.1\r\n\
             Host: 239.255.255.250:1900\r\n\
             Man: \"ssdp:discover\"\r\n\
             ST: roku:ecp\r\n\
             MX: 2\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_compose_search_without_service() {
        let bytes = compose_search(None, "239.255.255.250", 1900, &Headers::new());
        let message = Message::parse(&bytes);

        assert!(message.is_search_request());
        assert_eq!(message.search_target(), None);
        assert_eq!(message.header("Man"), Some("ssdp:discover"));
    }

    #[test]
    fn test_compose_notify_fields() {
        let params = Headers::from([("AL", "x"), ("LOCATION", "x")]);
        let bytes = compose_notify(NotificationKind::ByeBye, "test:svc", "u-1", "239.255.255.250", 1900, &params);
        let message = Message::parse(&bytes);

        assert_eq!(message.status(), NOTIFY_REQUEST_LINE);
        assert_eq!(message.header("Host"), Some("239.255.255.250:1900"));
        assert_eq!(message.notification_kind(), Some(NotificationKind::ByeBye));
        assert_eq!(message.notification_type(), Some("test:svc"));
        assert_eq!(message.usn(), Some("uuid:u-1"));
        assert_eq!(message.header("LOCATION"), Some("x"));
    }

    #[test]
    fn test_response_round_trip_preserves_header_map() {
        let params = Headers::from([("AL", "..."), ("LOCATION", "..."), ("AddlHeader", "extra")]);
        let bytes = compose_response("test:svc", "id", &params);
        let message = Message::parse(&bytes);

        assert_eq!(message.status(), RESPONSE_STATUS_LINE);
        let expected = Headers::from([
            ("ST", "test:svc"),
            ("USN", "uuid:id"),
            ("AL", "..."),
            ("LOCATION", "..."),
            ("AddlHeader", "extra"),
        ]);
        assert_eq!(message.headers(), &expected);
        assert_eq!(message.body(), None);
    }

    #[test]
    fn test_notification_kind_strings() {
        assert_eq!(NotificationKind::from_header("ssdp:alive"), Some(NotificationKind::Alive));
        assert_eq!(NotificationKind::from_header("ssdp:byebye"), Some(NotificationKind::ByeBye));
        assert_eq!(NotificationKind::from_header("ssdp:update"), None);
    }

    #[test]
    fn test_headers_serialize_as_ordered_map() {
        let headers = Headers::from([("B", "1"), ("A", "2")]);
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"{"B":"1","A":"2"}"#);
    }
}
