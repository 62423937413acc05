//! Protocol layer tests: error mapping, chat ids, event and body JSON shapes.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wa_protocol::*;

    // ─────────────────────────────────────────────────────────────────────
    // GatewayError
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn error_status_classes() {
        assert_eq!(GatewayError::MissingFields.status_code(), 400);
        assert_eq!(GatewayError::NotConnected.status_code(), 403);
        assert_eq!(GatewayError::QrUnavailable.status_code(), 404);
        assert_eq!(GatewayError::SendFailed { reason: "x".into() }.status_code(), 500);
        assert_eq!(GatewayError::LogoutFailed { reason: "x".into() }.status_code(), 500);
        assert_eq!(GatewayError::SessionClosed.status_code(), 503);
    }

    #[test]
    fn server_error_hides_reason_in_display() {
        let err = GatewayError::SendFailed { reason: "page crashed".into() };
        assert!(err.is_server_error());
        assert_eq!(err.reason(), Some("page crashed"));
        assert!(!err.to_string().contains("page crashed"));
    }

    #[test]
    fn client_errors_have_no_reason() {
        assert!(!GatewayError::NotConnected.is_server_error());
        assert_eq!(GatewayError::NotConnected.reason(), None);
    }

    // ─────────────────────────────────────────────────────────────────────
    // ChatId
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn chat_id_strips_non_digits() {
        let id = ChatId::from_phone("216 99 999 999").unwrap();
        assert_eq!(id.as_str(), "21699999999@c.us");
        assert_eq!(id.user(), "21699999999");
    }

    #[test]
    fn chat_id_strips_plus_and_punctuation() {
        let id = ChatId::from_phone("+216 (99) 999-999").unwrap();
        assert_eq!(id.to_string(), format!("21699999999{CONTACT_SUFFIX}"));
    }

    #[test]
    fn chat_id_rejects_phone_without_digits() {
        assert!(ChatId::from_phone("").is_none());
        assert!(ChatId::from_phone("call me").is_none());
    }

    // ─────────────────────────────────────────────────────────────────────
    // ClientEvent
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn qr_event_parses() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "qr", "data": "XYZ"})).unwrap();
        assert_eq!(event, ClientEvent::Qr("XYZ".into()));
        assert_eq!(event.name(), "qr");
    }

    #[test]
    fn unit_events_parse_without_data() {
        let ready: ClientEvent = serde_json::from_value(json!({"event": "ready"})).unwrap();
        assert_eq!(ready, ClientEvent::Ready);
        let auth: ClientEvent = serde_json::from_value(json!({"event": "authenticated"})).unwrap();
        assert_eq!(auth, ClientEvent::Authenticated);
    }

    #[test]
    fn failure_events_carry_reason() {
        let failure: ClientEvent =
            serde_json::from_value(json!({"event": "auth_failure", "data": "bad session"})).unwrap();
        assert_eq!(failure, ClientEvent::AuthFailure("bad session".into()));

        let gone: ClientEvent =
            serde_json::from_value(json!({"event": "disconnected", "data": "NAVIGATION"})).unwrap();
        assert_eq!(gone, ClientEvent::Disconnected("NAVIGATION".into()));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({"event": "message_create"}));
        assert!(parsed.is_err());
    }

    // ─────────────────────────────────────────────────────────────────────
    // HTTP bodies
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn status_uses_camel_case_key() {
        let body = serde_json::to_value(StatusResponse { is_connected: true }).unwrap();
        assert_eq!(body, json!({"isConnected": true}));
    }

    #[test]
    fn qr_code_uses_camel_case_key() {
        let body = serde_json::to_value(QrCodeResponse { qr_code: "data:x".into() }).unwrap();
        assert_eq!(body, json!({"qrCode": "data:x"}));
    }

    #[test]
    fn send_request_defaults_missing_fields() {
        let req: SendMessageRequest = serde_json::from_value(json!({"phone": "123"})).unwrap();
        assert_eq!(req.phone, "123");
        assert!(req.message.is_empty());
    }

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_value(ErrorBody::new(GatewayError::QrUnavailable.to_string())).unwrap();
        assert_eq!(body["error"], "QR code not available. Call /api/whatsup/start first.");
    }

    #[test]
    fn routes_share_prefix() {
        for route in [Routes::START, Routes::QR_CODE, Routes::SEND, Routes::STATUS, Routes::LOGOUT] {
            assert!(route.starts_with(Routes::PREFIX));
        }
    }
}
