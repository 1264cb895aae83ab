use serde_json::json;
use sync_core::{ProtocolError, ScriptCommand, ScriptEvent};

#[test]
fn events_decode_from_tagged_json() {
    assert_eq!(
        ScriptEvent::decode(r#"{"type":"progress","total":20,"current":3}"#).unwrap(),
        ScriptEvent::Progress {
            total: 20,
            current: 3
        }
    );
    assert_eq!(
        ScriptEvent::decode(r#"{"type":"complete","message":"done","total":5}"#).unwrap(),
        ScriptEvent::Complete {
            message: "done".to_string(),
            total: 5
        }
    );
    assert_eq!(
        ScriptEvent::decode(r#"{"type":"stopped"}"#).unwrap(),
        ScriptEvent::Stopped
    );

    let event = ScriptEvent::decode(r#"{"type":"data","data":{"id":"1","title":"t"}}"#).unwrap();
    assert_eq!(
        event,
        ScriptEvent::Data {
            data: json!({"id": "1", "title": "t"})
        }
    );
}

#[test]
fn unknown_or_malformed_messages_are_protocol_errors() {
    assert!(matches!(
        ScriptEvent::decode(r#"{"type":"teleport"}"#),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(
        ScriptEvent::decode(r#"{"type":"progress","total":"many"}"#),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(
        ScriptEvent::decode("not json"),
        Err(ProtocolError::Malformed(_))
    ));
}

#[test]
fn commands_encode_and_decode() {
    for command in [
        ScriptCommand::Start,
        ScriptCommand::Pause,
        ScriptCommand::Resume,
        ScriptCommand::Stop,
    ] {
        let encoded = command.encode();
        assert_eq!(ScriptCommand::decode(&encoded).unwrap(), command);
    }
    assert_eq!(ScriptCommand::Pause.encode(), r#"{"type":"pause"}"#);
}

#[test]
fn event_encoding_carries_type_tag() {
    let encoded = ScriptEvent::Error {
        message: "not on expected page".to_string(),
    }
    .encode()
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["message"], "not on expected page");
}
