//! Integration tests for the clipsync-core public surface.
//!
//! These exercise the crate-root re-exports the way the client crate uses
//! them: identity loaded from a TOML fragment, kinds decoded from opcodes,
//! and containers built for the fan-out.

use clipsync_core::{ConnectivityState, EndpointIdentity, MessageContainer, MessageKind};

#[test]
fn test_identity_deserializes_from_toml_fragment() {
    // Arrange
    let fragment = r#"
server_url = "ws://10.0.0.2:8090/ws"
system_name = "windows"
device_name = "office-pc"
"#;

    // Act
    let id: EndpointIdentity = toml::from_str(fragment).expect("deserialize identity");

    // Assert
    assert_eq!(id, EndpointIdentity::new("ws://10.0.0.2:8090/ws", "windows", "office-pc"));
}

#[test]
fn test_data_frames_decoded_from_opcodes_are_forwardable() {
    // Opcodes 1 and 2 carry application data; everything else is control.
    let data: Vec<MessageKind> = (0u8..=0x0F)
        .filter_map(|code| MessageKind::try_from(code).ok())
        .filter(|kind| kind.is_data())
        .collect();

    assert_eq!(data, vec![MessageKind::Text, MessageKind::Binary]);
}

#[test]
fn test_container_kind_survives_clone_across_fan_out() {
    let msg = MessageContainer::text("copied on laptop");
    let delivered: Vec<MessageContainer> = (0..3).map(|_| msg.clone()).collect();

    assert!(delivered.iter().all(|m| m == &msg));
    assert!(delivered.iter().all(|m| m.kind() == MessageKind::Text));
}

#[test]
fn test_connectivity_state_round_trips_through_toml_value() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Snapshot {
        state: ConnectivityState,
    }

    let text = toml::to_string(&Snapshot {
        state: ConnectivityState::Connecting,
    })
    .expect("serialize");
    let back: Snapshot = toml::from_str(&text).expect("deserialize");

    assert_eq!(back.state, ConnectivityState::Connecting);
}
