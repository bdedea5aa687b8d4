//! Integration tests for mapping raw hop failures to onion errors

use common::crypto::SecretKey;
use common::onion::{map_path_http_error, ErrorStatus, OnionError};
use common::path::{Destination, ServerDestination};
use common::testkit::{nodes, path_of};

fn server_destination() -> Destination {
    Destination::Server(ServerDestination {
        host: "open.example.org".to_string(),
        scheme: "https".to_string(),
        port: 443,
        target: "/oxen/v4/lsrpc".to_string(),
        x25519_public_key: SecretKey::generate().x25519_public(),
    })
}

#[test]
fn test_next_node_not_found_names_destination() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());

    let status = ErrorStatus::with_body(
        502,
        format!("Next node not found: {}", n[3].public_key().to_hex()),
    );
    let error = map_path_http_error(&n[2], status, &path, &destination);

    assert!(matches!(error, OnionError::DestinationUnreachable { .. }));
    assert_eq!(error.destination(), &destination);
    assert_eq!(error.status().code, 502);
}

#[test]
fn test_next_node_not_found_names_intermediate_trimmed() {
    let n = nodes(5);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());
    let other = n[4].public_key().to_hex();

    let status = ErrorStatus::with_body(502, format!("Next node not found:   {}  \n", other));
    match map_path_http_error(&n[1], status, &path, &destination) {
        OnionError::IntermediateNodeUnreachable {
            failed_public_key, ..
        } => assert_eq!(failed_public_key, other),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_next_node_not_found_with_server_destination() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let key = n[3].public_key().to_hex();

    let status = ErrorStatus::with_body(502, format!("Next node not found: {}", key));
    let error = map_path_http_error(&n[2], status, &path, &server_destination());
    assert!(matches!(
        error,
        OnionError::IntermediateNodeUnreachable { ref failed_public_key, .. } if *failed_public_key == key
    ));
}

#[test]
fn test_next_node_unreachable() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());
    let key = n[2].public_key().to_hex();

    let status = ErrorStatus::with_body(502, format!("Next node is currently unreachable: {}", key));
    let error = map_path_http_error(&n[1], status, &path, &destination);
    assert!(matches!(
        error,
        OnionError::IntermediateNodeUnreachable { ref failed_public_key, .. } if *failed_public_key == key
    ));
}

#[test]
fn test_not_ready_blames_reporting_hop() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());

    for body in ["Service node is not ready: syncing", "Server busy, try again later"] {
        let status = ErrorStatus::with_body(503, body);
        match map_path_http_error(&n[1], status, &path, &destination) {
            OnionError::SnodeNotReady {
                failed_public_key, ..
            } => assert_eq!(failed_public_key, n[1].public_key().to_hex()),
            other => panic!("unexpected {:?} for {:?}", other, body),
        }
    }
}

#[test]
fn test_snode_not_ready_names_node() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());
    let key = n[3].public_key().to_hex();

    let status = ErrorStatus::with_body(503, format!("Snode not ready: {}", key));
    match map_path_http_error(&n[2], status, &path, &destination) {
        OnionError::SnodeNotReady {
            failed_public_key, ..
        } => assert_eq!(failed_public_key, key),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_timeouts() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());

    let timed_out = map_path_http_error(
        &n[0],
        ErrorStatus::with_body(504, "Request time out"),
        &path,
        &destination,
    );
    assert!(matches!(timed_out, OnionError::PathTimedOut { .. }));

    let other = map_path_http_error(
        &n[0],
        ErrorStatus::with_body(504, "Gateway Timeout"),
        &path,
        &destination,
    );
    assert!(matches!(other, OnionError::PathError { .. }));
}

#[test]
fn test_invalid_hop_response() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());

    let invalid = map_path_http_error(
        &n[1],
        ErrorStatus::with_body(500, "Invalid response from snode"),
        &path,
        &destination,
    );
    assert!(matches!(invalid, OnionError::InvalidHopResponse { .. }));

    let other = map_path_http_error(
        &n[1],
        ErrorStatus::with_body(500, "Internal Server Error"),
        &path,
        &destination,
    );
    assert!(matches!(other, OnionError::PathError { .. }));
}

#[test]
fn test_unknown_and_malformed_fall_back_to_path_error() {
    let n = nodes(4);
    let path = path_of(&n[0..3]);
    let destination = Destination::Snode(n[3].clone());

    let cases: Vec<ErrorStatus> = vec![
        ErrorStatus::with_body(418, "I'm a teapot"),
        ErrorStatus::with_body(502, vec![0xff, 0xfe, 0x00, 0x9c]),
        ErrorStatus::with_body(502, "Next node not found: "),
        ErrorStatus::with_body(503, "maintenance"),
        ErrorStatus::new(0, ""),
    ];
    for status in cases {
        let code = status.code;
        let error = map_path_http_error(&n[0], status, &path, &destination);
        assert!(
            matches!(error, OnionError::PathError { .. }),
            "{} mapped to {:?}",
            code,
            error
        );
    }
}
