use chrono::Utc;
use oxichat::domain::entities::{ConnectionCriteria, ConnectionRole, ConnectionUser};
use oxichat::domain::events::DomainEvent;
use oxichat::domain::ports::connection_repository::ConnectionRepository;
use oxichat::infrastructure::persistence::InMemoryConnectionRegistry;
use tokio_stream::StreamExt;

mod helpers;
use helpers::*;

#[tokio::test]
async fn test_reconnect_supersedes_previous_socket() {
    let registry = InMemoryConnectionRegistry::new();
    let user = ConnectionUser::new("visitor-1", [ConnectionRole::Visitor]);

    let (first, _) = user.connect("S1", Utc::now());
    registry.save(&first).await.unwrap();
    let (second, _) = first.connect("S2", Utc::now());
    registry.save(&second).await.unwrap();

    let by_old = registry
        .find_one(&ConnectionCriteria::by_socket("S1"))
        .await
        .unwrap();
    assert!(by_old.is_none());

    let by_new = registry
        .find_one(&ConnectionCriteria::by_socket("S2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_new.user_id(), "visitor-1");

    let all = registry
        .find(&ConnectionCriteria::by_user("visitor-1"))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_remove_clears_both_indexes() {
    let registry = InMemoryConnectionRegistry::new();
    let (user, _) = ConnectionUser::new("u1", [ConnectionRole::Commercial]).connect("S1", Utc::now());
    registry.save(&user).await.unwrap();

    registry.remove("u1").await.unwrap();
    assert!(registry
        .find_one(&ConnectionCriteria::by_socket("S1"))
        .await
        .unwrap()
        .is_none());
    assert!(registry
        .find_one(&ConnectionCriteria::by_user("u1"))
        .await
        .unwrap()
        .is_none());

    // removing twice is fine
    registry.remove("u1").await.unwrap();
}

#[tokio::test]
async fn test_role_queries_only_return_connected_users() {
    let h = Harness::new();
    h.connect("agent-1", "s1", ConnectionRole::Commercial).await;
    h.connect("agent-2", "s2", ConnectionRole::Commercial).await;
    h.connect("visitor-1", "s3", ConnectionRole::Visitor).await;
    h.connections.on_disconnect("s2").await.unwrap();

    let agents = h
        .connections
        .connected_with_role(ConnectionRole::Commercial)
        .await
        .unwrap();
    let ids: Vec<_> = agents.iter().map(|u| u.user_id().to_string()).collect();
    assert_eq!(ids, vec!["agent-1".to_string()]);
}

#[tokio::test]
async fn test_presence_events_in_order() {
    let h = Harness::new();
    let mut events = h.subscribe();

    h.connect("u1", "s1", ConnectionRole::Visitor).await;
    h.connections.on_disconnect("s1").await.unwrap();

    let connected = events.next().await.unwrap().unwrap();
    let disconnected = events.next().await.unwrap().unwrap();
    assert!(matches!(connected, DomainEvent::Connected { ref socket_id, .. } if socket_id == "s1"));
    assert!(matches!(
        disconnected,
        DomainEvent::Disconnected { socket_id: Some(ref s), .. } if s == "s1"
    ));
}

#[tokio::test]
async fn test_concurrent_reconnects_leave_one_mapping() {
    let h = Harness::new();

    let attempts = (0..20).map(|i| {
        let connections = h.connections.clone();
        tokio::spawn(async move {
            connections
                .on_connect("u1", &format!("s{}", i), vec![ConnectionRole::Visitor])
                .await
                .unwrap();
        })
    });
    for handle in attempts.collect::<Vec<_>>() {
        handle.await.unwrap();
    }

    let user = h.connections.find_user("u1").await.unwrap().unwrap();
    let socket = user.socket_id().unwrap().to_string();

    let mut owners = 0;
    for i in 0..20 {
        let found = h
            .registry
            .find_one(&ConnectionCriteria::by_socket(format!("s{}", i)))
            .await
            .unwrap();
        if let Some(found) = found {
            assert_eq!(found.socket_id(), Some(socket.as_str()));
            owners += 1;
        }
    }
    assert_eq!(owners, 1);
}
