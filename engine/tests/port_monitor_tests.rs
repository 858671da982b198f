//! Port monitoring against real sockets

use std::sync::Arc;
use std::time::Duration;
use svcctl_engine::domain::services::PortMonitor;
use svcctl_engine::domain::Port;
use svcctl_engine::infrastructure::{ProcfsPortScanner, TcpPortProbe};
use svcctl_engine::DomainError;
use tokio::net::TcpListener;

const TTL: Duration = Duration::from_millis(50);

fn monitor() -> PortMonitor {
    PortMonitor::new(
        Arc::new(TcpPortProbe::new()),
        Arc::new(ProcfsPortScanner::new()),
        TTL,
        Duration::from_millis(50),
    )
}

#[tokio::test]
async fn test_port_in_use_follows_listener() {
    let monitor = monitor();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    assert!(monitor.is_port_in_use(&port).await.unwrap());

    drop(listener);
    tokio::time::sleep(TTL).await;
    assert!(!monitor.is_port_in_use(&port).await.unwrap());
}

#[tokio::test]
async fn test_malformed_ports_rejected() {
    let monitor = monitor();
    for port in ["0", "65536", "-1", "http", ""] {
        assert!(
            matches!(monitor.is_port_in_use(port).await, Err(DomainError::InvalidPort(_))),
            "{:?} should be rejected",
            port
        );
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_snapshot_names_our_own_listener() {
    let monitor = monitor();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = Port::new(listener.local_addr().unwrap().port() as u32).unwrap();

    let owner = monitor
        .owner_of(port)
        .await
        .unwrap()
        .expect("listener should appear in the snapshot");
    assert_eq!(owner.pid, std::process::id());

    drop(listener);
    monitor.invalidate_cache().await;
    assert!(monitor.owner_of(port).await.unwrap().is_none());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_concurrent_snapshots_share_one_scan() {
    let monitor = Arc::new(PortMonitor::new(
        Arc::new(TcpPortProbe::new()),
        Arc::new(ProcfsPortScanner::new()),
        Duration::from_secs(10),
        Duration::from_millis(50),
    ));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let monitor = monitor.clone();
        tasks.push(tokio::spawn(async move { monitor.snapshot().await.is_ok() }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(monitor.scan_count(), 1);
}
