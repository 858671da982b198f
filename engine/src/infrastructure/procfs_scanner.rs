//! Procfs Port Scanner
//!
//! Lists TCP listeners from `/proc/net/tcp` and `/proc/net/tcp6`, then maps
//! each listening socket inode to its owning process by walking
//! `/proc/<pid>/fd`. Listeners whose owner cannot be resolved (another user's
//! process without privileges) are reported with pid 0 and no name.
//!
//! Outside Linux there is no procfs and every scan fails.

use crate::domain::ports::PortScanner;
use crate::domain::value_objects::PortOwner;
use crate::domain::DomainError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_ROOT: &str = "/proc";
const TCP_LISTEN: u8 = 0x0A;
const SOCKET_TABLES: [&str; 2] = ["tcp", "tcp6"];

type Inode = u64;

pub struct ProcfsPortScanner {
    root: PathBuf,
}

impl ProcfsPortScanner {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }

    /// Scan a procfs mounted (or faked) somewhere other than `/proc`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcfsPortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortScanner for ProcfsPortScanner {
    async fn scan(&self) -> Result<HashMap<u16, PortOwner>, DomainError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_root(&root))
            .await
            .map_err(|e| DomainError::PortScanFailed(format!("scan task failed: {}", e)))?
    }
}

fn scan_root(root: &Path) -> Result<HashMap<u16, PortOwner>, DomainError> {
    // 1. Listening sockets
    let mut listening: HashMap<Inode, u16> = HashMap::new();
    let mut readable = 0;
    for table in SOCKET_TABLES {
        if let Ok(content) = fs::read_to_string(root.join("net").join(table)) {
            readable += 1;
            parse_socket_table(&content, &mut listening);
        }
    }
    if readable == 0 {
        return Err(DomainError::PortScanFailed(format!(
            "no socket table readable under {}",
            root.display()
        )));
    }

    // 2. Owners
    let mut owners: HashMap<u16, PortOwner> = HashMap::new();
    if !listening.is_empty() {
        resolve_owners(root, &listening, &mut owners);
    }

    // 3. Unresolved listeners still count as in use
    for port in listening.values() {
        owners.entry(*port).or_insert_with(|| PortOwner::new(0, ""));
    }

    debug!(listeners = owners.len(), "Port scan complete");
    Ok(owners)
}

fn resolve_owners(root: &Path, listening: &HashMap<Inode, u16>, owners: &mut HashMap<u16, PortOwner>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };

        let mut name: Option<String> = None;
        for fd in fds.flatten() {
            let Ok(link) = fs::read_link(fd.path()) else {
                continue;
            };
            let Some(port) = socket_inode(&link).and_then(|inode| listening.get(&inode)) else {
                continue;
            };
            let name = name.get_or_insert_with(|| read_comm(&entry.path()));
            // Lowest pid wins when a socket is shared after fork
            owners
                .entry(*port)
                .and_modify(|o| {
                    if pid < o.pid {
                        *o = PortOwner::new(pid, name.clone());
                    }
                })
                .or_insert_with(|| PortOwner::new(pid, name.clone()));
        }
    }
}

fn read_comm(pid_dir: &Path) -> String {
    fs::read_to_string(pid_dir.join("comm"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Inode of a `socket:[12345]` fd link
fn socket_inode(link: &Path) -> Option<Inode> {
    const SOCKET_PREFIX: &str = "socket:[";

    let link = link.to_str()?.strip_prefix(SOCKET_PREFIX)?;
    link.strip_suffix(']')?.parse().ok()
}

/// Collect `inode -> port` for LISTEN rows; the header and bad rows are skipped
fn parse_socket_table(content: &str, result: &mut HashMap<Inode, u16>) {
    for line in content.lines().skip(1) {
        if let Some((inode, port)) = parse_socket_line(line) {
            // inode 0 means the socket is not attached to any process
            if inode != 0 {
                result.insert(inode, port);
            }
        }
    }
}

fn parse_socket_line(line: &str) -> Option<(Inode, u16)> {
    let mut fields = line.split_whitespace();
    let local_address = fields.nth(1)?; // field 1: local address
    let state = fields.nth(1)?; // field 3: state
    let inode = fields.nth(5)?; // field 9: inode

    if u8::from_str_radix(state, 16).ok()? != TCP_LISTEN {
        return None;
    }
    let (_, port) = local_address.rsplit_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let inode = inode.parse().ok()?;
    Some((inode, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 4242 1 0000000000000000 100 0 0 10 0
   1: 0100007F:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 777 1 0000000000000000 100 0 0 10 0
   2: 0100007F:9C40 0100007F:1F90 01 00000000:00000000 00:00000000 00000000  1000        0 999 1 0000000000000000 20 4 30 10 -1
";

    const TCP6: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:1F91 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 5151 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn test_parse_socket_table() {
        let mut result = HashMap::new();
        parse_socket_table(TCP, &mut result);
        parse_socket_table(TCP6, &mut result);

        assert_eq!(result.get(&4242), Some(&8080));
        assert_eq!(result.get(&777), Some(&22));
        assert_eq!(result.get(&5151), Some(&8081));
        // ESTABLISHED rows are ignored
        assert!(!result.contains_key(&999));
    }

    #[test]
    fn test_socket_inode() {
        assert_eq!(socket_inode(Path::new("socket:[4242]")), Some(4242));
        assert_eq!(socket_inode(Path::new("pipe:[4242]")), None);
        assert_eq!(socket_inode(Path::new("/var/log/app.log")), None);
    }

    #[cfg(unix)]
    fn fake_process(root: &Path, pid: u32, comm: &str, sockets: &[u64]) {
        let fd_dir = root.join(pid.to_string()).join("fd");
        fs::create_dir_all(&fd_dir).unwrap();
        fs::write(root.join(pid.to_string()).join("comm"), format!("{}\n", comm)).unwrap();
        for (i, inode) in sockets.iter().enumerate() {
            std::os::unix::fs::symlink(format!("socket:[{}]", inode), fd_dir.join((i + 3).to_string()))
                .unwrap();
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_fake_procfs() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("net")).unwrap();
        fs::write(root.path().join("net/tcp"), TCP).unwrap();
        fs::write(root.path().join("net/tcp6"), TCP6).unwrap();

        fake_process(root.path(), 321, "nginx", &[4242]);
        fake_process(root.path(), 654, "java", &[5151, 12]);
        fake_process(root.path(), 900, "nginx", &[4242]);

        let owners = ProcfsPortScanner::with_root(root.path()).scan().await.unwrap();

        assert_eq!(owners.get(&8080), Some(&PortOwner::new(321, "nginx")));
        assert_eq!(owners.get(&8081), Some(&PortOwner::new(654, "java")));
        // sshd belongs to root and is not visible
        assert_eq!(owners.get(&22), Some(&PortOwner::new(0, "")));
        assert_eq!(owners.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_procfs_fails() {
        let root = tempfile::tempdir().unwrap();
        let result = ProcfsPortScanner::with_root(root.path().join("absent"))
            .scan()
            .await;
        assert!(matches!(result, Err(DomainError::PortScanFailed(_))));
    }
}
