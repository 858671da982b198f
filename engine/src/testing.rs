//! Simulated host for tests
//!
//! One in-memory listener table backs the probe, the scanner, the command
//! runner and the signaller, so commands "start" services by binding ports
//! and signals "stop" them by releasing ports. Enabled for unit tests and,
//! with the `test-helpers` feature, for integration tests.

use crate::application::Adapters;
use crate::domain::ports::{
    CommandOutput, CommandRequest, CommandRunner, LogQuery, LogStore, PortProbe, PortScanner,
    ProcessSignaller, ServiceRepository, Signal,
};
use crate::domain::value_objects::{ControllerSettings, PortOwner};
use crate::domain::DomainError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What a scripted command does to the simulated host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start listening on `port` as process `pid`
    Bind { port: u16, pid: u32, name: String },
    /// Close whatever listens on `port`
    Release { port: u16 },
    /// Print `output`
    Print(String),
    /// Exit with `code` (0 when absent)
    Exit(i32),
    /// Run until the caller's timeout
    Hang,
}

impl Effect {
    pub fn bind(port: u16, pid: u32) -> Self {
        Effect::Bind {
            port,
            pid,
            name: "server".to_string(),
        }
    }
}

#[derive(Default)]
struct State {
    listeners: HashMap<u16, PortOwner>,
    scripts: HashMap<String, Vec<Effect>>,
    ignores_sigterm: HashSet<u32>,
    executed: Vec<String>,
    signals: Vec<(u32, Signal)>,
    run_delay: Duration,
}

pub struct SimulatedHost {
    state: Mutex<State>,
    own_pid: u32,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    scans: AtomicU64,
}

impl SimulatedHost {
    pub const OWN_PID: u32 = 999_999;

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            own_pid: Self::OWN_PID,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            scans: AtomicU64::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Setup

    pub fn listen(&self, port: u16, pid: u32, name: &str) {
        self.state().listeners.insert(port, PortOwner::new(pid, name));
    }

    pub fn release(&self, port: u16) {
        self.state().listeners.remove(&port);
    }

    /// Effects of `command`, matched against the normalised command line
    pub fn script(&self, command: &str, effects: Vec<Effect>) {
        self.state().scripts.insert(command.to_string(), effects);
    }

    /// `pid` survives SIGTERM and only dies on SIGKILL
    pub fn ignore_sigterm(&self, pid: u32) {
        self.state().ignores_sigterm.insert(pid);
    }

    /// Time every command takes before its effects apply
    pub fn set_run_delay(&self, delay: Duration) {
        self.state().run_delay = delay;
    }

    // Observations

    pub fn is_bound(&self, port: u16) -> bool {
        self.state().listeners.contains_key(&port)
    }

    pub fn owner(&self, port: u16) -> Option<PortOwner> {
        self.state().listeners.get(&port).cloned()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.state().signals.clone()
    }

    /// Most commands ever running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    /// Adapters backed by this host plus the given repository and log store
    pub fn adapters<S>(self: &Arc<Self>, repository: Arc<dyn ServiceRepository>, store: Arc<S>) -> Adapters
    where
        S: LogStore + LogQuery + 'static,
    {
        Adapters {
            repository,
            probe: self.clone(),
            scanner: self.clone(),
            runner: self.clone(),
            signaller: self.clone(),
            log_store: store.clone(),
            log_query: store,
        }
    }
}

/// Short waits so simulated transitions settle in milliseconds
pub fn fast_settings() -> ControllerSettings {
    ControllerSettings {
        snapshot_ttl: Duration::from_millis(20),
        probe_timeout: Duration::from_millis(5),
        command_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(10),
        start_wait: Duration::from_millis(200),
        stop_wait: Duration::from_millis(200),
        port_free_wait: Duration::from_millis(200),
        port_free_poll: Duration::from_millis(10),
        kill_grace: Duration::from_millis(50),
        operation_deadline: Duration::from_secs(5),
        batch_concurrency: 2,
        batch_unit_timeout: Duration::from_secs(5),
        allow_shell_operators: false,
        max_output_bytes: 10_000,
    }
}

#[async_trait]
impl PortProbe for SimulatedHost {
    async fn is_listening(&self, port: u16, _timeout: Duration) -> bool {
        self.is_bound(port)
    }
}

#[async_trait]
impl PortScanner for SimulatedHost {
    async fn scan(&self) -> Result<HashMap<u16, PortOwner>, DomainError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.state().listeners.clone())
    }
}

#[async_trait]
impl ProcessSignaller for SimulatedHost {
    async fn signal(&self, pid: u32, signal: Signal) -> Result<(), DomainError> {
        let mut state = self.state();
        state.signals.push((pid, signal));
        if signal == Signal::Kill || !state.ignores_sigterm.contains(&pid) {
            state.listeners.retain(|_, owner| owner.pid != pid);
        }
        Ok(())
    }

    fn current_pid(&self) -> u32 {
        self.own_pid
    }
}

#[async_trait]
impl CommandRunner for SimulatedHost {
    async fn run(&self, request: CommandRequest) -> Result<CommandOutput, DomainError> {
        let command = request.invocation.command_line();
        let (effects, delay) = {
            let mut state = self.state();
            state.executed.push(command.clone());
            (
                state.scripts.get(&command).cloned().unwrap_or_default(),
                state.run_delay,
            )
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;

        let mut outcome = CommandOutput {
            output: String::new(),
            exit_code: Some(0),
            timed_out: false,
        };
        for effect in effects {
            match effect {
                Effect::Bind { port, pid, name } => {
                    self.state().listeners.insert(port, PortOwner::new(pid, name));
                }
                Effect::Release { port } => self.release(port),
                Effect::Print(text) => outcome.output.push_str(&text),
                Effect::Exit(code) => outcome.exit_code = Some(code),
                Effect::Hang => {
                    tokio::time::sleep(request.timeout).await;
                    outcome.exit_code = None;
                    outcome.timed_out = true;
                    break;
                }
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Invocation;

    #[tokio::test]
    async fn test_scripted_command_binds_port() {
        let host = SimulatedHost::new();
        host.script(
            "./start.sh",
            vec![Effect::bind(8080, 42), Effect::Print("up".to_string())],
        );

        let outcome = host
            .run(CommandRequest {
                invocation: Invocation::Direct {
                    program: "./start.sh".to_string(),
                    args: vec![],
                },
                work_dir: None,
                timeout: Duration::from_secs(1),
                output_limit: 1024,
            })
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.output, "up");
        assert_eq!(host.owner(8080), Some(PortOwner::new(42, "server")));
        assert_eq!(host.executed(), vec!["./start.sh".to_string()]);
    }

    #[tokio::test]
    async fn test_sigterm_can_be_ignored() {
        let host = SimulatedHost::new();
        host.listen(8080, 42, "java");
        host.ignore_sigterm(42);

        host.signal(42, Signal::Terminate).await.unwrap();
        assert!(host.is_bound(8080));
        host.signal(42, Signal::Kill).await.unwrap();
        assert!(!host.is_bound(8080));
    }
}
