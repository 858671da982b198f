mod commands;
mod formatters;
mod options;

use options::GlobalOptions;
use std::env;
use svcctl_engine::infrastructure::{init_tracing, ConfigLocation};
use svcctl_engine::{Operation, ServiceManager};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let opts = GlobalOptions::parse(&args)?;

    let Some((cmd, rest)) = opts.rest.split_first() else {
        print_usage();
        return Ok(());
    };
    if matches!(cmd.as_str(), "help" | "-h" | "--help") {
        print_usage();
        return Ok(());
    }

    init_tracing();

    let location = ConfigLocation::resolve(opts.config.as_deref());
    debug!(path = %location.path.display(), explicit = location.explicit, "Loading configuration");
    let config = location.load()?;
    let manager = ServiceManager::from_config(&config).await?;

    let result = if cmd == "prune" {
        commands::handle_prune(&manager, rest, config.retention_days()).await
    } else {
        dispatch(&manager, cmd, rest).await
    };

    // Flush queued operation records before exiting
    manager.shutdown().await;
    result
}

async fn dispatch(
    manager: &ServiceManager,
    cmd: &str,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(operation) = Operation::parse(cmd) {
        return commands::handle_lifecycle(manager, operation, args).await;
    }

    match cmd {
        "list" | "ls" => commands::handle_list(manager, args).await,
        "status" => commands::handle_status(manager, args).await,
        "batch" => commands::handle_batch(manager, args).await,
        "start-all" => commands::handle_start_all(manager).await,
        "stop-all" => commands::handle_stop_all(manager).await,
        "restart-all" => commands::handle_restart_all(manager).await,
        "logs" => commands::handle_logs(manager, args).await,
        "ports" => commands::handle_ports(manager).await,
        "summary" => commands::handle_summary(manager).await,
        _ => {
            eprintln!("unknown command: {}", cmd);
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    eprintln!("Port-based service controller");
    eprintln!();
    eprintln!("Usage: svcctl [--config PATH] <command> [args...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list [--running|--stopped] [--name TEXT] [--page N] [--page-size N]");
    eprintln!("                                     List services with their live state (alias: ls)");
    eprintln!("  status <id>                        Show one service");
    eprintln!("  start <id>                         Start a service and wait for its port");
    eprintln!("  stop <id>                          Stop a service and wait for its port to free");
    eprintln!("  restart <id>                       Restart a service");
    eprintln!("  force-restart <id>                 Kill whatever holds the port, then start");
    eprintln!("  kill <id>                          Terminate the port owner (SIGTERM, then SIGKILL)");
    eprintln!("  batch <operation> <id>...          Run one operation on several services");
    eprintln!("  start-all                          Start every stopped service");
    eprintln!("  stop-all                           Stop every running service");
    eprintln!("  restart-all                        Restart every running service");
    eprintln!("  logs [id] [--limit N]              Show recent operations, newest first");
    eprintln!("  prune [days]                       Drop operation records older than days");
    eprintln!("  ports                              Show listening ports and their owners");
    eprintln!("  summary                            Show service counts, operation totals and log pipeline stats");
    eprintln!();
    eprintln!("Environment Variables:");
    eprintln!("  SVCCTL_CONFIG       Configuration file (default: /etc/svcctl/services.yaml)");
    eprintln!("  SVCCTL_LOG_PATH     Operation log file (JSON lines)");
    eprintln!("  SVCCTL_LOG_LEVEL    Diagnostic log level (falls back to RUST_LOG, then info)");
}
