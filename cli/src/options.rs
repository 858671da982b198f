//! Command-line argument parsing

use svcctl_engine::ServiceId;

/// Default number of records shown by `logs`
pub const DEFAULT_LOG_LIMIT: usize = 20;

/// Arguments shared by every command, plus what is left for the command
#[derive(Debug, Default, PartialEq)]
pub struct GlobalOptions {
    pub config: Option<String>,
    /// Command name followed by its own arguments
    pub rest: Vec<String>,
}

impl GlobalOptions {
    /// Pull `--config PATH` (or `--config=PATH`) out of `args`, which must
    /// not include the program name
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = GlobalOptions::default();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg == "--config" {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a value".to_string());
                }
                opts.config = Some(args[i].clone());
            } else if let Some(path) = arg.strip_prefix("--config=") {
                opts.config = Some(path.to_string());
            } else {
                opts.rest.push(arg.clone());
            }
            i += 1;
        }
        Ok(opts)
    }
}

pub fn parse_id(value: &str) -> Result<ServiceId, String> {
    value
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(ServiceId::new)
        .ok_or_else(|| format!("invalid service id: {}", value))
}

pub fn parse_ids(values: &[String]) -> Result<Vec<ServiceId>, String> {
    values.iter().map(|v| parse_id(v)).collect()
}

/// Options of `logs [id] [--limit N]`
#[derive(Debug, PartialEq)]
pub struct LogsOptions {
    pub service_id: Option<ServiceId>,
    pub limit: usize,
}

impl LogsOptions {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = LogsOptions {
            service_id: None,
            limit: DEFAULT_LOG_LIMIT,
        };
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--limit" => {
                    i += 1;
                    let value = args.get(i).ok_or("--limit requires a value")?;
                    opts.limit = value
                        .parse()
                        .map_err(|_| format!("invalid --limit value: {}", value))?;
                }
                flag if flag.starts_with("--") => return Err(format!("unknown flag: {}", flag)),
                id => {
                    if opts.service_id.is_some() {
                        return Err("logs takes at most one service id".to_string());
                    }
                    opts.service_id = Some(parse_id(id)?);
                }
            }
            i += 1;
        }
        Ok(opts)
    }
}

/// Options of `list [--running|--stopped] [--name TEXT] [--page N] [--page-size N]`
#[derive(Debug, Default, PartialEq)]
pub struct ListOptions {
    pub running: Option<bool>,
    pub name: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl ListOptions {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = ListOptions::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--running" => opts.running = Some(true),
                "--stopped" => opts.running = Some(false),
                "--name" => {
                    i += 1;
                    opts.name = Some(args.get(i).ok_or("--name requires a value")?.clone());
                }
                "--page" => {
                    i += 1;
                    opts.page = Some(parse_count("--page", args.get(i))?);
                }
                "--page-size" => {
                    i += 1;
                    opts.page_size = Some(parse_count("--page-size", args.get(i))?);
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
            i += 1;
        }
        Ok(opts)
    }
}

fn parse_count(flag: &str, value: Option<&String>) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("{} requires a value", flag))?;
    value
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("invalid {} value: {}", flag, value))
}
