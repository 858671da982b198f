use crate::formatters::{format_optional, format_state, format_status, format_timestamp, truncate};
use crate::options::{parse_id, parse_ids, ListOptions, LogsOptions};
use colored::*;
use std::io::Write;
use svcctl_engine::domain::services::ServiceFilter;
use svcctl_engine::domain::BatchReport;
use svcctl_engine::{Operation, ServiceManager};
use tabwriter::TabWriter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub async fn handle_list(manager: &ServiceManager, args: &[String]) -> CliResult {
    let opts = ListOptions::parse(args)?;
    let defaults = ServiceFilter::default();
    let filter = ServiceFilter {
        name_contains: opts.name,
        running: opts.running,
        page: opts.page.unwrap_or(defaults.page),
        page_size: opts.page_size.unwrap_or(defaults.page_size),
    };
    let list = manager.list_with_status(&filter).await?;

    if list.items.is_empty() {
        println!("No services");
        return Ok(());
    }

    // State goes last: colour codes would skew the column widths
    let mut tw = TabWriter::new(std::io::stdout()).padding(2);
    writeln!(tw, "ID\tNAME\tPORT\tPID\tPROCESS\tSTART COMMAND\tSTATE")?;
    for status in &list.items {
        let definition = &status.definition;
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            definition.id(),
            definition.name(),
            definition.port(),
            format_optional(status.pid),
            format_optional(status.process_name.as_deref()),
            truncate(definition.start_cmd().unwrap_or("-"), 32),
            format_state(status.running),
        )?;
    }
    tw.flush()?;

    println!(
        "\nPage {} ({} of {} services)",
        list.page,
        list.items.len(),
        list.total
    );
    Ok(())
}

pub async fn handle_status(manager: &ServiceManager, args: &[String]) -> CliResult {
    let [id] = args else {
        eprintln!("usage: svcctl status <id>");
        return Ok(());
    };
    let status = manager.get_status(parse_id(id)?).await?;
    let definition = &status.definition;

    println!("{}", definition.name().bold());
    println!("  ID:            {}", definition.id());
    if !definition.title().is_empty() {
        println!("  Title:         {}", definition.title());
    }
    println!("  Port:          {}", definition.port());
    println!("  State:         {}", format_state(status.running));
    println!("  PID:           {}", format_optional(status.pid));
    println!(
        "  Process:       {}",
        format_optional(status.process_name.as_deref())
    );
    println!("  Work dir:      {}", definition.work_dir());
    println!(
        "  Start:         {}",
        format_optional(definition.start_cmd())
    );
    println!("  Stop:          {}", format_optional(definition.stop_cmd()));
    println!(
        "  Restart:       {}",
        format_optional(definition.restart_cmd())
    );
    if let Some(url) = definition.health_check_url() {
        println!("  Health check:  {}", url);
    }
    if !definition.remark().is_empty() {
        println!("  Remark:        {}", definition.remark());
    }
    println!("  Created:       {}", format_timestamp(definition.created_at()));
    println!("  Updated:       {}", format_timestamp(definition.updated_at()));
    Ok(())
}

/// `start`, `stop`, `restart`, `force-restart` and `kill` on one service
pub async fn handle_lifecycle(
    manager: &ServiceManager,
    operation: Operation,
    args: &[String],
) -> CliResult {
    let [id] = args else {
        eprintln!("usage: svcctl {} <id>", operation.as_str().replace('_', "-"));
        return Ok(());
    };
    let id = parse_id(id)?;

    match manager.execute(operation, id).await {
        Ok(output) => {
            println!("{} {} service {}", "[OK]".green(), operation, id);
            print_output(&output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red(), e);
            if let Some(output) = e.output().filter(|o| !o.is_empty()) {
                print_output(output);
            }
            Err(e.into())
        }
    }
}

pub async fn handle_batch(manager: &ServiceManager, args: &[String]) -> CliResult {
    if args.len() < 2 {
        eprintln!("usage: svcctl batch <operation> <id>...");
        return Ok(());
    }
    let ids = parse_ids(&args[1..])?;
    let report = manager.batch_operation(&ids, &args[0]).await;
    print_report(&report)
}

pub async fn handle_start_all(manager: &ServiceManager) -> CliResult {
    let report = manager.start_all().await?;
    print_report(&report)
}

pub async fn handle_stop_all(manager: &ServiceManager) -> CliResult {
    let report = manager.stop_all().await?;
    print_report(&report)
}

pub async fn handle_restart_all(manager: &ServiceManager) -> CliResult {
    let report = manager.restart_all().await?;
    print_report(&report)
}

pub async fn handle_logs(manager: &ServiceManager, args: &[String]) -> CliResult {
    let opts = LogsOptions::parse(args)?;
    let records = manager.recent_operations(opts.service_id, opts.limit).await?;

    if records.is_empty() {
        println!("No operations recorded");
        return Ok(());
    }

    let mut tw = TabWriter::new(std::io::stdout()).padding(2);
    writeln!(tw, "TIME\tSERVICE\tOPERATION\tDURATION\tDETAIL\tSTATUS")?;
    for record in &records {
        let detail = if record.error_message.is_empty() {
            &record.output
        } else {
            &record.error_message
        };
        writeln!(
            tw,
            "{}\t{}\t{}\t{}ms\t{}\t{}",
            format_timestamp(record.timestamp),
            record.service_id,
            record.operation,
            record.duration_ms,
            truncate(detail, 48),
            format_status(record.status),
        )?;
    }
    tw.flush()?;
    Ok(())
}

/// `prune [days]`: drop operation records older than `days` (default from config)
pub async fn handle_prune(manager: &ServiceManager, args: &[String], default_days: u32) -> CliResult {
    let days: u32 = match args {
        [] => default_days,
        [days] => days
            .parse()
            .map_err(|_| format!("invalid number of days: {}", days))?,
        _ => {
            eprintln!("usage: svcctl prune [days]");
            return Ok(());
        }
    };
    let removed = manager.prune_operations(days).await?;
    println!("{} Removed {} records older than {} days", "[OK]".green(), removed, days);
    Ok(())
}

pub async fn handle_ports(manager: &ServiceManager) -> CliResult {
    let snapshot = manager.port_snapshot().await?;
    let mut entries = snapshot.entries();
    entries.sort_by_key(|(port, _)| *port);

    if entries.is_empty() {
        println!("No listening ports");
        return Ok(());
    }

    let mut tw = TabWriter::new(std::io::stdout()).padding(2);
    writeln!(tw, "PORT\tPID\tPROCESS")?;
    for (port, owner) in entries {
        let pid = if owner.pid == 0 {
            "-".to_string()
        } else {
            owner.pid.to_string()
        };
        let name = if owner.process_name.is_empty() {
            "-"
        } else {
            owner.process_name.as_str()
        };
        writeln!(tw, "{}\t{}\t{}", port, pid, name)?;
    }
    tw.flush()?;
    Ok(())
}

pub async fn handle_summary(manager: &ServiceManager) -> CliResult {
    let summary = manager.summary().await?;
    println!("Services: {}", summary.total);
    println!("  {} {}", "running:".green(), summary.running);
    println!("  {} {}", "stopped:".yellow(), summary.stopped);

    let logs = manager.operation_stats().await?;
    println!("Operations: {} ({} today)", logs.total, logs.today);
    println!("  {} {}", "success:".green(), logs.success);
    println!("  {} {}", "failed:".red(), logs.failed);
    if !logs.by_operation.is_empty() {
        let mut tw = TabWriter::new(std::io::stdout()).padding(2);
        for (operation, count) in &logs.by_operation {
            writeln!(tw, "  {}\t{}", operation, count)?;
        }
        tw.flush()?;
    }

    let stats = manager.pipeline_stats();
    println!("Log pipeline:");
    println!("  Written:         {}", stats.records_written);
    println!("  Fallback writes: {}", stats.fallback_writes);
    println!("  Lost:            {}", stats.records_lost);
    Ok(())
}

fn print_output(output: &str) {
    for line in output.lines() {
        println!("  {}", line);
    }
}

fn print_report(report: &BatchReport) -> CliResult {
    let mut tw = TabWriter::new(std::io::stdout()).padding(2);
    writeln!(tw, "SERVICE\tDETAIL\tRESULT")?;
    for result in &report.results {
        let (detail, outcome) = if result.skipped {
            (result.output.clone(), "skipped".cyan())
        } else if result.success {
            (result.output.clone(), "ok".green())
        } else {
            (
                result.error.clone().unwrap_or_default(),
                "failed".red(),
            )
        };
        writeln!(
            tw,
            "{}\t{}\t{}",
            result.service_id,
            truncate(&detail, 60),
            outcome
        )?;
    }
    tw.flush()?;

    println!(
        "\n{}: {} total, {} succeeded, {} failed",
        report.operation, report.total, report.success_count, report.failed_count
    );
    if report.failed_count > 0 {
        return Err(format!("{} of {} operations failed", report.failed_count, report.total).into());
    }
    Ok(())
}
