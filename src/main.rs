use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vendor_relay::archive::Archiver;
use vendor_relay::config::{Config, MailConfig};
use vendor_relay::dispatch::{Dispatcher, SubprocessExecutor};
use vendor_relay::mail::{ImapSource, InboxListener, InboxObserver};
use vendor_relay::queue::{JobQueue, QueueingObserver};
use vendor_relay::reports;
use vendor_relay::runlog::RunLog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `vendor-relay report <log-dir>` prints scraped worker-log tables and
    // exits; everything else runs the listener daemon.
    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        if command == "report" {
            let dir = args.next().context("usage: vendor-relay report <log-dir>")?;
            return run_report(Path::new(&dir));
        }
        anyhow::bail!("unknown command: {command} (expected no arguments or `report <log-dir>`)");
    }

    // Install rustls crypto provider before any TLS usage.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export RELAY_WORKER_CMD=\"/path/to/worker --mode=worker\"");
        std::process::exit(1);
    });

    let Some(mail_config) = MailConfig::from_env() else {
        eprintln!("Error: RELAY_IMAP_HOST not set");
        eprintln!("  export RELAY_IMAP_HOST=imap.example.com");
        std::process::exit(1);
    };

    // Tracing: human console output plus a daily rolling file in the log dir.
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "relay.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    eprintln!("vendor-relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {} on {}", mail_config.mailbox, mail_config.imap_host);
    eprintln!("   Keywords: {}", config.keywords.join(", "));
    eprintln!("   Queue: {}", config.queue_dir.display());
    eprintln!("   Archive: {}", config.archive_dir.display());
    eprintln!("   Worker: {} {}", config.worker_program, config.worker_args.join(" "));
    eprintln!("   Ctrl+C to exit.\n");

    let queue = Arc::new(JobQueue::new(
        config.queue_dir.clone(),
        config.backup_dir.clone(),
    ));

    let run_log = RunLog::in_dir(&config.log_dir);
    let archiver = Arc::new(Archiver::new(config.archive_dir.clone(), run_log));

    let executor = Arc::new(
        SubprocessExecutor::new(config.worker_program.clone(), config.worker_args.clone())
            .with_working_dir(config.worker_dir.clone()),
    );

    let dispatcher = Arc::new(Dispatcher::spawn(executor, archiver));

    let pending = queue.pending().await.unwrap_or_default();
    if !pending.is_empty() {
        tracing::info!(
            count = pending.len(),
            "Jobs left over in queue from a previous run (submit manually or re-run the worker)"
        );
    }

    let observer: Arc<dyn InboxObserver> =
        Arc::new(QueueingObserver::new(Arc::clone(&queue), Arc::clone(&dispatcher)));
    let source = Arc::new(ImapSource::new(mail_config.clone()));

    let listener = InboxListener::new(
        source,
        observer,
        config.keywords.clone(),
        config.allowed_senders.clone(),
        mail_config.poll_interval,
    );
    let shutdown = listener.shutdown_flag();
    let listener_handle = tokio::spawn(listener.run());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutting down: draining in-flight job");
    shutdown.store(true, Ordering::Relaxed);
    listener_handle.abort();
    dispatcher.shutdown().await;

    Ok(())
}

fn run_report(log_dir: &Path) -> anyhow::Result<()> {
    let report = reports::parse_log_dir(log_dir)
        .with_context(|| format!("failed to parse logs under {}", log_dir.display()))?;

    println!("GL accounts ({}):", report.gl.len());
    for row in &report.gl {
        println!("  {}  {}  {}", row.company_code, row.gl_account, row.description);
    }
    println!("Vendors ({}):", report.vendors.len());
    for row in &report.vendors {
        println!("  {}  {}  {}", row.company_code, row.vendor, row.vendor_name);
    }
    Ok(())
}
