use clap::Parser;
use pve_provision::{
    ConfigLoader, ConsoleProgress, ImageSyncService, ProvisioningService, ProxmoxClient,
    SshSection, init_logging,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "pve-provision")]
#[command(about = "Create Proxmox VMs from a YAML file and sync installation images", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "configs/vm_config.yaml")]
    config: PathBuf,
    /// Create VMs without asking for confirmation
    #[arg(short, long)]
    yes: bool,
    /// Skip the SFTP image sync step
    #[arg(long)]
    skip_images: bool,
    /// Append-only log file
    #[arg(long, default_value = "logs/vm_creation.log")]
    log_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(Some(&cli.log_file)) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match ConfigLoader::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration file");
            return ExitCode::FAILURE;
        }
    };
    info!(vms = config.vms.len(), "Found VM configurations");

    if let Some(ssh) = config.sshcfg.as_ref().filter(|_| !cli.skip_images) {
        sync_images(ssh).await;
    }

    if config.vms.is_empty() {
        info!("No VMs configured, nothing to create");
        return ExitCode::SUCCESS;
    }

    if !cli.yes && !confirm(config.vms.len()) {
        info!("Operation cancelled");
        return ExitCode::SUCCESS;
    }

    let client = match ProxmoxClient::connect(&config.proxmox).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to connect to Proxmox");
            return ExitCode::FAILURE;
        }
    };

    let service = ProvisioningService::from_config(client, &config);
    let summary = service.create_all(&config.vms).await;
    ExitCode::from(summary.exit_status())
}

/// Image sync failures are logged; provisioning still runs.
async fn sync_images(ssh: &SshSection) {
    info!(host = %ssh.host, "Syncing images to PVE host");
    let mut progress = ConsoleProgress::new();
    match ImageSyncService::sync(ssh, &mut progress).await {
        Ok(report) if report.is_success() => {
            info!(uploaded = report.uploaded.len(), "Image sync complete");
        }
        Ok(report) => {
            warn!(
                uploaded = report.uploaded.len(),
                failed = report.failed.len(),
                "Image sync finished with failures"
            );
        }
        Err(e) => error!(error = %e, "Image sync failed"),
    }
}

/// Asks before creating VMs. Anything but `y`/`yes`, including EOF, declines.
fn confirm(count: usize) -> bool {
    print!("Create {} VMs? (y/N): ", count);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
    }
}
