// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};
use log::{debug, info, LevelFilter};
use thiserror::Error;
use vscsi::{
    context::ASM_RULES_PATH,
    preflight::Preflight,
    facts,
    render::{self, RecordFormat},
    Config,
};

mod oui;

/// Inventory SCSI devices on Linux guests running under VMware
#[derive(Parser)]
#[command(name = "lsvscsi", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Scope {
    /// Root to read the sysfs tree below
    #[arg(long, default_value = "/")]
    sysroot: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// List every SCSI device with its VMware address and storage membership
    Devices {
        #[command(flatten)]
        scope: Scope,

        /// Comma separated rows
        #[arg(long, group = "format")]
        csv: bool,

        /// Omit the header pair from CSV output
        #[arg(long, requires = "csv")]
        no_header: bool,

        /// Aligned columns
        #[arg(long, group = "format")]
        table: bool,

        /// JSON array of records
        #[arg(long, group = "format")]
        json: bool,

        /// Query the running ASM instance for disk groups
        #[arg(long)]
        asm: bool,

        /// Oracle ASM udev rules
        #[arg(long, default_value = ASM_RULES_PATH)]
        asm_rules: PathBuf,

        /// Oracle home holding sqlplus
        #[arg(long, env = "ORACLE_HOME")]
        oracle_home: Option<PathBuf>,
    },

    /// List the VMware virtual SCSI controllers and their kernel hosts
    Controllers {
        #[command(flatten)]
        scope: Scope,
    },

    /// Name the vendor behind a WWN or WWID
    Oui {
        /// WWN or WWID, separators and a 0x prefix are accepted
        #[arg(required_unless_present = "update")]
        address: Option<String>,

        /// OUI registry file, `--update` writes `oui.txt` in the working directory unless given
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Download a fresh registry before resolving
        #[arg(long)]
        update: bool,

        /// Where to download the registry from
        #[arg(long, default_value = wwn::download::DEFAULT_URL)]
        url: String,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum Failure {
    #[error(transparent)]
    Inventory(#[from] vscsi::Error),

    #[error(transparent)]
    Vendor(#[from] wwn::Error),

    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),

    #[error("cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Failure {
    fn exit_code(&self) -> u8 {
        match self {
            Failure::Inventory(e) => match e {
                vscsi::Error::UnsupportedOs(_) => 2,
                vscsi::Error::UnsupportedKernel(_) => 3,
                vscsi::Error::NotPrivileged => 4,
                vscsi::Error::MissingUtility(_) => 5,
                vscsi::Error::ScsiTreeUnavailable { .. } => 6,
                vscsi::Error::NotVmware(_) => 7,
                vscsi::Error::InvalidAddress(_) => 8,
                vscsi::Error::Io(_) | vscsi::Error::HostOnly(_) | vscsi::Error::Command { .. } => 1,
            },
            Failure::Vendor(e) => match e {
                wwn::Error::InvalidAddress { .. } => 8,
                wwn::Error::RegistryUnavailable { .. } | wwn::Error::EmptyRegistry(_) | wwn::Error::Download(_) => 9,
                wwn::Error::Cancelled => 130,
                wwn::Error::Io(_) => 1,
            },
            Failure::Output(_) | Failure::Encode(_) => 1,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Renders into memory first so a failure never leaves partial output.
fn emit(render: impl FnOnce(&mut Vec<u8>) -> Result<(), Failure>) -> Result<(), Failure> {
    let mut buf = Vec::new();
    render(&mut buf)?;

    let mut stdout = BufWriter::new(io::stdout().lock());
    match stdout.write_all(&buf).and_then(|()| stdout.flush()) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("stdout closed early");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn run(command: Command) -> Result<(), Failure> {
    match command {
        Command::Devices {
            scope,
            csv,
            no_header,
            table,
            json,
            asm,
            asm_rules,
            oracle_home,
        } => {
            let format = if csv {
                RecordFormat::Csv { header: !no_header }
            } else if table {
                RecordFormat::Table
            } else if json {
                RecordFormat::Json
            } else {
                RecordFormat::Verbose
            };
            let config = Config {
                sysroot: scope.sysroot,
                asm_rules,
                asm,
                hostname: None,
            };

            Preflight::default().run(&config)?;
            let provider = facts::for_config(&config, oracle_home);
            let inventory = vscsi::inventory(&config, &*provider, format.sorted())?;
            info!("{} devices on {}", inventory.records.len(), inventory.context.hostname);

            emit(|out| Ok(render::write_records(out, &inventory.records, format)?))
        }
        Command::Controllers { scope } => {
            let config = Config {
                sysroot: scope.sysroot,
                ..Default::default()
            };

            Preflight { require_vmware: true }.run(&config)?;
            let map = vscsi::controllers(&config, &*facts::for_config(&config, None));
            emit(|out| Ok(render::write_controllers(out, &map)?))
        }
        Command::Oui {
            address,
            registry,
            update,
            url,
            json,
        } => {
            let address: Option<wwn::Address> = address.as_deref().map(str::parse::<wwn::Address>).transpose()?;

            let registry = if update {
                oui::update(&url, &oui::update_target(registry))?
            } else {
                wwn::Registry::load(&registry.unwrap_or_else(oui::default_registry))?
            };

            let Some(address) = address else {
                return Ok(());
            };
            let resolution = registry.resolve(address);
            emit(|out| {
                if json {
                    serde_json::to_writer_pretty(&mut *out, &resolution)?;
                    writeln!(out)?;
                } else {
                    oui::write_report(out, &resolution)?;
                }
                Ok(())
            })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lsvscsi: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
