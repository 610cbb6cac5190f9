//! Command-line interface for csinspect.
//!
//! Prints the code signature of a Mach-O binary or app bundle, or the
//! summary of a certificate file, in the spirit of `codesign -dvv`.

use clap::{ArgAction, Parser, Subcommand};
use csinspect::info::format_version;
use csinspect::{Certificate, InspectFlags, SignatureInspector, SigningInfo};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "csinspect")]
#[command(about = "Inspect Apple code signatures and signing certificates")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the code signature of an executable or bundle
    Signature {
        /// Mach-O file or bundle directory
        path: PathBuf,

        /// Architecture of a universal binary to inspect (e.g. arm64, x86_64)
        #[arg(short, long)]
        arch: Option<String>,

        /// Print the full signing information as an XML plist
        #[arg(long)]
        plist: bool,

        /// Leave out signing certificates
        #[arg(long)]
        no_certificates: bool,

        /// Leave out entitlements and requirements
        #[arg(long)]
        no_requirements: bool,
    },
    /// Show the summary of a DER or PEM certificate
    Certificate {
        /// Certificate file
        file: PathBuf,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Signature {
            path,
            arch,
            plist,
            no_certificates,
            no_requirements,
        } => {
            let mut flags = InspectFlags::all();
            if no_certificates {
                flags.remove(InspectFlags::SIGNING_INFORMATION);
            }
            if no_requirements {
                flags.remove(InspectFlags::REQUIREMENT_INFORMATION);
            }

            let mut inspector = SignatureInspector::new().flags(flags);
            if let Some(arch) = arch {
                inspector = inspector.architecture(arch);
            }

            let info = match inspector.try_code_signature(&path) {
                Ok(info) => info,
                Err(e) => {
                    if cli.verbose > 0 {
                        eprintln!("{}: {}", path.display(), e);
                    } else {
                        eprintln!("{}: code object is not signed at all", path.display());
                    }
                    return Ok(ExitCode::FAILURE);
                }
            };

            if plist {
                let value = plist::Value::Dictionary(info.to_dictionary());
                plist::to_writer_xml(std::io::stdout().lock(), &value)?;
                println!();
            } else {
                print_signature(&path, &info, &inspector);
            }
        }
        Command::Certificate { file } => {
            let data = std::fs::read(&file)?;
            let cert = match Certificate::from_der_or_pem(&data) {
                Ok(cert) => cert,
                Err(e) => {
                    eprintln!("{}: {}", file.display(), e);
                    return Ok(ExitCode::FAILURE);
                }
            };

            let Some(summary) = SignatureInspector::new().certificate_summary(&cert) else {
                eprintln!("{}: certificate has no subject", file.display());
                return Ok(ExitCode::FAILURE);
            };

            println!("Summary={}", summary);
            print_certificate_details(&cert);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Install a stderr subscriber; `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn print_signature(path: &Path, info: &SigningInfo, inspector: &SignatureInspector) {
    println!("Executable={}", info.main_executable().display());
    if info.main_executable() != path {
        println!("Location={}", path.display());
    }
    println!("Identifier={}", info.identifier());
    println!("Format={}", info.format());
    println!(
        "CodeDirectory flags=0x{:x}({}) hashes={}",
        info.flags().bits(),
        info.flags().describe(),
        info.digest_algorithm().name()
    );
    println!("CDHash={}", hex::encode(info.cdhash()));

    for cert in info.certificates() {
        if let Some(summary) = inspector.certificate_summary(cert) {
            println!("Authority={}", summary);
        }
    }
    if info.is_adhoc() {
        println!("Signature=adhoc");
    }

    println!("TeamIdentifier={}", info.team_id().unwrap_or("not set"));
    if let Some(platform) = info.platform_identifier() {
        println!("Platform identifier={}", platform);
    }
    if let Some(runtime) = info.runtime_version() {
        println!("Runtime Version={}", format_version(runtime));
    }

    if let Some(entitlements) = info.entitlements_dict() {
        println!("Entitlements:");
        for key in entitlements.keys() {
            println!("  {}", key);
        }
    }
    if let Some(requirements) = info.requirement_data() {
        println!("Internal requirements: {} bytes", requirements.len());
    }
}

fn print_certificate_details(cert: &Certificate) {
    if let Some(subject) = cert.subject() {
        println!("Subject={}", subject);
    }
    if let Some(issuer) = cert.issuer() {
        println!("Issuer={}", issuer);
    }
    if let Some(unit) = cert.organizational_unit() {
        println!("OrganizationalUnit={}", unit);
    }
    println!("Serial={}", cert.serial_number());
    println!("NotBefore={}", cert.not_before().to_rfc3339());
    println!("NotAfter={}", cert.not_after().to_rfc3339());
    println!("SHA-1={}", cert.sha1_fingerprint());
    println!("SHA-256={}", cert.sha256_fingerprint());
}
