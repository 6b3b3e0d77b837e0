use clap::{Parser, Subcommand};
use dkim_inspector::{
    inspect::{self, Inspection},
    resolve_key, resolve_record, verify, Config, Message, PublicKey,
};
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use std::{error::Error, path::PathBuf, process, time::Duration};
use tokio::fs;

/// Inspect DKIM signatures, retrieve DKIM public keys.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// DNS lookup timeout in seconds
    #[arg(long, global = true, default_value_t = 5)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Print signature data and signing input of the signatures in a message
    Inspect {
        #[arg(long)]
        path: PathBuf,
        /// Only the signature with this d= tag
        #[arg(long, requires = "selector")]
        domain: Option<String>,
        /// Only the signature with this s= tag
        #[arg(long, requires = "domain")]
        selector: Option<String>,
    },
    /// Print the public key published for a domain and selector
    Retrieve {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        selector: String,
    },
    /// Verify the signatures in a message
    Verify {
        #[arg(long)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Inspect { path, domain, selector } => {
            let msg = fs::read(path).await?;

            match (domain, selector) {
                (Some(domain), Some(selector)) => {
                    let inspection = inspect::inspect_selected(&msg, &domain, &selector)?;
                    print_inspection(&inspection);
                }
                _ => {
                    for (i, result) in inspect::inspect_all(&msg)?.into_iter().enumerate() {
                        println!("SIGNATURE {}", i + 1);
                        match result {
                            Ok(inspection) => print_inspection(&inspection),
                            Err(e) => println!("error: {e}"),
                        }
                        println!();
                    }
                }
            }
        }
        Command::Retrieve { domain, selector } => {
            let resolver = make_resolver(args.timeout);

            match resolve_key(&resolver, &domain, &selector).await? {
                k @ PublicKey::Rsa(_) => {
                    let modulus = k.modulus().map(|n| n.to_bytes_be()).unwrap_or_default();
                    let exponent = k.exponent().map(|e| e.to_bytes_be()).unwrap_or_default();
                    println!("key type: {}", k.key_type());
                    println!("key size: {}", k.key_size().unwrap_or_default());
                    println!("modulus:  {}", hex::encode(modulus));
                    println!("exponent: {}", hex::encode(exponent));
                }
                PublicKey::Raw { key_type, key_data } => {
                    println!("key type: {key_type}");
                    println!("key data: {}", hex::encode(key_data));
                }
            }
        }
        Command::Verify { path } => {
            let msg = fs::read(path).await?;
            let message = Message::parse(&msg)?;

            let resolver = make_resolver(args.timeout);
            let config = Config::default();

            let headers = inspect::extract_signatures(&message);
            if headers.is_empty() {
                return Err(inspect::InspectError::MissingSignature.into());
            }

            let mut failed = 0;

            for (i, header) in headers.iter().enumerate() {
                print!("SIGNATURE {}: ", i + 1);

                let inspection = match inspect::assemble(&message, header) {
                    Ok(inspection) => inspection,
                    Err(e) => {
                        println!("error: {e}");
                        failed += 1;
                        continue;
                    }
                };

                let sig = &inspection.signature;
                print!("d={} s={} ", sig.domain, sig.selector);

                let record =
                    match resolve_record(&resolver, sig.domain.as_ref(), sig.selector.as_ref())
                        .await
                    {
                        Ok(record) => record,
                        Err(e) => {
                            println!("error: {e}");
                            failed += 1;
                            continue;
                        }
                    };

                match verify(&inspection, message.body(), &record, &config) {
                    Ok(()) => println!("pass"),
                    Err(e) => {
                        println!("fail: {e}");
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                return Err(format!("{failed} of {} signatures did not verify", headers.len()).into());
            }
        }
    }

    Ok(())
}

fn make_resolver(timeout: u64) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(timeout);

    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

fn print_inspection(inspection: &Inspection) {
    let sig = &inspection.signature;

    println!("header index:  {}", inspection.header_index);
    println!("algorithm:     {}", sig.algorithm);
    println!("domain:        {}", sig.domain);
    println!("selector:      {}", sig.selector);
    println!("key record:    {}", inspection.key_query_name());
    println!("signature:     {}", hex::encode(&inspection.signature_data));
    println!("signing input: {}", hex::encode(&inspection.signing_input));
    println!("{}", String::from_utf8_lossy(&inspection.signing_input));
}
