use gemtx::{CertificatePolicy, Client, ClientConfig, Dispatcher, PageSlot, SlotUpdate};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "gemtx", about = "Fetch Gemini pages and print them")]
struct Opt {
    /// Addresses to fetch, e.g. `gemini.circumlunar.space`. Only the newest page is printed.
    #[structopt(required = true)]
    addresses: Vec<String>,

    /// File to pin server certificates in.
    #[structopt(long, parse(from_os_str))]
    known_hosts: Option<PathBuf>,

    /// Seconds a transaction may take.
    #[structopt(long, default_value = "30")]
    timeout: u64,

    /// Verify certificates against well-known root authorities instead of pinning them.
    #[structopt(long)]
    webpki: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let opt = Opt::from_args();

    let config = ClientConfig {
        timeout: Duration::from_secs(opt.timeout),
        certificate_policy: if opt.webpki { CertificatePolicy::WebPki } else { CertificatePolicy::Tofu },
        known_hosts: opt.known_hosts,
        ..ClientConfig::default()
    };

    let client = match Client::with_config(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (dispatcher, mut completions) = Dispatcher::new(client);
    for address in &opt.addresses {
        dispatcher.dispatch(address.as_str());
    }
    drop(dispatcher);

    let mut slot = PageSlot::new();
    while let Some(completion) = completions.recv().await {
        match slot.accept(completion) {
            SlotUpdate::Failed(e) => error!("{e}"),
            SlotUpdate::Replaced | SlotUpdate::Stale => {}
        }
    }

    let Some(page) = slot.page() else {
        return ExitCode::FAILURE;
    };

    match (page.raw_status, &page.status_meta) {
        (Some(status), Some(meta)) => println!("{status} {meta}"),
        (Some(status), None) => println!("{status}"),
        _ => println!("(no status)"),
    }
    if let Some(body) = &page.body {
        println!("{body}");
    }

    if slot.error().is_some() { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
