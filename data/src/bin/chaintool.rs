use std::path::PathBuf;

use anyhow::Result;
use chain_config::chain_config;
use chain_types::RecordOrder;
use clap::{Args, Parser, Subcommand};
use data::{PayloadFetcher, PipelineOptions, logging, write_payload};
use replica_client::IndexFilter;
use serde_json::json;

#[derive(Parser)]
#[clap(version, about = "Fetch and reassemble payloads stored across chain records")]
struct ChainCommand {
    #[clap(flatten)]
    overrides: CliOverrides,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CliOverrides {
    /// Base URL of a replica. Repeat for every replica in the pool.
    #[clap(long = "replica", required = true)]
    replicas: Vec<String>,
    /// Record type filter codes, comma separated.
    #[clap(long, value_delimiter = ',')]
    types: Option<Vec<u16>>,
    /// Index page size, 10 to 100.
    #[clap(long)]
    page_size: Option<usize>,
    /// Index order, "asc" or "desc".
    #[clap(long)]
    order: Option<RecordOrder>,
    /// Position of the replica the record index is paged from.
    #[clap(long)]
    index_replica: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Lists the records stored under an address.
    List(ListArg),
    /// Fetches and reassembles the payload stored under an address.
    Fetch(FetchArg),
}

#[derive(Args)]
struct ListArg {
    /// Address whose records are listed.
    address: String,
    /// List the records sent to the address instead, including inner entries of aggregates.
    #[clap(long)]
    recipient: bool,
}

#[derive(Args)]
struct FetchArg {
    /// Address whose payload is fetched.
    address: String,
    /// Where to write the payload.
    #[clap(short, long)]
    output: PathBuf,
    /// Number of records fetched at once.
    #[clap(short, long)]
    concurrency: Option<usize>,
    /// Retries per record after the first attempt.
    #[clap(short, long)]
    retries: Option<usize>,
    /// Base backoff delay in milliseconds.
    #[clap(long)]
    base_delay_ms: Option<u64>,
    /// Skip the sequence gap report.
    #[clap(long)]
    no_gaps: bool,
    /// Write only the base64 body of a data URL payload.
    #[clap(long)]
    data_url_body: bool,
    /// Log every reassembled group.
    #[clap(long)]
    debug: bool,
}

impl ChainCommand {
    async fn run(self) -> Result<()> {
        let mut options = PipelineOptions::default();
        if let Some(types) = self.overrides.types {
            options.types = types;
        }
        if let Some(page_size) = self.overrides.page_size {
            options.page_size = page_size;
        }
        if let Some(order) = self.overrides.order {
            options.order = order;
        }
        if let Some(index_replica) = self.overrides.index_replica {
            options.index_replica = index_replica;
        }

        let fetcher = PayloadFetcher::from_endpoints(&self.overrides.replicas)?;
        self.command.run(fetcher, options).await
    }
}

impl Command {
    async fn run(self, fetcher: PayloadFetcher, mut options: PipelineOptions) -> Result<()> {
        match self {
            Command::List(arg) => {
                if arg.recipient {
                    options.filter = IndexFilter::Recipient;
                }
                let refs = fetcher.enumerate_aggregate_refs(&arg.address, &options).await?;
                eprintln!("Found {} records.", refs.len());
                println!("{}", serde_json::to_string_pretty(&refs)?);
                Ok(())
            },
            Command::Fetch(arg) => {
                if let Some(concurrency) = arg.concurrency {
                    options.concurrency = concurrency;
                }
                if let Some(retries) = arg.retries {
                    options.retries = retries;
                }
                if let Some(base_delay_ms) = arg.base_delay_ms {
                    options.base_delay_ms = base_delay_ms;
                }
                options.analyze_gaps = !arg.no_gaps;
                options.debug = arg.debug;

                let outcome = fetcher.download(&arg.address, &options).await?;
                let written = write_payload(&arg.output, &outcome.reconstruction, arg.data_url_body)?;
                eprintln!("Wrote {written} bytes to {}.", arg.output.display());

                let summary = json!({
                    "header": outcome.reconstruction.header,
                    "report": outcome.reconstruction.report,
                    "failed": outcome.failed,
                    "records": outcome.refs.len(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging(&chain_config().log)?;
    let cli = ChainCommand::parse();
    cli.run().await
}
