use super::{SourceArgs, query::print_feature};
use anyhow::Result;
use clap::Args;
use futures::StreamExt;
use geostream_source::Source;
use std::io::Write;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,

	/// skip the geometries and print offset, length and properties only
	#[arg(long)]
	properties_only: bool,

	/// stop after this many features
	#[arg(long, short)]
	limit: Option<usize>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand, out: &mut impl Write) -> Result<()> {
	let source = Source::open(&arguments.source.source, arguments.source.to_options()?).await?;
	let limit = arguments.limit.unwrap_or(usize::MAX);

	if arguments.properties_only {
		let mut records = source.get_feature_properties().take(limit);
		while let Some(record) = records.next().await {
			let record = record?;
			writeln!(out, "{}\t{}\t{}", record.offset, record.byte_length, record.properties)?;
		}
	} else {
		let mut features = source.scan_all_features().take(limit);
		while let Some(feature) = features.next().await {
			print_feature(&feature?, out)?;
		}
	}
	Ok(())
}
