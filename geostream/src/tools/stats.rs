use super::{SourceArgs, query::parse_bbox};
use anyhow::Result;
use clap::Args;
use geostream_core::{BoundingBox, ByteSize};
use geostream_source::Source;
use std::io::Write;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,

	/// bounding box to fetch, "min_x,min_y,max_x,max_y"; can be repeated
	#[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
	bbox: Vec<BoundingBox>,

	/// run the same queries this many times
	#[arg(long, default_value_t = 1)]
	repeat: u32,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand, out: &mut impl Write) -> Result<()> {
	let source = Source::open(&arguments.source.source, arguments.source.to_options()?).await?;

	let mut features = 0;
	if !arguments.bbox.is_empty() {
		for _ in 0..arguments.repeat {
			features += source.warm_cache(&arguments.bbox).await?;
		}
	}

	let stats = source.cache_stats();
	let lookups = stats.hits + stats.misses;
	writeln!(out, "features fetched: {features}")?;
	writeln!(out, "page hits:        {}", stats.hits)?;
	writeln!(out, "page misses:      {}", stats.misses)?;
	if lookups > 0 {
		writeln!(out, "hit rate:         {:.1}%", stats.hits as f64 * 100.0 / lookups as f64)?;
	}
	writeln!(out, "cached pages:     {}", stats.pages)?;
	writeln!(
		out,
		"cached bytes:     {} of {}",
		ByteSize::new(stats.bytes),
		ByteSize::new(stats.max_bytes)
	)?;
	writeln!(out, "index bytes:      {}", ByteSize::new(source.index_size_bytes()))?;
	Ok(())
}
