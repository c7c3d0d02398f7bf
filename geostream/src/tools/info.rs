use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use geostream_source::Source;
use std::io::Write;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand, out: &mut impl Write) -> Result<()> {
	let source = Source::open(&arguments.source.source, arguments.source.to_options()?).await?;
	print_info(&source, out)
}

fn print_info(source: &Source, out: &mut impl Write) -> Result<()> {
	let header = source.header();
	writeln!(out, "source:              {}", source.name())?;
	writeln!(out, "name:                {}", header.name)?;
	writeln!(out, "geometry type:       {}", header.geometry_type)?;
	writeln!(out, "features:            {}", header.features_count)?;
	match &header.crs {
		Some(crs) => writeln!(out, "crs:                 {}:{}", crs.org, crs.code)?,
		None => writeln!(out, "crs:                 none")?,
	}
	match source.bounds() {
		Some(bounds) => writeln!(out, "bounds:              {bounds:?}")?,
		None => writeln!(out, "bounds:              empty")?,
	}
	writeln!(out, "index node size:     {}", header.index_node_size)?;
	writeln!(out, "index size:          {} bytes", source.index_size_bytes())?;
	writeln!(out, "feature data offset: {}", source.feature_data_offset())?;
	writeln!(out, "columns:")?;
	for column in &header.columns {
		let nullable = if column.nullable { ", nullable" } else { "" };
		writeln!(out, "  {} ({:?}{nullable})", column.name, column.column_type)?;
	}
	Ok(())
}
