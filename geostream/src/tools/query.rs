use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use futures::StreamExt;
use geostream_core::BoundingBox;
use geostream_source::{Feature, FeatureQueryOptions, Source};
use std::io::Write;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,

	/// bounding box as "min_x,min_y,max_x,max_y", can be repeated
	#[arg(long, required = true, value_parser = parse_bbox, allow_hyphen_values = true)]
	bbox: Vec<BoundingBox>,

	/// stop after this many features
	#[arg(long, short)]
	limit: Option<usize>,

	/// only fetch the features into the cache, print nothing per feature
	#[arg(long)]
	warm: bool,
}

pub fn parse_bbox(value: &str) -> Result<BoundingBox, String> {
	BoundingBox::try_from(value).map_err(|err| err.to_string())
}

#[tokio::main]
pub async fn run(arguments: &Subcommand, out: &mut impl Write) -> Result<()> {
	let source = Source::open(&arguments.source.source, arguments.source.to_options()?).await?;

	if arguments.warm {
		let count = source.warm_cache(&arguments.bbox).await?;
		writeln!(out, "fetched {count} features")?;
	} else {
		let stream = source.get_features(&arguments.bbox, FeatureQueryOptions::default())?;
		let mut stream = stream.take(arguments.limit.unwrap_or(usize::MAX));
		let mut count = 0u64;
		while let Some(feature) = stream.next().await {
			print_feature(&feature?, out)?;
			count += 1;
		}
		log::info!("{count} features found");
	}

	let stats = source.cache_stats();
	writeln!(
		out,
		"cache: {} hits, {} misses, {} pages, {} of {} bytes",
		stats.hits, stats.misses, stats.pages, stats.bytes, stats.max_bytes
	)?;
	Ok(())
}

pub fn print_feature(feature: &Feature, out: &mut impl Write) -> Result<()> {
	writeln!(
		out,
		"{}\t{}\t{}\t{}",
		feature.offset,
		feature.byte_length,
		feature.geometry_name(),
		feature.properties
	)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::tests::{run_command, us_states_file};
	use anyhow::Result;
	use rstest::rstest;

	#[test]
	fn hawaii() -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		let path = us_states_file(&dir)?;
		let output = run_command(vec!["geostream", "query", path.as_str(), "--bbox", "-161,18.5,-154.5,22.5"])?;
		let lines: Vec<&str> = output.lines().collect();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].contains("\tMultiPolygon\tNAME=\"Hawaii\" ORDER=11 STATE=\"HI\""));
		assert!(lines[1].starts_with("cache: 0 hits, 1 misses, 1 pages"));
		Ok(())
	}

	#[rstest]
	#[case(None, 52)]
	#[case(Some("5"), 5)]
	fn limit(#[case] limit: Option<&str>, #[case] expected: usize) -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		let path = us_states_file(&dir)?;
		let mut args = vec!["geostream", "query", path.as_str(), "--bbox", "-180,-90,180,90", "--validate"];
		if let Some(limit) = limit {
			args.extend(["--limit", limit]);
		}
		let output = run_command(args)?;
		assert_eq!(output.lines().count(), expected + 1);
		Ok(())
	}

	#[test]
	fn several_boxes_and_warm() -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		let path = us_states_file(&dir)?;
		let output = run_command(vec![
			"geostream",
			"query",
			path.as_str(),
			"--bbox",
			"-161,18.5,-154.5,22.5",
			"--bbox",
			"-67,18,-66,18.4",
			"--warm",
		])?;
		assert!(output.starts_with("fetched 2 features\n"));
		Ok(())
	}

	#[test]
	fn invalid_bbox() {
		let err = run_command(vec!["geostream", "query", "data.gsb", "--bbox", "1,2,3"]).unwrap_err();
		assert!(err.to_string().contains("expected 4 comma separated numbers"));
	}
}
