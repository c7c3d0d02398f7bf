//! Query behavior of a source over the US states dataset.

use anyhow::Result;
use futures::TryStreamExt;
use geo::{BoundingRect, Intersects, Rect, coord};
use geostream_core::BoundingBox;
use geostream_source::{
	fetch::plan_requests,
	format::{SearchHit, Value},
	testing::{TestReader, us_states, us_states_builder},
	*,
};
use rstest::rstest;
use std::sync::Arc;

async fn open_states(options: SourceOptions) -> Result<(Arc<TestReader>, Source)> {
	let reader = Arc::new(TestReader::new("us_states", us_states()?));
	let source = Source::open("us_states", options.with_reader(reader.clone())).await?;
	Ok((reader, source))
}

async fn query(source: &Source, bbox: BoundingBox) -> Result<Vec<Feature>> {
	let mut features: Vec<Feature> = source
		.get_features(&[bbox], FeatureQueryOptions::default())?
		.try_collect()
		.await?;
	features.sort_by_key(|feature| feature.offset);
	Ok(features)
}

fn rect(bbox: &BoundingBox) -> Rect<f64> {
	Rect::new(
		coord! { x: bbox.min_x, y: bbox.min_y },
		coord! { x: bbox.max_x, y: bbox.max_y },
	)
}

fn envelope_intersects(feature: &Feature, bbox: &BoundingBox) -> bool {
	feature
		.geometry
		.as_ref()
		.and_then(|geometry| geometry.bounding_rect())
		.is_some_and(|envelope| envelope.intersects(&rect(bbox)))
}

fn state(feature: &Feature) -> String {
	match feature.properties.get("STATE") {
		Some(Value::String(state)) => state.clone(),
		other => panic!("unexpected STATE {other:?}"),
	}
}

#[tokio::test]
async fn hawaii_box_finds_only_hawaii() -> Result<()> {
	let (_, source) = open_states(SourceOptions::new()).await?;
	let features = query(&source, BoundingBox::new(-161.0, 18.5, -154.5, 22.5)).await?;
	assert_eq!(features.len(), 1);
	assert_eq!(state(&features[0]), "HI");
	assert_eq!(features[0].geometry_name(), "MultiPolygon");
	Ok(())
}

#[rstest]
#[case::new_england(BoundingBox::new(-73.0, 41.0, -70.0, 43.0))]
#[case::four_corners(BoundingBox::new(-109.5, 36.5, -108.5, 37.5))]
#[case::pacific(BoundingBox::new(-179.0, -10.0, -165.0, 10.0))]
#[case::everything(BoundingBox::new(-180.0, -90.0, 180.0, 90.0))]
#[tokio::test]
async fn query_matches_a_filtered_scan(#[case] bbox: BoundingBox) -> Result<()> {
	let (_, source) = open_states(SourceOptions::new().with_validate(true)).await?;
	let features = query(&source, bbox).await?;
	assert!(features.iter().all(|feature| envelope_intersects(feature, &bbox)));

	let all: Vec<Feature> = source.scan_all_features().try_collect().await?;
	let expected: Vec<Feature> = all
		.into_iter()
		.filter(|feature| envelope_intersects(feature, &bbox))
		.collect();
	assert_eq!(features, expected);
	Ok(())
}

#[tokio::test]
async fn empty_area_box_yields_nothing() -> Result<()> {
	let (_, source) = open_states(SourceOptions::new()).await?;
	assert!(query(&source, BoundingBox::new(-100.0, 40.0, -100.0, 40.0)).await?.is_empty());
	Ok(())
}

#[rstest]
#[case(64)]
#[case(1024)]
#[case(1024 * 1024)]
#[tokio::test]
async fn repeated_query_makes_no_requests(#[case] page_size: u64) -> Result<()> {
	let (reader, source) = open_states(SourceOptions::new().with_page_size(page_size)).await?;
	let bbox = BoundingBox::new(-100.0, 30.0, -80.0, 45.0);

	let first = query(&source, bbox).await?;
	let requests = reader.request_count();
	let second = query(&source, bbox).await?;

	assert!(!first.is_empty());
	assert_eq!(first, second);
	assert_eq!(reader.request_count(), requests);
	Ok(())
}

#[tokio::test]
async fn concurrent_queries_share_pages() -> Result<()> {
	let reader = Arc::new(TestReader::new("us_states", us_states()?).with_delay(std::time::Duration::from_millis(20)));
	let source = Source::open("us_states", SourceOptions::new().with_reader(reader.clone())).await?;
	let bbox = BoundingBox::new(-125.0, 25.0, -65.0, 50.0);

	let (a, b) = tokio::try_join!(query(&source, bbox), query(&source, bbox))?;
	assert_eq!(a, b);
	// bootstrap plus the single page of the small feature section
	assert_eq!(reader.request_count(), 2);
	Ok(())
}

#[tokio::test]
async fn larger_header_window_never_adds_bootstrap_calls() -> Result<()> {
	let mut previous = usize::MAX;
	for window in [12, 40, 100, 200, 1000, 4000, 32 * 1024] {
		let (reader, _) = open_states(SourceOptions::new().with_initial_header_request_length(window)).await?;
		let calls = reader.request_count();
		assert!(calls <= previous, "window {window} needed {calls} calls");
		assert!(calls <= 3);
		previous = calls;
	}
	assert_eq!(previous, 1);
	Ok(())
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(16)]
#[tokio::test]
async fn scan_yields_every_feature(#[case] node_size: u16) -> Result<()> {
	let reader = Arc::new(TestReader::new("us_states", us_states_builder(node_size).build()?));
	let source = Source::open("us_states", SourceOptions::new().with_reader(reader)).await?;

	let features: Vec<Feature> = source.scan_all_features().try_collect().await?;
	assert_eq!(features.len() as u64, source.features_count());
	assert!(features.iter().all(|feature| feature.geometry.is_some()));
	let states: Vec<String> = features.iter().map(state).collect();
	assert_eq!(states.first().map(String::as_str), Some("AL"));
	assert_eq!(states.last().map(String::as_str), Some("PR"));

	let records: Vec<PropertyRecord> = source.get_feature_properties().try_collect().await?;
	assert_eq!(records.len(), features.len());
	for (record, feature) in records.iter().zip(&features) {
		assert_eq!(record.offset, feature.offset);
		assert_eq!(record.byte_length, feature.byte_length);
		assert_eq!(record.properties, feature.properties);
	}
	Ok(())
}

#[tokio::test]
async fn multiple_boxes_in_one_query() -> Result<()> {
	let (_, source) = open_states(SourceOptions::new()).await?;
	let boxes = [
		BoundingBox::new(-161.0, 18.5, -154.5, 22.5),
		BoundingBox::new(-67.0, 18.0, -66.0, 18.4),
	];
	let features: Vec<Feature> = source
		.get_features(&boxes, FeatureQueryOptions::default())?
		.try_collect()
		.await?;
	let mut states: Vec<String> = features.iter().map(state).collect();
	states.sort();
	assert_eq!(states, vec!["HI", "PR"]);
	Ok(())
}

#[test]
fn nearby_hits_merge_and_distant_hits_do_not() {
	let near = plan_requests(&[SearchHit::new(0, Some(100)), SearchHit::new(110, Some(100))], 0, 500 * 1024);
	assert_eq!(near.len(), 1);

	let far = plan_requests(
		&[SearchHit::new(0, Some(100)), SearchHit::new(10 * 1024 * 1024, Some(100))],
		0,
		500 * 1024,
	);
	assert_eq!(far.len(), 2);
}
