use analyse::index::{
    collect_attribute_stats, generate_index, generate_rows_index, read_attribute_index,
    read_rows_index, write_attribute_index, CollectOptions, IndexKind, RowNumberCols,
};
use analyse::parquetquery;
use analyse::{analyse_block, BlockSummary, Error, ScopeMask, Version};
use std::collections::{HashMap, HashSet};
use storage::{create_local_store, BlockInfo, BlockStatus, DedicatedColumnScope, TempoStorage};
use tests::{
    trace_with_spans, Attribute, BlockFixture, Event, Link, ResourceSpans, ScopeSpans, Span,
    Trace, TEST_BLOCK_ID, TEST_TENANT_ID,
};
use tokio::runtime::Handle;

fn rows(levels: [i64; 4]) -> RowNumberCols {
    RowNumberCols {
        lvl01: levels[0],
        lvl02: levels[1],
        lvl03: levels[2],
        lvl04: levels[3],
    }
}

/// Ten traces of a hundred spans, each span carrying http.method=GET
fn get_spans_block(version: Version) -> BlockFixture {
    let traces = (0..10).map(|_| {
        let spans = (0..100)
            .map(|_| Span::new("GET").with_attr(Attribute::string("http.method", "GET")))
            .collect();
        trace_with_spans("frontend", spans)
    });
    BlockFixture::new(version).with_traces(traces).with_row_group_size(3)
}

#[test]
fn test_span_attribute_sizes_and_values() {
    for version in [Version::V3, Version::V4, Version::V5] {
        let fixture = get_spans_block(version);
        let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();

        assert_eq!(summary.span.attributes["http.method"], 3000, "{version}");
        assert_eq!(
            summary.span.cardinality["http.method"],
            HashMap::from([("GET".to_string(), 1000)]),
            "{version}"
        );
        assert_eq!(summary.span.total_bytes, 3000, "{version}");
        assert_eq!(summary.resource.total_bytes, 0, "{version}");
        assert_eq!(summary.event.is_some(), version >= Version::V4, "{version}");
    }
}

#[test]
fn test_array_attributes_are_tracked_separately() {
    let span = Span::new("tagged").with_attr(Attribute::strings("tags", &["a", "b"]));
    let fixture = BlockFixture::new(Version::V4).with_trace(trace_with_spans("svc", vec![span]));

    let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();
    assert_eq!(summary.span.array_attributes["tags"], 2);
    assert!(!summary.span.cardinality.contains_key("tags"));
    assert!(!summary.span.attributes.contains_key("tags"));
    assert_eq!(summary.span.total_bytes, 0);
    assert_eq!(summary.span.top_n_arrays(5)[0].name, "tags");
}

#[test]
fn test_non_string_values_are_not_sized() {
    let span = Span::new("typed")
        .with_attr(Attribute::int("http.status_code", 200))
        .with_attr(Attribute::bool("sampled", true))
        .with_attr(Attribute::string("component", "grpc"));

    for version in [Version::V3, Version::V4] {
        let fixture = BlockFixture::new(version).with_trace(trace_with_spans("svc", vec![span.clone()]));
        let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();

        let names: HashSet<_> = summary.span.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, HashSet::from(["component"]), "{version}");
    }
}

#[test]
fn test_dedicated_span_column() {
    let traces = (0..6).map(|t| {
        let spans = (0..100)
            .map(|s| {
                let span = Span::new("op");
                // the last trace leaves the column empty
                if t < 5 {
                    span.with_dedicated("env", "prod")
                } else {
                    span.with_attr(Attribute::string("s", &s.to_string()))
                }
            })
            .collect();
        trace_with_spans("svc", spans)
    });
    let fixture = BlockFixture::new(Version::V4)
        .with_dedicated_column(DedicatedColumnScope::Span, "env")
        .with_traces(traces);

    let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();
    let span = &summary.span;
    assert_eq!(span.attributes["env"], 500 * "prod".len() as u64);
    assert_eq!(span.dedicated, HashSet::from(["env".to_string()]));
    assert_eq!(span.cardinality["env"], HashMap::from([("prod".to_string(), 500)]));
    assert!(span.is_dedicated("env"));
    assert!(!span.is_dedicated("s"));
}

#[test]
fn test_dedicated_columns_count_towards_scope_totals() {
    let span = Span::new("op")
        .with_attr(Attribute::string("http.url", "/api/v1"))
        .with_dedicated("env", "prod");
    let trace = Trace::new(vec![ResourceSpans::new("svc")
        .with_attr(Attribute::string("cluster", "eu"))
        .with_dedicated("k8s.namespace.name", "tempo")
        .with_spans(vec![span])]);

    let fixture = BlockFixture::new(Version::V3)
        .with_dedicated_column(DedicatedColumnScope::Resource, "k8s.namespace.name")
        .with_dedicated_column(DedicatedColumnScope::Span, "env")
        .with_trace(trace);

    let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();
    assert_eq!(summary.span.total_bytes, 7 + 4);
    assert_eq!(summary.resource.total_bytes, 2 + 5);
    assert_eq!(summary.resource.attributes["k8s.namespace.name"], 5);
    assert!(summary.resource.is_dedicated("k8s.namespace.name"));
    assert!((summary.resource.percentage(5) - 5.0 / 7.0 * 100.0).abs() < 1e-9);
}

#[test]
fn test_event_dedicated_columns() {
    let mut span = Span::new("op");
    span.events.push(Event {
        name: "exception".to_string(),
        attrs: vec![Attribute::string("exception.message", "boom")],
        dedicated: vec![("exception.type".to_string(), "IOError".to_string())],
    });
    let fixture = BlockFixture::new(Version::V5)
        .with_dedicated_column(DedicatedColumnScope::Event, "exception.type")
        .with_trace(trace_with_spans("svc", vec![span]));

    let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();
    let event = summary.event.unwrap();
    assert_eq!(event.attributes["exception.message"], 4);
    assert_eq!(event.attributes["exception.type"], 7);
    assert!(event.is_dedicated("exception.type"));
    assert_eq!(event.total_bytes, 11);
}

#[test]
fn test_dedicated_columns_without_slots_are_skipped() {
    let span = Span::new("op").with_attr(Attribute::string("a", "b"));
    let fixture = BlockFixture::new(Version::V2)
        .with_dedicated_column(DedicatedColumnScope::Span, "env")
        .with_trace(trace_with_spans("svc", vec![span]));

    let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();
    assert_eq!(summary.span.attributes.len(), 1);
    assert!(summary.span.dedicated.is_empty());
}

#[test]
fn test_top_attributes_by_size() {
    let span = Span::new("op")
        .with_attr(Attribute::string("http.url", "/a/long/request/path"))
        .with_attr(Attribute::string("b", "1234"))
        .with_attr(Attribute::string("a", "4321"))
        .with_attr(Attribute::string("x", "1"));
    let fixture = BlockFixture::new(Version::V4).with_trace(trace_with_spans("svc", vec![span]));

    let summary = analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap();
    let top: Vec<_> = summary
        .span
        .top_n(3)
        .into_iter()
        .map(|attr| (attr.name, attr.bytes))
        .collect();
    assert_eq!(
        top,
        vec![
            ("http.url".to_string(), 20),
            ("a".to_string(), 4),
            ("b".to_string(), 4),
        ]
    );
}

#[test]
fn test_merging_block_summaries() {
    let first = get_spans_block(Version::V4);
    let second = BlockFixture::new(Version::V3).with_trace(trace_with_spans(
        "svc",
        vec![Span::new("op").with_attr(Attribute::string("http.method", "POST"))],
    ));

    let mut total = BlockSummary::default();
    for fixture in [&first, &second] {
        total.add(analyse_block(&fixture.open().unwrap(), &fixture.meta()).unwrap());
    }

    assert_eq!(total.span.attributes["http.method"], 3004);
    assert_eq!(total.span.distinct_values("http.method"), 2);
    assert!(total.event.is_some());
}

#[test]
fn test_unsupported_version() {
    let fixture = get_spans_block(Version::V4);
    let mut meta = fixture.meta();
    meta.version = "vParquet9".to_string();

    let err = analyse_block(&fixture.open().unwrap(), &meta).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(ref v) if v == "vParquet9"));

    let err = collect_attribute_stats(&fixture.open().unwrap(), &meta, &CollectOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(_)));
}

#[test]
fn test_missing_column_is_schema_error() {
    // vParquet3 data described as vParquet4 lacks the list value columns
    let fixture = get_spans_block(Version::V3);
    let mut meta = fixture.meta();
    meta.version = Version::V4.as_str().to_string();

    let err = analyse_block(&fixture.open().unwrap(), &meta).unwrap_err();
    assert!(matches!(err, Error::Schema { ref path } if path.ends_with("Value.list.element")));
}

/// Two traces touching every attribute scope
fn all_scopes_block() -> BlockFixture {
    let mut span0 = Span::new("GET /api")
        .with_attr(Attribute::int("http.status_code", 200))
        .with_attr(Attribute::strings("tags", &["a", "b"]));
    span0.http_method = Some("GET".to_string());
    span0.events.push(Event {
        name: "exception".to_string(),
        attrs: vec![Attribute::string("exception.message", "boom")],
        dedicated: Vec::new(),
    });
    span0.links.push(Link {
        span_id: "00000000000000ab".to_string(),
        attrs: vec![Attribute::string("link.kind", "parent")],
    });
    let span1 = Span::new("POST /api")
        .with_attr(Attribute::int("http.status_code", 500))
        .with_attr(Attribute::double("ratio", 0.5))
        .with_attr(Attribute::bool("sampled", true));

    let first = Trace::new(vec![ResourceSpans {
        service_name: "svc-a".to_string(),
        attrs: vec![Attribute::string("cluster", "eu-1")],
        dedicated: Vec::new(),
        scope_spans: vec![ScopeSpans {
            name: "tracer".to_string(),
            version: "1.2.0".to_string(),
            attrs: vec![Attribute::string("lib.lang", "rust")],
            spans: vec![span0, span1],
        }],
    }]);
    let second = Trace::new(vec![ResourceSpans::new("svc-b")
        .with_attr(Attribute::string("cluster", "eu-1"))
        .with_spans(vec![Span::new("GET /api").with_attr(Attribute::int("http.status_code", 200))])]);

    BlockFixture::new(Version::V4).with_trace(first).with_trace(second)
}

#[test]
fn test_collect_attribute_stats() {
    let fixture = all_scopes_block();
    let stats = collect_attribute_stats(&fixture.open().unwrap(), &fixture.meta(), &CollectOptions::default()).unwrap();

    assert_eq!(
        (stats.traces, stats.resources, stats.spans, stats.events, stats.links, stats.arrays),
        (2, 2, 3, 1, 1, 1)
    );

    let status = &stats.attributes["http.status_code"];
    assert_eq!(status.count, 3);
    assert_eq!(status.scope_mask, ScopeMask::SPAN);
    assert_eq!(status.values_int.len(), 2);
    let ok = status.values_int.iter().find(|v| v.value == vec![200]).unwrap();
    assert_eq!(ok.row_numbers, vec![rows([0, 0, 0, 0]), rows([1, 0, 0, 0])]);

    let cluster = &stats.attributes["cluster"];
    assert_eq!(cluster.scope_mask, ScopeMask::RESOURCE);
    assert_eq!(cluster.cardinality(), 1);
    let eu = cluster.values_string.iter().next().unwrap();
    assert_eq!(eu.row_numbers, vec![rows([0, 0, -1, -1]), rows([1, 0, -1, -1])]);

    assert_eq!(stats.attributes["lib.lang"].scope_mask, ScopeMask::SCOPE);
    assert_eq!(stats.attributes["link.kind"].scope_mask, ScopeMask::LINK);
    assert_eq!(stats.attributes["ratio"].values_float.len(), 1);
    assert_eq!(stats.attributes["sampled"].values_bool.len(), 1);

    // event attributes belong to their span
    let message = &stats.attributes["exception.message"];
    assert_eq!(message.scope_mask, ScopeMask::EVENT);
    assert_eq!(message.values_string.iter().next().unwrap().row_numbers, vec![rows([0, 0, 0, 0])]);

    let tags = stats.attributes["tags"].values_string.iter().next().unwrap();
    assert_eq!(tags.value, vec!["a".to_string(), "b".to_string()]);

    // well-known columns
    assert_eq!(stats.attributes["service.name"].cardinality(), 2);
    assert_eq!(stats.attributes["http.method"].count, 1);

    assert!(!stats.attributes.contains_key("name"));
}

#[test]
fn test_collect_intrinsics() {
    let fixture = all_scopes_block();
    let options = CollectOptions { add_intrinsics: true };
    let stats = collect_attribute_stats(&fixture.open().unwrap(), &fixture.meta(), &options).unwrap();

    let name = &stats.attributes["name"];
    assert_eq!(name.count, 3);
    assert_eq!(name.cardinality(), 2);
    assert_eq!(stats.attributes["kind"].values_int.len(), 1);
    assert_eq!(stats.attributes["scope.name"].count, 2);
    assert_eq!(stats.attributes["event.name"].scope_mask, ScopeMask::EVENT);
}

#[test]
fn test_index_is_deterministic() {
    let fixture = all_scopes_block();
    let file = fixture.open().unwrap();
    let options = CollectOptions::default();

    for kind in [IndexKind::Combined, IndexKind::Rows, IndexKind::Codes] {
        let first = generate_index(&collect_attribute_stats(&file, &fixture.meta(), &options).unwrap(), kind);
        let second = generate_index(&collect_attribute_stats(&file, &fixture.meta(), &options).unwrap(), kind);
        assert_eq!(first, second, "{kind}");

        let keys: Vec<_> = first.attributes.iter().map(|a| a.key.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "{kind}");
    }

    let codes = generate_index(
        &collect_attribute_stats(&file, &fixture.meta(), &options).unwrap(),
        IndexKind::Codes,
    );
    let status = codes.get("http.status_code").unwrap();
    let coded: Vec<_> = status.values_int.iter().map(|v| (v.value[0], v.value_code)).collect();
    assert_eq!(coded, vec![(200, Some(1)), (500, Some(2))]);
    assert!(status.values_int.iter().all(|v| v.row_numbers.is_none()));
}

#[test]
fn test_index_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = all_scopes_block();
    fixture.write_to_dir(dir.path()).unwrap();

    let file = parquetquery::open_file(std::fs::File::open(dir.path().join("data.parquet")).unwrap()).unwrap();
    let stats = collect_attribute_stats(&file, &fixture.meta(), &CollectOptions::default()).unwrap();

    let index = generate_rows_index(&stats);
    let path = write_attribute_index(dir.path(), &index).unwrap();
    assert_eq!(path, dir.path().join("index.parquet"));
    assert_eq!(read_rows_index(&path).unwrap(), index);

    let combined = generate_index(&stats, IndexKind::Combined);
    write_attribute_index(dir.path(), &combined).unwrap();
    assert_eq!(read_attribute_index(&path).unwrap(), combined);
    assert!(matches!(read_rows_index(&path), Err(Error::InvalidIndex(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_analyse_block_from_storage() {
    let root = tempfile::tempdir().unwrap();
    let fixture = get_spans_block(Version::V4);
    fixture.write_block(root.path()).unwrap();
    BlockFixture::new(Version::V4)
        .with_block_id("0a0a0a0a-0000-0000-0000-000000000000")
        .with_trace(trace_with_spans("svc", vec![Span::new("op")]))
        .write_block(root.path())
        .unwrap();

    let store = create_local_store(root.path().to_str().unwrap()).unwrap();
    let storage = TempoStorage::new(store, "");

    let blocks = storage.list_blocks(TEST_TENANT_ID).await.unwrap();
    assert_eq!(blocks, vec!["0a0a0a0a-0000-0000-0000-000000000000", TEST_BLOCK_ID]);

    let block = BlockInfo::new(TEST_BLOCK_ID, TEST_TENANT_ID);
    let BlockStatus::Live(meta) = storage.block_status(&block).await.unwrap() else {
        panic!("block should be live");
    };
    assert_eq!(meta.total_objects, 10);

    let reader = storage
        .data_reader(&block, Handle::current(), 64 * 1024, 4)
        .await
        .unwrap();
    let summary = tokio::task::spawn_blocking(move || {
        let file = parquetquery::open_file(reader)?;
        analyse_block(&file, &meta)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.span.attributes["http.method"], 3000);
}
