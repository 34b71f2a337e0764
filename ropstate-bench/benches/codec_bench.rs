//! ROP codec encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ropstate_codec::property::tags;
use ropstate_codec::table::{QueryRowsRequest, QueryRowsResponse, RestrictRequest};
use ropstate_codec::{
    BookmarkOrigin, Decode, DecodeWith, Encode, EncodeWith, FuzzyLevel, PropertyRow,
    PropertyTag, PropertyValue, QueryRowsFlags, RelOp, Restriction, RopBuffer, RopHeader,
    RopResponse, TableFlags, TableRequest, TableResponse, TaggedPropertyValue,
};

const COLUMNS: [PropertyTag; 3] = [tags::SUBJECT, tags::DISPLAY_NAME, tags::MESSAGE_SIZE];

fn create_rows(count: usize) -> Vec<PropertyRow> {
    (0..count)
        .map(|i| {
            PropertyRow::Standard(vec![
                PropertyValue::Unicode(format!("subject {}", i)),
                PropertyValue::Unicode("sender".repeat(4)),
                PropertyValue::Integer32(i as i32),
            ])
        })
        .collect()
}

fn create_query_rows_response(count: usize) -> TableResponse {
    TableResponse::QueryRows(RopResponse::success(
        0,
        QueryRowsResponse {
            origin: BookmarkOrigin::Current,
            rows: create_rows(count),
        },
    ))
}

fn create_restriction(depth: usize) -> Restriction {
    let leaf = Restriction::Content {
        fuzzy_level: FuzzyLevel::new(FuzzyLevel::SUBSTRING, FuzzyLevel::IGNORECASE),
        tag: tags::SUBJECT,
        value: TaggedPropertyValue::new(tags::SUBJECT, PropertyValue::Unicode("report".into())),
    };
    (0..depth).fold(leaf, |inner, i| {
        Restriction::And(vec![
            inner,
            Restriction::Property {
                relop: RelOp::GreaterThan,
                tag: tags::MESSAGE_SIZE,
                value: TaggedPropertyValue::new(
                    tags::MESSAGE_SIZE,
                    PropertyValue::Integer32(i as i32),
                ),
            },
        ])
    })
}

fn bench_query_rows_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_rows_encode");

    for count in [10, 100, 1000] {
        let response = create_query_rows_response(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &response, |b, response| {
            b.iter(|| black_box(response.to_bytes_with(&COLUMNS[..]).unwrap()));
        });
    }

    group.finish();
}

fn bench_query_rows_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_rows_decode");

    for count in [10, 100, 1000] {
        let encoded: Bytes = create_query_rows_response(count)
            .to_bytes_with(&COLUMNS[..])
            .unwrap();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &encoded, |b, encoded| {
            b.iter(|| {
                black_box(TableResponse::decode_at_with(encoded, 0, &COLUMNS[..]).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_restriction_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("restrict_request");

    for depth in [1, 8, 32] {
        let request = TableRequest::Restrict(RestrictRequest {
            header: RopHeader::new(0, 0),
            flags: TableFlags::new(),
            restriction: Some(create_restriction(depth)),
        });

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &request, |b, request| {
            b.iter(|| {
                let bytes = request.to_bytes().unwrap();
                black_box(TableRequest::decode_at(&bytes, 0).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_buffer_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_decode");

    for rops in [1, 16, 128] {
        let requests: Vec<TableRequest> = (0..rops)
            .map(|_| {
                TableRequest::QueryRows(QueryRowsRequest {
                    header: RopHeader::new(0, 0),
                    flags: QueryRowsFlags::new(),
                    forward_read: true,
                    row_count: 50,
                })
            })
            .collect();
        let encoded = RopBuffer::from_rops(&requests, vec![0x10])
            .unwrap()
            .to_bytes()
            .unwrap();

        group.throughput(Throughput::Elements(rops as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rops), &encoded, |b, encoded| {
            b.iter(|| {
                let (buffer, _) = RopBuffer::decode_at(encoded, 0).unwrap();
                black_box(buffer.decode_rops::<TableRequest>().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_query_rows_encode,
    bench_query_rows_decode,
    bench_restriction_roundtrip,
    bench_buffer_decode,
);

criterion_main!(benches);
