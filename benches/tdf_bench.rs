use std::collections::BTreeMap;

use blaze_protocol::core::label::Label;
use blaze_protocol::core::tdf::{decode_all, encode_all, Tdf, TdfGroup, TdfList};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const ATTR: Label = Label::from_static("ATTR");
const GID: Label = Label::from_static("GID");
const NAME: Label = Label::from_static("NAME");
const PROS: Label = Label::from_static("PROS");

/// Roughly the shape of a game setup notification.
fn setup_like_records(players: usize) -> Vec<Tdf> {
    let attributes: BTreeMap<String, String> = (0..12)
        .map(|i| (format!("ME3attr{i}"), format!("value{i}")))
        .collect();
    let roster = (0..players)
        .map(|i| {
            TdfGroup::new(vec![
                Tdf::varint(GID, 0x4000_0000 + i as i64),
                Tdf::string(NAME, format!("Player{i}")),
                Tdf::triple(Label::from_static("ULST"), 4, 1, i as i64),
                Tdf::varint_list(Label::from_static("LIST"), (0..8).collect()),
            ])
        })
        .collect();

    vec![
        Tdf::group(
            Label::from_static("GAME"),
            vec![Tdf::string_map(ATTR, &attributes), Tdf::varint(GID, 1)],
        ),
        Tdf::list(PROS, TdfList::Group(roster)),
    ]
}

#[allow(clippy::unwrap_used)]
fn bench_tdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdf");
    for players in [1usize, 4, 64] {
        let records = setup_like_records(players);
        let encoded = encode_all(&records);
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_function(format!("encode_{players}_players"), |b| {
            b.iter(|| encode_all(black_box(&records)))
        });
        group.bench_function(format!("decode_{players}_players"), |b| {
            b.iter(|| decode_all(black_box(&encoded)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tdf);
criterion_main!(benches);
