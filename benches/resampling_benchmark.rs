use std::path::PathBuf;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use eeg_pageserver::access::RequiredAccess;
use eeg_pageserver::block::HEADER_BYTES;
use eeg_pageserver::codec;
use eeg_pageserver::crc;
use eeg_pageserver::io::WriteBuffer;
use eeg_pageserver::model::{BlockIndexEntry, Channel, Segment};
use eeg_pageserver::renderer::render_channel_page;

fn write_block(buf: &mut Vec<u8>, samples: &[i32], start_time_raw: i64) -> (u64, u32) {
    let offset = buf.len() as u64;
    let payload = codec::encode(samples);
    let block_bytes = (HEADER_BYTES + payload.len()) as u32;
    let mut body = Vec::new();
    body.write_le_u32(block_bytes).unwrap();
    body.write_le_u32(samples.len() as u32).unwrap();
    body.write_le_u64(0).unwrap();
    body.write_le_i64(start_time_raw).unwrap();
    let mut crc_input = body.clone();
    crc_input.extend_from_slice(&payload);
    let checksum = crc::checksum(&crc_input);
    body.write_le_u32(checksum).unwrap();
    body.extend_from_slice(&payload);
    buf.extend_from_slice(&body);
    (offset, block_bytes)
}

fn build_fixture(dir: &std::path::Path, fs: f64, block_len: usize, num_blocks: usize) -> Channel {
    let mut buf = Vec::new();
    let mut indices = Vec::with_capacity(num_blocks);
    for b in 0..num_blocks {
        let samples: Vec<i32> = (0..block_len).map(|i| ((b * block_len + i) % 4096) as i32).collect();
        let start_time = (b * block_len) as i64 * 1_000_000 / fs as i64;
        let (offset, block_bytes) = write_block(&mut buf, &samples, start_time);
        indices.push(BlockIndexEntry {
            start_time_raw: start_time,
            start_sample_relative: (b * block_len) as u64,
            file_offset: offset,
            block_bytes,
            number_of_samples: block_len as u32,
        });
    }
    let path = dir.join("bench_seg0.bin");
    std::fs::write(&path, &buf).unwrap();
    let total_samples = (num_blocks * block_len) as u64;
    let end_time = (total_samples as i64) * 1_000_000 / fs as i64;
    Channel {
        name: "bench".into(),
        sampling_freq_hz: fs,
        earliest_start_time: 0,
        latest_end_time: end_time,
        acquisition_channel_number: 0,
        units_conversion_factor: 1.0,
        recording_time_offset: 0,
        required_access: RequiredAccess::None,
        segments: vec![Segment {
            payload_path: path,
            start_sample: 0,
            number_of_samples: total_samples,
            time_series_indices: indices,
            maximum_block_samples: block_len as u32,
            header_bytes: 0,
        }],
    }
}

fn bench_render_page(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let channel = build_fixture(dir.path(), 1000.0, 4096, 50);
    let samples_per_page = 2048u32;
    let mut page = vec![0f32; samples_per_page as usize];

    let mut group = c.benchmark_group("channel_renderer");
    group.sample_size(30).measurement_time(Duration::new(10, 0));
    group.bench_function("render_channel_page_single_segment", |b| {
        b.iter(|| {
            render_channel_page(
                black_box(&channel),
                black_box(0),
                black_box(2_000_000),
                black_box(samples_per_page),
                &mut page,
                1,
                0,
            )
            .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_render_page);
criterion_main!(benches);
