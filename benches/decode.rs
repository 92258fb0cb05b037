use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::io::Cursor;

use gcquant::io::agilent::{decode_spectra, decode_trace};

const SCANS: usize = 2000;
const IONS_PER_SCAN: usize = 300;

/// A `DATA.MS` image with `SCANS` records of `IONS_PER_SCAN` ions each
fn synthetic_data_ms() -> Vec<u8> {
    let data_start = 0x200usize;
    let mut buffer = vec![0u8; data_start];
    buffer[0x05..0x09].copy_from_slice(b"GC /");
    buffer[0x118..0x11A].copy_from_slice(&(SCANS as u16).to_be_bytes());
    buffer[0x10A..0x10C].copy_from_slice(&((data_start as u16 + 2) / 2).to_be_bytes());

    for scan in 0..SCANS {
        let words = 14 + 2 * IONS_PER_SCAN;
        buffer.extend_from_slice(&(words as u16).to_be_bytes());
        buffer.extend_from_slice(&(6000 * (scan as u32 + 1)).to_be_bytes());
        buffer.extend_from_slice(&[0u8; 12]);
        let mut total = 0u32;
        for ion in 0..IONS_PER_SCAN {
            let channel = 600 + 20 * ((ion + scan) % 500) as u16;
            let raw = ((ion * 37 + scan) % 0x3FFF) as u16 | (((ion % 3) as u16) << 14);
            total = total.wrapping_add(raw as u32);
            buffer.extend_from_slice(&channel.to_be_bytes());
            buffer.extend_from_slice(&raw.to_be_bytes());
        }
        buffer.extend_from_slice(&[0u8; 6]);
        buffer.extend_from_slice(&total.to_be_bytes());
    }
    buffer
}

fn decoding(c: &mut Criterion) {
    let data = synthetic_data_ms();
    c.bench_function("decode_trace", |b| {
        b.iter(|| {
            let trace = decode_trace(Cursor::new(black_box(data.as_slice()))).unwrap();
            assert_eq!(trace.len(), SCANS);
        })
    });
    c.bench_function("decode_spectra", |b| {
        b.iter(|| {
            let spectra = decode_spectra(Cursor::new(black_box(data.as_slice()))).unwrap();
            assert_eq!(spectra.nnz(), SCANS * IONS_PER_SCAN);
        })
    });
}

criterion_group!(benches, decoding);
criterion_main!(benches);
