use std::io::Write;

use chto_crypto::{
    derive_key, encrypt, AeadCipher, ChunkSealer, Cipher, CipherKey, EncryptOptions, Engine,
    FormatPolicy, KdfParams,
};
use secrecy::SecretSlice;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn fast_engine() -> Engine {
    Engine::new(FormatPolicy {
        kdf: KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        },
        ..FormatPolicy::V1
    })
}

#[divan::bench(args = [Cipher::Aes256Gcm, Cipher::ChaCha20Poly1305])]
fn bench_seal_chunks(bencher: divan::Bencher, cipher: Cipher) {
    let key = CipherKey::from_bytes([0xABu8; 32]);
    let data = make_data(1 << 20);
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench(|| {
            let mut sealer = ChunkSealer::new(
                Vec::with_capacity(data.len() + 1024),
                AeadCipher::new(cipher, &key),
                [0u8; 12],
                FormatPolicy::V1.chunk_size,
            );
            sealer.write_all(divan::black_box(&data)).unwrap();
            sealer.finish().unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_container(bencher: divan::Bencher, size: usize) {
    let engine = fast_engine();
    let password = SecretSlice::from(b"benchmark password".to_vec());
    let data = make_data(size);
    let options = EncryptOptions::default();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let mut out = Vec::with_capacity(size + 1024);
            engine
                .encrypt(divan::black_box(&data[..]), &mut out, &password, &options)
                .unwrap();
            out
        });
}

#[divan::bench(sample_count = 10)]
fn bench_derive_key_v1() {
    let password = SecretSlice::from(b"benchmark password".to_vec());
    derive_key(
        divan::black_box(&password),
        divan::black_box(&[7u8; 16]),
        &KdfParams::V1,
    )
    .unwrap();
}

#[divan::bench(sample_count = 10)]
fn bench_encrypt_cascade_v1() {
    let password = SecretSlice::from(b"benchmark password".to_vec());
    let options = EncryptOptions {
        cascade: true,
        ..EncryptOptions::default()
    };
    encrypt(&b"small"[..], Vec::new(), &password, &options).unwrap();
}

fn main() {
    divan::main();
}
