use cv_crypto::{decrypt, encrypt, generate_key_pair, generate_session_key, wrap_key};
use rand::rngs::OsRng;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_payload(bencher: divan::Bencher, size: usize) {
    let key = generate_session_key(&mut OsRng).unwrap();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(&mut OsRng, divan::black_box(&key), divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_payload(bencher: divan::Bencher, size: usize) {
    let key = generate_session_key(&mut OsRng).unwrap();
    let data = make_data(size);
    let sealed = encrypt(&mut OsRng, &key, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt(
                divan::black_box(&key),
                divan::black_box(&sealed.ciphertext),
                &sealed.iv,
                &sealed.tag,
            )
            .unwrap()
        });
}

#[divan::bench(args = [2048, 3072])]
fn bench_wrap_session_key(bencher: divan::Bencher, bits: usize) {
    let pair = generate_key_pair(&mut OsRng, bits).unwrap();
    let session = generate_session_key(&mut OsRng).unwrap();
    bencher.bench(|| {
        wrap_key(
            &mut OsRng,
            divan::black_box(session.as_bytes()),
            &pair.public,
        )
        .unwrap()
    });
}

fn main() {
    divan::main();
}
