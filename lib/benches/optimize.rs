use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};
use neural_style as ns;

fn iterations(c: &mut Criterion) {
    static DIM: u32 = 32;

    // Build the inputs once to reduce variation between runs, though we still
    // do a memcpy each run
    let content = ns::image::DynamicImage::ImageRgb8(ns::image::RgbImage::from_fn(
        DIM,
        DIM,
        |x, y| ns::image::Rgb([(x * 8) as u8, (y * 8) as u8, 128]),
    ));
    let style = ns::image::DynamicImage::ImageRgb8(ns::image::RgbImage::from_fn(
        DIM,
        DIM,
        |x, _y| {
            if (x / 4) % 2 == 0 {
                ns::image::Rgb([230, 40, 40])
            } else {
                ns::image::Rgb([20, 20, 200])
            }
        },
    ));

    let mut group = c.benchmark_group("iterations");
    group.sample_size(10);

    for count in [1u32, 5, 10].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_custom(|iters| {
                let mut total_elapsed = Duration::new(0, 0);
                for _i in 0..iters {
                    let sess = ns::Session::builder()
                        .content(content.clone())
                        .style(style.clone())
                        .feature_weights(ns::FeatureWeights::Untrained { seed: 120 })
                        .iterations(count)
                        .build()
                        .unwrap();

                    // Only the optimization is timed, not loading the extractor
                    let start = Instant::now();
                    black_box(sess.run(None));
                    total_elapsed += start.elapsed();
                }

                total_elapsed
            });
        });
    }
    group.finish();
}

criterion_group!(benches, iterations);
criterion_main!(benches);
