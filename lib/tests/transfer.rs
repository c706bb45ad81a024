use neural_style as ns;
use std::sync::{Arc, Mutex};

fn gradient(width: u32, height: u32) -> ns::image::RgbImage {
    ns::image::RgbImage::from_fn(width, height, |x, y| {
        ns::image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    })
}

fn stripes(width: u32, height: u32) -> ns::image::RgbImage {
    ns::image::RgbImage::from_fn(width, height, |x, _y| {
        if (x / 2) % 2 == 0 {
            ns::image::Rgb([230, 40, 40])
        } else {
            ns::image::Rgb([20, 20, 200])
        }
    })
}

fn layer(name: &str) -> ns::Layer {
    name.parse().expect("valid layer")
}

// Shallow layers keep the untrained extractor cheap
fn shallow<'a>() -> ns::SessionBuilder<'a> {
    ns::Session::builder()
        .feature_weights(ns::FeatureWeights::Untrained { seed: 11 })
        .content_layer(layer("block3_conv1"))
        .style_layers(vec![
            ns::StyleLayer::new(layer("block1_conv1"), 0.5),
            ns::StyleLayer::new(layer("block2_conv1"), 0.6),
        ])
}

#[test]
fn runs_every_iteration() {
    let generated = shallow()
        .content(gradient(24, 20))
        .style(stripes(40, 40))
        .iterations(5)
        .snapshot_every(2)
        .learning_rate(2.0)
        .build()
        .unwrap()
        .run(None);

    assert_eq!(generated.costs().len(), 5);
    assert!(generated
        .costs()
        .iter()
        .all(|c| c.total.is_finite() && c.content.is_finite() && c.style.is_finite()));

    let iterations: Vec<_> = generated.snapshots().iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, vec![0, 2, 4]);

    // the style image is resized to the content, never the other way around
    assert_eq!(generated.as_ref().dimensions(), (24, 20));
}

#[test]
fn starts_from_the_content_image() {
    let generated = shallow()
        .content(gradient(16, 16))
        .style(stripes(16, 16))
        .iterations(1)
        .build()
        .unwrap()
        .run(None);

    // nothing has moved the canvas away from the content when it's first measured
    assert!(generated.costs()[0].content.abs() < 1e-6);
}

#[test]
fn style_cost_goes_down() {
    let generated = shallow()
        .content(ns::image::RgbImage::from_pixel(
            16,
            16,
            ns::image::Rgb([128, 128, 128]),
        ))
        .style(stripes(16, 16))
        .content_weight(0.0)
        .style_weight(1.0)
        .learning_rate(4.0)
        .iterations(10)
        .build()
        .unwrap()
        .run(None);

    let costs = generated.costs();
    let first = costs[0].style;
    let last = costs[costs.len() - 1].style;
    assert!(last < first, "style cost went from {} to {}", first, last);
}

#[test]
fn resize_content_sets_the_output_size() {
    let generated = shallow()
        .content(gradient(40, 30))
        .style(stripes(10, 50))
        .resize_content(ns::Dims::new(20, 18))
        .iterations(1)
        .build()
        .unwrap()
        .run(None);

    assert_eq!(generated.into_image().to_rgb8().dimensions(), (20, 18));
}

#[test]
fn reports_progress() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let progress = {
        let seen = Arc::clone(&seen);
        move |update: ns::ProgressUpdate<'_>| {
            seen.lock().unwrap().push((
                update.iterations.current,
                update.iterations.total,
                update.image.is_some(),
            ));
        }
    };

    shallow()
        .content(gradient(16, 16))
        .style(stripes(16, 16))
        .init(ns::Init::Noise { ratio: 0.6 })
        .seed(3)
        .iterations(3)
        .snapshot_every(2)
        .build()
        .unwrap()
        .run(Some(Box::new(progress)));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(1, 3, true), (2, 3, false), (3, 3, true)]
    );
}

#[test]
fn rejects_bad_parameters() {
    let base = || {
        ns::Session::builder()
            .content(gradient(32, 32))
            .style(stripes(32, 32))
            .feature_weights(ns::FeatureWeights::Untrained { seed: 0 })
    };

    for (builder, name) in vec![
        (base().iterations(0), "iterations"),
        (base().snapshot_every(0), "snapshot-every"),
        (base().learning_rate(-1.0), "learning-rate"),
        (base().style_weight(f32::NAN), "style-weight"),
        (base().init(ns::Init::Noise { ratio: 1.5 }), "noise-ratio"),
    ] {
        match builder.build() {
            Err(ns::Error::InvalidRange(ir)) => {
                assert!(ir.to_string().contains(name), "{} vs {}", ir, name);
            }
            Err(other) => panic!("{}: unexpected error {}", name, other),
            Ok(_) => panic!("{}: session was built", name),
        }
    }

    assert!(matches!(
        base().style_layers(Vec::new()).build(),
        Err(ns::Error::NoStyleLayers)
    ));
}

#[test]
fn rejects_missing_inputs() {
    assert!(matches!(
        ns::Session::builder()
            .content(gradient(32, 32))
            .style(stripes(32, 32))
            .build(),
        Err(ns::Error::MissingWeights)
    ));

    assert!(matches!(
        ns::Session::builder()
            .style(stripes(32, 32))
            .feature_weights(ns::FeatureWeights::Untrained { seed: 0 })
            .build(),
        Err(ns::Error::MissingImage("content"))
    ));

    assert!(matches!(
        ns::Session::builder()
            .content(gradient(32, 32))
            .style(stripes(32, 32))
            .weights(&"vgg19.h5")
            .build(),
        Err(ns::Error::UnsupportedWeightsFormat(_))
    ));
}

#[test]
fn rejects_tiny_content() {
    let err = shallow()
        .content(gradient(12, 40))
        .style(stripes(32, 32))
        .build()
        .err()
        .expect("12 pixels can't survive four poolings");

    assert!(matches!(err, ns::Error::ImageTooSmall(_)));
}
