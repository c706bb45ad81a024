use neural_style as ns;

fn main() -> Result<(), ns::Error> {
    // Even a random network captures enough texture statistics to move some
    // colors around, no download required
    let session = ns::Session::builder()
        .content(&"imgs/lotus.jpg")
        .style(&"imgs/style.jpg")
        .feature_weights(ns::FeatureWeights::Untrained { seed: 7 })
        .input_convention(ns::InputConvention::Caffe)
        .resize_content(ns::Dims::new(256, 256))
        .iterations(300)
        .snapshot_every(50)
        .build()?;

    session.run(None).save("out/03.png")
}
