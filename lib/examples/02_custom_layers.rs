use neural_style as ns;

fn main() -> Result<(), ns::Error> {
    let layer = |name: &str| name.parse::<ns::Layer>();

    let session = ns::Session::builder()
        .content(&"imgs/lotus.jpg")
        .style(&"imgs/style.jpg")
        .weights(&"vgg19.mpk")
        // compare content a bit earlier in the network, which keeps finer details
        .content_layer(layer("block4_conv2")?)
        // and only use the shallow layers for style, favoring small textures
        .style_layers(vec![
            ns::StyleLayer::new(layer("block1_conv1")?, 1.0),
            ns::StyleLayer::new(layer("block2_conv1")?, 0.75),
            ns::StyleLayer::new(layer("block3_conv1")?, 0.5),
        ])
        .content_weight(1e-4)
        .learning_rate(8.0)
        // start from a noisy version of the content
        .init(ns::Init::Noise { ratio: 0.6 })
        .seed(42)
        .build()?;

    let generated = session.run(Some(Box::new(|update: ns::ProgressUpdate<'_>| {
        if update.image.is_some() {
            println!(
                "{}/{} total {} style {} content {}",
                update.iterations.current,
                update.iterations.total,
                update.costs.total,
                update.costs.style,
                update.costs.content
            );
        }
    })));

    let mut costs = std::fs::File::create("out/02_costs.csv")?;
    generated.write_costs(&mut costs)?;
    generated.save("out/02.png")
}
