use neural_style as ns;

fn main() -> Result<(), ns::Error> {
    let session = ns::Session::builder()
        // the image whose layout we want to keep
        .content(&"imgs/lotus.jpg")
        // the artwork whose colors and brush strokes we want
        .style(&"imgs/style.jpg")
        // torchvision's VGG19, see `neural-style convert-weights` for a faster loading format
        .weights(&"vgg19.pth")
        .build()?;

    // run the default 2000 iterations of Adam on the pixels
    let generated = session.run(None);

    // save the result, as well as every 200th iteration
    generated.save_snapshots("out/01")?;
    generated.save("out/01.jpg")
}
