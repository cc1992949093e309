use std::io::{self, Read};
use textmark::document::Options;
use textmark::renderer::HtmlRenderer;

fn main() {
    env_logger::init();

    let dump_tree = std::env::args().skip(1).any(|arg| arg == "--ast");

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .expect("Failed to read stdin");

    let nodes = textmark::parse(&input, Options::default());
    if dump_tree {
        let json = serde_json::to_string_pretty(&nodes).expect("Failed to serialize tree");
        println!("{}", json);
    } else {
        print!("{}", HtmlRenderer::new().render(&nodes));
    }
}
