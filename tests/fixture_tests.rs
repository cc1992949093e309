use serde::Deserialize;
use std::fs;
use textmark::textile_to_html;

#[derive(Debug, Deserialize)]
struct FixtureCase {
    name: String,
    textile: String,
    html: String,
}

#[test]
fn textile_fixture_cases() {
    let data = fs::read_to_string("tests/data/cases.json").expect("Failed to read cases.json");
    let cases: Vec<FixtureCase> = serde_json::from_str(&data).expect("Failed to parse cases.json");

    let mut failures = Vec::new();
    for case in &cases {
        let result = textile_to_html(&case.textile);
        if result != case.html {
            eprintln!("\n❌ {} failed", case.name);
            eprintln!("  Input: {:?}", case.textile);
            eprintln!("  Expected: {:?}", case.html);
            eprintln!("  Got: {:?}", result);
            failures.push(case.name.as_str());
        }
    }

    eprintln!(
        "\n📊 Fixture results: {} passed, {} failed",
        cases.len() - failures.len(),
        failures.len()
    );
    assert!(failures.is_empty(), "failing cases: {:?}", failures);
}
