use crate::config::TestRequirements;
use crate::discovery::SourceUnit;

/// Renders the generation prompt for one unit.
///
/// Pure: the same unit content and requirements always produce the same
/// text, so retries and backend fallback re-send identical intent.
pub fn build_prompt(unit: &SourceUnit, req: &TestRequirements) -> String {
    let header = unit.header_name();
    let symbols = req.symbols.join(", ");
    let per_symbol = if req.symbols.is_empty() {
        req.test_count
    } else {
        req.test_count / req.symbols.len()
    };
    let first_symbol = req.symbols.first().map(String::as_str).unwrap_or("add");

    let includes = req
        .required_includes(&header)
        .iter()
        .map(|i| format!("`{i}`"))
        .collect::<Vec<_>>()
        .join(", ");

    let lines = [
        "You are an expert C++ programmer tasked with generating unit tests using Google Test for the provided C++ code. Follow these requirements strictly:".to_string(),
        format!("- Use {} standard.", pretty_standard(&req.language_standard)),
        format!("- Include exactly these headers: {includes}."),
        format!(
            "- Use `TEST` macros with descriptive names (e.g., `TEST({}, Add_PositiveNumbers)`).",
            req.suite_name
        ),
        format!("- Write tests for these methods only: {symbols}."),
        format!(
            "- Write exactly {} test cases ({} per method): one for positive inputs and one for negative inputs.",
            req.test_count, per_symbol
        ),
        "- Avoid edge cases involving INT_MIN or INT_MAX to prevent integer overflow issues.".to_string(),
        "- Ensure each `TEST` macro has complete braces `{}` and valid assertions (`EXPECT_EQ`).".to_string(),
        "- Output a complete, syntactically correct .cpp file without Markdown code fences, comments outside test code, or extra text.".to_string(),
        "- Example format:".to_string(),
        req.required_includes(&header).join("\n"),
        format!("TEST({}, Add_PositiveNumbers) {{", req.suite_name),
        "    Calculator calc;".to_string(),
        format!("    EXPECT_EQ(calc.{first_symbol}(2, 3), 5);"),
        "}".to_string(),
        String::new(),
        "**Code to test:**".to_string(),
        unit.content.clone(),
        String::new(),
        "Generate the unit test code as a valid .cpp file following the example format exactly.".to_string(),
    ];

    lines.join("\n")
}

fn pretty_standard(std: &str) -> String {
    std.strip_prefix("c++")
        .map(|v| format!("C++{v}"))
        .unwrap_or_else(|| std.to_string())
}
