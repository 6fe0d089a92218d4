//! Common utilities for benchmarks.
//!
//! Provides test data generators with fixed seeds for reproducibility.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed seed for reproducible benchmark data
const SEED: u64 = 42;

/// Create a seeded RNG for reproducible test data
pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

/// Generate a single-file patch with `hunk_count` hunks of `hunk_lines`
/// body lines each, separated by 20 unchanged (omitted) lines.
///
/// Hunk headers carry correct start/count arithmetic so gap computation
/// over the result is valid.
pub fn generate_file_patch(hunk_count: usize, hunk_lines: usize) -> String {
    let mut rng = seeded_rng();
    let mut out = Vec::new();
    let mut old_line = 21u32;
    let mut new_line = 21u32;

    for _ in 0..hunk_count {
        let mut body = Vec::with_capacity(hunk_lines);
        let mut old_count = 0u32;
        let mut new_count = 0u32;

        for i in 0..hunk_lines {
            let content = generate_code_line(&mut rng, i);
            let line_type: u8 = rng.random_range(0..10);
            match line_type {
                0..=1 => {
                    body.push(format!("+{}", content));
                    new_count += 1;
                }
                2..=3 => {
                    body.push(format!("-{}", content));
                    old_count += 1;
                }
                _ => {
                    body.push(format!(" {}", content));
                    old_count += 1;
                    new_count += 1;
                }
            }
        }

        out.push(format!(
            "@@ -{},{} +{},{} @@",
            old_line, old_count, new_line, new_count
        ));
        out.extend(body);
        old_line += old_count + 20;
        new_line += new_count + 20;
    }

    out.join("\n")
}

/// Generate a patch with roughly `line_count` total lines.
pub fn generate_patch_with_lines(line_count: usize) -> String {
    let hunk_lines = 49;
    let hunk_count = line_count.div_ceil(hunk_lines + 1).max(1);
    generate_file_patch(hunk_count, hunk_lines)
}

/// Generate a multi-file unified diff in `git diff` format.
pub fn generate_multi_file_diff(file_count: usize) -> String {
    let mut out = String::new();
    for i in 0..file_count {
        let path = format!("src/module_{}.rs", i);
        out.push_str(&format!("diff --git a/{path} b/{path}\n"));
        out.push_str("index 1234567..abcdefg 100644\n");
        out.push_str(&format!("--- a/{path}\n"));
        out.push_str(&format!("+++ b/{path}\n"));
        out.push_str(&generate_file_patch(3, 30));
        out.push('\n');
    }
    out
}

/// Generate a line of realistic Rust-like code
fn generate_code_line(rng: &mut StdRng, line_num: usize) -> String {
    let templates = [
        format!("    let value_{} = compute({});", line_num, line_num),
        format!("    if condition_{} {{", line_num),
        format!("        return Ok(result_{});", line_num),
        "    }".to_string(),
        format!("    // step {}", line_num),
        format!("    items.push(Item::new({}));", line_num),
    ];
    templates[rng.random_range(0..templates.len())].clone()
}
