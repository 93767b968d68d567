/// Strip blank and whitespace-only lines from scraped text.
///
/// Every line is trimmed, empty lines are dropped and the survivors are
/// joined with a single `\n`. Word order and line content are untouched.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "\n\n\n",
        "single line",
        "  padded  ",
        "Hu Tao is a Pyro character.\n\nShe uses a polearm.",
        "a\r\nb\r\n\r\n  c  \n",
        "\t tabs \t\n\n\t\n  mixed   inner   spacing  ",
        "Best Artifacts\n \n  Crimson Witch of Flames (4)\n\n\n\nTalent Priority\n",
    ];

    #[test]
    fn test_drops_blank_lines() {
        let out = normalize("Hu Tao is a Pyro character.\n\nShe uses a polearm.");
        assert_eq!(out, "Hu Tao is a Pyro character.\nShe uses a polearm.");
    }

    #[test]
    fn test_trims_each_line() {
        assert_eq!(normalize("  a  \n\tb\t"), "a\nb");
    }

    #[test]
    fn test_handles_crlf() {
        assert_eq!(normalize("a\r\nb\r\n\r\nc"), "a\nb\nc");
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n \t \n"), "");
    }

    #[test]
    fn test_inner_spacing_preserved() {
        assert_eq!(normalize("  mixed   inner  "), "mixed   inner");
    }

    #[test]
    fn test_idempotent() {
        for sample in SAMPLES {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }
}
