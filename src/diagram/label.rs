use heck::{ToTitleCase, ToUpperCamelCase};
use textwrap::{Options, WrapAlgorithm};

/// Maximum characters per label line.
pub const LABEL_LINE_MAX_CHARS: usize = 15;
/// Maximum number of label lines.
pub const LABEL_MAX_LINES: usize = 5;
/// Height added to an image node per label line, in inches.
pub const LABEL_LINE_HEIGHT: f64 = 0.23;

/// Rendered node label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalledLabel {
    pub label: String,
    pub lines: usize,
}

/// Splits an identifier into words at separators, case changes and digit
/// boundaries: `MyBucket2Logs` -> `My Bucket 2 Logs`.
pub fn split_words(text: &str) -> Vec<String> {
    separate_digits(text)
        .to_title_case()
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Word segmentation keeps digits on the preceding word; split them off.
fn separate_digits(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if let Some(p) = prev
            && ((p.is_alphabetic() && c.is_numeric()) || (p.is_numeric() && c.is_alphabetic()))
        {
            out.push(' ');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn truncate(line: &str) -> String {
    if line.chars().count() > LABEL_LINE_MAX_CHARS {
        let head: String = line.chars().take(LABEL_LINE_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}

/// Wraps a construct id into a compact multi-line label.
pub fn marshall_label(original: &str) -> MarshalledLabel {
    let words = split_words(original).join(" ");
    // Greedy fill; words longer than a line keep a line of their own.
    let options = Options::new(LABEL_LINE_MAX_CHARS)
        .break_words(false)
        .wrap_algorithm(WrapAlgorithm::FirstFit);
    let wrapped = textwrap::wrap(&words, options);

    let kept = wrapped.len().min(LABEL_MAX_LINES).max(1);
    let mut lines: Vec<String> = wrapped
        .iter()
        .take(kept)
        .map(|line| truncate(&line.to_upper_camel_case()))
        .collect();
    if wrapped.len() > kept
        && let Some(last) = lines.last_mut()
        && !last.ends_with("...")
    {
        last.push_str("...");
    }

    MarshalledLabel {
        label: lines.join("\n"),
        lines: kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_camel_case_and_digits() {
        assert_eq!(split_words("MyBucket2Logs"), vec!["My", "Bucket", "2", "Logs"]);
        assert_eq!(split_words("HTTPServer"), vec!["Http", "Server"]);
        assert_eq!(split_words("my-stack_name"), vec!["My", "Stack", "Name"]);
        assert_eq!(split_words("S3Bucket"), vec!["S", "3", "Bucket"]);
    }

    #[test]
    fn short_label_is_one_line() {
        let label = marshall_label("Bucket");
        assert_eq!(label.label, "Bucket");
        assert_eq!(label.lines, 1);
    }

    #[test]
    fn long_label_wraps_and_removes_spaces() {
        let label = marshall_label("ApiGatewayRestApiDeploymentStage");
        assert_eq!(label.label, "ApiGateway\nRestApi\nDeployment\nStage");
        assert_eq!(label.lines, 4);
    }

    #[test]
    fn overflowing_lines_are_ellipsed() {
        let id = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi";
        let label = marshall_label(id);
        assert_eq!(label.lines, LABEL_MAX_LINES);
        assert_eq!(label.label.lines().count(), LABEL_MAX_LINES);
        assert!(label.label.ends_with("..."));
        assert!(label.label.starts_with("AlphaBeta\nGammaDelta\n"));
    }

    #[test]
    fn digits_stay_on_their_line() {
        let label = marshall_label("Bucket2Logs");
        assert_eq!(label.label, "Bucket2Logs");
        assert_eq!(label.lines, 1);
    }

    #[test]
    fn empty_id_is_one_empty_line() {
        let label = marshall_label("");
        assert_eq!(label.label, "");
        assert_eq!(label.lines, 1);
    }

    #[test]
    fn long_single_word_is_truncated() {
        let label = marshall_label("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(label.label, "Abcdefghijklmno...");
    }
}
