//! The prose at the top of a task page.

/// Text before the `;Task:` marker or the first top-level section heading.
pub fn intro(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let mut lines = Vec::new();
    for line in text.lines() {
        if is_task_marker(line) || is_top_heading(line) {
            break;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

/// Everything inside the `;Task:` block, up to the next section heading.
///
/// Empty when the page has no `;Task:` marker.
pub fn task_description(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let mut lines = text.lines().skip_while(|line| !is_task_marker(line));
    let Some(marker) = lines.next() else {
        return String::new();
    };

    // `;Task: do the thing` keeps the text after the colon.
    let inline = marker.trim_start().trim_start_matches(';').trim_start();
    let inline = inline.get(5..).unwrap_or("").trim();

    let mut body: Vec<&str> = Vec::new();
    if !inline.is_empty() {
        body.push(inline);
    }
    body.extend(lines.take_while(|line| !line.starts_with("==")));
    body.join("\n").trim().to_string()
}

fn is_task_marker(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix(';')
        .map(str::trim_start)
        .and_then(|rest| rest.get(..5))
        .is_some_and(|head| head.eq_ignore_ascii_case("task:"))
}

fn is_top_heading(line: &str) -> bool {
    line.starts_with("==") && !line.starts_with("===")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "{{task|Classic CS problems}}\nThere are 100 doors in a row.\n\n;Task:\nAnswer the question: what state are the doors in?\n\n==Ada==\n<lang ada>null;</lang>\n";

    #[test]
    fn intro_stops_at_task_marker() {
        assert_eq!(
            intro(PAGE),
            "{{task|Classic CS problems}}\nThere are 100 doors in a row."
        );
    }

    #[test]
    fn description_is_the_task_block() {
        assert_eq!(
            task_description(PAGE),
            "Answer the question: what state are the doors in?"
        );
    }

    #[test]
    fn intro_without_marker_stops_at_heading() {
        assert_eq!(intro("Print hello.\n=={{header|C}}==\n"), "Print hello.");
        assert_eq!(task_description("Print hello.\n=={{header|C}}==\n"), "");
    }

    #[test]
    fn inline_task_text_is_kept() {
        assert_eq!(task_description(";Task: Sort an array.\n==C==\n"), "Sort an array.");
    }
}
