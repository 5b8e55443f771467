//! Field projection for fetched posts.
//!
//! Keeps `userId`, `id` and `title`, renaming `id` to `post_id`. The mapping
//! is one-to-one and order-preserving; nothing is filtered or validated
//! here.

use crate::models::ProjectedPost;

pub fn project_posts(records: &[serde_json::Value]) -> Vec<ProjectedPost> {
    records.iter().map(project_post).collect()
}

fn project_post(record: &serde_json::Value) -> ProjectedPost {
    let field = |name: &str| record.get(name).cloned().unwrap_or(serde_json::Value::Null);
    ProjectedPost {
        user_id: field("userId"),
        post_id: field("id"),
        title: field("title"),
    }
}

const PREVIEW_TITLE_WIDTH: usize = 40;

/// Render the first `n` rows as an aligned text table.
pub fn preview(posts: &[ProjectedPost], n: usize) -> String {
    let rows: Vec<[String; 3]> = posts
        .iter()
        .take(n)
        .map(|p| {
            [
                cell(&p.user_id),
                cell(&p.post_id),
                truncate(&cell(&p.title), PREVIEW_TITLE_WIDTH),
            ]
        })
        .collect();

    let header = ["userId", "post_id", "title"];
    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (w, value) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(value.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header.map(str::to_string), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, row: &[String; 3], widths: &[usize; 3]) {
    let line = format!(
        "{:<w0$}  {:<w1$}  {}",
        row[0],
        row[1],
        row[2],
        w0 = widths[0],
        w1 = widths[1]
    );
    out.push_str(line.trim_end());
    out.push('\n');
}

fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NaN".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_count_and_order() {
        let records: Vec<_> = (1..=25)
            .map(|i| json!({"userId": i % 3, "id": i, "title": format!("t{}", i), "body": "x"}))
            .collect();
        let out = project_posts(&records);
        assert_eq!(out.len(), records.len());
        for (i, p) in out.iter().enumerate() {
            assert_eq!(p.post_id, json!(i as i64 + 1));
        }
    }

    #[test]
    fn output_has_exactly_the_selected_fields() {
        let out = project_posts(&[json!({"userId": 1, "id": 101, "title": "A", "body": "dropped"})]);
        let value = serde_json::to_value(&out[0]).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["post_id", "title", "userId"]);
        assert_eq!(value, json!({"userId": 1, "post_id": 101, "title": "A"}));
    }

    #[test]
    fn missing_fields_become_null_not_errors() {
        let out = project_posts(&[json!({"title": "only title"}), json!("not an object")]);
        assert_eq!(out.len(), 2);
        assert!(out[0].user_id.is_null());
        assert!(out[0].post_id.is_null());
        assert!(out[1].title.is_null());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(project_posts(&[]).is_empty());
    }

    #[test]
    fn preview_limits_rows_and_aligns() {
        let records: Vec<_> = (1..=10)
            .map(|i| json!({"userId": 1, "id": i, "title": "x".repeat(60)}))
            .collect();
        let text = preview(&project_posts(&records), 5);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("userId  post_id  title"));
        assert!(lines[1].ends_with("..."));
        assert_eq!(lines[1].find('x'), lines[0].find("title"));
    }
}
