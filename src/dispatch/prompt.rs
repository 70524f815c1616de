//! 提示词构造与大文件裁剪

use std::borrow::Cow;
use std::fmt::Write;

use super::message::BufferUpdate;
use crate::config::ShapingPolicy;

/// 按策略裁剪内容：不超过阈值原样返回，否则只保留光标附近的窗口
pub fn shape_content<'a>(content: &'a str, cursor_line: i64, policy: &ShapingPolicy) -> Cow<'a, str> {
    if content.len() <= policy.max_content_bytes {
        return Cow::Borrowed(content);
    }
    Cow::Owned(window_around_cursor(
        content,
        cursor_line,
        policy.context_lines,
    ))
}

/// 保留 `[cursor - context, cursor + context)` 行，两侧被省略的行数以横幅标出
pub fn window_around_cursor(content: &str, cursor_line: i64, context: usize) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();

    let cursor = usize::try_from(cursor_line.max(0)).unwrap_or(usize::MAX);
    let start = cursor.saturating_sub(context).min(total);
    let end = cursor.saturating_add(context).min(total).max(start);

    let mut out = String::new();
    if start > 0 {
        let _ = writeln!(out, "[...{} lines omitted...]", start);
    }
    for line in &lines[start..end] {
        out.push_str(line);
        out.push('\n');
    }
    if end < total {
        let _ = writeln!(out, "[...{} lines omitted...]", total - end);
    }
    out
}

/// 构造发给 Agent 的提示词
pub fn build_prompt(update: &BufferUpdate, content: &str) -> String {
    format!(
        "You are watching a live coding session. The user is editing:\n\
         File: {path} ({filetype})\n\
         Cursor: line {line}, col {col}\n\
         \n\
         Current buffer content:\n\
         ```{filetype}\n\
         {content}\n\
         ```\n\
         \n\
         Event: {event}\n\
         \n\
         Provide brief, actionable observations (2-3 sentences max).",
        path = update.display_path(),
        filetype = update.filetype,
        line = update.cursor_line,
        col = update.cursor_col,
        content = content,
        event = update.last_event,
    )
}
