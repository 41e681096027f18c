const PAGE_TEMPLATE: &str = include_str!("../assets/index.html");

/// The single UI page with the title and refresh interval filled in
pub fn render_page(title: &str, auto_refresh_secs: u64) -> String {
    PAGE_TEMPLATE
        .replace("{{title}}", &escape_html(title))
        .replace("{{auto_refresh_secs}}", &auto_refresh_secs.to_string())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
