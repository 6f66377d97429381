//! Bare HTML for the login and landing pages. Branding lives elsewhere.

use std::fmt::Write;

use crate::defense::DefenseMessage;

#[derive(Debug, Default)]
pub struct LoginView<'a> {
    pub error: Option<String>,
    pub notice: Option<DefenseMessage>,
    pub challenge_question: Option<&'a str>,
    pub challenge_notice: Option<&'a str>,
    pub username: Option<&'a str>,
}

#[must_use]
pub fn login_page(view: &LoginView<'_>) -> String {
    let mut body = String::from("<h1>Sign in</h1>\n");

    if let Some(error) = &view.error {
        let _ = writeln!(body, r#"<p class="alert error">{}</p>"#, escape(error));
    }
    if let Some(notice) = &view.notice {
        let _ = writeln!(
            body,
            r#"<p class="alert {}">{}</p>"#,
            notice.severity.as_str(),
            escape(&notice.text)
        );
    }

    body.push_str("<form method=\"post\" action=\"/login\">\n");
    let _ = writeln!(
        body,
        r#"<label>Username <input name="username" autocomplete="username" value="{}" required></label>"#,
        escape(view.username.unwrap_or_default())
    );
    body.push_str(
        "<label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\" required></label>\n",
    );
    if let Some(question) = view.challenge_question {
        if let Some(challenge_notice) = view.challenge_notice {
            let _ = writeln!(body, r#"<p class="challenge">{}</p>"#, escape(challenge_notice));
        }
        let _ = writeln!(
            body,
            r#"<label>{} <input name="challenge_answer" inputmode="numeric" autocomplete="off" required></label>"#,
            escape(question)
        );
    }
    body.push_str("<button type=\"submit\">Sign in</button>\n</form>\n");

    page("Sign in", &body)
}

#[must_use]
pub fn home_page(username: &str, horizon_url: &str) -> String {
    let body = format!(
        "<h1>Welcome, {}</h1>\n<p><a href=\"{}\">Open the dashboard</a></p>\n\
         <form method=\"post\" action=\"/logout\"><button type=\"submit\">Sign out</button></form>\n",
        escape(username),
        escape(horizon_url)
    );
    page("Portal", &body)
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
