//! Email templating and tracking rewrites.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::form_urlencoded;

use crate::subscriber::Subscriber;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*[A-Za-z0-9_]+\s*\}\}").expect("placeholder regex"));

static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s+(?:[^>]*?\s+)?href=["']([^"']*)["'][^>]*>(.*?)</a>"#)
        .expect("anchor regex")
});

/// Links containing any of these are left untouched.
const UNTRACKED: [&str; 2] = ["/unsubscribe", "/privacy"];

pub fn unsubscribe_url(base_url: &str, subscriber: &Subscriber) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("email", &subscriber.email)
        .append_pair("token", &subscriber.unsubscribe_token.to_string())
        .finish();
    format!("{base_url}/unsubscribe?{query}")
}

/// Substitutes subscriber data into the template. Placeholders that are not
/// known are dropped from the output.
pub fn render(template: &str, subscriber: &Subscriber, base_url: &str) -> String {
    let first_name = subscriber.first_name.as_deref().unwrap_or("there");
    let bar_name = subscriber.bar_name.as_deref().unwrap_or("your bar");

    let rendered = template
        .replace("{{email}}", &subscriber.email)
        .replace("{{first_name}}", first_name)
        .replace("{{bar_name}}", bar_name)
        .replace("{{base_url}}", base_url)
        .replace("{{unsubscribe_url}}", &unsubscribe_url(base_url, subscriber));

    PLACEHOLDER.replace_all(&rendered, "").into_owned()
}

pub fn pixel_url(base_url: &str, tracking_id: &str) -> String {
    format!("{base_url}/track-open/{tracking_id}")
}

pub fn click_url(base_url: &str, tracking_id: &str, target: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{base_url}/track-click/{tracking_id}?url={encoded}")
}

/// Inserts the open-tracking pixel right before the closing body tag, or at
/// the very end if the html has none.
pub fn add_pixel(html: &str, base_url: &str, tracking_id: &str) -> String {
    let pixel = format!(
        r#"<img src="{}" width="1" height="1" alt="" style="display:none;">"#,
        pixel_url(base_url, tracking_id)
    );
    match html.find("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + pixel.len());
            out.push_str(&html[..idx]);
            out.push_str(&pixel);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{pixel}"),
    }
}

/// Points every link at the click-tracking redirect, except for the
/// unsubscribe and privacy links.
pub fn rewrite_links(html: &str, base_url: &str, tracking_id: &str) -> String {
    ANCHOR
        .replace_all(html, |caps: &Captures| {
            let url = &caps[1];
            if UNTRACKED.iter().any(|u| url.contains(u)) {
                return caps[0].to_string();
            }
            format!(
                r#"<a href="{}">{}</a>"#,
                click_url(base_url, tracking_id, url),
                &caps[2]
            )
        })
        .into_owned()
}

/// Produces the final html for a single recipient.
pub fn prepare(template: &str, subscriber: &Subscriber, base_url: &str, tracking_id: &str) -> String {
    let html = render(template, subscriber, base_url);
    let html = add_pixel(&html, base_url, tracking_id);
    rewrite_links(&html, base_url, tracking_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://mail.example.com";

    fn subscriber() -> Subscriber {
        let mut sub = Subscriber::new("a@b.com");
        sub.first_name = Some("Al".to_string());
        sub
    }

    #[test]
    fn render_replaces_every_occurrence() {
        let html = render(
            "<p>Hi {{first_name}}, yes {{first_name}}! {{email}} {{unknown}}</p>",
            &subscriber(),
            BASE,
        );
        assert_eq!(html, "<p>Hi Al, yes Al! a@b.com </p>");
        assert!(!html.contains("{{"));
    }

    #[test]
    fn render_uses_fallbacks() {
        let sub = Subscriber::new("x@y.com");
        let html = render("{{first_name}} at {{bar_name}}", &sub, BASE);
        assert_eq!(html, "there at your bar");
    }

    #[test]
    fn render_builds_unsubscribe_url() {
        let sub = subscriber();
        let html = render("{{unsubscribe_url}}", &sub, BASE);
        assert_eq!(
            html,
            format!(
                "{BASE}/unsubscribe?email=a%40b.com&token={}",
                sub.unsubscribe_token
            )
        );
    }

    #[test]
    fn pixel_goes_before_body_end() {
        let html = add_pixel("<html><body><p>x</p></body></html>", BASE, "t1");
        assert_eq!(
            html,
            format!(
                r#"<html><body><p>x</p><img src="{BASE}/track-open/t1" width="1" height="1" alt="" style="display:none;"></body></html>"#
            )
        );
    }

    #[test]
    fn pixel_is_appended_without_body() {
        let html = add_pixel("<p>x</p>", BASE, "t1");
        assert!(html.starts_with("<p>x</p><img"));
    }

    #[test]
    fn unsubscribe_links_are_left_alone() {
        let html = r#"<a href="/unsubscribe?email=a@b.com">Leave</a>"#;
        assert_eq!(rewrite_links(html, BASE, "t1"), html);
        let html = r#"<a class="x" href='https://x.com/privacy'>Privacy</a>"#;
        assert_eq!(rewrite_links(html, BASE, "t1"), html);
    }

    #[test]
    fn links_point_at_tracking_redirect() {
        let html = rewrite_links(r#"<p><a href="https://x.com">Go</a></p>"#, BASE, "t1");
        assert_eq!(
            html,
            format!(r#"<p><a href="{BASE}/track-click/t1?url=https%3A%2F%2Fx.com">Go</a></p>"#)
        );
    }

    #[test]
    fn links_match_case_insensitively_across_lines() {
        let html = rewrite_links(
            "<A target=\"_blank\" HREF=\"https://x.com/a?b=c\">Multi\nline</A>",
            BASE,
            "t1",
        );
        assert!(html.contains("url=https%3A%2F%2Fx.com%2Fa%3Fb%3Dc"));
        assert!(html.contains(">Multi\nline</a>"));
    }

    #[test]
    fn prepare_tracks_links_but_not_pixel() {
        let html = prepare(
            r#"<body><a href="{{base_url}}/offer">Offer</a></body>"#,
            &subscriber(),
            BASE,
            "t9",
        );
        assert!(html.contains("/track-click/t9?url=https%3A%2F%2Fmail.example.com%2Foffer"));
        assert!(html.contains(r#"<img src="https://mail.example.com/track-open/t9""#));
    }
}
