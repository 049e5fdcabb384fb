//! Delivery email rendering.

use crate::order::FulfillmentOrder;

/// Store branding used in delivery emails
#[derive(Debug, Clone)]
pub struct EmailBranding {
    /// Shown in the subject and footer (e.g., "Datos con Alex")
    pub store_name: String,
    /// Links shown in the footer as (label, url)
    pub links: Vec<(String, String)>,
}

impl EmailBranding {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            links: Vec::new(),
        }
    }

    /// Builder: add a footer link
    pub fn with_link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.push((label.into(), url.into()));
        self
    }
}

impl Default for EmailBranding {
    fn default() -> Self {
        Self::new("Datos con Alex")
    }
}

/// Subject line and HTML body of a rendered delivery email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
}

/// Render the delivery email for an order and the files actually attached.
pub fn render_delivery_email(
    order: &FulfillmentOrder,
    filenames: &[String],
    branding: &EmailBranding,
) -> RenderedEmail {
    let subject = format!(
        "Your purchase: {} - {}",
        order.product_title, branding.store_name
    );

    let attachment_phrase = if filenames.len() > 1 {
        "the attached files"
    } else {
        "the attached file"
    };
    let file_list = filenames
        .iter()
        .map(|f| escape_html(f))
        .collect::<Vec<_>>()
        .join(", ");

    let links = branding
        .links
        .iter()
        .map(|(label, url)| {
            format!(
                r#"<a href="{}" style="color: #22c55e; text-decoration: none;">{}</a>"#,
                escape_html(url),
                escape_html(label)
            )
        })
        .collect::<Vec<_>>()
        .join(" &bull; ");

    let reference = order
        .reference
        .as_deref()
        .map(|r| format!("Order {} | ", escape_html(r)))
        .unwrap_or_default();

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{store}</title></head>
<body style="margin: 0; padding: 40px 20px; background-color: #0a0a0a; font-family: system-ui, sans-serif;">
  <div style="max-width: 600px; margin: 0 auto; background-color: #1a1a1a; border-radius: 16px; overflow: hidden;">
    <div style="padding: 32px 40px; background: linear-gradient(135deg, #22c55e 0%, #16a34a 100%); text-align: center;">
      <h1 style="margin: 0; color: #ffffff;">Thank you for your purchase!</h1>
    </div>
    <div style="padding: 40px; color: #d1d5db; font-size: 16px; line-height: 1.6;">
      <p style="color: #ffffff;">Hi <strong style="color: #22c55e;">{name}</strong>,</p>
      <p>Your payment for <strong style="color: #ffffff;">{title}</strong> has been confirmed.</p>
      <div style="background-color: #262626; border-radius: 12px; padding: 20px; border-left: 4px solid #22c55e;">
        <p style="margin: 0; color: #ffffff;">You will find {phrase} in this email:</p>
        <p style="margin: 10px 0 0; color: #9ca3af; font-family: monospace;">{files}</p>
      </div>
      <p style="margin-top: 30px; color: #9ca3af; font-size: 14px;">Questions? Just reply to this email.</p>
    </div>
    <div style="padding: 24px 40px; background-color: #262626; text-align: center; font-size: 14px;">
      <p style="margin: 0 0 12px;">{links}</p>
      <p style="margin: 0; color: #6b7280; font-size: 12px;">{reference}{store}</p>
    </div>
  </div>
</body>
</html>
"#,
        store = escape_html(&branding.store_name),
        name = escape_html(&order.recipient_name),
        title = escape_html(&order.product_title),
        phrase = attachment_phrase,
        files = file_list,
        links = links,
        reference = reference,
    );

    RenderedEmail { subject, html_body }
}

/// Escape text for inclusion in HTML element content and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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
